// 该文件是 Chepai （车牌） 项目的一部分。
// src/dataset/voc.rs - Pascal VOC 标注解析
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use quick_xml::{Reader, events::Event};

use crate::{dataset::DatasetError, geometry::BBox};

#[derive(Debug, Clone, PartialEq)]
pub struct VocObject {
  /// 已去除首尾空白
  pub name: String,
  pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VocAnnotation {
  pub filename: Option<String>,
  /// `(width, height)`
  pub size: Option<(u32, u32)>,
  pub objects: Vec<VocObject>,
}

impl VocAnnotation {
  pub fn from_file(path: &Path) -> Result<Self, DatasetError> {
    let content =
      std::fs::read_to_string(path).map_err(|e| DatasetError::IoError(path.to_path_buf(), e))?;
    parse_voc(&content)
  }

  pub fn objects_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a VocObject> + 'a {
    self.objects.iter().filter(move |object| object.name == name)
  }
}

#[derive(Default)]
struct PartialObject {
  name: Option<String>,
  coords: [Option<f32>; 4],
}

impl PartialObject {
  fn finish(self, index: usize) -> Result<VocObject, DatasetError> {
    let name = self.name.ok_or(DatasetError::MissingField {
      field: "object/name",
      object: Some(index),
    })?;
    let mut coords = [0f32; 4];
    for (i, value) in self.coords.into_iter().enumerate() {
      coords[i] = value.ok_or(DatasetError::MissingField {
        field: BNDBOX_FIELDS[i],
        object: Some(index),
      })?;
    }
    Ok(VocObject {
      name,
      bbox: BBox::from_array(coords),
    })
  }
}

const BNDBOX_FIELDS: [&str; 4] = [
  "object/bndbox/xmin",
  "object/bndbox/ymin",
  "object/bndbox/xmax",
  "object/bndbox/ymax",
];

fn parse_number<T: std::str::FromStr>(field: &'static str, text: &str) -> Result<T, DatasetError> {
  text.trim().parse().map_err(|_| DatasetError::InvalidNumber {
    field,
    value: text.to_string(),
  })
}

/// 解析 VOC XML。只读取 `filename`、`size` 与 `object` 下的 `name`、`bndbox`，其余元素忽略。
pub fn parse_voc(xml: &str) -> Result<VocAnnotation, DatasetError> {
  let mut reader = Reader::from_reader(xml.as_bytes());
  reader.trim_text(true);

  let mut annotation = VocAnnotation::default();
  let mut path: Vec<String> = Vec::new();
  let mut object: Option<PartialObject> = None;
  let mut size: (Option<u32>, Option<u32>) = (None, None);
  let mut has_size = false;
  let mut buf = Vec::new();

  loop {
    match reader.read_event_into(&mut buf)? {
      Event::Start(e) => {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        match (path.len(), name.as_str()) {
          (1, "object") => object = Some(PartialObject::default()),
          (1, "size") => has_size = true,
          _ => {}
        }
        path.push(name);
      }
      Event::End(_) => {
        if let Some(name) = path.pop()
          && path.len() == 1
          && name == "object"
          && let Some(partial) = object.take()
        {
          let index = annotation.objects.len();
          annotation.objects.push(partial.finish(index)?);
        }
      }
      Event::Text(e) => {
        let text = e.unescape()?;
        let segments: Vec<&str> = path.iter().skip(1).map(String::as_str).collect();
        match segments.as_slice() {
          ["filename"] => annotation.filename = Some(text.trim().to_string()),
          ["size", "width"] => size.0 = Some(parse_number("size/width", &text)?),
          ["size", "height"] => size.1 = Some(parse_number("size/height", &text)?),
          ["object", "name"] => {
            if let Some(partial) = object.as_mut() {
              partial.name = Some(text.trim().to_string());
            }
          }
          ["object", "bndbox", field] => {
            let slot = match *field {
              "xmin" => Some(0),
              "ymin" => Some(1),
              "xmax" => Some(2),
              "ymax" => Some(3),
              _ => None,
            };
            if let (Some(slot), Some(partial)) = (slot, object.as_mut()) {
              partial.coords[slot] = Some(parse_number(BNDBOX_FIELDS[slot], &text)?);
            }
          }
          _ => {}
        }
      }
      Event::Eof => break,
      _ => {}
    }
    buf.clear();
  }

  if has_size {
    annotation.size = match size {
      (Some(width), Some(height)) => Some((width, height)),
      (None, _) => {
        return Err(DatasetError::MissingField {
          field: "size/width",
          object: None,
        });
      }
      (_, None) => {
        return Err(DatasetError::MissingField {
          field: "size/height",
          object: None,
        });
      }
    };
  }

  Ok(annotation)
}

#[cfg(test)]
mod tests {
  use super::*;

  const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>test</folder>
  <filename>car_001.jpg</filename>
  <size><width>640</width><height>480</height><depth>3</depth></size>
  <object>
    <name> کل ناحیه پلاک </name>
    <bndbox><xmin>100</xmin><ymin>200</ymin><xmax>300</xmax><ymax>250</ymax></bndbox>
  </object>
  <object>
    <name>۱</name>
    <pose>Unspecified</pose>
    <bndbox><xmin>110.5</xmin><ymin>205</ymin><xmax>130</xmax><ymax>245</ymax></bndbox>
  </object>
</annotation>"#;

  #[test]
  fn parses_objects_and_size() {
    let annotation = parse_voc(SAMPLE).unwrap();
    assert_eq!(annotation.filename.as_deref(), Some("car_001.jpg"));
    assert_eq!(annotation.size, Some((640, 480)));
    assert_eq!(annotation.objects.len(), 2);
    assert_eq!(annotation.objects[0].name, "کل ناحیه پلاک");
    assert_eq!(
      annotation.objects[1].bbox,
      BBox::new(110.5, 205.0, 130.0, 245.0)
    );
    assert_eq!(annotation.objects_named("۱").count(), 1);
  }

  #[test]
  fn size_is_optional() {
    let xml = "<annotation><object><name>A</name><bndbox><xmin>1</xmin><ymin>2</ymin><xmax>3</xmax><ymax>4</ymax></bndbox></object></annotation>";
    let annotation = parse_voc(xml).unwrap();
    assert_eq!(annotation.size, None);
    assert_eq!(annotation.objects.len(), 1);
  }

  #[test]
  fn missing_coordinate_is_reported() {
    let xml = "<annotation><object><name>A</name><bndbox><xmin>1</xmin><ymin>2</ymin><xmax>3</xmax></bndbox></object></annotation>";
    match parse_voc(xml) {
      Err(DatasetError::MissingField { field, object }) => {
        assert_eq!(field, "object/bndbox/ymax");
        assert_eq!(object, Some(0));
      }
      other => panic!("unexpected result: {other:?}"),
    }
  }

  #[test]
  fn bad_number_is_reported() {
    let xml = "<annotation><object><name>A</name><bndbox><xmin>one</xmin><ymin>2</ymin><xmax>3</xmax><ymax>4</ymax></bndbox></object></annotation>";
    assert!(matches!(
      parse_voc(xml),
      Err(DatasetError::InvalidNumber { .. })
    ));
  }

  #[test]
  fn malformed_xml_is_an_error() {
    assert!(parse_voc("<annotation><object></annotation>").is_err());
  }
}
