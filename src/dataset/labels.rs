// 该文件是 Chepai （车牌） 项目的一部分。
// src/dataset/labels.rs - 车牌文本标签生成
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

//! 从字符级标注推导整牌文本：落在“整个车牌区域”框内的字符框按左边界排序后拼接。

use std::io::Write;
use std::path::Path;

use tracing::warn;

use crate::dataset::{
  DatasetError, PLATE_REGION_NAME,
  voc::{VocAnnotation, VocObject},
};

pub const CSV_HEADER: [&str; 2] = ["image_filename", "plate_label"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateLabel {
  pub image_filename: String,
  pub plate_label: String,
}

#[derive(Debug, Clone)]
pub struct LabelDeriver {
  region_name: String,
  tolerance: f32,
}

impl Default for LabelDeriver {
  fn default() -> Self {
    Self {
      region_name: PLATE_REGION_NAME.to_string(),
      tolerance: 0.0,
    }
  }
}

impl LabelDeriver {
  pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
    self.region_name = name.into();
    self
  }

  pub fn with_tolerance(mut self, tolerance: f32) -> Self {
    self.tolerance = tolerance;
    self
  }

  /// 每个车牌区域生成一条记录，区域内没有字符时不生成
  pub fn derive(&self, annotation: &VocAnnotation, image_filename: &str) -> Vec<PlateLabel> {
    let (regions, characters): (Vec<&VocObject>, Vec<&VocObject>) = annotation
      .objects
      .iter()
      .partition(|object| object.name == self.region_name);

    regions
      .into_iter()
      .filter_map(|region| {
        let mut inside: Vec<&VocObject> = characters
          .iter()
          .copied()
          .filter(|object| region.bbox.contains(&object.bbox, self.tolerance))
          .collect();
        if inside.is_empty() {
          return None;
        }
        inside.sort_by(|a, b| a.bbox.x1.total_cmp(&b.bbox.x1));
        Some(PlateLabel {
          image_filename: image_filename.to_string(),
          plate_label: inside.iter().map(|object| object.name.as_str()).collect(),
        })
      })
      .collect()
  }

  /// 图像文件名取 XML 文件名第一个 `.` 之前的部分加 `.jpg`
  pub fn derive_file(&self, xml_path: &Path) -> Result<Vec<PlateLabel>, DatasetError> {
    let annotation = VocAnnotation::from_file(xml_path)?;
    if annotation.objects_named(&self.region_name).next().is_none() {
      warn!(
        "{} 中没有车牌区域标注 ('{}')",
        xml_path.display(),
        self.region_name
      );
      return Ok(Vec::new());
    }

    Ok(self.derive(&annotation, &image_filename_for(xml_path)))
  }
}

fn image_filename_for(xml_path: &Path) -> String {
  let name = xml_path
    .file_name()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();
  let base = name.split('.').next().unwrap_or_default();
  format!("{}.jpg", base)
}

fn csv_field(value: &str) -> String {
  if value.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", value.replace('"', "\"\""))
  } else {
    value.to_string()
  }
}

pub fn write_csv<W: Write>(mut writer: W, labels: &[PlateLabel]) -> std::io::Result<()> {
  writeln!(writer, "{},{}", CSV_HEADER[0], CSV_HEADER[1])?;
  for label in labels {
    writeln!(
      writer,
      "{},{}",
      csv_field(&label.image_filename),
      csv_field(&label.plate_label)
    )?;
  }
  writer.flush()
}
