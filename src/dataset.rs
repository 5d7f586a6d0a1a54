// 该文件是 Chepai （车牌） 项目的一部分。
// src/dataset.rs - 数据集工具
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{error, info};

use crate::input::{InputError, list_files};

mod labels;
mod voc;
mod yolo;

pub use self::labels::{CSV_HEADER, LabelDeriver, PlateLabel, write_csv};
pub use self::voc::{VocAnnotation, VocObject, parse_voc};
pub use self::yolo::YoloConverter;

/// 标注中“整个车牌区域”对象的名称
pub const PLATE_REGION_NAME: &str = "کل ناحیه پلاک";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("XML 解析错误: {0}")]
  Xml(#[from] quick_xml::Error),
  #[error("I/O 错误 {0}: {1}")]
  IoError(PathBuf, #[source] std::io::Error),
  #[error("缺少字段 {field}{}", .object.map(|i| format!(" (第 {} 个 object)", i)).unwrap_or_default())]
  MissingField {
    field: &'static str,
    object: Option<usize>,
  },
  #[error("字段 {field} 不是合法数值: {value:?}")]
  InvalidNumber { field: &'static str, value: String },
  #[error("无法获取图像尺寸 {path}: {source}")]
  ImageUnavailable {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("图像尺寸无效: {0}x{1}")]
  InvalidSize(u32, u32),
  #[error("无效路径: {0}")]
  InvalidPath(PathBuf),
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
}

/// 扫描若干目录下的 XML 标注，生成车牌文本 CSV。
///
/// 单个文件出错只记录日志并跳过。没有任何记录时不写文件，返回 `Ok(0)`。
pub fn generate_label_csv(
  xml_dirs: &[PathBuf],
  output_csv: &Path,
  deriver: &LabelDeriver,
) -> Result<usize, DatasetError> {
  let mut labels = Vec::new();
  for dir in xml_dirs {
    for xml in list_files(dir, &["xml"])? {
      match deriver.derive_file(&xml) {
        Ok(mut found) => labels.append(&mut found),
        Err(e) => error!("{}: {}", xml.display(), e),
      }
    }
  }

  if labels.is_empty() {
    info!("没有生成任何标签，跳过写入 {}", output_csv.display());
    return Ok(0);
  }

  if let Some(parent) = output_csv.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|e| DatasetError::IoError(parent.to_path_buf(), e))?;
  }
  let file = std::fs::File::create(output_csv)
    .map_err(|e| DatasetError::IoError(output_csv.to_path_buf(), e))?;
  write_csv(std::io::BufWriter::new(file), &labels)
    .map_err(|e| DatasetError::IoError(output_csv.to_path_buf(), e))?;

  info!("写入 {} 条标签到 {}", labels.len(), output_csv.display());
  Ok(labels.len())
}

/// 把目录下所有 XML 标注转换为 YOLO 标签，返回写出的文件数
pub fn convert_yolo_dir(
  xml_dir: &Path,
  label_dir: &Path,
  converter: &YoloConverter,
) -> Result<usize, DatasetError> {
  std::fs::create_dir_all(label_dir)
    .map_err(|e| DatasetError::IoError(label_dir.to_path_buf(), e))?;

  let mut written = 0;
  for xml in list_files(xml_dir, &["xml"])? {
    match converter.convert_file(&xml, label_dir) {
      Ok(Some(_)) => written += 1,
      Ok(None) => {}
      Err(e) => error!("{}: {}", xml.display(), e),
    }
  }
  info!("共写出 {} 个 YOLO 标签到 {}", written, label_dir.display());
  Ok(written)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn plate_xml(chars: &[(&str, f32)]) -> String {
    let mut xml = format!(
      "<annotation><size><width>400</width><height>200</height></size><object><name>{}</name><bndbox><xmin>100</xmin><ymin>50</ymin><xmax>300</xmax><ymax>150</ymax></bndbox></object>",
      PLATE_REGION_NAME
    );
    for (name, x) in chars {
      xml.push_str(&format!(
        "<object><name>{}</name><bndbox><xmin>{}</xmin><ymin>60</ymin><xmax>{}</xmax><ymax>140</ymax></bndbox></object>",
        name,
        x,
        x + 10.0
      ));
    }
    xml.push_str("</annotation>");
    xml
  }

  #[test]
  fn label_csv_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.xml"), plate_xml(&[("۲", 150.0), ("۱", 120.0)])).unwrap();
    std::fs::write(dir.path().join("b.xml"), "<annotation><object>").unwrap();
    std::fs::write(dir.path().join("c.xml"), plate_xml(&[("ب", 200.0)])).unwrap();

    let csv = dir.path().join("out/labels.csv");
    let count =
      generate_label_csv(&[dir.path().to_path_buf()], &csv, &LabelDeriver::default()).unwrap();
    assert_eq!(count, 2);
    assert_eq!(
      std::fs::read_to_string(csv).unwrap(),
      "image_filename,plate_label\na.jpg,۱۲\nc.jpg,ب\n"
    );
  }

  #[test]
  fn label_csv_not_written_without_records() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.xml"), "<annotation></annotation>").unwrap();
    let csv = dir.path().join("labels.csv");
    let count =
      generate_label_csv(&[dir.path().to_path_buf()], &csv, &LabelDeriver::default()).unwrap();
    assert_eq!(count, 0);
    assert!(!csv.exists());
  }

  #[test]
  fn yolo_dir_counts_written_labels() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.xml"), plate_xml(&[])).unwrap();
    std::fs::write(dir.path().join("b.xml"), "<annotation></annotation>").unwrap();
    std::fs::write(dir.path().join("c.xml"), "not xml <<").unwrap();

    let labels = dir.path().join("labels");
    let written = convert_yolo_dir(dir.path(), &labels, &YoloConverter::default()).unwrap();
    assert_eq!(written, 1);
    assert_eq!(
      std::fs::read_to_string(labels.join("a.txt")).unwrap(),
      "0 0.500000 0.500000 0.500000 0.500000"
    );
  }

  #[test]
  fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      convert_yolo_dir(
        &dir.path().join("missing"),
        &dir.path().join("labels"),
        &YoloConverter::default()
      ),
      Err(DatasetError::Input(_))
    ));
  }
}
