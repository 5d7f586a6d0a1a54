// 该文件是 Chepai （车牌） 项目的一部分。
// src/dataset/yolo.rs - VOC 转 YOLO 检测标签
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

use tracing::{debug, warn};

use crate::dataset::{DatasetError, PLATE_REGION_NAME, voc::VocAnnotation};

/// 车牌检测器训练标签：每个 XML 只取第一个车牌区域，类别恒为 0
#[derive(Debug, Clone)]
pub struct YoloConverter {
  region_name: String,
  class_id: u32,
}

impl Default for YoloConverter {
  fn default() -> Self {
    Self {
      region_name: PLATE_REGION_NAME.to_string(),
      class_id: 0,
    }
  }
}

impl YoloConverter {
  pub fn with_region_name(mut self, name: impl Into<String>) -> Self {
    self.region_name = name.into();
    self
  }

  /// 返回 YOLO 标签行；没有车牌区域时返回 `None`
  pub fn convert(
    &self,
    annotation: &VocAnnotation,
    size: (u32, u32),
  ) -> Result<Option<String>, DatasetError> {
    let Some(region) = annotation.objects_named(&self.region_name).next() else {
      return Ok(None);
    };
    let (width, height) = size;
    if width == 0 || height == 0 {
      return Err(DatasetError::InvalidSize(width, height));
    }
    Ok(Some(
      region
        .bbox
        .to_yolo(width, height)
        .to_label_line(self.class_id),
    ))
  }

  /// 转换一个 XML 文件，标签写入 `label_dir/<stem>.txt`。
  ///
  /// 先确认存在车牌区域，再确定图像尺寸：优先取 XML 中的 `size`，否则读取同目录同名的 `.jpg`。
  pub fn convert_file(
    &self,
    xml_path: &Path,
    label_dir: &Path,
  ) -> Result<Option<PathBuf>, DatasetError> {
    let annotation = VocAnnotation::from_file(xml_path)?;
    if annotation.objects_named(&self.region_name).next().is_none() {
      warn!("{} 中没有找到车牌区域标注", xml_path.display());
      return Ok(None);
    }

    let size = match annotation.size {
      Some(size) => size,
      None => {
        let image_path = xml_path.with_extension("jpg");
        image::image_dimensions(&image_path).map_err(|e| DatasetError::ImageUnavailable {
          path: image_path,
          source: e,
        })?
      }
    };

    let Some(line) = self.convert(&annotation, size)? else {
      return Ok(None);
    };

    let stem = xml_path
      .file_stem()
      .ok_or_else(|| DatasetError::InvalidPath(xml_path.to_path_buf()))?;
    let out = label_dir.join(format!("{}.txt", stem.to_string_lossy()));
    std::fs::write(&out, line).map_err(|e| DatasetError::IoError(out.clone(), e))?;
    debug!("写入标签: {}", out.display());
    Ok(Some(out))
  }
}
