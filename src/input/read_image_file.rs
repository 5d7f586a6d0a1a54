// 该文件是 Chepai （车牌） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use tracing::debug;

use crate::input::InputError;

/// 读取图像文件并转为 RGB。内容按文件头识别，不依赖扩展名。
pub fn load_image(path: &Path) -> Result<RgbImage, InputError> {
  if !path.is_file() {
    return Err(InputError::NotFound(path.to_path_buf()));
  }

  let reader = ImageReader::open(path)
    .map_err(|e| InputError::IoError(path.to_path_buf(), e))?
    .with_guessed_format()
    .map_err(|e| InputError::IoError(path.to_path_buf(), e))?;
  let image = reader.decode().map_err(|e| InputError::Unreadable {
    path: path.to_path_buf(),
    source: e,
  })?;

  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.into_rgb8())
}
