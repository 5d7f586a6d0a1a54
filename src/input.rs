// 该文件是 Chepai （车牌） 项目的一部分。
// src/input.rs - 视频/图像输入
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
use tracing::debug;

mod read_image_file;
pub use self::read_image_file::load_image;

#[cfg(feature = "video")]
mod gstreamer_input;
#[cfg(feature = "video")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder, VideoFrame,
};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

#[derive(Error, Debug)]
pub enum InputError {
  #[error("文件不存在: {0}")]
  NotFound(PathBuf),
  #[error("无法读取图像 {path}: {source}")]
  Unreadable {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("I/O 错误 {0}: {1}")]
  IoError(PathBuf, #[source] std::io::Error),
  #[error("不支持的文件类型: {0}")]
  UnsupportedExtension(PathBuf),
  #[cfg(feature = "video")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
}

/// 输入媒体类型，在接收输入时按扩展名确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
}

impl MediaKind {
  pub fn from_path(path: &Path) -> Result<Self, InputError> {
    let extension = lowercase_extension(path)
      .ok_or_else(|| InputError::UnsupportedExtension(path.to_path_buf()))?;
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
      Ok(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
      Ok(MediaKind::Video)
    } else {
      Err(InputError::UnsupportedExtension(path.to_path_buf()))
    }
  }
}

fn lowercase_extension(path: &Path) -> Option<String> {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase)
}

/// 列出目录下扩展名（不区分大小写）在 `extensions` 中的文件，按文件名排序
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, InputError> {
  let entries = std::fs::read_dir(dir).map_err(|e| InputError::IoError(dir.to_path_buf(), e))?;

  let mut files = Vec::new();
  for entry in entries {
    let path = entry
      .map_err(|e| InputError::IoError(dir.to_path_buf(), e))?
      .path();
    if !path.is_file() {
      continue;
    }
    match lowercase_extension(&path) {
      Some(extension) if extensions.iter().any(|e| e.eq_ignore_ascii_case(&extension)) => {
        files.push(path)
      }
      _ => {}
    }
  }
  files.sort();
  debug!("目录 {} 中找到 {} 个文件", dir.display(), files.len());
  Ok(files)
}
