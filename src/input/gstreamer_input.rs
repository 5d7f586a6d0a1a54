// 该文件是 Chepai （车牌） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 视频输入
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

//! # GStreamer 视频输入
//!
//! 逐帧解码视频文件为 `RgbImage`。
//!
//! ## 系统依赖
//!
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## URL Scheme
//!
//! `gst://file/path/to/video.mp4?rotate=90`

use std::path::{Path, PathBuf};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

const DEFAULT_FPS: i32 = 30;

#[derive(Error, Debug)]
pub enum GStreamerInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("管道中找不到 appsink 元素")]
  AppSinkNotFound,
  #[error("无法从 caps 获取视频信息")]
  VideoInfoError,
  #[error("不支持的视频格式")]
  UnsupportedFormat,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("缓冲区大小不符: 需要 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("状态切换失败: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

enum GStreamerInputBuilderItem {
  FileSource(PathBuf),
  VideoFlip { method: u32 },
  TargetFormat { format: String },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      // location 在构建后通过属性设置
      GStreamerInputBuilderItem::FileSource(_) => "filesrc name=source ! decodebin".to_string(),
      GStreamerInputBuilderItem::VideoFlip { method } => format!("videoflip method={}", method),
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }
}

pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME || url.host_str() != Some("file") {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let mut builder = Self::file(url_file_path(url));
    if let Some(rotate) = url
      .query_pairs()
      .find(|(k, _)| k == "rotate")
      .map(|(_, v)| v.into_owned())
    {
      builder = builder.rotate(&rotate);
    }
    Ok(builder)
  }
}

impl GStreamerInputPipelineBuilder {
  pub fn file(path: impl Into<PathBuf>) -> Self {
    Self {
      items: vec![GStreamerInputBuilderItem::FileSource(path.into())],
    }
  }

  /// 顺时针旋转角度，只接受 90 的倍数
  pub fn rotate(mut self, degrees: &str) -> Self {
    let method = match degrees {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return self,
    };
    self
      .items
      .push(GStreamerInputBuilderItem::VideoFlip { method });
    self
  }

  pub fn build(mut self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    self.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: "RGB".to_string(),
    });
    let location = self.items.iter().find_map(|item| match item {
      GStreamerInputBuilderItem::FileSource(path) => Some(path.clone()),
      _ => None,
    });

    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    // 文件输入不能丢帧，也不需要按时钟同步
    let full_pipeline = format!("{} ! appsink name=sink sync=false max-buffers=4", basic_pipeline);
    info!("GStreamer 管道描述: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("无法创建管道".to_string()))?;

    if let Some(location) = location {
      let source = pipeline
        .by_name("source")
        .ok_or_else(|| GStreamerInputError::PipelineError("找不到 filesrc".to_string()))?;
      source.set_property("location", location.to_string_lossy().as_ref());
    }

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkNotFound)?;

    pipeline.set_state(gst::State::Playing)?;

    Ok(GStreamerInput { pipeline, appsink })
  }
}

/// 解码后的一帧
pub struct VideoFrame {
  pub image: RgbImage,
  pub fps: i32,
}

pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
}

impl GStreamerInput {
  pub fn open(path: &Path) -> Result<Self, GStreamerInputError> {
    GStreamerInputPipelineBuilder::file(path).build()
  }

  fn pull_sample(&self) -> Option<gst::Sample> {
    match self.appsink.pull_sample() {
      Ok(sample) => Some(sample),
      Err(_) if self.appsink.is_eos() => {
        debug!("视频流结束");
        None
      }
      Err(e) => {
        error!("拉取视频帧失败: {}", e);
        None
      }
    }
  }
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      tracing::warn!("停止 GStreamer 管道失败: {}", e);
    }
  }
}

impl Iterator for GStreamerInput {
  type Item = VideoFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    convert_sample(sample)
      .map_err(|e| {
        error!("视频帧转换失败: {}", e);
        e
      })
      .ok()
  }
}

fn convert_sample(sample: gst::Sample) -> Result<VideoFrame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有缓冲区".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("样本中没有 caps".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;
  let width = video_info.width();
  let height = video_info.height();
  let stride = video_info.stride()[0] as usize;
  let fps = video_info.fps();
  let fps = if fps.denom() > 0 && fps.numer() > 0 {
    (fps.numer() as f64 / fps.denom() as f64).round() as i32
  } else {
    DEFAULT_FPS
  };

  let map = buffer
    .map_readable()
    .map_err(|e| GStreamerInputError::PipelineError(format!("无法映射缓冲区: {}", e)))?;
  let data = map.as_slice();

  if width == 0 || height == 0 {
    return Err(GStreamerInputError::VideoInfoError);
  }
  let row = width as usize * 3;
  let expected = stride * (height as usize - 1) + row;
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  // 每行可能有对齐填充，按 stride 逐行拷贝
  let mut pixels = Vec::with_capacity(row * height as usize);
  for y in 0..height as usize {
    let line = &data[y * stride..y * stride + row];
    match video_info.format() {
      gst_video::VideoFormat::Rgb => pixels.extend_from_slice(line),
      gst_video::VideoFormat::Bgr => line
        .chunks_exact(3)
        .for_each(|bgr| pixels.extend_from_slice(&[bgr[2], bgr[1], bgr[0]])),
      _ => return Err(GStreamerInputError::UnsupportedFormat),
    }
  }

  let image = RgbImage::from_raw(width, height, pixels)
    .ok_or_else(|| GStreamerInputError::PipelineError("帧数据长度错误".to_string()))?;
  Ok(VideoFrame { image, fps })
}
