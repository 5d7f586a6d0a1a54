// 该文件是 Chepai （车牌） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
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

//! # GStreamer 视频文件输出
//!
//! 把标注后的帧编码为视频文件，容器由扩展名决定：
//! `.mp4`、`.mov`（H.264 + MP4/QuickTime）、`.mkv`、`.avi`，其余默认 MP4。
//!
//! ## URL Scheme
//!
//! `gstvideo:///output.mp4?width=1280&height=720&fps=30`

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, output::Render, pipeline::PlateReading, url_file_path, url_query,
};

const DEFAULT_FPS: i32 = 30;
const EOS_TIMEOUT_SECONDS: u64 = 5;

#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("缺少视频尺寸参数")]
  MissingSize,
  #[error("GStreamer 错误: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer 操作失败: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("管道中找不到 appsrc 元素")]
  AppSrcNotFound,
  #[error("管道错误: {0}")]
  PipelineError(String),
  #[error("状态切换失败: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("帧尺寸 {actual:?} 与输出尺寸 {expected:?} 不一致")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  path: PathBuf,
  size: (u32, u32),
  fps: i32,
  frame_count: Mutex<u64>,
  finished: bool,
}

impl FromUrlWithScheme for GStreamerVideoOutput {
  const SCHEME: &'static str = "gstvideo";
}

impl FromUrl for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerVideoOutputError::SchemeMismatch);
    }
    let width = url_query(url, "width").ok_or(GStreamerVideoOutputError::MissingSize)?;
    let height = url_query(url, "height").ok_or(GStreamerVideoOutputError::MissingSize)?;
    let fps = url_query(url, "fps").unwrap_or(DEFAULT_FPS);
    Self::new(url_file_path(url), width, height, fps)
  }
}

fn encoder_description(path: &Path) -> &'static str {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);
  match extension.as_deref() {
    Some("mkv") => "x264enc speed-preset=fast ! h264parse ! matroskamux",
    Some("avi") => "x264enc speed-preset=fast ! avimux",
    Some("mov") => "x264enc speed-preset=fast ! h264parse ! qtmux",
    _ => "x264enc speed-preset=fast ! h264parse ! mp4mux",
  }
}

impl GStreamerVideoOutput {
  pub fn new(
    path: impl Into<PathBuf>,
    width: u32,
    height: u32,
    fps: i32,
  ) -> Result<Self, GStreamerVideoOutputError> {
    gst::init()?;
    let path = path.into();
    let fps = if fps > 0 { fps } else { DEFAULT_FPS };

    let pipeline_desc = format!(
      "appsrc name=src ! videoconvert ! video/x-raw,format=I420 ! {} ! filesink name=sink",
      encoder_description(&path)
    );
    info!("创建视频输出管道: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("无法创建管道".to_string()))?;

    // 路径单独设置，避免路径中的空格破坏管道描述
    let sink = pipeline
      .by_name("sink")
      .ok_or_else(|| GStreamerVideoOutputError::PipelineError("找不到 filesink".to_string()))?;
    sink.set_property("location", path.to_string_lossy().as_ref());

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcNotFound)?;

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(fps, 1))
      .build();
    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;
    info!(
      "视频输出已启动: {}x{} @ {} fps -> {}",
      width,
      height,
      fps,
      path.display()
    );

    Ok(Self {
      pipeline,
      appsrc,
      path,
      size: (width, height),
      fps,
      frame_count: Mutex::new(0),
      finished: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn push_image(&self, image: &RgbImage) -> Result<(), GStreamerVideoOutputError> {
    if image.dimensions() != self.size {
      return Err(GStreamerVideoOutputError::FrameSizeMismatch {
        expected: self.size,
        actual: image.dimensions(),
      });
    }

    let mut frame_count = self
      .frame_count
      .lock()
      .map_err(|_| GStreamerVideoOutputError::PipelineError("帧计数锁已损坏".to_string()))?;
    let frame_ns = 1_000_000_000 / self.fps as u64;

    let mut buffer = gst::Buffer::from_slice(image.as_raw().clone());
    if let Some(buffer_ref) = buffer.get_mut() {
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(*frame_count * frame_ns));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(frame_ns));
    }
    *frame_count += 1;

    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerVideoOutputError::PipelineError(format!("推送缓冲区失败: {:?}", e))
    })?;
    Ok(())
  }

  /// 发送 EOS 并等待封装完成，之后文件才可以播放
  pub fn finish(mut self) -> Result<u64, GStreamerVideoOutputError> {
    self.close()
  }

  fn close(&mut self) -> Result<u64, GStreamerVideoOutputError> {
    if self.finished {
      return Ok(self.frames());
    }
    self.finished = true;

    self.appsrc.end_of_stream().map_err(|e| {
      GStreamerVideoOutputError::PipelineError(format!("发送 EOS 失败: {:?}", e))
    })?;
    if let Some(bus) = self.pipeline.bus() {
      let _ = bus.timed_pop_filtered(
        gst::ClockTime::from_seconds(EOS_TIMEOUT_SECONDS),
        &[gst::MessageType::Eos, gst::MessageType::Error],
      );
    }
    self.pipeline.set_state(gst::State::Null)?;

    let frames = self.frames();
    info!(
      "视频输出已关闭: {}，共写入 {} 帧",
      self.path.display(),
      frames
    );
    Ok(frames)
  }

  fn frames(&self) -> u64 {
    self.frame_count.lock().map(|count| *count).unwrap_or(0)
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if let Err(e) = self.close() {
      warn!("关闭视频输出失败: {}", e);
    }
  }
}

impl Render<PlateReading> for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn render_result(&self, result: &PlateReading) -> Result<(), Self::Error> {
    self.push_image(&result.image)
  }
}
