// 该文件是 Chepai （车牌） 项目的一部分。
// src/task.rs - 任务调度
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
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use image::RgbImage;
use rayon::prelude::*;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::{
  input::{IMAGE_EXTENSIONS, InputError, MediaKind, list_files},
  model::{DetectResult, Model},
  output::{Render, SaveImageFileError, SaveImageFileOutput, save_image},
  pipeline::{DetectionRecognitionPipeline, PipelineError},
};

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("输入错误: {0}")]
  Input(#[from] InputError),
  #[error("无法创建输出目录 {0}: {1}")]
  CreateOutputDir(PathBuf, #[source] std::io::Error),
  #[error("无法创建工作线程池: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
  #[error("处理失败: {0}")]
  Pipeline(#[from] PipelineError),
  #[error("保存结果失败: {0}")]
  Save(#[from] SaveImageFileError),
  #[error("写入报告失败: {0}")]
  Report(#[from] std::io::Error),
  #[error("报告序列化失败: {0}")]
  Json(#[from] serde_json::Error),
  #[error("未启用视频支持，无法处理 {0}")]
  VideoUnsupported(PathBuf),
  #[cfg(feature = "video")]
  #[error("视频输入错误: {0}")]
  VideoInput(#[from] crate::input::GStreamerInputError),
  #[cfg(feature = "video")]
  #[error("视频输出错误: {0}")]
  VideoOutput(#[from] crate::output::GStreamerVideoOutputError),
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
  Recognized {
    text: String,
    plates: usize,
    output: PathBuf,
  },
  Failed {
    stage: String,
    error: String,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
  pub file_name: String,
  pub outcome: BatchOutcome,
}

impl BatchItem {
  pub fn text(&self) -> Option<&str> {
    match &self.outcome {
      BatchOutcome::Recognized { text, .. } => Some(text),
      BatchOutcome::Failed { .. } => None,
    }
  }

  pub fn is_failed(&self) -> bool {
    matches!(self.outcome, BatchOutcome::Failed { .. })
  }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
  pub started_at: DateTime<Local>,
  pub input_dir: PathBuf,
  pub output_dir: PathBuf,
  pub elapsed: Duration,
  /// 与输入文件顺序一致
  pub items: Vec<BatchItem>,
}

impl BatchReport {
  pub fn succeeded(&self) -> usize {
    self.items.iter().filter(|item| !item.is_failed()).count()
  }

  pub fn failed(&self) -> usize {
    self.items.iter().filter(|item| item.is_failed()).count()
  }

  pub fn to_json(&self) -> serde_json::Value {
    let items: Vec<serde_json::Value> = self
      .items
      .iter()
      .map(|item| match &item.outcome {
        BatchOutcome::Recognized {
          text,
          plates,
          output,
        } => json!({
          "file": item.file_name,
          "text": text,
          "plates": plates,
          "output": output.to_string_lossy(),
        }),
        BatchOutcome::Failed { stage, error } => json!({
          "file": item.file_name,
          "stage": stage,
          "error": error,
        }),
      })
      .collect();

    json!({
      "started_at": self.started_at.to_rfc3339(),
      "input_dir": self.input_dir.to_string_lossy(),
      "output_dir": self.output_dir.to_string_lossy(),
      "elapsed_ms": self.elapsed.as_millis() as u64,
      "total": self.items.len(),
      "succeeded": self.succeeded(),
      "failed": self.failed(),
      "items": items,
    })
  }

  pub fn write_json(&self, path: &Path) -> Result<(), TaskError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&self.to_json())?;
    std::fs::write(path, content)?;
    info!("批处理报告已写入: {}", path.display());
    Ok(())
  }
}

/// 目录批处理。单个文件失败只记录并跳过，不影响其他文件。
#[derive(Debug, Clone)]
pub struct BatchRunner {
  workers: usize,
  extensions: Vec<String>,
}

impl Default for BatchRunner {
  fn default() -> Self {
    Self {
      workers: 1,
      extensions: IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
    }
  }
}

impl BatchRunner {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.extensions = extensions.into_iter().map(Into::into).collect();
    self
  }

  pub fn run<D, R>(
    &self,
    input_dir: &Path,
    output_dir: &Path,
    pipeline: &DetectionRecognitionPipeline<D, R>,
  ) -> Result<BatchReport, TaskError>
  where
    D: Model<Input = RgbImage, Output = DetectResult> + Sync,
    D::Error: std::error::Error + Send + Sync + 'static,
    R: Model<Input = RgbImage, Output = DetectResult> + Sync,
    R::Error: std::error::Error + Send + Sync + 'static,
  {
    let started_at = Local::now();
    let now = Instant::now();

    let extensions: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
    let files = list_files(input_dir, &extensions)?;
    std::fs::create_dir_all(output_dir)
      .map_err(|e| TaskError::CreateOutputDir(output_dir.to_path_buf(), e))?;
    info!(
      "开始批处理: {} 个文件, {} 个工作线程",
      files.len(),
      self.workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(self.workers)
      .build()?;
    let items: Vec<BatchItem> = pool.install(|| {
      files
        .par_iter()
        .map(|path| process_one(path, output_dir, pipeline))
        .collect()
    });

    let report = BatchReport {
      started_at,
      input_dir: input_dir.to_path_buf(),
      output_dir: output_dir.to_path_buf(),
      elapsed: now.elapsed(),
      items,
    };
    info!(
      "批处理完成: 成功 {}, 失败 {}, 耗时 {:.2?}",
      report.succeeded(),
      report.failed(),
      report.elapsed
    );
    Ok(report)
  }
}

fn process_one<D, R>(
  path: &Path,
  output_dir: &Path,
  pipeline: &DetectionRecognitionPipeline<D, R>,
) -> BatchItem
where
  D: Model<Input = RgbImage, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  R: Model<Input = RgbImage, Output = DetectResult>,
  R::Error: std::error::Error + Send + Sync + 'static,
{
  let file_name = path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.to_string_lossy().into_owned());

  let outcome = match pipeline.process_path(path) {
    Ok(reading) => {
      let output = output_dir.join(&file_name);
      match save_image(&reading.image, &output) {
        Ok(()) => {
          info!("{}: {}", file_name, reading.text);
          BatchOutcome::Recognized {
            text: reading.text,
            plates: reading.plates.len(),
            output,
          }
        }
        Err(e) => {
          error!("{} 保存失败: {}", file_name, e);
          BatchOutcome::Failed {
            stage: "保存结果".to_string(),
            error: e.to_string(),
          }
        }
      }
    }
    Err(e) => {
      error!("{} 处理失败 [{}]: {}", file_name, e.stage(), e);
      BatchOutcome::Failed {
        stage: e.stage().to_string(),
        error: e.to_string(),
      }
    }
  };

  BatchItem { file_name, outcome }
}

/// 单个媒体文件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum MediaOutcome {
  Image { text: String, output: PathBuf },
  Video { frames: u64, failed_frames: u64, output: PathBuf },
}

/// 处理单个图像或视频文件，按扩展名分派
#[derive(Debug, Default)]
pub struct OneShotTask {
  frame_number: Option<usize>,
}

impl OneShotTask {
  /// 视频最多处理的帧数
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn run<D, R>(
    self,
    input: &Path,
    output: &Path,
    pipeline: &DetectionRecognitionPipeline<D, R>,
  ) -> Result<MediaOutcome, TaskError>
  where
    D: Model<Input = RgbImage, Output = DetectResult>,
    D::Error: std::error::Error + Send + Sync + 'static,
    R: Model<Input = RgbImage, Output = DetectResult>,
    R::Error: std::error::Error + Send + Sync + 'static,
  {
    match MediaKind::from_path(input)? {
      MediaKind::Image => {
        info!("处理图像: {}", input.display());
        let reading = pipeline.process_path(input)?;
        SaveImageFileOutput::new(output).render_result(&reading)?;
        Ok(MediaOutcome::Image {
          text: reading.text,
          output: output.to_path_buf(),
        })
      }
      MediaKind::Video => self.run_video(input, output, pipeline),
    }
  }

  #[cfg(not(feature = "video"))]
  fn run_video<D, R>(
    self,
    input: &Path,
    _output: &Path,
    _pipeline: &DetectionRecognitionPipeline<D, R>,
  ) -> Result<MediaOutcome, TaskError> {
    Err(TaskError::VideoUnsupported(input.to_path_buf()))
  }

  #[cfg(feature = "video")]
  fn run_video<D, R>(
    self,
    input: &Path,
    output: &Path,
    pipeline: &DetectionRecognitionPipeline<D, R>,
  ) -> Result<MediaOutcome, TaskError>
  where
    D: Model<Input = RgbImage, Output = DetectResult>,
    D::Error: std::error::Error + Send + Sync + 'static,
    R: Model<Input = RgbImage, Output = DetectResult>,
    R::Error: std::error::Error + Send + Sync + 'static,
  {
    use std::thread;
    use tracing::warn;

    use crate::input::GStreamerInput;
    use crate::output::GStreamerVideoOutput;

    info!("处理视频: {}", input.display());
    let frames = GStreamerInput::open(input)?;

    let (tx, rx) = std::sync::mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法注册中断处理: {}", e);
    }

    let mut writer: Option<GStreamerVideoOutput> = None;
    let mut frame_index = 0usize;
    let mut failed_frames = 0u64;
    for frame in frames {
      frame_index += 1;
      let now = Instant::now();
      let annotated = match pipeline.process_image(&frame.image) {
        Ok(reading) => {
          info!("第 {} 帧: {}", frame_index, reading.text);
          reading.image
        }
        Err(e) => {
          warn!("第 {} 帧处理失败，原样输出: {}", frame_index, e);
          failed_frames += 1;
          frame.image
        }
      };

      let sink = match writer.as_mut() {
        Some(sink) => sink,
        None => writer.insert(GStreamerVideoOutput::new(
          output,
          annotated.width(),
          annotated.height(),
          frame.fps,
        )?),
      };
      sink.push_image(&annotated)?;
      info!("第 {} 帧完成，耗时: {:.2?}", frame_index, now.elapsed());

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    let frames = match writer {
      Some(sink) => sink.finish()?,
      None => {
        warn!("视频中没有可读取的帧: {}", input.display());
        0
      }
    };
    Ok(MediaOutcome::Video {
      frames,
      failed_frames,
      output: output.to_path_buf(),
    })
  }
}
