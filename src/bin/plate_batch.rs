// 该文件是 Chepai （车牌） 项目的一部分。
// src/bin/plate_batch.rs - 目录批量识别
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use chepai::{
  FromUrl,
  codec::CharacterCodec,
  model::YoloBuilder,
  pipeline::{DetectionRecognitionPipeline, PipelineConfig},
  reconstruct::ReadingOrder,
  task::BatchRunner,
};

/// 车牌识别：批量处理目录中的图像
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 车牌检测模型
  #[arg(long, value_name = "MODEL")]
  pub detector: Url,
  /// 字符识别模型
  #[arg(long, value_name = "MODEL")]
  pub recognizer: Url,
  /// 输入目录
  #[arg(long, value_name = "DIR")]
  pub input: PathBuf,
  /// 输出目录，标注图像与输入同名
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
  /// 并行工作线程数
  #[arg(long, default_value = "1", value_name = "N")]
  pub workers: usize,
  /// 处理的扩展名
  #[arg(long, value_delimiter = ',', default_value = "jpg,jpeg,png")]
  pub extensions: Vec<String>,
  /// JSON 报告输出路径
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,
  /// 字符表文件
  #[arg(long, value_name = "FILE")]
  pub alphabet: Option<PathBuf>,
  /// TrueType 字体文件，例如 Vazir-Bold.ttf。
  /// 未指定时使用内置点阵字体，只能显示数字与拉丁字母，波斯字母会画成方块
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
  /// 字号
  #[arg(long, default_value = "30", value_name = "PX")]
  pub font_size: f32,
  /// 字符阅读顺序：ltr 或 rtl
  #[arg(long, default_value = "ltr", value_name = "ORDER")]
  pub reading_order: ReadingOrder,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.detector);
  info!("识别模型: {}", args.recognizer);

  let detector = YoloBuilder::from_url(&args.detector)?
    .build()
    .context("加载车牌检测模型失败")?;
  let recognizer = YoloBuilder::from_url(&args.recognizer)?
    .build()
    .context("加载字符识别模型失败")?;
  let codec = match &args.alphabet {
    Some(path) => CharacterCodec::from_file(path)
      .with_context(|| format!("读取字符表失败: {}", path.display()))?,
    None => CharacterCodec::persian(),
  };

  let config = PipelineConfig {
    font_size: args.font_size,
    font_path: args.font,
    reading_order: args.reading_order,
    ..Default::default()
  };
  let pipeline = DetectionRecognitionPipeline::new(detector, recognizer, codec, config);

  let report = BatchRunner::default()
    .with_workers(args.workers)
    .with_extensions(args.extensions)
    .run(&args.input, &args.output, &pipeline)
    .with_context(|| format!("批处理失败: {}", args.input.display()))?;

  if let Some(path) = &args.report {
    report
      .write_json(path)
      .with_context(|| format!("写入报告失败: {}", path.display()))?;
  }

  if report.failed() > 0 {
    warn!("{} 个文件处理失败", report.failed());
  }
  info!(
    "完成: 成功 {} / 共 {}",
    report.succeeded(),
    report.items.len()
  );

  Ok(())
}
