// 该文件是 Chepai （车牌） 项目的一部分。
// src/bin/plate_oneshot.rs - 单个图像/视频识别
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
use tracing::info;
use url::Url;

use chepai::{
  FromUrl,
  codec::CharacterCodec,
  model::YoloBuilder,
  output::shape::TextShaping,
  pipeline::{DetectionRecognitionPipeline, PipelineConfig},
  reconstruct::ReadingOrder,
  task::{MediaOutcome, OneShotTask},
};

/// 车牌识别：处理单个图像或视频文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 车牌检测模型，例如 yolo:///models/plate.onnx?confidence=0.25
  #[arg(long, value_name = "MODEL")]
  pub detector: Url,
  /// 字符识别模型
  #[arg(long, value_name = "MODEL")]
  pub recognizer: Url,
  /// 输入文件（jpg/jpeg/png 或 mp4/avi/mov）
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,
  /// 输出文件
  #[arg(long, value_name = "FILE")]
  pub output: PathBuf,
  /// 字符表文件，每行一个符号；缺省使用波斯车牌字符表
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
  /// 关闭阿拉伯字母连写整形
  #[arg(long)]
  pub no_reshape: bool,
  /// 绘制前把从右向左的文字倒序
  #[arg(long)]
  pub visual_order: bool,
  /// 视频最多处理的帧数
  #[arg(long, value_name = "COUNT")]
  pub frames: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测模型: {}", args.detector);
  info!("识别模型: {}", args.recognizer);
  info!("输入: {}", args.input.display());
  info!("输出: {}", args.output.display());

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
    shaping: TextShaping {
      reshape: !args.no_reshape,
      visual_order: args.visual_order,
    },
    ..Default::default()
  };
  let pipeline = DetectionRecognitionPipeline::new(detector, recognizer, codec, config);

  let outcome = OneShotTask::default()
    .with_frame_number(args.frames)
    .run(&args.input, &args.output, &pipeline)
    .with_context(|| format!("处理失败: {}", args.input.display()))?;

  match outcome {
    MediaOutcome::Image { text, output } => {
      info!("结果已保存: {}", output.display());
      println!("{}", text);
    }
    MediaOutcome::Video {
      frames,
      failed_frames,
      output,
    } => {
      info!(
        "视频已保存: {} ({} 帧, {} 帧失败)",
        output.display(),
        frames,
        failed_frames
      );
    }
  }

  Ok(())
}
