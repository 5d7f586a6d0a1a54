// 该文件是 Chepai （车牌） 项目的一部分。
// src/bin/plate_dataset.rs - 数据集标注转换
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
use clap::{Parser, Subcommand};
use tracing::info;

use chepai::dataset::{
  LabelDeriver, PLATE_REGION_NAME, YoloConverter, convert_yolo_dir, generate_label_csv,
};

/// 车牌数据集工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 从字符标注生成车牌文本 CSV
  Labels {
    /// XML 标注目录，可多次指定
    #[arg(long = "dir", value_name = "DIR", required = true)]
    dirs: Vec<PathBuf>,
    /// 输出 CSV 文件
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
    /// 车牌区域对象名称
    #[arg(long, default_value = PLATE_REGION_NAME)]
    region_name: String,
    /// 包含判断的像素容差
    #[arg(long, default_value = "0")]
    tolerance: f32,
  },
  /// 把车牌区域转换为 YOLO 检测标签
  Yolo {
    /// XML 标注目录
    #[arg(long, value_name = "DIR")]
    xml_dir: PathBuf,
    /// 标签输出目录
    #[arg(long, value_name = "DIR")]
    label_dir: PathBuf,
    /// 车牌区域对象名称
    #[arg(long, default_value = PLATE_REGION_NAME)]
    region_name: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  match args.command {
    Command::Labels {
      dirs,
      output,
      region_name,
      tolerance,
    } => {
      let deriver = LabelDeriver::default()
        .with_region_name(region_name)
        .with_tolerance(tolerance);
      let count = generate_label_csv(&dirs, &output, &deriver)
        .with_context(|| format!("生成标签失败: {}", output.display()))?;
      info!("共 {} 条车牌标签", count);
    }
    Command::Yolo {
      xml_dir,
      label_dir,
      region_name,
    } => {
      let converter = YoloConverter::default().with_region_name(region_name);
      let count = convert_yolo_dir(&xml_dir, &label_dir, &converter)
        .with_context(|| format!("转换失败: {}", xml_dir.display()))?;
      info!("共 {} 个 YOLO 标签", count);
    }
  }

  Ok(())
}
