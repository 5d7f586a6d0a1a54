// 该文件是 Chepai （车牌） 项目的一部分。
// src/pipeline.rs - 检测与识别流水线
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

//! 两阶段车牌识别：
//!
//! 1. 车牌检测器在整幅图像上给出车牌框；
//! 2. 按检测器输出顺序逐个裁剪车牌，字符识别器给出裁剪图内的字符框；
//! 3. 字符按水平位置重建为文本，在原图上绘制标注；
//! 4. 各车牌文本以单个空格连接。
//!
//! 流水线本身不做磁盘写入，保存结果由调用方负责。

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  codec::CharacterCodec,
  geometry::{BBox, PixelRect},
  input::{InputError, load_image},
  model::{DetectItem, DetectResult, Model},
  output::{
    draw::{Draw, LabelStyle},
    font::{DEFAULT_FONT_SIZE, FontResource},
    shape::TextShaping,
  },
  reconstruct::{PlateTextReconstructor, ReadingOrder},
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  LoadImage,
  Detect,
  Recognize,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::LoadImage => "读取图像",
      Stage::Detect => "车牌检测",
      Stage::Recognize => "字符识别",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("读取图像失败: {0}")]
  LoadImage(#[from] InputError),
  #[error("车牌检测失败: {0}")]
  Detect(#[source] BoxedError),
  #[error("第 {index} 个车牌字符识别失败: {source}")]
  Recognize {
    index: usize,
    #[source]
    source: BoxedError,
  },
}

impl PipelineError {
  pub fn stage(&self) -> Stage {
    match self {
      PipelineError::LoadImage(_) => Stage::LoadImage,
      PipelineError::Detect(_) => Stage::Detect,
      PipelineError::Recognize { .. } => Stage::Recognize,
    }
  }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub font_size: f32,
  /// 为空或加载失败时使用内置字体
  pub font_path: Option<PathBuf>,
  pub reading_order: ReadingOrder,
  pub shaping: TextShaping,
  pub style: LabelStyle,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      font_size: DEFAULT_FONT_SIZE,
      font_path: None,
      reading_order: ReadingOrder::default(),
      shaping: TextShaping::default(),
      style: LabelStyle::default(),
    }
  }
}

/// 检测到的车牌区域
#[derive(Debug, Clone, PartialEq)]
pub struct PlateRegion {
  /// 原图像素坐标
  pub bbox: BBox,
  pub score: f32,
  /// 实际裁剪的整数区域
  pub crop: PixelRect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedPlate {
  pub region: PlateRegion,
  /// 按阅读顺序排列的字符检测，坐标位于裁剪图内
  pub characters: Vec<DetectItem>,
  pub text: String,
}

impl RecognizedPlate {
  /// 字符框换算到原图坐标
  pub fn characters_in_image(&self) -> Vec<DetectItem> {
    let (dx, dy) = (self.region.crop.x as f32, self.region.crop.y as f32);
    self
      .characters
      .iter()
      .map(|item| DetectItem {
        bbox: item.bbox.translate(dx, dy),
        ..item.clone()
      })
      .collect()
  }
}

/// 一幅图像的识别结果
#[derive(Debug, Clone)]
pub struct PlateReading {
  /// 各车牌文本按检测顺序以单个空格连接
  pub text: String,
  pub plates: Vec<RecognizedPlate>,
  /// 标注后的图像；没有车牌时与输入相同
  pub image: RgbImage,
}

pub struct DetectionRecognitionPipeline<D, R> {
  detector: D,
  recognizer: R,
  reconstructor: PlateTextReconstructor,
  draw: Draw,
}

impl<D, R> DetectionRecognitionPipeline<D, R>
where
  D: Model<Input = RgbImage, Output = DetectResult>,
  D::Error: std::error::Error + Send + Sync + 'static,
  R: Model<Input = RgbImage, Output = DetectResult>,
  R::Error: std::error::Error + Send + Sync + 'static,
{
  /// 模型在进程启动时加载一次后注入；字体在这里加载，之后只读
  pub fn new(detector: D, recognizer: R, codec: CharacterCodec, config: PipelineConfig) -> Self {
    let font = FontResource::load(config.font_path.as_deref(), config.font_size);
    Self {
      detector,
      recognizer,
      reconstructor: PlateTextReconstructor::new(codec, config.reading_order),
      draw: Draw::new(font, config.shaping, config.style),
    }
  }

  pub fn process_path(&self, path: &Path) -> Result<PlateReading, PipelineError> {
    debug!("[{}] {}", Stage::LoadImage, path.display());
    let image = load_image(path)?;
    self.process_image(&image)
  }

  pub fn process_image(&self, image: &RgbImage) -> Result<PlateReading, PipelineError> {
    let (width, height) = image.dimensions();

    debug!("[{}] {}x{}", Stage::Detect, width, height);
    let now = Instant::now();
    let detections = self
      .detector
      .infer(image)
      .map_err(|e| PipelineError::Detect(Box::new(e)))?;
    debug!("车牌检测完成，耗时: {:.2?}", now.elapsed());

    let regions: Vec<PlateRegion> = detections
      .iter()
      .filter_map(|item| match item.bbox.to_pixel_rect(width, height) {
        Some(crop) => Some(PlateRegion {
          bbox: item.bbox,
          score: item.score,
          crop,
        }),
        None => {
          warn!("车牌框 {:?} 裁剪后为空，已跳过", item.bbox.to_array());
          None
        }
      })
      .collect();

    if regions.is_empty() {
      info!("未检测到车牌");
      return Ok(PlateReading {
        text: String::new(),
        plates: Vec::new(),
        image: image.clone(),
      });
    }

    let mut canvas = DynamicImage::ImageRgb8(image.clone()).into_rgba8();
    let mut plates = Vec::with_capacity(regions.len());
    for (index, region) in regions.into_iter().enumerate() {
      debug!(
        "[{}] 车牌 {}: {:?}",
        Stage::Recognize,
        index,
        region.bbox.to_array()
      );
      let PixelRect {
        x,
        y,
        width,
        height,
      } = region.crop;
      let crop = image::imageops::crop_imm(image, x, y, width, height).to_image();

      let characters = self
        .recognizer
        .infer(&crop)
        .map_err(|e| PipelineError::Recognize {
          index,
          source: Box::new(e),
        })?;
      let text = self.reconstructor.reconstruct(&characters.items);
      let ordered: Vec<DetectItem> = self
        .reconstructor
        .sorted(&characters.items)
        .into_iter()
        .cloned()
        .collect();
      debug!("车牌 {} 识别出 {} 个字符: {}", index, ordered.len(), text);

      self.draw.draw_labeled_box(&mut canvas, &region.bbox, &text);
      plates.push(RecognizedPlate {
        region,
        characters: ordered,
        text,
      });
    }

    let text = plates
      .iter()
      .map(|plate| plate.text.as_str())
      .collect::<Vec<_>>()
      .join(" ");
    info!("识别结果: {}", text);

    Ok(PlateReading {
      text,
      plates,
      image: DynamicImage::ImageRgba8(canvas).into_rgb8(),
    })
  }
}
