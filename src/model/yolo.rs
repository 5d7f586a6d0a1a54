// 该文件是 Chepai （车牌） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 模型
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

//! Ultralytics 导出的 YOLO ONNX 模型。
//!
//! 输出张量形状为 `[1, 4 + 类别数, 候选数]`，前四行是输入尺度下的
//! `cx, cy, w, h`，其后是每个类别的分数。车牌检测与字符识别共用同一实现，
//! 只是加载的权重不同。
//!
//! URL 格式：`yolo:///path/to/model.onnx?confidence=0.25&iou=0.45&input_size=640`

use std::path::PathBuf;
use std::sync::Mutex;

use image::RgbImage;
use ndarray::Array4;
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::TensorRef,
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNchwFrame,
  geometry::{BBox, nms},
  model::{DetectItem, DetectResult, Model},
  url_file_path, url_query,
};

const YOLO_DEFAULT_INPUT_SIZE: u32 = 640;
const YOLO_DEFAULT_CONFIDENCE: f32 = 0.25;
const YOLO_DEFAULT_IOU: f32 = 0.45;
const YOLO_DEFAULT_MAX_DETECTIONS: usize = 300;
const YOLO_DEFAULT_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum YoloError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型文件不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] ndarray::ShapeError),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
}

pub struct YoloBuilder {
  model_path: PathBuf,
  input_size: u32,
  confidence: f32,
  iou: f32,
  max_detections: usize,
  threads: usize,
}

impl FromUrlWithScheme for YoloBuilder {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for YoloBuilder {
  type Error = YoloError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(YoloBuilder {
      model_path: url_file_path(url),
      input_size: url_query(url, "input_size").unwrap_or(YOLO_DEFAULT_INPUT_SIZE),
      confidence: url_query(url, "confidence").unwrap_or(YOLO_DEFAULT_CONFIDENCE),
      iou: url_query(url, "iou").unwrap_or(YOLO_DEFAULT_IOU),
      max_detections: url_query(url, "max_detections").unwrap_or(YOLO_DEFAULT_MAX_DETECTIONS),
      threads: url_query(url, "threads").unwrap_or(YOLO_DEFAULT_THREADS),
    })
  }
}

impl YoloBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      input_size: YOLO_DEFAULT_INPUT_SIZE,
      confidence: YOLO_DEFAULT_CONFIDENCE,
      iou: YOLO_DEFAULT_IOU,
      max_detections: YOLO_DEFAULT_MAX_DETECTIONS,
      threads: YOLO_DEFAULT_THREADS,
    }
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.confidence = confidence;
    self
  }

  pub fn iou(mut self, iou: f32) -> Self {
    self.iou = iou;
    self
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn build(self) -> Result<Yolo, YoloError> {
    if !self.model_path.is_file() {
      return Err(YoloError::ModelNotFound(self.model_path));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()?
      .with_optimization_level(GraphOptimizationLevel::Level3)?
      .with_intra_threads(self.threads)?
      .commit_from_file(&self.model_path)?;

    let output_name = session
      .outputs
      .first()
      .map(|output| output.name.clone())
      .ok_or_else(|| YoloError::ModelInvalid("模型没有输出".to_string()))?;
    if session.inputs.len() != 1 {
      return Err(YoloError::ModelInvalid(format!(
        "预期模型输入数量为 1, 实际为 {}",
        session.inputs.len()
      )));
    }
    info!(
      "模型加载完成: 输入尺寸 {}, 置信度阈值 {}, NMS 阈值 {}",
      self.input_size, self.confidence, self.iou
    );

    Ok(Yolo {
      session: Mutex::new(session),
      output_name,
      input_size: self.input_size,
      confidence: self.confidence,
      iou: self.iou,
      max_detections: self.max_detections,
    })
  }
}

/// ONNX Runtime 会话在 `run` 时需要可变借用，这里用互斥锁串行化调用，
/// 因此同一模型可以在批处理的多个工作线程之间共享。
pub struct Yolo {
  session: Mutex<Session>,
  output_name: String,
  input_size: u32,
  confidence: f32,
  iou: f32,
  max_detections: usize,
}

impl Model for Yolo {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = YoloError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (frame, scale) =
      RgbNchwFrame::from_rgb_image_resized(input, self.input_size, self.input_size);
    let [n, c, h, w] = frame.shape();
    let array = Array4::from_shape_vec((n, c, h, w), frame.into_vec())?;

    let now = std::time::Instant::now();
    let (shape, data) = {
      let mut session = self
        .session
        .lock()
        .map_err(|_| YoloError::SessionPoisoned)?;
      let outputs = session.run(ort::inputs![TensorRef::from_array_view(array.view())?])?;
      let (shape, data) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
      let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
      (shape, data.to_vec())
    };
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let items = self.postprocess(&shape, &data, scale, input.dimensions())?;
    Ok(DetectResult::from(items))
  }
}

impl Yolo {
  fn postprocess(
    &self,
    shape: &[usize],
    data: &[f32],
    (scale_x, scale_y): (f32, f32),
    (width, height): (u32, u32),
  ) -> Result<Vec<DetectItem>, YoloError> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] <= 4 {
      return Err(YoloError::ModelInvalid(format!(
        "输出形状应为 [1, 4 + 类别数, 候选数]，实际为 {:?}",
        shape
      )));
    }
    let rows = shape[1];
    let candidates = shape[2];
    if data.len() != rows * candidates {
      return Err(YoloError::ModelInvalid(format!(
        "输出数据长度 {} 与形状 {:?} 不符",
        data.len(),
        shape
      )));
    }
    let at = |row: usize, i: usize| data[row * candidates + i];

    let mut boxes = Vec::new();
    for i in 0..candidates {
      let (class_id, score) = (4..rows)
        .map(|row| (row - 4, at(row, i)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0));
      if score < self.confidence {
        continue;
      }

      let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
      let bbox = BBox::new(
        ((cx - w / 2.0) * scale_x).clamp(0.0, width as f32),
        ((cy - h / 2.0) * scale_y).clamp(0.0, height as f32),
        ((cx + w / 2.0) * scale_x).clamp(0.0, width as f32),
        ((cy + h / 2.0) * scale_y).clamp(0.0, height as f32),
      );
      if bbox.is_valid() {
        boxes.push((bbox, score, class_id as u32));
      }
    }

    let items: Vec<DetectItem> = nms(boxes, self.iou)
      .into_iter()
      .take(self.max_detections)
      .map(|(bbox, score, class_id)| DetectItem::new(class_id, score, bbox))
      .collect();
    debug!("检测到 {} 个目标", items.len());
    Ok(items)
  }
}
