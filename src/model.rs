// 该文件是 Chepai （车牌） 项目的一部分。
// src/model.rs - 模型
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

use crate::geometry::BBox;

/// 推理能力。车牌检测器与字符识别器都以此接口注入流水线，
/// 实现方需要保证 `infer` 不修改自身可观察状态。
pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: u32,
  pub score: f32,
  /// 输入图像像素坐标 `[x_min, y_min, x_max, y_max]`
  pub bbox: BBox,
}

impl DetectItem {
  pub fn new(class_id: u32, score: f32, bbox: BBox) -> Self {
    Self {
      class_id,
      score,
      bbox,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<M: Model + ?Sized> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

#[cfg(feature = "onnx")]
mod yolo;
#[cfg(feature = "onnx")]
pub use self::yolo::{Yolo, YoloBuilder, YoloError};
