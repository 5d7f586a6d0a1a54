// 该文件是 Chepai （车牌） 项目的一部分。
// src/reconstruct.rs - 车牌文本重建
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

//! 识别模型给出的是无序的字符框集合，阅读顺序只由水平位置决定。
//! 这里按左边界排序后逐个解码拼接。

use std::cmp::Reverse;
use std::str::FromStr;

use crate::{codec::CharacterCodec, model::DetectItem};

/// 字符排列方向。
///
/// 默认从左到右（左边界升序）。波斯文车牌实际从右向左阅读，
/// 但训练标注按左到右书写，因此默认值保持升序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingOrder {
  #[default]
  LeftToRight,
  RightToLeft,
}

impl FromStr for ReadingOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "ltr" | "left-to-right" => Ok(ReadingOrder::LeftToRight),
      "rtl" | "right-to-left" => Ok(ReadingOrder::RightToLeft),
      other => Err(format!("未知的阅读顺序: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct PlateTextReconstructor {
  codec: CharacterCodec,
  order: ReadingOrder,
}

impl PlateTextReconstructor {
  pub fn new(codec: CharacterCodec, order: ReadingOrder) -> Self {
    Self { codec, order }
  }

  pub fn codec(&self) -> &CharacterCodec {
    &self.codec
  }

  pub fn order(&self) -> ReadingOrder {
    self.order
  }

  /// 按阅读顺序返回字符检测的引用。
  ///
  /// 排序键是左边界截断后的整数值，排序稳定，同一列上的字符保持模型输出顺序。
  pub fn sorted<'a>(&self, detections: &'a [DetectItem]) -> Vec<&'a DetectItem> {
    let mut sorted: Vec<&DetectItem> = detections.iter().collect();
    match self.order {
      ReadingOrder::LeftToRight => sorted.sort_by_key(|item| left_key(item)),
      ReadingOrder::RightToLeft => sorted.sort_by_key(|item| Reverse(left_key(item))),
    }
    sorted
  }

  pub fn reconstruct(&self, detections: &[DetectItem]) -> String {
    self
      .sorted(detections)
      .into_iter()
      .map(|item| self.codec.decode(item.class_id))
      .collect()
  }
}

fn left_key(item: &DetectItem) -> i64 {
  item.bbox.x1 as i64
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::BBox;

  fn abc() -> PlateTextReconstructor {
    let codec = CharacterCodec::from_symbols(["A", "B", "C"]).unwrap();
    PlateTextReconstructor::new(codec, ReadingOrder::LeftToRight)
  }

  fn at(x1: f32, class_id: u32) -> DetectItem {
    DetectItem::new(class_id, 0.9, BBox::new(x1, 5.0, x1 + 8.0, 25.0))
  }

  #[test]
  fn empty_detections_give_empty_text() {
    assert_eq!(abc().reconstruct(&[]), "");
  }

  #[test]
  fn sorted_by_left_edge() {
    let detections = [at(50.0, 0), at(10.0, 1), at(30.0, 2)];
    assert_eq!(abc().reconstruct(&detections), "BCA");
  }

  #[test]
  fn output_is_independent_of_input_order() {
    let a = [at(50.0, 0), at(10.0, 1), at(30.0, 2)];
    let b = [at(30.0, 2), at(50.0, 0), at(10.0, 1)];
    let c = [at(10.0, 1), at(30.0, 2), at(50.0, 0)];
    let r = abc();
    assert_eq!(r.reconstruct(&a), r.reconstruct(&b));
    assert_eq!(r.reconstruct(&b), r.reconstruct(&c));
  }

  #[test]
  fn ties_keep_detection_order() {
    // 10.2 与 10.9 截断后同为 10
    let detections = [at(10.9, 2), at(10.2, 0), at(5.0, 1)];
    assert_eq!(abc().reconstruct(&detections), "BCA");
  }

  #[test]
  fn unknown_class_is_dropped() {
    let detections = [at(10.0, 0), at(20.0, 99), at(30.0, 1)];
    assert_eq!(abc().reconstruct(&detections), "AB");
  }

  #[test]
  fn right_to_left_reverses() {
    let codec = CharacterCodec::from_symbols(["A", "B", "C"]).unwrap();
    let r = PlateTextReconstructor::new(codec, ReadingOrder::RightToLeft);
    let detections = [at(50.0, 0), at(10.0, 1), at(30.0, 2)];
    assert_eq!(r.reconstruct(&detections), "ACB");
  }

  #[test]
  fn reading_order_parses() {
    assert_eq!("rtl".parse::<ReadingOrder>(), Ok(ReadingOrder::RightToLeft));
    assert_eq!("LTR".parse::<ReadingOrder>(), Ok(ReadingOrder::LeftToRight));
    assert!("up".parse::<ReadingOrder>().is_err());
  }
}
