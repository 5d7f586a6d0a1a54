// 该文件是 Chepai （车牌） 项目的一部分。
// src/geometry.rs - 边界框几何工具
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

/// 像素坐标下的轴对齐边界框 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

/// 裁剪用的整数矩形，保证位于图像内部且非空
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// YOLO 标注格式：中心点与宽高，均为相对图像尺寸的比例
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloBox {
  pub cx: f32,
  pub cy: f32,
  pub width: f32,
  pub height: f32,
}

impl BBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  pub fn from_array(bbox: [f32; 4]) -> Self {
    Self::new(bbox[0], bbox[1], bbox[2], bbox[3])
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  /// 是否满足 `x1 < x2` 且 `y1 < y2`
  pub fn is_valid(&self) -> bool {
    self.x1 < self.x2 && self.y1 < self.y2
  }

  /// 判断 `inner` 是否完全落在本框内，边界按闭区间处理，可附加像素容差。
  pub fn contains(&self, inner: &BBox, tolerance: f32) -> bool {
    inner.x1 >= self.x1 - tolerance
      && inner.y1 >= self.y1 - tolerance
      && inner.x2 <= self.x2 + tolerance
      && inner.y2 <= self.y2 + tolerance
  }

  /// 平移，用于把裁剪图内的坐标映射回原图
  pub fn translate(&self, dx: f32, dy: f32) -> Self {
    Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
  }

  /// 转为图像内的整数裁剪区域。
  ///
  /// 坐标按整数截断后再夹取到 `[0, width] x [0, height]`，
  /// 夹取后为空的区域返回 `None`。
  pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<PixelRect> {
    let clamp = |v: f32, max: u32| -> u32 {
      if v.is_nan() {
        return 0;
      }
      (v as i64).clamp(0, max as i64) as u32
    };

    let x1 = clamp(self.x1, width);
    let y1 = clamp(self.y1, height);
    let x2 = clamp(self.x2, width);
    let y2 = clamp(self.y2, height);

    if x1 >= x2 || y1 >= y2 {
      return None;
    }

    Some(PixelRect {
      x: x1,
      y: y1,
      width: x2 - x1,
      height: y2 - y1,
    })
  }

  /// 归一化为 YOLO 标注
  pub fn to_yolo(&self, width: u32, height: u32) -> YoloBox {
    let (w, h) = (width as f32, height as f32);
    YoloBox {
      cx: ((self.x1 + self.x2) / 2.0) / w,
      cy: ((self.y1 + self.y2) / 2.0) / h,
      width: self.width() / w,
      height: self.height() / h,
    }
  }

  pub fn iou(&self, other: &BBox) -> f32 {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = self.area() + other.area() - intersection;

    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

impl YoloBox {
  /// 单行 YOLO 标签记录，保留 6 位小数
  pub fn to_label_line(&self, class_id: u32) -> String {
    format!(
      "{} {:.6} {:.6} {:.6} {:.6}",
      class_id, self.cx, self.cy, self.width, self.height
    )
  }
}

/// 按类别的非极大值抑制。
///
/// `boxes` 为 `(框, 分数, 类别)`，返回按分数降序保留下来的元素。
pub fn nms(mut boxes: Vec<(BBox, f32, u32)>, iou_threshold: f32) -> Vec<(BBox, f32, u32)> {
  boxes.sort_by(|a, b| b.1.total_cmp(&a.1));

  let mut keep: Vec<(BBox, f32, u32)> = Vec::with_capacity(boxes.len());
  for candidate in boxes {
    let suppressed = keep
      .iter()
      .any(|kept| kept.2 == candidate.2 && kept.0.iou(&candidate.0) >= iou_threshold);
    if !suppressed {
      keep.push(candidate);
    }
  }
  keep
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contains_inner_box() {
    let plate = BBox::new(10.0, 10.0, 100.0, 40.0);
    assert!(plate.contains(&BBox::new(20.0, 15.0, 30.0, 35.0), 0.0));
    assert!(!plate.contains(&BBox::new(5.0, 15.0, 30.0, 35.0), 0.0));
    assert!(!plate.contains(&BBox::new(200.0, 200.0, 210.0, 210.0), 0.0));
  }

  #[test]
  fn contains_is_inclusive_on_boundary() {
    let plate = BBox::new(10.0, 10.0, 100.0, 40.0);
    assert!(plate.contains(&plate, 0.0));
    assert!(plate.contains(&BBox::new(10.0, 10.0, 50.0, 40.0), 0.0));
    assert!(!plate.contains(&BBox::new(9.999, 10.0, 50.0, 40.0), 0.0));
  }

  #[test]
  fn contains_honours_tolerance() {
    let plate = BBox::new(10.0, 10.0, 100.0, 40.0);
    let poking_out = BBox::new(8.0, 9.0, 102.0, 41.0);
    assert!(!plate.contains(&poking_out, 0.0));
    assert!(!plate.contains(&poking_out, 1.0));
    assert!(plate.contains(&poking_out, 2.0));
  }

  #[test]
  fn pixel_rect_truncates_and_clamps() {
    let rect = BBox::new(-5.7, 3.9, 120.2, 50.99).to_pixel_rect(100, 60).unwrap();
    assert_eq!(
      rect,
      PixelRect {
        x: 0,
        y: 3,
        width: 100,
        height: 47
      }
    );
  }

  #[test]
  fn pixel_rect_rejects_empty_regions() {
    assert!(BBox::new(10.2, 10.0, 10.8, 20.0).to_pixel_rect(100, 100).is_none());
    assert!(BBox::new(150.0, 10.0, 180.0, 20.0).to_pixel_rect(100, 100).is_none());
  }

  #[test]
  fn translate_maps_crop_to_image() {
    let in_crop = BBox::new(1.0, 2.0, 3.0, 4.0);
    assert_eq!(in_crop.translate(10.0, 20.0), BBox::new(11.0, 22.0, 13.0, 24.0));
  }

  #[test]
  fn yolo_normalisation() {
    let yolo = BBox::new(100.0, 50.0, 300.0, 150.0).to_yolo(400, 200);
    assert!((yolo.cx - 0.5).abs() < 1e-6);
    assert!((yolo.cy - 0.5).abs() < 1e-6);
    assert!((yolo.width - 0.5).abs() < 1e-6);
    assert!((yolo.height - 0.5).abs() < 1e-6);
    assert_eq!(yolo.to_label_line(0), "0 0.500000 0.500000 0.500000 0.500000");
  }

  #[test]
  fn iou_cases() {
    let a = BBox::new(10.0, 10.0, 60.0, 60.0);
    let b = BBox::new(30.0, 30.0, 80.0, 80.0);
    let far = BBox::new(100.0, 100.0, 150.0, 150.0);
    let iou = a.iou(&b);
    assert!(iou > 0.0 && iou < 1.0);
    assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    assert_eq!(a.iou(&far), 0.0);
  }

  #[test]
  fn nms_keeps_best_per_class() {
    let boxes = vec![
      (BBox::new(10.0, 10.0, 60.0, 60.0), 0.8, 0),
      (BBox::new(12.0, 12.0, 62.0, 62.0), 0.9, 0),
      (BBox::new(12.0, 12.0, 62.0, 62.0), 0.7, 1),
      (BBox::new(100.0, 100.0, 150.0, 150.0), 0.85, 0),
    ];
    let kept = nms(boxes, 0.45);
    assert_eq!(kept.len(), 3);
    assert_eq!(kept[0].1, 0.9);
    assert_eq!(kept[1].1, 0.85);
    assert_eq!(kept[2].2, 1);
  }
}
