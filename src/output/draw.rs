// 该文件是 Chepai （车牌） 项目的一部分。
// src/output/draw.rs - 车牌识别结果可视化
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

use image::{Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
  rect::Rect,
};

use crate::{
  geometry::BBox,
  output::{font::FontResource, shape::TextShaping},
};

// 默认配色：半透明道奇蓝填充、实线描边、金色文字
const LABEL_FILL: [u8; 4] = [30, 144, 255, 70];
const LABEL_OUTLINE: [u8; 4] = [30, 144, 255, 255];
const LABEL_OUTLINE_WIDTH: u32 = 3;
const LABEL_TEXT_COLOR: [u8; 4] = [255, 215, 0, 255];
const LABEL_TEXT_BACKGROUND: [u8; 4] = [0, 0, 0, 0];
const LABEL_TEXT_PADDING: i32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelStyle {
  pub fill: Rgba<u8>,
  pub outline: Rgba<u8>,
  pub outline_width: u32,
  pub text_color: Rgba<u8>,
  /// 文字背景，透明时不绘制
  pub text_background: Rgba<u8>,
  pub text_padding: i32,
}

impl Default for LabelStyle {
  fn default() -> Self {
    Self {
      fill: Rgba(LABEL_FILL),
      outline: Rgba(LABEL_OUTLINE),
      outline_width: LABEL_OUTLINE_WIDTH,
      text_color: Rgba(LABEL_TEXT_COLOR),
      text_background: Rgba(LABEL_TEXT_BACKGROUND),
      text_padding: LABEL_TEXT_PADDING,
    }
  }
}

/// 标注绘制器。字体、整形方式与样式在构造时确定，之后只读。
#[derive(Debug)]
pub struct Draw {
  font: FontResource,
  shaping: TextShaping,
  style: LabelStyle,
}

impl Draw {
  pub fn new(font: FontResource, shaping: TextShaping, style: LabelStyle) -> Self {
    Self {
      font,
      shaping,
      style,
    }
  }

  /// 在 `bbox` 处绘制半透明高亮框，并在框上方写出 `text`。
  ///
  /// 框先画在独立的透明图层上再混合到原图，描边覆盖填充而不是叠加。
  /// 文本在测量之前完成整形，测量与绘制使用同一个字符串。
  /// 绘制过程不会失败，调用方看不到半成品。
  pub fn draw_labeled_box(&self, image: &mut RgbaImage, bbox: &BBox, text: &str) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
      return;
    }
    // 检测框可能越出画面，先与画布求交再分配图层
    let (max_x, max_y) = (width as i64 - 1, height as i64 - 1);
    let (x1, y1, x2, y2) = (
      (bbox.x1 as i64).clamp(0, max_x),
      (bbox.y1 as i64).clamp(0, max_y),
      (bbox.x2 as i64).min(max_x),
      (bbox.y2 as i64).min(max_y),
    );
    let outside = (bbox.x2 as i64) < 0
      || (bbox.y2 as i64) < 0
      || (bbox.x1 as i64) > max_x
      || (bbox.y1 as i64) > max_y;
    if outside || x2 < x1 || y2 < y1 {
      return;
    }
    let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);

    let (w, h) = ((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
    let mut layer = RgbaImage::new(w, h);
    draw_filled_rect_mut(&mut layer, Rect::at(0, 0).of_size(w, h), self.style.fill);
    for i in 0..self.style.outline_width {
      if 2 * i >= w || 2 * i >= h {
        break;
      }
      let rect = Rect::at(i as i32, i as i32).of_size(w - 2 * i, h - 2 * i);
      draw_hollow_rect_mut(&mut layer, rect, self.style.outline);
    }
    image::imageops::overlay(image, &layer, x1 as i64, y1 as i64);

    let shaped = self.shaping.apply(text);
    if shaped.is_empty() {
      return;
    }

    let (text_w, text_h) = self.font.measure(&shaped);
    let pad = self.style.text_padding;
    let tx1 = x1;
    let ty1 = (y1 - text_h as i32 - 2 * pad).max(0);

    if self.style.text_background[3] > 0 {
      let bw = (text_w as i32 + 2 * pad).max(1) as u32;
      let bh = (text_h as i32 + 2 * pad).max(1) as u32;
      let background = RgbaImage::from_pixel(bw, bh, self.style.text_background);
      image::imageops::overlay(image, &background, tx1 as i64, ty1 as i64);
    }

    self
      .font
      .draw(image, self.style.text_color, tx1 + pad, ty1 + pad, &shaped);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn close(a: [u8; 4], b: [u8; 4]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| x.abs_diff(*y) <= 1)
  }

  fn canvas() -> RgbaImage {
    RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]))
  }

  fn draw() -> Draw {
    Draw::new(
      FontResource::builtin(8.0),
      TextShaping::default(),
      LabelStyle {
        text_padding: 2,
        ..LabelStyle::default()
      },
    )
  }

  #[test]
  fn box_is_blended_and_outlined() {
    let mut image = canvas();
    draw().draw_labeled_box(&mut image, &BBox::new(100.0, 100.0, 150.0, 130.0), "");

    // 描边为不透明蓝色
    assert!(close(image.get_pixel(100, 100).0, [30, 144, 255, 255]));
    assert_eq!(image.get_pixel(152, 100).0, [0, 0, 0, 255]);
    // 内部为半透明混合，颜色介于背景与填充之间
    let inner = image.get_pixel(125, 115).0;
    assert!(inner[2] > 0 && inner[2] < 255);
    assert_eq!(inner[3], 255);
    // 框外不受影响
    assert_eq!(image.get_pixel(10, 10).0, [0, 0, 0, 255]);
  }

  #[test]
  fn text_is_drawn_above_the_box() {
    let mut image = canvas();
    draw().draw_labeled_box(&mut image, &BBox::new(20.0, 100.0, 80.0, 130.0), "AB");
    let gold = [255, 215, 0, 255];
    let text_rows: Vec<u32> = image
      .enumerate_pixels()
      .filter(|(_, _, p)| close(p.0, gold))
      .map(|(_, y, _)| y)
      .collect();
    assert!(!text_rows.is_empty());
    assert!(text_rows.iter().all(|&y| y < 100));
  }

  #[test]
  fn label_near_top_edge_is_clamped() {
    let mut image = canvas();
    draw().draw_labeled_box(&mut image, &BBox::new(20.0, 0.0, 80.0, 30.0), "A");
    let gold = [255, 215, 0, 255];
    assert!(image.pixels().any(|p| close(p.0, gold)));
  }

  #[test]
  fn degenerate_box_draws_nothing() {
    let mut image = canvas();
    let before = image.clone();
    draw().draw_labeled_box(&mut image, &BBox::new(50.0, 50.0, 40.0, 60.0), "A");
    assert_eq!(image, before);
    draw().draw_labeled_box(&mut image, &BBox::new(250.0, 10.0, 300.0, 60.0), "A");
    assert_eq!(image, before);
  }

  #[test]
  fn box_past_the_edge_is_clipped_to_canvas() {
    let mut image = canvas();
    draw().draw_labeled_box(
      &mut image,
      &BBox::new(150.0, 150.0, 200000.0, 200000.0),
      "A",
    );
    assert!(close(image.get_pixel(150, 150).0, [30, 144, 255, 255]));
    assert!(close(image.get_pixel(199, 199).0, [30, 144, 255, 255]));
    assert_eq!(image.get_pixel(10, 190).0, [0, 0, 0, 255]);

    let mut image = canvas();
    draw().draw_labeled_box(&mut image, &BBox::new(-3e9, 10.0, 3e9, 50.0), "A");
    assert!(close(image.get_pixel(0, 10).0, [30, 144, 255, 255]));
    assert_eq!(image.get_pixel(100, 120).0, [0, 0, 0, 255]);
  }
}
