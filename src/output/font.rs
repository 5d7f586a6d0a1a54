// 该文件是 Chepai （车牌） 项目的一部分。
// src/output/font.rs - 字体资源
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

//! 标注文字使用的字体。
//!
//! 优先加载 TrueType 字体；字体文件缺失或无法解析时退回内置的 5x7 点阵字体，
//! 绘制流程不会因为字体而失败。点阵字体只覆盖 ASCII 数字与字母，
//! 波斯数字借用对应的阿拉伯数字字形，其余可见字符画成实心方块。

use std::path::{Path, PathBuf};
use std::sync::Once;

use ab_glyph::{FontVec, PxScale};
use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_FONT_SIZE: f32 = 30.0;

static FALLBACK_WARNING: Once = Once::new();

#[derive(Error, Debug)]
pub enum FontError {
  #[error("未指定字体文件")]
  NotConfigured,
  #[error("无法读取字体文件 {0}: {1}")]
  IoError(PathBuf, std::io::Error),
  #[error("无效的字体文件 {0}")]
  InvalidFont(PathBuf),
}

/// 加载后只读，可在多个工作线程间共享
pub enum FontResource {
  TrueType { font: FontVec, scale: PxScale },
  Builtin { dot: u32 },
}

impl std::fmt::Debug for FontResource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FontResource::TrueType { scale, .. } => f
        .debug_struct("TrueType")
        .field("scale", &scale.y)
        .finish(),
      FontResource::Builtin { dot } => f.debug_struct("Builtin").field("dot", dot).finish(),
    }
  }
}

impl FontResource {
  /// 加载字体，失败时记录一次警告并使用内置字体
  pub fn load(path: Option<&Path>, size: f32) -> Self {
    match Self::try_load(path, size) {
      Ok(font) => font,
      Err(e) => {
        FALLBACK_WARNING.call_once(|| warn!("字体加载失败，使用内置字体: {}", e));
        Self::builtin(size)
      }
    }
  }

  pub fn try_load(path: Option<&Path>, size: f32) -> Result<Self, FontError> {
    let path = path.ok_or(FontError::NotConfigured)?;
    let data = std::fs::read(path).map_err(|e| FontError::IoError(path.to_path_buf(), e))?;
    let font = FontVec::try_from_vec(data).map_err(|_| FontError::InvalidFont(path.to_path_buf()))?;
    info!("加载字体: {} ({}px)", path.display(), size);
    Ok(FontResource::TrueType {
      font,
      scale: PxScale::from(size),
    })
  }

  /// 内置点阵字体，一个点阵单元放大为 `dot x dot` 像素，字形高度约等于 `size`
  pub fn builtin(size: f32) -> Self {
    let dot = (size / CELL_HEIGHT as f32).round().max(1.0) as u32;
    FontResource::Builtin { dot }
  }

  pub fn is_builtin(&self) -> bool {
    matches!(self, FontResource::Builtin { .. })
  }

  /// 文本渲染后的宽高（像素）
  pub fn measure(&self, text: &str) -> (u32, u32) {
    match self {
      FontResource::TrueType { font, scale } => text_size(*scale, font, text),
      FontResource::Builtin { dot } => {
        let cells = text.chars().filter(|&c| advances(c)).count() as u32;
        if cells == 0 {
          return (0, 0);
        }
        (cells * CELL_WIDTH * dot, CELL_HEIGHT * dot)
      }
    }
  }

  /// 以 `(x, y)` 为左上角绘制文本，超出画布的部分被裁掉
  pub fn draw(&self, canvas: &mut RgbaImage, color: Rgba<u8>, x: i32, y: i32, text: &str) {
    match self {
      FontResource::TrueType { font, scale } => {
        draw_text_mut(canvas, color, x, y, *scale, font, text);
      }
      FontResource::Builtin { dot } => {
        let dot = *dot as i32;
        let mut pen = x;
        for c in text.chars().filter(|&c| advances(c)) {
          let rows = glyph(c);
          for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
              if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                let left = pen + col as i32 * dot;
                let top = y + row as i32 * dot;
                fill_dot(canvas, color, left, top, dot);
              }
            }
          }
          pen += CELL_WIDTH as i32 * dot;
        }
      }
    }
  }
}

const GLYPH_WIDTH: u32 = 5;
const CELL_WIDTH: u32 = 6;
const CELL_HEIGHT: u32 = 8;

fn fill_dot(canvas: &mut RgbaImage, color: Rgba<u8>, left: i32, top: i32, dot: i32) {
  let (w, h) = (canvas.width() as i32, canvas.height() as i32);
  for py in top.max(0)..(top + dot).min(h) {
    for px in left.max(0)..(left + dot).min(w) {
      canvas.get_pixel_mut(px as u32, py as u32).blend(&color);
    }
  }
}

/// 零宽字符与组合附标不占位置
fn advances(c: char) -> bool {
  !matches!(c, '\u{200b}'..='\u{200f}' | '\u{064b}'..='\u{065f}' | '\u{0670}') && !c.is_control()
}

fn glyph(c: char) -> [u8; 7] {
  let c = match c {
    '\u{06f0}'..='\u{06f9}' => char::from(b'0' + (c as u32 - 0x06f0) as u8),
    '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
    c => c.to_ascii_uppercase(),
  };
  match c {
    ' ' => [0x00; 7],
    '-' => [0x00, 0x00, 0x00, 0x1f, 0x00, 0x00, 0x00],
    '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
    '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
    '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
    '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
    '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
    '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
    '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
    '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
    '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
    '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
    'A' => [0x0e, 0x11, 0x11, 0x11, 0x1f, 0x11, 0x11],
    'B' => [0x1e, 0x11, 0x11, 0x1e, 0x11, 0x11, 0x1e],
    'C' => [0x0e, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0e],
    'D' => [0x1c, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1c],
    'E' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x1f],
    'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
    'G' => [0x0e, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0f],
    'H' => [0x11, 0x11, 0x11, 0x1f, 0x11, 0x11, 0x11],
    'I' => [0x0e, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0e],
    'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0c],
    'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
    'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1f],
    'M' => [0x11, 0x1b, 0x15, 0x15, 0x11, 0x11, 0x11],
    'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
    'O' => [0x0e, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
    'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
    'Q' => [0x0e, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0d],
    'R' => [0x1e, 0x11, 0x11, 0x1e, 0x14, 0x12, 0x11],
    'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
    'T' => [0x1f, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
    'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0e],
    'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0a, 0x04],
    'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0a],
    'X' => [0x11, 0x11, 0x0a, 0x04, 0x0a, 0x11, 0x11],
    'Y' => [0x11, 0x11, 0x11, 0x0a, 0x04, 0x04, 0x04],
    'Z' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1f],
    _ => [0x1f; 7],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_font_falls_back_to_builtin() {
    let font = FontResource::load(Some(Path::new("/nonexistent/Vazir-Bold.ttf")), 30.0);
    assert!(font.is_builtin());
    let font = FontResource::load(None, 30.0);
    assert!(font.is_builtin());
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"not a font").unwrap();
    assert!(matches!(
      FontResource::try_load(Some(&path), 30.0),
      Err(FontError::InvalidFont(_))
    ));
  }

  #[test]
  fn builtin_measure_scales_with_size() {
    let font = FontResource::builtin(16.0);
    assert_eq!(font.measure("AB"), (2 * 6 * 2, 8 * 2));
    assert_eq!(font.measure(""), (0, 0));
    // 零宽连接符不占位置
    assert_eq!(font.measure("ه\u{200d}"), font.measure("ه"));
  }

  #[test]
  fn builtin_draw_changes_pixels_inside_canvas_only() {
    let font = FontResource::builtin(8.0);
    let mut canvas = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
    font.draw(&mut canvas, Rgba([255, 215, 0, 255]), -3, 0, "1۱");
    assert!(canvas.pixels().any(|p| p.0[0] >= 254 && p.0[1].abs_diff(215) <= 1));
    // 超出边界的绘制不应触发越界
    font.draw(&mut canvas, Rgba([255, 0, 0, 255]), 18, 8, "WWW");
  }
}
