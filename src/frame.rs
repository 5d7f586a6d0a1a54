// 该文件是 Chepai （车牌） 项目的一部分。
// src/frame.rs - NCHW 帧定义
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

use image::{RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

/// 归一化到 `[0, 1]` 的 RGB 平面格式张量，布局为 `[1, 3, H, W]`
#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  width: usize,
  height: usize,
  data: Box<[f32]>,
}

impl RgbNchwFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let data = vec![0f32; RGB_CHANNELS * width * height].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  /// 把图像缩放到 `width x height` 后转为 NCHW。
  ///
  /// 返回帧以及原图相对输入尺寸的缩放比例 `(scale_x, scale_y)`，
  /// 用于把模型输出坐标换算回原图。
  pub fn from_rgb_image_resized(image: &RgbImage, width: u32, height: u32) -> (Self, (f32, f32)) {
    let scale = (
      image.width() as f32 / width as f32,
      image.height() as f32 / height as f32,
    );
    let frame = if image.dimensions() == (width, height) {
      Self::from(image)
    } else {
      let resized = image::imageops::resize(image, width, height, FilterType::Triangle);
      Self::from(&resized)
    };
    (frame, scale)
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }
}

impl AsMut<[f32]> for RgbNchwFrame {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl From<&RgbImage> for RgbNchwFrame {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut frame = RgbNchwFrame::with_shape(height as usize, width as usize);
    let plane = frame.width * frame.height;
    let slice = frame.as_mut();

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y as usize) * (width as usize) + (x as usize);
      for c in 0..RGB_CHANNELS {
        slice[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    frame
  }
}
