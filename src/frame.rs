// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

/// 原始像素排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
  Rgb,
  Bgr,
  Rgba,
  Bgra,
}

impl PixelFormat {
  pub fn bytes_per_pixel(&self) -> usize {
    match self {
      PixelFormat::Rgb | PixelFormat::Bgr => 3,
      PixelFormat::Rgba | PixelFormat::Bgra => 4,
    }
  }

  /// 像素内 (R, G, B) 三个通道的字节偏移
  pub(crate) fn rgb_offsets(&self) -> [usize; 3] {
    match self {
      PixelFormat::Rgb | PixelFormat::Rgba => [0, 1, 2],
      PixelFormat::Bgr | PixelFormat::Bgra => [2, 1, 0],
    }
  }
}

/// 帧的像素载荷
#[derive(Debug, Clone)]
pub enum Pixels {
  /// 未压缩的 HWC 像素缓冲
  Raw {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Box<[u8]>,
  },
  /// JPEG / PNG 等编码后的图像字节
  Encoded(Box<[u8]>),
}

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
  /// 像素载荷
  pub pixels: Pixels,
}

impl Frame {
  pub fn raw(index: u64, width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
    Self {
      index,
      timestamp_ms: 0,
      pixels: Pixels::Raw {
        width,
        height,
        format,
        data: data.into_boxed_slice(),
      },
    }
  }

  pub fn encoded(index: u64, bytes: Vec<u8>) -> Self {
    Self {
      index,
      timestamp_ms: 0,
      pixels: Pixels::Encoded(bytes.into_boxed_slice()),
    }
  }

  /// 以单一颜色填充的 RGB 帧
  pub fn filled(index: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
    let data = rgb
      .iter()
      .copied()
      .cycle()
      .take(width as usize * height as usize * 3)
      .collect();
    Self::raw(index, width, height, PixelFormat::Rgb, data)
  }

  pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
    self.timestamp_ms = timestamp_ms;
    self
  }

  /// 声明的像素尺寸；编码帧在解码前尺寸未知
  pub fn dimensions(&self) -> Option<(u32, u32)> {
    match &self.pixels {
      Pixels::Raw { width, height, .. } => Some((*width, *height)),
      Pixels::Encoded(_) => None,
    }
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Frame::raw(0, width, height, PixelFormat::Rgb, image.into_raw())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn filled_frame_has_expected_length() {
    let frame = Frame::filled(3, 4, 2, [1, 2, 3]);
    assert_eq!(frame.index, 3);
    assert_eq!(frame.dimensions(), Some((4, 2)));
    match frame.pixels {
      Pixels::Raw { data, format, .. } => {
        assert_eq!(format, PixelFormat::Rgb);
        assert_eq!(data.len(), 4 * 2 * 3);
        assert_eq!(&data[..6], &[1, 2, 3, 1, 2, 3]);
      }
      Pixels::Encoded(_) => panic!("expected raw pixels"),
    }
  }

  #[test]
  fn bgr_offsets_are_reversed() {
    assert_eq!(PixelFormat::Bgr.rgb_offsets(), [2, 1, 0]);
    assert_eq!(PixelFormat::Bgra.bytes_per_pixel(), 4);
  }
}
