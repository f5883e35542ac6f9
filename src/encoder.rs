// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/encoder.rs - 帧到输入张量的编码
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

use image::{ImageBuffer, Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::debug;

use crate::frame::{Frame, PixelFormat, Pixels};

pub const DEFAULT_IMAGE_SIZE: u32 = 224;
const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug)]
pub enum EncodingError {
  #[error("图像解码失败: {0}")]
  Decode(#[from] image::ImageError),
  #[error("缓冲区大小不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("帧尺寸为空: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("帧尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
  SizeMismatch {
    expected: u32,
    width: u32,
    height: u32,
  },
}

/// 帧尺寸与模型输入不一致时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResizePolicy {
  /// 缩放到模型输入尺寸
  #[default]
  Resize,
  /// 直接拒绝
  Strict,
}

/// NHWC 排列的 `[1, H, W, 3]` 浮点张量
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
  shape: [usize; 4],
  data: Box<[f32]>,
}

impl InputTensor {
  pub fn from_shape(shape: [usize; 4], data: Vec<f32>) -> Option<Self> {
    if shape.iter().product::<usize>() != data.len() {
      return None;
    }
    Some(Self {
      shape,
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data.into_vec()
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct TensorEncoder {
  image_size: u32,
  resize: ResizePolicy,
}

impl Default for TensorEncoder {
  fn default() -> Self {
    Self::new(DEFAULT_IMAGE_SIZE)
  }
}

impl TensorEncoder {
  pub fn new(image_size: u32) -> Self {
    Self {
      image_size,
      resize: ResizePolicy::default(),
    }
  }

  pub fn with_resize(mut self, resize: ResizePolicy) -> Self {
    self.resize = resize;
    self
  }

  pub fn image_size(&self) -> u32 {
    self.image_size
  }

  pub fn input_shape(&self) -> [usize; 4] {
    let size = self.image_size as usize;
    [1, size, size, RGB_CHANNELS]
  }

  pub fn encode(&self, frame: &Frame) -> Result<InputTensor, EncodingError> {
    let image = decode_pixels(&frame.pixels)?;
    let image = self.fit(image)?;

    let size = self.image_size as usize;
    let mut data = Vec::with_capacity(size * size * RGB_CHANNELS);
    for h in 0..self.image_size {
      for w in 0..self.image_size {
        let pixel = image.get_pixel(w, h);
        data.push(pixel[0] as f32 / 255.0);
        data.push(pixel[1] as f32 / 255.0);
        data.push(pixel[2] as f32 / 255.0);
      }
    }

    Ok(InputTensor {
      shape: self.input_shape(),
      data: data.into_boxed_slice(),
    })
  }

  fn fit(&self, image: RgbImage) -> Result<RgbImage, EncodingError> {
    let (width, height) = image.dimensions();
    if width == self.image_size && height == self.image_size {
      return Ok(image);
    }

    match self.resize {
      ResizePolicy::Strict => Err(EncodingError::SizeMismatch {
        expected: self.image_size,
        width,
        height,
      }),
      ResizePolicy::Resize => {
        debug!(
          "缩放帧 {}x{} -> {}x{}",
          width, height, self.image_size, self.image_size
        );
        Ok(imageops::resize(
          &image,
          self.image_size,
          self.image_size,
          imageops::FilterType::Triangle,
        ))
      }
    }
  }
}

/// 将帧载荷解码为 RGB 像素网格
pub fn decode_pixels(pixels: &Pixels) -> Result<RgbImage, EncodingError> {
  match pixels {
    Pixels::Encoded(bytes) => {
      let image = image::load_from_memory(bytes)?.to_rgb8();
      let (width, height) = image.dimensions();
      if width == 0 || height == 0 {
        return Err(EncodingError::EmptyFrame { width, height });
      }
      Ok(image)
    }
    Pixels::Raw {
      width,
      height,
      format,
      data,
    } => raw_to_rgb(*width, *height, *format, data),
  }
}

fn raw_to_rgb(
  width: u32,
  height: u32,
  format: PixelFormat,
  data: &[u8],
) -> Result<RgbImage, EncodingError> {
  if width == 0 || height == 0 {
    return Err(EncodingError::EmptyFrame { width, height });
  }

  let bpp = format.bytes_per_pixel();
  let expected = width as usize * height as usize * bpp;
  if data.len() != expected {
    return Err(EncodingError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let [r, g, b] = format.rgb_offsets();
  Ok(ImageBuffer::from_fn(width, height, |x, y| {
    let idx = (y as usize * width as usize + x as usize) * bpp;
    Rgb([data[idx + r], data[idx + g], data[idx + b]])
  }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn exact_size_frame_encodes_to_hw3_values_in_unit_range() {
    let size = 8;
    let data: Vec<u8> = (0..size * size * 3).map(|i| (i * 7 % 256) as u8).collect();
    let frame = Frame::raw(0, size, size, PixelFormat::Rgb, data);
    let tensor = TensorEncoder::new(size).encode(&frame).unwrap();

    assert_eq!(tensor.shape(), [1, 8, 8, 3]);
    assert_eq!(tensor.len(), 8 * 8 * 3);
    assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
  }

  #[test]
  fn white_and_black_frames() {
    let encoder = TensorEncoder::default();
    let white = encoder.encode(&Frame::filled(0, 224, 224, [255, 255, 255])).unwrap();
    assert_eq!(white.len(), 224 * 224 * 3);
    assert!(white.as_slice().iter().all(|v| *v == 1.0));

    let black = encoder.encode(&Frame::filled(0, 224, 224, [0, 0, 0])).unwrap();
    assert!(black.as_slice().iter().all(|v| *v == 0.0));
  }

  #[test]
  fn values_are_row_major_rgb() {
    // 第一行: 红、蓝; 第二行: 绿、灰
    let frame = Frame::raw(0, 2, 2, PixelFormat::Rgb, vec![
      255, 0, 0, 0, 0, 255, //
      0, 255, 0, 51, 102, 153,
    ]);
    let tensor = TensorEncoder::new(2).encode(&frame).unwrap();
    assert_eq!(tensor.as_slice(), &[
      1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
      0.0, 1.0, 0.0, 0.2, 0.4, 0.6,
    ]);
  }

  #[test]
  fn bgra_is_swizzled_to_rgb() {
    let frame = Frame::raw(0, 1, 1, PixelFormat::Bgra, vec![255, 0, 0, 128]);
    let tensor = TensorEncoder::new(1).encode(&frame).unwrap();
    assert_eq!(tensor.as_slice(), &[0.0, 0.0, 1.0]);
  }

  #[test]
  fn truncated_buffer_is_rejected() {
    let frame = Frame::raw(0, 4, 4, PixelFormat::Rgb, vec![0; 10]);
    let err = TensorEncoder::new(4).encode(&frame).unwrap_err();
    assert!(matches!(
      err,
      EncodingError::BufferSizeMismatch {
        expected: 48,
        actual: 10
      }
    ));
  }

  #[test]
  fn empty_frame_is_rejected() {
    let frame = Frame::raw(0, 0, 4, PixelFormat::Rgb, vec![]);
    let err = TensorEncoder::new(4).encode(&frame).unwrap_err();
    assert!(matches!(err, EncodingError::EmptyFrame { .. }));
  }

  #[test]
  fn corrupt_encoded_bytes_fail() {
    let frame = Frame::encoded(0, b"definitely not a jpeg".to_vec());
    let err = TensorEncoder::new(4).encode(&frame).unwrap_err();
    assert!(matches!(err, EncodingError::Decode(_)));
  }

  #[test]
  fn encoded_png_is_decoded_and_resized() {
    let image = RgbImage::from_pixel(10, 6, Rgb([255, 255, 255]));
    let mut bytes = Vec::new();
    image
      .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
      .unwrap();

    let tensor = TensorEncoder::new(4)
      .encode(&Frame::encoded(0, bytes))
      .unwrap();
    assert_eq!(tensor.shape(), [1, 4, 4, 3]);
    assert!(tensor.as_slice().iter().all(|v| (*v - 1.0).abs() < 0.01));
  }

  #[test]
  fn strict_policy_rejects_mis_sized_frames() {
    let encoder = TensorEncoder::new(4).with_resize(ResizePolicy::Strict);
    let err = encoder.encode(&Frame::filled(0, 5, 4, [1, 2, 3])).unwrap_err();
    assert!(matches!(
      err,
      EncodingError::SizeMismatch {
        expected: 4,
        width: 5,
        height: 4
      }
    ));
  }

  #[test]
  fn resize_policy_produces_configured_shape() {
    let encoder = TensorEncoder::new(4);
    let tensor = encoder.encode(&Frame::filled(0, 13, 7, [0, 0, 0])).unwrap();
    assert_eq!(tensor.shape(), [1, 4, 4, 3]);
    assert_eq!(tensor.len(), 48);
  }

  #[test]
  fn from_shape_checks_length() {
    assert!(InputTensor::from_shape([1, 2, 2, 3], vec![0.0; 12]).is_some());
    assert!(InputTensor::from_shape([1, 2, 2, 3], vec![0.0; 11]).is_none());
  }
}
