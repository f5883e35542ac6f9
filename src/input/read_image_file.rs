// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{Clock, FrameSource, Pacer},
  query_flag, query_param,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 单张图片作为帧源，按需重复若干次
///
/// 文件内容原样作为编码帧交出，解码在编码器中完成。
pub struct ImageFileInput {
  bytes: Box<[u8]>,
  remaining: Option<u64>,
  index: u64,
  pacer: Pacer,
  clock: Clock,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url.path();
    let bytes = std::fs::read(path)?;
    info!("读取图像文件: {} ({} 字节)", path, bytes.len());

    let repeat = if query_flag(url, "loop") {
      None
    } else {
      Some(query_param(url, "repeat").unwrap_or(1))
    };

    Ok(ImageFileInput::from_bytes(bytes)
      .repeat(repeat)
      .fps(query_param(url, "fps")))
  }
}

impl ImageFileInput {
  pub fn from_bytes(bytes: Vec<u8>) -> Self {
    Self {
      bytes: bytes.into_boxed_slice(),
      remaining: Some(1),
      index: 0,
      pacer: Pacer::new(None),
      clock: Clock::new(),
    }
  }

  /// `None` 表示无限重复
  pub fn repeat(mut self, times: Option<u64>) -> Self {
    self.remaining = times;
    self
  }

  pub fn fps(mut self, fps: Option<f64>) -> Self {
    self.pacer = Pacer::new(fps);
    self
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        return None;
      }
      *remaining -= 1;
    }

    self.pacer.wait();
    let frame =
      Frame::encoded(self.index, self.bytes.to_vec()).with_timestamp(self.clock.elapsed_ms());
    debug!("产生第 {} 帧", self.index);
    self.index += 1;
    Some(frame)
  }
}

impl FrameSource for ImageFileInput {}
