// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

/// 帧源：按顺序产生帧，并带有启动/停止生命周期
pub trait FrameSource: Iterator<Item = Frame> {
  fn start(&mut self) -> Result<(), InputError> {
    Ok(())
  }

  fn stop(&mut self) -> Result<(), InputError> {
    Ok(())
  }
}

/// GStreamer 输入的 URL 方案，未启用 `gstreamer_input` 时也用于改写参数
pub const GSTREAMER_SCHEME: &str = "gst";

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

mod directory;
pub use self::directory::{DirectoryInput, DirectoryInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Directory input error: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  Directory(DirectoryInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::Directory(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

impl FrameSource for InputWrapper {
  fn start(&mut self) -> Result<(), InputError> {
    match self {
      InputWrapper::ReadImageFile(input) => input.start(),
      InputWrapper::Directory(input) => input.start(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.start(),
    }
  }

  fn stop(&mut self) -> Result<(), InputError> {
    match self {
      InputWrapper::ReadImageFile(input) => input.stop(),
      InputWrapper::Directory(input) => input.stop(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.stop(),
    }
  }
}

/// 按固定帧率节流，用于模拟摄像头的出帧节奏
#[derive(Debug, Clone)]
pub(crate) struct Pacer {
  interval: Option<Duration>,
  next: Option<Instant>,
}

impl Pacer {
  pub(crate) fn new(fps: Option<f64>) -> Self {
    let interval = fps
      .filter(|fps| fps.is_finite() && *fps > 0.0)
      .map(|fps| Duration::from_secs_f64(1.0 / fps));
    Self {
      interval,
      next: None,
    }
  }

  pub(crate) fn wait(&mut self) {
    let Some(interval) = self.interval else {
      return;
    };
    let now = Instant::now();
    if let Some(next) = self.next
      && next > now
    {
      std::thread::sleep(next - now);
    }
    self.next = Some(self.next.map_or(now, |next| next.max(now)) + interval);
  }
}

/// 自创建起经过的毫秒数，作为帧时间戳
#[derive(Debug, Clone, Copy)]
pub(crate) struct Clock(Instant);

impl Clock {
  pub(crate) fn new() -> Self {
    Clock(Instant::now())
  }

  pub(crate) fn elapsed_ms(&self) -> u64 {
    self.0.elapsed().as_millis() as u64
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("v4l2:///dev/video0").unwrap();
    match InputWrapper::from_url(&url) {
      Err(InputError::SchemeMismatch(scheme)) => assert_eq!(scheme, "v4l2"),
      _ => panic!("expected a scheme mismatch"),
    }
  }

  #[test]
  fn pacer_without_fps_does_not_sleep() {
    let mut pacer = Pacer::new(None);
    let now = Instant::now();
    for _ in 0..1000 {
      pacer.wait();
    }
    assert!(now.elapsed() < Duration::from_millis(100));
  }

  #[test]
  fn pacer_spaces_out_frames() {
    let mut pacer = Pacer::new(Some(100.0));
    let now = Instant::now();
    for _ in 0..4 {
      pacer.wait();
    }
    // 第一帧立即放行，其后每帧间隔 10ms
    assert!(now.elapsed() >= Duration::from_millis(30));
  }

  #[test]
  fn invalid_fps_is_ignored() {
    assert!(Pacer::new(Some(0.0)).interval.is_none());
    assert!(Pacer::new(Some(f64::NAN)).interval.is_none());
  }
}
