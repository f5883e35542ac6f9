// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, pipeline::Classification};

/// 展示端，只在持有它的线程上调用
pub trait Present {
  type Error;
  fn display_label(&mut self, classification: &Classification) -> Result<(), Self::Error>;
  fn display_error(&mut self, message: &str) -> Result<(), Self::Error>;
}

/// 推理线程交给展示线程的消息
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationEvent {
  Label(Classification),
  Error(String),
}

impl PresentationEvent {
  pub fn present_to<P: Present>(&self, output: &mut P) -> Result<(), P::Error> {
    match self {
      PresentationEvent::Label(classification) => output.display_label(classification),
      PresentationEvent::Error(message) => output.display_error(message),
    }
  }
}

mod console;
pub use self::console::{ConsoleOutput, ConsoleOutputError};

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("控制台输出错误: {0}")]
  ConsoleOutputError(#[from] ConsoleOutputError),
  #[cfg(feature = "directory_record")]
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Console(ConsoleOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecord(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      <ConsoleOutput as FromUrlWithScheme>::SCHEME => {
        Ok(OutputWrapper::Console(<ConsoleOutput>::from_url(url)?))
      }
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecord(
        DirectoryRecordOutput::from_url(url)?,
      )),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Present for OutputWrapper {
  type Error = OutputError;

  fn display_label(&mut self, classification: &Classification) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => output
        .display_label(classification)
        .map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => output
        .display_label(classification)
        .map_err(OutputError::from),
    }
  }

  fn display_error(&mut self, message: &str) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => output.display_error(message).map_err(OutputError::from),
      #[cfg(feature = "directory_record")]
      OutputWrapper::DirectoryRecord(output) => {
        output.display_error(message).map_err(OutputError::from)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn console_scheme_is_selected() {
    let url = Url::parse("console://").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Console(_))
    ));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://127.0.0.1:8554/live").unwrap();
    match OutputWrapper::from_url(&url) {
      Err(OutputError::SchemeMismatch(scheme)) => assert_eq!(scheme, "rtsp"),
      _ => panic!("expected a scheme mismatch"),
    }
  }
}
