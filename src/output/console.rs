// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/output/console.rs - 控制台输出
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

use std::io::{self, Stderr, Stdout, Write};

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, label::WasteLabel, output::Present, pipeline::Classification,
  query_flag,
};

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] io::Error),
}

/// 标签写到标准输出，错误提示写到标准错误
pub struct ConsoleOutput<O: Write = Stdout, E: Write = Stderr> {
  out: O,
  err: E,
  only_changes: bool,
  last_label: Option<WasteLabel>,
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }

    Ok(ConsoleOutput::with_writers(io::stdout(), io::stderr())
      .only_changes(query_flag(url, "only-changes")))
  }
}

impl<O: Write, E: Write> ConsoleOutput<O, E> {
  pub fn with_writers(out: O, err: E) -> Self {
    Self {
      out,
      err,
      only_changes: false,
      last_label: None,
    }
  }

  /// 只在标签变化时输出
  pub fn only_changes(mut self, only_changes: bool) -> Self {
    self.only_changes = only_changes;
    self
  }

  pub fn into_writers(self) -> (O, E) {
    (self.out, self.err)
  }
}

impl<O: Write, E: Write> Present for ConsoleOutput<O, E> {
  type Error = ConsoleOutputError;

  fn display_label(&mut self, classification: &Classification) -> Result<(), Self::Error> {
    let label = classification.label();
    if self.only_changes && self.last_label == Some(label) {
      debug!("第 {} 帧标签未变化: {}", classification.frame_index, label);
      return Ok(());
    }
    self.last_label = Some(label);

    writeln!(
      self.out,
      "{} ({:.1}%)",
      label,
      classification.score() * 100.0
    )?;
    self.out.flush()?;
    Ok(())
  }

  fn display_error(&mut self, message: &str) -> Result<(), Self::Error> {
    writeln!(self.err, "错误: {}", message)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decision::Decision;
  use std::time::Duration;

  fn classification(frame_index: u64, label: WasteLabel, score: f32) -> Classification {
    Classification {
      frame_index,
      decision: Decision {
        index: label as usize,
        label,
        score,
      },
      elapsed: Duration::from_millis(3),
    }
  }

  #[test]
  fn prints_label_and_errors() {
    let mut output = ConsoleOutput::with_writers(Vec::new(), Vec::new());
    output
      .display_label(&classification(0, WasteLabel::Recyclable, 0.875))
      .unwrap();
    output.display_error("帧编码失败").unwrap();

    let (out, err) = output.into_writers();
    assert_eq!(String::from_utf8(out).unwrap(), "Recyclable (87.5%)\n");
    assert_eq!(String::from_utf8(err).unwrap(), "错误: 帧编码失败\n");
  }

  #[test]
  fn only_changes_suppresses_repeats() {
    let mut output = ConsoleOutput::with_writers(Vec::new(), Vec::new()).only_changes(true);
    output
      .display_label(&classification(0, WasteLabel::Biohazard, 1.0))
      .unwrap();
    output
      .display_label(&classification(1, WasteLabel::Biohazard, 0.9))
      .unwrap();
    output
      .display_label(&classification(2, WasteLabel::Biodegradable, 0.5))
      .unwrap();

    let (out, _) = output.into_writers();
    assert_eq!(
      String::from_utf8(out).unwrap(),
      "Biohazard (100.0%)\nBiodegradable (50.0%)\n"
    );
  }

  #[test]
  fn parses_only_changes_flag() {
    let url = Url::parse("console://?only-changes").unwrap();
    let output = <ConsoleOutput>::from_url(&url).unwrap();
    assert!(output.only_changes);
  }
}
