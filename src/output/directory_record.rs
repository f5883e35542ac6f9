// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  label::WithLabel,
  output::Present,
  pipeline::Classification,
  query_flag,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把每个展示事件追加到 `<目录>/<年>/<月>/<日>.jsonl`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  skip_errors: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    Ok(DirectoryRecordOutput::new(uri.path()).skip_errors(query_flag(uri, "skip-errors")))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      skip_errors: false,
    }
  }

  pub fn skip_errors(mut self, skip_errors: bool) -> Self {
    self.skip_errors = skip_errors;
    self
  }

  pub fn record_path(&self, now: &DateTime<Utc>) -> PathBuf {
    self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}.jsonl", now.day()))
  }

  fn append(&self, now: DateTime<Utc>, record: Value) -> Result<(), DirectoryRecordOutputError> {
    let path = self.record_path(&now);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    let line = serde_json::to_string(&record)?;
    writeln!(file, "{}", line)?;
    debug!("写入记录: {}", path.display());
    Ok(())
  }
}

impl Present for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn display_label(&mut self, classification: &Classification) -> Result<(), Self::Error> {
    let now = Utc::now();
    let label = classification.label();
    self.append(
      now,
      json!({
        "time": now.to_rfc3339(),
        "frame": classification.frame_index,
        "label": label.to_label_str(),
        "label_id": label.to_label_id(),
        "score": classification.score(),
        "elapsed_ms": classification.elapsed.as_secs_f64() * 1000.0,
      }),
    )
  }

  fn display_error(&mut self, message: &str) -> Result<(), Self::Error> {
    if self.skip_errors {
      return Ok(());
    }
    let now = Utc::now();
    self.append(
      now,
      json!({
        "time": now.to_rfc3339(),
        "error": message,
      }),
    )
  }
}
