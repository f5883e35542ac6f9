// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/input/directory.rs - 图像目录输入
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  input::{Clock, FrameSource, Pacer},
  query_flag, query_param,
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录中没有图像文件: {0}")]
  Empty(String),
}

/// 按文件名顺序读取目录中的图像文件
pub struct DirectoryInput {
  files: Vec<PathBuf>,
  cursor: usize,
  cycle: bool,
  index: u64,
  pacer: Pacer,
  clock: Clock,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "dir";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    Ok(
      DirectoryInput::open(url.path())?
        .cycle(query_flag(url, "loop"))
        .fps(query_param(url, "fps")),
    )
  }
}

impl DirectoryInput {
  pub fn open(directory: impl AsRef<Path>) -> Result<Self, DirectoryInputError> {
    let directory = directory.as_ref();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
      let path = entry?.path();
      if path.is_file() && is_image(&path) {
        files.push(path);
      }
    }
    files.sort();

    if files.is_empty() {
      return Err(DirectoryInputError::Empty(directory.display().to_string()));
    }
    info!("目录 {} 中共有 {} 张图像", directory.display(), files.len());

    Ok(Self {
      files,
      cursor: 0,
      cycle: false,
      index: 0,
      pacer: Pacer::new(None),
      clock: Clock::new(),
    })
  }

  /// 读完后从头开始
  pub fn cycle(mut self, cycle: bool) -> Self {
    self.cycle = cycle;
    self
  }

  pub fn fps(mut self, fps: Option<f64>) -> Self {
    self.pacer = Pacer::new(fps);
    self
  }

  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }
}

fn is_image(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
    .unwrap_or(false)
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 每轮最多尝试所有文件一次，避免全部不可读时空转
    for _ in 0..self.files.len() {
      if self.cursor >= self.files.len() {
        if !self.cycle {
          return None;
        }
        self.cursor = 0;
      }

      let path = &self.files[self.cursor];
      self.cursor += 1;
      match std::fs::read(path) {
        Ok(bytes) => {
          self.pacer.wait();
          debug!("第 {} 帧: {}", self.index, path.display());
          let frame = Frame::encoded(self.index, bytes).with_timestamp(self.clock.elapsed_ms());
          self.index += 1;
          return Some(frame);
        }
        Err(e) => warn!("无法读取图像文件 {}: {}", path.display(), e),
      }
    }
    None
  }
}

impl FrameSource for DirectoryInput {}

#[cfg(test)]
mod tests {
  use super::*;

  fn populate(dir: &Path) {
    std::fs::write(dir.join("b.png"), b"second").unwrap();
    std::fs::write(dir.join("a.JPG"), b"first").unwrap();
    std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();
  }

  #[test]
  fn yields_images_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let input = DirectoryInput::open(dir.path()).unwrap();
    assert_eq!(input.files().len(), 2);
    let frames: Vec<Frame> = input.collect();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].index, 0);
    assert_eq!(frames[1].index, 1);
  }

  #[test]
  fn cycle_restarts_from_the_first_file() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let input = DirectoryInput::open(dir.path()).unwrap().cycle(true);
    let indices: Vec<u64> = input.take(5).map(|f| f.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4]);
  }

  #[test]
  fn empty_directory_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      DirectoryInput::open(dir.path()),
      Err(DirectoryInputError::Empty(_))
    ));
  }

  #[test]
  fn parses_dir_url() {
    let dir = tempfile::tempdir().unwrap();
    populate(dir.path());

    let url = Url::parse(&format!("dir://{}?loop&fps=30", dir.path().display())).unwrap();
    let input = DirectoryInput::from_url(&url).unwrap();
    assert!(input.cycle);
  }
}
