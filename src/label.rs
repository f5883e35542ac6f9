// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/label.rs - 垃圾类别标签
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

use std::fmt;

pub trait WithLabel: Sized + fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Option<Self>;
}

/// 模型输出向量的下标与此处的声明顺序一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasteLabel {
  Biodegradable,
  NonBiodegradable,
  Recyclable,
  Biohazard,
}

pub const LABEL_COUNT: usize = 4;

impl WasteLabel {
  pub const ALL: [WasteLabel; LABEL_COUNT] = [
    WasteLabel::Biodegradable,
    WasteLabel::NonBiodegradable,
    WasteLabel::Recyclable,
    WasteLabel::Biohazard,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      WasteLabel::Biodegradable => "Biodegradable",
      WasteLabel::NonBiodegradable => "Non-biodegradable",
      WasteLabel::Recyclable => "Recyclable",
      WasteLabel::Biohazard => "Biohazard",
    }
  }
}

impl WithLabel for WasteLabel {
  fn to_label_str(&self) -> String {
    self.as_str().to_string()
  }

  fn to_label_id(&self) -> u32 {
    *self as u32
  }

  fn from_label_id(id: u32) -> Option<Self> {
    Self::ALL.get(id as usize).copied()
  }
}

impl fmt::Display for WasteLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
