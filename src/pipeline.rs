// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/pipeline.rs - 单帧分类流水线
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
use tracing::debug;

use crate::{
  decision::{Decision, DecisionError, decide},
  encoder::{EncodingError, TensorEncoder},
  frame::Frame,
  label::WasteLabel,
  model::{InferenceError, Model, ModelHandle},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("帧编码失败: {0}")]
  Encoding(#[from] EncodingError),
  #[error("模型推理失败: {0}")]
  Inference(#[from] InferenceError),
  #[error("分类决策失败: {0}")]
  Decision(#[from] DecisionError),
}

/// 一帧的分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
  pub frame_index: u64,
  pub decision: Decision,
  pub elapsed: Duration,
}

impl Classification {
  pub fn label(&self) -> WasteLabel {
    self.decision.label
  }

  pub fn score(&self) -> f32 {
    self.decision.score
  }
}

/// 编码 → 推理 → 决策
#[derive(Debug)]
pub struct Classifier<M: Model> {
  encoder: TensorEncoder,
  model: ModelHandle<M>,
}

impl<M: Model> Classifier<M> {
  pub fn new(encoder: TensorEncoder, model: ModelHandle<M>) -> Self {
    Self { encoder, model }
  }

  pub fn encoder(&self) -> &TensorEncoder {
    &self.encoder
  }

  pub fn model(&self) -> &ModelHandle<M> {
    &self.model
  }

  pub fn classify(&self, frame: &Frame) -> Result<Classification, PipelineError> {
    let now = Instant::now();
    let tensor = self.encoder.encode(frame)?;
    let scores = self.model.infer(&tensor)?;
    let decision = decide(scores.as_slice())?;
    let elapsed = now.elapsed();
    debug!(
      "第 {} 帧: {} ({:.4}), 耗时 {:.2?}",
      frame.index, decision.label, decision.score, elapsed
    );

    Ok(Classification {
      frame_index: frame.index,
      decision,
      elapsed,
    })
  }

  /// 释放模型，之后的分类请求都会失败
  pub fn release(&mut self) -> bool {
    self.model.release()
  }
}
