// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/model.rs - 模型
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

use std::fmt::Display;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{encoder::InputTensor, label::LABEL_COUNT};

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("模型未加载或已释放")]
  NotLoaded,
  #[error("输入张量形状不匹配: 模型期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: [usize; 4],
    actual: [usize; 4],
  },
  #[error("模型输出长度不匹配: 期望 {expected}, 实际 {actual}")]
  OutputMismatch { expected: usize, actual: usize },
  #[error("推理失败: {0}")]
  Backend(String),
}

#[derive(Error, Debug)]
pub enum ResourceError {
  #[error("模型 {name} 加载失败: {reason}")]
  LoadFailed { name: String, reason: String },
}

/// 与标签集合按下标对齐的置信度向量
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityVector {
  scores: Box<[f32]>,
}

impl ProbabilityVector {
  pub fn as_slice(&self) -> &[f32] {
    &self.scores
  }

  pub fn len(&self) -> usize {
    self.scores.len()
  }

  pub fn is_empty(&self) -> bool {
    self.scores.is_empty()
  }
}

impl From<Vec<f32>> for ProbabilityVector {
  fn from(scores: Vec<f32>) -> Self {
    Self {
      scores: scores.into_boxed_slice(),
    }
  }
}

pub trait Model {
  /// 模型声明的输入形状 `[N, H, W, C]`
  fn input_shape(&self) -> [usize; 4];

  fn infer(&self, input: &InputTensor) -> Result<ProbabilityVector, InferenceError>;
}

/// 显式持有的模型资源，加载一次、释放一次
pub struct ModelHandle<M: Model> {
  name: String,
  model: Option<M>,
}

impl<M: Model> ModelHandle<M> {
  pub fn load<F, E>(name: impl Into<String>, loader: F) -> Result<Self, ResourceError>
  where
    F: FnOnce() -> Result<M, E>,
    E: Display,
  {
    let name = name.into();
    info!("加载模型: {}", name);
    match loader() {
      Ok(model) => {
        info!("模型加载完成: {}, 输入形状 {:?}", name, model.input_shape());
        Ok(Self {
          name,
          model: Some(model),
        })
      }
      Err(e) => {
        error!("模型加载失败: {}: {}", name, e);
        Err(ResourceError::LoadFailed {
          name,
          reason: e.to_string(),
        })
      }
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn is_loaded(&self) -> bool {
    self.model.is_some()
  }

  pub fn input_shape(&self) -> Option<[usize; 4]> {
    self.model.as_ref().map(Model::input_shape)
  }

  pub fn infer(&self, input: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
    let model = self.model.as_ref().ok_or(InferenceError::NotLoaded)?;

    let expected = model.input_shape();
    if input.shape() != expected {
      return Err(InferenceError::ShapeMismatch {
        expected,
        actual: input.shape(),
      });
    }

    let output = model.infer(input)?;
    debug!("模型推理结果: {:?}", output.as_slice());
    if output.len() != LABEL_COUNT {
      return Err(InferenceError::OutputMismatch {
        expected: LABEL_COUNT,
        actual: output.len(),
      });
    }
    Ok(output)
  }

  /// 释放模型；仅第一次调用返回 `true`
  pub fn release(&mut self) -> bool {
    match self.model.take() {
      Some(model) => {
        drop(model);
        info!("模型已释放: {}", self.name);
        true
      }
      None => {
        warn!("模型已经释放过: {}", self.name);
        false
      }
    }
  }
}

impl<M: Model> std::fmt::Debug for ModelHandle<M> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelHandle")
      .field("name", &self.name)
      .field("loaded", &self.is_loaded())
      .finish()
  }
}

impl<M: Model> Drop for ModelHandle<M> {
  fn drop(&mut self) {
    if self.model.is_some() {
      self.release();
    }
  }
}

#[cfg(feature = "model_tract")]
mod tract;
#[cfg(feature = "model_tract")]
pub use self::tract::{TractModel, TractModelBuilder, TractModelError};

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  struct Fixed {
    size: usize,
    output: Vec<f32>,
    calls: Cell<usize>,
  }

  impl Fixed {
    fn new(size: usize, output: Vec<f32>) -> Self {
      Self {
        size,
        output,
        calls: Cell::new(0),
      }
    }
  }

  impl Model for Fixed {
    fn input_shape(&self) -> [usize; 4] {
      [1, self.size, self.size, 3]
    }

    fn infer(&self, _input: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
      self.calls.set(self.calls.get() + 1);
      Ok(self.output.clone().into())
    }
  }

  fn tensor(size: usize) -> InputTensor {
    InputTensor::from_shape([1, size, size, 3], vec![0.0; size * size * 3]).unwrap()
  }

  #[test]
  fn infer_returns_model_output() {
    let handle = ModelHandle::load("fixed", || {
      Ok::<_, String>(Fixed::new(2, vec![0.1, 0.2, 0.3, 0.4]))
    })
    .unwrap();
    assert!(handle.is_loaded());
    assert_eq!(handle.input_shape(), Some([1, 2, 2, 3]));
    let out = handle.infer(&tensor(2)).unwrap();
    assert_eq!(out.as_slice(), &[0.1, 0.2, 0.3, 0.4]);
  }

  #[test]
  fn shape_mismatch_is_rejected_before_the_model_runs() {
    let handle =
      ModelHandle::load("fixed", || Ok::<_, String>(Fixed::new(2, vec![0.0; 4]))).unwrap();
    let err = handle.infer(&tensor(3)).unwrap_err();
    assert!(matches!(
      err,
      InferenceError::ShapeMismatch {
        expected: [1, 2, 2, 3],
        actual: [1, 3, 3, 3]
      }
    ));
    assert_eq!(handle.model.as_ref().unwrap().calls.get(), 0);
  }

  #[test]
  fn output_length_is_checked() {
    let handle =
      ModelHandle::load("fixed", || Ok::<_, String>(Fixed::new(1, vec![1.0; 5]))).unwrap();
    let err = handle.infer(&tensor(1)).unwrap_err();
    assert!(matches!(
      err,
      InferenceError::OutputMismatch {
        expected: 4,
        actual: 5
      }
    ));
  }

  #[test]
  fn released_handle_refuses_inference() {
    let mut handle =
      ModelHandle::load("fixed", || Ok::<_, String>(Fixed::new(1, vec![0.0; 4]))).unwrap();
    assert!(handle.release());
    assert!(!handle.release());
    assert!(!handle.is_loaded());
    assert!(matches!(
      handle.infer(&tensor(1)),
      Err(InferenceError::NotLoaded)
    ));
  }

  #[test]
  fn load_failure_is_a_resource_error() {
    let err = ModelHandle::<Fixed>::load("broken", || Err("文件不存在")).unwrap_err();
    let ResourceError::LoadFailed { name, reason } = err;
    assert_eq!(name, "broken");
    assert_eq!(reason, "文件不存在");
  }
}
