// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/model/tract.rs - 基于 tract 的 ONNX 分类模型
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
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  encoder::{DEFAULT_IMAGE_SIZE, InputTensor},
  model::{InferenceError, Model, ProbabilityVector},
  query_param,
};

type TractPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

#[derive(Error, Debug)]
pub enum TractModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("tract 错误: {0}")]
  TractError(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl From<std::io::Error> for TractModelError {
  fn from(err: std::io::Error) -> Self {
    TractModelError::ModelLoadError(err)
  }
}

impl From<TractError> for TractModelError {
  fn from(err: TractError) -> Self {
    TractModelError::TractError(format!("{:#}", err))
  }
}

pub struct TractModelBuilder {
  model_path: String,
  image_size: u32,
}

impl FromUrlWithScheme for TractModelBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for TractModelBuilder {
  type Error = TractModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TractModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(TractModelBuilder {
      model_path: url.path().to_string(),
      image_size: query_param(url, "size").unwrap_or(DEFAULT_IMAGE_SIZE),
    })
  }
}

impl TractModelBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      image_size: DEFAULT_IMAGE_SIZE,
    }
  }

  pub fn image_size(mut self, image_size: u32) -> Self {
    self.image_size = image_size;
    self
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn build(self) -> Result<TractModel, TractModelError> {
    info!("加载模型文件: {}", self.model_path);
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    let size = self.image_size as usize;
    let input_shape = [1, size, size, 3];
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)?
      .with_input_fact(0, f32::fact(input_shape).into())?
      .into_optimized()?
      .into_runnable()?;
    info!("模型优化完成，输入形状 {:?}", input_shape);

    Ok(TractModel { plan, input_shape })
  }
}

pub struct TractModel {
  plan: TractPlan,
  input_shape: [usize; 4],
}

impl Model for TractModel {
  fn input_shape(&self) -> [usize; 4] {
    self.input_shape
  }

  fn infer(&self, input: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
    let [n, h, w, c] = input.shape();
    let array = tract_ndarray::Array4::from_shape_vec((n, h, w, c), input.as_slice().to_vec())
      .map_err(|e| InferenceError::Backend(e.to_string()))?;
    let tensor: Tensor = array.into();

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into_tvalue()))
      .map_err(|e| InferenceError::Backend(format!("{:#}", e)))?;

    let output = outputs
      .first()
      .ok_or_else(|| InferenceError::Backend("模型没有输出".to_string()))?;
    let scores = output
      .to_array_view::<f32>()
      .map_err(|e| InferenceError::Backend(format!("{:#}", e)))?
      .iter()
      .copied()
      .collect::<Vec<f32>>();

    Ok(scores.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_reads_path_and_size_from_url() {
    let url = Url::parse("onnx:///opt/models/waste.onnx?size=192").unwrap();
    let builder = TractModelBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), "/opt/models/waste.onnx");
    assert_eq!(builder.image_size, 192);
  }

  #[test]
  fn builder_defaults_to_224() {
    let url = Url::parse("onnx:///opt/models/waste.onnx").unwrap();
    let builder = TractModelBuilder::from_url(&url).unwrap();
    assert_eq!(builder.image_size, DEFAULT_IMAGE_SIZE);
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("tflite:///opt/models/waste.tflite").unwrap();
    assert!(matches!(
      TractModelBuilder::from_url(&url),
      Err(TractModelError::ModelPathError(_))
    ));
  }

  /// 输入直接作为输出的计划
  fn passthrough(shape: [usize; 4]) -> TractModel {
    let mut model = TypedModel::default();
    let source = model.add_source("input", f32::fact(shape)).unwrap();
    model.set_output_outlets(&[source]).unwrap();
    TractModel {
      plan: model.into_runnable().unwrap(),
      input_shape: shape,
    }
  }

  #[test]
  fn infer_returns_the_plan_output() {
    let model = passthrough([1, 1, 1, 4]);
    let input = InputTensor::from_shape([1, 1, 1, 4], vec![0.1, 0.6, 0.2, 0.1]).unwrap();
    let scores = model.infer(&input).unwrap();
    assert_eq!(scores.as_slice(), &[0.1, 0.6, 0.2, 0.1]);
    assert_eq!(Model::input_shape(&model), [1, 1, 1, 4]);
  }

  #[test]
  fn infer_through_handle_checks_label_count() {
    use crate::model::ModelHandle;

    let handle = ModelHandle::load("passthrough", || Ok::<_, String>(passthrough([1, 1, 1, 4])))
      .unwrap();
    let input = InputTensor::from_shape([1, 1, 1, 4], vec![0.7, 0.1, 0.1, 0.1]).unwrap();
    assert_eq!(handle.infer(&input).unwrap().len(), 4);

    let wrong = InputTensor::from_shape([1, 1, 2, 2], vec![0.0; 4]).unwrap();
    assert!(matches!(
      handle.infer(&wrong),
      Err(InferenceError::ShapeMismatch { .. })
    ));
  }

  #[test]
  fn missing_file_fails_to_build() {
    let err = TractModelBuilder::new("/nonexistent/waste.onnx")
      .build()
      .err()
      .unwrap();
    assert!(matches!(err, TractModelError::ModelLoadError(_)));
  }
}
