// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  encoder::{DEFAULT_IMAGE_SIZE, ResizePolicy, TensorEncoder},
  input::GSTREAMER_SCHEME,
};
#[cfg(feature = "model_tract")]
use crate::{
  FromUrl,
  model::{ModelHandle, ResourceError, TractModel, TractModelBuilder, TractModelError},
  pipeline::Classifier,
};

/// 各个可执行文件共用的流水线参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 模型地址，例如 onnx:///models/waste.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// 支持格式:
  /// - 图片: image:///path/to/image.jpg?repeat=10&fps=5
  /// - 目录: dir:///path/to/images?loop&fps=5
  /// - 摄像头: gst://camera/dev/video0?width=640&height=480&fps=30
  /// - 视频: gst://file/path/to/video.mp4
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出
  /// 支持格式:
  /// - 控制台: console://?only-changes
  /// - 记录目录: folder:///path/to/records?skip-errors
  #[arg(long, value_name = "OUTPUT", default_value = "console://")]
  pub output: Url,

  /// 模型输入边长（像素）
  #[arg(
    long,
    value_name = "PIXELS",
    default_value_t = DEFAULT_IMAGE_SIZE,
    value_parser = clap::value_parser!(u32).range(1..)
  )]
  pub image_size: u32,

  /// 帧尺寸与模型输入不一致时的处理方式
  #[arg(long, value_enum, default_value_t = ResizePolicy::Resize)]
  pub resize: ResizePolicy,
}

impl PipelineArgs {
  pub fn encoder(&self) -> TensorEncoder {
    TensorEncoder::new(self.image_size).with_resize(self.resize)
  }

  /// 输入地址；GStreamer 输入的缩放边长以 `--image-size` 为准，避免二次缩放
  pub fn input_url(&self) -> Url {
    if self.input.scheme() != GSTREAMER_SCHEME {
      return self.input.clone();
    }

    let mut url = self.input.clone();
    let pairs: Vec<(String, String)> = self
      .input
      .query_pairs()
      .filter(|(k, _)| k != "size")
      .map(|(k, v)| (k.into_owned(), v.into_owned()))
      .collect();
    url
      .query_pairs_mut()
      .clear()
      .extend_pairs(pairs)
      .append_pair("size", &self.image_size.to_string());
    url
  }

  /// 加载模型并与编码器组合；模型输入边长以 `--image-size` 为准
  #[cfg(feature = "model_tract")]
  pub fn load_classifier(&self) -> Result<Classifier<TractModel>, ResourceError> {
    let model = ModelHandle::load(self.model.as_str(), || -> Result<TractModel, TractModelError> {
      TractModelBuilder::from_url(&self.model)?
        .image_size(self.image_size)
        .build()
    })?;
    Ok(Classifier::new(self.encoder(), model))
  }

  pub fn log(&self) {
    info!("模型文件路径: {}", self.model);
    info!("输入来源: {}", self.input_url());
    info!("输出路径: {}", self.output);
    info!("模型输入边长: {}, 尺寸策略: {:?}", self.image_size, self.resize);
  }
}
