// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 从摄像头（V4L2）或视频文件读取帧，缩放到模型输入尺寸并转换为 RGB。
//!
//! ## 系统依赖
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## URL 格式
//!
//! - `gst://camera/dev/video0?width=640&height=480&fps=30&rotate=90&size=224`
//! - `gst://file/path/to/video.mp4?size=224`
//!
//! appsink 只保留最新的一帧（`max-buffers=1 drop=true`），
//! 下游处理不过来时旧帧直接丢弃。
//!
//! ```no_run
//! use fenlei::{FromUrl, input::{FrameSource, GStreamerInputPipelineBuilder}};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://camera/dev/video0?size=224")?;
//! let mut input = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;
//! input.start()?;
//! for frame in input.by_ref().take(10) {
//!     println!("帧 {}", frame.index);
//! }
//! input.stop()?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  encoder::DEFAULT_IMAGE_SIZE,
  frame::{Frame, PixelFormat},
  input::{Clock, FrameSource, GSTREAMER_SCHEME, InputError},
};

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// GStreamer 布尔操作错误
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    width: Option<u32>,
    height: Option<u32>,
    fps: u32,
  },
  VideoFlip {
    method: u32,
  },
  ScaleTo {
    size: u32,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location={} ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource {
        camera,
        width,
        height,
        fps,
      } => {
        let mut caps = format!("video/x-raw,framerate={}/1", fps);
        if let Some(width) = width {
          caps.push_str(&format!(",width={}", width));
        }
        if let Some(height) = height {
          caps.push_str(&format!(",height={}", height));
        }
        format!("v4l2src device={} ! {}", camera, caps)
      }
      GStreamerInputBuilderItem::VideoFlip { method } => {
        format!("videoflip method={}", method)
      }
      GStreamerInputBuilderItem::ScaleTo { size } => format!(
        "videoconvert ! videoscale ! video/x-raw,format=RGB,width={},height={}",
        size, size
      ),
    }
  }
}

/// GStreamer 输入管道构建器
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
  size: u32,
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = GSTREAMER_SCHEME;
}

impl GStreamerInputPipelineBuilder {
  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let mut items = vec![GStreamerInputBuilderItem::CameraSource {
      camera: path.to_string(),
      width: query.get("width").and_then(|v| v.parse::<u32>().ok()),
      height: query.get("height").and_then(|v| v.parse::<u32>().ok()),
      fps: query
        .get("fps")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(15),
    }];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));

    GStreamerInputPipelineBuilder {
      items,
      size: DEFAULT_IMAGE_SIZE,
    }
  }

  fn build_file_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let mut items = vec![GStreamerInputBuilderItem::FileSource(path.to_string())];
    items.extend(Self::video_flip(query.get("rotate").map(|s| s.as_ref())));

    GStreamerInputPipelineBuilder {
      items,
      size: DEFAULT_IMAGE_SIZE,
    }
  }

  fn video_flip(rotate: Option<&str>) -> Option<GStreamerInputBuilderItem> {
    let method = match rotate? {
      "90" => 1,
      "180" => 2,
      "270" => 3,
      _ => return None,
    };
    Some(GStreamerInputBuilderItem::VideoFlip { method })
  }

  /// 输出帧的边长（正方形）
  pub fn size(mut self, size: u32) -> Self {
    self.size = size;
    self
  }

  pub fn description(&self) -> String {
    self
      .items
      .iter()
      .chain(std::iter::once(&GStreamerInputBuilderItem::ScaleTo {
        size: self.size,
      }))
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ")
  }

  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let full_pipeline = format!(
      "{} ! appsink max-buffers=1 drop=true sync=false name=sink",
      self.description()
    );
    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    Ok(GStreamerInput {
      pipeline,
      appsink,
      index: 0,
      clock: Clock::new(),
    })
  }
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    let builder = match url.host_str() {
      Some("camera") => Self::build_camera_pipeline(url.path(), &query),
      Some("file") => Self::build_file_pipeline(url.path(), &query),
      _ => return Err(GStreamerInputError::SchemeMismatch),
    };

    let size = query
      .get("size")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_IMAGE_SIZE);
    Ok(builder.size(size))
  }
}

/// GStreamer 视频输入
///
/// `start` 后管道进入 Playing 状态，`stop` 或析构时回到 Null。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  index: u64,
  clock: Clock,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  fn pull_sample(&self) -> Option<gst::Sample> {
    self
      .appsink
      .pull_sample()
      .map_err(|e| {
        error!("Failed to pull sample: {}", e);
        e
      })
      .ok()
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    // 只有 pull_sample 失败（EOS 或 flushing）才结束
    loop {
      let sample = self.pull_sample()?;
      let index = self.index;
      self.index += 1;
      match convert_sample(sample, index) {
        Ok(frame) => return Some(frame.with_timestamp(self.clock.elapsed_ms())),
        Err(e) => warn!("跳过第 {} 帧样本: {}", index, e),
      }
    }
  }
}

impl FrameSource for GStreamerInput {
  fn start(&mut self) -> Result<(), InputError> {
    self
      .pipeline
      .set_state(gst::State::Playing)
      .map_err(GStreamerInputError::from)?;
    info!("GStreamer 管道已启动");
    Ok(())
  }

  fn stop(&mut self) -> Result<(), InputError> {
    self
      .pipeline
      .set_state(gst::State::Null)
      .map_err(GStreamerInputError::from)?;
    info!("GStreamer 管道已停止");
    Ok(())
  }
}

fn convert_sample(sample: gst::Sample, index: u64) -> Result<Frame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let format = match video_info.format() {
    gst_video::VideoFormat::Rgb => PixelFormat::Rgb,
    gst_video::VideoFormat::Bgr => PixelFormat::Bgr,
    gst_video::VideoFormat::Rgba | gst_video::VideoFormat::Rgbx => PixelFormat::Rgba,
    gst_video::VideoFormat::Bgra | gst_video::VideoFormat::Bgrx => PixelFormat::Bgra,
    _ => return Err(GStreamerInputError::UnsupportedFormat),
  };

  let width = video_info.width();
  let height = video_info.height();
  let stride = video_info.stride()[0] as usize;
  let row_bytes = width as usize * format.bytes_per_pixel();

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let packed = pack_rows(map.as_slice(), height as usize, row_bytes, stride);

  Ok(Frame::raw(index, width, height, format, packed))
}

/// 按行拷贝（跳过行尾填充）为紧凑的 HWC 缓冲
///
/// 缓冲不足时返回截断的数据，由编码器按尺寸校验拒绝该帧。
fn pack_rows(data: &[u8], height: usize, row_bytes: usize, stride: usize) -> Vec<u8> {
  let mut packed = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    match data.get(start..start + row_bytes) {
      Some(line) => packed.extend_from_slice(line),
      None => {
        warn!(
          "缓冲区过小: 第 {} 行需要 {} 字节, 偏移 {}, 缓冲区共 {} 字节",
          row,
          row_bytes,
          start,
          data.len()
        );
        packed.extend_from_slice(data.get(start..).unwrap_or_default());
        break;
      }
    }
  }
  packed
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::encoder::{EncodingError, TensorEncoder};

  #[test]
  fn pack_rows_strips_stride_padding() {
    // 2x2 RGB，每行末尾有 2 字节填充
    let data = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
    assert_eq!(
      pack_rows(&data, 2, 6, 8),
      vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]
    );
  }

  #[test]
  fn short_buffer_becomes_an_encoding_error() {
    let data = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8];
    let packed = pack_rows(&data, 2, 6, 8);
    assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8]);

    let frame = Frame::raw(0, 2, 2, PixelFormat::Rgb, packed);
    assert!(matches!(
      TensorEncoder::new(2).encode(&frame),
      Err(EncodingError::BufferSizeMismatch {
        expected: 12,
        actual: 8
      })
    ));
  }

  #[test]
  fn camera_url_builds_scaled_description() {
    let url = Url::parse("gst://camera/dev/video0?width=640&height=480&fps=30&rotate=90&size=224")
      .unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url).unwrap();
    assert_eq!(
      builder.description(),
      "v4l2src device=/dev/video0 ! video/x-raw,framerate=30/1,width=640,height=480 ! \
       videoflip method=1 ! \
       videoconvert ! videoscale ! video/x-raw,format=RGB,width=224,height=224"
    );
  }

  #[test]
  fn file_url_defaults_to_224() {
    let url = Url::parse("gst://file/data/clip.mp4").unwrap();
    let builder = GStreamerInputPipelineBuilder::from_url(&url).unwrap();
    assert!(builder.description().starts_with("filesrc location=/data/clip.mp4 ! decodebin"));
    assert!(builder.description().ends_with("width=224,height=224"));
  }

  #[test]
  fn unknown_host_is_rejected() {
    let url = Url::parse("gst://rtsp/stream").unwrap();
    assert!(matches!(
      GStreamerInputPipelineBuilder::from_url(&url),
      Err(GStreamerInputError::SchemeMismatch)
    ));
  }
}
