// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/task.rs - 任务调度
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
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
  },
  thread,
  time::Duration,
};

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::{
  frame::Frame,
  input::FrameSource,
  latest::{LatestSlot, Publish},
  model::{Model, ResourceError},
  output::{Present, PresentationEvent},
  pipeline::Classifier,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<I, M, O> Task<I, Classifier<M>, O> for OneShotTask
where
  I: FrameSource,
  M: Model,
  O: Present,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: Classifier<M>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    input.start()?;
    let frame = input.next();
    input.stop()?;
    let frame = frame.ok_or_else(|| anyhow!("没有输入帧"))?;

    info!("输入帧获取成功，开始推理...");
    let result = model.classify(&frame);
    model.release();
    match result {
      Ok(classification) => {
        info!("推理完成，耗时: {:.2?}", classification.elapsed);
        output.display_label(&classification)?;
        Ok(())
      }
      Err(e) => {
        output.display_error(&e.to_string())?;
        Err(e.into())
      }
    }
  }
}

/// 对同一帧反复推理，统计平均耗时
#[derive(Debug)]
pub struct RepeatShotTask {
  times: usize,
}

impl RepeatShotTask {
  const WARMUP: usize = 2;

  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times;
    self
  }
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { times: 1000 }
  }
}

impl<I, M, O> Task<I, Classifier<M>, O> for RepeatShotTask
where
  I: FrameSource,
  M: Model,
  O: Present,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: Classifier<M>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    input.start()?;
    let frame = input.next();
    input.stop()?;
    let frame = frame.ok_or_else(|| anyhow!("没有输入帧"))?;

    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let classification = model.classify(&frame)?;
      info!("({})推理完成，耗时: {:.2?}", i, classification.elapsed);
      output.display_label(&classification)?;
      times.push(classification.elapsed);
    }
    model.release();

    if times.len() > Self::WARMUP {
      warn!(
        "平均推理时间: {:.2?}",
        times.iter().skip(Self::WARMUP).sum::<Duration>() / (times.len() - Self::WARMUP) as u32
      );
    }

    Ok(())
  }
}

/// 实时流水线
///
/// 帧源在独立线程上把帧放进 [`LatestSlot`]，推理线程每次取最新一帧处理，
/// 结果通过通道交回调用线程，由调用线程写到展示端。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt_handler: bool,
  stop: Arc<AtomicBool>,
}

impl ContinuousTask {
  /// 处理到指定帧数后退出
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理函数，每个进程只能安装一次
  pub fn with_interrupt_handler(mut self, enabled: bool) -> Self {
    self.interrupt_handler = enabled;
    self
  }

  /// 置位后推理线程处理完当前帧即退出
  pub fn stop_flag(&self) -> Arc<AtomicBool> {
    self.stop.clone()
  }

  fn install_interrupt_handler(&self) -> Result<(), ctrlc::Error> {
    let stop = self.stop.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      stop.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }
}

impl<I, M, O> Task<I, Result<Classifier<M>, ResourceError>, O> for ContinuousTask
where
  I: FrameSource + Send,
  M: Model + Send,
  O: Present,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    model: Result<Classifier<M>, ResourceError>,
    mut output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    if self.interrupt_handler {
      self.install_interrupt_handler()?;
    }

    input.start()?;

    let slot = LatestSlot::new();
    let slot = &slot;
    let stop: &AtomicBool = &self.stop;
    let frame_number = self.frame_number;
    let (tx, rx) = mpsc::channel();

    let outcome = thread::scope(|s| -> anyhow::Result<()> {
      let source = &mut input;
      let producer = s.spawn(move || pump(source, slot, stop));
      let worker = s.spawn(move || work(model, slot, tx, stop, frame_number));

      let mut presented = Ok(());
      for event in rx.iter() {
        if let Err(e) = event.present_to(&mut output) {
          error!("展示失败，停止任务: {}", e);
          stop.store(true, Ordering::SeqCst);
          slot.shutdown();
          presented = Err(e);
          break;
        }
      }

      let delivered = producer
        .join()
        .map_err(|_| anyhow!("帧源线程异常退出"))?;
      let processed = worker
        .join()
        .map_err(|_| anyhow!("推理线程异常退出"))?;
      info!("帧源交付 {} 帧，处理 {} 帧", delivered, processed);

      presented?;
      Ok(())
    });

    let stats = slot.stats();
    info!(
      "交接槽统计: 放入 {}, 丢弃 {}, 取出 {}",
      stats.published, stats.dropped, stats.taken
    );

    let stopped = input.stop();
    outcome?;
    stopped?;

    info!("任务完成，退出");
    Ok(())
  }
}

/// 帧源线程：把帧放进交接槽，直到帧源结束或任务停止
fn pump<I: FrameSource>(input: &mut I, slot: &LatestSlot<Frame>, stop: &AtomicBool) -> u64 {
  let mut delivered = 0;
  for frame in input.by_ref() {
    if stop.load(Ordering::SeqCst) {
      break;
    }
    delivered += 1;
    let index = frame.index;
    match slot.publish(frame) {
      Publish::Accepted => debug!("第 {} 帧进入交接槽", index),
      Publish::Replaced => warn!("推理繁忙，丢弃旧帧，保留第 {} 帧", index),
      Publish::Closed => break,
    }
  }
  slot.close();
  info!("帧源结束，共交付 {} 帧", delivered);
  delivered
}

/// 推理线程：只有它持有模型
fn work<M: Model>(
  model: Result<Classifier<M>, ResourceError>,
  slot: &LatestSlot<Frame>,
  events: Sender<PresentationEvent>,
  stop: &AtomicBool,
  frame_number: Option<usize>,
) -> usize {
  let mut classifier = match model {
    Ok(classifier) => classifier,
    Err(e) => {
      error!("模型不可用，之后的帧将被丢弃: {}", e);
      let _ = events.send(PresentationEvent::Error(format!("模型不可用: {}", e)));
      let mut discarded = 0;
      while slot.take().is_some() {
        discarded += 1;
        if stop.load(Ordering::SeqCst) {
          break;
        }
      }
      slot.shutdown();
      warn!("共丢弃 {} 帧", discarded);
      return 0;
    }
  };

  let mut processed = 0;
  while let Some(frame) = slot.take() {
    let event = match classifier.classify(&frame) {
      Ok(classification) => {
        info!(
          "第 {} 帧: {} ({:.1}%), 耗时: {:.2?}",
          frame.index,
          classification.label(),
          classification.score() * 100.0,
          classification.elapsed
        );
        PresentationEvent::Label(classification)
      }
      Err(e) => {
        warn!("第 {} 帧处理失败: {}", frame.index, e);
        PresentationEvent::Error(format!("第 {} 帧处理失败: {}", frame.index, e))
      }
    };
    processed += 1;

    if events.send(event).is_err() {
      warn!("展示端已关闭，退出任务循环");
      break;
    }
    if stop.load(Ordering::SeqCst) {
      warn!("中断信号接收，退出任务循环");
      break;
    }
    if frame_number.is_some_and(|n| processed >= n) {
      info!("达到指定帧数 {}, 退出任务循环", processed);
      break;
    }
  }

  slot.shutdown();
  classifier.release();
  processed
}
