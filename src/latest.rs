// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/latest.rs - 仅保留最新帧的交接槽
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

//! # 最新帧交接槽
//!
//! 生产者（帧源）与消费者（推理线程）之间最多只缓存一个待处理的元素。
//! 消费者忙碌时到达的新帧会直接替换尚未取走的旧帧，旧帧被丢弃，
//! 因此队列不会增长。
//!
//! ```
//! use fenlei::latest::{LatestSlot, Publish};
//!
//! let slot = LatestSlot::new();
//! assert_eq!(slot.publish(1), Publish::Accepted);
//! assert_eq!(slot.publish(2), Publish::Replaced);
//! slot.close();
//! assert_eq!(slot.take(), Some(2));
//! assert_eq!(slot.take(), None);
//! ```

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// `publish` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
  /// 槽为空，元素已放入
  Accepted,
  /// 替换了尚未被取走的旧元素
  Replaced,
  /// 槽已关闭，元素被丢弃
  Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
  pub published: u64,
  pub dropped: u64,
  pub taken: u64,
}

struct SlotState<T> {
  pending: Option<T>,
  closed: bool,
  stats: SlotStats,
}

pub struct LatestSlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
}

impl<T> Default for LatestSlot<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> LatestSlot<T> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(SlotState {
        pending: None,
        closed: false,
        stats: SlotStats::default(),
      }),
      ready: Condvar::new(),
    }
  }

  fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn publish(&self, item: T) -> Publish {
    let mut state = self.lock();
    if state.closed {
      return Publish::Closed;
    }
    state.stats.published += 1;
    let result = match state.pending.replace(item) {
      Some(_) => {
        state.stats.dropped += 1;
        Publish::Replaced
      }
      None => Publish::Accepted,
    };
    drop(state);
    self.ready.notify_one();
    result
  }

  /// 阻塞直到有元素可取；槽关闭且为空时返回 `None`
  pub fn take(&self) -> Option<T> {
    let mut state = self.lock();
    loop {
      if let Some(item) = state.pending.take() {
        state.stats.taken += 1;
        return Some(item);
      }
      if state.closed {
        return None;
      }
      state = self
        .ready
        .wait(state)
        .unwrap_or_else(PoisonError::into_inner);
    }
  }

  /// 非阻塞地取走待处理元素
  pub fn try_take(&self) -> Option<T> {
    let mut state = self.lock();
    let item = state.pending.take();
    if item.is_some() {
      state.stats.taken += 1;
    }
    item
  }

  /// 关闭后不再接收新元素，已缓存的元素仍可被取走
  pub fn close(&self) {
    self.lock().closed = true;
    self.ready.notify_all();
  }

  /// 关闭并丢弃已缓存的元素
  pub fn shutdown(&self) {
    let mut state = self.lock();
    state.closed = true;
    if state.pending.take().is_some() {
      state.stats.dropped += 1;
    }
    drop(state);
    self.ready.notify_all();
  }

  pub fn is_closed(&self) -> bool {
    self.lock().closed
  }

  pub fn has_pending(&self) -> bool {
    self.lock().pending.is_some()
  }

  pub fn stats(&self) -> SlotStats {
    self.lock().stats
  }
}
