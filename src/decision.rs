// 该文件是 Fenlei （垃圾分类） 项目的一部分。
// src/decision.rs - 分类决策
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

use crate::label::{WasteLabel, WithLabel};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecisionError {
  #[error("没有可选的分类结果")]
  NoCandidate,
  #[error("分类下标 {0} 没有对应的标签")]
  UnknownIndex(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
  pub index: usize,
  pub label: WasteLabel,
  pub score: f32,
}

/// 取最大值下标；并列时取最靠前的下标，NaN 不参与比较
pub fn argmax(scores: &[f32]) -> Result<usize, DecisionError> {
  let mut best: Option<(usize, f32)> = None;
  for (i, &score) in scores.iter().enumerate() {
    if score.is_nan() {
      continue;
    }
    match best {
      Some((_, top)) if score <= top => {}
      _ => best = Some((i, score)),
    }
  }
  best.map(|(i, _)| i).ok_or(DecisionError::NoCandidate)
}

pub fn decide(scores: &[f32]) -> Result<Decision, DecisionError> {
  let index = argmax(scores)?;
  let label = u32::try_from(index)
    .ok()
    .and_then(WasteLabel::from_label_id)
    .ok_or(DecisionError::UnknownIndex(index))?;
  Ok(Decision {
    index,
    label,
    score: scores[index],
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn picks_the_maximum() {
    let decision = decide(&[0.1, 0.9, 0.05, 0.05]).unwrap();
    assert_eq!(decision.index, 1);
    assert_eq!(decision.label, WasteLabel::NonBiodegradable);
    assert_eq!(decision.label.to_string(), "Non-biodegradable");
    assert_eq!(decision.score, 0.9);
  }

  #[test]
  fn ties_go_to_the_first_index() {
    let decision = decide(&[0.5, 0.5, 0.0, 0.0]).unwrap();
    assert_eq!(decision.index, 0);
    assert_eq!(decision.label, WasteLabel::Biodegradable);

    assert_eq!(argmax(&[0.0, 0.3, 0.3, 0.3]), Ok(1));
  }

  #[test]
  fn empty_vector_has_no_candidate() {
    assert_eq!(argmax(&[]), Err(DecisionError::NoCandidate));
    assert_eq!(decide(&[]).unwrap_err(), DecisionError::NoCandidate);
  }

  #[test]
  fn nan_never_wins() {
    assert_eq!(argmax(&[f32::NAN, 0.2, f32::NAN, 0.1]), Ok(1));
    assert_eq!(argmax(&[f32::NAN, f32::NAN]), Err(DecisionError::NoCandidate));
  }

  #[test]
  fn negative_scores_are_compared() {
    assert_eq!(argmax(&[-3.0, -1.0, -2.0, -1.0]), Ok(1));
  }

  #[test]
  fn index_past_label_set_is_reported() {
    let err = decide(&[0.0, 0.0, 0.0, 0.0, 1.0]).unwrap_err();
    assert_eq!(err, DecisionError::UnknownIndex(4));
  }
}
