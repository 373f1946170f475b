//! 爆发发射
//!
//! 爆发是一个周期内某一时刻的一次性发射事件，与连续速率发射相互独立。

use std::fmt;
use std::sync::Arc;

use super::curve::{MinMaxValue, ScalarEvaluator};

/// 单次爆发
#[derive(Clone)]
pub struct Burst {
    /// 周期内的触发时间（秒）
    pub time: f32,
    /// 发射数量求值器（可以是随机的）
    pub count: Arc<dyn ScalarEvaluator>,
}

impl Burst {
    pub fn new(time: f32, count: impl ScalarEvaluator + 'static) -> Self {
        Self {
            time,
            count: Arc::new(count),
        }
    }

    /// 固定数量的爆发
    pub fn fixed(time: f32, count: u32) -> Self {
        Self::new(time, MinMaxValue::constant(count as f32))
    }

    /// 在 `min..=max` 之间随机数量的爆发
    pub fn random(time: f32, min: u32, max: u32) -> Self {
        Self::new(time, MinMaxValue::random_between(min as f32, max as f32))
    }

    /// 用随机采样求值本次爆发数量
    pub fn evaluate_count(&self, random: f32) -> u32 {
        let count = self.count.evaluate(None, Some(random));
        if count.is_finite() && count > 0.0 {
            count.round() as u32
        } else {
            0
        }
    }
}

impl fmt::Debug for Burst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Burst").field("time", &self.time).finish()
    }
}

/// 按触发时间排序的爆发列表
///
/// 插入时做插入排序：爆发很少添加，却每帧读取。
#[derive(Debug, Clone, Default)]
pub struct BurstList {
    bursts: Vec<Burst>,
}

impl BurstList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入爆发并保持有序，相同时间的爆发保持插入顺序
    pub fn insert(&mut self, burst: Burst) -> usize {
        let index = self.bursts.partition_point(|b| b.time <= burst.time);
        self.bursts.insert(index, burst);
        index
    }

    pub fn clear(&mut self) {
        self.bursts.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Burst> {
        self.bursts.get(index)
    }

    pub fn len(&self) -> usize {
        self.bursts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bursts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Burst> {
        self.bursts.iter()
    }

    pub fn is_sorted(&self) -> bool {
        self.bursts.windows(2).all(|w| w[0].time <= w[1].time)
    }
}

impl FromIterator<Burst> for BurstList {
    fn from_iter<I: IntoIterator<Item = Burst>>(iter: I) -> Self {
        let mut list = BurstList::new();
        for burst in iter {
            list.insert(burst);
        }
        list
    }
}
