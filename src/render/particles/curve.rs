//! 曲线与渐变求值
//!
//! 粒子核心只把曲线当作不透明函数使用：`evaluate(归一化时间, 随机采样)`。
//! 生成粒子时起始属性只求值一次，此时时间参数为 `None`。

use glam::Vec4;
use serde::{Deserialize, Serialize};

/// 标量求值器
pub trait ScalarEvaluator: Send + Sync {
    /// 在归一化时间 `t` 处求值，`random` 为 [0, 1) 的随机采样
    fn evaluate(&self, t: Option<f32>, random: Option<f32>) -> f32;
}

impl<F> ScalarEvaluator for F
where
    F: Fn(Option<f32>, Option<f32>) -> f32 + Send + Sync,
{
    fn evaluate(&self, t: Option<f32>, random: Option<f32>) -> f32 {
        self(t, random)
    }
}

// ============================================================================
// 标量曲线
// ============================================================================

/// 可序列化的标量取值方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MinMaxValue {
    /// 常量
    Constant { value: f32 },
    /// 在两个常量之间随机
    RandomBetween { min: f32, max: f32 },
    /// 曲线（归一化时间, 值），按时间排序
    Curve { points: Vec<(f32, f32)> },
    /// 在两条曲线之间随机
    RandomBetweenCurves {
        min_points: Vec<(f32, f32)>,
        max_points: Vec<(f32, f32)>,
    },
}

impl MinMaxValue {
    pub const fn constant(value: f32) -> Self {
        Self::Constant { value }
    }

    pub const fn random_between(min: f32, max: f32) -> Self {
        Self::RandomBetween { min, max }
    }

    /// 采样值
    pub fn sample(&self, t: Option<f32>, random: Option<f32>) -> f32 {
        // 未提供随机采样时取中点
        let r = random.unwrap_or(0.5);
        let t = t.unwrap_or(0.0);
        match self {
            Self::Constant { value } => *value,
            Self::RandomBetween { min, max } => min + (max - min) * r,
            Self::Curve { points } => sample_curve(points, t),
            Self::RandomBetweenCurves {
                min_points,
                max_points,
            } => {
                let min = sample_curve(min_points, t);
                let max = sample_curve(max_points, t);
                min + (max - min) * r
            }
        }
    }

    /// 可能取到的最大值
    pub fn max_value(&self) -> f32 {
        let curve_max = |points: &[(f32, f32)]| {
            points
                .iter()
                .map(|(_, v)| *v)
                .fold(f32::NEG_INFINITY, f32::max)
        };
        match self {
            Self::Constant { value } => *value,
            Self::RandomBetween { min, max } => min.max(*max),
            Self::Curve { points } => curve_max(points),
            Self::RandomBetweenCurves {
                min_points,
                max_points,
            } => curve_max(min_points).max(curve_max(max_points)),
        }
    }

    /// 可能取到的最小值
    pub fn min_value(&self) -> f32 {
        let curve_min = |points: &[(f32, f32)]| {
            points.iter().map(|(_, v)| *v).fold(f32::INFINITY, f32::min)
        };
        match self {
            Self::Constant { value } => *value,
            Self::RandomBetween { min, max } => min.min(*max),
            Self::Curve { points } => curve_min(points),
            Self::RandomBetweenCurves {
                min_points,
                max_points,
            } => curve_min(min_points).min(curve_min(max_points)),
        }
    }
}

impl Default for MinMaxValue {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

impl ScalarEvaluator for MinMaxValue {
    fn evaluate(&self, t: Option<f32>, random: Option<f32>) -> f32 {
        self.sample(t, random)
    }
}

/// 曲线采样
fn sample_curve(points: &[(f32, f32)], t: f32) -> f32 {
    if points.is_empty() {
        return 1.0;
    }
    if points.len() == 1 {
        return points[0].1;
    }

    let t = t.clamp(0.0, 1.0);

    for pair in points.windows(2) {
        let (t0, v0) = pair[0];
        let (t1, v1) = pair[1];
        if t >= t0 && t <= t1 {
            if t1 <= t0 {
                return v1;
            }
            let local_t = (t - t0) / (t1 - t0);
            return v0 + (v1 - v0) * local_t;
        }
    }

    if t < points[0].0 {
        points[0].1
    } else {
        points[points.len() - 1].1
    }
}

// ============================================================================
// 颜色渐变
// ============================================================================

/// 颜色停止点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// 时间点（0-1）
    pub time: f32,
    /// 颜色
    pub color: Vec4,
}

/// 颜色渐变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorGradient {
    /// 颜色停止点（按时间排序）
    pub stops: Vec<ColorStop>,
}

impl ColorGradient {
    pub fn new() -> Self {
        Self { stops: Vec::new() }
    }

    pub fn add_stop(mut self, time: f32, color: Vec4) -> Self {
        self.stops.push(ColorStop { time, color });
        self.stops.sort_by(|a, b| a.time.total_cmp(&b.time));
        self
    }

    /// 采样颜色
    pub fn sample(&self, t: f32) -> Vec4 {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Vec4::ONE,
        };

        let t = t.clamp(0.0, 1.0);
        if t <= first.time {
            return first.color;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if t >= a.time && t <= b.time {
                if b.time <= a.time {
                    return b.color;
                }
                let local_t = (t - a.time) / (b.time - a.time);
                return a.color.lerp(b.color, local_t);
            }
        }

        last.color
    }
}

impl Default for ColorGradient {
    fn default() -> Self {
        Self::new()
            .add_stop(0.0, Vec4::new(1.0, 1.0, 1.0, 1.0))
            .add_stop(1.0, Vec4::new(1.0, 1.0, 1.0, 0.0))
    }
}

/// 可序列化的颜色取值方式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MinMaxColor {
    Constant { color: Vec4 },
    RandomBetween { min: Vec4, max: Vec4 },
    Gradient { gradient: ColorGradient },
    RandomBetweenGradients { min: ColorGradient, max: ColorGradient },
}

impl MinMaxColor {
    pub const fn constant(color: Vec4) -> Self {
        Self::Constant { color }
    }

    pub fn sample(&self, t: Option<f32>, random: Option<f32>) -> Vec4 {
        let r = random.unwrap_or(0.5);
        match self {
            Self::Constant { color } => *color,
            Self::RandomBetween { min, max } => min.lerp(*max, r),
            // 起始颜色没有时间参数时，用随机采样在渐变上取点
            Self::Gradient { gradient } => gradient.sample(t.unwrap_or(r)),
            Self::RandomBetweenGradients { min, max } => {
                let t = t.unwrap_or(0.0);
                min.sample(t).lerp(max.sample(t), r)
            }
        }
    }
}

impl Default for MinMaxColor {
    fn default() -> Self {
        Self::constant(Vec4::ONE)
    }
}
