//! 发射形状与发射器变换
//!
//! 形状只负责给出局部空间的起始位置和单位方向，
//! 世界空间模拟时由 [`TransformProvider`] 提供发射器的位置和旋转快照。

use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 发射形状
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmitterShape {
    /// 点发射，方向均匀分布在球面上
    #[default]
    Point,
    /// 球体内发射，方向由球心指向外
    Sphere { radius: f32 },
    /// 上半球（+Y）内发射
    Hemisphere { radius: f32 },
    /// 从半径为 `radius` 的圆盘沿 +Y 发射，方向与轴线夹角不超过 `angle`（弧度）
    Cone { angle: f32, radius: f32 },
    /// 盒体内发射，方向沿 +Y
    Box { half_extents: Vec3 },
    /// XZ 平面上的圆内发射，方向由圆心指向外
    Circle { radius: f32 },
}

impl EmitterShape {
    /// 采样起始位置和单位方向
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (Vec3, Vec3) {
        match *self {
            Self::Point => (Vec3::ZERO, random_unit_vector(rng)),
            Self::Sphere { radius } => {
                let direction = random_unit_vector(rng);
                // 体积均匀分布
                let r = radius * rng.gen::<f32>().cbrt();
                (direction * r, direction)
            }
            Self::Hemisphere { radius } => {
                let mut direction = random_unit_vector(rng);
                direction.y = direction.y.abs();
                let r = radius * rng.gen::<f32>().cbrt();
                (direction * r, direction)
            }
            Self::Cone { angle, radius } => {
                let theta = rng.gen::<f32>() * TAU;
                let r = radius * rng.gen::<f32>().sqrt();
                let position = Vec3::new(r * theta.cos(), 0.0, r * theta.sin());

                let cos_max = angle.clamp(0.0, PI).cos();
                let cos_t = 1.0 - rng.gen::<f32>() * (1.0 - cos_max);
                let sin_t = (1.0 - cos_t * cos_t).max(0.0).sqrt();
                let phi = rng.gen::<f32>() * TAU;
                let direction = Vec3::new(sin_t * phi.cos(), cos_t, sin_t * phi.sin());
                (position, direction.normalize_or_zero())
            }
            Self::Box { half_extents } => {
                let position = Vec3::new(
                    rng.gen_range(-1.0f32..=1.0) * half_extents.x,
                    rng.gen_range(-1.0f32..=1.0) * half_extents.y,
                    rng.gen_range(-1.0f32..=1.0) * half_extents.z,
                );
                (position, Vec3::Y)
            }
            Self::Circle { radius } => {
                let theta = rng.gen::<f32>() * TAU;
                let direction = Vec3::new(theta.cos(), 0.0, theta.sin());
                let r = radius * rng.gen::<f32>().sqrt();
                (direction * r, direction)
            }
        }
    }

    /// 形状参数是否有效
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Point => true,
            Self::Sphere { radius } | Self::Hemisphere { radius } | Self::Circle { radius } => {
                radius.is_finite() && radius >= 0.0
            }
            Self::Cone { angle, radius } => {
                angle.is_finite() && (0.0..=PI).contains(&angle) && radius.is_finite() && radius >= 0.0
            }
            Self::Box { half_extents } => half_extents.is_finite() && half_extents.min_element() >= 0.0,
        }
    }
}

/// 球面均匀分布的单位向量
fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let z = rng.gen_range(-1.0f32..=1.0);
    let phi = rng.gen::<f32>() * TAU;
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// 发射器的世界变换来源
pub trait TransformProvider {
    fn world_position(&self) -> Vec3;
    fn world_rotation(&self) -> Quat;
}

/// 固定的发射器变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl EmitterTransform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Default for EmitterTransform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl TransformProvider for EmitterTransform {
    fn world_position(&self) -> Vec3 {
        self.position
    }

    fn world_rotation(&self) -> Quat {
        self.rotation
    }
}
