//! 统一错误处理模块
//!
//! 粒子引擎的错误只来自配置和设备：配置无效、设备不可用、缓冲区创建失败。
//!
//! 容量耗尽不是错误：生成请求在达到最大容量后被静默丢弃（背压策略）。
//! 时间回退（循环播放时的回绕）由发射调度器作为正常情况处理。

use thiserror::Error;

use crate::config::ConfigError;

/// 粒子引擎错误类型
#[derive(Error, Debug)]
pub enum ParticleError {
    #[error("Failed to create device buffer of {size} bytes: {reason}")]
    BufferCreation { size: usize, reason: String },

    #[error("GPU device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Particle system limit of {0} reached")]
    SystemLimit(usize),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// 粒子引擎结果类型别名
pub type ParticleResult<T> = Result<T, ParticleError>;
