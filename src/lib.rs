//! # Particle Engine
//!
//! A real-time particle simulation core that streams per-particle instance data to the GPU.
//!
//! ## Features
//!
//! - **Emission Scheduling**: Accumulator-based continuous emission plus burst events, with
//!   frames that cross loop boundaries split per cycle
//! - **Ring-Buffer Allocation**: Four cursors partition one circular slot array into
//!   retired, active, new and free runs; no per-particle allocation after startup
//! - **Minimal Uploads**: Only records written since the last flush are uploaded, in at most
//!   two contiguous ranges
//! - **GPU Safety Delay**: Retired slots are reused only after a configurable number of frames
//!
//! ## Architecture Design
//!
//! CPU 只管理粒子的生命周期，粒子的运动和外观由着色器根据起始属性和年龄计算：
//! - **Scheduler**: 播放时间 -> 生成请求
//! - **Allocator**: 生成请求 -> 实例记录
//! - **Uploader**: 实例记录 -> 设备缓冲区
//!
//! ### Example
//!
//! ```
//! use particle_engine::config::ParticleSystemConfig;
//! use particle_engine::render::particles::{EmitterTransform, HostDevice, ParticleSystem};
//!
//! let mut system = ParticleSystem::new(ParticleSystemConfig::default(), HostDevice::default()).unwrap();
//! let transform = EmitterTransform::default();
//! for _ in 0..60 {
//!     system.update(1.0 / 60.0, &transform).unwrap();
//! }
//! assert!(system.stats().alive_count > 0);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Errors, logging and shared macros
//! - [`config`]: TOML/JSON configuration with environment overrides
//! - [`render`]: Particle system and the wgpu instance buffer backend

/// Errors, logging initialization and shared macros
#[macro_use]
pub mod core;
/// Configuration system
pub mod config;
/// Particle simulation and GPU instance buffers
pub mod render;
