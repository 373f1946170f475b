//! 粒子系统模块
//!
//! 环形缓冲区分配粒子槽，每帧只把新写入的记录上传到 GPU 实例缓冲区。
//! 粒子的运动和外观在着色器中根据起始属性和年龄计算，CPU 只负责生命周期。
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ParticleSystem::update                │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. EmissionScheduler                                    │
//! │     - 速率累加器 + 按周期拆分的爆发                        │
//! │     - 输出 (时间戳, 数量) 生成请求                         │
//! │                                                          │
//! │  2. ParticleAllocator                                    │
//! │     - allocate: 写入 New 区域，满载时扩容或丢弃            │
//! │     - retire_expired: Active -> Retired（记录帧号）        │
//! │     - free_retired: Retired -> Free（帧安全延迟之后）      │
//! │                                                          │
//! │  3. InstanceUploader                                     │
//! │     - flush_new: 上传 [first_new, first_free)，最多两段    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```
//! use particle_engine::config::{BurstConfig, ParticleSystemConfig};
//! use particle_engine::render::particles::{EmitterTransform, HostDevice, ParticleSystem};
//!
//! let config = ParticleSystemConfig {
//!     capacity: 256,
//!     bursts: vec![BurstConfig::new(0.0, 50)],
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let mut system = ParticleSystem::new(config, HostDevice::default()).unwrap();
//! let transform = EmitterTransform::default();
//! system.update(1.0 / 60.0, &transform).unwrap();
//! assert_eq!(system.stats().alive_count, 50);
//! ```

pub mod allocator;
pub mod burst;
pub mod curve;
pub mod emitter;
pub mod layout;
pub mod ring;
pub mod shape;
pub mod system;
pub mod upload;

pub use allocator::{AllocatorSettings, ParticleAllocator};
pub use burst::{Burst, BurstList};
pub use curve::{ColorGradient, ColorStop, MinMaxColor, MinMaxValue, ScalarEvaluator};
pub use emitter::{EmissionScheduler, EmissionStep, EmissionTiming, SpawnRequest};
pub use layout::{ParticleLayout, SimulationSpace, SlotStamp, SpawnAttributes};
pub use ring::{RingCursors, RingRegion};
pub use shape::{EmitterShape, EmitterTransform, TransformProvider};
pub use system::{ParticleSystem, ParticleSystemManager, ParticleSystemStats, PlaybackState};
pub use upload::{DeviceBuffer, FlushReport, HostBuffer, HostDevice, InstanceDevice, InstanceUploader, UploadCall};
