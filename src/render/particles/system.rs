//! 粒子系统
//!
//! 把发射调度、环形分配和实例上传串成每帧一次的 `update`：
//!
//! 1. 调度器把本帧播放时间区间转换为生成请求（仅在播放中）
//! 2. 分配器为每个请求写入新记录
//! 3. 过期粒子退役，并打上当前帧号
//! 4. 退役足够帧数的槽回收为空闲
//! 5. 有新记录或退役发生时上传 `[first_new, first_free)`
//!
//! 暂停只冻结播放时间，模拟时间继续前进，已有粒子照常老化和退役。
//!
//! 模拟时钟以 f64 累加。记录里的生成时间是相对 `time_origin` 的 f32，
//! 每过 [`CLOCK_REBASE_INTERVAL`] 秒整体平移一次，保证长时间运行时
//! 年龄比较的精度始终高于 [`LIFETIME_EPSILON`](super::allocator::LIFETIME_EPSILON)。

use std::time::Instant;

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ParticleSystemConfig;
use crate::core::error::{ParticleError, ParticleResult};

use super::allocator::{AllocatorSettings, ParticleAllocator};
use super::burst::Burst;
use super::emitter::{EmissionScheduler, EmissionTiming, SpawnRequest};
use super::layout::{ParticleLayout, SimulationSpace, SpawnAttributes};
use super::shape::{EmitterTransform, TransformProvider};
use super::upload::{InstanceDevice, InstanceUploader};

/// 记录内生成时间的平移步长（秒），在此范围内 f32 的精度约为 3e-5
pub const CLOCK_REBASE_INTERVAL: f64 = 256.0;

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// 粒子系统统计
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ParticleSystemStats {
    /// 当前存活粒子数
    pub alive_count: u32,
    /// 当前槽数
    pub capacity: u32,
    /// 总发射数
    pub total_emitted: u64,
    /// 本帧发射数
    pub frame_emitted: u32,
    /// 累计丢弃数（满载背压）
    pub total_dropped: u64,
    /// 本帧退役数
    pub frame_retired: u32,
    /// 本帧回收数
    pub frame_freed: u32,
    /// 本帧上传调用次数
    pub frame_upload_calls: u32,
    /// 本帧上传字节数
    pub frame_bytes_uploaded: u64,
    /// 模拟时间（ms）
    pub simulation_time_ms: f32,
}

/// 单个粒子系统
pub struct ParticleSystem<D: InstanceDevice> {
    config: ParticleSystemConfig,
    device: D,
    scheduler: EmissionScheduler,
    allocator: ParticleAllocator,
    uploader: InstanceUploader<D>,
    rng: StdRng,
    state: PlaybackState,
    /// 周期内播放时间
    play_time: f32,
    /// 单调递增的模拟时间
    sim_time: f64,
    /// 记录内生成时间的基准
    time_origin: f64,
    /// 是否开始过播放，未开始的系统不算结束
    started: bool,
    /// 帧计数，只用作退役新鲜度标记
    frame: u32,
    /// 非循环发射器已走完周期
    emission_finished: bool,
    /// 复用的生成请求缓冲
    requests: Vec<SpawnRequest>,
    stats: ParticleSystemStats,
}

impl<D: InstanceDevice> ParticleSystem<D> {
    /// 创建粒子系统并分配设备缓冲区
    pub fn new(config: ParticleSystemConfig, device: D) -> ParticleResult<Self> {
        config.validate()?;

        let layout = ParticleLayout::new(
            config.start_size_3d,
            config.start_rotation_3d,
            config.simulation_space,
        );
        let allocator = ParticleAllocator::new(
            layout,
            AllocatorSettings {
                capacity: config.capacity,
                max_capacity: config.max_capacity,
                growth_increment: config.growth_increment,
                retire_frame_delay: config.retire_frame_delay,
            },
        );
        let uploader = InstanceUploader::new(&device, &allocator)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = if config.play_on_start {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        };

        tracing::debug!(
            target: "particles",
            "Created particle system: capacity {}, stride {} floats",
            allocator.capacity(),
            layout.stride()
        );

        let started = config.play_on_start;
        Ok(Self {
            scheduler: EmissionScheduler::new(config.burst_list()),
            config,
            device,
            allocator,
            uploader,
            rng,
            state,
            play_time: 0.0,
            sim_time: 0.0,
            time_origin: 0.0,
            started,
            frame: 0,
            emission_finished: false,
            requests: Vec::new(),
            stats: ParticleSystemStats::default(),
        })
    }

    // ========================================================================
    // 播放控制
    // ========================================================================

    /// 开始或继续播放，已结束的非循环发射器从头开始
    pub fn play(&mut self) {
        if self.emission_finished {
            self.rewind();
        }
        self.state = PlaybackState::Playing;
        self.started = true;
        tracing::debug!(target: "particles", "Playing at t={}", self.play_time);
    }

    /// 暂停发射，已有粒子继续老化
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// 停止发射，已有粒子自然结束
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        tracing::debug!(target: "particles", "Stopped with {} particles alive", self.allocator.alive_count());
    }

    /// 立即退役所有存活粒子，仍然遵守帧安全延迟
    pub fn clear(&mut self) {
        let retired = self.allocator.retire_all(self.frame);
        tracing::debug!(target: "particles", "Cleared {} particles", retired);
    }

    /// 播放时间和调度器归零后重新播放
    pub fn restart(&mut self) {
        self.rewind();
        self.state = PlaybackState::Playing;
        self.started = true;
        tracing::debug!(target: "particles", "Restarted");
    }

    fn rewind(&mut self) {
        self.scheduler.reset();
        self.play_time = 0.0;
        self.emission_finished = false;
    }

    /// 运行时添加爆发
    pub fn add_burst(&mut self, burst: Burst) {
        self.scheduler.add_burst(burst);
    }

    // ========================================================================
    // 每帧更新
    // ========================================================================

    /// 推进一帧
    pub fn update(
        &mut self,
        elapsed: f32,
        transform: &dyn TransformProvider,
    ) -> ParticleResult<()> {
        let started = Instant::now();
        let elapsed = if elapsed.is_finite() && elapsed > 0.0 {
            elapsed
        } else {
            0.0
        };

        self.frame = self.frame.wrapping_add(1);
        self.rebase_clock();
        let frame_start = self.shader_time();
        self.sim_time += f64::from(elapsed);
        let now = self.shader_time();
        let emitted_before = self.stats.total_emitted;

        if self.state == PlaybackState::Playing && !self.emission_finished {
            self.run_scheduler(frame_start, elapsed, transform);
        }

        let retired = self.allocator.retire_expired(now, self.frame);
        let freed = self.allocator.free_retired(self.frame);

        let mut upload_calls = 0;
        let mut bytes_uploaded = 0;
        if self.allocator.pending_upload_count() > 0
            || retired > 0
            || self.allocator.needs_full_upload()
        {
            let report = self.uploader.flush_new(&self.device, &mut self.allocator)?;
            upload_calls = report.upload_calls;
            bytes_uploaded = report.bytes_uploaded;
        }

        self.stats.alive_count = self.allocator.alive_count() as u32;
        self.stats.capacity = self.allocator.capacity() as u32;
        self.stats.frame_emitted = (self.stats.total_emitted - emitted_before) as u32;
        self.stats.total_dropped = self.allocator.dropped_count();
        self.stats.frame_retired = retired as u32;
        self.stats.frame_freed = freed as u32;
        self.stats.frame_upload_calls = upload_calls as u32;
        self.stats.frame_bytes_uploaded = bytes_uploaded as u64;
        self.stats.simulation_time_ms = started.elapsed().as_secs_f32() * 1000.0;

        tracing::trace!(
            target: "particles",
            "frame {}: alive {}, emitted {}, retired {}, freed {}",
            self.frame,
            self.stats.alive_count,
            self.stats.frame_emitted,
            retired,
            freed
        );
        Ok(())
    }

    /// 相对时间超过平移步长时，把基准和所有记录的生成时间一起前移
    fn rebase_clock(&mut self) {
        let local = self.sim_time - self.time_origin;
        if local < CLOCK_REBASE_INTERVAL {
            return;
        }
        let offset = (local / CLOCK_REBASE_INTERVAL).floor() * CLOCK_REBASE_INTERVAL;
        self.time_origin += offset;
        self.allocator.rebase_spawn_times(offset as f32);
        tracing::debug!(
            target: "particles",
            "Rebased particle clock by {}s, origin now {}s",
            offset,
            self.time_origin
        );
    }

    fn run_scheduler(&mut self, frame_start: f32, elapsed: f32, transform: &dyn TransformProvider) {
        let duration = self.config.duration;
        let normalized = (self.play_time / duration).clamp(0.0, 1.0);
        let rate = self
            .config
            .emission_rate
            .sample(Some(normalized), Some(self.rng.gen::<f32>()));
        let timing = EmissionTiming {
            rate,
            duration,
            looping: self.config.looping,
            max_rate_emissions: self.config.max_rate_emissions,
        };

        let last = self.play_time;
        let mut requests = std::mem::take(&mut self.requests);
        requests.clear();
        let step = self
            .scheduler
            .advance(&timing, last, last + elapsed, &mut self.rng, &mut requests);
        self.play_time = step.play_time;

        for request in &requests {
            // 请求时间戳与帧起点的播放时间同一坐标系
            let time = frame_start + (request.time - last);
            self.spawn(request.count, time, transform);
        }
        self.requests = requests;

        if step.finished {
            self.emission_finished = true;
            tracing::debug!(target: "particles", "Emission finished after {}s", duration);
        }
    }

    /// 立即发射 `count` 个粒子，返回实际写入的数量
    pub fn emit(&mut self, count: u32, transform: &dyn TransformProvider) -> u32 {
        self.spawn(count, self.shader_time(), transform)
    }

    fn spawn(&mut self, count: u32, time: f32, transform: &dyn TransformProvider) -> u32 {
        let mut written = 0;
        for _ in 0..count {
            let attrs = self.spawn_attributes(time, transform);
            if !self.allocator.allocate(&attrs) {
                // 本帧不会再有空槽
                self.allocator.record_dropped(u64::from(count - written - 1));
                break;
            }
            written += 1;
        }
        self.stats.total_emitted += u64::from(written);
        self.stats.total_dropped = self.allocator.dropped_count();
        written
    }

    /// 采样一个粒子的起始属性
    fn spawn_attributes(&mut self, time: f32, transform: &dyn TransformProvider) -> SpawnAttributes {
        let config = &self.config;
        let rng = &mut self.rng;
        // 起始属性只在生成时求值一次，不随发射器播放时间变化
        let t = None;

        let (position, direction) = config.shape.sample(rng);

        let size_x = config.start_size.sample(t, Some(rng.gen()));
        let size = if config.start_size_3d {
            Vec3::new(
                size_x,
                config.start_size_y.sample(t, Some(rng.gen())),
                config.start_size_z.sample(t, Some(rng.gen())),
            )
        } else {
            Vec3::splat(size_x)
        };

        let rotation_z = config.start_rotation.sample(t, Some(rng.gen()));
        let rotation = if config.start_rotation_3d {
            Vec3::new(
                config.start_rotation_x.sample(t, Some(rng.gen())),
                config.start_rotation_y.sample(t, Some(rng.gen())),
                rotation_z,
            )
        } else {
            Vec3::new(0.0, 0.0, rotation_z)
        };

        let world = match config.simulation_space {
            SimulationSpace::World => {
                Some((transform.world_position(), transform.world_rotation()))
            }
            SimulationSpace::Local => None,
        };

        let uv_tile = match &config.texture_sheet {
            Some(sheet) => sheet.start_tile(rng.gen()),
            None => Vec4::new(1.0, 1.0, 0.0, 0.0),
        };

        SpawnAttributes {
            position,
            direction,
            time,
            lifetime: config.start_lifetime.sample(t, Some(rng.gen())).max(0.0),
            color: config.start_color.sample(t, Some(rng.gen())),
            size,
            rotation,
            speed: config.start_speed.sample(t, Some(rng.gen())),
            shader_random: Vec4::new(rng.gen(), rng.gen(), rng.gen(), rng.gen()),
            velocity_random: Vec4::new(rng.gen(), rng.gen(), rng.gen(), rng.gen()),
            world,
            uv_tile,
        }
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 仍在发射或仍有粒子存活，从未播放过的系统也算存活
    pub fn is_alive(&self) -> bool {
        if !self.started {
            return true;
        }
        let emitting = self.state != PlaybackState::Stopped && !self.emission_finished;
        emitting || self.allocator.alive_count() > 0
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn stats(&self) -> ParticleSystemStats {
        self.stats
    }

    pub fn config(&self) -> &ParticleSystemConfig {
        &self.config
    }

    pub fn play_time(&self) -> f32 {
        self.play_time
    }

    /// 累计模拟时间（秒）
    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// 与记录内生成时间同一基准的当前时间，着色器用它计算粒子年龄
    pub fn shader_time(&self) -> f32 {
        (self.sim_time - self.time_origin) as f32
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn scheduler(&self) -> &EmissionScheduler {
        &self.scheduler
    }

    pub fn allocator(&self) -> &ParticleAllocator {
        &self.allocator
    }

    pub fn uploader(&self) -> &InstanceUploader<D> {
        &self.uploader
    }

    pub fn uploader_mut(&mut self) -> &mut InstanceUploader<D> {
        &mut self.uploader
    }

    /// 绘制用的实例区间（槽索引），回绕时两段
    pub fn draw_ranges(&self) -> [Option<(usize, usize)>; 2] {
        self.allocator.ring().alive_ranges()
    }
}

// ============================================================================
// 多系统管理
// ============================================================================

struct ManagedSystem<D: InstanceDevice> {
    system: ParticleSystem<D>,
    transform: EmitterTransform,
}

/// 粒子系统管理器
///
/// 管理多个粒子系统及其发射器变换，提供统一的更新接口。
/// 系统 ID 在移除其他系统后保持不变。
pub struct ParticleSystemManager<D: InstanceDevice> {
    /// 粒子系统槽位
    systems: Vec<Option<ManagedSystem<D>>>,
    /// 最大系统数
    max_systems: usize,
}

impl<D: InstanceDevice> ParticleSystemManager<D> {
    /// 创建新的粒子系统管理器
    ///
    /// # 参数
    ///
    /// * `max_systems` - 最大系统数
    pub fn new(max_systems: usize) -> Self {
        Self {
            systems: Vec::with_capacity(max_systems),
            max_systems,
        }
    }

    /// 添加粒子系统
    ///
    /// # 返回
    ///
    /// 返回系统ID。达到上限时返回 [`ParticleError::SystemLimit`]。
    pub fn add_system(
        &mut self,
        config: ParticleSystemConfig,
        device: D,
        transform: EmitterTransform,
    ) -> ParticleResult<usize> {
        if self.system_count() >= self.max_systems {
            return Err(ParticleError::SystemLimit(self.max_systems));
        }

        let managed = ManagedSystem {
            system: ParticleSystem::new(config, device)?,
            transform,
        };
        if let Some(id) = self.systems.iter().position(Option::is_none) {
            self.systems[id] = Some(managed);
            Ok(id)
        } else {
            self.systems.push(Some(managed));
            Ok(self.systems.len() - 1)
        }
    }

    pub fn get_system(&self, id: usize) -> Option<&ParticleSystem<D>> {
        self.systems.get(id)?.as_ref().map(|m| &m.system)
    }

    /// 获取粒子系统（可变引用）
    pub fn get_system_mut(&mut self, id: usize) -> Option<&mut ParticleSystem<D>> {
        self.systems.get_mut(id)?.as_mut().map(|m| &mut m.system)
    }

    /// 设置发射器变换
    pub fn set_transform(&mut self, id: usize, transform: EmitterTransform) -> bool {
        match self.systems.get_mut(id).and_then(Option::as_mut) {
            Some(managed) => {
                managed.transform = transform;
                true
            }
            None => false,
        }
    }

    /// 更新所有粒子系统
    pub fn update_all(&mut self, elapsed: f32) -> ParticleResult<()> {
        for managed in self.systems.iter_mut().flatten() {
            managed.system.update(elapsed, &managed.transform)?;
        }
        Ok(())
    }

    /// 移除已经结束的系统，返回移除数量
    pub fn remove_finished(&mut self) -> usize {
        let mut removed = 0;
        for slot in &mut self.systems {
            if slot.as_ref().is_some_and(|m| !m.system.is_alive()) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    /// 获取系统数量
    pub fn system_count(&self) -> usize {
        self.systems.iter().flatten().count()
    }

    /// 所有系统的存活粒子总数
    pub fn total_alive(&self) -> usize {
        self.systems
            .iter()
            .flatten()
            .map(|m| m.system.allocator().alive_count())
            .sum()
    }

    /// 移除系统
    ///
    /// 如果成功移除返回`true`，否则返回`false`。
    pub fn remove_system(&mut self, id: usize) -> bool {
        match self.systems.get_mut(id) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// 清空所有系统
    pub fn clear(&mut self) {
        self.systems.clear();
    }
}

impl<D: InstanceDevice> Default for ParticleSystemManager<D> {
    fn default() -> Self {
        Self::new(64)
    }
}
