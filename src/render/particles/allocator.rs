//! 粒子环形分配器
//!
//! 持有宿主端实例数组，与 [`RingCursors`] 一起管理槽的生命周期：
//! 分配写入 New 区域，过期粒子转入 Retired 区域，经过安全帧延迟后回到 Free 区域。
//! 满载时按固定增量扩容，达到上限后静默丢弃生成请求。

use super::layout::{read_stamp, write_retired_frame, ParticleLayout, SlotStamp, SpawnAttributes};
use super::ring::RingCursors;

/// 生命周期判定容差，吸收长时间运行的浮点累积误差
pub const LIFETIME_EPSILON: f32 = 1.0e-4;

/// 分配器参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorSettings {
    /// 初始槽数（含哨兵槽）
    pub capacity: usize,
    /// 扩容上限
    pub max_capacity: usize,
    /// 每次扩容的槽数
    pub growth_increment: usize,
    /// 退役后至少经过多少帧才能复用
    pub retire_frame_delay: u32,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            max_capacity: 1024,
            growth_increment: 256,
            retire_frame_delay: 1,
        }
    }
}

/// 粒子环形分配器
#[derive(Debug, Clone)]
pub struct ParticleAllocator {
    ring: RingCursors,
    layout: ParticleLayout,
    data: Vec<f32>,
    max_capacity: usize,
    growth_increment: usize,
    retire_frame_delay: u32,
    /// 扩容后设备缓冲区需要整体重建
    needs_full_upload: bool,
    /// 累计丢弃的生成请求
    dropped: u64,
    /// 当前处于满载丢弃状态，用于限制警告日志
    saturated: bool,
}

impl ParticleAllocator {
    pub fn new(layout: ParticleLayout, settings: AllocatorSettings) -> Self {
        let ring = RingCursors::new(settings.capacity);
        let capacity = ring.capacity();
        Self {
            ring,
            layout,
            data: vec![0.0; capacity * layout.stride()],
            max_capacity: settings.max_capacity.max(capacity),
            growth_increment: settings.growth_increment,
            retire_frame_delay: settings.retire_frame_delay.max(1),
            needs_full_upload: false,
            dropped: 0,
            saturated: false,
        }
    }

    /// 分配一个槽并写入记录，满载且无法扩容时返回 `false`
    pub fn allocate(&mut self, attrs: &SpawnAttributes) -> bool {
        if self.ring.is_full() && !self.grow() {
            self.dropped += 1;
            if !self.saturated {
                self.saturated = true;
                tracing::warn!(
                    target: "particles",
                    "Particle buffer saturated at capacity {}, dropping spawns",
                    self.ring.capacity()
                );
            }
            return false;
        }

        let Some(slot) = self.ring.push_free() else {
            self.dropped += 1;
            return false;
        };
        self.saturated = false;
        let stride = self.layout.stride();
        self.layout
            .write(&mut self.data[slot * stride..(slot + 1) * stride], attrs);
        true
    }

    /// 按最小增量和剩余余量扩容
    fn grow(&mut self) -> bool {
        let capacity = self.ring.capacity();
        let additional = self
            .growth_increment
            .min(self.max_capacity.saturating_sub(capacity));
        if additional == 0 {
            return false;
        }

        let stride = self.layout.stride();
        let insert_at = self.ring.grow(additional);
        let offset = insert_at * stride;
        self.data
            .splice(offset..offset, std::iter::repeat(0.0).take(additional * stride));
        self.needs_full_upload = true;

        tracing::debug!(
            target: "particles",
            "Grew particle buffer from {} to {} slots",
            capacity,
            self.ring.capacity()
        );
        true
    }

    /// 退役已过期的已上传粒子，返回退役数量
    ///
    /// 粒子按生成顺序排列，遇到第一个仍然存活的粒子即停止。
    pub fn retire_expired(&mut self, now: f32, frame: u32) -> usize {
        let stride = self.layout.stride();
        let mut retired = 0;
        while self.ring.first_active() != self.ring.first_new() {
            let slot = self.ring.first_active();
            let Some(SlotStamp::Spawned { time }) = self.stamp(slot) else {
                break;
            };
            let age = now - time;
            if age < self.layout.lifetime(self.record(slot)) - LIFETIME_EPSILON {
                break;
            }
            self.ring.retire_front();
            write_retired_frame(&mut self.data[slot * stride..(slot + 1) * stride], frame);
            retired += 1;
        }
        retired
    }

    /// 回收已退役足够帧数的槽，返回回收数量
    pub fn free_retired(&mut self, frame: u32) -> usize {
        let mut freed = 0;
        while self.ring.first_retired() != self.ring.first_active() {
            let slot = self.ring.first_retired();
            let Some(SlotStamp::Retired { frame: retired_at }) = self.stamp(slot) else {
                break;
            };
            if frame.wrapping_sub(retired_at) < self.retire_frame_delay {
                break;
            }
            self.ring.free_front();
            freed += 1;
        }
        freed
    }

    /// 所有存活粒子立即退役，返回退役数量
    pub fn retire_all(&mut self, frame: u32) -> usize {
        let stride = self.layout.stride();
        let mut retired = 0;
        let mut slot = self.ring.first_active();
        while slot != self.ring.first_free() {
            write_retired_frame(&mut self.data[slot * stride..(slot + 1) * stride], frame);
            slot = self.ring.next(slot);
            retired += 1;
        }
        self.ring.retire_all();
        retired
    }

    /// 存活和待上传记录的生成时间整体减去 `offset`
    ///
    /// 已上传的记录随之失效，下一次刷新整体上传。退役槽保存的是帧号，不参与平移。
    pub fn rebase_spawn_times(&mut self, offset: f32) {
        let stride = self.layout.stride();
        let mut slot = self.ring.first_active();
        while slot != self.ring.first_free() {
            self.data[slot * stride + ParticleLayout::TIME] -= offset;
            slot = self.ring.next(slot);
        }
        if self.ring.alive_count() > 0 {
            self.needs_full_upload = true;
        }
    }

    /// 清空所有区域（仅在确认 GPU 不再读取时调用）
    pub fn reset(&mut self) {
        self.ring.reset();
        self.saturated = false;
    }

    /// 上传完成
    pub fn mark_uploaded(&mut self) {
        self.ring.mark_uploaded();
        self.needs_full_upload = false;
    }

    pub fn needs_full_upload(&self) -> bool {
        self.needs_full_upload
    }

    pub fn ring(&self) -> &RingCursors {
        &self.ring
    }

    pub fn layout(&self) -> &ParticleLayout {
        &self.layout
    }

    /// 宿主端实例数组
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// 按槽所在区域解释时间字段，空闲槽返回 `None`
    pub fn stamp(&self, slot: usize) -> Option<SlotStamp> {
        read_stamp(self.record(slot), self.ring.region_of(slot))
    }

    /// 槽的记录
    pub fn record(&self, slot: usize) -> &[f32] {
        let stride = self.layout.stride();
        &self.data[slot * stride..(slot + 1) * stride]
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub fn alive_count(&self) -> usize {
        self.ring.alive_count()
    }

    pub fn retired_count(&self) -> usize {
        self.ring.retired_count()
    }

    pub fn pending_upload_count(&self) -> usize {
        self.ring.pending_upload_count()
    }

    /// 记录未尝试分配就被丢弃的生成请求
    pub fn record_dropped(&mut self, count: u64) {
        self.dropped += count;
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}
