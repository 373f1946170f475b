//! 粒子环形缓冲区游标
//!
//! 固定容量的环形数组被四个游标划分为四段连续区域（按环形顺序）：
//!
//! ```text
//! first_retired ──► first_active ──► first_new ──► first_free ──► (first_retired)
//!
//! [first_retired, first_active)  已退役，等待 GPU 安全延迟后复用
//! [first_active,  first_new)     存活且已上传
//! [first_new,     first_free)    存活，本帧写入，尚未上传
//! [first_free,    first_retired) 空闲（至少保留一个哨兵槽）
//! ```
//!
//! 环形回绕只在本模块中计算。

/// 环形区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingRegion {
    Retired,
    Active,
    New,
    Free,
}

/// 四个游标
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingCursors {
    capacity: usize,
    first_retired: usize,
    first_active: usize,
    first_new: usize,
    first_free: usize,
}

impl RingCursors {
    /// 创建空的环，容量至少为 1
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            first_retired: 0,
            first_active: 0,
            first_new: 0,
            first_free: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 同时存活粒子数的上限（保留一个哨兵槽）
    pub fn usable(&self) -> usize {
        self.capacity - 1
    }

    pub fn first_retired(&self) -> usize {
        self.first_retired
    }

    pub fn first_active(&self) -> usize {
        self.first_active
    }

    pub fn first_new(&self) -> usize {
        self.first_new
    }

    pub fn first_free(&self) -> usize {
        self.first_free
    }

    /// 下一个槽位
    #[inline]
    pub fn next(&self, index: usize) -> usize {
        let next = index + 1;
        if next >= self.capacity {
            0
        } else {
            next
        }
    }

    /// 从 `from` 到 `to` 的环形距离
    #[inline]
    pub fn span(&self, from: usize, to: usize) -> usize {
        if to >= from {
            to - from
        } else {
            to + self.capacity - from
        }
    }

    pub fn retired_count(&self) -> usize {
        self.span(self.first_retired, self.first_active)
    }

    /// 存活粒子数：`[first_active, first_free)`
    pub fn alive_count(&self) -> usize {
        self.span(self.first_active, self.first_free)
    }

    pub fn uploaded_count(&self) -> usize {
        self.span(self.first_active, self.first_new)
    }

    pub fn pending_upload_count(&self) -> usize {
        self.span(self.first_new, self.first_free)
    }

    pub fn free_count(&self) -> usize {
        self.capacity - self.retired_count() - self.alive_count()
    }

    /// 下一次分配会碰到退役游标
    pub fn is_full(&self) -> bool {
        self.next(self.first_free) == self.first_retired
    }

    /// 槽位所属区域
    pub fn region_of(&self, slot: usize) -> RingRegion {
        let offset = self.span(self.first_retired, slot % self.capacity);
        let retired = self.retired_count();
        let uploaded = retired + self.uploaded_count();
        let alive = retired + self.alive_count();
        if offset < retired {
            RingRegion::Retired
        } else if offset < uploaded {
            RingRegion::Active
        } else if offset < alive {
            RingRegion::New
        } else {
            RingRegion::Free
        }
    }

    /// 占用一个空闲槽，返回其索引；环已满时返回 `None`
    pub fn push_free(&mut self) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.first_free;
        self.first_free = self.next(slot);
        Some(slot)
    }

    /// 最旧的已上传存活粒子转为退役
    pub fn retire_front(&mut self) -> Option<usize> {
        if self.first_active == self.first_new {
            return None;
        }
        let slot = self.first_active;
        self.first_active = self.next(slot);
        Some(slot)
    }

    /// 最旧的退役槽转为空闲，永远不会越过 `first_active`
    pub fn free_front(&mut self) -> Option<usize> {
        if self.first_retired == self.first_active {
            return None;
        }
        let slot = self.first_retired;
        self.first_retired = self.next(slot);
        Some(slot)
    }

    /// 新写入的区域已上传
    pub fn mark_uploaded(&mut self) {
        self.first_new = self.first_free;
    }

    /// 所有存活粒子立即退役（含尚未上传的）
    pub fn retire_all(&mut self) {
        self.first_active = self.first_free;
        self.first_new = self.first_free;
    }

    /// 待上传区域的连续子区间，回绕时最多两段
    pub fn pending_ranges(&self) -> [Option<(usize, usize)>; 2] {
        self.split(self.first_new, self.first_free)
    }

    /// 存活区域（绘制范围）的连续子区间
    pub fn alive_ranges(&self) -> [Option<(usize, usize)>; 2] {
        self.split(self.first_active, self.first_free)
    }

    fn split(&self, start: usize, end: usize) -> [Option<(usize, usize)>; 2] {
        if start == end {
            [None, None]
        } else if start < end {
            [Some((start, end)), None]
        } else if end > 0 {
            [Some((start, self.capacity)), Some((0, end))]
        } else {
            [Some((start, self.capacity)), None]
        }
    }

    /// 在 `first_free` 的哨兵槽之后插入 `additional` 个空闲槽，返回插入位置
    ///
    /// 插入位置之后（按数组索引）的游标整体后移，四段区域内容保持不变。
    pub fn grow(&mut self, additional: usize) -> usize {
        let insert_at = self.first_free + 1;
        let shift = |cursor: &mut usize| {
            if *cursor >= insert_at {
                *cursor += additional;
            }
        };
        shift(&mut self.first_retired);
        shift(&mut self.first_active);
        shift(&mut self.first_new);
        self.capacity += additional;
        insert_at
    }

    /// 清空所有区域
    pub fn reset(&mut self) {
        self.first_retired = 0;
        self.first_active = 0;
        self.first_new = 0;
        self.first_free = 0;
    }

    /// 检查游标顺序不变量
    pub fn check_invariants(&self) -> bool {
        let cursors = [
            self.first_retired,
            self.first_active,
            self.first_new,
            self.first_free,
        ];
        cursors.iter().all(|c| *c < self.capacity)
            && self.retired_count() + self.alive_count() < self.capacity
            && self.uploaded_count() + self.pending_upload_count() == self.alive_count()
    }
}
