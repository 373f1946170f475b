//! 实例数据布局
//!
//! 每个粒子槽是实例缓冲区中 `index * stride` 处的一段定长 f32 记录：
//!
//! | 字段 | 浮点数 |
//! |---|---|
//! | 生成位置 | 3 |
//! | 生成方向（单位向量） | 3 |
//! | 生成时间 / 退役帧号 | 1 |
//! | 起始生命周期 | 1 |
//! | 起始颜色 RGBA | 4 |
//! | 起始大小 | 1 或 3 |
//! | 起始旋转 | 1 或 3 |
//! | 起始速度 | 1 |
//! | 着色器随机数 | 4 |
//! | 速度随机数 | 4 |
//! | 世界空间位置 + 旋转快照（仅世界空间模拟） | 7 |
//! | UV 图块动画参数 | 4 |
//!
//! 步长在配置确定后固定不变。

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::ring::RingRegion;

/// 模拟空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationSpace {
    /// 粒子跟随发射器移动
    #[default]
    Local,
    /// 粒子生成后留在世界空间，记录中保存发射器变换快照
    World,
}

/// 一次生成写入的全部属性
///
/// 调用方在栈上构造，不经过任何共享的临时缓冲。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnAttributes {
    pub position: Vec3,
    pub direction: Vec3,
    /// 绝对生成时间（秒）
    pub time: f32,
    pub lifetime: f32,
    pub color: Vec4,
    pub size: Vec3,
    pub rotation: Vec3,
    pub speed: f32,
    pub shader_random: Vec4,
    pub velocity_random: Vec4,
    /// 世界空间快照（位置, 旋转）
    pub world: Option<(Vec3, Quat)>,
    /// `[图块宽, 图块高, u0, v0]`
    pub uv_tile: Vec4,
}

impl Default for SpawnAttributes {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::Z,
            time: 0.0,
            lifetime: 1.0,
            color: Vec4::ONE,
            size: Vec3::ONE,
            rotation: Vec3::ZERO,
            speed: 0.0,
            shader_random: Vec4::ZERO,
            velocity_random: Vec4::ZERO,
            world: None,
            uv_tile: Vec4::new(1.0, 1.0, 0.0, 0.0),
        }
    }
}

/// 记录内各字段的浮点偏移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticleLayout {
    size_components: usize,
    rotation_components: usize,
    space: SimulationSpace,
    color: usize,
    size: usize,
    rotation: usize,
    speed: usize,
    shader_random: usize,
    velocity_random: usize,
    world: Option<usize>,
    uv_tile: usize,
    stride: usize,
}

impl ParticleLayout {
    pub const POSITION: usize = 0;
    pub const DIRECTION: usize = 3;
    /// 生成时间；退役后复用为退役帧号
    pub const TIME: usize = 6;
    pub const LIFETIME: usize = 7;

    pub fn new(size_3d: bool, rotation_3d: bool, space: SimulationSpace) -> Self {
        let size_components = if size_3d { 3 } else { 1 };
        let rotation_components = if rotation_3d { 3 } else { 1 };

        let color = Self::LIFETIME + 1;
        let size = color + 4;
        let rotation = size + size_components;
        let speed = rotation + rotation_components;
        let shader_random = speed + 1;
        let velocity_random = shader_random + 4;
        let mut next = velocity_random + 4;
        let world = match space {
            SimulationSpace::World => {
                let offset = next;
                next += 7;
                Some(offset)
            }
            SimulationSpace::Local => None,
        };
        let uv_tile = next;
        let stride = uv_tile + 4;

        Self {
            size_components,
            rotation_components,
            space,
            color,
            size,
            rotation,
            speed,
            shader_random,
            velocity_random,
            world,
            uv_tile,
            stride,
        }
    }

    /// 每个粒子的浮点数
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 每个粒子的字节数
    pub fn stride_bytes(&self) -> usize {
        self.stride * std::mem::size_of::<f32>()
    }

    pub fn space(&self) -> SimulationSpace {
        self.space
    }

    pub fn color_offset(&self) -> usize {
        self.color
    }

    pub fn size_offset(&self) -> usize {
        self.size
    }

    pub fn rotation_offset(&self) -> usize {
        self.rotation
    }

    pub fn speed_offset(&self) -> usize {
        self.speed
    }

    pub fn world_offset(&self) -> Option<usize> {
        self.world
    }

    pub fn uv_tile_offset(&self) -> usize {
        self.uv_tile
    }

    /// 写入一条记录，`record` 长度必须等于步长
    pub fn write(&self, record: &mut [f32], attrs: &SpawnAttributes) {
        debug_assert_eq!(record.len(), self.stride);

        record[Self::POSITION..Self::POSITION + 3].copy_from_slice(&attrs.position.to_array());
        record[Self::DIRECTION..Self::DIRECTION + 3].copy_from_slice(&attrs.direction.to_array());
        record[Self::TIME] = attrs.time;
        record[Self::LIFETIME] = attrs.lifetime;
        record[self.color..self.color + 4].copy_from_slice(&attrs.color.to_array());

        if self.size_components == 3 {
            record[self.size..self.size + 3].copy_from_slice(&attrs.size.to_array());
        } else {
            record[self.size] = attrs.size.x;
        }
        if self.rotation_components == 3 {
            record[self.rotation..self.rotation + 3].copy_from_slice(&attrs.rotation.to_array());
        } else {
            record[self.rotation] = attrs.rotation.z;
        }

        record[self.speed] = attrs.speed;
        record[self.shader_random..self.shader_random + 4]
            .copy_from_slice(&attrs.shader_random.to_array());
        record[self.velocity_random..self.velocity_random + 4]
            .copy_from_slice(&attrs.velocity_random.to_array());

        if let Some(offset) = self.world {
            let (position, rotation) = attrs.world.unwrap_or((Vec3::ZERO, Quat::IDENTITY));
            record[offset..offset + 3].copy_from_slice(&position.to_array());
            record[offset + 3..offset + 7].copy_from_slice(&rotation.to_array());
        }

        record[self.uv_tile..self.uv_tile + 4].copy_from_slice(&attrs.uv_tile.to_array());
    }

    /// 存活粒子的生成时间
    pub fn spawn_time(&self, record: &[f32]) -> f32 {
        record[Self::TIME]
    }

    pub fn lifetime(&self, record: &[f32]) -> f32 {
        record[Self::LIFETIME]
    }
}

// ============================================================================
// 生成时间字段的复用
// ============================================================================
//
// 同一个 TIME 字段在两种槽状态下含义不同，由槽所在的环形区域决定：
// - Active / New 区域：相对时钟基准的生成时间（秒，f32）
// - Retired 区域：退役帧号，按位存储为 u32，保证大帧号无损
//
// 增量上传只覆盖 New 区域，退役槽在 GPU 上通常仍是原来的生成时间。
// 扩容后的整体上传会把帧号位模式也写进去，这些槽不在绘制区间内，不会被读取。

/// 槽内时间字段的两种解释
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotStamp {
    Spawned { time: f32 },
    Retired { frame: u32 },
}

/// 写入退役帧号
pub fn write_retired_frame(record: &mut [f32], frame: u32) {
    record[ParticleLayout::TIME] = f32::from_bits(frame);
}

/// 读取退役帧号
pub fn read_retired_frame(record: &[f32]) -> u32 {
    record[ParticleLayout::TIME].to_bits()
}

/// 按槽所在区域读取时间字段，空闲槽没有有效内容
pub fn read_stamp(record: &[f32], region: RingRegion) -> Option<SlotStamp> {
    match region {
        RingRegion::Retired => Some(SlotStamp::Retired {
            frame: read_retired_frame(record),
        }),
        RingRegion::Active | RingRegion::New => Some(SlotStamp::Spawned {
            time: record[ParticleLayout::TIME],
        }),
        RingRegion::Free => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_layout_stride() {
        // 3+3+1+1+4+1+1+1+4+4+4
        let layout = ParticleLayout::new(false, false, SimulationSpace::Local);
        assert_eq!(layout.stride(), 27);
        assert_eq!(layout.stride_bytes(), 108);
        assert_eq!(layout.world_offset(), None);
    }

    #[test]
    fn test_world_layout_stride() {
        let layout = ParticleLayout::new(true, true, SimulationSpace::World);
        assert_eq!(layout.stride(), 27 + 2 + 2 + 7);
        assert_eq!(layout.uv_tile_offset(), layout.stride() - 4);
    }

    #[test]
    fn test_write_record() {
        let layout = ParticleLayout::new(true, false, SimulationSpace::World);
        let mut record = vec![0.0; layout.stride()];
        let attrs = SpawnAttributes {
            position: Vec3::new(1.0, 2.0, 3.0),
            direction: Vec3::Y,
            time: 4.5,
            lifetime: 2.0,
            color: Vec4::new(0.1, 0.2, 0.3, 0.4),
            size: Vec3::new(5.0, 6.0, 7.0),
            rotation: Vec3::new(0.0, 0.0, 1.5),
            speed: 9.0,
            world: Some((Vec3::new(10.0, 11.0, 12.0), Quat::IDENTITY)),
            ..Default::default()
        };
        layout.write(&mut record, &attrs);

        assert_eq!(&record[0..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&record[3..6], &[0.0, 1.0, 0.0]);
        assert_eq!(layout.spawn_time(&record), 4.5);
        assert_eq!(layout.lifetime(&record), 2.0);
        let size = layout.size_offset();
        assert_eq!(&record[size..size + 3], &[5.0, 6.0, 7.0]);
        assert_eq!(record[layout.rotation_offset()], 1.5);
        assert_eq!(record[layout.speed_offset()], 9.0);
        let world = layout.world_offset().unwrap_or_default();
        assert_eq!(&record[world..world + 7], &[10.0, 11.0, 12.0, 0.0, 0.0, 0.0, 1.0]);
        let uv = layout.uv_tile_offset();
        assert_eq!(&record[uv..uv + 4], &[1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_retired_frame_is_lossless() {
        let layout = ParticleLayout::new(false, false, SimulationSpace::Local);
        let mut record = vec![0.0; layout.stride()];
        // 超过 f32 尾数精度的帧号
        let frame = (1u32 << 24) + 1;
        write_retired_frame(&mut record, frame);
        assert_eq!(read_retired_frame(&record), frame);
        assert_eq!(
            read_stamp(&record, RingRegion::Retired),
            Some(SlotStamp::Retired { frame })
        );
        assert_eq!(read_stamp(&record, RingRegion::Free), None);
    }
}
