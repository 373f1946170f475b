use super::{ConfigError, ConfigResult};
use crate::render::particles::burst::{Burst, BurstList};
use crate::render::particles::curve::{MinMaxColor, MinMaxValue};
use crate::render::particles::layout::SimulationSpace;
use crate::render::particles::shape::EmitterShape;
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// 粒子系统配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    /// 初始槽数（可同时存活 `capacity - 1` 个粒子）
    pub capacity: usize,

    /// 扩容上限
    pub max_capacity: usize,

    /// 每次扩容的槽数
    pub growth_increment: usize,

    /// 周期长度（秒）
    pub duration: f32,

    /// 是否循环
    pub looping: bool,

    /// 创建后立即播放
    pub play_on_start: bool,

    /// 发射速率（每秒），按周期内归一化时间求值
    pub emission_rate: MinMaxValue,

    /// 单帧连续发射上限
    pub max_rate_emissions: usize,

    /// 爆发列表
    pub bursts: Vec<BurstConfig>,

    /// 起始生命周期（秒）
    pub start_lifetime: MinMaxValue,

    /// 起始速度
    pub start_speed: MinMaxValue,

    /// 起始大小，3D 时作为 X 分量
    pub start_size: MinMaxValue,
    pub start_size_3d: bool,
    pub start_size_y: MinMaxValue,
    pub start_size_z: MinMaxValue,

    /// 起始旋转（弧度），3D 时作为 Z 分量
    pub start_rotation: MinMaxValue,
    pub start_rotation_3d: bool,
    pub start_rotation_x: MinMaxValue,
    pub start_rotation_y: MinMaxValue,

    /// 起始颜色
    pub start_color: MinMaxColor,

    /// 模拟空间
    pub simulation_space: SimulationSpace,

    /// 发射形状
    pub shape: EmitterShape,

    /// 纹理图集动画
    pub texture_sheet: Option<TextureSheetConfig>,

    /// 退役槽复用前等待的帧数（至少 1）
    pub retire_frame_delay: u32,

    /// 随机种子，`None` 时使用系统熵
    pub seed: Option<u64>,
}

impl_default!(ParticleSystemConfig {
    capacity: 1024,
    max_capacity: 16384,
    growth_increment: 256,
    duration: 5.0,
    looping: true,
    play_on_start: true,
    emission_rate: MinMaxValue::constant(10.0),
    max_rate_emissions: 4096,
    bursts: Vec::new(),
    start_lifetime: MinMaxValue::constant(5.0),
    start_speed: MinMaxValue::constant(5.0),
    start_size: MinMaxValue::constant(1.0),
    start_size_3d: false,
    start_size_y: MinMaxValue::constant(1.0),
    start_size_z: MinMaxValue::constant(1.0),
    start_rotation: MinMaxValue::constant(0.0),
    start_rotation_3d: false,
    start_rotation_x: MinMaxValue::constant(0.0),
    start_rotation_y: MinMaxValue::constant(0.0),
    start_color: MinMaxColor::constant(Vec4::ONE),
    simulation_space: SimulationSpace::Local,
    shape: EmitterShape::Point,
    texture_sheet: None,
    retire_frame_delay: 1,
    seed: None,
});

impl ParticleSystemConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Particle capacity must be at least 1".to_string(),
            ));
        }
        if self.max_capacity < self.capacity {
            return Err(ConfigError::ValidationError(format!(
                "max_capacity {} is smaller than capacity {}",
                self.max_capacity, self.capacity
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ConfigError::ValidationError(
                "Duration must be a positive number of seconds".to_string(),
            ));
        }
        if self.emission_rate.min_value() < 0.0 {
            return Err(ConfigError::ValidationError(
                "Emission rate cannot be negative".to_string(),
            ));
        }
        if self.start_lifetime.min_value() < 0.0 {
            return Err(ConfigError::ValidationError(
                "Start lifetime cannot be negative".to_string(),
            ));
        }
        if self.retire_frame_delay == 0 {
            return Err(ConfigError::ValidationError(
                "retire_frame_delay must be at least 1".to_string(),
            ));
        }
        if !self.shape.is_valid() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid emitter shape {:?}",
                self.shape
            )));
        }
        for burst in &self.bursts {
            burst.validate(self.duration)?;
        }
        if let Some(sheet) = &self.texture_sheet {
            sheet.validate()?;
        }
        Ok(())
    }

    /// 按时间排序的爆发列表
    pub fn burst_list(&self) -> BurstList {
        self.bursts.iter().map(BurstConfig::to_burst).collect()
    }
}

/// 爆发配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstConfig {
    /// 周期内触发时间（秒）
    pub time: f32,

    /// 数量
    pub count: MinMaxValue,
}

impl BurstConfig {
    pub fn new(time: f32, count: u32) -> Self {
        Self {
            time,
            count: MinMaxValue::constant(count as f32),
        }
    }

    /// 验证配置，触发时间必须落在周期内
    pub fn validate(&self, duration: f32) -> ConfigResult<()> {
        if !self.time.is_finite() || self.time < 0.0 || self.time > duration {
            return Err(ConfigError::ValidationError(format!(
                "Burst time {} must lie within [0, {}]",
                self.time, duration
            )));
        }
        Ok(())
    }

    pub fn to_burst(&self) -> Burst {
        Burst::new(self.time, self.count.clone())
    }
}

/// 纹理图集动画配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSheetConfig {
    /// 横向图块数
    pub tiles_x: u32,

    /// 纵向图块数
    pub tiles_y: u32,

    /// 起始帧，按行优先编号
    #[serde(default = "default_start_frame")]
    pub start_frame: MinMaxValue,
}

fn default_start_frame() -> MinMaxValue {
    MinMaxValue::constant(0.0)
}

impl TextureSheetConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return Err(ConfigError::ValidationError(
                "Texture sheet needs at least one tile in each direction".to_string(),
            ));
        }
        Ok(())
    }

    pub fn frame_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }

    /// 起始图块的 `[宽, 高, u0, v0]`
    pub fn start_tile(&self, random: f32) -> Vec4 {
        let tiles_x = self.tiles_x.max(1);
        let tiles_y = self.tiles_y.max(1);
        let last = (tiles_x * tiles_y - 1) as f32;
        let frame = self
            .start_frame
            .sample(None, Some(random))
            .floor()
            .clamp(0.0, last) as u32;

        let width = 1.0 / tiles_x as f32;
        let height = 1.0 / tiles_y as f32;
        Vec4::new(
            width,
            height,
            (frame % tiles_x) as f32 * width,
            (frame / tiles_x) as f32 * height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ParticleSystemConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_duration() {
        let config = ParticleSystemConfig {
            duration: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_max_capacity_below_capacity() {
        let config = ParticleSystemConfig {
            capacity: 64,
            max_capacity: 32,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_burst_time() {
        let config = ParticleSystemConfig {
            bursts: vec![BurstConfig::new(-1.0, 5)],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_burst_after_duration() {
        let config = ParticleSystemConfig {
            duration: 1.0,
            bursts: vec![BurstConfig::new(1.5, 5)],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_burst_list_sorted() {
        let config = ParticleSystemConfig {
            bursts: vec![BurstConfig::new(2.0, 1), BurstConfig::new(0.5, 1)],
            ..Default::default()
        };
        let list = config.burst_list();
        assert_eq!(list.len(), 2);
        assert!(list.is_sorted());
    }

    #[test]
    fn test_start_tile() {
        let sheet = TextureSheetConfig {
            tiles_x: 4,
            tiles_y: 2,
            start_frame: MinMaxValue::constant(5.0),
        };
        assert_eq!(sheet.frame_count(), 8);
        let tile = sheet.start_tile(0.0);
        assert_eq!(tile, Vec4::new(0.25, 0.5, 0.25, 0.5));

        // 超出范围的帧号夹到最后一帧
        let sheet = TextureSheetConfig {
            start_frame: MinMaxValue::constant(100.0),
            ..sheet
        };
        assert_eq!(sheet.start_tile(0.0), Vec4::new(0.25, 0.5, 0.75, 0.5));
    }

    #[test]
    fn test_partial_toml() {
        let config: ParticleSystemConfig = toml::from_str(
            r#"
            capacity = 64
            looping = false

            [emission_rate]
            mode = "random_between"
            min = 5.0
            max = 10.0

            [[bursts]]
            time = 0.5
            count = { mode = "constant", value = 20.0 }
            "#,
        )
        .unwrap();
        assert_eq!(config.capacity, 64);
        assert!(!config.looping);
        assert_eq!(config.emission_rate, MinMaxValue::random_between(5.0, 10.0));
        assert_eq!(config.bursts.len(), 1);
        assert_eq!(config.duration, 5.0);
    }
}
