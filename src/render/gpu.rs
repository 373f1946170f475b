//! wgpu 实例缓冲区后端
//!
//! 粒子记录以顶点实例数据的形式绑定，写入走 `Queue::write_buffer`，
//! 由 wgpu 在下一次提交前完成暂存拷贝。

use std::sync::Arc;

use crate::core::error::{ParticleError, ParticleResult};
use crate::render::particles::upload::{DeviceBuffer, InstanceDevice};

/// wgpu 设备和队列
#[derive(Clone)]
pub struct WgpuDevice {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl WgpuDevice {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// 创建不带窗口的设备，用于离屏模拟
    pub fn new_headless() -> ParticleResult<Self> {
        pollster::block_on(Self::request_headless())
    }

    async fn request_headless() -> ParticleResult<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                ParticleError::DeviceUnavailable("no compatible adapter found".to_string())
            })?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("Particle Device"),
                },
                None,
            )
            .await
            .map_err(|e| ParticleError::DeviceUnavailable(e.to_string()))?;

        tracing::info!(
            target: "particles",
            "Using adapter {}",
            adapter.get_info().name
        );
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

/// wgpu 实例缓冲区
pub struct WgpuInstanceBuffer {
    buffer: wgpu::Buffer,
    queue: Arc<wgpu::Queue>,
    size: usize,
}

impl WgpuInstanceBuffer {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

impl DeviceBuffer for WgpuInstanceBuffer {
    fn write(&mut self, dest_offset: usize, bytes: &[u8]) {
        self.queue
            .write_buffer(&self.buffer, dest_offset as wgpu::BufferAddress, bytes);
    }

    fn byte_size(&self) -> usize {
        self.size
    }
}

impl Drop for WgpuInstanceBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

impl InstanceDevice for WgpuDevice {
    type Buffer = WgpuInstanceBuffer;

    fn create_instance_buffer(&self, byte_size: usize) -> ParticleResult<WgpuInstanceBuffer> {
        let limit = self.device.limits().max_buffer_size;
        if byte_size as u64 > limit {
            return Err(ParticleError::BufferCreation {
                size: byte_size,
                reason: format!("exceeds device limit of {} bytes", limit),
            });
        }

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Instance Buffer"),
            size: byte_size as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(WgpuInstanceBuffer {
            buffer,
            queue: Arc::clone(&self.queue),
            size: byte_size,
        })
    }
}
