//! 实例缓冲区上传
//!
//! 每帧只把 `[first_new, first_free)` 的字节区间写入设备缓冲区。
//! 区间回绕时拆成两段，因此一次刷新最多两次写入调用。
//! 扩容之后宿主端数组的槽位整体移动，设备缓冲区按新容量重建并整体写入一次。
//! 时钟平移改写了已上传记录的生成时间，此时缓冲区不重建，只整体写入一次。

use crate::core::error::{ParticleError, ParticleResult};

use super::allocator::ParticleAllocator;

/// 设备端实例缓冲区
pub trait DeviceBuffer {
    /// 把 `bytes` 写入 `dest_offset` 处
    fn write(&mut self, dest_offset: usize, bytes: &[u8]);

    /// 缓冲区字节数
    fn byte_size(&self) -> usize;
}

/// 能创建实例缓冲区的设备
pub trait InstanceDevice {
    type Buffer: DeviceBuffer;

    fn create_instance_buffer(&self, byte_size: usize) -> ParticleResult<Self::Buffer>;
}

/// 一次刷新的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// 写入调用次数
    pub upload_calls: usize,
    /// 写入字节数
    pub bytes_uploaded: usize,
    /// 是否重建了设备缓冲区
    pub recreated: bool,
}

/// 实例数据上传器
pub struct InstanceUploader<D: InstanceDevice> {
    buffer: D::Buffer,
    total_upload_calls: u64,
    total_bytes_uploaded: u64,
}

impl<D: InstanceDevice> InstanceUploader<D> {
    /// 按分配器当前容量创建设备缓冲区
    pub fn new(device: &D, allocator: &ParticleAllocator) -> ParticleResult<Self> {
        let buffer = device.create_instance_buffer(Self::required_bytes(allocator))?;
        Ok(Self {
            buffer,
            total_upload_calls: 0,
            total_bytes_uploaded: 0,
        })
    }

    fn required_bytes(allocator: &ParticleAllocator) -> usize {
        allocator.capacity() * allocator.layout().stride_bytes()
    }

    /// 上传新写入的记录并推进 `first_new`
    pub fn flush_new(
        &mut self,
        device: &D,
        allocator: &mut ParticleAllocator,
    ) -> ParticleResult<FlushReport> {
        let data: &[u8] = bytemuck::cast_slice(allocator.data());

        if allocator.needs_full_upload() || self.buffer.byte_size() < data.len() {
            let old_size = self.buffer.byte_size();
            let recreated = old_size != data.len();
            if recreated {
                self.buffer = device.create_instance_buffer(data.len())?;
                tracing::debug!(
                    target: "particles",
                    "Recreated instance buffer: {} -> {} bytes",
                    old_size,
                    data.len()
                );
            }
            self.buffer.write(0, data);

            let report = FlushReport {
                upload_calls: 1,
                bytes_uploaded: data.len(),
                recreated,
            };
            allocator.mark_uploaded();
            self.record(&report);
            return Ok(report);
        }

        let stride_bytes = allocator.layout().stride_bytes();
        let mut report = FlushReport::default();
        for (start, end) in allocator.ring().pending_ranges().into_iter().flatten() {
            let bytes = &data[start * stride_bytes..end * stride_bytes];
            self.buffer.write(start * stride_bytes, bytes);
            report.upload_calls += 1;
            report.bytes_uploaded += bytes.len();
        }

        allocator.mark_uploaded();
        self.record(&report);
        Ok(report)
    }

    fn record(&mut self, report: &FlushReport) {
        self.total_upload_calls += report.upload_calls as u64;
        self.total_bytes_uploaded += report.bytes_uploaded as u64;
    }

    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut D::Buffer {
        &mut self.buffer
    }

    pub fn total_upload_calls(&self) -> u64 {
        self.total_upload_calls
    }

    pub fn total_bytes_uploaded(&self) -> u64 {
        self.total_bytes_uploaded
    }
}

// ============================================================================
// 宿主内存后端
// ============================================================================

/// 一次写入调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadCall {
    pub dest_offset: usize,
    pub byte_length: usize,
}

/// 宿主内存中的实例缓冲区，记录每次写入
#[derive(Debug, Clone, Default)]
pub struct HostBuffer {
    bytes: Vec<u8>,
    calls: Vec<UploadCall>,
}

impl HostBuffer {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn calls(&self) -> &[UploadCall] {
        &self.calls
    }

    /// 取出并清空写入记录
    pub fn take_calls(&mut self) -> Vec<UploadCall> {
        std::mem::take(&mut self.calls)
    }
}

impl DeviceBuffer for HostBuffer {
    fn write(&mut self, dest_offset: usize, bytes: &[u8]) {
        let end = dest_offset + bytes.len();
        if end > self.bytes.len() {
            // 越界写入在真实设备上是校验错误
            tracing::error!(
                target: "particles",
                "Upload of {} bytes at {} exceeds buffer of {} bytes",
                bytes.len(),
                dest_offset,
                self.bytes.len()
            );
            return;
        }
        self.bytes[dest_offset..end].copy_from_slice(bytes);
        self.calls.push(UploadCall {
            dest_offset,
            byte_length: bytes.len(),
        });
    }

    fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// 宿主内存设备，用于无头运行和测试
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDevice {
    /// 单个缓冲区的字节上限
    pub max_buffer_size: Option<usize>,
}

impl InstanceDevice for HostDevice {
    type Buffer = HostBuffer;

    fn create_instance_buffer(&self, byte_size: usize) -> ParticleResult<HostBuffer> {
        if let Some(limit) = self.max_buffer_size {
            if byte_size > limit {
                return Err(ParticleError::BufferCreation {
                    size: byte_size,
                    reason: format!("exceeds device limit of {} bytes", limit),
                });
            }
        }
        Ok(HostBuffer {
            bytes: vec![0; byte_size],
            calls: Vec::new(),
        })
    }
}
