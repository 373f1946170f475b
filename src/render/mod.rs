#[cfg(feature = "gpu")]
pub mod gpu;
pub mod particles;
