//! wgpu backend for [`RenderDevice`](crate::device::RenderDevice).

pub mod context;
pub mod device;
pub mod pipelines;
pub mod readback;

pub use context::WgpuContext;
pub use device::{WgpuDepth, WgpuDevice, WgpuTexture, WgpuUniform};
pub use readback::StagingSlot;
