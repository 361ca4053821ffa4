//! gpu-hal - a single-backend GPU hardware abstraction layer
//!
//! This crate owns native GPU resources (textures, render targets,
//! synchronization primitives, a pooled render pass) and exposes a uniform,
//! backend-agnostic contract for creating, mutating, copying and submitting
//! them. A higher-level rendering engine issues drawing work through the
//! [`Gpu`] device facade without depending on any specific driver API.
//!
//! Two backends implement the facade:
//! - **wgpu** (feature `wgpu-backend`, default): the hardware backend,
//!   running headless on whatever adapter the platform offers
//! - **software**: a CPU reference backend, always available, used as the
//!   fallback when no adapter exists and as the deterministic target for
//!   contract tests
//!
//! All device operations are issued from the single thread that owns the
//! rendering context; the facade performs no internal locking.

pub mod backend;

pub use backend::caps::Capabilities;
pub use backend::pass::{OpsRenderPass, PassId};
pub use backend::pixels::TransferPlan;
pub use backend::software::SoftwareGpu;
pub use backend::traits::{Gpu, GpuError, GpuResult};
pub use backend::types::{Fence, PixelFormat, Point, Rect, RenderTarget, Semaphore, TextureSampler};
pub use backend::create_device;

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::{Context, WgpuGpu};
