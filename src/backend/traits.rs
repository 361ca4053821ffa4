//! The backend-agnostic device contract.

use thiserror::Error;

use crate::backend::caps::Capabilities;
use crate::backend::pass::{OpsRenderPass, PassId};
use crate::backend::types::{
    PixelFormat, Point, Rect, RenderTarget, Semaphore, TextureSampler,
};

/// Errors surfaced by fallible device operations.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("device initialization failed: {0}")]
    InitializationFailed(String),

    #[error("texture size {width}x{height} outside the supported range (max {max})")]
    InvalidTextureSize { width: u32, height: u32, max: u32 },

    #[error("pixel format {0:?} is not supported by this device")]
    UnsupportedFormat(PixelFormat),

    #[error("texture allocation failed: {0}")]
    TextureAllocationFailed(String),

    #[error("render target creation failed: {0}")]
    RenderTargetCreationFailed(String),
}

pub type GpuResult<T> = Result<T, GpuError>;

/// Uniform device facade over one GPU backend.
///
/// The device owns every resource it hands out; handles returned from the
/// `create_*` operations stay valid until the matching `delete_*` zeroes
/// them. Operations given a released or foreign handle log and do nothing.
///
/// All methods must be called from the single thread that owns the device.
pub trait Gpu {
    /// Short backend name, for logs and test diagnostics.
    fn name(&self) -> &'static str;

    /// Capability flags probed at initialization.
    fn caps(&self) -> &Capabilities;

    /// Allocate a texture of the given size and format. The contents are
    /// zeroed. Fails when the size is zero or exceeds
    /// [`Capabilities::max_texture_size`], or the format is unsupported.
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GpuResult<TextureSampler>;

    /// Release a texture and zero the handle. Releasing an already-zeroed
    /// handle is a no-op.
    fn delete_texture(&mut self, sampler: &mut TextureSampler);

    /// Upload caller-owned pixels into `rect` of the texture. `row_bytes`
    /// is the source stride and may be wider than the rect; the device
    /// picks the transfer strategy itself. Invalid arguments are logged
    /// and the write is dropped.
    fn write_pixels(&mut self, sampler: &TextureSampler, rect: Rect, pixels: &[u8], row_bytes: usize);

    /// Read `rect` of the texture back as tightly packed rows. Returns
    /// `None` for a released handle or an out-of-bounds rect.
    fn read_pixels(&mut self, sampler: &TextureSampler, rect: Rect) -> Option<Vec<u8>>;

    /// Create a render target attached to `texture`. A `sample_count`
    /// above 1 allocates a separate MSAA buffer of the same size; draws
    /// land there until [`Gpu::resolve_render_target`] copies it into the
    /// attached texture.
    fn create_render_target(
        &mut self,
        texture: &TextureSampler,
        sample_count: u32,
    ) -> GpuResult<RenderTarget>;

    /// Release a render target and zero the handle. The attached texture
    /// is not touched.
    fn delete_render_target(&mut self, target: &mut RenderTarget);

    /// Copy `src_rect` of the target's attached texture into `texture` at
    /// `dst_point`. Out-of-bounds regions are clipped away; released
    /// handles make the copy a no-op.
    fn copy_render_target_to_texture(
        &mut self,
        target: &RenderTarget,
        texture: &TextureSampler,
        src_rect: Rect,
        dst_point: Point,
    );

    /// Resolve a multisampled target's MSAA buffer into its attached
    /// texture. A no-op for single-sampled or released targets, and
    /// idempotent when nothing was drawn in between.
    fn resolve_render_target(&mut self, target: &RenderTarget);

    /// Flush pending work and install a fence covering it into the
    /// semaphore. Returns `false` for a null semaphore or when the device
    /// lacks fence support, in which case the semaphore is left untouched.
    fn insert_semaphore(&mut self, semaphore: Option<&mut Semaphore>) -> bool;

    /// Block until the semaphore's fence has signaled, consuming it.
    /// Returns `false` when the semaphore carries no fence, so a second
    /// wait on the same insertion reports failure instead of blocking.
    fn wait_semaphore(&mut self, semaphore: &mut Semaphore) -> bool;

    /// Obtain the pooled render pass bound to the given attachment pair.
    /// The same pass object is reused across calls; rebinding discards any
    /// unsubmitted recording. Returns `None` when either handle is
    /// released.
    fn get_ops_render_pass(
        &mut self,
        target: &RenderTarget,
        texture: &TextureSampler,
    ) -> Option<&mut OpsRenderPass>;

    /// Encode and submit the pooled pass's recording, then reset the pass
    /// for reuse. Submitting with nothing bound is a logged no-op.
    fn submit(&mut self, pass: PassId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure() {
        let err = GpuError::InvalidTextureSize {
            width: 0,
            height: 16,
            max: 8192,
        };
        assert_eq!(
            err.to_string(),
            "texture size 0x16 outside the supported range (max 8192)"
        );

        let err = GpuError::UnsupportedFormat(PixelFormat::Gray8);
        assert!(err.to_string().contains("Gray8"));
    }
}
