//! Pooled render pass with buffered command recording.
//!
//! The device keeps a single pass object and rebinds it to whatever render
//! target the caller asks for, so repeated begin/end cycles allocate
//! nothing. Commands recorded between a bind and a submit are buffered in
//! order and encoded into real device work only when the frame is
//! submitted.

use crate::backend::types::{RenderTarget, TextureSampler};

/// Identifier of a device-pooled render pass, passed back to
/// [`Gpu::submit`] to close the recording.
///
/// [`Gpu::submit`]: crate::Gpu::submit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassId(pub(crate) u64);

/// A recorded operation, replayed at submit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PassCommand {
    Clear([f64; 4]),
}

/// Attachment pair a pass is currently recording against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassBinding {
    pub render_target: u64,
    pub texture: u64,
}

/// Reusable render pass bound to one render target at a time.
#[derive(Debug)]
pub struct OpsRenderPass {
    id: PassId,
    binding: Option<PassBinding>,
    commands: Vec<PassCommand>,
}

impl OpsRenderPass {
    pub(crate) fn new(id: PassId) -> Self {
        Self {
            id,
            binding: None,
            commands: Vec::new(),
        }
    }

    pub fn id(&self) -> PassId {
        self.id
    }

    /// Re-point the pass at a new attachment pair, discarding any
    /// commands recorded against the previous one.
    pub(crate) fn bind(&mut self, target: &RenderTarget, texture: &TextureSampler) {
        self.binding = Some(PassBinding {
            render_target: target.id,
            texture: texture.id,
        });
        self.commands.clear();
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Native handle of the bound render target, if any.
    pub fn bound_render_target(&self) -> Option<u64> {
        self.binding.map(|b| b.render_target)
    }

    /// Native handle of the texture attached to the bound target, if any.
    pub fn bound_texture(&self) -> Option<u64> {
        self.binding.map(|b| b.texture)
    }

    /// Record a full-target clear to the given RGBA color.
    pub fn clear(&mut self, color: [f32; 4]) {
        if self.binding.is_none() {
            log::warn!("clear recorded on an unbound render pass, ignoring");
            return;
        }
        self.commands.push(PassCommand::Clear(color.map(f64::from)));
    }

    /// Detach the pass and hand its recording to the device. Returns
    /// `None` when nothing was bound since the last submit.
    pub(crate) fn take_recording(&mut self) -> Option<(PassBinding, Vec<PassCommand>)> {
        let binding = self.binding.take()?;
        Some((binding, std::mem::take(&mut self.commands)))
    }
}
