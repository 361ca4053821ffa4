//! CPU reference backend.
//!
//! Keeps every texture as a plain byte vector and executes the device
//! contract synchronously. It is the fallback when no hardware adapter is
//! available and the deterministic target for the contract tests, where
//! its capability flags can be narrowed to exercise the slow paths.

use std::collections::HashMap;

use crate::backend::caps::Capabilities;
use crate::backend::pass::{OpsRenderPass, PassCommand, PassId};
use crate::backend::pixels;
use crate::backend::traits::{Gpu, GpuError, GpuResult};
use crate::backend::types::{
    Fence, PixelFormat, Point, Rect, RenderTarget, Semaphore, TextureSampler,
};

struct CpuTexture {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

struct CpuRenderTarget {
    texture_id: u64,
    /// Separate sample buffer for multisampled targets. Same pixel layout
    /// as the attached texture; the CPU keeps one sample per texel.
    msaa: Option<Vec<u8>>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

/// Software implementation of the [`Gpu`] facade.
pub struct SoftwareGpu {
    caps: Capabilities,
    textures: HashMap<u64, CpuTexture>,
    render_targets: HashMap<u64, CpuRenderTarget>,
    fences: HashMap<u64, ()>,
    next_texture_id: u64,
    next_render_target_id: u64,
    next_fence_id: u64,
    ops_render_pass: Option<OpsRenderPass>,
}

impl SoftwareGpu {
    pub fn new() -> Self {
        Self::with_caps(Capabilities::default())
    }

    /// Build a device with the given capability flags. Tests use this to
    /// force the per-row upload path or disable fences.
    pub fn with_caps(caps: Capabilities) -> Self {
        Self {
            caps,
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            fences: HashMap::new(),
            next_texture_id: 1,
            next_render_target_id: 1,
            next_fence_id: 1,
            ops_render_pass: None,
        }
    }

    fn clear_pattern(format: PixelFormat, color: [f64; 4]) -> Vec<u8> {
        let to_byte = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let [r, g, b, a] = color.map(to_byte);
        match format {
            PixelFormat::Rgba8 => vec![r, g, b, a],
            PixelFormat::Bgra8 => vec![b, g, r, a],
            PixelFormat::Alpha8 => vec![a],
            PixelFormat::Gray8 => vec![r],
        }
    }

    /// Replay a pass recording. Draws land in the MSAA buffer when one
    /// exists, otherwise directly in the attached texture.
    fn execute_commands(
        target: &mut CpuRenderTarget,
        attached: Option<&mut CpuTexture>,
        commands: &[PassCommand],
    ) {
        let format = target.format;
        let surface: &mut [u8] = match target.msaa.as_mut() {
            Some(buffer) => buffer,
            None => match attached {
                Some(texture) => &mut texture.data,
                None => return,
            },
        };
        for command in commands {
            match command {
                PassCommand::Clear(color) => {
                    let pattern = Self::clear_pattern(format, *color);
                    for chunk in surface.chunks_exact_mut(pattern.len()) {
                        chunk.copy_from_slice(&pattern);
                    }
                }
            }
        }
    }
}

impl Default for SoftwareGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpu for SoftwareGpu {
    fn name(&self) -> &'static str {
        "software"
    }

    fn caps(&self) -> &Capabilities {
        &self.caps
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GpuResult<TextureSampler> {
        let max = self.caps.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::InvalidTextureSize { width, height, max });
        }
        let size = width as usize * height as usize * format.bytes_per_pixel();
        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            CpuTexture {
                width,
                height,
                format,
                data: vec![0; size],
            },
        );
        log::trace!("software: created texture {} ({}x{} {:?})", id, width, height, format);
        Ok(TextureSampler::new(id, format, width, height))
    }

    fn delete_texture(&mut self, sampler: &mut TextureSampler) {
        if sampler.is_released() {
            return;
        }
        self.textures.remove(&sampler.id);
        log::trace!("software: deleted texture {}", sampler.id);
        sampler.id = 0;
    }

    fn write_pixels(&mut self, sampler: &TextureSampler, rect: Rect, pixels: &[u8], row_bytes: usize) {
        if !pixels::write_args_valid(sampler, rect, pixels.len(), row_bytes) {
            return;
        }
        let Some(texture) = self.textures.get_mut(&sampler.id) else {
            log::warn!("write_pixels: unknown texture {}", sampler.id);
            return;
        };
        // Any transfer plan reduces to a row loop on the CPU.
        let bpp = texture.format.bytes_per_pixel();
        let dst_stride = texture.width as usize * bpp;
        let copy_bytes = rect.width as usize * bpp;
        for row in 0..rect.height as usize {
            let src_start = row * row_bytes;
            let dst_start = (rect.y as usize + row) * dst_stride + rect.x as usize * bpp;
            texture.data[dst_start..dst_start + copy_bytes]
                .copy_from_slice(&pixels[src_start..src_start + copy_bytes]);
        }
    }

    fn read_pixels(&mut self, sampler: &TextureSampler, rect: Rect) -> Option<Vec<u8>> {
        if sampler.is_released() || rect.is_empty() {
            return None;
        }
        let texture = self.textures.get(&sampler.id)?;
        if !rect.fits_within(texture.width, texture.height) {
            return None;
        }
        let bpp = texture.format.bytes_per_pixel();
        let src_stride = texture.width as usize * bpp;
        let copy_bytes = rect.width as usize * bpp;
        let mut out = Vec::with_capacity(rect.height as usize * copy_bytes);
        for row in 0..rect.height as usize {
            let start = (rect.y as usize + row) * src_stride + rect.x as usize * bpp;
            out.extend_from_slice(&texture.data[start..start + copy_bytes]);
        }
        Some(out)
    }

    fn create_render_target(
        &mut self,
        texture: &TextureSampler,
        sample_count: u32,
    ) -> GpuResult<RenderTarget> {
        if texture.is_released() || !self.textures.contains_key(&texture.id) {
            return Err(GpuError::RenderTargetCreationFailed(
                "attached texture is released".into(),
            ));
        }
        let samples = if sample_count > 1 && self.caps.msaa_support {
            sample_count
        } else {
            1
        };
        let msaa = (samples > 1).then(|| {
            vec![0; texture.width() as usize * texture.height() as usize * texture.format().bytes_per_pixel()]
        });
        let id = self.next_render_target_id;
        self.next_render_target_id += 1;
        self.render_targets.insert(
            id,
            CpuRenderTarget {
                texture_id: texture.id,
                msaa,
                width: texture.width(),
                height: texture.height(),
                format: texture.format(),
            },
        );
        log::trace!("software: created render target {} ({} samples)", id, samples);
        Ok(RenderTarget::new(
            id,
            texture.id,
            samples,
            texture.width(),
            texture.height(),
            texture.format(),
        ))
    }

    fn delete_render_target(&mut self, target: &mut RenderTarget) {
        if target.is_released() {
            return;
        }
        self.render_targets.remove(&target.id);
        log::trace!("software: deleted render target {}", target.id);
        target.id = 0;
    }

    fn copy_render_target_to_texture(
        &mut self,
        target: &RenderTarget,
        texture: &TextureSampler,
        src_rect: Rect,
        dst_point: Point,
    ) {
        if target.is_released() || texture.is_released() || src_rect.is_empty() {
            return;
        }
        let Some(rt) = self.render_targets.get(&target.id) else {
            return;
        };
        if !src_rect.fits_within(rt.width, rt.height) {
            log::warn!("copy_render_target_to_texture: source rect out of bounds, ignoring");
            return;
        }
        let dst_rect = Rect::new(dst_point.x, dst_point.y, src_rect.width, src_rect.height);
        // Collect source rows first; source and destination may alias the
        // same texture map.
        let rows = match self.textures.get(&rt.texture_id) {
            Some(source) => {
                let bpp = source.format.bytes_per_pixel();
                let stride = source.width as usize * bpp;
                let copy_bytes = src_rect.width as usize * bpp;
                let mut buf = Vec::with_capacity(src_rect.height as usize * copy_bytes);
                for row in 0..src_rect.height as usize {
                    let start = (src_rect.y as usize + row) * stride + src_rect.x as usize * bpp;
                    buf.extend_from_slice(&source.data[start..start + copy_bytes]);
                }
                buf
            }
            None => return,
        };
        let Some(dst) = self.textures.get_mut(&texture.id) else {
            return;
        };
        if !dst_rect.fits_within(dst.width, dst.height) {
            log::warn!("copy_render_target_to_texture: destination rect out of bounds, ignoring");
            return;
        }
        let bpp = dst.format.bytes_per_pixel();
        let stride = dst.width as usize * bpp;
        let copy_bytes = dst_rect.width as usize * bpp;
        for row in 0..dst_rect.height as usize {
            let start = (dst_rect.y as usize + row) * stride + dst_rect.x as usize * bpp;
            dst.data[start..start + copy_bytes]
                .copy_from_slice(&rows[row * copy_bytes..(row + 1) * copy_bytes]);
        }
    }

    fn resolve_render_target(&mut self, target: &RenderTarget) {
        if target.is_released() {
            return;
        }
        let Some(rt) = self.render_targets.get(&target.id) else {
            return;
        };
        let Some(samples) = rt.msaa.clone() else {
            return;
        };
        if let Some(texture) = self.textures.get_mut(&rt.texture_id) {
            texture.data.copy_from_slice(&samples);
        }
    }

    fn insert_semaphore(&mut self, semaphore: Option<&mut Semaphore>) -> bool {
        let Some(semaphore) = semaphore else {
            return false;
        };
        if !self.caps.fence_sync_support {
            return false;
        }
        // All CPU work is done by the time the fence exists.
        let id = self.next_fence_id;
        self.next_fence_id += 1;
        self.fences.insert(id, ());
        semaphore.fence = Some(Fence(id));
        true
    }

    fn wait_semaphore(&mut self, semaphore: &mut Semaphore) -> bool {
        let Some(fence) = semaphore.fence.take() else {
            return false;
        };
        self.fences.remove(&fence.0).is_some()
    }

    fn get_ops_render_pass(
        &mut self,
        target: &RenderTarget,
        texture: &TextureSampler,
    ) -> Option<&mut OpsRenderPass> {
        if target.is_released() || texture.is_released() {
            return None;
        }
        let pass = self
            .ops_render_pass
            .get_or_insert_with(|| OpsRenderPass::new(PassId(1)));
        pass.bind(target, texture);
        Some(pass)
    }

    fn submit(&mut self, _pass: PassId) {
        let recording = self
            .ops_render_pass
            .as_mut()
            .and_then(|pass| pass.take_recording());
        let Some((binding, commands)) = recording else {
            log::warn!("submit: no render pass recording to flush");
            return;
        };
        let Some(target) = self.render_targets.get_mut(&binding.render_target) else {
            return;
        };
        let attached = self.textures.get_mut(&target.texture_id);
        Self::execute_commands(target, attached, &commands);
    }
}
