//! Hardware backend on top of wgpu.
//!
//! Runs headless: the context requests whatever adapter the platform
//! offers with no surface attached. Command encoding is lazy; an encoder
//! is opened on first use and flushed to the queue when a frame is
//! submitted or a fence is inserted.

mod format;

use std::collections::HashMap;

use crate::backend::caps::Capabilities;
use crate::backend::pass::{OpsRenderPass, PassCommand, PassId};
use crate::backend::pixels::{self, TransferPlan};
use crate::backend::traits::{Gpu, GpuError, GpuResult};
use crate::backend::types::{
    Fence, PixelFormat, Point, Rect, RenderTarget, Semaphore, TextureSampler,
};

use format::FormatTable;

/// Shared wgpu state behind a [`WgpuGpu`] device.
pub struct Context {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: Capabilities,
    formats: FormatTable,
}

impl Context {
    /// Initialize a headless context on the best available adapter.
    pub fn new() -> GpuResult<Self> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> GpuResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| {
                GpuError::InitializationFailed("no compatible adapter found".into())
            })?;

        let info = adapter.get_info();
        log::info!("selected GPU: {} ({:?} backend)", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("gpu-hal device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|err| GpuError::InitializationFailed(err.to_string()))?;

        let caps = Self::detect_capabilities(&adapter, &device);
        let formats = FormatTable::detect(&adapter);

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            caps,
            formats,
        })
    }

    fn detect_capabilities(adapter: &wgpu::Adapter, device: &wgpu::Device) -> Capabilities {
        let msaa_support = adapter
            .get_texture_format_features(wgpu::TextureFormat::Rgba8Unorm)
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::MULTISAMPLE_X4);
        Capabilities {
            // Strided uploads and fences are core wgpu.
            unpack_row_length_support: true,
            fence_sync_support: true,
            msaa_support,
            max_texture_size: device.limits().max_texture_dimension_2d,
        }
    }

    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }
}

struct TextureEntry {
    texture: wgpu::Texture,
    format: format::FormatEntry,
}

struct RenderTargetEntry {
    texture_id: u64,
    msaa: Option<wgpu::Texture>,
}

/// wgpu implementation of the [`Gpu`] facade.
pub struct WgpuGpu {
    context: Context,
    textures: HashMap<u64, TextureEntry>,
    render_targets: HashMap<u64, RenderTargetEntry>,
    fences: HashMap<u64, wgpu::SubmissionIndex>,
    next_texture_id: u64,
    next_render_target_id: u64,
    next_fence_id: u64,
    encoder: Option<wgpu::CommandEncoder>,
    ops_render_pass: Option<OpsRenderPass>,
}

impl WgpuGpu {
    pub fn new() -> GpuResult<Self> {
        Ok(Self::with_context(Context::new()?))
    }

    pub fn with_context(context: Context) -> Self {
        Self {
            context,
            textures: HashMap::new(),
            render_targets: HashMap::new(),
            fences: HashMap::new(),
            next_texture_id: 1,
            next_render_target_id: 1,
            next_fence_id: 1,
            encoder: None,
            ops_render_pass: None,
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.context.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpu-hal encoder"),
            })
        })
    }

    /// Submit the pending encoder, if any, and everything queued before
    /// it. Always yields a submission index, so a fence can cover queued
    /// writes even when no commands were encoded.
    fn flush(&mut self) -> wgpu::SubmissionIndex {
        let buffers = self.encoder.take().map(wgpu::CommandEncoder::finish);
        self.context.queue.submit(buffers)
    }

    /// Create a texture under error scopes so driver failures surface as
    /// values instead of device loss.
    fn create_native_texture(
        &self,
        descriptor: &wgpu::TextureDescriptor,
    ) -> Result<wgpu::Texture, String> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = device.create_texture(descriptor);
        let oom = pollster::block_on(device.pop_error_scope());
        let validation = pollster::block_on(device.pop_error_scope());
        if let Some(error) = oom.or(validation) {
            drop(texture);
            return Err(error.to_string());
        }
        Ok(texture)
    }

    fn copy_origin(texture: &wgpu::Texture, x: u32, y: u32) -> wgpu::ImageCopyTexture {
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        }
    }
}

impl Gpu for WgpuGpu {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn caps(&self) -> &Capabilities {
        &self.context.caps
    }

    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> GpuResult<TextureSampler> {
        let max = self.context.caps.max_texture_size;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(GpuError::InvalidTextureSize { width, height, max });
        }
        let entry = self
            .context
            .formats
            .get(format)
            .ok_or(GpuError::UnsupportedFormat(format))?;

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        if entry.renderable {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = self
            .create_native_texture(&wgpu::TextureDescriptor {
                label: Some("gpu-hal texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: entry.texture_format,
                usage,
                view_formats: &[],
            })
            .map_err(GpuError::TextureAllocationFailed)?;

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                format: entry,
            },
        );
        Ok(TextureSampler::new(id, format, width, height))
    }

    fn delete_texture(&mut self, sampler: &mut TextureSampler) {
        if sampler.is_released() {
            return;
        }
        if let Some(entry) = self.textures.remove(&sampler.id) {
            entry.texture.destroy();
        }
        sampler.id = 0;
    }

    fn write_pixels(&mut self, sampler: &TextureSampler, rect: Rect, pixels: &[u8], row_bytes: usize) {
        if !pixels::write_args_valid(sampler, rect, pixels.len(), row_bytes) {
            return;
        }
        // Queued writes execute ahead of the next submit; flush the
        // pending encoder first so earlier encoded work stays ordered
        // before this upload.
        self.flush();
        let Some(entry) = self.textures.get(&sampler.id) else {
            log::warn!("write_pixels: unknown texture {}", sampler.id);
            return;
        };
        let bpp = entry.format.bytes_per_pixel as usize;
        let packed_row = rect.width as usize * bpp;
        let extent = wgpu::Extent3d {
            width: rect.width,
            height: rect.height,
            depth_or_array_layers: 1,
        };
        match TransferPlan::select(&self.context.caps, rect.width, bpp, row_bytes) {
            TransferPlan::Packed | TransferPlan::Strided { .. } => {
                self.context.queue.write_texture(
                    Self::copy_origin(&entry.texture, rect.x, rect.y),
                    pixels,
                    wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(row_bytes as u32),
                        rows_per_image: None,
                    },
                    extent,
                );
            }
            TransferPlan::PerRow => {
                for row in 0..rect.height {
                    let start = row as usize * row_bytes;
                    self.context.queue.write_texture(
                        Self::copy_origin(&entry.texture, rect.x, rect.y + row),
                        &pixels[start..start + packed_row],
                        wgpu::ImageDataLayout {
                            offset: 0,
                            bytes_per_row: None,
                            rows_per_image: None,
                        },
                        wgpu::Extent3d {
                            width: rect.width,
                            height: 1,
                            depth_or_array_layers: 1,
                        },
                    );
                }
            }
        }
    }

    fn read_pixels(&mut self, sampler: &TextureSampler, rect: Rect) -> Option<Vec<u8>> {
        if sampler.is_released() || rect.is_empty() {
            return None;
        }
        if !rect.fits_within(sampler.width(), sampler.height()) {
            return None;
        }
        let bpp = {
            let entry = self.textures.get(&sampler.id)?;
            entry.format.bytes_per_pixel as usize
        };
        let unpadded = rect.width as usize * bpp;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
        let padded = (unpadded + align - 1) & !(align - 1);

        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gpu-hal readback"),
            size: (padded * rect.height as usize) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        {
            self.encoder();
            let (Some(encoder), Some(entry)) =
                (self.encoder.as_mut(), self.textures.get(&sampler.id))
            else {
                return None;
            };
            encoder.copy_texture_to_buffer(
                Self::copy_origin(&entry.texture, rect.x, rect.y),
                wgpu::ImageCopyBuffer {
                    buffer: &buffer,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(padded as u32),
                        rows_per_image: None,
                    },
                },
                wgpu::Extent3d {
                    width: rect.width,
                    height: rect.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.flush();

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.context.device.poll(wgpu::Maintain::Wait);
        match receiver.recv() {
            Ok(Ok(())) => {}
            _ => {
                log::warn!("read_pixels: buffer mapping failed");
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let mut out = Vec::with_capacity(unpadded * rect.height as usize);
        for row in 0..rect.height as usize {
            let start = row * padded;
            out.extend_from_slice(&mapped[start..start + unpadded]);
        }
        drop(mapped);
        buffer.unmap();
        Some(out)
    }

    fn create_render_target(
        &mut self,
        texture: &TextureSampler,
        sample_count: u32,
    ) -> GpuResult<RenderTarget> {
        if texture.is_released() {
            return Err(GpuError::RenderTargetCreationFailed(
                "attached texture is released".into(),
            ));
        }
        let entry = self.textures.get(&texture.id).ok_or_else(|| {
            GpuError::RenderTargetCreationFailed("attached texture is unknown".into())
        })?;
        if !entry.format.renderable {
            return Err(GpuError::RenderTargetCreationFailed(format!(
                "format {:?} is not renderable on this adapter",
                texture.format()
            )));
        }
        let native_format = entry.format.texture_format;

        let samples = if sample_count > 1 && self.context.caps.msaa_support {
            4
        } else {
            1
        };
        let msaa = if samples > 1 {
            let msaa_texture = self
                .create_native_texture(&wgpu::TextureDescriptor {
                    label: Some("gpu-hal msaa buffer"),
                    size: wgpu::Extent3d {
                        width: texture.width(),
                        height: texture.height(),
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: samples,
                    dimension: wgpu::TextureDimension::D2,
                    format: native_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .map_err(GpuError::RenderTargetCreationFailed)?;
            Some(msaa_texture)
        } else {
            None
        };

        let id = self.next_render_target_id;
        self.next_render_target_id += 1;
        self.render_targets.insert(
            id,
            RenderTargetEntry {
                texture_id: texture.id,
                msaa,
            },
        );
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
        if let Some(entry) = self.render_targets.remove(&target.id) {
            if let Some(msaa) = entry.msaa {
                msaa.destroy();
            }
        }
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
        let src_id = rt.texture_id;
        if !src_rect.fits_within(target.width(), target.height()) {
            log::warn!("copy_render_target_to_texture: source rect out of bounds, ignoring");
            return;
        }
        let dst_rect = Rect::new(dst_point.x, dst_point.y, src_rect.width, src_rect.height);
        if !dst_rect.fits_within(texture.width(), texture.height()) {
            log::warn!("copy_render_target_to_texture: destination rect out of bounds, ignoring");
            return;
        }
        self.encoder();
        let (Some(encoder), Some(src), Some(dst)) = (
            self.encoder.as_mut(),
            self.textures.get(&src_id),
            self.textures.get(&texture.id),
        ) else {
            return;
        };
        encoder.copy_texture_to_texture(
            Self::copy_origin(&src.texture, src_rect.x, src_rect.y),
            Self::copy_origin(&dst.texture, dst_point.x, dst_point.y),
            wgpu::Extent3d {
                width: src_rect.width,
                height: src_rect.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn resolve_render_target(&mut self, target: &RenderTarget) {
        if target.is_released() {
            return;
        }
        let Some(rt) = self.render_targets.get(&target.id) else {
            return;
        };
        let attached_id = rt.texture_id;
        let Some(msaa) = rt.msaa.as_ref() else {
            return;
        };
        let msaa_view = msaa.create_view(&wgpu::TextureViewDescriptor::default());
        let Some(attached) = self.textures.get(&attached_id) else {
            return;
        };
        let resolve_view = attached
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let device = &self.context.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpu-hal encoder"),
            })
        });
        // An empty pass whose only job is the multisample resolve.
        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gpu-hal resolve"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &msaa_view,
                resolve_target: Some(&resolve_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        drop(pass);
    }

    fn insert_semaphore(&mut self, semaphore: Option<&mut Semaphore>) -> bool {
        let Some(semaphore) = semaphore else {
            return false;
        };
        if !self.context.caps.fence_sync_support {
            return false;
        }
        // Flush unconditionally so the fence also covers queued writes.
        let index = self.flush();
        let id = self.next_fence_id;
        self.next_fence_id += 1;
        self.fences.insert(id, index);
        semaphore.fence = Some(Fence(id));
        true
    }

    fn wait_semaphore(&mut self, semaphore: &mut Semaphore) -> bool {
        let Some(fence) = semaphore.fence.take() else {
            return false;
        };
        let Some(index) = self.fences.remove(&fence.0) else {
            return false;
        };
        let _ = self
            .context
            .device
            .poll(wgpu::Maintain::WaitForSubmissionIndex(index));
        true
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
        let Some(rt) = self.render_targets.get(&binding.render_target) else {
            return;
        };
        let attached_id = rt.texture_id;
        let view = match rt.msaa.as_ref() {
            Some(msaa) => msaa.create_view(&wgpu::TextureViewDescriptor::default()),
            None => match self.textures.get(&attached_id) {
                Some(entry) => entry
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
                None => return,
            },
        };

        let device = &self.context.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gpu-hal encoder"),
            })
        });
        for command in &commands {
            match command {
                PassCommand::Clear([r, g, b, a]) => {
                    let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("gpu-hal clear"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color {
                                    r: *r,
                                    g: *g,
                                    b: *b,
                                    a: *a,
                                }),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    drop(pass);
                }
            }
        }
        self.flush();
    }
}
