//! Pixel format mapping between the facade and wgpu.

use crate::backend::types::PixelFormat;

/// wgpu equivalent of one facade format, probed against the adapter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FormatEntry {
    pub texture_format: wgpu::TextureFormat,
    pub bytes_per_pixel: u32,
    pub renderable: bool,
}

/// Adapter-specific lookup table, one slot per [`PixelFormat`].
#[derive(Debug)]
pub(crate) struct FormatTable {
    entries: [Option<FormatEntry>; 4],
}

const ALL_FORMATS: [PixelFormat; 4] = [
    PixelFormat::Rgba8,
    PixelFormat::Bgra8,
    PixelFormat::Alpha8,
    PixelFormat::Gray8,
];

fn native_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
        // Single-channel formats share the one-byte red channel; the
        // facade's byte layout is identical either way.
        PixelFormat::Alpha8 | PixelFormat::Gray8 => wgpu::TextureFormat::R8Unorm,
    }
}

impl FormatTable {
    pub fn detect(adapter: &wgpu::Adapter) -> Self {
        let mut entries = [None; 4];
        for format in ALL_FORMATS {
            let native = native_format(format);
            let features = adapter.get_texture_format_features(native);
            let renderable = features
                .allowed_usages
                .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
            entries[format as usize] = Some(FormatEntry {
                texture_format: native,
                bytes_per_pixel: format.bytes_per_pixel() as u32,
                renderable,
            });
        }
        Self { entries }
    }

    pub fn get(&self, format: PixelFormat) -> Option<FormatEntry> {
        self.entries[format as usize]
    }
}
