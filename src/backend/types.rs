//! Resource handle and geometry types shared by every backend.
//!
//! Handles wrap an opaque `u64` id assigned by the owning device. The id `0`
//! is reserved for the released state: deleting a resource zeroes the handle
//! it was given, and every device operation treats a zeroed handle as an
//! inert no-op rather than an error.

/// Pixel layout of a texture's backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, four bytes per pixel.
    Rgba8,
    /// 8-bit BGRA, four bytes per pixel.
    Bgra8,
    /// 8-bit alpha only, one byte per pixel.
    Alpha8,
    /// 8-bit grayscale, one byte per pixel.
    Gray8,
}

impl PixelFormat {
    /// Size of one pixel in bytes.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Alpha8 | PixelFormat::Gray8 => 1,
        }
    }
}

/// Axis-aligned rectangle in texel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rect with no area transfers nothing.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the rect lies fully inside a `width` x `height` surface.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = match self.x.checked_add(self.width) {
            Some(v) => v,
            None => return false,
        };
        let bottom = match self.y.checked_add(self.height) {
            Some(v) => v,
            None => return false,
        };
        right <= width && bottom <= height
    }
}

/// Texel position, used as the destination origin of copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Handle to a device-owned texture together with its sampling state.
///
/// The format is fixed at creation and never changes for the lifetime of
/// the texture. Sampling always clamps to edge and filters linearly; the
/// device applies that policy itself, so the handle carries no filter or
/// wrap fields.
#[derive(Debug)]
pub struct TextureSampler {
    pub(crate) id: u64,
    format: PixelFormat,
    width: u32,
    height: u32,
}

impl TextureSampler {
    pub(crate) fn new(id: u64, format: PixelFormat, width: u32, height: u32) -> Self {
        Self {
            id,
            format,
            width,
            height,
        }
    }

    /// Opaque device-assigned id, `0` once released.
    pub fn native_handle(&self) -> u64 {
        self.id
    }

    /// Whether the handle has been zeroed by a delete.
    pub fn is_released(&self) -> bool {
        self.id == 0
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Handle to a renderable surface attached to a texture.
///
/// A multisampled target carries a separate MSAA buffer alongside the
/// attached texture; drawing lands in that buffer until a resolve copies it
/// into the texture.
#[derive(Debug)]
pub struct RenderTarget {
    pub(crate) id: u64,
    pub(crate) texture_id: u64,
    sample_count: u32,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl RenderTarget {
    pub(crate) fn new(
        id: u64,
        texture_id: u64,
        sample_count: u32,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        Self {
            id,
            texture_id,
            sample_count,
            width,
            height,
            format,
        }
    }

    /// Opaque device-assigned id, `0` once released.
    pub fn native_handle(&self) -> u64 {
        self.id
    }

    /// Whether the handle has been zeroed by a delete.
    pub fn is_released(&self) -> bool {
        self.id == 0
    }

    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

/// Handle to a device fence inserted into the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence(pub(crate) u64);

/// Cross-stream synchronization token backed by an optional fence.
///
/// A freshly created semaphore is "null": it carries no fence and both
/// insert and wait treat it as absent. [`Gpu::insert_semaphore`] fills it
/// in; [`Gpu::wait_semaphore`] consumes the fence, so a semaphore can be
/// waited on at most once per insertion.
///
/// [`Gpu::insert_semaphore`]: crate::Gpu::insert_semaphore
/// [`Gpu::wait_semaphore`]: crate::Gpu::wait_semaphore
#[derive(Debug, Default)]
pub struct Semaphore {
    pub(crate) fence: Option<Fence>,
}

impl Semaphore {
    pub fn new() -> Self {
        Self { fence: None }
    }

    pub fn has_fence(&self) -> bool {
        self.fence.is_some()
    }
}
