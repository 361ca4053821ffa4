//! Pixel transfer planning and argument validation.
//!
//! Uploads accept caller-owned pixel memory with an arbitrary row stride.
//! How that stride reaches the device depends on what the device supports,
//! so the strategy is decided up front and both backends execute the same
//! plan.

use crate::backend::caps::Capabilities;
use crate::backend::types::{Rect, TextureSampler};

/// How a strided pixel upload is handed to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPlan {
    /// One transfer with an explicit source row length in pixels.
    Strided { row_length: u32 },
    /// Rows are tightly packed; one plain transfer.
    Packed,
    /// Stride cannot be expressed to the device; upload one row at a time.
    PerRow,
}

impl TransferPlan {
    /// Pick the upload strategy for a `width`-pixel-wide rect whose source
    /// rows are `row_bytes` apart.
    pub fn select(caps: &Capabilities, width: u32, bytes_per_pixel: usize, row_bytes: usize) -> Self {
        let packed_row = width as usize * bytes_per_pixel;
        if row_bytes == packed_row {
            return TransferPlan::Packed;
        }
        if caps.unpack_row_length_support && row_bytes % bytes_per_pixel == 0 {
            return TransferPlan::Strided {
                row_length: (row_bytes / bytes_per_pixel) as u32,
            };
        }
        TransferPlan::PerRow
    }
}

/// Validate a `write_pixels` call. Rejections are logged and turn the
/// write into a no-op.
pub(crate) fn write_args_valid(
    sampler: &TextureSampler,
    rect: Rect,
    pixel_len: usize,
    row_bytes: usize,
) -> bool {
    if sampler.is_released() {
        log::warn!("write_pixels: texture already released, ignoring");
        return false;
    }
    if rect.is_empty() || !rect.fits_within(sampler.width(), sampler.height()) {
        log::warn!(
            "write_pixels: rect {:?} outside {}x{} texture, ignoring",
            rect,
            sampler.width(),
            sampler.height()
        );
        return false;
    }
    let packed_row = rect.width as usize * sampler.format().bytes_per_pixel();
    if row_bytes < packed_row {
        log::warn!(
            "write_pixels: row stride {} shorter than {} byte rows, ignoring",
            row_bytes,
            packed_row
        );
        return false;
    }
    let needed = rect.height as usize * row_bytes;
    if pixel_len < needed {
        log::warn!(
            "write_pixels: {} bytes supplied, {} required, ignoring",
            pixel_len,
            needed
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::PixelFormat;

    fn caps(row_length: bool) -> Capabilities {
        Capabilities {
            unpack_row_length_support: row_length,
            ..Capabilities::default()
        }
    }

    #[test]
    fn packed_rows_need_no_stride() {
        assert_eq!(TransferPlan::select(&caps(true), 16, 4, 64), TransferPlan::Packed);
        assert_eq!(TransferPlan::select(&caps(false), 16, 4, 64), TransferPlan::Packed);
    }

    #[test]
    fn wide_stride_uses_row_length_when_supported() {
        assert_eq!(
            TransferPlan::select(&caps(true), 16, 4, 80),
            TransferPlan::Strided { row_length: 20 }
        );
    }

    #[test]
    fn wide_stride_falls_back_to_per_row() {
        assert_eq!(TransferPlan::select(&caps(false), 16, 4, 80), TransferPlan::PerRow);
        // stride not a whole number of pixels
        assert_eq!(TransferPlan::select(&caps(true), 16, 4, 70), TransferPlan::PerRow);
    }

    #[test]
    fn rejects_short_stride_and_short_buffer() {
        let sampler = TextureSampler::new(1, PixelFormat::Rgba8, 8, 8);
        let rect = Rect::new(0, 0, 8, 8);
        assert!(write_args_valid(&sampler, rect, 8 * 32, 32));
        assert!(!write_args_valid(&sampler, rect, 8 * 32, 16));
        assert!(!write_args_valid(&sampler, rect, 100, 32));
    }

    #[test]
    fn rejects_out_of_bounds_rect() {
        let sampler = TextureSampler::new(1, PixelFormat::Rgba8, 8, 8);
        assert!(!write_args_valid(&sampler, Rect::new(4, 4, 8, 8), 1024, 32));
        assert!(!write_args_valid(&sampler, Rect::new(0, 0, 0, 8), 1024, 32));
    }
}
