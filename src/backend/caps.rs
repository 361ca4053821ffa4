//! Device capability flags probed once at initialization.

/// Feature set of the active device.
///
/// Callers branch on these flags instead of probing the driver themselves;
/// the flags never change after the device is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether pixel uploads can consume a source row stride wider than the
    /// destination rect in one transfer. Without it the device falls back
    /// to per-row uploads.
    pub unpack_row_length_support: bool,
    /// Whether the device can insert waitable fences into its command
    /// stream. Without it semaphore insertion reports failure.
    pub fence_sync_support: bool,
    /// Whether multisampled render targets can be created.
    pub msaa_support: bool,
    /// Largest allowed texture edge in texels.
    pub max_texture_size: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            unpack_row_length_support: true,
            fence_sync_support: true,
            msaa_support: true,
            max_texture_size: 8192,
        }
    }
}
