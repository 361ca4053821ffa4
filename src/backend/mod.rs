//! Backend implementations of the device facade.
//!
//! [`traits::Gpu`] is the contract; [`software::SoftwareGpu`] always
//! compiles, the wgpu backend sits behind the `wgpu-backend` feature.

pub mod caps;
pub mod pass;
pub mod pixels;
pub mod software;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

use traits::Gpu;

/// Create the best available device: hardware when an adapter can be
/// initialized, otherwise the software fallback.
pub fn create_device() -> Box<dyn Gpu> {
    #[cfg(feature = "wgpu-backend")]
    match wgpu_backend::WgpuGpu::new() {
        Ok(device) => {
            log::info!("using wgpu device");
            return Box::new(device);
        }
        Err(err) => {
            log::warn!("wgpu device unavailable ({err}), falling back to software");
        }
    }
    log::info!("using software device");
    Box::new(software::SoftwareGpu::new())
}
