//! Backend-parameterized contract tests for the device facade.
//!
//! Every case runs against the software backend in both capability
//! states; the wgpu cases are skipped when no adapter is available so the
//! suite passes on headless CI machines.

use gpu_hal::{Capabilities, Gpu, PixelFormat, Point, Rect, Semaphore, SoftwareGpu};
use rstest::rstest;

#[derive(Debug, Clone, Copy)]
enum Backend {
    Software,
    SoftwarePerRow,
    Wgpu,
}

#[cfg(feature = "wgpu-backend")]
fn wgpu_device() -> Option<Box<dyn Gpu>> {
    match gpu_hal::WgpuGpu::new() {
        Ok(device) => Some(Box::new(device)),
        Err(err) => {
            eprintln!("skipping wgpu case: {err}");
            None
        }
    }
}

#[cfg(not(feature = "wgpu-backend"))]
fn wgpu_device() -> Option<Box<dyn Gpu>> {
    eprintln!("skipping wgpu case: feature disabled");
    None
}

fn device_for(backend: Backend) -> Option<Box<dyn Gpu>> {
    let _ = env_logger::builder().is_test(true).try_init();
    match backend {
        Backend::Software => Some(Box::new(SoftwareGpu::new())),
        Backend::SoftwarePerRow => Some(Box::new(SoftwareGpu::with_caps(Capabilities {
            unpack_row_length_support: false,
            ..Capabilities::default()
        }))),
        Backend::Wgpu => wgpu_device(),
    }
}

fn solid(color: [u8; 4], pixels: usize) -> Vec<u8> {
    color.iter().copied().cycle().take(pixels * 4).collect()
}

#[rstest]
#[case::software(Backend::Software)]
#[case::software_per_row(Backend::SoftwarePerRow)]
#[case::wgpu(Backend::Wgpu)]
fn create_texture_reports_format_and_live_handle(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device
        .create_texture(16, 8, PixelFormat::Rgba8)
        .unwrap_or_else(|err| panic!("{}: {err}", device.name()));
    assert!(!texture.is_released());
    assert_ne!(texture.native_handle(), 0);
    assert_eq!(texture.format(), PixelFormat::Rgba8);
    assert_eq!((texture.width(), texture.height()), (16, 8));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn create_texture_rejects_zero_size(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    assert!(device.create_texture(0, 8, PixelFormat::Rgba8).is_err());
    assert!(device.create_texture(8, 0, PixelFormat::Rgba8).is_err());
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn delete_texture_twice_is_noop(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let mut texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    device.delete_texture(&mut texture);
    assert!(texture.is_released());
    device.delete_texture(&mut texture);
    assert!(texture.is_released());
}

#[rstest]
#[case::software(Backend::Software)]
#[case::software_per_row(Backend::SoftwarePerRow)]
#[case::wgpu(Backend::Wgpu)]
fn packed_write_round_trips(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let rect = Rect::new(0, 0, 8, 8);
    let pixels = solid([10, 20, 30, 255], 64);
    device.write_pixels(&texture, rect, &pixels, 8 * 4);
    let back = device.read_pixels(&texture, rect).unwrap();
    assert_eq!(back, pixels);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::software_per_row(Backend::SoftwarePerRow)]
#[case::wgpu(Backend::Wgpu)]
fn padded_write_round_trips(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let rect = Rect::new(0, 0, 8, 8);
    // 16 bytes of per-row slack after the 32 payload bytes.
    let row_bytes = 8 * 4 + 16;
    let mut pixels = vec![0u8; 8 * row_bytes];
    for row in 0..8 {
        for col in 0..8 {
            let at = row * row_bytes + col * 4;
            pixels[at..at + 4].copy_from_slice(&[row as u8, col as u8, 7, 255]);
        }
    }
    device.write_pixels(&texture, rect, &pixels, row_bytes);
    let back = device.read_pixels(&texture, rect).unwrap();
    for row in 0..8 {
        for col in 0..8 {
            let at = (row * 8 + col) * 4;
            assert_eq!(
                &back[at..at + 4],
                &[row as u8, col as u8, 7, 255],
                "pixel ({col},{row}) on {}",
                device.name()
            );
        }
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::software_per_row(Backend::SoftwarePerRow)]
#[case::wgpu(Backend::Wgpu)]
fn subrect_write_leaves_border_untouched(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device.create_texture(64, 64, PixelFormat::Rgba8).unwrap();
    let rect = Rect::new(5, 5, 10, 10);
    let pixels = solid([255, 0, 0, 255], 10 * 10);
    device.write_pixels(&texture, rect, &pixels, 10 * 4);

    let back = device
        .read_pixels(&texture, Rect::new(0, 0, 64, 64))
        .unwrap();
    for y in 0..64u32 {
        for x in 0..64u32 {
            let at = ((y * 64 + x) * 4) as usize;
            let inside = (5..15).contains(&x) && (5..15).contains(&y);
            let expected: [u8; 4] = if inside { [255, 0, 0, 255] } else { [0, 0, 0, 0] };
            assert_eq!(&back[at..at + 4], &expected, "pixel ({x},{y})");
        }
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn out_of_bounds_write_is_dropped(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let pixels = solid([9, 9, 9, 9], 64);
    device.write_pixels(&texture, Rect::new(4, 4, 8, 8), &pixels, 8 * 4);
    let back = device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .unwrap();
    assert!(back.iter().all(|&b| b == 0));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn null_semaphore_insert_fails(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    assert!(!device.insert_semaphore(None));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn wait_without_insert_fails(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let mut semaphore = Semaphore::new();
    assert!(!device.wait_semaphore(&mut semaphore));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn semaphore_signals_exactly_once(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let mut semaphore = Semaphore::new();
    assert!(device.insert_semaphore(Some(&mut semaphore)));
    assert!(semaphore.has_fence());
    assert!(device.wait_semaphore(&mut semaphore));
    assert!(!semaphore.has_fence());
    assert!(!device.wait_semaphore(&mut semaphore));
}

#[test]
fn semaphore_insert_fails_without_fence_support() {
    let mut device = SoftwareGpu::with_caps(Capabilities {
        fence_sync_support: false,
        ..Capabilities::default()
    });
    let mut semaphore = Semaphore::new();
    assert!(!device.insert_semaphore(Some(&mut semaphore)));
    assert!(!semaphore.has_fence());
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn render_pass_is_pooled_and_rebinds(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let tex_a = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let rt_a = device.create_render_target(&tex_a, 1).unwrap();
    let tex_b = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let rt_b = device.create_render_target(&tex_b, 1).unwrap();

    let first_id = device.get_ops_render_pass(&rt_a, &tex_a).unwrap().id();
    let pass = device.get_ops_render_pass(&rt_b, &tex_b).unwrap();
    assert_eq!(pass.id(), first_id);
    assert_eq!(pass.bound_render_target(), Some(rt_b.native_handle()));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn submit_applies_recorded_clear(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let target = device.create_render_target(&texture, 1).unwrap();

    let pass = device.get_ops_render_pass(&target, &texture).unwrap();
    // Channels at exactly 0.0 and 1.0 so every backend quantizes alike.
    pass.clear([0.0, 1.0, 0.0, 1.0]);
    let id = pass.id();
    device.submit(id);

    let back = device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .unwrap();
    for pixel in back.chunks_exact(4) {
        assert_eq!(pixel, &[0, 255, 0, 255]);
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn copy_render_target_rect_to_texture(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let source = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let target = device.create_render_target(&source, 1).unwrap();
    let destination = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();

    let pass = device.get_ops_render_pass(&target, &source).unwrap();
    pass.clear([1.0, 0.0, 1.0, 1.0]);
    let id = pass.id();
    device.submit(id);

    device.copy_render_target_to_texture(
        &target,
        &destination,
        Rect::new(0, 0, 4, 4),
        Point::new(2, 2),
    );

    let back = device
        .read_pixels(&destination, Rect::new(0, 0, 8, 8))
        .unwrap();
    for y in 0..8u32 {
        for x in 0..8u32 {
            let at = ((y * 8 + x) * 4) as usize;
            let inside = (2..6).contains(&x) && (2..6).contains(&y);
            let expected: [u8; 4] = if inside {
                [255, 0, 255, 255]
            } else {
                [0, 0, 0, 0]
            };
            assert_eq!(&back[at..at + 4], &expected, "pixel ({x},{y})");
        }
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn resolve_copies_msaa_into_attached_texture(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    if !device.caps().msaa_support {
        eprintln!("skipping: {} reports no msaa support", device.name());
        return;
    }
    let texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let target = device.create_render_target(&texture, 4).unwrap();
    assert!(target.is_multisampled());

    let pass = device.get_ops_render_pass(&target, &texture).unwrap();
    pass.clear([1.0, 0.0, 0.0, 1.0]);
    let id = pass.id();
    device.submit(id);

    // Drawing went to the sample buffer; the attached texture is
    // untouched until resolve.
    let before = device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .unwrap();
    assert!(before.iter().all(|&b| b == 0));

    device.resolve_render_target(&target);
    let resolved = device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .unwrap();
    for pixel in resolved.chunks_exact(4) {
        assert_eq!(pixel, &[255, 0, 0, 255]);
    }

    // Nothing drawn since; resolving again changes nothing.
    device.resolve_render_target(&target);
    let again = device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .unwrap();
    assert_eq!(again, resolved);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::wgpu(Backend::Wgpu)]
fn released_handles_are_inert(#[case] backend: Backend) {
    let Some(mut device) = device_for(backend) else { return };
    let mut texture = device.create_texture(8, 8, PixelFormat::Rgba8).unwrap();
    let mut target = device.create_render_target(&texture, 1).unwrap();
    device.delete_render_target(&mut target);
    device.delete_texture(&mut texture);

    assert!(device.get_ops_render_pass(&target, &texture).is_none());
    assert!(device
        .read_pixels(&texture, Rect::new(0, 0, 8, 8))
        .is_none());
    device.write_pixels(&texture, Rect::new(0, 0, 8, 8), &solid([1, 1, 1, 1], 64), 32);
    device.resolve_render_target(&target);
    assert!(device.create_render_target(&texture, 1).is_err());
}
