//! Debug visualizations of the raster buffers.
use tracing::debug;

use crate::raster::{RenderOutput, RgbaImage};

/// Depth buffer as grey levels: the farthest surface is 0, the nearest 128.
///
/// Background pixels stay transparent.
pub fn depth_image(render: &RenderOutput) -> RgbaImage {
    let size = render.size();
    let depths = render.depth_buffer();
    let (near, far) = depths
        .iter()
        .copied()
        .filter(|d| d.is_finite())
        .fold((f64::NEG_INFINITY, f64::INFINITY), |(near, far), d| (near.max(d), far.min(d)));
    let range = near - far;
    debug!(near, far, "depth image range");

    let mut image = RgbaImage::new(size);
    for y in 0..size.height {
        for x in 0..size.width {
            let depth = render.depth_at(x, y);
            if !depth.is_finite() {
                continue;
            }
            let level = if range > 0.0 {
                ((depth - far) * 128.0 / range).clamp(0.0, 128.0) as u8
            } else {
                0
            };
            image.set_pixel(x, y, [level, level, level, 255]);
        }
    }
    image
}

/// Triangle ownership with one stable pastel color per triangle index.
///
/// Background pixels stay transparent.
pub fn triangle_image(render: &RenderOutput) -> RgbaImage {
    let size = render.size();
    let mut image = RgbaImage::new(size);
    for y in 0..size.height {
        for x in 0..size.width {
            if let Some(triangle) = render.triangle_at(x, y) {
                image.set_pixel(x, y, pastel(triangle));
            }
        }
    }
    image
}

/// Hash an index to a color with every channel in `128..=255`.
fn pastel(index: usize) -> [u8; 4] {
    // splitmix64 finalizer
    let mut h = (index as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^= h >> 31;
    let channel = |shift: u32| 128 + ((h >> shift) & 0x7f) as u8;
    [channel(0), channel(8), channel(16), 255]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ImageSize, TriangleMesh};
    use crate::projection::{CameraToPixel, OrthoCamera};
    use crate::raster::render;
    use nalgebra::Point3;

    /// Two separate upward-facing triangles at heights 1 and 3.
    fn stepped() -> RenderOutput {
        let tri = |x: f64, z: f64| {
            [
                Point3::new(x, 0.0, z),
                Point3::new(x, -8.0, z),
                Point3::new(x + 8.0, 0.0, z),
            ]
        };
        let mesh = TriangleMesh::from_triangles(&[tri(0.0, 1.0), tri(10.0, 3.0)]);
        let scale = CameraToPixel {
            scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        };
        render(&mesh, &OrthoCamera::TOP, &scale, ImageSize::new(20, 10)).unwrap()
    }

    #[test]
    fn test_depth_image_levels() {
        let image = depth_image(&stepped());
        assert_eq!(image.pixel(2, 2), [0, 0, 0, 255]);
        assert_eq!(image.pixel(12, 2), [128, 128, 128, 255]);
        assert_eq!(image.pixel(19, 9), [0, 0, 0, 0]);
    }

    #[test]
    fn test_depth_image_of_flat_scene() {
        let mesh = TriangleMesh::cube(1.0);
        let camera = OrthoCamera::TOP;
        let size = ImageSize::new(20, 20);
        let scale = CameraToPixel::fit(&camera, &mesh.bounds(), size, 0.1).unwrap();
        let image = depth_image(&render(&mesh, &camera, &scale, size).unwrap());
        assert_eq!(image.pixel(10, 10), [0, 0, 0, 255]);
    }

    #[test]
    fn test_triangle_image_colors() {
        let output = stepped();
        let image = triangle_image(&output);
        let first = image.pixel(2, 2);
        let second = image.pixel(12, 2);
        assert_eq!(first, pastel(0));
        assert_eq!(second, pastel(1));
        assert_eq!(image.pixel(1, 1), first);
        assert_eq!(image.pixel(19, 9), [0, 0, 0, 0]);
    }

    #[test]
    fn test_pastel_range() {
        for index in 0..1000 {
            let [r, g, b, a] = pastel(index);
            assert!(r >= 128 && g >= 128 && b >= 128);
            assert_eq!(a, 255);
        }
        assert_ne!(pastel(0), pastel(1));
    }
}
