//! Orthographic cameras and camera-to-pixel mappings
use nalgebra::{Point2, Point3, Vector3};
use tracing::debug;

use crate::error::{OrthoError, Result};
use crate::geometry::{Bounds2d, Bounds3d, ImageSize};

/// Orthographic camera defined by two film axes.
///
/// Film `x` of a world point is its dot product with `(xx, yx, zx)` and film
/// `y` is its dot product with `(xy, yy, zy)`. Both rows are expected to be
/// unit length and perpendicular.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoCamera {
    pub xx: f64,
    pub yx: f64,
    pub zx: f64,
    pub xy: f64,
    pub yy: f64,
    pub zy: f64,
}

impl OrthoCamera {
    pub const TOP: Self = Self::from_rows([1.0, 0.0, 0.0], [0.0, -1.0, 0.0]);
    pub const BOTTOM: Self = Self::from_rows([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
    /// Film-y is -Z instead of the +Z of a plain Z-up basis, so the side
    /// views are upright in pixel space.
    pub const LEFT: Self = Self::from_rows([0.0, -1.0, 0.0], [0.0, 0.0, -1.0]);
    /// Film-y = -Z, like [`LEFT`](Self::LEFT).
    pub const RIGHT: Self = Self::from_rows([0.0, 1.0, 0.0], [0.0, 0.0, -1.0]);
    pub const FRONT: Self = Self::from_rows([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]);
    /// Film-y = -Z, like [`LEFT`](Self::LEFT).
    pub const BACK: Self = Self::from_rows([-1.0, 0.0, 0.0], [0.0, 0.0, -1.0]);

    pub const fn from_rows(x: [f64; 3], y: [f64; 3]) -> Self {
        Self {
            xx: x[0],
            yx: x[1],
            zx: x[2],
            xy: y[0],
            yy: y[1],
            zy: y[2],
        }
    }

    pub fn from_axes(x_axis: &Vector3<f64>, y_axis: &Vector3<f64>) -> Self {
        Self::from_rows(
            [x_axis.x, x_axis.y, x_axis.z],
            [y_axis.x, y_axis.y, y_axis.z],
        )
    }

    /// Three-quarter view from the front, looking down onto the model.
    pub fn isometric_front_overhead() -> Self {
        Self::from_rows([1.0, 1.0, 0.0], [1.0, -1.0, -3.717]).normalized()
    }

    /// World direction that maps to film `x`.
    pub fn x_axis(&self) -> Vector3<f64> {
        Vector3::new(self.xx, self.yx, self.zx)
    }

    /// World direction that maps to film `y`.
    pub fn y_axis(&self) -> Vector3<f64> {
        Vector3::new(self.xy, self.yy, self.zy)
    }

    /// Scale both rows to unit length.
    pub fn normalized(&self) -> Self {
        Self::from_axes(&self.x_axis().normalize(), &self.y_axis().normalize())
    }

    /// Unit viewing direction, pointing from the model towards the viewer.
    ///
    /// A face is front-facing when `normal · forward > 0`, and a larger
    /// `point · forward` is nearer to the camera.
    pub fn forward(&self) -> Vector3<f64> {
        self.y_axis().cross(&self.x_axis()).normalize()
    }

    /// Film-space coordinates of a world point.
    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        let v = point.coords;
        Point2::new(v.dot(&self.x_axis()), v.dot(&self.y_axis()))
    }

    /// Distance along [`forward`](Self::forward); larger is nearer.
    pub fn depth(&self, point: &Point3<f64>) -> f64 {
        point.coords.dot(&self.forward())
    }
}

/// Named collection of the three standard drafting views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSet<T> {
    pub top: T,
    pub front: T,
    pub right: T,
}

impl<T> CameraSet<T> {
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> CameraSet<U> {
        CameraSet {
            top: f(&self.top),
            front: f(&self.front),
            right: f(&self.right),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.top, &self.front, &self.right].into_iter()
    }
}

impl CameraSet<OrthoCamera> {
    pub fn standard() -> Self {
        Self {
            top: OrthoCamera::TOP,
            front: OrthoCamera::FRONT,
            right: OrthoCamera::RIGHT,
        }
    }
}

/// Film-to-pixel mapping: `pixel = film * scale - offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraToPixel {
    /// Pixels per world unit
    pub scale: f64,
    /// Subtracted from scaled film x
    pub x_offset: f64,
    /// Subtracted from scaled film y
    pub y_offset: f64,
}

impl CameraToPixel {
    /// Largest scale that fits `bounds` inside `size`, centered.
    ///
    /// `padding_factor` reserves that fraction of the image on each side of
    /// the tighter axis, so 0.1 leaves 10% empty at both ends.
    pub fn fit(
        camera: &OrthoCamera,
        bounds: &Bounds3d,
        size: ImageSize,
        padding_factor: f64,
    ) -> Result<Self> {
        let scale = fit_scale(camera, bounds, size, padding_factor)?;
        Ok(Self::with_scale(camera, bounds, size, scale))
    }

    /// Center `bounds` in `size` at a fixed scale.
    pub fn with_scale(
        camera: &OrthoCamera,
        bounds: &Bounds3d,
        size: ImageSize,
        scale: f64,
    ) -> Self {
        let window = viewing_window(camera, bounds);
        let extent = window.size() * scale;
        // Split the unused image area evenly, then shift by the window origin
        let x_offset = (extent.x - size.width as f64) / 2.0 + window.min.x * scale;
        let y_offset = (extent.y - size.height as f64) / 2.0 + window.min.y * scale;
        Self {
            scale,
            x_offset,
            y_offset,
        }
    }

    /// Unrounded pixel coordinates of a world point.
    pub fn world_to_pixel(&self, camera: &OrthoCamera, point: &Point3<f64>) -> Point2<f64> {
        self.film_to_pixel(&camera.project(point))
    }

    pub fn film_to_pixel(&self, film: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            film.x * self.scale - self.x_offset,
            film.y * self.scale - self.y_offset,
        )
    }

    pub fn pixel_to_film(&self, pixel: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            (pixel.x + self.x_offset) / self.scale,
            (pixel.y + self.y_offset) / self.scale,
        )
    }

    /// World point under `pixel` at the given depth along the camera's forward axis.
    pub fn pixel_to_world(
        &self,
        camera: &OrthoCamera,
        pixel: &Point2<f64>,
        depth: f64,
    ) -> Point3<f64> {
        let film = self.pixel_to_film(pixel);
        Point3::from(camera.x_axis() * film.x + camera.y_axis() * film.y + camera.forward() * depth)
    }
}

/// 2D footprint of `bounds` on the camera film.
///
/// All eight corners are projected, so rotated cameras are bounded correctly.
pub fn viewing_window(camera: &OrthoCamera, bounds: &Bounds3d) -> Bounds2d {
    let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for corner in bounds.corners() {
        let p = camera.project(&corner);
        min = min.inf(&p);
        max = max.sup(&p);
    }
    Bounds2d { min, max }
}

/// Fit every view separately, then share the smallest scale across all of them.
pub fn multi_view_camera_to_pixel(
    cameras: &CameraSet<OrthoCamera>,
    bounds: &Bounds3d,
    size: ImageSize,
    padding_factor: f64,
) -> Result<CameraSet<CameraToPixel>> {
    let mut scale = f64::INFINITY;
    for camera in cameras.iter() {
        scale = scale.min(fit_scale(camera, bounds, size, padding_factor)?);
    }
    debug!(scale, "shared multi-view scale");
    Ok(cameras.map(|camera| CameraToPixel::with_scale(camera, bounds, size, scale)))
}

fn fit_scale(
    camera: &OrthoCamera,
    bounds: &Bounds3d,
    size: ImageSize,
    padding_factor: f64,
) -> Result<f64> {
    if !(0.0..0.5).contains(&padding_factor) {
        return Err(OrthoError::InvalidPadding(padding_factor));
    }
    size.validate()?;

    let window = viewing_window(camera, bounds).size();
    let usable = 1.0 - padding_factor * 2.0;
    let scale_x = size.width as f64 * usable / window.x;
    let scale_y = size.height as f64 * usable / window.y;
    // An axis with no extent gives infinity and leaves the other axis in charge
    let scale = scale_x.min(scale_y);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(OrthoError::DegenerateBounds);
    }
    Ok(scale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::TriangleMesh;
    use approx::assert_relative_eq;

    fn unit_cube_bounds() -> Bounds3d {
        TriangleMesh::cube(1.0).bounds()
    }

    #[test]
    fn test_preset_forward_vectors() {
        assert_relative_eq!(OrthoCamera::TOP.forward(), Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(OrthoCamera::BOTTOM.forward(), Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(OrthoCamera::FRONT.forward(), Vector3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(OrthoCamera::RIGHT.forward(), Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(OrthoCamera::LEFT.forward(), Vector3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(OrthoCamera::BACK.forward(), Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_side_presets_keep_z_up() {
        let up = Point3::new(0.0, 0.0, 1.0);
        for camera in [OrthoCamera::FRONT, OrthoCamera::BACK, OrthoCamera::LEFT, OrthoCamera::RIGHT] {
            // Pixel y grows downwards, so +Z must map to a smaller film y
            assert_eq!(camera.project(&up).y, -1.0);
        }
    }

    #[test]
    fn test_isometric_is_normalized() {
        let camera = OrthoCamera::isometric_front_overhead();
        assert_relative_eq!(camera.x_axis().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(camera.y_axis().norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(camera.x_axis().dot(&camera.y_axis()), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_viewing_window_of_rotated_camera() {
        let camera = OrthoCamera::from_rows(
            [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2, 0.0],
            [0.0, 0.0, -1.0],
        );
        let window = viewing_window(&camera, &unit_cube_bounds());
        assert_relative_eq!(window.size().x, 2.0f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(window.size().y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(window.min.x, -std::f64::consts::FRAC_1_SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_unit_cube_fills_image() {
        let camera = OrthoCamera::TOP;
        let size = ImageSize::new(100, 100);
        let scale = CameraToPixel::fit(&camera, &unit_cube_bounds(), size, 0.0).unwrap();
        assert_relative_eq!(scale.scale, 100.0);

        let low = scale.world_to_pixel(&camera, &Point3::new(-0.5, 0.5, 0.0));
        let high = scale.world_to_pixel(&camera, &Point3::new(0.5, -0.5, 0.0));
        assert_relative_eq!(low, Point2::new(0.0, 0.0));
        assert_relative_eq!(high, Point2::new(100.0, 100.0));
    }

    #[test]
    fn test_fit_centers_the_loose_axis() {
        let camera = OrthoCamera::TOP;
        let size = ImageSize::new(200, 100);
        let scale = CameraToPixel::fit(&camera, &unit_cube_bounds(), size, 0.1).unwrap();
        assert_relative_eq!(scale.scale, 80.0);

        let left = scale.world_to_pixel(&camera, &Point3::new(-0.5, 0.0, 0.0));
        let right = scale.world_to_pixel(&camera, &Point3::new(0.5, 0.0, 0.0));
        assert_relative_eq!(left.x, 60.0);
        assert_relative_eq!(right.x, 140.0);
        let center = scale.world_to_pixel(&camera, &Point3::origin());
        assert_relative_eq!(center, Point2::new(100.0, 50.0));
    }

    #[test]
    fn test_invalid_padding_is_rejected() {
        let size = ImageSize::new(10, 10);
        let bounds = unit_cube_bounds();
        for padding in [0.5, 0.75, -0.1, f64::NAN] {
            let err = CameraToPixel::fit(&OrthoCamera::TOP, &bounds, size, padding);
            assert!(matches!(err, Err(OrthoError::InvalidPadding(_))));
        }
    }

    #[test]
    fn test_zero_image_is_rejected() {
        let err = CameraToPixel::fit(&OrthoCamera::TOP, &unit_cube_bounds(), ImageSize::new(10, 0), 0.1);
        assert!(matches!(err, Err(OrthoError::InvalidImageSize { .. })));
    }

    #[test]
    fn test_point_bounds_are_degenerate() {
        let bounds = Bounds3d::from_points(&[Point3::new(1.0, 2.0, 3.0)]);
        let err = CameraToPixel::fit(&OrthoCamera::TOP, &bounds, ImageSize::new(10, 10), 0.1);
        assert_eq!(err, Err(OrthoError::DegenerateBounds));
    }

    #[test]
    fn test_flat_bounds_fit_the_other_axis() {
        let bounds = Bounds3d {
            min: Point3::new(-1.0, 0.0, 0.0),
            max: Point3::new(1.0, 0.0, 0.0),
        };
        let scale = CameraToPixel::fit(&OrthoCamera::TOP, &bounds, ImageSize::new(100, 100), 0.0).unwrap();
        assert_relative_eq!(scale.scale, 50.0);
    }

    #[test]
    fn test_multi_view_shares_scale() {
        let bounds = Bounds3d {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(4.0, 2.0, 1.0),
        };
        let size = ImageSize::new(100, 100);
        let cameras = CameraSet::standard();
        let scales = multi_view_camera_to_pixel(&cameras, &bounds, size, 0.0).unwrap();

        // Top and front are limited by the 4-unit x extent
        assert_relative_eq!(scales.top.scale, 25.0);
        assert_relative_eq!(scales.front.scale, 25.0);
        assert_relative_eq!(scales.right.scale, 25.0);

        let alone = CameraToPixel::fit(&cameras.right, &bounds, size, 0.0).unwrap();
        assert_relative_eq!(alone.scale, 50.0);
        let center = Point3::new(2.0, 1.0, 0.5);
        assert_relative_eq!(
            scales.right.world_to_pixel(&cameras.right, &center),
            Point2::new(50.0, 50.0)
        );
    }

    #[test]
    fn test_pixel_to_world_inverts_projection() {
        let camera = OrthoCamera::isometric_front_overhead();
        let bounds = unit_cube_bounds();
        let scale = CameraToPixel::fit(&camera, &bounds, ImageSize::new(64, 48), 0.05).unwrap();
        let point = Point3::new(0.25, -0.4, 0.1);

        let pixel = scale.world_to_pixel(&camera, &point);
        let back = scale.pixel_to_world(&camera, &pixel, camera.depth(&point));
        assert_relative_eq!(back, point, epsilon = 1e-9);
    }
}
