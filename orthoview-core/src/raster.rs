//! CPU triangle rasterizer producing color, depth and triangle-ownership buffers
//!
//! Triangles are rasterized with half-space edge functions evaluated in 28.4
//! fixed point. The bounding box is walked in square blocks; each block is
//! classified from its four corners as fully outside, fully inside or
//! partial, and only partial blocks test individual pixels. Edge functions
//! are linear, so the corner classification is exact and block traversal
//! covers precisely the pixels a per-pixel walk would.
//!
//! Depth is the affine interpolation of `vertex · forward`; larger values are
//! nearer to the camera.
use std::ops::Range;
use std::time::Instant;

use nalgebra::{Point2, Point3, Vector3};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::geometry::{ImageSize, TriangleMesh};
use crate::projection::{CameraToPixel, OrthoCamera};

/// Fractional bits of the fixed-point pixel coordinates.
const SUBPIXEL_BITS: u32 = 4;
const SUBPIXEL_SCALE: f64 = (1 << SUBPIXEL_BITS) as f64;
/// Side length of the square blocks used for early accept/reject.
const BLOCK_SIZE: i64 = 8;
/// Triangles whose projected plane-fit determinant is smaller than this are edge-on.
const DEGENERATE_DETERMINANT: f64 = 1e-9;
/// Vertices further than this many pixels from the origin are not rasterized.
/// Keeps every fixed-point product well inside `i64`.
pub(crate) const MAX_PIXEL_COORD: f64 = (1u64 << 24) as f64;

/// Depth value of pixels no surface was drawn into.
pub const BACKGROUND_DEPTH: f64 = f64::NEG_INFINITY;
/// Triangle index of pixels no surface was drawn into.
pub const NO_TRIANGLE: i32 = -1;

/// Row-major RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    size: ImageSize,
    data: Vec<u8>,
}

impl RgbaImage {
    /// Fully transparent image.
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            data: vec![0; size.pixel_count() * 4],
        }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Raw RGBA bytes, `width * height * 4` long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    fn set_index(&mut self, index: usize, rgba: [u8; 4]) {
        self.data[index * 4..index * 4 + 4].copy_from_slice(&rgba);
    }

    /// Alpha-blend `overlay` over this image (source-over).
    ///
    /// Only the region both images cover is touched.
    pub fn composite(&mut self, overlay: &RgbaImage) {
        let width = self.width().min(overlay.width());
        let height = self.height().min(overlay.height());
        for y in 0..height {
            for x in 0..width {
                let src = overlay.pixel(x, y);
                match src[3] {
                    0 => {}
                    255 => self.set_pixel(x, y, src),
                    alpha => {
                        let dst = self.pixel(x, y);
                        let a = alpha as u32;
                        let blend = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
                        let out_alpha = a + (dst[3] as u32 * (255 - a) + 127) / 255;
                        self.set_pixel(
                            x,
                            y,
                            [
                                blend(src[0], dst[0]),
                                blend(src[1], dst[1]),
                                blend(src[2], dst[2]),
                                out_alpha as u8,
                            ],
                        );
                    }
                }
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.width as usize + x as usize) * 4
    }
}

/// Buffers produced by one [`render`] call, all `width * height` long.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pixels: RgbaImage,
    depth: Vec<f64>,
    triangles: Vec<i32>,
}

impl RenderOutput {
    fn empty(size: ImageSize) -> Self {
        Self {
            pixels: RgbaImage::new(size),
            depth: vec![BACKGROUND_DEPTH; size.pixel_count()],
            triangles: vec![NO_TRIANGLE; size.pixel_count()],
        }
    }

    pub fn size(&self) -> ImageSize {
        self.pixels.size()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Per-pixel depth, [`BACKGROUND_DEPTH`] where nothing was drawn.
    pub fn depth_buffer(&self) -> &[f64] {
        &self.depth
    }

    /// Per-pixel owning triangle, [`NO_TRIANGLE`] where nothing was drawn.
    pub fn triangle_buffer(&self) -> &[i32] {
        &self.triangles
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f64 {
        self.depth[self.index(x, y)]
    }

    pub fn triangle_at(&self, x: u32, y: u32) -> Option<usize> {
        usize::try_from(self.triangles[self.index(x, y)]).ok()
    }

    /// World position of the surface drawn at pixel `(x, y)`.
    pub fn world_at(
        &self,
        camera: &OrthoCamera,
        scale: &CameraToPixel,
        x: u32,
        y: u32,
    ) -> Option<Point3<f64>> {
        let depth = self.depth_at(x, y);
        depth
            .is_finite()
            .then(|| scale.pixel_to_world(camera, &Point2::new(x as f64, y as f64), depth))
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size().width as usize + x as usize
    }

    fn fill(&mut self, tri: &TriangleSetup, owner: i32, color: [u8; 4]) {
        let size = self.size();
        let xs = tri.min_x.max(0)..tri.max_x.min(size.width as i64);
        let ys = tri.min_y.max(0)..tri.max_y.min(size.height as i64);

        for by in ys.clone().step_by(BLOCK_SIZE as usize) {
            let block_ys = by..(by + BLOCK_SIZE).min(ys.end);
            for bx in xs.clone().step_by(BLOCK_SIZE as usize) {
                let block_xs = bx..(bx + BLOCK_SIZE).min(xs.end);
                match tri.classify(&block_xs, &block_ys) {
                    Coverage::Outside => {}
                    Coverage::Inside => self.fill_block(tri, block_xs, block_ys.clone(), owner, color, false),
                    Coverage::Partial => self.fill_block(tri, block_xs, block_ys.clone(), owner, color, true),
                }
            }
        }
    }

    fn fill_block(
        &mut self,
        tri: &TriangleSetup,
        xs: Range<i64>,
        ys: Range<i64>,
        owner: i32,
        color: [u8; 4],
        test_edges: bool,
    ) {
        let width = self.size().width as usize;
        for y in ys {
            let mut e = tri.edges.map(|edge| edge.at(xs.start, y));
            for x in xs.clone() {
                if !test_edges || (e[0] > 0 && e[1] > 0 && e[2] > 0) {
                    let index = y as usize * width + x as usize;
                    let depth = tri.plane.at(x, y);
                    if depth > self.depth[index] {
                        self.depth[index] = depth;
                        self.triangles[index] = owner;
                        self.pixels.set_index(index, color);
                    }
                }
                for (value, edge) in e.iter_mut().zip(&tri.edges) {
                    *value -= edge.step_x();
                }
            }
        }
    }
}

/// Rasterize every front-facing triangle of `mesh`.
///
/// Pixel `(x, y)` samples the point `(x, y)` in pixel coordinates. Depth ties
/// keep the triangle drawn first. Triangles with NaN normals fail the facing
/// test and are skipped.
#[instrument(skip_all, fields(width = size.width, height = size.height, triangles = mesh.triangle_count()))]
pub fn render(
    mesh: &TriangleMesh,
    camera: &OrthoCamera,
    scale: &CameraToPixel,
    size: ImageSize,
) -> Result<RenderOutput> {
    size.validate()?;
    let started = Instant::now();
    let mut output = RenderOutput::empty(size);
    let forward = camera.forward();
    let (mut drawn, mut culled, mut skipped) = (0usize, 0usize, 0usize);

    for t in 0..mesh.triangle_count() {
        let normal = mesh.normal(t);
        let facing = normal.dot(&forward);
        if !(facing > 0.0) {
            culled += 1;
            continue;
        }
        let Some(setup) = TriangleSetup::new(&mesh.triangle_positions(t), camera, scale, &forward) else {
            skipped += 1;
            continue;
        };
        let color = shade(&normal, camera, &forward);
        output.fill(&setup, t as i32, color);
        drawn += 1;
    }

    debug!(
        drawn,
        culled,
        skipped,
        elapsed_us = started.elapsed().as_micros() as u64,
        "rasterized mesh"
    );
    Ok(output)
}

/// Flat color for a face with the given normal.
///
/// Red follows how directly the face looks at the camera, green how far it
/// tilts away from film-up, blue how far it turns towards film-x.
fn shade(normal: &Vector3<f64>, camera: &OrthoCamera, forward: &Vector3<f64>) -> [u8; 4] {
    let facing = normal.dot(forward);
    let left = normal.dot(&camera.x_axis());
    let up = normal.dot(&camera.y_axis());
    let channel = |v: f64| v.round().clamp(0.0, 255.0) as u8;
    [
        channel(192.0 * facing),
        channel(64.0 * facing + 80.0 * (1.0 - up)),
        channel(64.0 * facing + 128.0 * left),
        255,
    ]
}

/// Round a pixel coordinate to 28.4 fixed point.
fn to_fixed(v: f64) -> i64 {
    (v * SUBPIXEL_SCALE + 0.5).floor() as i64
}

/// Half-space function `c + dx * Y - dy * X` over fixed-point `(X, Y)`.
#[derive(Debug, Clone, Copy)]
struct EdgeFunction {
    dx: i64,
    dy: i64,
    c: i64,
}

impl EdgeFunction {
    fn new(from: [i64; 2], to: [i64; 2]) -> Self {
        let dx = from[0] - to[0];
        let dy = from[1] - to[1];
        let mut c = dy * from[0] - dx * from[1];
        // Fill convention: shared edges belong to exactly one triangle
        if dy < 0 || (dy == 0 && dx > 0) {
            c += 1;
        }
        Self { dx, dy, c }
    }

    fn at(&self, x: i64, y: i64) -> i64 {
        self.c + self.dx * (y << SUBPIXEL_BITS) - self.dy * (x << SUBPIXEL_BITS)
    }

    fn step_x(&self) -> i64 {
        self.dy << SUBPIXEL_BITS
    }
}

/// Depth as an affine function of pixel position: `a * x + b * y + c`.
#[derive(Debug, Clone, Copy)]
struct DepthPlane {
    a: f64,
    b: f64,
    c: f64,
}

impl DepthPlane {
    /// Fit the plane through three `(x, y, depth)` samples.
    fn fit(p: &[Point2<f64>; 3], depth: [f64; 3]) -> Option<Self> {
        let [(x1, y1), (x2, y2), (x3, y3)] = p.map(|q| (q.x, q.y));
        let [w1, w2, w3] = depth;
        let det = x1 * y2 - x2 * y1 + x2 * y3 - x3 * y2 + x3 * y1 - x1 * y3;
        if !(det.abs() >= DEGENERATE_DETERMINANT) {
            return None;
        }
        Some(Self {
            a: ((y2 - y3) * w1 + (y3 - y1) * w2 + (y1 - y2) * w3) / det,
            b: ((x3 - x2) * w1 + (x1 - x3) * w2 + (x2 - x1) * w3) / det,
            c: ((x2 * y3 - x3 * y2) * w1 + (x3 * y1 - x1 * y3) * w2 + (x1 * y2 - x2 * y1) * w3) / det,
        })
    }

    fn at(&self, x: i64, y: i64) -> f64 {
        self.a * x as f64 + self.b * y as f64 + self.c
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coverage {
    Outside,
    Inside,
    Partial,
}

/// Per-triangle constants shared by every pixel it touches.
#[derive(Debug, Clone, Copy)]
struct TriangleSetup {
    edges: [EdgeFunction; 3],
    plane: DepthPlane,
    /// Pixel bounding box, max exclusive and not yet clipped to the image
    min_x: i64,
    max_x: i64,
    min_y: i64,
    max_y: i64,
}

impl TriangleSetup {
    fn new(
        vertices: &[Point3<f64>; 3],
        camera: &OrthoCamera,
        scale: &CameraToPixel,
        forward: &Vector3<f64>,
    ) -> Option<Self> {
        let pixels = vertices.map(|v| scale.world_to_pixel(camera, &v));
        if !pixels
            .iter()
            .all(|p| p.x.abs() <= MAX_PIXEL_COORD && p.y.abs() <= MAX_PIXEL_COORD)
        {
            return None;
        }
        let plane = DepthPlane::fit(&pixels, vertices.map(|v| v.coords.dot(forward)))?;

        let fixed = pixels.map(|p| [to_fixed(p.x), to_fixed(p.y)]);
        let edges = [
            EdgeFunction::new(fixed[0], fixed[1]),
            EdgeFunction::new(fixed[1], fixed[2]),
            EdgeFunction::new(fixed[2], fixed[0]),
        ];

        let round_up = |v: i64| (v + (1 << SUBPIXEL_BITS) - 1) >> SUBPIXEL_BITS;
        let xs = fixed.map(|f| f[0]);
        let ys = fixed.map(|f| f[1]);
        Some(Self {
            edges,
            plane,
            min_x: round_up(xs.into_iter().min()?),
            max_x: round_up(xs.into_iter().max()?),
            min_y: round_up(ys.into_iter().min()?),
            max_y: round_up(ys.into_iter().max()?),
        })
    }

    fn covers(&self, x: i64, y: i64) -> bool {
        self.edges.iter().all(|e| e.at(x, y) > 0)
    }

    /// Classify a block of pixels from its corner samples.
    fn classify(&self, xs: &Range<i64>, ys: &Range<i64>) -> Coverage {
        let (x0, x1) = (xs.start, xs.end - 1);
        let (y0, y1) = (ys.start, ys.end - 1);
        let mut coverage = Coverage::Inside;
        for edge in &self.edges {
            let corners = [edge.at(x0, y0), edge.at(x1, y0), edge.at(x0, y1), edge.at(x1, y1)];
            let inside = corners.iter().filter(|&&v| v > 0).count();
            match inside {
                0 => return Coverage::Outside,
                4 => {}
                _ => coverage = Coverage::Partial,
            }
        }
        coverage
    }
}
