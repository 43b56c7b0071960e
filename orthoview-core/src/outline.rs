//! Silhouette and crease extraction over a finished render.
//!
//! Every mesh edge is classified against the camera, projected like the
//! rasterizer projects vertices and walked one pixel per major-axis step. A
//! pixel of the edge is visible when the nearest surface around it (the pixel
//! and its 4-neighbourhood) is not in front of the edge, or when the surface
//! drawn there belongs to one of the edge's own triangles.
use std::time::Instant;

use nalgebra::{Point2, Vector3};
use tracing::{debug, instrument};

use crate::config::OutlineConfig;
use crate::geometry::{Edge, TriangleMesh};
use crate::projection::{CameraToPixel, OrthoCamera};
use crate::raster::{RenderOutput, RgbaImage, MAX_PIXEL_COORD};

/// Why an edge is part of the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// One side faces the camera and the other does not, or the edge has
    /// only one side.
    Hard,
    /// Both sides face the same way but meet at a sharp angle.
    Soft,
}

/// Classify `edge` for a camera looking along `forward`.
///
/// Returns `None` for edges that are not drawn. NaN normals compare false
/// everywhere, so they never produce a crease on their own.
pub fn classify_edge(
    mesh: &TriangleMesh,
    edge: &Edge,
    forward: &Vector3<f64>,
    crease_threshold: f64,
) -> Option<EdgeKind> {
    let Some(right) = edge.right else {
        return Some(EdgeKind::Hard);
    };
    let left_normal = mesh.normal(edge.left);
    let right_normal = mesh.normal(right);

    let left_back = left_normal.dot(forward) <= 0.0;
    let right_back = right_normal.dot(forward) <= 0.0;
    if left_back != right_back {
        Some(EdgeKind::Hard)
    } else if left_normal.dot(&right_normal) < crease_threshold {
        Some(EdgeKind::Soft)
    } else {
        None
    }
}

/// Outline overlay with the default [`OutlineConfig`].
pub fn extract_outline(
    mesh: &TriangleMesh,
    render: &RenderOutput,
    camera: &OrthoCamera,
    scale: &CameraToPixel,
) -> RgbaImage {
    extract_outline_with(mesh, render, camera, scale, &OutlineConfig::default())
}

/// Draw the hard and soft edges of `mesh` into a transparent overlay the size
/// of `render`.
///
/// `camera` and `scale` must be the ones `render` was produced with.
#[instrument(skip_all, fields(edges = mesh.edge_count()))]
pub fn extract_outline_with(
    mesh: &TriangleMesh,
    render: &RenderOutput,
    camera: &OrthoCamera,
    scale: &CameraToPixel,
    config: &OutlineConfig,
) -> RgbaImage {
    let started = Instant::now();
    let forward = camera.forward();
    let mut painter = EdgePainter::new(render, config);
    let (mut hard, mut soft) = (0usize, 0usize);

    for edge in mesh.edges() {
        // Matched edges are visited from both sides; walk each once
        if edge.right.is_some() && edge.start > edge.end {
            continue;
        }
        match classify_edge(mesh, &edge, &forward, config.crease_threshold) {
            Some(EdgeKind::Hard) => hard += 1,
            Some(EdgeKind::Soft) => soft += 1,
            None => continue,
        }

        let start = mesh.coords()[edge.start];
        let end = mesh.coords()[edge.end];
        let from = scale.world_to_pixel(camera, &start);
        let to = scale.world_to_pixel(camera, &end);
        if ![from, to]
            .iter()
            .all(|p| p.x.abs() <= MAX_PIXEL_COORD && p.y.abs() <= MAX_PIXEL_COORD)
        {
            continue;
        }
        let depths = (start.coords.dot(&forward), end.coords.dot(&forward));
        walk_line(from, to, depths, |x, y, depth| painter.plot(x, y, depth, &edge));
    }

    debug!(
        hard,
        soft,
        visible_pixels = painter.visible,
        hidden_pixels = painter.hidden,
        elapsed_us = started.elapsed().as_micros() as u64,
        "extracted outline"
    );
    painter.overlay
}

/// Step along the major axis from `from` to `to`, one pixel per step,
/// carrying the minor-axis error and a linearly interpolated depth.
fn walk_line(
    from: Point2<f64>,
    to: Point2<f64>,
    depths: (f64, f64),
    mut plot: impl FnMut(i64, i64, f64),
) {
    let x_major = (to.x - from.x).abs() >= (to.y - from.y).abs();
    let swap_axes = |p: Point2<f64>| if x_major { (p.x, p.y) } else { (p.y, p.x) };
    let (mut start, mut end) = (swap_axes(from), swap_axes(to));
    let (mut start_depth, mut end_depth) = depths;
    if start.0 > end.0 {
        std::mem::swap(&mut start, &mut end);
        std::mem::swap(&mut start_depth, &mut end_depth);
    }

    let span = end.0 - start.0;
    let (slope, depth_step) = if span > 0.0 {
        ((end.1 - start.1) / span, (end_depth - start_depth) / span)
    } else {
        (0.0, 0.0)
    };

    let round = |v: f64| (v + 0.5).floor() as i64;
    let mut major = round(start.0);
    let mut minor = round(start.1);
    let mut error = 0.0;
    let mut depth = start_depth;
    for _ in 0..=(span.floor() as i64) {
        if x_major {
            plot(major, minor, depth);
        } else {
            plot(minor, major, depth);
        }
        depth += depth_step;
        error += slope;
        if error > 0.5 {
            error -= 1.0;
            minor += 1;
        } else if error < -0.5 {
            error += 1.0;
            minor -= 1;
        }
        major += 1;
    }
}

struct EdgePainter<'a> {
    render: &'a RenderOutput,
    config: &'a OutlineConfig,
    overlay: RgbaImage,
    visible: usize,
    hidden: usize,
}

impl<'a> EdgePainter<'a> {
    fn new(render: &'a RenderOutput, config: &'a OutlineConfig) -> Self {
        Self {
            render,
            config,
            overlay: RgbaImage::new(render.size()),
            visible: 0,
            hidden: 0,
        }
    }

    fn plot(&mut self, x: i64, y: i64, depth: f64, edge: &Edge) {
        let size = self.render.size();
        if x < 0 || y < 0 || x >= size.width as i64 || y >= size.height as i64 {
            return;
        }
        let (x, y) = (x as u32, y as u32);

        let visible = self.nearest_around(x, y) <= depth + self.config.depth_tolerance
            || self.owned_by_edge(x, y, edge);
        if visible {
            self.overlay.set_pixel(x, y, self.config.line_color);
            self.visible += 1;
        } else {
            if let Some(color) = self.config.occluded_color {
                if self.overlay.pixel(x, y)[3] == 0 {
                    self.overlay.set_pixel(x, y, color);
                }
            }
            self.hidden += 1;
        }
    }

    /// Smallest depth among the pixel and its in-bounds 4-neighbours.
    fn nearest_around(&self, x: u32, y: u32) -> f64 {
        let size = self.render.size();
        let mut nearest = self.render.depth_at(x, y);
        let neighbours = [
            (x.checked_sub(1), Some(y)),
            (Some(x + 1).filter(|&nx| nx < size.width), Some(y)),
            (Some(x), y.checked_sub(1)),
            (Some(x), Some(y + 1).filter(|&ny| ny < size.height)),
        ];
        for (nx, ny) in neighbours {
            if let (Some(nx), Some(ny)) = (nx, ny) {
                nearest = nearest.min(self.render.depth_at(nx, ny));
            }
        }
        nearest
    }

    fn owned_by_edge(&self, x: u32, y: u32, edge: &Edge) -> bool {
        match self.render.triangle_at(x, y) {
            Some(owner) => owner == edge.left || Some(owner) == edge.right,
            None => false,
        }
    }
}
