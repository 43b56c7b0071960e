//! Indexed triangle meshes, edge adjacency and bounding volumes
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use nalgebra::{Point2, Point3, Vector2, Vector3};
use tracing::{debug, warn};

use crate::error::{OrthoError, Result};

/// Width and height of a render target in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject sizes with no pixels along either axis.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(OrthoError::InvalidImageSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3d {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds3d {
    /// Smallest box containing every point. Empty input yields an inverted box.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min = min.inf(p);
            max = max.sup(p);
        }
        Self { min, max }
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// The eight corners; bit 0 of the index picks x, bit 1 y, bit 2 z.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let x = [self.min.x, self.max.x];
        let y = [self.min.y, self.max.y];
        let z = [self.min.z, self.max.z];
        std::array::from_fn(|i| Point3::new(x[i & 1], y[(i >> 1) & 1], z[(i >> 2) & 1]))
    }

    /// Grow every axis by `size * factor` on both sides.
    pub fn padded(&self, factor: f64) -> Self {
        let grow = self.size() * factor;
        Self {
            min: self.min - grow,
            max: self.max + grow,
        }
    }
}

/// Axis-aligned rectangle in camera film space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2d {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Bounds2d {
    pub fn size(&self) -> Vector2<f64> {
        self.max - self.min
    }
}

/// One directed mesh edge and the triangles on either side of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    /// Triangle owning this edge in its clockwise A→B, B→C, C→A order.
    pub left: usize,
    /// Triangle owning the reverse edge, if the mesh has one.
    pub right: Option<usize>,
}

/// A directed edge whose reverse was not found during edge matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonManifoldEdge {
    pub edge: usize,
    pub start: usize,
    pub end: usize,
    pub triangle: usize,
}

/// Deduplicated, indexed triangle mesh with per-edge adjacency.
///
/// Storage is structure-of-arrays: `tri_a/tri_b/tri_c` and `normals` are
/// parallel per triangle, the `edge_*` vectors are parallel per directed edge
/// (three per triangle, edge `3 * t + k` is side `k` of triangle `t`).
/// A mesh is immutable once built.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    coords: Vec<Point3<f64>>,
    tri_a: Vec<usize>,
    tri_b: Vec<usize>,
    tri_c: Vec<usize>,
    normals: Vec<Vector3<f64>>,
    edge_starts: Vec<usize>,
    edge_ends: Vec<usize>,
    edge_left_normals: Vec<usize>,
    edge_right_normals: Vec<Option<usize>>,
    non_manifold: Vec<NonManifoldEdge>,
}

impl TriangleMesh {
    /// Build a mesh from explicit triangles, merging bit-identical vertices.
    pub fn from_triangles(triangles: &[[Point3<f64>; 3]]) -> Self {
        let mut builder = MeshBuilder::with_capacity(triangles.len());
        for triangle in triangles {
            for vertex in triangle {
                let key = [vertex.x.to_bits(), vertex.y.to_bits(), vertex.z.to_bits()];
                builder.push_vertex(key, *vertex);
            }
        }
        builder.finish()
    }

    /// Closed, consistently wound cube centered on the origin.
    pub fn cube(size: f64) -> Self {
        let h = size / 2.0;
        let p = Point3::new;
        Self::from_triangles(&[
            // +Z
            [p(-h, -h, h), p(h, -h, h), p(h, h, h)],
            [p(-h, -h, h), p(h, h, h), p(-h, h, h)],
            // -Z
            [p(-h, -h, -h), p(-h, h, -h), p(h, h, -h)],
            [p(-h, -h, -h), p(h, h, -h), p(h, -h, -h)],
            // +Y
            [p(-h, h, -h), p(-h, h, h), p(h, h, h)],
            [p(-h, h, -h), p(h, h, h), p(h, h, -h)],
            // -Y
            [p(-h, -h, -h), p(h, -h, -h), p(h, -h, h)],
            [p(-h, -h, -h), p(h, -h, h), p(-h, -h, h)],
            // +X
            [p(h, -h, -h), p(h, h, -h), p(h, h, h)],
            [p(h, -h, -h), p(h, h, h), p(h, -h, h)],
            // -X
            [p(-h, -h, -h), p(-h, -h, h), p(-h, h, h)],
            [p(-h, -h, -h), p(-h, h, h), p(-h, h, -h)],
        ])
    }

    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    pub fn vertex_count(&self) -> usize {
        self.coords.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.tri_a.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_starts.len()
    }

    /// Vertex indices of triangle `index` in winding order.
    pub fn triangle(&self, index: usize) -> [usize; 3] {
        [self.tri_a[index], self.tri_b[index], self.tri_c[index]]
    }

    /// Vertex positions of triangle `index` in winding order.
    pub fn triangle_positions(&self, index: usize) -> [Point3<f64>; 3] {
        self.triangle(index).map(|v| self.coords[v])
    }

    /// Unit normal of triangle `index`; NaN components for degenerate triangles.
    pub fn normal(&self, index: usize) -> Vector3<f64> {
        self.normals[index]
    }

    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    pub fn edge(&self, index: usize) -> Edge {
        Edge {
            start: self.edge_starts[index],
            end: self.edge_ends[index],
            left: self.edge_left_normals[index],
            right: self.edge_right_normals[index],
        }
    }

    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        (0..self.edge_count()).map(move |i| self.edge(i))
    }

    /// Edges reported as non-manifold while matching adjacency.
    pub fn non_manifold_edges(&self) -> &[NonManifoldEdge] {
        &self.non_manifold
    }

    pub fn is_manifold(&self) -> bool {
        self.non_manifold.is_empty()
    }

    pub fn bounds(&self) -> Bounds3d {
        Bounds3d::from_points(&self.coords)
    }

    /// Pair every directed edge with the triangle that owns its reverse.
    ///
    /// All edges are registered before any is matched, since the reverse of
    /// an edge may belong to a later triangle.
    fn match_edges(mut self) -> Self {
        let started = Instant::now();
        let count = self.triangle_count();
        let mut lookup: HashMap<(usize, usize), usize> = HashMap::with_capacity(count * 3);

        self.edge_starts = Vec::with_capacity(count * 3);
        self.edge_ends = Vec::with_capacity(count * 3);
        self.edge_left_normals = Vec::with_capacity(count * 3);
        for t in 0..count {
            for (start, end) in self.sides(t) {
                lookup.insert((start, end), self.edge_starts.len());
                self.edge_starts.push(start);
                self.edge_ends.push(end);
                self.edge_left_normals.push(t);
            }
        }

        self.edge_right_normals = vec![None; self.edge_starts.len()];
        self.non_manifold.clear();
        for t in 0..count {
            for (k, (start, end)) in self.sides(t).into_iter().enumerate() {
                match lookup.get(&(end, start)) {
                    Some(&reverse) => self.edge_right_normals[reverse] = Some(t),
                    None => self.non_manifold.push(NonManifoldEdge {
                        edge: 3 * t + k,
                        start,
                        end,
                        triangle: t,
                    }),
                }
            }
        }

        debug!(
            edges = self.edge_starts.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "edge matching complete"
        );
        if !self.non_manifold.is_empty() {
            warn!(
                unmatched = self.non_manifold.len(),
                "non-manifold mesh detected"
            );
        }
        self
    }

    fn sides(&self, t: usize) -> [(usize, usize); 3] {
        let [a, b, c] = self.triangle(t);
        [(a, b), (b, c), (c, a)]
    }
}

/// Normal of the plane through `a`, `b`, `c`, following the winding order.
///
/// Zero-area triangles produce NaN components.
pub fn face_normal(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Vector3<f64> {
    let n = (b - a).cross(&(c - a));
    n / n.norm()
}

/// Incremental mesh construction with exact-key vertex deduplication.
///
/// Every third pushed vertex closes a triangle. The key type decides what
/// "identical" means: raw float bits for binary data, line text for ASCII.
pub(crate) struct MeshBuilder<K> {
    lookup: HashMap<K, usize>,
    mesh: TriangleMesh,
    pending: [usize; 3],
    pending_len: usize,
}

impl<K: Hash + Eq> MeshBuilder<K> {
    pub(crate) fn with_capacity(triangles: usize) -> Self {
        let mut mesh = TriangleMesh::default();
        mesh.tri_a.reserve(triangles);
        mesh.tri_b.reserve(triangles);
        mesh.tri_c.reserve(triangles);
        mesh.normals.reserve(triangles);
        Self {
            lookup: HashMap::new(),
            mesh,
            pending: [0; 3],
            pending_len: 0,
        }
    }

    pub(crate) fn push_vertex(&mut self, key: K, position: Point3<f64>) {
        let coords = &mut self.mesh.coords;
        let index = *self.lookup.entry(key).or_insert_with(|| {
            coords.push(position);
            coords.len() - 1
        });
        self.pending[self.pending_len] = index;
        self.pending_len += 1;

        if self.pending_len == 3 {
            let [a, b, c] = self.pending;
            let normal = face_normal(
                &self.mesh.coords[a],
                &self.mesh.coords[b],
                &self.mesh.coords[c],
            );
            self.mesh.tri_a.push(a);
            self.mesh.tri_b.push(b);
            self.mesh.tri_c.push(c);
            self.mesh.normals.push(normal);
            self.pending_len = 0;
        }
    }

    /// Vertices pushed since the last complete triangle.
    pub(crate) fn pending_vertices(&self) -> usize {
        self.pending_len
    }

    /// Close the mesh and build its edge adjacency. Pending vertices are dropped.
    pub(crate) fn finish(self) -> TriangleMesh {
        self.mesh.match_edges()
    }
}
