//! OrthoView Core Library - STL meshes to orthographic drawings on the CPU
//!
//! This library provides the stateless core of the viewer: STL parsing into
//! an indexed mesh with edge adjacency, orthographic camera fitting, a
//! fixed-point triangle rasterizer and a silhouette/crease outline pass.
//!
//! ```
//! use orthoview_core::{extract_outline, render, OrthoCamera, TriangleMesh, ViewConfig};
//!
//! # fn main() -> orthoview_core::Result<()> {
//! let mesh = TriangleMesh::cube(10.0);
//! let view = ViewConfig::default().with_size(64, 64);
//! let camera = OrthoCamera::isometric_front_overhead();
//! let scale = view.fit(&camera, &mesh.bounds())?;
//!
//! let output = render(&mesh, &camera, &scale, view.size)?;
//! let outline = extract_outline(&mesh, &output, &camera, &scale);
//! let mut pixels = output.into_pixels();
//! pixels.composite(&outline);
//! assert_eq!(pixels.as_bytes().len(), 64 * 64 * 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod outline;
pub mod projection;
pub mod raster;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use config::{OutlineConfig, ViewConfig};
pub use error::{OrthoError, Result};
pub use geometry::{Bounds2d, Bounds3d, Edge, ImageSize, NonManifoldEdge, TriangleMesh};
pub use outline::{classify_edge, extract_outline, extract_outline_with, EdgeKind};
pub use projection::{multi_view_camera_to_pixel, viewing_window, CameraSet, CameraToPixel, OrthoCamera};
pub use raster::{render, RenderOutput, RgbaImage};
pub use stl::{detect_format, parse_stl, StlFormat};
pub use transform::{RotationState, Transform};
