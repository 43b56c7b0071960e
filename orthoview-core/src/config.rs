//! View and outline settings.
//!
//! # Example
//!
//! ```
//! use orthoview_core::config::{OutlineConfig, ViewConfig};
//!
//! let view = ViewConfig::default().with_size(320, 240).with_padding(0.05);
//! assert!(view.validate().is_ok());
//!
//! let outline = OutlineConfig::default().with_line_color([255, 255, 255, 255]);
//! assert_eq!(outline.crease_threshold, 0.4);
//! ```
use crate::error::{OrthoError, Result};
use crate::geometry::{Bounds3d, ImageSize};
use crate::projection::{multi_view_camera_to_pixel, CameraSet, CameraToPixel, OrthoCamera};

/// Output image size and the empty margin kept around the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewConfig {
    pub size: ImageSize,
    /// Fraction of the image left empty on each side of the tighter axis, in `[0, 0.5)`.
    pub padding_factor: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            size: ImageSize::new(400, 400),
            padding_factor: 0.1,
        }
    }
}

impl ViewConfig {
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = ImageSize::new(width, height);
        self
    }

    #[must_use]
    pub fn with_padding(mut self, padding_factor: f64) -> Self {
        self.padding_factor = padding_factor;
        self
    }

    /// Check every parameter without fitting a camera.
    pub fn validate(&self) -> Result<()> {
        self.size.validate()?;
        if !(0.0..0.5).contains(&self.padding_factor) {
            return Err(OrthoError::InvalidPadding(self.padding_factor));
        }
        Ok(())
    }

    /// Fit a single camera to `bounds` with these settings.
    pub fn fit(&self, camera: &OrthoCamera, bounds: &Bounds3d) -> Result<CameraToPixel> {
        CameraToPixel::fit(camera, bounds, self.size, self.padding_factor)
    }

    /// Fit several cameras to `bounds` at one shared scale.
    pub fn fit_all(
        &self,
        cameras: &CameraSet<OrthoCamera>,
        bounds: &Bounds3d,
    ) -> Result<CameraSet<CameraToPixel>> {
        multi_view_camera_to_pixel(cameras, bounds, self.size, self.padding_factor)
    }
}

/// How outline edges are classified and drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineConfig {
    /// RGBA written to visible edge pixels.
    pub line_color: [u8; 4],
    /// RGBA written to occluded edge pixels that are still empty, if any.
    pub occluded_color: Option<[u8; 4]>,
    /// Slack allowed when comparing an edge's depth against the depth buffer.
    pub depth_tolerance: f64,
    /// Edges whose adjacent normals have a dot product below this are creases.
    pub crease_threshold: f64,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            line_color: [0, 0, 0, 255],
            occluded_color: None,
            depth_tolerance: 1e-4,
            crease_threshold: 0.4,
        }
    }
}

impl OutlineConfig {
    /// Also paint hidden edges, in a faint red.
    #[must_use]
    pub fn with_hidden_lines() -> Self {
        Self::default().with_occluded_color(Some([255, 128, 128, 255]))
    }

    #[must_use]
    pub fn with_line_color(mut self, rgba: [u8; 4]) -> Self {
        self.line_color = rgba;
        self
    }

    #[must_use]
    pub fn with_occluded_color(mut self, rgba: Option<[u8; 4]>) -> Self {
        self.occluded_color = rgba;
        self
    }

    #[must_use]
    pub fn with_depth_tolerance(mut self, tolerance: f64) -> Self {
        self.depth_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_crease_threshold(mut self, threshold: f64) -> Self {
        self.crease_threshold = threshold;
        self
    }
}
