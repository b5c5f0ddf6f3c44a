//! Fit-policy math and per-page rasterization planning
//!
//! The plan separates the logical paint scale (what fit policy and zoom ask
//! for) from the physical scale handed to the decoder (which folds in the
//! device pixel ratio). Painting at logical size alone blurs on high-density
//! displays.

use super::types::{ContainerSize, FitPolicy};
use super::{PIPELINE_MAX_SCALE, PIPELINE_MIN_SCALE};

/// Everything a paint pass needs besides the document itself
#[derive(Clone, Debug, PartialEq)]
pub struct PaintParams {
    pub container: ContainerSize,
    pub device_pixel_ratio: f32,
    pub fit: FitPolicy,
    /// Committed zoom scale from the gesture machine; multiplies the fit base
    pub committed_scale: f32,
}

impl PaintParams {
    #[must_use]
    pub fn new(container: ContainerSize, device_pixel_ratio: f32) -> Self {
        Self {
            container,
            device_pixel_ratio,
            fit: FitPolicy::default(),
            committed_scale: 1.0,
        }
    }
}

impl Default for PaintParams {
    fn default() -> Self {
        Self::new(ContainerSize::new(0.0, 0.0), 1.0)
    }
}

/// Pre-computed rasterization parameters for one page
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterPlan {
    /// Logical paint scale: fit base x committed zoom, clamped
    pub scale: f32,
    /// Scale handed to the decoder; includes the device pixel ratio
    pub physical_scale: f32,
    /// Physical surface width in pixels; decoder output is validated
    /// against it at paint time, within a pixel of rounding
    pub surface_width: u32,
    /// Physical surface height in pixels; same validation contract
    pub surface_height: u32,
}

impl RasterPlan {
    /// Compute the plan for a page of intrinsic size `page_size` at scale 1
    #[must_use]
    pub fn compute(page_size: (f32, f32), params: &PaintParams) -> Self {
        let (page_w, page_h) = page_size;

        let base = match params.fit {
            FitPolicy::Width => params.container.width / page_w,
            FitPolicy::Page => {
                (params.container.width / page_w).min(params.container.height / page_h)
            }
            FitPolicy::Custom(scale) => scale,
        };

        let scale = clamp_effective(base * params.committed_scale);
        let physical_scale = scale * params.device_pixel_ratio;

        Self {
            scale,
            physical_scale,
            surface_width: (page_w * physical_scale).ceil() as u32,
            surface_height: (page_h * physical_scale).ceil() as u32,
        }
    }
}

/// Clamp to the pipeline bounds, falling back to 1.0 on NaN/Inf (degenerate
/// page or container sizes)
fn clamp_effective(scale: f32) -> f32 {
    if !scale.is_finite() {
        1.0
    } else {
        scale.clamp(PIPELINE_MIN_SCALE, PIPELINE_MAX_SCALE)
    }
}
