//! Core types for the viewer engine

use serde::{Deserialize, Serialize};

/// Pan offset and zoom scale applied to the rendered surface.
///
/// The gesture machine's committed transform carries the zoom fed to the
/// render pipeline; the transform returned by
/// [`GestureMachine::display_transform`] instead carries a multiplier over
/// the painted pixels (1.0 once a re-paint has landed).
///
/// [`GestureMachine::display_transform`]: super::GestureMachine::display_transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportTransform {
    /// Horizontal pan offset in logical units (unclamped)
    pub pan_x: f32,
    /// Vertical pan offset in logical units (unclamped)
    pub pan_y: f32,
    /// Zoom scale; which resolution 1.0 refers to depends on whether this is
    /// the committed or the display transform
    pub scale: f32,
}

impl ViewportTransform {
    /// No pan, scale 1.0
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            scale: 1.0,
        }
    }
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// How the base paint scale is derived from the container size
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Fill the container width
    Width,
    /// Fit the whole page inside the container
    Page,
    /// Explicit scale; container size is ignored
    Custom(f32),
}

impl Default for FitPolicy {
    fn default() -> Self {
        Self::Width
    }
}

/// Logical size available to the viewer, in layout units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContainerSize {
    pub width: f32,
    pub height: f32,
}

impl ContainerSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Raw RGB raster produced by the decoder (3 bytes per pixel)
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub pixels: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A page painted at a specific scale.
///
/// Replaced wholesale whenever the committed scale, fit policy, or viewport
/// changes; never patched in place.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Source page index (0-based)
    pub page_index: usize,
    /// Logical scale the page was painted at, before pixel-density scaling.
    /// Stored as millionths so surfaces can be compared and hashed exactly.
    pub scale_millionths: u32,
    /// Painted pixels, sized `page * scale * device_pixel_ratio`
    pub image: RasterImage,
}

impl RenderedPage {
    /// Logical paint scale as a float
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale_millionths as f32 / 1_000_000.0
    }
}

impl std::fmt::Debug for RenderedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderedPage")
            .field("page_index", &self.page_index)
            .field("scale", &self.scale())
            .field("width_px", &self.image.width_px)
            .field("height_px", &self.image.height_px)
            .finish_non_exhaustive()
    }
}

/// Device a pointer event originated from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Touch,
    Mouse,
}

/// Pointer lifecycle phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer lifecycle event, scoped to the rendering frame.
///
/// Timestamps are milliseconds on the caller's monotonic clock; the engine
/// only ever compares them, never interprets their origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub kind: PointerKind,
    pub phase: PointerPhase,
    pub x: f32,
    pub y: f32,
    pub at_ms: u64,
}

impl PointerEvent {
    /// Helper for building touch events
    #[must_use]
    pub const fn touch(pointer_id: u32, phase: PointerPhase, x: f32, y: f32, at_ms: u64) -> Self {
        Self {
            pointer_id,
            kind: PointerKind::Touch,
            phase,
            x,
            y,
            at_ms,
        }
    }

    /// Helper for building mouse events
    #[must_use]
    pub const fn mouse(pointer_id: u32, phase: PointerPhase, x: f32, y: f32, at_ms: u64) -> Self {
        Self {
            pointer_id,
            kind: PointerKind::Mouse,
            phase,
            x,
            y,
            at_ms,
        }
    }
}
