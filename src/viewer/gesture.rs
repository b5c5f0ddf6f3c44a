//! Viewport gesture state machine
//!
//! Owns the pan offset and committed zoom scale. Consumes pointer lifecycle
//! events and produces two kinds of effects: a cheap display-transform update
//! on every relevant event, and a discrete scale commit at gesture end that
//! the owner answers with a re-paint at native resolution.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::types::{PointerEvent, PointerKind, PointerPhase, ViewportTransform};
use super::{MAX_SCALE, MIN_SCALE};

/// Two fingers closer than this at pinch start would make the distance ratio
/// explode; the span is floored instead.
const MIN_PINCH_SPAN: f32 = 10.0;

const SCALE_EPSILON: f32 = 1e-3;

fn default_double_tap_window_ms() -> u64 {
    300
}
fn default_double_tap_radius_px() -> f32 {
    30.0
}
fn default_drag_slop_px() -> f32 {
    8.0
}
fn default_settle_ms() -> u64 {
    50
}
fn default_double_tap_zoom() -> f32 {
    1.75
}

/// Tuning values for gesture recognition. None of them is load-bearing
/// beyond feel; the defaults follow common platform conventions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Max gap between two taps recognized as a double-tap
    #[serde(default = "default_double_tap_window_ms")]
    pub double_tap_window_ms: u64,

    /// Max distance between two taps recognized as a double-tap
    #[serde(default = "default_double_tap_radius_px")]
    pub double_tap_radius_px: f32,

    /// Movement beyond this breaks a tap and counts as a drag
    #[serde(default = "default_drag_slop_px")]
    pub drag_slop_px: f32,

    /// Animation-suppression window after a pinch commit
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Committed scale a double-tap toggles to
    #[serde(default = "default_double_tap_zoom")]
    pub double_tap_zoom: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_tap_window_ms: default_double_tap_window_ms(),
            double_tap_radius_px: default_double_tap_radius_px(),
            drag_slop_px: default_drag_slop_px(),
            settle_ms: default_settle_ms(),
            double_tap_zoom: default_double_tap_zoom(),
        }
    }
}

/// Exactly one gesture is active at a time
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureState {
    Idle,

    /// One pointer dragging the surface
    Panning {
        pointer_id: u32,
        start_pointer: (f32, f32),
        start_pan: (f32, f32),
    },

    /// Two pointers scaling the surface; `preview_scale` is display-only
    /// until release
    Pinching {
        pointer_a: u32,
        pointer_b: u32,
        initial_distance: f32,
        initial_scale: f32,
        preview_scale: f32,
    },

    /// Settle window after a pinch commit, suppressing transform animation
    /// until the committed re-paint lands
    FinalizingZoom { until_ms: u64 },
}

/// What the owner must do in response to an event
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEffect {
    /// Apply the new display transform to the rendered surface (cheap)
    TransformChanged(ViewportTransform),

    /// Re-paint at this committed scale (expensive)
    CommitScale(f32),
}

#[derive(Clone, Copy, Debug)]
struct TrackedPointer {
    x: f32,
    y: f32,
    kind: PointerKind,
    down_x: f32,
    down_y: f32,
    moved: bool,
}

#[derive(Clone, Copy, Debug)]
struct Tap {
    x: f32,
    y: f32,
    at_ms: u64,
}

/// The gesture state machine. One per mounted viewer instance; persists
/// across re-paints of the same document and resets only on URL change.
///
/// The committed zoom (`transform.scale`, the render pipeline's input) and
/// the display multiplier applied to the painted surface are tracked
/// separately: the multiplier is 1.0 at rest, carries the live ratio during
/// a pinch, holds the commit ratio over the old raster until the re-paint
/// lands, and returns to 1.0 via [`GestureMachine::repaint_landed`].
#[derive(Debug)]
pub struct GestureMachine {
    config: GestureConfig,
    state: GestureState,
    transform: ViewportTransform,
    /// Multiplier on the painted surface; 1.0 means pixels show 1:1
    display_scale: f32,
    pointers: HashMap<u32, TrackedPointer>,
    last_tap: Option<Tap>,
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureMachine {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            transform: ViewportTransform::identity(),
            display_scale: 1.0,
            pointers: HashMap::new(),
            last_tap: None,
        }
    }

    /// The committed transform (rest scale, current pan)
    #[must_use]
    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    #[must_use]
    pub fn state(&self) -> GestureState {
        self.state
    }

    /// The transform to apply to the rendered surface right now. `scale` is
    /// a multiplier relative to the painted pixels: 1.0 at rest, the live
    /// preview ratio during a pinch, and the held commit ratio until the
    /// re-paint lands.
    #[must_use]
    pub fn display_transform(&self) -> ViewportTransform {
        ViewportTransform {
            pan_x: self.transform.pan_x,
            pan_y: self.transform.pan_y,
            scale: self.display_scale,
        }
    }

    /// The owner re-painted at the committed scale; fresh pixels are 1:1,
    /// so any held preview multiplier is dropped.
    pub fn repaint_landed(&mut self) {
        self.display_scale = 1.0;
    }

    /// True inside the post-pinch settle window, when the owner should apply
    /// transform changes without animating them
    #[must_use]
    pub fn animation_suppressed(&self, now_ms: u64) -> bool {
        matches!(self.state, GestureState::FinalizingZoom { until_ms } if now_ms < until_ms)
    }

    /// Advance time-based transitions (the settle window)
    pub fn tick(&mut self, now_ms: u64) {
        if let GestureState::FinalizingZoom { until_ms } = self.state {
            if now_ms >= until_ms {
                self.state = GestureState::Idle;
            }
        }
    }

    /// Back to identity; used when the document URL changes
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.transform = ViewportTransform::identity();
        self.display_scale = 1.0;
        self.pointers.clear();
        self.last_tap = None;
    }

    /// Feed one pointer event through the machine
    pub fn apply(&mut self, event: PointerEvent) -> Vec<GestureEffect> {
        // Touch interactions synthesize trailing mouse events on some
        // platforms; a mouse pointer never participates while touch is down.
        if event.kind == PointerKind::Mouse && self.touch_active() {
            return Vec::new();
        }

        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event),
            PointerPhase::Up => self.pointer_up(event),
            PointerPhase::Cancel => self.pointer_cancel(event),
        }
    }

    fn touch_active(&self) -> bool {
        self.pointers.values().any(|p| p.kind == PointerKind::Touch)
    }

    fn distance(&self, a: u32, b: u32) -> f32 {
        match (self.pointers.get(&a), self.pointers.get(&b)) {
            (Some(pa), Some(pb)) => (pa.x - pb.x).hypot(pa.y - pb.y),
            _ => 0.0,
        }
    }

    fn pointer_pair(&self) -> (u32, u32) {
        let mut ids: Vec<u32> = self.pointers.keys().copied().collect();
        ids.sort_unstable();
        (ids[0], ids[1])
    }

    fn begin_pan(&mut self, pointer_id: u32, x: f32, y: f32) {
        self.state = GestureState::Panning {
            pointer_id,
            start_pointer: (x, y),
            start_pan: (self.transform.pan_x, self.transform.pan_y),
        };
    }

    fn pointer_down(&mut self, event: PointerEvent) -> Vec<GestureEffect> {
        self.pointers.insert(
            event.pointer_id,
            TrackedPointer {
                x: event.x,
                y: event.y,
                kind: event.kind,
                down_x: event.x,
                down_y: event.y,
                moved: false,
            },
        );

        match self.pointers.len() {
            1 => self.begin_pan(event.pointer_id, event.x, event.y),
            2 => {
                let (pointer_a, pointer_b) = self.pointer_pair();
                let initial_distance = self.distance(pointer_a, pointer_b).max(MIN_PINCH_SPAN);
                self.state = GestureState::Pinching {
                    pointer_a,
                    pointer_b,
                    initial_distance,
                    initial_scale: self.transform.scale,
                    preview_scale: self.transform.scale,
                };
            }
            // Extra pointers do not interrupt an active pinch
            _ => {}
        }

        Vec::new()
    }

    fn pointer_move(&mut self, event: PointerEvent) -> Vec<GestureEffect> {
        let slop = self.config.drag_slop_px;
        let Some(pointer) = self.pointers.get_mut(&event.pointer_id) else {
            return Vec::new();
        };
        pointer.x = event.x;
        pointer.y = event.y;
        if !pointer.moved
            && (event.x - pointer.down_x).hypot(event.y - pointer.down_y) > slop
        {
            pointer.moved = true;
        }

        match self.state {
            GestureState::Panning {
                pointer_id,
                start_pointer,
                start_pan,
            } if pointer_id == event.pointer_id => {
                self.transform.pan_x = start_pan.0 + (event.x - start_pointer.0);
                self.transform.pan_y = start_pan.1 + (event.y - start_pointer.1);
                vec![GestureEffect::TransformChanged(self.display_transform())]
            }

            GestureState::Pinching {
                pointer_a,
                pointer_b,
                initial_distance,
                initial_scale,
                ..
            } if event.pointer_id == pointer_a || event.pointer_id == pointer_b => {
                let current = self.distance(pointer_a, pointer_b);
                let preview_scale = clamp_scale(initial_scale * (current / initial_distance));
                // The surface is painted at the scale the pinch started from,
                // so the preview ratio is what the display applies
                self.display_scale = preview_scale / initial_scale;
                self.state = GestureState::Pinching {
                    pointer_a,
                    pointer_b,
                    initial_distance,
                    initial_scale,
                    preview_scale,
                };
                vec![GestureEffect::TransformChanged(self.display_transform())]
            }

            // The finger left over from a pinch starts a fresh pan
            GestureState::Idle | GestureState::FinalizingZoom { .. }
                if self.pointers.len() == 1 =>
            {
                self.begin_pan(event.pointer_id, event.x, event.y);
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    fn pointer_up(&mut self, event: PointerEvent) -> Vec<GestureEffect> {
        let Some(record) = self.pointers.remove(&event.pointer_id) else {
            return Vec::new();
        };

        match self.state {
            GestureState::Pinching {
                pointer_a,
                pointer_b,
                initial_scale,
                preview_scale,
                ..
            } if event.pointer_id == pointer_a || event.pointer_id == pointer_b => {
                self.transform.scale = clamp_scale(preview_scale);
                // Keep showing the preview over the old raster until the
                // commit's re-paint lands
                self.display_scale = self.transform.scale / initial_scale;
                self.state = GestureState::FinalizingZoom {
                    until_ms: event.at_ms + self.config.settle_ms,
                };
                vec![
                    GestureEffect::TransformChanged(self.display_transform()),
                    GestureEffect::CommitScale(self.transform.scale),
                ]
            }

            _ => {
                let effects = if record.moved {
                    self.last_tap = None;
                    Vec::new()
                } else {
                    self.register_tap(event.x, event.y, event.at_ms)
                };

                if self.pointers.is_empty()
                    && matches!(self.state, GestureState::Panning { .. })
                {
                    self.state = GestureState::Idle;
                }
                effects
            }
        }
    }

    fn pointer_cancel(&mut self, event: PointerEvent) -> Vec<GestureEffect> {
        self.pointers.remove(&event.pointer_id);
        self.last_tap = None;

        match self.state {
            GestureState::Pinching {
                pointer_a,
                pointer_b,
                ..
            } if event.pointer_id == pointer_a || event.pointer_id == pointer_b => {
                // Abandoned pinch: drop the preview, keep the committed scale
                self.display_scale = 1.0;
                self.state = GestureState::Idle;
                vec![GestureEffect::TransformChanged(self.display_transform())]
            }

            GestureState::Panning { pointer_id, .. } if pointer_id == event.pointer_id => {
                self.state = GestureState::Idle;
                Vec::new()
            }

            _ => Vec::new(),
        }
    }

    fn register_tap(&mut self, x: f32, y: f32, at_ms: u64) -> Vec<GestureEffect> {
        if let Some(tap) = self.last_tap.take() {
            let close = (x - tap.x).hypot(y - tap.y) <= self.config.double_tap_radius_px;
            let quick = at_ms.saturating_sub(tap.at_ms) <= self.config.double_tap_window_ms;
            if close && quick {
                return self.double_tap();
            }
        }
        self.last_tap = Some(Tap { x, y, at_ms });
        Vec::new()
    }

    /// Toggle between 1.0 and the configured zoom factor, cancelling any
    /// in-progress gesture
    fn double_tap(&mut self) -> Vec<GestureEffect> {
        self.state = GestureState::Idle;
        let previous = self.transform.scale;
        let target = if (previous - 1.0).abs() < SCALE_EPSILON {
            self.config.double_tap_zoom
        } else {
            1.0
        };
        self.transform.scale = clamp_scale(target);
        // Preview the new zoom over the old raster until the re-paint lands
        self.display_scale = self.transform.scale / previous;
        vec![
            GestureEffect::TransformChanged(self.display_transform()),
            GestureEffect::CommitScale(self.transform.scale),
        ]
    }
}

/// Clamp to the committed-scale bounds, handling NaN/Inf
fn clamp_scale(scale: f32) -> f32 {
    if !scale.is_finite() {
        1.0
    } else {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}
