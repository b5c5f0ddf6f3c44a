//! Document viewer render and gesture engine
//!
//! Loads a binary document from a URL, rasterizes its pages at the device's
//! pixel density, and drives the rendered surfaces through a continuous
//! pan/zoom interaction model. Everything long-running happens on a worker
//! thread; results are applied from `ViewerEngine::poll` and validated
//! against the engine's current URL epoch before touching state.

use std::time::Duration;

mod cache;
mod decode;
mod engine;
mod fetch;
mod gesture;
mod input;
mod loader;
mod pipeline;
mod shell;
mod types;
mod worker;

pub use cache::{FitKey, SurfaceCache, SurfaceKey};
#[cfg(feature = "pdf")]
pub use decode::PdfDecoder;
pub use decode::{DecodeError, DecodedDocument, DocumentDecoder, ensure_engine_initialized};
pub use engine::{EngineConfig, EngineEvent, ViewerEngine};
pub use fetch::{DocumentFetcher, FetchError, StandardFetcher};
pub use gesture::{GestureConfig, GestureEffect, GestureMachine, GestureState};
pub use input::{InputBinding, PointerSource, SimulatedPointerSource};
pub use loader::{LoadFault, LoadPolicy, LoadState};
pub use pipeline::{PaintParams, RasterPlan};
pub use shell::{ViewBranch, loading_caption, open_externally};
pub use types::*;
pub use worker::{JobTag, WorkerEvent, WorkerJob};

/// Minimum committed zoom scale
pub const MIN_SCALE: f32 = 0.25;
/// Maximum committed zoom scale
pub const MAX_SCALE: f32 = 3.0;

/// Floor for the effective paint scale after fit-policy math
pub const PIPELINE_MIN_SCALE: f32 = 0.1;
/// Ceiling for the effective paint scale after fit-policy math
pub const PIPELINE_MAX_SCALE: f32 = 5.0;

/// Budget for one fetch+decode attempt
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(20);
/// Bounded automatic retries per document URL
pub const MAX_ATTEMPTS: u32 = 3;

/// Default capacity of the painted-surface cache, in pages
pub const DEFAULT_CACHE_SIZE: usize = 32;
