//! Presentational boundary
//!
//! Maps `LoadState` onto the four branches the surrounding shell renders,
//! and re-exposes the original URL to the OS opener. No business logic.

use std::sync::Arc;

use super::loader::LoadState;
use super::types::RenderedPage;

/// The four presentational branches. Only `Ready` may carry pages.
#[derive(Clone, Debug)]
pub enum ViewBranch<'a> {
    Loading { attempt: u32, max_attempts: u32 },
    Error { message: &'a str },
    Empty,
    Ready { pages: &'a [Arc<RenderedPage>] },
}

impl<'a> ViewBranch<'a> {
    /// Derive the branch for a load state. `Idle` (no URL) renders as the
    /// neutral empty branch.
    #[must_use]
    pub fn from_state(
        state: &'a LoadState,
        max_attempts: u32,
        pages: &'a [Arc<RenderedPage>],
    ) -> Self {
        match state {
            LoadState::Idle | LoadState::Empty => ViewBranch::Empty,
            LoadState::Loading { attempt } => ViewBranch::Loading {
                attempt: *attempt,
                max_attempts,
            },
            LoadState::Error { message, .. } => ViewBranch::Error { message },
            LoadState::Ready { .. } => ViewBranch::Ready { pages },
        }
    }
}

/// Progress line for the loading branch
#[must_use]
pub fn loading_caption(attempt: u32, max_attempts: u32) -> String {
    format!("Loading document (attempt {} of {max_attempts})", attempt + 1)
}

/// Hand the original URL to the OS opener. Available in every state so the
/// user is never fully blocked by the engine.
pub fn open_externally(url: &str) -> std::io::Result<()> {
    open::that(url)
}
