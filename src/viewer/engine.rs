//! Viewer engine - one explicit state object per mounted viewer instance
//!
//! Composes the load/retry policy, the render worker, and the gesture
//! machine. All long-running work happens on the worker thread; results are
//! applied only from `poll`, after their epoch/attempt tag is re-validated
//! against the engine's current state. That validation, not any abort
//! signal, is what keeps a slow load for an old URL from overwriting a fast
//! load for a new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use flume::{Receiver, Sender};

use super::gesture::{GestureConfig, GestureEffect, GestureMachine};
use super::loader::{LoadFault, LoadPolicy, LoadState};
use super::pipeline::PaintParams;
use super::types::{ContainerSize, FitPolicy, PointerEvent, RenderedPage, ViewportTransform};
use super::worker::{run_worker, JobTag, WorkerEvent, WorkerJob};
use super::{decode::DocumentDecoder, fetch::DocumentFetcher, DEFAULT_CACHE_SIZE};
use crate::telemetry::{LogTelemetry, Telemetry};

/// Configuration for one engine instance
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub load: LoadPolicy,
    pub gesture: GestureConfig,
    pub cache_capacity: usize,
}

impl EngineConfig {
    fn cache_capacity(&self) -> usize {
        if self.cache_capacity == 0 {
            DEFAULT_CACHE_SIZE
        } else {
            self.cache_capacity
        }
    }
}

/// Outputs consumed by the viewer shell
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    LoadStateChanged(LoadState),

    /// The page list was replaced wholesale
    PagesReplaced { page_count: usize },

    /// Apply this display transform to the rendered surface (cheap)
    TransformChanged(ViewportTransform),

    /// A gesture committed a new scale; a re-paint is already underway
    ScaleCommitted(f32),
}

/// The render and gesture engine behind one mounted viewer
pub struct ViewerEngine {
    url: Option<String>,
    /// URL generation counter, shared with the worker for early paint abort
    epoch: Arc<AtomicU64>,
    attempt: u32,
    load_state: LoadState,
    deadline: Option<Instant>,
    paint_seq: u64,
    applied_paint_seq: u64,
    pages: Vec<Arc<RenderedPage>>,
    gesture: GestureMachine,
    paint: PaintParams,
    policy: LoadPolicy,
    telemetry: Arc<dyn Telemetry>,
    job_tx: Sender<WorkerJob>,
    event_rx: Receiver<WorkerEvent>,
}

impl ViewerEngine {
    /// Engine with default policy and `log`-backed telemetry
    #[must_use]
    pub fn new(fetcher: Box<dyn DocumentFetcher>, decoder: Box<dyn DocumentDecoder>) -> Self {
        Self::with_config(
            fetcher,
            decoder,
            EngineConfig::default(),
            Arc::new(LogTelemetry),
        )
    }

    #[must_use]
    pub fn with_config(
        fetcher: Box<dyn DocumentFetcher>,
        decoder: Box<dyn DocumentDecoder>,
        config: EngineConfig,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let (job_tx, job_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();
        let epoch = Arc::new(AtomicU64::new(0));

        let worker_epoch = Arc::clone(&epoch);
        let worker_telemetry = Arc::clone(&telemetry);
        let cache_capacity = config.cache_capacity();
        std::thread::spawn(move || {
            run_worker(
                fetcher,
                decoder,
                job_rx,
                event_tx,
                worker_epoch,
                cache_capacity,
                worker_telemetry,
            );
        });

        Self {
            url: None,
            epoch,
            attempt: 0,
            load_state: LoadState::Idle,
            deadline: None,
            paint_seq: 0,
            applied_paint_seq: 0,
            pages: Vec::new(),
            gesture: GestureMachine::new(config.gesture),
            paint: PaintParams::default(),
            policy: config.load,
            telemetry,
            job_tx,
            event_rx,
        }
    }

    /// Point the viewer at a document URL; `None` clears all state.
    ///
    /// Changing the URL invalidates every in-flight operation for the old
    /// one and resets the gesture transform to identity.
    pub fn set_url(&mut self, url: Option<&str>) -> Vec<EngineEvent> {
        if self.url.as_deref() == url {
            return Vec::new();
        }

        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.url = url.map(str::to_owned);
        self.attempt = 0;
        self.deadline = None;
        self.pages.clear();
        self.gesture.reset();
        self.paint.committed_scale = 1.0;

        match self.url.clone() {
            None => {
                let _ = self.job_tx.send(WorkerJob::Clear);
                self.transition(LoadState::Idle)
            }
            Some(url) => {
                let mut events = self.transition(LoadState::Loading { attempt: 0 });
                self.dispatch_load(url);
                events.push(EngineEvent::TransformChanged(self.display_transform()));
                events
            }
        }
    }

    /// Change the fit policy; re-paints if a document is showing
    pub fn set_fit_policy(&mut self, fit: FitPolicy) {
        if self.paint.fit == fit {
            return;
        }
        self.paint.fit = fit;
        if matches!(self.load_state, LoadState::Ready { .. }) {
            self.request_paint();
        }
    }

    /// Update the container size and device pixel ratio; re-paints if a
    /// document is showing
    pub fn set_viewport(&mut self, container: ContainerSize, device_pixel_ratio: f32) {
        if self.paint.container == container
            && (self.paint.device_pixel_ratio - device_pixel_ratio).abs() < f32::EPSILON
        {
            return;
        }
        self.paint.container = container;
        self.paint.device_pixel_ratio = device_pixel_ratio;
        if matches!(self.load_state, LoadState::Ready { .. }) {
            self.request_paint();
        }
    }

    /// Drain worker results and enforce the load deadline. Call regularly
    /// from the owner's event loop.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();

        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                WorkerEvent::Opened { tag, page_count } => {
                    if !self.tag_is_current(tag) {
                        continue;
                    }
                    self.deadline = None;
                    let next = self.policy.after_success(page_count);
                    let ready = matches!(next, LoadState::Ready { .. });
                    out.extend(self.transition(next));
                    if ready {
                        self.request_paint();
                    }
                }

                WorkerEvent::LoadFailed { tag, fault } => {
                    if !self.tag_is_current(tag) {
                        continue;
                    }
                    out.extend(self.attempt_failed(&fault));
                }

                WorkerEvent::Painted {
                    epoch,
                    paint_seq,
                    pages,
                } => {
                    if epoch != self.current_epoch() || paint_seq <= self.applied_paint_seq {
                        continue;
                    }
                    self.applied_paint_seq = paint_seq;
                    self.pages = pages;
                    // Fresh pixels embody the committed scale; drop the held
                    // preview multiplier so they show at 1:1.
                    self.gesture.repaint_landed();
                    out.push(EngineEvent::PagesReplaced {
                        page_count: self.pages.len(),
                    });
                    out.push(EngineEvent::TransformChanged(self.display_transform()));
                }
            }
        }

        // The deadline races fetch+decode; a miss counts as a failed attempt,
        // not a distinct state.
        if matches!(self.load_state, LoadState::Loading { .. }) {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    let fault = LoadFault::Timeout(self.policy.timeout);
                    out.extend(self.attempt_failed(&fault));
                }
            }
        }

        out
    }

    /// Route a pointer event through the gesture machine. Gestures only make
    /// sense on a rendered surface, so everything else is dropped.
    pub fn pointer_event(&mut self, event: PointerEvent) -> Vec<EngineEvent> {
        if !matches!(self.load_state, LoadState::Ready { .. }) {
            return Vec::new();
        }

        let mut out = Vec::new();
        for effect in self.gesture.apply(event) {
            match effect {
                GestureEffect::TransformChanged(transform) => {
                    out.push(EngineEvent::TransformChanged(transform));
                }
                GestureEffect::CommitScale(scale) => {
                    self.paint.committed_scale = scale;
                    out.push(EngineEvent::ScaleCommitted(scale));
                    self.request_paint();
                }
            }
        }
        out
    }

    /// Advance the gesture machine's settle window
    pub fn tick(&mut self, now_ms: u64) {
        self.gesture.tick(now_ms);
    }

    /// True while transform animation should be suppressed (post-pinch settle)
    #[must_use]
    pub fn animation_suppressed(&self, now_ms: u64) -> bool {
        self.gesture.animation_suppressed(now_ms)
    }

    #[must_use]
    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    /// The original URL, available in every state for the open-externally
    /// escape hatch
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The current page list. Replaced wholesale; never partially updated.
    #[must_use]
    pub fn pages(&self) -> &[Arc<RenderedPage>] {
        &self.pages
    }

    #[must_use]
    pub fn display_transform(&self) -> ViewportTransform {
        self.gesture.display_transform()
    }

    #[must_use]
    pub fn paint_params(&self) -> &PaintParams {
        &self.paint
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn tag_is_current(&self, tag: JobTag) -> bool {
        tag.epoch == self.current_epoch()
            && tag.attempt == self.attempt
            && matches!(self.load_state, LoadState::Loading { .. })
    }

    fn transition(&mut self, next: LoadState) -> Vec<EngineEvent> {
        if self.load_state == next {
            return Vec::new();
        }
        self.load_state = next.clone();
        vec![EngineEvent::LoadStateChanged(next)]
    }

    fn dispatch_load(&mut self, url: String) {
        let tag = JobTag {
            epoch: self.current_epoch(),
            attempt: self.attempt,
        };
        self.deadline = Some(Instant::now() + self.policy.timeout);
        let _ = self.job_tx.send(WorkerJob::Load { tag, url });
    }

    fn attempt_failed(&mut self, fault: &LoadFault) -> Vec<EngineEvent> {
        self.telemetry
            .debug(&format!("load attempt {} failed: {fault}", self.attempt));

        match self.policy.after_failure(self.attempt, fault) {
            LoadState::Loading { attempt } => {
                self.attempt = attempt;
                let events = self.transition(LoadState::Loading { attempt });
                if let Some(url) = self.url.clone() {
                    self.dispatch_load(url);
                }
                events
            }
            terminal => {
                self.deadline = None;
                self.transition(terminal)
            }
        }
    }

    fn request_paint(&mut self) {
        self.paint_seq += 1;
        let _ = self.job_tx.send(WorkerJob::Paint {
            epoch: self.current_epoch(),
            paint_seq: self.paint_seq,
            params: self.paint.clone(),
        });
    }
}

impl Drop for ViewerEngine {
    fn drop(&mut self) {
        // Invalidate in-flight work, then let the worker wind down
        self.epoch.fetch_add(1, Ordering::AcqRel);
        let _ = self.job_tx.send(WorkerJob::Shutdown);
    }
}
