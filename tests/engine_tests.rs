//! End-to-end engine tests with scripted fetcher and decoder fakes.
//!
//! The fakes stand in for the network and the PDF library so the load/retry
//! policy, stale-result rejection, and paint pipeline can be exercised
//! deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use docpane::telemetry::RecordingTelemetry;
use docpane::viewer::{
    ContainerSize, DecodeError, DecodedDocument, DocumentDecoder, DocumentFetcher, EngineConfig,
    EngineEvent, FetchError, FitPolicy, InputBinding, LoadPolicy, LoadState, PointerEvent,
    PointerPhase, RasterImage, SimulatedPointerSource, ViewerEngine,
};

// ---------------------------------------------------------------------------
// Fakes

enum FetchScript {
    Ok(Vec<u8>),
    Fail,
    DelayedOk(Duration, Vec<u8>),
}

/// Fetcher with per-URL scripted behavior; unknown URLs fail
struct ScriptedFetcher {
    responses: HashMap<String, FetchScript>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedFetcher {
    fn new(responses: HashMap<String, FetchScript>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                responses,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl DocumentFetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(url) {
            Some(FetchScript::Ok(bytes)) => Ok(bytes.clone()),
            Some(FetchScript::DelayedOk(delay, bytes)) => {
                std::thread::sleep(*delay);
                Ok(bytes.clone())
            }
            Some(FetchScript::Fail) | None => {
                Err(FetchError::Transport("scripted failure".into()))
            }
        }
    }
}

/// Decoder for byte strings of the form
/// `doc:<pages>:<w>x<h>[:fail<page>|:badsize<page>]`
struct FakeDecoder;

struct FakeDocument {
    page_count: usize,
    width: f32,
    height: f32,
    failing_page: Option<usize>,
    bad_size_page: Option<usize>,
}

impl DocumentDecoder for FakeDecoder {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DecodedDocument>, DecodeError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::Malformed("not utf-8".into()))?;
        let mut parts = text.split(':');
        if parts.next() != Some("doc") {
            return Err(DecodeError::Malformed("missing doc header".into()));
        }
        let page_count: usize = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| DecodeError::Malformed("bad page count".into()))?;
        let (width, height) = parts
            .next()
            .and_then(|dims| dims.split_once('x'))
            .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)))
            .ok_or_else(|| DecodeError::Malformed("bad page size".into()))?;
        let marker = parts.next();
        let failing_page = marker
            .and_then(|p| p.strip_prefix("fail"))
            .and_then(|p| p.parse().ok());
        let bad_size_page = marker
            .and_then(|p| p.strip_prefix("badsize"))
            .and_then(|p| p.parse().ok());

        Ok(Box::new(FakeDocument {
            page_count,
            width,
            height,
            failing_page,
            bad_size_page,
        }))
    }
}

impl DecodedDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, _page: usize) -> Result<(f32, f32), DecodeError> {
        Ok((self.width, self.height))
    }

    fn render_page(&self, page: usize, scale: f32) -> Result<RasterImage, DecodeError> {
        if self.failing_page == Some(page) {
            return Err(DecodeError::PageRender {
                page,
                detail: "scripted page failure".into(),
            });
        }
        let mut width_px = (self.width * scale).ceil() as u32;
        let height_px = (self.height * scale).ceil() as u32;
        if self.bad_size_page == Some(page) {
            // A buggy decoder that ignores the requested surface size
            width_px += 8;
        }
        let fill = (page * 37 % 251) as u8;
        Ok(RasterImage {
            pixels: vec![fill; (width_px * height_px * 3) as usize],
            width_px,
            height_px,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers

fn doc_bytes(pages: usize, width: u32, height: u32) -> Vec<u8> {
    format!("doc:{pages}:{width}x{height}").into_bytes()
}

fn engine_with(
    responses: HashMap<String, FetchScript>,
    config: EngineConfig,
) -> (ViewerEngine, Arc<AtomicUsize>, Arc<RecordingTelemetry>) {
    let (fetcher, calls) = ScriptedFetcher::new(responses);
    let telemetry = Arc::new(RecordingTelemetry::new());
    let engine = ViewerEngine::with_config(
        Box::new(fetcher),
        Box::new(FakeDecoder),
        config,
        telemetry.clone(),
    );
    (engine, calls, telemetry)
}

/// Poll until `done` returns true or `timeout` elapses, collecting events
fn pump(
    engine: &mut ViewerEngine,
    timeout: Duration,
    mut done: impl FnMut(&ViewerEngine) -> bool,
) -> Vec<EngineEvent> {
    let deadline = Instant::now() + timeout;
    let mut events = Vec::new();
    loop {
        events.extend(engine.poll());
        if done(engine) || Instant::now() >= deadline {
            return events;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn load_states(events: &[EngineEvent]) -> Vec<LoadState> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::LoadStateChanged(state) => Some(state.clone()),
            _ => None,
        })
        .collect()
}

fn tap(engine: &mut ViewerEngine, x: f32, y: f32, at_ms: u64) -> Vec<EngineEvent> {
    let mut events = engine.pointer_event(PointerEvent::touch(1, PointerPhase::Down, x, y, at_ms));
    events.extend(engine.pointer_event(PointerEvent::touch(
        1,
        PointerPhase::Up,
        x,
        y,
        at_ms + 30,
    )));
    events
}

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Tests

#[test]
fn null_url_never_fetches() {
    let (mut engine, calls, _) = engine_with(HashMap::new(), EngineConfig::default());

    let events = engine.set_url(None);
    assert!(events.is_empty());

    pump(&mut engine, Duration::from_millis(100), |_| false);

    assert_eq!(*engine.load_state(), LoadState::Idle);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(engine.pages().is_empty());
}

#[test]
fn ready_document_paints_every_page_at_fit_width() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(3, 400, 500)));
    let (mut engine, calls, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    let events = engine.set_url(Some("doc-a"));
    assert_eq!(
        load_states(&events),
        vec![LoadState::Loading { attempt: 0 }]
    );

    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    assert_eq!(*engine.load_state(), LoadState::Ready { page_count: 3 });
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let pages = engine.pages();
    assert_eq!(pages.len(), 3);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.page_index, i);
        // Fit-to-width: page width times scale fills the 800-unit container
        assert!((400.0 * page.scale() - 800.0).abs() <= 1.0);
        assert_eq!(page.image.width_px, 800);
        assert_eq!(page.image.height_px, 1000);
    }
}

#[test]
fn device_pixel_ratio_sharpens_the_surface() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 2.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    let page = &engine.pages()[0];
    // Logical scale unchanged, physical surface doubled
    assert!((400.0 * page.scale() - 800.0).abs() <= 1.0);
    assert_eq!(page.image.width_px, 1600);
    assert_eq!(page.image.height_px, 2000);
}

#[test]
fn failing_fetch_walks_every_attempt_then_errors() {
    let mut responses = HashMap::new();
    responses.insert("doc-bad".to_string(), FetchScript::Fail);
    let (mut engine, calls, _) = engine_with(responses, EngineConfig::default());

    let events = engine.set_url(Some("doc-bad"));
    assert_eq!(
        load_states(&events),
        vec![LoadState::Loading { attempt: 0 }]
    );

    let later = pump(&mut engine, WAIT, |e| e.load_state().is_terminal());

    let states = load_states(&later);
    assert_eq!(states[0], LoadState::Loading { attempt: 1 });
    assert_eq!(states[1], LoadState::Loading { attempt: 2 });
    match &states[2] {
        LoadState::Error { message, attempt } => {
            assert_eq!(*attempt, 2);
            assert!(message.contains("network"), "message: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(states.len(), 3);

    // Never a fourth attempt
    std::thread::sleep(Duration::from_millis(100));
    engine.poll();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn garbage_bytes_retry_then_error_mentions_decoding() {
    let mut responses = HashMap::new();
    responses.insert(
        "doc-garbage".to_string(),
        FetchScript::Ok(b"garbage".to_vec()),
    );
    let (mut engine, calls, _) = engine_with(responses, EngineConfig::default());

    engine.set_url(Some("doc-garbage"));
    pump(&mut engine, WAIT, |e| e.load_state().is_terminal());

    match engine.load_state() {
        LoadState::Error { message, .. } => {
            assert!(message.contains("decode"), "message: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn stale_url_results_are_discarded() {
    let mut responses = HashMap::new();
    responses.insert(
        "doc-slow".to_string(),
        FetchScript::DelayedOk(Duration::from_millis(150), doc_bytes(2, 300, 300)),
    );
    responses.insert(
        "doc-fast".to_string(),
        FetchScript::Ok(doc_bytes(5, 400, 400)),
    );
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());
    engine.set_viewport(ContainerSize::new(800.0, 800.0), 1.0);

    engine.set_url(Some("doc-slow"));
    // Let the worker get inside the slow fetch before switching
    std::thread::sleep(Duration::from_millis(50));
    engine.set_url(Some("doc-fast"));

    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    assert_eq!(*engine.load_state(), LoadState::Ready { page_count: 5 });
    assert_eq!(engine.pages().len(), 5);

    // The slow document finishes later; nothing it produced may apply
    std::thread::sleep(Duration::from_millis(250));
    engine.poll();
    assert_eq!(*engine.load_state(), LoadState::Ready { page_count: 5 });
    assert_eq!(engine.pages().len(), 5);
}

#[test]
fn empty_document_reports_empty_and_never_paints() {
    let mut responses = HashMap::new();
    responses.insert("doc-empty".to_string(), FetchScript::Ok(doc_bytes(0, 1, 1)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_url(Some("doc-empty"));
    pump(&mut engine, WAIT, |e| e.load_state().is_terminal());

    assert_eq!(*engine.load_state(), LoadState::Empty);

    std::thread::sleep(Duration::from_millis(100));
    engine.poll();
    assert!(engine.pages().is_empty());
}

#[test]
fn timeout_counts_as_a_failed_attempt() {
    let mut responses = HashMap::new();
    responses.insert(
        "doc-hang".to_string(),
        FetchScript::DelayedOk(Duration::from_millis(400), doc_bytes(1, 100, 100)),
    );
    let config = EngineConfig {
        load: LoadPolicy {
            max_attempts: 2,
            timeout: Duration::from_millis(50),
        },
        ..EngineConfig::default()
    };
    let (mut engine, _, _) = engine_with(responses, config);

    engine.set_url(Some("doc-hang"));
    let events = pump(&mut engine, WAIT, |e| e.load_state().is_terminal());

    let states = load_states(&events);
    assert!(states.contains(&LoadState::Loading { attempt: 1 }));
    match engine.load_state() {
        LoadState::Error { message, .. } => {
            assert!(message.contains("timed out"), "message: {message}");
        }
        other => panic!("expected error, got {other:?}"),
    }

    // The straggling fetches eventually succeed, but their results are stale
    std::thread::sleep(Duration::from_millis(900));
    engine.poll();
    assert!(matches!(engine.load_state(), LoadState::Error { .. }));
    assert!(engine.pages().is_empty());
}

#[test]
fn failed_page_is_skipped_and_logged() {
    let mut responses = HashMap::new();
    responses.insert(
        "doc-partial".to_string(),
        FetchScript::Ok(b"doc:3:400x500:fail1".to_vec()),
    );
    let (mut engine, _, telemetry) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-partial"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    // The document still shows, with the failed page missing
    assert_eq!(*engine.load_state(), LoadState::Ready { page_count: 3 });
    let indexes: Vec<usize> = engine.pages().iter().map(|p| p.page_index).collect();
    assert_eq!(indexes, vec![0, 2]);

    assert!(telemetry
        .messages()
        .iter()
        .any(|m| m.contains("page 1") && m.contains("failed to paint")));
}

#[test]
fn double_tap_commits_and_repaints_at_the_new_scale() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());
    assert!((engine.pages()[0].scale() - 2.0).abs() < 1e-3);

    let first = tap(&mut engine, 100.0, 100.0, 0);
    assert!(!first.contains(&EngineEvent::ScaleCommitted(1.75)));
    let second = tap(&mut engine, 102.0, 101.0, 150);
    assert!(second.contains(&EngineEvent::ScaleCommitted(1.75)));

    // Re-paint lands at fit base 2.0 x committed 1.75
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 3.5).abs() < 1e-3
    });
    assert!((engine.pages()[0].scale() - 3.5).abs() < 1e-3);

    // Toggling back down re-paints at the fit base again
    tap(&mut engine, 100.0, 100.0, 1000);
    let events = tap(&mut engine, 100.0, 100.0, 1150);
    assert!(events.contains(&EngineEvent::ScaleCommitted(1.0)));
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 2.0).abs() < 1e-3
    });
    assert!((engine.pages()[0].scale() - 2.0).abs() < 1e-3);
}

#[test]
fn pinch_release_commits_and_repaints() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    engine.pointer_event(PointerEvent::touch(1, PointerPhase::Down, 100.0, 100.0, 0));
    engine.pointer_event(PointerEvent::touch(2, PointerPhase::Down, 200.0, 100.0, 5));
    engine.pointer_event(PointerEvent::touch(2, PointerPhase::Move, 300.0, 100.0, 20));
    let release =
        engine.pointer_event(PointerEvent::touch(2, PointerPhase::Up, 300.0, 100.0, 30));

    assert!(release.contains(&EngineEvent::ScaleCommitted(2.0)));
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 4.0).abs() < 1e-3
    });
    assert!((engine.pages()[0].scale() - 4.0).abs() < 1e-3);
}

#[test]
fn unchanged_repaint_is_pixel_identical() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(2, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 600.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    let before: Vec<_> = engine.pages().iter().map(|p| (**p).clone()).collect();

    // Away and back: fit-to-page paints at 1.2, then width again at 2.0
    engine.set_fit_policy(FitPolicy::Page);
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 1.2).abs() < 1e-3
    });
    engine.set_fit_policy(FitPolicy::Width);
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 2.0).abs() < 1e-3
    });

    let after: Vec<_> = engine.pages().iter().map(|p| (**p).clone()).collect();
    assert_eq!(before, after);
}

#[test]
fn bound_pointer_source_drives_the_engine() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    // A scripted double-tap, delivered through the attach/pump/detach cycle
    let source = SimulatedPointerSource::new(vec![
        PointerEvent::touch(1, PointerPhase::Down, 100.0, 100.0, 0),
        PointerEvent::touch(1, PointerPhase::Up, 100.0, 100.0, 30),
        PointerEvent::touch(1, PointerPhase::Down, 102.0, 101.0, 150),
        PointerEvent::touch(1, PointerPhase::Up, 102.0, 101.0, 180),
    ]);
    let mut binding = InputBinding::attach(Box::new(source));
    binding.pump(&mut engine).unwrap();
    binding.detach();

    // The commit previews over the old raster until the re-paint lands
    assert!((engine.display_transform().scale - 1.75).abs() < 1e-3);
    pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 3.5).abs() < 1e-3
    });
    assert!((engine.pages()[0].scale() - 3.5).abs() < 1e-3);

    // Fresh pixels embody the committed zoom, so the multiplier is identity
    assert!((engine.display_transform().scale - 1.0).abs() < 1e-6);
}

#[test]
fn display_transform_returns_to_identity_after_commit_repaint() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    engine.pointer_event(PointerEvent::touch(1, PointerPhase::Down, 100.0, 100.0, 0));
    engine.pointer_event(PointerEvent::touch(2, PointerPhase::Down, 200.0, 100.0, 5));
    engine.pointer_event(PointerEvent::touch(2, PointerPhase::Move, 300.0, 100.0, 20));
    engine.pointer_event(PointerEvent::touch(2, PointerPhase::Up, 300.0, 100.0, 30));

    // Held preview ratio over the old raster until the re-paint lands
    assert!((engine.display_transform().scale - 2.0).abs() < 1e-3);

    let events = pump(&mut engine, WAIT, |e| {
        (e.pages()[0].scale() - 4.0).abs() < 1e-3
    });

    // The committed zoom persists as the pipeline input, while the display
    // multiplier is reset to identity and announced to the shell
    assert!((engine.paint_params().committed_scale - 2.0).abs() < 1e-6);
    assert!((engine.display_transform().scale - 1.0).abs() < 1e-6);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::TransformChanged(t) if (t.scale - 1.0).abs() < 1e-6
    )));
}

#[test]
fn wrong_sized_decoder_output_is_rejected() {
    let mut responses = HashMap::new();
    responses.insert(
        "doc-badsize".to_string(),
        FetchScript::Ok(b"doc:2:400x500:badsize0".to_vec()),
    );
    let (mut engine, _, telemetry) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-badsize"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    // The oversized surface is a page-scoped fault: skipped, not fatal
    assert_eq!(*engine.load_state(), LoadState::Ready { page_count: 2 });
    let indexes: Vec<usize> = engine.pages().iter().map(|p| p.page_index).collect();
    assert_eq!(indexes, vec![1]);

    assert!(telemetry
        .messages()
        .iter()
        .any(|m| m.contains("page 0") && m.contains("deviates")));
}

#[test]
fn url_change_resets_the_gesture_transform() {
    let mut responses = HashMap::new();
    responses.insert("doc-a".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    responses.insert("doc-b".to_string(), FetchScript::Ok(doc_bytes(1, 400, 500)));
    let (mut engine, _, _) = engine_with(responses, EngineConfig::default());

    engine.set_viewport(ContainerSize::new(800.0, 1000.0), 1.0);
    engine.set_url(Some("doc-a"));
    pump(&mut engine, WAIT, |e| !e.pages().is_empty());

    // Pan away from the origin
    engine.pointer_event(PointerEvent::touch(1, PointerPhase::Down, 0.0, 0.0, 0));
    engine.pointer_event(PointerEvent::touch(1, PointerPhase::Move, 60.0, 40.0, 16));
    engine.pointer_event(PointerEvent::touch(1, PointerPhase::Up, 60.0, 40.0, 32));
    assert_eq!(engine.display_transform().pan_x, 60.0);

    engine.set_url(Some("doc-b"));
    let transform = engine.display_transform();
    assert_eq!(transform.pan_x, 0.0);
    assert_eq!(transform.pan_y, 0.0);
    assert_eq!(transform.scale, 1.0);
}
