use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use docpane::panic_handler::initialize_panic_handler;
use docpane::settings::Settings;
use docpane::telemetry::LogTelemetry;
use docpane::viewer::{
    ContainerSize, EngineEvent, FitPolicy, LoadState, RenderedPage, StandardFetcher, ViewerEngine,
    loading_caption, open_externally,
};

/// Render a document's pages to PNG files
#[derive(Parser, Debug)]
#[command(name = "docpane", version, about = "Document viewer render engine harness")]
struct Args {
    /// Document URL (http://, https://, file://) or local path
    url: String,

    /// Fit policy: "width", "page", or a numeric scale
    #[arg(long, default_value = "width")]
    fit: String,

    /// Logical container width
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// Logical container height
    #[arg(long, default_value_t = 1000.0)]
    height: f32,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    dpr: f32,

    /// Output directory for page PNGs
    #[arg(long, default_value = "pages")]
    out: PathBuf,

    /// Open the document in the system viewer instead of rendering
    #[arg(long)]
    open_external: bool,
}

#[cfg(feature = "pdf")]
fn parse_fit(s: &str) -> Result<FitPolicy> {
    match s {
        "width" => Ok(FitPolicy::Width),
        "page" => Ok(FitPolicy::Page),
        other => {
            let scale: f32 = other
                .parse()
                .with_context(|| format!("invalid fit policy {other:?}"))?;
            Ok(FitPolicy::Custom(scale))
        }
    }
}

fn main() -> Result<()> {
    initialize_panic_handler();
    WriteLogger::init(
        LevelFilter::Debug,
        Config::default(),
        File::create("docpane.log")?,
    )?;

    let args = Args::parse();
    info!("Starting docpane harness for {}", args.url);

    if args.open_external {
        open_externally(&args.url)?;
        return Ok(());
    }

    run(&args)
}

#[cfg(not(feature = "pdf"))]
fn run(_args: &Args) -> Result<()> {
    bail!("docpane was built without the `pdf` feature; no document decoder is available")
}

#[cfg(feature = "pdf")]
fn run(args: &Args) -> Result<()> {
    use docpane::viewer::PdfDecoder;

    let fit = parse_fit(&args.fit)?;
    let settings = Settings::load_or_default();

    let mut engine = ViewerEngine::with_config(
        Box::new(StandardFetcher::new(settings.load_timeout())),
        Box::new(PdfDecoder::new()),
        settings.engine_config(),
        Arc::new(LogTelemetry),
    );
    engine.set_viewport(ContainerSize::new(args.width, args.height), args.dpr);
    engine.set_fit_policy(fit);
    engine.set_url(Some(&args.url));

    let max_attempts = settings.max_attempts;
    // Terminal state is guaranteed by the engine's retry/timeout policy; the
    // extra margin only guards against a wedged worker thread.
    let give_up = Instant::now()
        + settings.load_timeout() * max_attempts.max(1) * 2
        + Duration::from_secs(30);

    loop {
        for event in engine.poll() {
            match event {
                EngineEvent::LoadStateChanged(state) => match state {
                    LoadState::Loading { attempt } => {
                        info!("{}", loading_caption(attempt, max_attempts));
                    }
                    LoadState::Ready { page_count } => {
                        info!("Document ready with {page_count} pages");
                    }
                    LoadState::Empty => {
                        println!("Document has no pages");
                        return Ok(());
                    }
                    LoadState::Error { message, attempt } => {
                        error!("Load failed after {} attempts: {message}", attempt + 1);
                        bail!("failed to load {}: {message}", args.url);
                    }
                    LoadState::Idle => {}
                },
                EngineEvent::PagesReplaced { page_count } => {
                    info!("Painted {page_count} pages");
                    write_pages(&args.out, engine.pages())?;
                    println!(
                        "Wrote {page_count} pages to {}",
                        args.out.display()
                    );
                    return Ok(());
                }
                EngineEvent::TransformChanged(_) | EngineEvent::ScaleCommitted(_) => {}
            }
        }

        if Instant::now() >= give_up {
            bail!("gave up waiting for {}", args.url);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(feature = "pdf")]
fn write_pages(dir: &Path, pages: &[Arc<RenderedPage>]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for page in pages {
        let path = dir.join(format!("page-{:03}.png", page.page_index + 1));
        image::save_buffer(
            &path,
            &page.image.pixels,
            page.image.width_px,
            page.image.height_px,
            image::ExtendedColorType::Rgb8,
        )
        .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
