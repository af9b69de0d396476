//! scrollshot: command-line front end for long captures
//!
//! Runs the capture pipeline against a simulated scroll container, stitches
//! frame images taken elsewhere, and prints the capture configuration schema.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::task::JoinHandle;
use scrollshot_core::{
    capture::{
        CancelHandle, CaptureOutcome, ChannelProgress, ImageBuffer, ImageStitcher, LongCapture,
        ProgressEvent, mock::SimulatedPage,
    },
    error::CaptureError,
    model::{CaptureConfig, ImageFormat, Viewport, ViewportRect},
    util::encode::encode_image,
};

/// Browser chrome drawn above and below the simulated container, in CSS px
const CHROME_HEIGHT: f64 = 50.0;

const HEADER_COLOR: [u8; 4] = [230, 230, 235, 255];

#[derive(Parser)]
#[command(name = "scrollshot")]
#[command(about = "Long screenshot capture and frame stitching")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file path
    #[arg(short, long)]
    out:     PathBuf,
    /// Image format (png, jpeg, webp)
    #[arg(long, default_value = "png")]
    format:  ImageFormat,
    /// Image quality (0-100): JPEG quality, PNG compression level
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a long screenshot of a simulated scroll container
    Simulate {
        /// Page image in physical pixels; a noise page is generated if omitted
        #[arg(long)]
        page:           Option<PathBuf>,
        /// Generated page width in CSS px
        #[arg(long, default_value_t = 800)]
        width:          u32,
        /// Generated page height in CSS px
        #[arg(long, default_value_t = 4000)]
        height:         u32,
        /// Visible height of the scroll container in CSS px
        #[arg(long, default_value_t = 600)]
        client_height:  u32,
        /// Device pixels per CSS pixel
        #[arg(long, default_value_t = 1.0)]
        scale:          f64,
        /// Paint a fixed header this many CSS px tall over the container
        #[arg(long)]
        header:         Option<f64>,
        /// Rate-limit every Nth snapshot request
        #[arg(long)]
        throttle_every: Option<usize>,
        /// Seed for the generated page
        #[arg(long, default_value_t = 1)]
        seed:           u64,
        /// Capture configuration JSON; defaults plus environment overrides if
        /// omitted
        #[arg(long)]
        config:         Option<PathBuf>,
        /// Concatenate frames without removing duplicated rows
        #[arg(long)]
        no_dedupe:      bool,
        /// Leave fixed overlays visible during capture
        #[arg(long)]
        no_isolation:   bool,
        #[command(flatten)]
        output:         OutputArgs,
    },
    /// Stitch frame images, top to bottom, into one image
    Stitch {
        /// Frame images in capture order
        #[arg(required = true, num_args = 1..)]
        frames:      Vec<PathBuf>,
        /// Concatenate frames without removing duplicated rows
        #[arg(long)]
        no_dedupe:   bool,
        /// Largest overlap to search for, in pixels
        #[arg(long)]
        max_overlap: Option<u32>,
        #[command(flatten)]
        output:      OutputArgs,
    },
    /// Print the JSON schema of the capture configuration
    ConfigSchema,
    /// Print the effective default configuration as JSON
    ConfigDefaults,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scrollshot_cli=info".parse()?)
                .add_directive("scrollshot_core=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command).await {
        if let Some(capture_err) = e.downcast_ref::<CaptureError>() {
            eprintln!("hint: {}", capture_err.remediation_hint());
        }
        return Err(e);
    }

    Ok(())
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Simulate {
            page,
            width,
            height,
            client_height,
            scale,
            header,
            throttle_every,
            seed,
            config,
            no_dedupe,
            no_isolation,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if no_dedupe {
                config.stitch.detect_duplicates = false;
            }

            let page = build_page(page.as_deref(), width, height, client_height, scale, seed)?;
            let page = match header {
                Some(header_height) => page.with_header(header_height, HEADER_COLOR),
                None => page,
            };
            let page = match throttle_every {
                Some(n) => page.with_rate_limit_every(n),
                None => page,
            };

            simulate(Arc::new(page), config, !no_isolation, &output).await
        }
        Commands::Stitch {
            frames,
            no_dedupe,
            max_overlap,
            output,
        } => stitch_files(&frames, no_dedupe, max_overlap, &output),
        Commands::ConfigSchema => {
            let schema = schemars::schema_for!(CaptureConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::ConfigDefaults => {
            println!("{}", serde_json::to_string_pretty(&CaptureConfig::from_env())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<CaptureConfig> {
    let Some(path) = path else {
        return Ok(CaptureConfig::from_env());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: CaptureConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid capture config in {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn load_image(path: &Path) -> Result<ImageBuffer> {
    let image =
        image::open(path).with_context(|| format!("Failed to load image {}", path.display()))?;
    Ok(ImageBuffer::from_dynamic(image))
}

fn build_page(
    path: Option<&Path>,
    width: u32,
    height: u32,
    client_height: u32,
    scale: f64,
    seed: u64,
) -> Result<SimulatedPage> {
    if !(scale.is_finite() && scale > 0.0) {
        anyhow::bail!("Scale must be a positive number");
    }
    if client_height == 0 {
        anyhow::bail!("Client height must be greater than 0");
    }

    let raster = match path {
        Some(path) => load_image(path)?,
        None => ImageBuffer::from_test_pattern(
            (f64::from(width) * scale).round() as u32,
            (f64::from(height) * scale).round() as u32,
            seed,
        ),
    };

    let css_width = f64::from(raster.width()) / scale;
    let client_height = f64::from(client_height);
    let viewport = Viewport::new(css_width, client_height + 2.0 * CHROME_HEIGHT, scale);
    let container = ViewportRect::new(0.0, CHROME_HEIGHT, css_width, client_height);

    Ok(SimulatedPage::new(raster, viewport, container))
}

async fn simulate(
    page: Arc<SimulatedPage>,
    config: CaptureConfig,
    isolate: bool,
    output: &OutputArgs,
) -> Result<()> {
    let mut capture = LongCapture::new(page.clone(), page.clone(), config);
    if isolate {
        capture = capture.with_isolation(page.clone());
    }

    let target = capture.probe_target().await?;
    println!(
        "Capturing {} rows through a {} row window...",
        target.scroll.scroll_extent, target.scroll.client_extent
    );

    let cancel = CancelHandle::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling after the current frame");
                cancel.cancel();
            }
        })
    };

    let (sink, mut rx) = ChannelProgress::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_progress(event);
        }
    });

    let result = capture.run(&target, &sink, &cancel).await;
    drop(sink);
    ctrl_c.abort();
    join_printer(printer).await;

    match result? {
        CaptureOutcome::Completed { image, stats } => {
            println!(
                "Captured {} frames in {:?} ({} snapshot attempts, {} rate-limit retries)",
                stats.frames, stats.elapsed, stats.snapshot_attempts, stats.rate_limit_retries
            );
            tracing::debug!("Frame overlaps: {:?}", image.overlaps());
            save(image.image(), output)
        }
        CaptureOutcome::Cancelled {
            frames_done,
            total_frames,
        } => {
            println!(
                "Cancelled after {} of {} frames, nothing saved",
                frames_done, total_frames
            );
            Ok(())
        }
    }
}

async fn join_printer(printer: JoinHandle<()>) {
    if let Err(e) = printer.await {
        tracing::warn!("Progress printer task failed: {}", e);
    }
}

fn print_progress(event: ProgressEvent) {
    match event {
        ProgressEvent::FrameCaptured {
            frames_done,
            total_frames,
        } => println!("  frame {}/{}", frames_done, total_frames),
        ProgressEvent::StitchingStarted { frame_count } => {
            println!("Stitching {} frames...", frame_count)
        }
        ProgressEvent::StateChanged { state } => tracing::debug!("Pipeline state: {:?}", state),
    }
}

fn stitch_files(
    paths: &[PathBuf],
    no_dedupe: bool,
    max_overlap: Option<u32>,
    output: &OutputArgs,
) -> Result<()> {
    let mut options = CaptureConfig::from_env().stitch;
    if no_dedupe {
        options.detect_duplicates = false;
    }
    if let Some(max) = max_overlap {
        options.max_overlap_height = max;
    }

    let frames = paths
        .iter()
        .map(|path| load_image(path))
        .collect::<Result<Vec<_>>>()?;

    println!("Stitching {} frames...", frames.len());
    let stitcher = ImageStitcher::new(options)?;
    let composite = stitcher.stitch_cropped(frames)?;
    println!("Overlaps: {:?}", composite.overlaps());

    save(composite.image(), output)
}

fn save(image: &ImageBuffer, output: &OutputArgs) -> Result<()> {
    println!(
        "Encoding {}x{} {}...",
        image.width(),
        image.height(),
        output.format
    );
    let data = encode_image(image, output.format, output.quality)?;

    fs::write(&output.out, data)
        .with_context(|| format!("Failed to write {}", output.out.display()))?;

    println!("✓ Saved to {}", output.out.display());
    Ok(())
}
