mod output;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glidecheck_bus::{EventBus, LocalBus};
use glidecheck_media::{FfmpegFrameSource, FfmpegVideoSink};
use glidecheck_narrator::{AnthropicNarrator, VideoNarrator};
use glidecheck_ops::{ensure_report_dir, init_tracing, ReportStore};
use glidecheck_pipeline::{AnnotationDriver, GearInspector, Session};
use glidecheck_types::config::GlideConfig;
use glidecheck_vision::{BoxOverlayAnnotator, HttpDetector};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "configs/glidecheck.toml";

#[derive(Debug, Parser)]
#[command(
    name = "glidecheck",
    version,
    about = "Happy Landing paragliding gear check and flight review"
)]
struct Cli {
    /// TOML config file. Falls back to GLIDECHECK_CONFIG, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify the safety gear visible in an image.
    Inspect {
        image: PathBuf,
        #[arg(long, default_value = "annotated_image.png")]
        output: PathBuf,
    },
    /// Annotate acrobatic maneuvers frame by frame.
    Annotate {
        video: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Tell the story of a flight video.
    Narrate { video: PathBuf },
    /// Gear check, video annotation and story in one pass.
    Run {
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        video: Option<PathBuf>,
        #[arg(long)]
        no_story: bool,
    },
}

type CliSession = Session<
    FfmpegFrameSource,
    Arc<HttpDetector>,
    Arc<BoxOverlayAnnotator>,
    FfmpegVideoSink,
    AnthropicNarrator<FfmpegFrameSource>,
    LocalBus,
>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone());
    init_tracing(&config.ops)?;

    if let Command::Narrate { video } = &cli.command {
        let story = build_narrator(&config)?
            .narrate(video)
            .await
            .with_context(|| format!("no story could be produced for {}", video.display()))?;
        output::print_story(&story);
        return Ok(());
    }

    let wants_story = matches!(
        &cli.command,
        Command::Run { video: Some(_), no_story: false, .. }
    );
    let bus = LocalBus::new(256);
    let printer = tokio::spawn(output::print_events(bus.subscribe()));
    let session = build_session(&config, bus, wants_story)?;

    match cli.command {
        Command::Inspect { image, output } => {
            let inspection = session.inspect_image(&image, Some(output.as_path())).await?;
            output::print_checklist(&inspection.checklist);
        }
        Command::Annotate { video, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&config.media.output_path));
            let run = session.annotate_video(&video, &output).await?;
            output::print_run(&run);
        }
        Command::Narrate { .. } => {}
        Command::Run { image, video, .. } => {
            if image.is_none() && video.is_none() {
                bail!("nothing to do: pass --image and/or --video");
            }
            let image_output = PathBuf::from("annotated_image.png");
            let video_output = PathBuf::from(&config.media.output_path);
            let summary = session
                .review(
                    image.as_deref(),
                    video.as_deref(),
                    Some(image_output.as_path()),
                    video_output.as_path(),
                )
                .await?;
            if let Some(inspection) = &summary.inspection {
                output::print_checklist(&inspection.checklist);
            }
            if let Some(run) = &summary.run {
                output::print_run(run);
            }
            if let Some(story) = &summary.story {
                output::print_story(story);
            }
        }
    }

    drop(session);
    printer.await.context("event printer panicked")?;
    Ok(())
}

/// Only the narrator key is needed; the detector is never built.
fn build_narrator(config: &GlideConfig) -> Result<AnthropicNarrator<FfmpegFrameSource>> {
    Ok(AnthropicNarrator::new(
        config.narrator.clone(),
        &config.media,
        FfmpegFrameSource::new(&config.media),
    )?)
}

fn build_session(config: &GlideConfig, bus: LocalBus, wants_story: bool) -> Result<CliSession> {
    let detector = Arc::new(HttpDetector::new(&config.vision)?);
    let annotator = Arc::new(BoxOverlayAnnotator::new(&config.vision));
    let source = FfmpegFrameSource::new(&config.media);
    let sink = FfmpegVideoSink::new(&config.media);

    let driver = AnnotationDriver::new(
        source,
        detector.clone(),
        annotator.clone(),
        sink,
        config.vision.maneuvers.clone(),
        config.media.sample_fps,
    );
    let inspector = GearInspector::new(detector, annotator, config.vision.safety_items.clone());
    let narrator = if wants_story {
        Some(build_narrator(config)?)
    } else {
        None
    };

    let report_dir = ensure_report_dir(&config.ops.report_dir)?;
    info!("Session ready (story: {})", wants_story);
    Ok(Session::new(driver, inspector, narrator, bus, ReportStore::new())
        .with_report_dir(report_dir))
}

fn load_config(from_args: Option<PathBuf>) -> GlideConfig {
    let from_env = env::var("GLIDECHECK_CONFIG").ok().map(PathBuf::from);
    let path = from_args
        .or(from_env)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    if !path.exists() {
        return GlideConfig::default();
    }
    match GlideConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                GlideConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            GlideConfig::default()
        }
    }
}
