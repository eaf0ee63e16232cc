use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use serde::Serialize;

use gazewatch_core::config::MonitorConfig;
use gazewatch_core::detection::domain::detector_handle::DetectorHandle;
use gazewatch_core::detection::domain::landmark_detector::LandmarkDetector;
use gazewatch_core::detection::infrastructure::replay_detector::ReplayLandmarkDetector;
use gazewatch_core::flags::domain::flag_aggregator::FlagAggregator;
use gazewatch_core::flags::domain::flag_kind::{FlagKind, Severity};
use gazewatch_core::flags::domain::flag_state::FlagState;
use gazewatch_core::sampling::cycle_logger::{CycleLogger, StatsCycleLogger};
use gazewatch_core::sampling::domain::sample::SamplerEvent;
use gazewatch_core::sampling::frame_scheduler::FrameScheduler;
use gazewatch_core::video::infrastructure::image_file_source::ImageFileSource;

/// Head-pose and gaze attention flags from a sampled video source.
#[derive(Parser)]
#[command(name = "gazewatch")]
struct Cli {
    /// Still image presented as the camera feed.
    image: PathBuf,

    /// JSON fixture of landmark detections to replay.
    landmarks: PathBuf,

    /// JSON config file (missing fields keep their defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds (overrides the config file).
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Per-cycle processing budget in milliseconds (overrides the config file).
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Stop after this many sampling cycles.
    #[arg(long, default_value = "20")]
    cycles: usize,

    /// Write the final flag state and history as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    severity: Severity,
    messages: Vec<String>,
    flag_counts: BTreeMap<FlagKind, usize>,
    state: &'a FlagState,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;
    let config = build_config(&cli)?;

    let source = ImageFileSource::open(&cli.image)?;
    let fixture = cli.landmarks.clone();
    let detector = DetectorHandle::new(move || {
        let replay = ReplayLandmarkDetector::load(&fixture)?;
        log::info!(
            "Replaying {} scripted detections from {}",
            replay.len(),
            fixture.display()
        );
        Ok(Box::new(replay) as Box<dyn LandmarkDetector>)
    });

    let logger: Box<dyn CycleLogger> = Box::new(StatsCycleLogger::new());
    let (mut scheduler, events) =
        FrameScheduler::new(Box::new(source), detector, &config, Some(logger));
    let mut aggregator = FlagAggregator::new(config.flags);

    scheduler.start();
    for cycle in 1..=cli.cycles {
        match events.recv()? {
            SamplerEvent::Analysis(sample) => {
                let previous = aggregator.state().current_flags.clone();
                let state = aggregator.apply(&sample);
                log::debug!(
                    "Cycle {cycle}: {} face(s), brightness {:.1}, {:.1}ms",
                    sample.face_count,
                    sample.brightness,
                    sample.processing_time_ms
                );
                if state.current_flags != previous {
                    report_status(state);
                }
            }
            SamplerEvent::Disabled(reason) => {
                log::warn!("{reason}");
                break;
            }
            SamplerEvent::Error(e) => log::warn!("Cycle {cycle} failed: {e}"),
        }
    }
    scheduler.cleanup();

    let status = scheduler.status();
    log::info!(
        "Finished: {} history entries, disabled: {}",
        aggregator.state().history.len(),
        status.is_disabled
    );

    if let Some(path) = &cli.report {
        write_report(path, &aggregator)?;
        log::info!("Report written to {}", path.display());
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(ms) = cli.interval_ms {
        config.sampler.sample_interval_ms = ms;
    }
    if let Some(ms) = cli.budget_ms {
        config.sampler.processing_budget_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.image.exists() {
        return Err(format!("Image not found: {}", cli.image.display()).into());
    }
    if !cli.landmarks.exists() {
        return Err(format!("Landmark fixture not found: {}", cli.landmarks.display()).into());
    }
    if cli.cycles == 0 {
        return Err("Cycles must be at least 1".into());
    }
    Ok(())
}

fn report_status(state: &FlagState) {
    let messages = state.messages().join("; ");
    match state.severity() {
        Severity::Ok => log::info!("[ok] {messages}"),
        Severity::Warning => log::warn!("[warning] {messages}"),
        Severity::Error => log::error!("[error] {messages}"),
    }
}

fn write_report(path: &Path, aggregator: &FlagAggregator) -> Result<(), Box<dyn std::error::Error>> {
    let state = aggregator.state();
    let report = Report {
        severity: state.severity(),
        messages: state.messages(),
        flag_counts: aggregator.summary(),
        state,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}
