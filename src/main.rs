//! loopbox - live-coding loop sequencer.
//!
//! Usage:
//!   loopbox play "bd ~ sn ~" --sample bd=kick.wav --sample sn=snare.wav
//!   loopbox render patterns/beat.lb --out beat.wav --seconds 8
//!   loopbox vocab

mod settings;

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use lb_master::{
    param_label, read_wav_mono, render_offline, write_wav, Controller, OfflineJob, ParamLabel,
    SampleId, SchedulerReport, SourceType, CONTRACT_VERSION,
};
use settings::AppConfig;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "alloc_check")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser)]
#[command(name = "loopbox", version, about)]
struct Cli {
    /// Settings file (TOML, YAML or JSON). `LOOPBOX_*` variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a pattern through the default audio device.
    Play {
        #[command(flatten)]
        source: Source,
        /// Stop after this many seconds instead of running until interrupted.
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Render a pattern to a 32-bit float WAV file.
    Render {
        #[command(flatten)]
        source: Source,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 8.0)]
        seconds: f64,
        /// Output sample rate, overriding the settings.
        #[arg(long)]
        sample_rate: Option<u32>,
    },
    /// Print the source type and parameter tables.
    Vocab,
}

#[derive(Args)]
struct Source {
    /// Pattern file, or inline pattern text.
    pattern: String,
    /// Sample to load, as `id=path.wav`. Repeatable.
    #[arg(short, long = "sample", value_parser = parse_sample)]
    samples: Vec<(String, PathBuf)>,
    /// Master bus setting, as `param=value` (e.g. `rev=0.3`). Repeatable.
    #[arg(short, long = "master", value_parser = parse_master)]
    master: Vec<(ParamLabel, f32)>,
    /// Step duration in milliseconds, overriding the settings.
    #[arg(short, long)]
    tempo: Option<f64>,
}

fn parse_sample(arg: &str) -> Result<(String, PathBuf), String> {
    let (id, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected id=path, got {arg:?}"))?;
    SampleId::new(id).map_err(|e| e.to_string())?;
    Ok((id.to_string(), PathBuf::from(path)))
}

fn parse_master(arg: &str) -> Result<(ParamLabel, f32), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected param=value, got {arg:?}"))?;
    let label = param_label(name).ok_or_else(|| format!("unknown parameter {name:?}"))?;
    let value = value
        .parse::<f32>()
        .map_err(|e| format!("bad value for {name}: {e}"))?;
    Ok((label, value))
}

/// Read the pattern from a file if one exists at that path.
fn pattern_text(pattern: &str) -> Result<String, std::io::Error> {
    let path = Path::new(pattern);
    if path.is_file() {
        std::fs::read_to_string(path)
    } else {
        Ok(pattern.to_string())
    }
}

fn load_samples(
    samples: &[(String, PathBuf)],
    sample_rate: u32,
) -> Result<Vec<(SampleId, Vec<f32>)>, Box<dyn Error>> {
    let mut out = Vec::with_capacity(samples.len());
    for (id, path) in samples {
        let sample = read_wav_mono(path)?;
        if sample.sample_rate != sample_rate {
            warn!(
                %id,
                file_rate = sample.sample_rate,
                sample_rate,
                "sample rate differs from output, playing unresampled"
            );
        }
        out.push((SampleId::new(id)?, sample.frames));
    }
    Ok(out)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut app = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play { source, seconds } => play(app, source, seconds),
        Commands::Render {
            source,
            out,
            seconds,
            sample_rate,
        } => {
            if let Some(rate) = sample_rate {
                app.render.sample_rate = rate;
            }
            render(app, source, &out, seconds)
        }
        Commands::Vocab => {
            vocab();
            Ok(())
        }
    }
}

fn play(app: AppConfig, source: Source, seconds: Option<f64>) -> Result<(), Box<dyn Error>> {
    let text = pattern_text(&source.pattern)?;
    let mut ctrl = Controller::open(app.render, app.scheduler)?;

    for (id, frames) in load_samples(&source.samples, ctrl.sample_rate())? {
        ctrl.load_sample(id.as_str(), frames)?;
    }
    for (label, value) in source.master {
        ctrl.set_master(label, value)?;
    }
    ctrl.set_tempo(source.tempo.unwrap_or(app.tempo_ms))?;
    ctrl.evaluate(text)?;

    // The tempo is only reported when rejected, so wait for the evaluation.
    loop {
        match ctrl.next_report(Duration::from_secs(2)) {
            Some(SchedulerReport::Evaluated) => break,
            Some(SchedulerReport::EvaluateFailed(e)) => return Err(e.into()),
            Some(SchedulerReport::TempoRejected(e)) => return Err(e.into()),
            Some(_) => {}
            None => return Err("scheduler did not answer".into()),
        }
    }

    let origin = ctrl.start_now()?;
    info!(origin, "playing, Ctrl+C to quit");

    let started = Instant::now();
    loop {
        std::thread::sleep(Duration::from_millis(100));
        ctrl.notices();
        for report in ctrl.reports() {
            info!(?report, "scheduler");
        }

        let render = ctrl.render_metrics();
        let sched = ctrl.scheduler_metrics();
        print!(
            "\r{:>7.2}s  voices {:>3}  events {:>6}  late {:>4}  dropped {:>4}  drift {:>6.2}ms   ",
            started.elapsed().as_secs_f64(),
            render.active_voices,
            sched.dispatched,
            render.late_triggers,
            render.dropped_events + sched.dropped,
            sched.mean_drift * 1000.0,
        );
        std::io::stdout().flush()?;

        if seconds.is_some_and(|s| started.elapsed().as_secs_f64() >= s) {
            println!();
            break;
        }
    }

    ctrl.shutdown();
    Ok(())
}

fn render(
    app: AppConfig,
    source: Source,
    out: &Path,
    seconds: f64,
) -> Result<(), Box<dyn Error>> {
    let mut job = OfflineJob::new(pattern_text(&source.pattern)?, seconds);
    job.samples = load_samples(&source.samples, app.render.sample_rate)?;
    job.master = source.master;
    job.tempo_ms = source.tempo.unwrap_or(app.tempo_ms);
    job.render = app.render;
    job.scheduler = app.scheduler;

    let rendered = render_offline(&job)?;
    write_wav(out, &rendered.interleaved, rendered.sample_rate)?;

    println!("Wrote:      {}", out.display());
    println!(
        "Length:     {:.2}s ({} frames @ {} Hz)",
        rendered.frames() as f64 / rendered.sample_rate as f64,
        rendered.frames(),
        rendered.sample_rate
    );
    println!("Events:     {}", rendered.scheduler.dispatched);
    println!("Dropped:    {}", rendered.render.dropped_events);
    println!("Steals:     {}", rendered.render.voice_steals);
    Ok(())
}

fn vocab() {
    println!("contract version {CONTRACT_VERSION}");
    println!();
    println!("{:<6} source type", "code");
    for source in SourceType::ALL {
        println!("{:<6} {}", source.code(), source.name());
    }
    println!();
    println!("{:<6} parameter", "code");
    for label in ParamLabel::ALL {
        println!("{:<6} {}", label.code(), label.name());
    }
}
