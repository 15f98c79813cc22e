use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueHint};
use grip_core::{drive, session_id, GripConfig, GripEngine, SessionRecorder, SummaryLog, TickOutcome};
use grip_store::{write_summary, CsvLogSink, CsvSampleSource, JsonCatalog, DEFAULT_CATALOG_FILE};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(author, version, about = "Grip-strength estimation from magnetometer logs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a recorded session log through the engine and print metrics
    Replay(ReplayArgs),

    /// List cataloged sessions
    Sessions {
        #[arg(long, value_hint = ValueHint::FilePath, default_value = DEFAULT_CATALOG_FILE)]
        catalog: PathBuf,
    },

    /// Print the default configuration as TOML
    ConfigTemplate,
}

#[derive(Args)]
struct ReplayArgs {
    /// Raw log (`t_ms;bx;by;bz;magnitude`, optional `ax;ay;az;touch`)
    #[arg(value_hint = ValueHint::FilePath)]
    log: PathBuf,

    /// Engine configuration file; `GRIP_*` environment variables override it
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Write the quarter-second summary CSV into this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    summary_dir: Option<PathBuf>,

    /// Re-record the replayed samples as a new session in this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    record_dir: Option<PathBuf>,

    /// Print one metrics row per this many milliseconds
    #[arg(long, default_value_t = 100)]
    every_ms: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Replay(args) => replay(&args),
        Command::Sessions { catalog } => sessions(&catalog),
        Command::ConfigTemplate => config_template(),
    };
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn replay(args: &ReplayArgs) -> Result<()> {
    let cfg = match &args.config {
        Some(path) => GripConfig::from_file(path)?,
        None => GripConfig::default(),
    };
    let mut engine = GripEngine::new(cfg)?;
    let mut source = CsvSampleSource::open(&args.log)?;
    log::info!("replaying {} batches from {}", source.len(), args.log.display());

    let started = Utc::now();
    let mut recorder = SessionRecorder::new();
    if args.record_dir.is_some() {
        recorder.start(started, 0);
    }

    let mut summary = SummaryLog::new();
    let every = args.every_ms.max(1);
    let mut next_print = 0u64;
    let mut skipped = 0usize;
    println!("t_ms,grip,level,fused,magnetic,tremor,touch,motion,gi,stability");

    let ticks = drive(&mut engine, &mut source, |batch, outcome| {
        recorder.record(batch);
        summary.observe(batch.timestamp_ms, outcome);
        match outcome {
            TickOutcome::NoData(e) => {
                skipped += 1;
                log::debug!("t={} skipped: {e}", batch.timestamp_ms);
            }
            TickOutcome::Calibrating(p) => {
                if batch.timestamp_ms >= next_print {
                    log::debug!("calibrating {:.0}%", p.fraction * 100.0);
                    next_print = batch.timestamp_ms + every;
                }
            }
            TickOutcome::Ready(m) => {
                if batch.timestamp_ms >= next_print {
                    println!(
                        "{},{:.1},{},{:.3},{:.3},{:.3},{},{:.3},{:.3},{}",
                        m.timestamp_ms,
                        m.grip_percent,
                        m.level,
                        m.fused,
                        m.scores.magnetic,
                        m.scores.tremor,
                        m.scores.touch.map(|t| format!("{t:.3}")).unwrap_or_default(),
                        m.motion,
                        m.grip_index,
                        m.stability
                    );
                    next_print = batch.timestamp_ms + every;
                }
            }
        }
    });
    log::info!("{ticks} ticks, {skipped} skipped, final phase {:?}", engine.phase());
    if engine.magnetometer_looks_dead() {
        log::warn!(
            "log ends with a run of invalid magnetometer readings (last at {}ms)",
            engine.last_invalid_ms().unwrap_or_default()
        );
    }

    let id = session_id(&started);
    if let Some(dir) = &args.summary_dir {
        write_summary(dir, &replay_id(&args.log, &id), &summary)?;
    }
    if let Some(dir) = &args.record_dir {
        let mut sink = CsvLogSink::new(dir);
        let mut catalog = JsonCatalog::in_dir(dir);
        if let Some(record) = recorder.stop(&mut sink, &mut catalog)? {
            log::info!(
                "recorded session {}: n={} |B| mean={:.2} min={:.2} max={:.2}",
                record.id,
                record.sample_count,
                record.mean_magnitude,
                record.min_magnitude,
                record.max_magnitude
            );
        }
        if recorder.rejected() > 0 {
            log::warn!("{} non-finite magnetometer readings left out of the recording", recorder.rejected());
        }
    }
    Ok(())
}

/// Summary id: the log's own session id when it follows `mag_{id}.csv`.
fn replay_id(log: &Path, fallback: &str) -> String {
    log.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("mag_"))
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

fn sessions(catalog: &Path) -> Result<()> {
    let sessions = JsonCatalog::new(catalog).sessions()?;
    if sessions.is_empty() {
        println!("no sessions in {}", catalog.display());
        return Ok(());
    }
    println!("{:<16} {:<20} {:>8} {:>8} {:>8} {:>8}  log", "id", "started", "samples", "mean", "min", "max");
    for s in sessions {
        println!(
            "{:<16} {:<20} {:>8} {:>8.2} {:>8.2} {:>8.2}  {}",
            s.id,
            s.datetime.format("%Y-%m-%d %H:%M:%S"),
            s.sample_count,
            s.mean_magnitude,
            s.min_magnitude,
            s.max_magnitude,
            s.log_path
        );
    }
    Ok(())
}

fn config_template() -> Result<()> {
    print!("{}", GripConfig::default().to_toml_string()?);
    Ok(())
}
