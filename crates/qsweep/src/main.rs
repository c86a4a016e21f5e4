use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use qsweep_core::{
    BaseConfiguration, QueueingFactory, SeriesSink, SweepOutcome, SweepParams, SweepScheduler,
    SweepSelector,
};

mod logging;
mod output;

use logging::init_logging;
use output::Format;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Selector {
    /// Number of arrival sources
    Source,
    /// Number of processors
    Processor,
    /// Buffer capacity
    Buffer,
}

impl From<Selector> for SweepSelector {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Source => SweepSelector::ArrivalSources,
            Selector::Processor => SweepSelector::ProcessorSet,
            Selector::Buffer => SweepSelector::BufferCapacity,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "qsweep")]
#[command(about = "Sweep a queueing-system simulation over one configuration dimension")]
struct Args {
    /// Base configuration file (JSON, or YAML for .yaml/.yml)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Dimension to vary
    #[arg(short, long, value_enum, default_value_t = Selector::Source)]
    selector: Selector,

    /// First count of the sweep
    #[arg(long, default_value = "10")]
    from: String,

    /// Last count of the sweep (inclusive)
    #[arg(long, default_value = "100")]
    to: String,

    /// Rate of each swept source or processor
    #[arg(long, default_value = "1.0")]
    lambda: String,

    /// Simulations run concurrently per batch
    #[arg(short, long, default_value = "5")]
    batch: String,

    /// Seed for the simulation; each step adds its count
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output format for the finished series
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,

    /// Do not print points while the sweep runs
    #[arg(short, long)]
    quiet: bool,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level, args.log_file.as_deref())?;

    let params = SweepParams::from_text(
        args.selector.into(),
        &args.from,
        &args.to,
        &args.lambda,
        &args.batch,
    )?;
    let base = BaseConfiguration::load(&args.config)?;
    let scheduler = SweepScheduler::new(QueueingFactory::new(args.seed), base);

    let sink = Arc::new(SeriesSink::new());
    sink.reset(params.series_name());
    tracing::info!(series = %sink.name(), steps = params.total_steps(), "Sweep configured");

    let (done_tx, done_rx) = mpsc::channel();
    let points = sink.clone();
    let stream = !args.quiet;
    let handle = scheduler.launch(
        params,
        move |channel, x, y| {
            points.append(channel, x, y);
            if stream && let Err(e) = output::write_point(&mut io::stdout().lock(), channel, x, y)
            {
                tracing::warn!("Failed to print point: {e}");
            }
        },
        move |outcome| {
            let _ = done_tx.send(outcome);
        },
    )?;

    let stopper = handle.stopper();
    ctrlc::set_handler(move || stopper.stop())?;

    let outcome = loop {
        match done_rx.recv_timeout(Duration::from_secs(1)) {
            Ok(outcome) => break outcome,
            Err(RecvTimeoutError::Timeout) => {
                let progress = handle.progress();
                tracing::debug!(
                    completed = progress.completed(),
                    total = progress.total(),
                    "Sweep progress"
                );
            }
            Err(RecvTimeoutError::Disconnected) => break SweepOutcome::Failed,
        }
    };
    let state = handle.join();
    tracing::info!(?outcome, ?state, "Sweep finished");

    let mut stdout = io::stdout().lock();
    if !args.quiet {
        writeln!(stdout)?;
    }
    output::write_series(&mut stdout, &sink, args.format)?;

    if outcome == SweepOutcome::Failed {
        color_eyre::eyre::bail!("sweep failed");
    }
    Ok(())
}
