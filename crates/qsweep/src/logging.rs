use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log file size that triggers trimming (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Tail kept after trimming (1 MB)
const KEEP_SIZE: u64 = 1024 * 1024;

/// Cut `log_path` down to roughly its last `keep` bytes once it exceeds `max`.
///
/// Only whole lines are kept. Returns the number of bytes dropped.
fn trim_log(log_path: &Path, max: u64, keep: u64) -> io::Result<u64> {
    let len = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    if len <= max {
        return Ok(0);
    }

    let mut tail = Vec::new();
    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(len.saturating_sub(keep)))?;
    file.read_to_end(&mut tail)?;

    let line_start = tail
        .iter()
        .position(|&b| b == b'\n')
        .map_or(0, |i| i + 1);
    let kept = &tail[line_start..];
    let dropped = len - kept.len() as u64;

    let mut file = File::create(log_path)?;
    writeln!(file, "--- trimmed {dropped} bytes of older log entries ---")?;
    file.write_all(kept)?;
    Ok(dropped)
}

/// Initialize logging to stderr, and to `log_file` when given.
///
/// The file is trimmed before opening: past 5MB only the last 1MB is kept.
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> color_eyre::Result<()> {
    let mut trimmed = 0;
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            match trim_log(path, MAX_LOG_SIZE, KEEP_SIZE) {
                Ok(dropped) => trimmed = dropped,
                Err(e) => eprintln!("Warning: Failed to trim log file: {e}"),
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    let default_filter = format!("qsweep={level},qsweep_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    if trimmed > 0 {
        tracing::info!(bytes = trimmed, "Trimmed log file");
    }
    tracing::debug!(log_file = ?log_file, "Logging initialized");
    Ok(())
}
