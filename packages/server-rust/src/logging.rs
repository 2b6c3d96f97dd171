//! Process-wide `tracing` setup: console output plus a daily-rotated file.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::{non_blocking, rolling::daily};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::{fmt, EnvFilter};

/// The `fmt` layer type written to the log directory.
pub type FileLayer<S> = fmt::Layer<S, DefaultFields, Format, NonBlocking>;

/// File name prefix of the rotated log files.
pub const LOG_FILE_PREFIX: &str = "sitelink.log";

/// Non-ANSI `fmt` layer writing into `log_dir` through a non-blocking,
/// daily-rotated appender. Records are flushed while the guard lives.
///
/// # Errors
///
/// Returns an error if `log_dir` cannot be created.
pub fn file_layer<S>(log_dir: &Path) -> anyhow::Result<(FileLayer<S>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let (writer, guard) = non_blocking(daily(log_dir, LOG_FILE_PREFIX));
    let layer = fmt::layer().with_ansi(false).with_writer(writer);

    Ok((layer, guard))
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`),
/// console output and the file layer from [`file_layer`].
///
/// Keep the returned guard alive for the life of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(log_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file, guard) = file_layer(log_dir)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file)
        .try_init()?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::Registry;

    use super::*;

    #[test]
    fn file_layer_writes_into_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs/site");

        let (layer, guard) = file_layer::<Registry>(&log_dir).unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(topic = "alerts", "hello from the file layer");
        });
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(LOG_FILE_PREFIX));

        let text = fs::read_to_string(&files[0]).unwrap();
        assert!(text.contains("hello from the file layer"));
        assert!(text.contains("topic=\"alerts\""));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn unwritable_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let err = file_layer::<Registry>(&blocker.join("logs")).err().unwrap();

        assert!(err.to_string().contains("failed to create log directory"));
    }
}
