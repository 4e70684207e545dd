//! Console and rotating-file logging driven by the `logging:` config section.
//!
//! The `default` section covers every target not claimed by a crate section.
//! A crate section (`api_ingress`, `users_info`, `users_info::domain`, ...)
//! owns its targets on both sinks: its own console level and, when `file` is
//! set, its own JSON log file. The longest matching crate prefix wins.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;

use crate::config::{LoggingConfig, Section};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

/// Level names are case-insensitive; `off`/`none` disable the sink and
/// anything unrecognised (including an empty string) means `info`.
fn level_of(name: &str) -> LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => LevelFilter::OFF,
        "" => LevelFilter::INFO,
        other => other.parse().unwrap_or(LevelFilter::INFO),
    }
}

/// `target` is `prefix` itself or a module below it.
fn in_scope(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// -------- rotating files --------

/// One rotating log file shared by every writer handle routed to it.
#[derive(Clone)]
struct RotatingFile {
    path: PathBuf,
    inner: Arc<Mutex<FileRotate<AppendTimestamp>>>,
}

impl RotatingFile {
    fn open(path: PathBuf, section: &Section) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
        let max_backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

        let rotate = FileRotate::new(
            &path,
            AppendTimestamp::default(FileLimit::MaxFiles(max_backups)),
            ContentLimit::BytesSurpassed(max_bytes as usize),
            Compression::None,
            #[cfg(unix)]
            None,
        );
        Ok(Self {
            path,
            inner: Arc::new(Mutex::new(rotate)),
        })
    }
}

/// Writer for a single event; events with no file are discarded.
struct FileSink(Option<RotatingFile>);

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(file) => file.inner.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(file) => file.inner.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Picks the log file for an event by its target.
#[derive(Clone, Default)]
struct LogFiles {
    default: Option<RotatingFile>,
    /// Sorted longest prefix first.
    by_crate: Vec<(String, RotatingFile)>,
}

impl LogFiles {
    fn route(&self, target: &str) -> Option<&RotatingFile> {
        self.by_crate
            .iter()
            .find(|(prefix, _)| in_scope(target, prefix))
            .map(|(_, file)| file)
            .or(self.default.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_crate.is_empty()
    }
}

impl<'a> MakeWriter<'a> for LogFiles {
    type Writer = FileSink;

    fn make_writer(&'a self) -> Self::Writer {
        FileSink(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        FileSink(self.route(meta.target()).cloned())
    }
}

// -------- plan --------

/// Filters and files derived from a `LoggingConfig`, before anything is installed.
struct LogPlan {
    console: Targets,
    file: Targets,
    files: LogFiles,
}

/// Relative log paths live under `home_dir`.
fn resolve_log_path(file: &str, home_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        home_dir.join(p)
    }
}

fn open_section_file(name: &str, section: &Section, home_dir: &Path) -> Option<RotatingFile> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(section.file.trim(), home_dir);
    match RotatingFile::open(path.clone(), section) {
        Ok(file) => Some(file),
        Err(e) => {
            // No subscriber is installed yet, so stderr is the only channel.
            eprintln!(
                "Failed to open log file for '{name}' at {}: {e}",
                path.display()
            );
            None
        }
    }
}

impl LogPlan {
    fn from_config(cfg: &LoggingConfig, home_dir: &Path) -> Self {
        let default = cfg.get(DEFAULT_SECTION);
        let default_file = default.and_then(|s| open_section_file(DEFAULT_SECTION, s, home_dir));

        let mut console = Targets::new().with_default(
            default.map_or(LevelFilter::INFO, |s| level_of(&s.console_level)),
        );
        let mut file = Targets::new().with_default(match (default, &default_file) {
            (Some(s), Some(_)) => level_of(&s.file_level),
            _ => LevelFilter::OFF,
        });

        let mut by_crate = Vec::new();
        for (name, section) in cfg.iter().filter(|(k, _)| k.as_str() != DEFAULT_SECTION) {
            console = console.with_target(name.clone(), level_of(&section.console_level));
            match open_section_file(name, section, home_dir) {
                Some(handle) => {
                    file = file.with_target(name.clone(), level_of(&section.file_level));
                    by_crate.push((name.clone(), handle));
                }
                None => file = file.with_target(name.clone(), LevelFilter::OFF),
            }
        }
        by_crate.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Self {
            console,
            file,
            files: LogFiles {
                default: default_file,
                by_crate,
            },
        }
    }

    /// Install as the global subscriber; a second install is ignored.
    fn install(self) {
        let ansi = atty::is(atty::Stream::Stdout);

        let console_layer = fmt::layer()
            .with_ansi(ansi)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_filter(self.console);

        let file_layer = (!self.files.is_empty()).then(|| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(self.files)
                .with_filter(self.file)
        });

        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();
    }
}

/// Initialize process logging. `home_dir` anchors relative log file paths.
///
/// An empty config logs `info` and above to the console only.
pub fn init_logging_from_config(cfg: &LoggingConfig, home_dir: &Path) {
    // Bridge `log` records before the subscriber goes in.
    let _ = tracing_log::LogTracer::init();
    LogPlan::from_config(cfg, home_dir).install();
}
