//! Step timing: every span is logged through `tracing`, and optionally appended
//! as one JSON line to `<trace_dir>/trace.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

const TRACE_FILE: &str = "trace.jsonl";

#[derive(Debug, Clone, Default)]
pub struct Tracer {
    dir: Option<PathBuf>,
}

impl Tracer {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: enabled.then(|| dir.into()),
        }
    }

    /// Tracer that only logs.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(TRACE_FILE))
    }

    pub fn span(&self, name: &'static str, meta: serde_json::Value) -> SpanGuard<'_> {
        SpanGuard {
            tracer: self,
            name,
            meta,
            started: Instant::now(),
            start_s: unix_seconds(),
        }
    }
}

#[derive(Serialize)]
struct SpanRecord<'a> {
    span: &'a str,
    meta: &'a serde_json::Value,
    start_s: f64,
    end_s: f64,
    dur_ms: u128,
}

/// Records the span when dropped.
pub struct SpanGuard<'a> {
    tracer: &'a Tracer,
    name: &'static str,
    meta: serde_json::Value,
    started: Instant,
    start_s: f64,
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        let dur_ms = self.started.elapsed().as_millis();
        info!(span = self.name, dur_ms, "{} took {}ms", self.name, dur_ms);

        let Some(dir) = &self.tracer.dir else {
            return;
        };
        let record = SpanRecord {
            span: self.name,
            meta: &self.meta,
            start_s: self.start_s,
            end_s: unix_seconds(),
            dur_ms,
        };
        if let Err(e) = append_record(dir, &record) {
            debug!(%e, "could not write trace record");
        }
    }
}

fn append_record(dir: &Path, record: &SpanRecord<'_>) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(TRACE_FILE))?;
    let line = serde_json::to_string(record)?;
    writeln!(file, "{line}")
}

fn unix_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}
