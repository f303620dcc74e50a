//! Batch progress reporting.
//!
//! Reports observable progress during `autolink vault` and
//! `autolink incremental` so users see how many documents are left and how
//! many links were made so far. Progress is emitted on **stderr** so stdout
//! remains parseable for scripts.

use std::io::Write;

/// A single progress event for a linking run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkProgressEvent {
    /// Listing documents and rebuilding the index. Total unknown.
    Scanning,
    /// A batch is about to be processed.
    BatchStarted {
        batch: usize,
        total_batches: usize,
        size: usize,
    },
    /// A batch finished; counts are cumulative for the run.
    BatchFinished {
        done: usize,
        total: usize,
        links: usize,
        errors: usize,
    },
    /// The run is waiting for a resume.
    Paused,
    /// The run is over.
    Finished {
        processed: usize,
        links: usize,
        errors: usize,
    },
}

/// Reports batch progress. Implementations write to stderr (human or JSON).
pub trait LinkProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the batch orchestrator.
    fn report(&self, event: LinkProgressEvent);
}

/// Human-friendly progress on stderr: "link  batch 2/3  100 / 120 documents  37 links".
pub struct StderrProgress;

impl LinkProgressReporter for StderrProgress {
    fn report(&self, event: LinkProgressEvent) {
        let line = match &event {
            LinkProgressEvent::Scanning => "link  scanning...\n".to_string(),
            LinkProgressEvent::BatchStarted {
                batch,
                total_batches,
                size,
            } => format!(
                "link  batch {}/{}  {} documents\n",
                batch,
                total_batches,
                format_number(*size as u64)
            ),
            LinkProgressEvent::BatchFinished {
                done,
                total,
                links,
                errors,
            } => {
                let mut line = format!(
                    "link  {} / {} documents  {} links",
                    format_number(*done as u64),
                    format_number(*total as u64),
                    format_number(*links as u64)
                );
                if *errors > 0 {
                    line.push_str(&format!("  {} errors", format_number(*errors as u64)));
                }
                line.push('\n');
                line
            }
            LinkProgressEvent::Paused => "link  paused\n".to_string(),
            LinkProgressEvent::Finished {
                processed,
                links,
                errors,
            } => format!(
                "link  done  {} documents  {} links  {} errors\n",
                format_number(*processed as u64),
                format_number(*links as u64),
                format_number(*errors as u64)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &LinkProgressEvent) -> serde_json::Value {
        match event {
            LinkProgressEvent::Scanning => serde_json::json!({
                "event": "progress",
                "phase": "scanning"
            }),
            LinkProgressEvent::BatchStarted {
                batch,
                total_batches,
                size,
            } => serde_json::json!({
                "event": "progress",
                "phase": "batch_started",
                "batch": batch,
                "total_batches": total_batches,
                "size": size
            }),
            LinkProgressEvent::BatchFinished {
                done,
                total,
                links,
                errors,
            } => serde_json::json!({
                "event": "progress",
                "phase": "batch_finished",
                "n": done,
                "total": total,
                "links": links,
                "errors": errors
            }),
            LinkProgressEvent::Paused => serde_json::json!({
                "event": "progress",
                "phase": "paused"
            }),
            LinkProgressEvent::Finished {
                processed,
                links,
                errors,
            } => serde_json::json!({
                "event": "finished",
                "processed": processed,
                "links": links,
                "errors": errors
            }),
        }
    }
}

impl LinkProgressReporter for JsonProgress {
    fn report(&self, event: LinkProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl LinkProgressReporter for NoProgress {
    fn report(&self, _event: LinkProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn LinkProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn json_shape() {
        let v = JsonProgress::to_json(&LinkProgressEvent::BatchFinished {
            done: 50,
            total: 120,
            links: 7,
            errors: 1,
        });
        assert_eq!(v["phase"], "batch_finished");
        assert_eq!(v["n"], 50);
        assert_eq!(v["total"], 120);
    }
}
