//! Transfer progress reporting.
//!
//! Reports which pair is being copied and how many notes have been written,
//! so a long Gelbooru transfer (15 s per note) does not look stuck.
//! Progress goes to **stderr** so stdout keeps only the result lines.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferProgressEvent {
    /// Notes fetched from the source; `total` will be written.
    Started {
        source: String,
        destination: String,
        total: u64,
    },
    /// `n` of `total` notes written to the destination.
    NoteWritten {
        destination: String,
        n: u64,
        total: u64,
    },
    /// Batch mode: starting pair `n` of `total`.
    Pair { n: u64, total: u64 },
}

pub trait TransferProgressReporter {
    fn report(&self, event: TransferProgressEvent);
}

/// Human-friendly progress on stderr: "copy Gelbooru #2  writing  3 / 12 notes".
pub struct StderrProgress;

impl TransferProgressReporter for StderrProgress {
    fn report(&self, event: TransferProgressEvent) {
        let line = match &event {
            TransferProgressEvent::Started {
                source,
                destination,
                total,
            } => format!("copy {} -> {}  {} notes\n", source, destination, total),
            TransferProgressEvent::NoteWritten { destination, n, total } => {
                format!("copy {}  writing  {} / {} notes\n", destination, n, total)
            }
            TransferProgressEvent::Pair { n, total } => {
                format!("batch  pair {} / {}\n", n, total)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl TransferProgressReporter for JsonProgress {
    fn report(&self, event: TransferProgressEvent) {
        if let Ok(line) = serde_json::to_string(&event_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &TransferProgressEvent) -> serde_json::Value {
    match event {
        TransferProgressEvent::Started {
            source,
            destination,
            total,
        } => serde_json::json!({
            "event": "progress",
            "phase": "started",
            "source": source,
            "destination": destination,
            "total": total
        }),
        TransferProgressEvent::NoteWritten { destination, n, total } => serde_json::json!({
            "event": "progress",
            "phase": "writing",
            "destination": destination,
            "n": n,
            "total": total
        }),
        TransferProgressEvent::Pair { n, total } => serde_json::json!({
            "event": "progress",
            "phase": "pair",
            "n": n,
            "total": total
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl TransferProgressReporter for NoProgress {
    fn report(&self, _event: TransferProgressEvent) {}
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

    pub fn reporter(&self) -> Box<dyn TransferProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
