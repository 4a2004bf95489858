//! Copy every note of one post onto another.
//!
//! ```text
//! source.notes() ──▶ scale ──▶ destination.write_note() ──▶ sleep(cooldown)
//!                                        │ (per note)
//!                                        ▼
//!                    destination.set_notes() / update_tags() / invalidate
//! ```
//!
//! There is no rollback: if a write fails, the notes written before it stay
//! on the destination and the tags are left alone.

use std::time::Duration;

use crate::error::Result;
use crate::models::Note;
use crate::progress::{TransferProgressEvent, TransferProgressReporter};
use crate::scale::scale_note;
use crate::traits::Post;

/// Outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// `"<site> #<id>"` of the source.
    pub source: String,
    pub destination: String,
    /// Notes as written to the destination, in source order.
    pub notes: Vec<Note>,
}

/// Copy all notes from `source` to `destination`, then mark the destination
/// as translated.
///
/// Unless `same_size` is set, each note is scaled from the source image's
/// dimensions to the destination's. The destination's cooldown is slept
/// after every write.
pub fn transfer(
    source: &mut dyn Post,
    destination: &mut dyn Post,
    same_size: bool,
    progress: &dyn TransferProgressReporter,
) -> Result<TransferReport> {
    let source_label = source.to_string();
    let destination_label = destination.to_string();

    let notes = source.notes()?.to_vec();
    let total = notes.len() as u64;
    tracing::info!(source = %source_label, destination = %destination_label, notes = total, "starting transfer");
    progress.report(TransferProgressEvent::Started {
        source: source_label.clone(),
        destination: destination_label.clone(),
        total,
    });

    let dimensions = if same_size || notes.is_empty() {
        None
    } else {
        Some((source.dimensions()?, destination.dimensions()?))
    };

    let cooldown = destination.cooldown();
    let mut written = Vec::with_capacity(notes.len());
    for note in &notes {
        let note = match dimensions {
            Some((from, to)) => scale_note(note, from, to),
            None => note.clone(),
        };
        destination.write_note(&note)?;
        pause(cooldown);
        written.push(note);
        progress.report(TransferProgressEvent::NoteWritten {
            destination: destination_label.clone(),
            n: written.len() as u64,
            total,
        });
    }

    destination.set_notes(written.clone());
    destination.update_tags()?;
    destination.invalidate_post_info();
    tracing::info!(destination = %destination_label, "updated tags");

    println!(
        "Notes successfully copied from {} to {}",
        source_label, destination_label
    );

    Ok(TransferReport {
        source: source_label,
        destination: destination_label,
        notes: written,
    })
}

fn pause(cooldown: Duration) {
    if !cooldown.is_zero() {
        std::thread::sleep(cooldown);
    }
}
