//! Batch copies from a pairs file.
//!
//! Each non-blank line holds a source and a destination identifier
//! separated by whitespace:
//!
//! ```text
//! d1437880 g1525416
//! d1437881   g1525417
//! ```

use std::path::Path;

use crate::error::{NoteCopyError, Result};
use crate::locator::locate;
use crate::models::Mode;
use crate::progress::{TransferProgressEvent, TransferProgressReporter};
use crate::traits::SiteRegistry;
use crate::transfer::{transfer, TransferReport};

/// One line of a pairs file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub source: String,
    pub destination: String,
}

/// Parse a pairs file's contents. Blank lines are skipped; every other line
/// must hold exactly two identifiers.
pub fn parse_pairs(content: &str) -> Result<Vec<Pair>> {
    let mut pairs = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => continue,
            [source, destination] => pairs.push(Pair {
                source: source.to_string(),
                destination: destination.to_string(),
            }),
            _ => {
                return Err(NoteCopyError::parse(
                    format!("pairs file line {}", index + 1),
                    format!("expected two post identifiers, found {}", tokens.len()),
                ))
            }
        }
    }
    Ok(pairs)
}

pub fn read_pairs(path: &Path) -> Result<Vec<Pair>> {
    let content = std::fs::read_to_string(path)?;
    parse_pairs(&content)
}

/// Copy one pair: the source is opened for reading, the destination for writing.
pub fn copy_pair(
    registry: &SiteRegistry,
    source: &str,
    destination: &str,
    same_size: bool,
    progress: &dyn TransferProgressReporter,
) -> Result<TransferReport> {
    let mut source = locate(registry, source, Mode::Read)?;
    let mut destination = locate(registry, destination, Mode::Write)?;
    transfer(source.as_mut(), destination.as_mut(), same_size, progress)
}

/// Copy every pair in order, sleeping the longest site cooldown between
/// pairs. Stops at the first failure.
pub fn run_batch(
    registry: &SiteRegistry,
    pairs: &[Pair],
    same_size: bool,
    progress: &dyn TransferProgressReporter,
) -> Result<Vec<TransferReport>> {
    let cooldown = registry.max_cooldown();
    let total = pairs.len() as u64;
    let mut reports = Vec::with_capacity(pairs.len());

    for (i, pair) in pairs.iter().enumerate() {
        if i > 0 && !cooldown.is_zero() {
            std::thread::sleep(cooldown);
        }
        progress.report(TransferProgressEvent::Pair {
            n: i as u64 + 1,
            total,
        });
        tracing::info!(source = %pair.source, destination = %pair.destination, "copying pair");
        reports.push(copy_pair(
            registry,
            &pair.source,
            &pair.destination,
            same_size,
            progress,
        )?);
    }

    Ok(reports)
}
