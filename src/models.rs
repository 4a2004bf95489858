//! Core data models used throughout note-copy.
//!
//! These types represent the notes, image dimensions and post metadata that
//! flow between a source post, the scaler and a destination post.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{NoteCopyError, Result};

/// Bodies at or above this many characters are shortened in [`Note`]'s `Display`.
const DISPLAY_BODY_LIMIT: usize = 30;

/// A translation note: a rectangle in an image's pixel space plus its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub body: String,
}

impl Note {
    pub fn new(x: u32, y: u32, width: u32, height: u32, body: impl Into<String>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            body: body.into(),
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = if self.body.chars().count() < DISPLAY_BODY_LIMIT {
            self.body.clone()
        } else {
            let head: String = self.body.chars().take(DISPLAY_BODY_LIMIT - 3).collect();
            format!("{}...", head)
        };
        write!(
            f,
            "{}x{} {},{} {}",
            self.width, self.height, self.x, self.y, body
        )
    }
}

/// Full-size image dimensions of a post. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    height: u32,
    width: u32,
}

impl Dimensions {
    pub fn new(height: u32, width: u32) -> Result<Self> {
        if height == 0 || width == 0 {
            return Err(NoteCopyError::InvalidDimensions {
                height: height.into(),
                width: width.into(),
            });
        }
        Ok(Self { height, width })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Whether a post is opened to be read from or written to.
///
/// Some sites only expose the fields needed for an edit on their HTML page,
/// so the mode decides which metadata strategy a backend uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

impl FromStr for Mode {
    type Err = NoteCopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Mode::Read),
            "write" => Ok(Mode::Write),
            _ => Err(NoteCopyError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Read => f.write_str("read"),
            Mode::Write => f.write_str("write"),
        }
    }
}

/// Flat, site-specific post metadata.
///
/// Every value is kept as text; typed access goes through
/// [`require`](PostInfo::require) and [`dimensions`](PostInfo::dimensions).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostInfo {
    context: String,
    fields: BTreeMap<String, String>,
}

impl PostInfo {
    /// Create empty metadata. `context` names the source in error messages,
    /// e.g. `"Danbooru post 1437880"`.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| NoteCopyError::missing_field(self.context.clone(), key))
    }

    pub fn require_u32(&self, key: &str) -> Result<u32> {
        let raw = self.require(key)?;
        parse_pixels(raw).ok_or_else(|| {
            NoteCopyError::parse(
                format!("{} field '{}'", self.context, key),
                format!("'{}' is not a pixel count", raw),
            )
        })
    }

    /// Read the image size from the given height and width fields.
    pub fn dimensions(&self, height_key: &str, width_key: &str) -> Result<Dimensions> {
        Dimensions::new(self.require_u32(height_key)?, self.require_u32(width_key)?)
    }
}

/// Parse a pixel value that may be written as an integer or a decimal.
///
/// Decimals are truncated toward zero; negative values are rejected.
pub fn parse_pixels(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value <= f64::from(u32::MAX) {
        Some(value.trunc() as u32)
    } else {
        None
    }
}
