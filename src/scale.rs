//! Coordinate scaling between two images of the same picture.

use crate::models::{Dimensions, Note};

/// Map `note` from the pixel space of `from` into the pixel space of `to`.
///
/// Each axis is scaled by `to / from` and the result truncated toward zero.
/// The body is copied unchanged.
pub fn scale_note(note: &Note, from: Dimensions, to: Dimensions) -> Note {
    let x_ratio = f64::from(to.width()) / f64::from(from.width());
    let y_ratio = f64::from(to.height()) / f64::from(from.height());

    Note {
        x: scale_axis(note.x, x_ratio),
        y: scale_axis(note.y, y_ratio),
        width: scale_axis(note.width, x_ratio),
        height: scale_axis(note.height, y_ratio),
        body: note.body.clone(),
    }
}

fn scale_axis(value: u32, ratio: f64) -> u32 {
    (f64::from(value) * ratio) as u32
}
