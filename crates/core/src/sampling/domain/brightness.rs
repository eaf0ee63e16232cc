use ndarray::{s, ArrayView1};

use crate::shared::frame::Frame;

/// Rec. 601 luma of one pixel. Single-channel frames are already luma.
fn luma(px: ArrayView1<'_, u8>) -> f64 {
    if px.len() < 3 {
        return px.first().copied().map(f64::from).unwrap_or(0.0);
    }
    0.299 * f64::from(px[0]) + 0.587 * f64::from(px[1]) + 0.114 * f64::from(px[2])
}

/// Mean luma over every `stride`-th pixel, in `[0, 255]`.
///
/// Returns 0 for an empty frame.
pub fn sample_brightness(frame: &Frame, stride: usize) -> f64 {
    let step = stride.max(1) as isize;
    let pixels = frame.pixels();
    let sampled = pixels.slice(s![..;step, ..]);

    let mut total = 0.0;
    let mut count = 0usize;
    for px in sampled.rows() {
        total += luma(px);
        count += 1;
    }

    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
