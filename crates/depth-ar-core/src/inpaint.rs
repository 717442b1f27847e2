//! Depth hole filling.
//!
//! Holes (zero samples) are filled on a min/max-normalized 8-bit copy of the
//! frame, then rescaled to the original depth range and written back into
//! the hole pixels only. Valid samples are never modified.

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::image::{DepthFrame, DepthFrameView, GrayImage};

/// Hole-filling settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InpaintParams {
    /// Neighbourhood radius (pixels) considered when filling a hole pixel.
    pub radius: usize,
    /// Fill on a 2x down-sampled frame and up-sample the result.
    pub half_size: bool,
    /// Laplace smoothing sweeps applied to filled pixels.
    pub relax_iterations: usize,
}

impl Default for InpaintParams {
    fn default() -> Self {
        Self {
            radius: 3,
            half_size: true,
            relax_iterations: 10,
        }
    }
}

/// Range of valid depth values used for 8-bit normalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthRange {
    pub min: u16,
    pub max: u16,
}

impl DepthRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// `255 / (max - min)`; `None` for an empty range.
    pub fn scale(&self) -> Option<f64> {
        (self.max > self.min).then(|| 255.0 / (self.max - self.min) as f64)
    }
}

/// Map depth to 8 bits: `sat(round((d - min) * 255 / (max - min)))`.
///
/// Holes and samples below `min` saturate to 0. For an empty range every
/// pixel maps to 0.
pub fn normalize_depth(frame: &DepthFrameView<'_>, range: DepthRange) -> GrayImage {
    let Some(scale) = range.scale() else {
        return GrayImage::new(frame.width, frame.height);
    };
    let min = range.min as f64;
    GrayImage {
        width: frame.width,
        height: frame.height,
        data: frame
            .data
            .iter()
            .map(|&d| ((d as f64 - min) * scale).round().clamp(0.0, 255.0) as u8)
            .collect(),
    }
}

/// Inverse of [`normalize_depth`]: `sat(round(v * (max - min) / 255 + min))`.
pub fn denormalize_depth(value: u8, range: DepthRange) -> u16 {
    match range.scale() {
        Some(scale) => (value as f64 / scale + range.min as f64)
            .round()
            .clamp(0.0, u16::MAX as f64) as u16,
        None => range.min,
    }
}

/// Fill the pixels of `img` where `mask` is non-zero from the surrounding
/// unmasked pixels.
///
/// Masked pixels are filled layer by layer from the hole boundary inwards,
/// each from an inverse-square-distance average of already known pixels
/// within `radius`; the filled region is then smoothed with
/// `relax_iterations` Jacobi sweeps of the 4-neighbour Laplace equation.
/// Masked pixels not connected to any known pixel keep their input value.
pub fn inpaint_gray(
    img: &GrayImage,
    mask: &GrayImage,
    radius: usize,
    relax_iterations: usize,
) -> GrayImage {
    let (w, h) = (img.width, img.height);
    debug_assert_eq!((mask.width, mask.height), (w, h));

    let mut values: Vec<f32> = img.data.iter().map(|&v| v as f32).collect();
    let mut known: Vec<bool> = mask.data.iter().map(|&m| m == 0).collect();
    let filled = fill_layers(&mut values, &mut known, w, h, radius.max(1));

    relax(&mut values, &filled, w, h, relax_iterations);

    GrayImage {
        width: w,
        height: h,
        data: values
            .iter()
            .map(|v| v.round().clamp(0.0, 255.0) as u8)
            .collect(),
    }
}

fn neighbours8(idx: usize, w: usize, h: usize) -> impl Iterator<Item = usize> {
    let x = (idx % w) as isize;
    let y = (idx / w) as isize;
    (-1..=1)
        .flat_map(move |dy| (-1..=1).map(move |dx| (x + dx, y + dy)))
        .filter(move |&(nx, ny)| {
            (nx, ny) != (x, y) && nx >= 0 && ny >= 0 && nx < w as isize && ny < h as isize
        })
        .map(move |(nx, ny)| ny as usize * w + nx as usize)
}

/// Onion-peel fill. Returns the indices that were filled, in fill order.
fn fill_layers(
    values: &mut [f32],
    known: &mut [bool],
    w: usize,
    h: usize,
    radius: usize,
) -> Vec<usize> {
    let mut queued = known.to_vec();
    let mut layer: Vec<usize> = Vec::new();
    for idx in 0..values.len() {
        if !known[idx] && neighbours8(idx, w, h).any(|n| known[n]) {
            queued[idx] = true;
            layer.push(idx);
        }
    }

    let r = radius as isize;
    let r2 = (radius * radius) as isize;
    let mut filled = Vec::new();
    let mut layer_values = Vec::new();

    while !layer.is_empty() {
        layer_values.clear();
        for &idx in &layer {
            let x = (idx % w) as isize;
            let y = (idx / w) as isize;
            let mut sum = 0.0f32;
            let mut weight = 0.0f32;
            for dy in -r..=r {
                for dx in -r..=r {
                    let d2 = dx * dx + dy * dy;
                    if d2 == 0 || d2 > r2 {
                        continue;
                    }
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                        continue;
                    }
                    let n = ny as usize * w + nx as usize;
                    if known[n] {
                        let wgt = 1.0 / d2 as f32;
                        sum += wgt * values[n];
                        weight += wgt;
                    }
                }
            }
            layer_values.push(if weight > 0.0 { sum / weight } else { values[idx] });
        }

        let mut next = Vec::new();
        for (&idx, &v) in layer.iter().zip(&layer_values) {
            values[idx] = v;
            known[idx] = true;
            filled.push(idx);
        }
        for &idx in &layer {
            for n in neighbours8(idx, w, h) {
                if !queued[n] {
                    queued[n] = true;
                    next.push(n);
                }
            }
        }
        layer = next;
    }

    filled
}

fn relax(values: &mut [f32], filled: &[usize], w: usize, h: usize, iterations: usize) {
    if filled.is_empty() {
        return;
    }
    let mut updated = vec![0.0f32; filled.len()];
    for _ in 0..iterations {
        for (slot, &idx) in updated.iter_mut().zip(filled) {
            let x = idx % w;
            let y = idx / w;
            let mut sum = 0.0;
            let mut count = 0.0;
            if x > 0 {
                sum += values[idx - 1];
                count += 1.0;
            }
            if x + 1 < w {
                sum += values[idx + 1];
                count += 1.0;
            }
            if y > 0 {
                sum += values[idx - w];
                count += 1.0;
            }
            if y + 1 < h {
                sum += values[idx + w];
                count += 1.0;
            }
            *slot = if count > 0.0 { sum / count } else { values[idx] };
        }
        for (&v, &idx) in updated.iter().zip(filled) {
            values[idx] = v;
        }
    }
}

/// 2x down-sampling that averages the valid samples of each 2x2 block.
fn downsample_half(frame: &DepthFrameView<'_>) -> DepthFrame {
    let (w2, h2) = (frame.width / 2, frame.height / 2);
    let mut out = DepthFrame::new(w2, h2);
    for y in 0..h2 {
        for x in 0..w2 {
            let mut sum = 0u32;
            let mut count = 0u32;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let d = frame.data[(2 * y + dy) * frame.width + 2 * x + dx];
                if d > 0 {
                    sum += d as u32;
                    count += 1;
                }
            }
            if count > 0 {
                out.set(x, y, ((sum + count / 2) / count) as u16);
            }
        }
    }
    out
}

/// Bilinear up-sampling of `small` to `width x height` (pixel-center aligned).
fn upsample(small: &DepthFrameView<'_>, width: usize, height: usize) -> DepthFrame {
    let sx = small.width as f32 / width as f32;
    let sy = small.height as f32 / height as f32;
    let mut out = DepthFrame::new(width, height);
    for y in 0..height {
        let fy = (y as f32 + 0.5) * sy - 0.5;
        for x in 0..width {
            let fx = (x as f32 + 0.5) * sx - 0.5;
            let v = small.sample_bilinear(fx, fy);
            out.set(x, y, v.round().clamp(0.0, u16::MAX as f32) as u16);
        }
    }
    out
}

/// Return a copy of `frame` with zero samples filled.
///
/// The result is a scratch buffer: it lives only as long as the caller keeps
/// it and never aliases the input. A frame without any valid sample is
/// returned unchanged; a frame whose valid samples all share one value gets
/// that value in every hole.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(frame, params), fields(width = frame.width, height = frame.height))
)]
pub fn inpaint_depth(frame: &DepthFrameView<'_>, params: &InpaintParams) -> DepthFrame {
    let mut out = frame.to_frame();
    let holes = frame.data.iter().filter(|&&d| d == 0).count();
    if holes == 0 {
        return out;
    }
    let Some((min, max)) = frame.valid_range() else {
        log::debug!("inpaint: frame has no valid depth samples, nothing to fill");
        return out;
    };
    if min == max {
        for d in out.data.iter_mut().filter(|d| **d == 0) {
            *d = min;
        }
        return out;
    }
    let range = DepthRange::new(min, max);

    let use_half = params.half_size && frame.width >= 2 && frame.height >= 2;
    let work = if use_half {
        downsample_half(frame)
    } else {
        frame.to_frame()
    };

    let gray = normalize_depth(&work.view(), range);
    let mask = GrayImage {
        width: work.width,
        height: work.height,
        data: work
            .data
            .iter()
            .map(|&d| if d == 0 { 255 } else { 0 })
            .collect(),
    };
    let painted = inpaint_gray(&gray, &mask, params.radius, params.relax_iterations);
    let painted = DepthFrame {
        width: painted.width,
        height: painted.height,
        data: painted
            .data
            .iter()
            .map(|&v| denormalize_depth(v, range))
            .collect(),
    };

    let painted = if use_half {
        upsample(&painted.view(), frame.width, frame.height)
    } else {
        painted
    };

    for (d, &p) in out.data.iter_mut().zip(&painted.data) {
        if *d == 0 {
            *d = p;
        }
    }
    log::debug!(
        "inpaint: filled {holes} holes in {}x{} frame (range {min}..{max}, half_size={use_half})",
        frame.width,
        frame.height
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> DepthFrame {
        let data = (0..height)
            .flat_map(|_| (0..width).map(|x| 1000 + 10 * x as u16))
            .collect();
        DepthFrame::from_raw(width, height, data).expect("length matches")
    }

    fn punch_hole(frame: &mut DepthFrame, x0: usize, y0: usize, size: usize) {
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                frame.set(x, y, 0);
            }
        }
    }

    #[test]
    fn normalization_matches_reference_round_trip() {
        let range = DepthRange::new(500, 1010);
        let frame = DepthFrame::from_raw(4, 1, vec![0, 500, 700, 1010]).expect("4x1");
        let gray = normalize_depth(&frame.view(), range);
        assert_eq!(gray.data, vec![0, 0, 100, 255]);
        assert_eq!(denormalize_depth(0, range), 500);
        assert_eq!(denormalize_depth(100, range), 700);
        assert_eq!(denormalize_depth(255, range), 1010);

        for d in (500u16..=1010).step_by(7) {
            let v = normalize_depth(&DepthFrame::filled(1, 1, d).view(), range).data[0];
            let back = denormalize_depth(v, range);
            assert!(back.abs_diff(d) <= 1, "{d} -> {v} -> {back}");
        }
    }

    #[test]
    fn valid_samples_are_untouched_and_holes_filled() {
        let mut frame = ramp(32, 24);
        let original = frame.clone();
        punch_hole(&mut frame, 12, 8, 5);

        for half_size in [false, true] {
            let params = InpaintParams {
                half_size,
                ..InpaintParams::default()
            };
            let out = inpaint_depth(&frame.view(), &params);
            for (i, (&before, &after)) in frame.data.iter().zip(&out.data).enumerate() {
                if before != 0 {
                    assert_eq!(before, after, "valid sample {i} modified");
                } else {
                    let expected = original.data[i];
                    assert!(
                        after.abs_diff(expected) <= 25,
                        "hole {i}: got {after}, ramp value {expected} (half_size={half_size})"
                    );
                }
            }
        }
    }

    #[test]
    fn empty_frame_stays_empty() {
        let frame = DepthFrame::new(10, 8);
        let out = inpaint_depth(&frame.view(), &InpaintParams::default());
        assert_eq!(out, frame);
    }

    #[test]
    fn flat_frame_gets_flat_fill() {
        let mut frame = DepthFrame::filled(10, 8, 1234);
        punch_hole(&mut frame, 2, 2, 4);
        let out = inpaint_depth(&frame.view(), &InpaintParams::default());
        assert!(out.data.iter().all(|&d| d == 1234));
    }

    #[test]
    fn large_hole_fill_is_deterministic_and_in_range() {
        let mut frame = ramp(40, 30);
        punch_hole(&mut frame, 5, 5, 20);
        let params = InpaintParams::default();
        let a = inpaint_depth(&frame.view(), &params);
        let b = inpaint_depth(&frame.view(), &params);
        assert_eq!(a, b);

        let (min, max) = frame.view().valid_range().expect("valid");
        assert!(a.data.iter().all(|&d| d >= min && d <= max));
    }

    #[test]
    fn gray_inpaint_leaves_unmasked_pixels() {
        let img = GrayImage {
            width: 3,
            height: 3,
            data: vec![10, 10, 10, 10, 0, 10, 10, 10, 10],
        };
        let mut mask = GrayImage::new(3, 3);
        mask.data[4] = 255;
        let out = inpaint_gray(&img, &mask, 3, 4);
        assert_eq!(out.data, vec![10; 9]);
    }
}
