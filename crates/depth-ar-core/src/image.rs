use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// 8-bit single-channel image (normalized depth, hole masks, previews).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }
}

/// Borrowed depth frame: row-major 16-bit samples, `0` means "no reading".
#[derive(Clone, Copy, Debug)]
pub struct DepthFrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u16],
}

/// Owned depth frame, one per sensor read cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

/// A depth value together with the pixel it was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthSample {
    pub x: usize,
    pub y: usize,
    pub depth: u16,
}

impl DepthSample {
    /// `false` for the "no reading" sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.depth > 0
    }
}

impl DepthFrame {
    /// All-zero (fully invalid) frame.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    pub fn filled(width: usize, height: usize, depth: u16) -> Self {
        Self {
            width,
            height,
            data: vec![depth; width * height],
        }
    }

    /// Wrap a raw buffer; `None` if its length does not match `width * height`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u16>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn view(&self) -> DepthFrameView<'_> {
        DepthFrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, depth: u16) {
        self.data[y * self.width + x] = depth;
    }
}

impl<'a> DepthFrameView<'a> {
    /// Wrap a raw slice; `None` if its length does not match `width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u16]) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `p` lies inside the frame. Both edges are inclusive, so a point
    /// at exactly `x == width` or `y == height` is accepted.
    #[inline]
    pub fn contains(&self, p: Point2<f32>) -> bool {
        p.x.is_finite()
            && p.y.is_finite()
            && p.x >= 0.0
            && p.y >= 0.0
            && p.x <= self.width as f32
            && p.y <= self.height as f32
    }

    /// Integer pixel used for depth lookups at `p`: rounded, then clamped into
    /// the frame so that points on the far edges read the last row/column.
    pub fn pixel_for(&self, p: Point2<f32>) -> Option<(usize, usize)> {
        if self.is_empty() || !self.contains(p) {
            return None;
        }
        let x = (p.x.round() as usize).min(self.width - 1);
        let y = (p.y.round() as usize).min(self.height - 1);
        Some((x, y))
    }

    /// Depth sample at the rounded pixel location of `p`.
    pub fn sample_at(&self, p: Point2<f32>) -> Option<DepthSample> {
        let (x, y) = self.pixel_for(p)?;
        Some(DepthSample {
            x,
            y,
            depth: self.data[y * self.width + x],
        })
    }

    /// Bilinear sample with replicated borders; invalid samples are treated
    /// as ordinary zeros.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        sample_bilinear(
            self.width,
            self.height,
            |xx, yy| self.data[yy * self.width + xx] as f32,
            x,
            y,
        )
    }

    /// 8-bit mask: 255 where the sensor produced a reading, 0 elsewhere.
    pub fn valid_mask(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|&d| if d == 0 { 0 } else { 255 })
                .collect(),
        }
    }

    /// Minimum and maximum over valid (non-zero) samples.
    pub fn valid_range(&self) -> Option<(u16, u16)> {
        self.data
            .iter()
            .copied()
            .filter(|&d| d > 0)
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Closest valid reading in the frame (first one in row-major order on
    /// ties).
    pub fn nearest_sample(&self) -> Option<DepthSample> {
        let mut best: Option<DepthSample> = None;
        for (idx, &depth) in self.data.iter().enumerate() {
            if depth == 0 {
                continue;
            }
            if best.is_none_or(|b| depth < b.depth) {
                best = Some(DepthSample {
                    x: idx % self.width,
                    y: idx / self.width,
                    depth,
                });
            }
        }
        best
    }

    pub fn to_frame(&self) -> DepthFrame {
        DepthFrame {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Bilinear interpolation over a `width x height` grid accessed through
/// `get(x, y)`. Coordinates outside the grid are clamped to the border.
#[inline]
pub fn sample_bilinear<F>(width: usize, height: usize, get: F, x: f32, y: f32) -> f32
where
    F: Fn(usize, usize) -> f32,
{
    if width == 0 || height == 0 {
        return 0.0;
    }
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get(x0, y0);
    let p10 = get(x1, y0);
    let p01 = get(x0, y1);
    let p11 = get(x1, y1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}
