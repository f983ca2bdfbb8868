//! Normalized correlation-coefficient matching.
//!
//! For every placement of the template inside the region the score is
//!
//! ```text
//!            Σ (T - mean T)(I - mean I)
//! R = ─────────────────────────────────────
//!     sqrt(Σ (T - mean T)² · Σ (I - mean I)²)
//! ```
//!
//! summed over all pixels and all three channels, with means taken per
//! channel. Scores lie in `[-1, 1]`; 1 is an exact match up to brightness and
//! contrast.
//!
//! The template is stored zero-mean, so the window mean drops out of the
//! numerator and every numerator comes out of one frequency-domain
//! cross-correlation. Window variances come from integral images. The
//! region's spectrum is computed once in [`PreparedRegion`] and shared by all
//! templates of a scan.

use std::sync::Arc;

use image::{ImageBuffer, Luma, Rgb};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::Image;

/// Score surface; pixel `(x, y)` is the score of the template placed with its
/// top-left corner at `(x, y)` in the region.
pub type HeatMap = ImageBuffer<Luma<f32>, Vec<f32>>;

type Integral = ImageBuffer<Rgb<u64>, Vec<u64>>;

/// Template pixels with the per-channel mean removed.
#[derive(Debug, Clone)]
pub struct Centered {
    width: u32,
    height: u32,
    values: Vec<[f64; 3]>,
    /// Σ (T - mean T)² over all channels.
    energy: f64,
}

impl Centered {
    pub fn new(template: Image) -> Self {
        let (width, height) = (template.width(), template.height());
        let n = (width * height).max(1) as f64;

        let mut mean = [0.0f64; 3];
        for y in 0..height {
            for px in template.row(y) {
                for (m, c) in mean.iter_mut().zip(px.channels()) {
                    *m += c;
                }
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut energy = 0.0;
        let mut values = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for px in template.row(y) {
                let c = px.channels();
                let v = [c[0] - mean[0], c[1] - mean[1], c[2] - mean[2]];
                energy += v.iter().map(|v| v * v).sum::<f64>();
                values.push(v);
            }
        }

        Self {
            width,
            height,
            values,
            energy,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` when every pixel has the same color, which can never correlate.
    pub fn is_flat(&self) -> bool {
        self.energy <= f64::EPSILON
    }
}

/// 2D transforms of one fixed size.
///
/// Spectra are kept transposed (column-major) between `forward` and
/// `inverse`, which saves a transpose per direction.
struct Plan2d {
    width: usize,
    height: usize,
    forward_rows: Arc<dyn Fft<f64>>,
    forward_cols: Arc<dyn Fft<f64>>,
    inverse_rows: Arc<dyn Fft<f64>>,
    inverse_cols: Arc<dyn Fft<f64>>,
}

impl Plan2d {
    fn new(width: usize, height: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            width,
            height,
            forward_rows: planner.plan_fft_forward(width),
            forward_cols: planner.plan_fft_forward(height),
            inverse_rows: planner.plan_fft_inverse(width),
            inverse_cols: planner.plan_fft_inverse(height),
        }
    }

    fn forward(&self, mut data: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        self.forward_rows.process(&mut data);
        let mut spectrum = transpose(&data, self.width, self.height);
        self.forward_cols.process(&mut spectrum);
        spectrum
    }

    /// Unnormalized: the result is scaled by `width * height`.
    fn inverse(&self, mut spectrum: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        self.inverse_cols.process(&mut spectrum);
        let mut data = transpose(&spectrum, self.height, self.width);
        self.inverse_rows.process(&mut data);
        data
    }
}

fn transpose(src: &[Complex<f64>], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::default(); src.len()];
    for (y, row) in src.chunks_exact(width).enumerate() {
        for (x, v) in row.iter().enumerate() {
            out[x * height + y] = *v;
        }
    }
    out
}

/// A captured region ready to be matched against any number of templates.
pub struct PreparedRegion {
    width: u32,
    height: u32,
    integral: Integral,
    integral_sq: Integral,
    plan: Plan2d,
    /// Per-channel spectra of the region with its mean removed.
    spectra: [Vec<Complex<f64>>; 3],
}

impl PreparedRegion {
    /// `None` for an empty region.
    pub fn new(region: Image) -> Option<Self> {
        if region.is_empty() {
            return None;
        }
        let (width, height) = (region.width(), region.height());
        let rgb = region.to_rgb_image();
        let integral = integral_image::<_, u64>(&rgb);
        let integral_sq = integral_squared_image::<_, u64>(&rgb);
        let plan = Plan2d::new(width as usize, height as usize);

        let n = (width as u64 * height as u64) as f64;
        let totals = sum_image_pixels(&integral, 0, 0, width - 1, height - 1);
        let spectra = std::array::from_fn(|c| {
            // Any per-channel offset cancels against the zero-mean template.
            let mean = totals[c] as f64 / n;
            let data = rgb
                .pixels()
                .map(|p| Complex::new(p.0[c] as f64 - mean, 0.0))
                .collect();
            plan.forward(data)
        });

        Some(Self {
            width,
            height,
            integral,
            integral_sq,
            plan,
            spectra,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Σ (I - mean I)² over the window, all channels.
    fn variance_sum(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let (right, bottom) = (x + w - 1, y + h - 1);
        let s = sum_image_pixels(&self.integral, x, y, right, bottom);
        let s2 = sum_image_pixels(&self.integral_sq, x, y, right, bottom);
        let n = w as u64 * h as u64;

        // n·Σv² - (Σv)² is exact in integers and never negative.
        let total = (0..3).map(|c| (n * s2[c] - s[c] * s[c]) as f64).sum::<f64>();
        total / n as f64
    }

    /// Σ I·T for every placement, row-major over the whole region and scaled
    /// by the region's pixel count. Only placements where the template fits
    /// are meaningful; the rest wrap around.
    fn cross_correlate(&self, template: &Centered) -> Vec<Complex<f64>> {
        let width = self.width as usize;
        let tw = template.width as usize;
        let len = width * self.height as usize;

        let mut acc = vec![Complex::default(); len];
        for (c, region) in self.spectra.iter().enumerate() {
            let mut padded = vec![Complex::default(); len];
            for (i, v) in template.values.iter().enumerate() {
                padded[(i / tw) * width + i % tw] = Complex::new(v[c], 0.0);
            }
            let spectrum = self.plan.forward(padded);
            for ((a, r), t) in acc.iter_mut().zip(region).zip(&spectrum) {
                *a += *r * t.conj();
            }
        }
        self.plan.inverse(acc)
    }

    /// Score every placement of `template` inside this region.
    ///
    /// Returns `None` when the template does not fit. Placements over a
    /// flat window, or a flat template, score 0.
    pub fn match_template(&self, template: &Centered) -> Option<HeatMap> {
        let (tw, th) = (template.width, template.height);
        if tw == 0 || th == 0 || self.width < tw || self.height < th {
            return None;
        }

        let out_w = self.width - tw + 1;
        let out_h = self.height - th + 1;
        let mut heat = HeatMap::new(out_w, out_h);
        if template.is_flat() {
            return Some(heat);
        }

        let cross = self.cross_correlate(template);
        let norm = (self.width as f64) * (self.height as f64);
        for y in 0..out_h {
            for x in 0..out_w {
                let variance = self.variance_sum(x, y, tw, th);
                let denom = (variance * template.energy).sqrt();
                if denom <= 1e-6 {
                    continue;
                }

                let numerator = cross[(y * self.width + x) as usize].re / norm;
                heat.put_pixel(x, y, Luma([(numerator / denom).clamp(-1.0, 1.0) as f32]));
            }
        }

        Some(heat)
    }
}

/// Score every placement of `template` inside `region`.
///
/// Convenience for a single template; scanning many templates should share
/// one [`PreparedRegion`].
pub fn match_template(region: Image, template: &Centered) -> Option<HeatMap> {
    PreparedRegion::new(region)?.match_template(template)
}
