//! Sub-pixel translation between two image windows.
//!
//! Phase cross-correlation in two stages:
//! 1. Coarse peak of the inverse FFT of the cross-power spectrum
//!    `F_ref * conj(F_mov)`, located to the nearest pixel.
//! 2. Refinement on a `ceil(1.5 * upsample)` square neighbourhood around the
//!    coarse peak, evaluated with a matrix-multiply DFT at `1 / upsample`
//!    pixel resolution instead of zero-padding the whole spectrum.
//!
//! The cross-power spectrum is NOT amplitude-normalised. The raw correlation
//! strength between neighbouring depth planes tracks focus drift, and
//! [`Registration::peak`] reports it.


use std::f64::consts::PI;
use std::sync::Arc;

use common::Buffer2;
use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::error::{Result, UnwarpError};
use crate::geometry::ImageShape;

/// Outcome of registering a moving window onto a reference window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Registration {
    /// Row component of the shift that moves the moving window onto the reference.
    pub row: f64,
    /// Column component of the same shift.
    pub col: f64,
    /// Correlation magnitude at the refined peak, in inverse-FFT scale.
    pub peak: f64,
}

/// Phase correlator for windows of one fixed shape.
///
/// FFT plans are built once and shared, so one registrar can serve every
/// window of a propagation run, also across threads.
pub struct PhaseRegistrar {
    shape: ImageShape,
    row_fft: Arc<dyn Fft<f64>>,
    col_fft: Arc<dyn Fft<f64>>,
    row_ifft: Arc<dyn Fft<f64>>,
    col_ifft: Arc<dyn Fft<f64>>,
}

impl std::fmt::Debug for PhaseRegistrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRegistrar")
            .field("shape", &self.shape)
            .finish()
    }
}

impl PhaseRegistrar {
    pub fn new(shape: ImageShape) -> Result<Self> {
        if shape.is_empty() {
            return Err(UnwarpError::invalid(
                "shape",
                format!("registration window must not be empty, got {}", shape),
            ));
        }

        let mut planner = FftPlanner::new();
        Ok(Self {
            shape,
            row_fft: planner.plan_fft_forward(shape.width),
            col_fft: planner.plan_fft_forward(shape.height),
            row_ifft: planner.plan_fft_inverse(shape.width),
            col_ifft: planner.plan_fft_inverse(shape.height),
        })
    }

    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    /// Estimate the shift that aligns `moving` onto `reference`.
    ///
    /// If the content of `moving` sits `d` pixels further along an axis than
    /// in `reference`, the returned component is `-d`. Accurate to
    /// `1 / upsample_factor` pixel.
    pub fn register(
        &self,
        reference: &Buffer2<f32>,
        moving: &Buffer2<f32>,
        upsample_factor: usize,
    ) -> Result<Registration> {
        self.shape.check(reference)?;
        self.shape.check(moving)?;
        if upsample_factor == 0 {
            return Err(UnwarpError::invalid("upsample_factor", "must be at least 1"));
        }

        let (height, width) = (self.shape.height, self.shape.width);

        let ref_freq = self.fft_2d(reference);
        let mov_freq = self.fft_2d(moving);
        let product: Vec<Complex<f64>> = ref_freq
            .iter()
            .zip(mov_freq.iter())
            .map(|(&a, &b)| a * b.conj())
            .collect();

        let correlation = self.ifft_2d(product.clone());
        let (peak_idx, mut peak) = argmax_norm(&correlation);
        let (peak_row, peak_col) = (peak_idx / width, peak_idx % width);

        let mut shift_row = wrap_shift(peak_row, height);
        let mut shift_col = wrap_shift(peak_col, width);

        if upsample_factor > 1 {
            let factor = upsample_factor as f64;
            shift_row = (shift_row * factor).round() / factor;
            shift_col = (shift_col * factor).round() / factor;

            let region = (factor * 1.5).ceil() as usize;
            let dft_shift = (region as f64 / 2.0).trunc();
            let upsampled = upsampled_correlation(
                &product,
                self.shape,
                region,
                factor,
                (dft_shift - shift_row * factor, dft_shift - shift_col * factor),
            );

            let (up_idx, up_peak) = argmax_norm(&upsampled);
            shift_row += ((up_idx / region) as f64 - dft_shift) / factor;
            shift_col += ((up_idx % region) as f64 - dft_shift) / factor;
            // Matrix DFT skips the 1/N of the inverse FFT.
            peak = up_peak / (height * width) as f64;
        }

        // A singleton axis carries no shift information.
        if height == 1 {
            shift_row = 0.0;
        }
        if width == 1 {
            shift_col = 0.0;
        }

        Ok(Registration {
            row: shift_row,
            col: shift_col,
            peak,
        })
    }

    /// 2D FFT by rows, then columns (via transpose).
    fn fft_2d(&self, image: &Buffer2<f32>) -> Vec<Complex<f64>> {
        let (height, width) = (self.shape.height, self.shape.width);
        let mut data: Vec<Complex<f64>> = image
            .iter()
            .map(|&v| Complex::new(v as f64, 0.0))
            .collect();

        // process() runs the plan over every `width`-long chunk
        self.row_fft.process(&mut data);
        let mut columns = transpose(&data, height, width);
        self.col_fft.process(&mut columns);
        transpose(&columns, width, height)
    }

    /// Inverse 2D FFT, normalised by `1 / (height * width)`.
    fn ifft_2d(&self, mut data: Vec<Complex<f64>>) -> Vec<Complex<f64>> {
        let (height, width) = (self.shape.height, self.shape.width);

        self.row_ifft.process(&mut data);
        let mut columns = transpose(&data, height, width);
        self.col_ifft.process(&mut columns);
        let mut out = transpose(&columns, width, height);

        let norm = 1.0 / (height * width) as f64;
        out.iter_mut().for_each(|c| *c *= norm);
        out
    }
}

/// Register two equally sized windows with a one-off registrar.
pub fn register(
    reference: &Buffer2<f32>,
    moving: &Buffer2<f32>,
    upsample_factor: usize,
) -> Result<Registration> {
    PhaseRegistrar::new(ImageShape::of(reference))?.register(reference, moving, upsample_factor)
}

/// Peak index to signed shift: indices past the midpoint wrap to negative.
#[inline]
fn wrap_shift(peak: usize, n: usize) -> f64 {
    if peak > n / 2 {
        peak as f64 - n as f64
    } else {
        peak as f64
    }
}

/// Index and magnitude of the first largest-magnitude sample.
fn argmax_norm(data: &[Complex<f64>]) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, c) in data.iter().enumerate() {
        let v = c.norm();
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    (best_idx, best)
}

/// Out-of-place transpose of a `rows x cols` row-major matrix.
fn transpose(data: &[Complex<f64>], rows: usize, cols: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// Signed frequency of DFT bin `k` of an `n`-point transform, in cycles per sample.
#[inline]
fn bin_frequency(k: usize, n: usize) -> f64 {
    let signed = if k < n.div_ceil(2) {
        k as f64
    } else {
        k as f64 - n as f64
    };
    signed / n as f64
}

/// Kernel `exp(+2*pi*i * (u - offset) * f_k / factor)` as a `region x n` matrix.
fn dft_kernel(n: usize, region: usize, factor: f64, offset: f64) -> Vec<Complex<f64>> {
    let mut kernel = Vec::with_capacity(region * n);
    for u in 0..region {
        let pos = u as f64 - offset;
        for k in 0..n {
            let phase = 2.0 * PI * pos * bin_frequency(k, n) / factor;
            kernel.push(Complex::from_polar(1.0, phase));
        }
    }
    kernel
}

/// Inverse DFT of `spectrum` sampled on a `region x region` patch with
/// spacing `1 / factor`, whose first sample sits at `-offset / factor` pixels.
///
/// Evaluated separably: columns first (`height x region`), then rows.
fn upsampled_correlation(
    spectrum: &[Complex<f64>],
    shape: ImageShape,
    region: usize,
    factor: f64,
    offset: (f64, f64),
) -> Vec<Complex<f64>> {
    let (height, width) = (shape.height, shape.width);
    let col_kernel = dft_kernel(width, region, factor, offset.1);
    let row_kernel = dft_kernel(height, region, factor, offset.0);

    let mut partial = vec![Complex::new(0.0, 0.0); height * region];
    for k0 in 0..height {
        let spectrum_row = &spectrum[k0 * width..(k0 + 1) * width];
        for u1 in 0..region {
            let kernel_row = &col_kernel[u1 * width..(u1 + 1) * width];
            partial[k0 * region + u1] = kernel_row
                .iter()
                .zip(spectrum_row)
                .map(|(&k, &s)| k * s)
                .sum();
        }
    }

    let mut out = vec![Complex::new(0.0, 0.0); region * region];
    for u0 in 0..region {
        let kernel_row = &row_kernel[u0 * height..(u0 + 1) * height];
        for (k0, &k) in kernel_row.iter().enumerate() {
            let partial_row = &partial[k0 * region..(k0 + 1) * region];
            let out_row = &mut out[u0 * region..(u0 + 1) * region];
            for (o, &p) in out_row.iter_mut().zip(partial_row) {
                *o += k * p;
            }
        }
    }
    out
}
