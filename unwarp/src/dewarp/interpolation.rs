//! Sub-pixel sampling with zero fill outside the image.

use common::Buffer2;

use crate::config::InterpolationMethod;

/// Catmull-Rom cubic convolution kernel (`a = -0.5`).
#[inline]
pub(crate) fn bicubic_kernel(x: f32) -> f32 {
    const A: f32 = -0.5;

    let abs_x = x.abs();
    if abs_x <= 1.0 {
        ((A + 2.0) * abs_x - (A + 3.0)) * abs_x * abs_x + 1.0
    } else if abs_x < 2.0 {
        ((A * abs_x - 5.0 * A) * abs_x + 8.0 * A) * abs_x - 4.0 * A
    } else {
        0.0
    }
}

#[inline]
fn sample_pixel(data: &Buffer2<f32>, row: i64, col: i64) -> f32 {
    if row < 0 || col < 0 || row >= data.height() as i64 || col >= data.width() as i64 {
        0.0
    } else {
        data[(row as usize, col as usize)]
    }
}

#[inline]
fn interpolate_bilinear(data: &Buffer2<f32>, row: f64, col: f64) -> f32 {
    let r0 = row.floor();
    let c0 = col.floor();
    let fr = (row - r0) as f32;
    let fc = (col - c0) as f32;
    let (r0, c0) = (r0 as i64, c0 as i64);

    let p00 = sample_pixel(data, r0, c0);
    let p01 = sample_pixel(data, r0, c0 + 1);
    let p10 = sample_pixel(data, r0 + 1, c0);
    let p11 = sample_pixel(data, r0 + 1, c0 + 1);

    let top = p00 + fc * (p01 - p00);
    let bottom = p10 + fc * (p11 - p10);
    top + fr * (bottom - top)
}

fn interpolate_bicubic(data: &Buffer2<f32>, row: f64, col: f64) -> f32 {
    let r0 = row.floor();
    let c0 = col.floor();
    let fr = (row - r0) as f32;
    let fc = (col - c0) as f32;
    let (r0, c0) = (r0 as i64, c0 as i64);

    let wr = [
        bicubic_kernel(fr + 1.0),
        bicubic_kernel(fr),
        bicubic_kernel(fr - 1.0),
        bicubic_kernel(fr - 2.0),
    ];
    let wc = [
        bicubic_kernel(fc + 1.0),
        bicubic_kernel(fc),
        bicubic_kernel(fc - 1.0),
        bicubic_kernel(fc - 2.0),
    ];

    let mut sum = 0.0;
    for (j, &w_row) in wr.iter().enumerate() {
        let r = r0 - 1 + j as i64;
        for (i, &w_col) in wc.iter().enumerate() {
            let c = c0 - 1 + i as i64;
            sum += sample_pixel(data, r, c) * w_row * w_col;
        }
    }
    sum
}

/// Sample `data` at `(row, col)`; samples outside the image read as 0.
#[inline]
pub fn interpolate(data: &Buffer2<f32>, row: f64, col: f64, method: InterpolationMethod) -> f32 {
    match method {
        InterpolationMethod::Bilinear => interpolate_bilinear(data, row, col),
        InterpolationMethod::Bicubic => interpolate_bicubic(data, row, col),
    }
}
