//! Separable cubic-convolution resampling.
//!
//! Uses the Keys kernel with `a = -0.5`. Sampling is corner-aligned: output
//! sample `i` of `out` reads source position `i * (in - 1) / (out - 1)`, so
//! the first and last samples of each axis are reproduced exactly. Taps past
//! the edge are clamped to the nearest edge sample.

use crate::{DemError, Result};
use rayon::prelude::*;

const KEYS_A: f64 = -0.5;

/// Keys cubic convolution kernel.
fn keys_kernel(x: f64) -> f64 {
    let x = x.abs();
    if x <= 1.0 {
        (KEYS_A + 2.0) * x * x * x - (KEYS_A + 3.0) * x * x + 1.0
    } else if x < 2.0 {
        KEYS_A * x * x * x - 5.0 * KEYS_A * x * x + 8.0 * KEYS_A * x - 4.0 * KEYS_A
    } else {
        0.0
    }
}

/// Four source indices and weights contributing to one output sample.
#[derive(Debug, Clone, Copy)]
struct Taps {
    index: [usize; 4],
    weight: [f64; 4],
}

fn axis_taps(input: usize, output: usize) -> Vec<Taps> {
    let last = input as isize - 1;
    (0..output)
        .map(|i| {
            let src = if output > 1 {
                i as f64 * (input - 1) as f64 / (output - 1) as f64
            } else {
                0.0
            };
            let base = src.floor();
            let t = src - base;
            let base = base as isize;

            let mut taps = Taps {
                index: [0; 4],
                weight: [0.0; 4],
            };
            for k in 0..4 {
                let offset = k as isize - 1;
                taps.index[k] = (base + offset).clamp(0, last) as usize;
                taps.weight[k] = keys_kernel(t - offset as f64);
            }
            taps
        })
        .collect()
}

/// Resample a row-major grid to `out_rows x out_cols`.
///
/// Works for both up- and downsampling. A one-sample axis replicates its
/// value across the output.
pub fn resample_cubic(
    data: &[f32],
    rows: usize,
    cols: usize,
    out_rows: usize,
    out_cols: usize,
) -> Result<Vec<f32>> {
    if rows == 0 || cols == 0 || data.len() != rows * cols {
        return Err(DemError::ShapeMismatch {
            rows,
            cols,
            len: data.len(),
        });
    }
    if out_rows == 0 || out_cols == 0 {
        return Err(DemError::InvalidGridSize(out_rows.min(out_cols)));
    }
    if rows == out_rows && cols == out_cols {
        return Ok(data.to_vec());
    }

    let col_taps = axis_taps(cols, out_cols);
    let row_taps = axis_taps(rows, out_rows);

    // Horizontal pass: rows x out_cols
    let mut horizontal = vec![0.0f64; rows * out_cols];
    horizontal
        .par_chunks_mut(out_cols)
        .enumerate()
        .for_each(|(r, out_row)| {
            let src_row = &data[r * cols..(r + 1) * cols];
            for (out, taps) in out_row.iter_mut().zip(&col_taps) {
                *out = (0..4)
                    .map(|k| src_row[taps.index[k]] as f64 * taps.weight[k])
                    .sum();
            }
        });

    // Vertical pass: out_rows x out_cols
    let mut output = vec![0.0f32; out_rows * out_cols];
    output
        .par_chunks_mut(out_cols)
        .zip(row_taps.par_iter())
        .for_each(|(out_row, taps)| {
            for (c, out) in out_row.iter_mut().enumerate() {
                let value: f64 = (0..4)
                    .map(|k| horizontal[taps.index[k] * out_cols + c] * taps.weight[k])
                    .sum();
                *out = value as f32;
            }
        });

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_partition_of_unity() {
        for t in [0.0, 0.1, 0.25, 0.5, 0.9] {
            let sum: f64 = (-1..=2).map(|k| keys_kernel(t - k as f64)).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
        assert_eq!(keys_kernel(0.0), 1.0);
        assert_eq!(keys_kernel(1.0), 0.0);
        assert_eq!(keys_kernel(2.5), 0.0);
    }

    #[test]
    fn test_same_shape_is_identity() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        assert_eq!(resample_cubic(&data, 3, 4, 3, 4).unwrap(), data);
    }

    #[test]
    fn test_constant_stays_constant() {
        let data = vec![42.0f32; 7 * 5];
        for (r, c) in [(16, 16), (3, 3), (1, 9)] {
            let out = resample_cubic(&data, 7, 5, r, c).unwrap();
            assert_eq!(out.len(), r * c);
            for v in out {
                assert_relative_eq!(v, 42.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_corners_preserved() {
        let data: Vec<f32> = (0..20).map(|v| (v * v) as f32).collect();
        let out = resample_cubic(&data, 4, 5, 9, 13).unwrap();
        assert_relative_eq!(out[0], data[0], epsilon = 1e-4);
        assert_relative_eq!(out[12], data[4], epsilon = 1e-4);
        assert_relative_eq!(out[8 * 13], data[15], epsilon = 1e-3);
        assert_relative_eq!(out[9 * 13 - 1], data[19], epsilon = 1e-3);
    }

    #[test]
    fn test_two_sample_midpoint() {
        let out = resample_cubic(&[0.0, 10.0], 1, 2, 1, 5).unwrap();
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(out[2], 5.0, epsilon = 1e-6);
        assert_relative_eq!(out[4], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_interior_ramp_is_linear() {
        let data: Vec<f32> = (0..10).map(|v| v as f32).collect();
        // src = i / 2, so output 9 samples position 4.5
        let out = resample_cubic(&data, 1, 10, 1, 19).unwrap();
        assert_relative_eq!(out[9], 4.5, epsilon = 1e-5);
        assert_relative_eq!(out[7], 3.5, epsilon = 1e-5);
    }

    #[test]
    fn test_single_pixel_replicates() {
        let out = resample_cubic(&[17.0], 1, 1, 4, 4).unwrap();
        assert_eq!(out, vec![17.0; 16]);
    }

    #[test]
    fn test_downsample() {
        let data: Vec<f32> = (0..64 * 64).map(|v| (v % 64) as f32).collect();
        let out = resample_cubic(&data, 64, 64, 8, 8).unwrap();
        assert_eq!(out.len(), 64);
        assert_relative_eq!(out[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(out[7], 63.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rejects_bad_shape() {
        assert!(resample_cubic(&[1.0; 5], 2, 2, 4, 4).is_err());
        assert!(resample_cubic(&[1.0; 4], 2, 2, 0, 4).is_err());
    }
}
