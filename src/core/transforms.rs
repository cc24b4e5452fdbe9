//! Numeric signal primitives shared by the processing stages.
//!
//! This module provides the non-causal Gaussian smoother applied to the pupil
//! channels, linear gap filling over the timestamp axis, and first-occurrence
//! extremum search over sample windows.

/// Compute the normalized 1-D Gaussian kernel for `sigma` (in samples).
///
/// The kernel radius is `floor(truncate * sigma + 0.5)`, so the returned
/// vector has `2 * radius + 1` taps that sum to one.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5).floor().max(0.0) as usize;
    let denom = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let k = i as f64 - radius as f64;
            (-(k * k) / denom).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// Map an out-of-range position onto the signal by half-sample symmetric
/// reflection (`d c b a | a b c d | d c b a`).
#[inline]
fn reflect_index(j: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = j.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Smooth `data` with a Gaussian kernel using reflected boundaries.
///
/// The filter is centred, so every output depends on samples on both sides.
/// Output length always equals input length; a constant input is returned
/// unchanged up to rounding. A non-positive `sigma` returns a copy.
pub fn gaussian_filter1d(data: &[f64], sigma: f64, truncate: f64) -> Vec<f64> {
    let n = data.len();
    if n == 0 || sigma <= 0.0 {
        return data.to_vec();
    }

    let kernel = gaussian_kernel(sigma, truncate);
    let radius = (kernel.len() / 2) as isize;

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| w * data[reflect_index(i + k as isize - radius, n)])
                .sum()
        })
        .collect()
}

/// Replace every value equal to `invalid` by linear interpolation in `times`
/// between the nearest valid neighbours.
///
/// Leading or trailing invalid runs (no neighbour on one side) take the
/// nearest valid value. If nothing is valid the input is returned as-is.
pub fn interpolate_gaps(times: &[f64], values: &[f64], invalid: f64) -> Vec<f64> {
    debug_assert_eq!(times.len(), values.len(), "times and values must align");

    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v != invalid)
        .map(|(i, _)| i)
        .collect();

    if valid.is_empty() || valid.len() == values.len() {
        return values.to_vec();
    }

    let mut out = values.to_vec();
    // Index into `valid` of the first valid sample at or after position i
    let mut next = 0usize;

    for i in 0..values.len() {
        if values[i] != invalid {
            next += 1;
            continue;
        }

        let before = if next > 0 { Some(valid[next - 1]) } else { None };
        let after = valid.get(next).copied();

        out[i] = match (before, after) {
            (Some(a), Some(b)) => {
                let span = times[b] - times[a];
                if span.abs() < f64::EPSILON {
                    values[a]
                } else {
                    let t = (times[i] - times[a]) / span;
                    values[a] + t * (values[b] - values[a])
                }
            }
            (Some(a), None) => values[a],
            (None, Some(b)) => values[b],
            (None, None) => values[i],
        };
    }

    out
}

/// Maximum of `data[range]` and the absolute index of its first occurrence.
///
/// Returns `None` for an empty range.
pub fn window_max(data: &[f64], start: usize, end: usize) -> Option<(f64, usize)> {
    let end = end.min(data.len());
    if start >= end {
        return None;
    }

    let mut best = (data[start], start);
    for (i, &v) in data[start..end].iter().enumerate().skip(1) {
        if v > best.0 {
            best = (v, start + i);
        }
    }
    Some(best)
}

/// Minimum of `data[range]` and the absolute index of its first occurrence.
///
/// Returns `None` for an empty range.
pub fn window_min(data: &[f64], start: usize, end: usize) -> Option<(f64, usize)> {
    let end = end.min(data.len());
    if start >= end {
        return None;
    }

    let mut best = (data[start], start);
    for (i, &v) in data[start..end].iter().enumerate().skip(1) {
        if v < best.0 {
            best = (v, start + i);
        }
    }
    Some(best)
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
