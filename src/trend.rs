//! Ordinary-least-squares trend fits over time series.
//!
//! One descriptive statistic per series, nothing more: slope, intercept,
//! Pearson r, and the slope's standard error. Pure functions of their input.

use serde::Serialize;

use crate::error::InsufficientDataError;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub n: usize,
    pub std_err: f64,
}

/// Fit y = slope * x + intercept over (x, y) pairs.
///
/// Non-finite pairs are ignored. Fewer than 2 usable points, or points that
/// all share one x (no slope is identifiable), fail with
/// [`InsufficientDataError`].
pub fn fit(points: &[(f64, f64)]) -> Result<TrendResult, InsufficientDataError> {
    let usable: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    let n = usable.len();
    if n < 2 {
        return Err(InsufficientDataError { points: n });
    }

    let nf = n as f64;
    let mean_x = usable.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = usable.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    let mut ss_xy = 0.0;
    for (x, y) in &usable {
        let dx = x - mean_x;
        let dy = y - mean_y;
        ss_xx += dx * dx;
        ss_yy += dy * dy;
        ss_xy += dx * dy;
    }

    if ss_xx == 0.0 {
        return Err(InsufficientDataError { points: n });
    }

    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;

    // Constant y: the fit is exact with slope 0.
    let r_value = if ss_yy == 0.0 { 1.0 } else { ss_xy / (ss_xx * ss_yy).sqrt() };

    let std_err = if n > 2 {
        let residual = (ss_yy - slope * ss_xy).max(0.0);
        (residual / (nf - 2.0) / ss_xx).sqrt()
    } else {
        0.0
    };

    Ok(TrendResult { slope, intercept, r_value, n, std_err })
}

/// Fit one series of (unix seconds, value) points. The x axis is seconds
/// since the first sample, so the intercept reads as the fitted value at the
/// start of the series.
pub fn fit_series(points: &[(u64, f64)]) -> Result<TrendResult, InsufficientDataError> {
    let t0 = points.iter().map(|(ts, _)| *ts).min().unwrap_or(0);
    let shifted: Vec<(f64, f64)> =
        points.iter().map(|(ts, v)| ((ts - t0) as f64, *v)).collect();
    fit(&shifted)
}

/// Pearson correlation of two equal-length series. `None` when lengths
/// differ, fewer than 2 points, or either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let mut ss_aa = 0.0;
    let mut ss_bb = 0.0;
    let mut ss_ab = 0.0;
    for (x, y) in a.iter().zip(b) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        ss_aa += dx * dx;
        ss_bb += dy * dy;
        ss_ab += dx * dy;
    }
    if ss_aa == 0.0 || ss_bb == 0.0 {
        return None;
    }
    Some(ss_ab / (ss_aa * ss_bb).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_line() {
        let r = fit(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]).unwrap();
        assert_eq!(r.slope, 1.0);
        assert_eq!(r.intercept, 0.0);
        assert_eq!(r.r_value, 1.0);
        assert_eq!(r.n, 3);
    }

    #[test]
    fn too_few_points() {
        let err = fit(&[(0.0, 1.0)]).unwrap_err();
        assert_eq!(err.points, 1);
        assert!(fit(&[]).is_err());
    }

    #[test]
    fn zero_x_variance_is_insufficient() {
        assert!(fit(&[(5.0, 1.0), (5.0, 2.0)]).is_err());
    }

    #[test]
    fn non_finite_pairs_are_ignored() {
        let r = fit(&[(0.0, 0.0), (1.0, f64::NAN), (1.0, 1.0), (2.0, 2.0)]).unwrap();
        assert_eq!(r.n, 3);
        assert_eq!(r.slope, 1.0);
    }

    #[test]
    fn constant_y_is_an_exact_flat_fit() {
        let r = fit(&[(0.0, 7.0), (1.0, 7.0), (2.0, 7.0)]).unwrap();
        assert_eq!(r.slope, 0.0);
        assert_eq!(r.intercept, 7.0);
        assert_eq!(r.r_value, 1.0);
    }

    #[test]
    fn noisy_line_recovers_slope() {
        let pts: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let x = i as f64;
                let noise = if i % 2 == 0 { 0.1 } else { -0.1 };
                (x, 3.0 * x + 2.0 + noise)
            })
            .collect();
        let r = fit(&pts).unwrap();
        assert!((r.slope - 3.0).abs() < 0.01, "slope {}", r.slope);
        assert!((r.intercept - 2.0).abs() < 0.15, "intercept {}", r.intercept);
        assert!(r.r_value > 0.999);
        assert!(r.std_err > 0.0);
    }

    #[test]
    fn negative_trend_has_negative_r() {
        let r = fit(&[(0.0, 10.0), (1.0, 8.0), (2.0, 6.1)]).unwrap();
        assert!(r.slope < 0.0);
        assert!(r.r_value < -0.99);
    }

    #[test]
    fn series_fit_shifts_to_first_sample() {
        let base = 1_676_923_200u64;
        let pts: Vec<(u64, f64)> = (0..4).map(|d| (base + d * 86_400, 5.0 + d as f64)).collect();
        let r = fit_series(&pts).unwrap();
        assert!((r.slope - 1.0 / 86_400.0).abs() < 1e-12);
        assert!((r.intercept - 5.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_matches_fit_r() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 2.9, 5.2, 6.8];
        let r = fit(&xs.iter().copied().zip(ys.iter().copied()).collect::<Vec<_>>()).unwrap();
        let p = pearson(&xs, &ys).unwrap();
        assert!((r.r_value - p).abs() < 1e-12);
    }

    #[test]
    fn pearson_rejects_mismatched_or_flat_input() {
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_none());
        assert!(pearson(&[1.0, 1.0], &[1.0, 2.0]).is_none());
    }
}
