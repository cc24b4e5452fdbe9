//! Zero-crossing estimate from aggregated score points.
//!
//! A least-squares line is fitted through the (x, score) points; its
//! x-intercept is the RAPD estimate in log units. A non-negative intercept
//! points to the right eye (OD), a negative one to the left eye (OS).

use std::fmt;

use thiserror::Error;

use crate::processors::aggregation::ScorePoint;

/// Errors that can occur while fitting the score line.
#[derive(Debug, Error, PartialEq)]
pub enum RegressionError {
    #[error("no score points to fit")]
    NoPoints,

    #[error("score line is flat (slope {slope}), no zero crossing")]
    FlatFit { slope: f64 },
}

/// Eye indicated by the sign of the zero crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Laterality {
    /// Oculus dexter.
    RightEye,
    /// Oculus sinister.
    LeftEye,
}

impl Laterality {
    pub fn from_crossing(x_intercept: f64) -> Self {
        if x_intercept >= 0.0 {
            Laterality::RightEye
        } else {
            Laterality::LeftEye
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            Laterality::RightEye => "OD",
            Laterality::LeftEye => "OS",
        }
    }
}

impl fmt::Display for Laterality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Laterality::RightEye => write!(f, "OD (Right Eye)"),
            Laterality::LeftEye => write!(f, "OS (Left Eye)"),
        }
    }
}

/// Outcome of the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RapdEstimate {
    /// Only one x value was observed; no line can be fitted.
    SinglePoint { x: f64, score: f64 },
    Fitted {
        slope: f64,
        intercept: f64,
        x_intercept: f64,
    },
}

impl RapdEstimate {
    /// Zero crossing of the fitted line, if any.
    pub fn x_intercept(&self) -> Option<f64> {
        match self {
            RapdEstimate::Fitted { x_intercept, .. } => Some(*x_intercept),
            RapdEstimate::SinglePoint { .. } => None,
        }
    }

    pub fn laterality(&self) -> Option<Laterality> {
        self.x_intercept().map(Laterality::from_crossing)
    }

    /// Line value at `x`, if fitted.
    pub fn predict(&self, x: f64) -> Option<f64> {
        match self {
            RapdEstimate::Fitted {
                slope, intercept, ..
            } => Some(slope * x + intercept),
            RapdEstimate::SinglePoint { .. } => None,
        }
    }
}

/// Ordinary least-squares `(slope, intercept)`.
///
/// Returns `None` with fewer than two points or when all x are equal.
pub fn linear_fit(points: &[ScorePoint]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let dx = p.x - mean_x;
        sxx += dx * dx;
        sxy += dx * (p.y - mean_y);
    }

    if sxx.abs() < f64::EPSILON {
        return None;
    }

    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// Estimate the RAPD zero crossing from aggregated points.
pub fn estimate(points: &[ScorePoint]) -> Result<RapdEstimate, RegressionError> {
    match points {
        [] => Err(RegressionError::NoPoints),
        [only] => Ok(RapdEstimate::SinglePoint {
            x: only.x,
            score: only.y,
        }),
        _ => {
            let (slope, intercept) =
                linear_fit(points).ok_or(RegressionError::FlatFit { slope: 0.0 })?;
            if slope == 0.0 {
                return Err(RegressionError::FlatFit { slope });
            }
            Ok(RapdEstimate::Fitted {
                slope,
                intercept,
                x_intercept: -intercept / slope,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> ScorePoint {
        ScorePoint { x, y }
    }

    #[test]
    fn test_exact_line() {
        let points = vec![p(-0.3, -2.0), p(0.0, 1.0), p(0.3, 4.0)];
        let (slope, intercept) = linear_fit(&points).unwrap();
        assert!((slope - 10.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);

        let est = estimate(&points).unwrap();
        assert!((est.x_intercept().unwrap() + 0.1).abs() < 1e-9);
        assert_eq!(est.laterality(), Some(Laterality::LeftEye));
        assert!((est.predict(0.3).unwrap() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_positive_crossing_is_right_eye() {
        let points = vec![p(0.0, -1.0), p(0.6, 5.0)];
        let est = estimate(&points).unwrap();
        assert!((est.x_intercept().unwrap() - 0.1).abs() < 1e-9);
        assert_eq!(est.laterality(), Some(Laterality::RightEye));
        assert_eq!(Laterality::RightEye.abbreviation(), "OD");
    }

    #[test]
    fn test_single_point() {
        let est = estimate(&[p(0.3, 2.5)]).unwrap();
        assert_eq!(est, RapdEstimate::SinglePoint { x: 0.3, score: 2.5 });
        assert_eq!(est.x_intercept(), None);
    }

    #[test]
    fn test_no_points_and_flat() {
        assert_eq!(estimate(&[]), Err(RegressionError::NoPoints));
        assert!(matches!(
            estimate(&[p(0.0, 1.0), p(0.3, 1.0)]),
            Err(RegressionError::FlatFit { .. })
        ));
    }
}
