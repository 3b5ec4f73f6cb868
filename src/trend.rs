//! Per-student trend calculation.
//!
//! A student's non-missing scores in a feature group, taken in column order,
//! form a short time series. The trend is the slope of the least-squares line
//! fit against index positions 0..n-1.

use crate::models::ImprovementStatus;

/// Least-squares slope of `scores` against their index positions. Fewer than
/// two points give no usable regression; the slope is reported as 0.0 so the
/// student labels as Stable rather than aborting the run.
pub fn trend(scores: &[f64]) -> f64 {
    let n = scores.len();
    if n < 2 {
        return 0.0;
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = scores.iter().sum::<f64>() / n_f;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (i, &y) in scores.iter().enumerate() {
        let dx = i as f64 - x_mean;
        covariance += dx * (y - y_mean);
        variance += dx * dx;
    }

    covariance / variance
}

/// Tie-break at exactly zero goes to Stable.
pub fn improvement_status(trend: f64) -> ImprovementStatus {
    if trend > 0.0 {
        ImprovementStatus::Improving
    } else if trend < 0.0 {
        ImprovementStatus::Declining
    } else {
        ImprovementStatus::Stable
    }
}

/// Trend of the non-missing values of a row slice, preserving column order.
pub fn trend_of_row(cells: &[Option<f64>]) -> f64 {
    let present: Vec<f64> = cells.iter().flatten().copied().collect();
    trend(&present)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_scores_are_improving() {
        let slope = trend(&[60.0, 70.0, 80.0]);
        assert!(slope > 0.0);
        assert_eq!(improvement_status(slope), ImprovementStatus::Improving);
    }

    #[test]
    fn decreasing_scores_are_declining() {
        let slope = trend(&[80.0, 70.0, 60.0]);
        assert!(slope < 0.0);
        assert_eq!(improvement_status(slope), ImprovementStatus::Declining);
    }

    #[test]
    fn flat_scores_are_stable() {
        let slope = trend(&[70.0, 70.0, 70.0]);
        assert_eq!(slope, 0.0);
        assert_eq!(improvement_status(slope), ImprovementStatus::Stable);
    }

    #[test]
    fn slope_matches_least_squares_fit() {
        // y = 2x + 1 exactly
        let slope = trend(&[1.0, 3.0, 5.0, 7.0]);
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn fewer_than_two_points_default_to_stable() {
        assert_eq!(trend(&[]), 0.0);
        assert_eq!(trend(&[85.0]), 0.0);
        assert_eq!(improvement_status(trend(&[85.0])), ImprovementStatus::Stable);
    }

    #[test]
    fn missing_cells_are_skipped_in_order() {
        let slope = trend_of_row(&[Some(60.0), None, Some(70.0), Some(80.0)]);
        assert!(slope > 0.0);
    }
}
