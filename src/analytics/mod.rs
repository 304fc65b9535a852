//! Pure computations over enriched score rows. Nothing here touches the
//! database; handlers and jobs load [`ScoreRecord`](crate::models::score::ScoreRecord)s
//! and hand them over.

pub mod leaderboard;
pub mod summary;

/// Rounds to two decimals, the precision every average is reported with.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Fewer than two samples
/// have no spread and yield 0.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_dev_of_known_series() {
        let sd = sample_std_dev(&[100.0, 50.0, 100.0]);
        assert!((sd - 28.8675).abs() < 1e-3);
    }

    #[test]
    fn std_dev_needs_two_samples() {
        assert_eq!(sample_std_dev(&[]), 0.0);
        assert_eq!(sample_std_dev(&[42.0]), 0.0);
    }

    #[test]
    fn rounding() {
        assert_eq!(round2(83.33333), 83.33);
        assert_eq!(round2(7.5), 7.5);
    }
}
