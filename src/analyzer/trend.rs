//! Week-over-week and rolling-window trend computation.

/// Percentage change of `current` against the immediately prior value,
/// rounded to one decimal.
///
/// `None` when there is no prior value or the prior value is zero: a delta
/// against nothing is undefined, not infinite.
pub fn delta_pct(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 => {
            Some(((current - prev) / prev * 1000.0).round() / 10.0)
        }
        _ => None,
    }
}

/// Mean of a metric over up to the last `window` observations, the current
/// value included.
///
/// Uses however many prior values actually exist; a short history shrinks
/// the window instead of disabling it.
pub fn rolling_average(previous: &[f64], current: f64, window: usize) -> f64 {
    let take = window.saturating_sub(1).min(previous.len());
    let tail = &previous[previous.len() - take..];
    let sum: f64 = tail.iter().sum::<f64>() + current;
    sum / (take + 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_positive_change() {
        assert_eq!(delta_pct(110.0, Some(100.0)), Some(10.0));
    }

    #[test]
    fn delta_negative_change() {
        assert_eq!(delta_pct(80.0, Some(100.0)), Some(-20.0));
    }

    #[test]
    fn delta_no_change() {
        assert_eq!(delta_pct(100.0, Some(100.0)), Some(0.0));
    }

    #[test]
    fn delta_rounds_to_one_decimal() {
        assert_eq!(delta_pct(100.0, Some(3.0)), Some(3233.3));
    }

    #[test]
    fn delta_none_without_previous() {
        assert_eq!(delta_pct(100.0, None), None);
    }

    #[test]
    fn delta_none_when_previous_is_zero() {
        // Never inf or NaN.
        assert_eq!(delta_pct(100.0, Some(0.0)), None);
    }

    #[test]
    fn rolling_drops_oldest_once_window_is_full() {
        let previous = [100.0, 120.0, 90.0, 110.0];
        assert_eq!(rolling_average(&previous, 130.0, 4), 112.5);
    }

    #[test]
    fn rolling_uses_whatever_history_exists() {
        assert_eq!(rolling_average(&[100.0], 130.0, 4), 115.0);
        assert_eq!(rolling_average(&[100.0, 110.0], 120.0, 4), 110.0);
    }

    #[test]
    fn rolling_with_empty_history_is_current() {
        assert_eq!(rolling_average(&[], 130.0, 4), 130.0);
    }
}
