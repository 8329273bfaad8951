/// Percentage of `successes` out of `total`, in `[0, 100]`.
///
/// An empty set has a rate of zero rather than being undefined.
pub fn success_rate(successes: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    successes as f64 / total as f64 * 100.0
}

pub fn median_f64(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some(mean_f64(&[values[mid - 1], values[mid]]))
    } else {
        Some(values[mid])
    }
}

pub fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute difference between consecutive values.
///
/// Needs at least two values.
pub fn jitter_f64(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let jitters: Vec<f64> =
        values.windows(2).map(|pair| (pair[0] - pair[1]).abs()).collect();

    Some(jitters.iter().sum::<f64>() / jitters.len() as f64)
}
