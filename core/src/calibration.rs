//! Plaintext HM/AM ratio of the transformed readings, for checking the
//! protected result. Nothing here feeds the encrypted path.

use tracing::debug;

/// `(AM, HM)` of `ln(x + 2)` over the readings of one interval.
pub fn interval_means(readings: &[f64]) -> (f64, f64) {
    let n: f64 = readings.len() as f64;
    let (log_sum, reciprocal_sum) = readings.iter().fold((0.0, 0.0), |(s, r), x| {
        let l: f64 = (x + 2.0).ln();
        (s + l, r + 1.0 / l)
    });
    (log_sum / n, n / reciprocal_sum)
}

/// `sum HM / sum AM` over the intervals of a day.
pub fn day_ratio(intervals: &[Vec<f64>]) -> f64 {
    let (am, hm) = intervals
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(am, hm), (i, readings)| {
            let (a, h) = interval_means(readings);
            debug!(interval = i, am = a, hm = h, "calibration means");
            (am + a, hm + h)
        });
    let ratio: f64 = hm / am;
    debug!(am, hm, ratio, "calibration ratio");
    ratio
}
