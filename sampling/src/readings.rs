use rand_distr::{Distribution, LogNormal};

use crate::source::Source;

/// Synthetic per-interval meter consumption.
///
/// Readings follow a log-normal law (median `exp(mu)`) clamped to `[min, max]`.
pub struct ReadingSampler {
    dist: LogNormal<f64>,
    min: f64,
    max: f64,
}

impl ReadingSampler {
    /// Returns `None` if `sigma` is negative or not finite, or if `min > max`.
    pub fn new(mu: f64, sigma: f64, min: f64, max: f64) -> Option<Self> {
        if !(sigma >= 0.0 && sigma.is_finite()) || min.is_nan() || max.is_nan() || min > max {
            return None;
        }
        let dist: LogNormal<f64> = LogNormal::new(mu, sigma).ok()?;
        Some(Self { dist, min, max })
    }

    pub fn sample(&self, source: &mut Source) -> f64 {
        self.dist.sample(source).clamp(self.min, self.max)
    }

    /// Samples `intervals` rows of `meters` readings.
    pub fn sample_day(&self, source: &mut Source, intervals: usize, meters: usize) -> Vec<Vec<f64>> {
        (0..intervals)
            .map(|_| (0..meters).map(|_| self.sample(source)).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ReadingSampler;
    use crate::source::Source;

    #[test]
    fn sample_day_shape_and_domain() {
        let sampler: ReadingSampler = ReadingSampler::new(5.5, 1.0, 50.0, 6000.0).unwrap();
        let mut source: Source = Source::new([3u8; 32]);
        let day: Vec<Vec<f64>> = sampler.sample_day(&mut source, 24, 7);
        assert_eq!(day.len(), 24);
        day.iter().for_each(|interval| {
            assert_eq!(interval.len(), 7);
            interval
                .iter()
                .for_each(|x| assert!((50.0..=6000.0).contains(x), "{} outside domain", x));
        });
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(ReadingSampler::new(5.5, -1.0, 50.0, 6000.0).is_none());
        assert!(ReadingSampler::new(5.5, f64::NAN, 50.0, 6000.0).is_none());
        assert!(ReadingSampler::new(5.5, f64::INFINITY, 50.0, 6000.0).is_none());
        assert!(ReadingSampler::new(5.5, 1.0, 6000.0, 50.0).is_none());
    }
}
