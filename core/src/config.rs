use std::{fs, path::Path, path::PathBuf};

use backend::hal::layouts::BatchParams;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    table::round_half_up,
};

/// Fixed-point scales of the protocol.
///
/// * `log_scale`: `P`, readings enter as `round(P * ln(x + 2))`.
/// * `reciprocal_scale`: `P2`, readings enter as `round(P2 / ln(x + 2))`.
/// * `inverse_scale_log2`: the day sum of means is inverted as `2^s / sum`.
/// * `split_base`: two-digit split of the inverted sums, `v = v1 * base + v2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precision {
    pub log_scale: u32,
    pub reciprocal_scale: u32,
    pub inverse_scale_log2: u32,
    pub split_base: u32,
}

impl Default for Precision {
    fn default() -> Self {
        Self {
            log_scale: 32,
            reciprocal_scale: 1024,
            inverse_scale_log2: 26,
            split_base: 100,
        }
    }
}

impl Precision {
    /// `round(P * ln(x + 2))`.
    pub fn log_encode(&self, x: f64) -> i64 {
        round_half_up(self.log_scale as f64 * (x + 2.0).ln())
    }

    /// `round(P2 / ln(x + 2))`.
    pub fn reciprocal_encode(&self, x: f64) -> i64 {
        round_half_up(self.reciprocal_scale as f64 / (x + 2.0).ln())
    }

    /// Factor turning the decrypted fixed-point result into the HM/AM ratio.
    pub fn ratio_scale(&self) -> f64 {
        let base: f64 = self.split_base as f64;
        base * base / (self.inverse_scale_log2 as f64).exp2()
    }
}

/// Range of plaintext readings the tables are built for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingDomain {
    pub min: f64,
    pub max: f64,
}

impl Default for ReadingDomain {
    fn default() -> Self {
        Self { min: 50.0, max: 6000.0 }
    }
}

/// Encryption parameters as they appear in the config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeConfig {
    pub log_n: u32,
    pub plain_modulus: u64,
    pub coeff_modulus_bits: u32,
}

impl Default for HeConfig {
    fn default() -> Self {
        let params: BatchParams = BatchParams::default();
        Self {
            log_n: params.log_n,
            plain_modulus: params.plain_modulus,
            coeff_modulus_bits: params.coeff_modulus_bits,
        }
    }
}

impl HeConfig {
    pub fn batch_params(&self) -> BatchParams {
        BatchParams {
            log_n: self.log_n,
            plain_modulus: self.plain_modulus,
            coeff_modulus_bits: self.coeff_modulus_bits,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub meter_count: usize,
    pub intervals_per_day: usize,
    /// Intervals per run; 1 gives independent single-interval runs,
    /// `intervals_per_day` one batched run.
    pub batch_size: usize,
    pub precision: Precision,
    pub reading_domain: ReadingDomain,
    /// Worker threads per role, 0 for one per available core.
    pub threads: usize,
    pub he: HeConfig,
    pub key_dir: PathBuf,
    pub table_dir: PathBuf,
    pub state_dir: PathBuf,
    /// Also compute the plaintext ratio next to the protected one.
    pub calibration: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            meter_count: 150,
            intervals_per_day: 24,
            batch_size: 24,
            precision: Precision::default(),
            reading_domain: ReadingDomain::default(),
            threads: 0,
            he: HeConfig::default(),
            key_dir: PathBuf::from("keys"),
            table_dir: PathBuf::from("tables"),
            state_dir: PathBuf::from("state"),
            calibration: false,
        }
    }
}

impl ProtocolConfig {
    /// Reads a JSON config; absent fields take their default.
    pub fn load(path: &Path) -> Result<Self> {
        let text: String =
            fs::read_to_string(path).map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.meter_count == 0 {
            return Err(Error::Config("meter_count must be positive".into()));
        }
        if self.intervals_per_day == 0 {
            return Err(Error::Config("intervals_per_day must be positive".into()));
        }
        if self.batch_size == 0 || self.batch_size > self.intervals_per_day {
            return Err(Error::Config(format!(
                "batch_size {} not in [1, {}]",
                self.batch_size, self.intervals_per_day
            )));
        }
        let p: &Precision = &self.precision;
        if p.log_scale == 0 || p.reciprocal_scale == 0 {
            return Err(Error::Config("precision scales must be positive".into()));
        }
        if p.split_base < 2 {
            return Err(Error::Config(format!("split_base {} < 2", p.split_base)));
        }
        if !(1..=40).contains(&p.inverse_scale_log2) {
            return Err(Error::Config(format!(
                "inverse_scale_log2 {} not in [1, 40]",
                p.inverse_scale_log2
            )));
        }
        let d: &ReadingDomain = &self.reading_domain;
        if !(d.min.is_finite() && d.max.is_finite()) || d.min <= -1.0 || d.min >= d.max {
            return Err(Error::Config(format!("reading domain [{}, {}] is empty or below -1", d.min, d.max)));
        }
        self.he
            .batch_params()
            .validate()
            .map_err(|err| Error::Config(err.to_string()))
    }

    /// Interval ranges of the successive runs of one day.
    pub fn runs(&self) -> Vec<std::ops::Range<usize>> {
        (0..self.intervals_per_day)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(self.intervals_per_day))
            .collect()
    }

    /// Worker pool of one role.
    pub fn thread_pool(&self) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("oblut-worker-{i}"))
            .build()
            .map_err(|err| Error::Config(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::ProtocolConfig;
    use crate::error::Error;

    #[test]
    fn default_is_valid() {
        let config: ProtocolConfig = ProtocolConfig::default();
        config.validate().unwrap();
        assert!((config.precision.ratio_scale() - 1e4 / 67108864.0).abs() < 1e-15);
    }

    #[test]
    fn runs_cover_the_day() {
        let mut config: ProtocolConfig = ProtocolConfig::default();
        assert_eq!(config.runs(), vec![0..24]);
        config.batch_size = 1;
        assert_eq!(config.runs().len(), 24);
        config.batch_size = 5;
        let runs = config.runs();
        assert_eq!(runs.len(), 5);
        assert_eq!(runs[4], 20..24);
    }

    #[test]
    fn load_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "meter_count": 4, "batch_size": 1, "he": {{ "log_n": 10 }} }}"#).unwrap();
        let config: ProtocolConfig = ProtocolConfig::load(file.path()).unwrap();
        assert_eq!(config.meter_count, 4);
        assert_eq!(config.intervals_per_day, 24);
        assert_eq!(config.he.log_n, 10);
        assert_eq!(config.he.plain_modulus, 786433);
        assert_eq!(config.precision.split_base, 100);
    }

    #[test]
    fn rejects_bad_values() {
        let config: ProtocolConfig = ProtocolConfig {
            batch_size: 25,
            ..ProtocolConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config: ProtocolConfig = ProtocolConfig::default();
        config.he.plain_modulus = 786431;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(ProtocolConfig::load(file.path()), Err(Error::Config(_))));
    }
}
