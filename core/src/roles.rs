//! The two parties of the protocol.
//!
//! [`ComputeServer`] holds the encrypted tables and the evaluation keys and
//! never sees a secret key. [`KeyHolder`] holds the secret key and only
//! accepts table differences (through its [`IndexResolver`]) and the final
//! ciphertext (through its [`ResultDecryptor`]).

use std::ops::Range;

use backend::hal::layouts::{Ciphertext, SecretKey};
use rayon::ThreadPool;
use tracing::{debug, info};

use crate::{
    accumulate::accumulate,
    aggregation::{Aggregator, IntervalSums, table_diff},
    config::{Precision, ProtocolConfig},
    error::{Error, Result},
    keys::{EvaluationKeys, ResolverKeys},
    lookup::ObliviousLookup,
    messages::{FinalCiphertext, SelectedOutput, SelectionQuery, TableDiff},
    readings::DayReadings,
    resolver::IndexResolver,
    state::{Consumed, Handoff, PeriodId, StageTag},
    table::{LookupFunction, TableBuilder, TableSet, TableShape},
    trait_families::{EvaluateFamily, ResolveFamily},
};

/// Functions of the per-interval round, in the order their outputs are
/// accumulated.
pub const INTERVAL_FUNCTIONS: [LookupFunction; 2] = [LookupFunction::LogMean, LookupFunction::HarmonicMean];
/// Functions applied to the day running sums.
pub const SUM_FUNCTIONS: [LookupFunction; 2] = [LookupFunction::InverseSum, LookupFunction::HarmonicSum];

/// Untrusted evaluator: public, relinearization and Galois keys only.
pub struct ComputeServer<'a, M> {
    module: &'a M,
    keys: EvaluationKeys,
    tables: TableSet,
    config: ProtocolConfig,
    pool: ThreadPool,
}

impl<'a, M: EvaluateFamily> ComputeServer<'a, M> {
    pub fn new(module: &'a M, keys: EvaluationKeys, tables: TableSet, config: &ProtocolConfig) -> Result<Self> {
        if tables.meter_count() != config.meter_count {
            return Err(Error::Setup(format!(
                "tables built for {} meters, config has {}",
                tables.meter_count(),
                config.meter_count
            )));
        }
        for f in LookupFunction::ALL {
            tables.get(f)?.check(module.row_size())?;
        }
        Ok(Self {
            module,
            keys,
            tables,
            config: config.clone(),
            pool: config.thread_pool()?,
        })
    }

    fn diff(&self, function: LookupFunction, period: &PeriodId, target: &Ciphertext) -> Result<TableDiff> {
        let table = self.tables.get(function)?;
        self.pool
            .install(|| table_diff(self.module, &self.keys.rk, period, target, table))
    }

    fn lookup(&self, query: SelectionQuery) -> Result<SelectedOutput> {
        let table = self.tables.get(query.function())?;
        let lookup: ObliviousLookup<'_, M> = ObliviousLookup::new(self.module, &self.keys.rk, &self.keys.gk);
        self.pool.install(|| lookup.lookup(query, table))
    }

    fn select<H: Handoff>(
        &self,
        handoff: &H,
        consumed: &mut Consumed,
        function: LookupFunction,
        period: &PeriodId,
    ) -> Result<SelectedOutput> {
        self.lookup(SelectionQuery::receive(handoff, consumed, function, period)?)
    }

    /// Encrypted interval sums of the intervals in `run`.
    pub fn aggregate(&self, day: &PeriodId, run: Range<usize>, readings: &DayReadings) -> Result<Vec<IntervalSums>> {
        if readings.intervals.len() != self.config.intervals_per_day {
            return Err(Error::InvalidInput(format!(
                "{}: {} intervals, expected {}",
                day,
                readings.intervals.len(),
                self.config.intervals_per_day
            )));
        }
        let aggregator: Aggregator<'_, M> = Aggregator::new(
            self.module,
            &self.keys.pk,
            &self.keys.rk,
            self.config.precision,
            self.config.meter_count,
        );
        run.map(|i| {
            let values: &[f64] = readings
                .intervals
                .get(i)
                .ok_or_else(|| Error::InvalidInput(format!("{day}: no interval {i}")))?;
            self.pool
                .install(|| aggregator.aggregate(&day.interval(i), values))
        })
        .collect()
    }

    /// Sends the differences of every interval sum against the mean tables.
    pub fn diff_intervals<H: Handoff>(&self, sums: &[IntervalSums], handoff: &mut H) -> Result<()> {
        for s in sums {
            self.diff(LookupFunction::LogMean, &s.period, &s.log_sum)?
                .send(handoff)?;
            self.diff(LookupFunction::HarmonicMean, &s.period, &s.reciprocal_sum)?
                .send(handoff)?;
        }
        Ok(())
    }

    /// Looks up the means of the intervals in `run` and adds them to the day
    /// running sums, which are picked up from the previous run unless this
    /// is the first one.
    pub fn select_intervals<H: Handoff>(
        &self,
        day: &PeriodId,
        run_index: usize,
        run: Range<usize>,
        handoff: &mut H,
    ) -> Result<()> {
        let mut consumed: Consumed = Consumed::new();
        let mut running: [Option<Ciphertext>; 2] = [None, None];
        if run_index > 0 {
            // overwritten in place below
            for (f, sum) in INTERVAL_FUNCTIONS.iter().zip(running.iter_mut()) {
                *sum = handoff.get(StageTag::Running(*f), day, 1)?.pop();
            }
        }
        for i in run {
            let period: PeriodId = day.interval(i);
            for (f, sum) in INTERVAL_FUNCTIONS.iter().zip(running.iter_mut()) {
                let out: SelectedOutput = self.select(handoff, &mut consumed, *f, &period)?;
                accumulate(self.module, sum, &out.components()[0])?;
            }
        }
        for (f, sum) in INTERVAL_FUNCTIONS.iter().zip(running.iter()) {
            let sum: &Ciphertext = sum
                .as_ref()
                .ok_or_else(|| Error::InvalidInput(format!("{day}: empty run {run_index}")))?;
            debug!(function = %f, budget = self.module.estimated_noise_budget(sum), "running sum");
            handoff.put(StageTag::Running(*f), day, std::slice::from_ref(sum))?;
        }
        consumed.release(handoff)
    }

    /// Sends the differences of the day running sums against the sum tables.
    pub fn diff_sums<H: Handoff>(&self, day: &PeriodId, handoff: &mut H) -> Result<()> {
        let mut consumed: Consumed = Consumed::new();
        for (mean, sum) in INTERVAL_FUNCTIONS.iter().zip(SUM_FUNCTIONS.iter()) {
            let running: Vec<Ciphertext> = consumed.read(handoff, StageTag::Running(*mean), day, 1)?;
            self.diff(*sum, day, &running[0])?.send(handoff)?;
        }
        consumed.release(handoff)
    }

    /// Looks up `AM1, AM2` and `HM1, HM2` and stores `AM1 * HM1` and the
    /// cross term `AM1 * HM2 + AM2 * HM1`.
    pub fn combine_cross_terms<H: Handoff>(&self, day: &PeriodId, handoff: &mut H) -> Result<()> {
        let mut consumed: Consumed = Consumed::new();
        let am: Vec<Ciphertext> = self
            .select(handoff, &mut consumed, LookupFunction::InverseSum, day)?
            .into_components();
        let hm: Vec<Ciphertext> = self
            .select(handoff, &mut consumed, LookupFunction::HarmonicSum, day)?
            .into_components();

        let product = |a: &Ciphertext, b: &Ciphertext| -> Result<Ciphertext> {
            let mut ct: Ciphertext = self.module.multiply(a, b)?;
            self.module.relinearize_inplace(&mut ct, &self.keys.rk)?;
            Ok(ct)
        };
        let am1_hm1: Ciphertext = product(&am[0], &hm[0])?;
        let mut cross: Ciphertext = product(&am[0], &hm[1])?;
        self.module.add_inplace(&mut cross, &product(&am[1], &hm[0])?)?;

        debug!(
            budget = self.module.estimated_noise_budget(&cross),
            "cross terms combined"
        );
        handoff.put(StageTag::Product, day, std::slice::from_ref(&am1_hm1))?;
        handoff.put(StageTag::CrossTerm, day, std::slice::from_ref(&cross))?;
        consumed.release(handoff)
    }

    pub fn diff_cross<H: Handoff>(&self, day: &PeriodId, handoff: &mut H) -> Result<()> {
        let mut consumed: Consumed = Consumed::new();
        let cross: Vec<Ciphertext> = consumed.read(handoff, StageTag::CrossTerm, day, 1)?;
        self.diff(LookupFunction::Hundredth, day, &cross[0])?
            .send(handoff)?;
        consumed.release(handoff)
    }

    /// `round(cross / base)`. The query stays stored until
    /// [`Self::final_combine`] has sent the final ciphertext.
    pub fn select_hundredth<H: Handoff>(&self, day: &PeriodId, handoff: &H) -> Result<SelectedOutput> {
        self.select(handoff, &mut Consumed::new(), LookupFunction::Hundredth, day)
    }

    /// `AM1 * HM1 + round(cross / base)`, sent to the key holder.
    pub fn final_combine<H: Handoff>(&self, day: &PeriodId, hundredth: SelectedOutput, handoff: &mut H) -> Result<()> {
        if hundredth.function() != LookupFunction::Hundredth || hundredth.period() != day {
            return Err(Error::InvalidInput(format!(
                "final combination of {} for {}",
                hundredth.function(),
                hundredth.period()
            )));
        }
        let mut consumed: Consumed = Consumed::new();
        let mut ct: Ciphertext = consumed
            .read(handoff, StageTag::Product, day, 1)?
            .remove(0);
        consumed.mark(StageTag::Query(LookupFunction::Hundredth), day);
        self.module
            .add_inplace(&mut ct, &hundredth.components()[0])?;
        info!(%day, budget = self.module.estimated_noise_budget(&ct), "final ciphertext");
        FinalCiphertext {
            period: day.clone(),
            ct,
        }
        .send(handoff)?;
        consumed.release(handoff)
    }
}

/// Decrypted day result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatioResult {
    /// Fixed-point value, slot 0.
    pub raw: i64,
    pub ratio: f64,
    /// Remaining noise budget of the final ciphertext, in bits.
    pub noise_budget: u32,
}

/// Decrypts the final ciphertext, and nothing else.
pub struct ResultDecryptor<'a, M> {
    module: &'a M,
    sk: &'a SecretKey,
    precision: Precision,
}

impl<'a, M: ResolveFamily> ResultDecryptor<'a, M> {
    pub fn new(module: &'a M, sk: &'a SecretKey, precision: Precision) -> Self {
        Self { module, sk, precision }
    }

    pub fn decrypt(&self, last: FinalCiphertext) -> Result<RatioResult> {
        let noise_budget: u32 = self.module.noise_budget(&last.ct, self.sk)?;
        let raw: i64 = self
            .module
            .decode_batch(&self.module.decrypt(&last.ct, self.sk)?)
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("{}: empty final ciphertext", last.period)))?;
        let ratio: f64 = raw as f64 * self.precision.ratio_scale();
        info!(period = %last.period, raw, ratio, noise_budget, "ratio decrypted");
        Ok(RatioResult {
            raw,
            ratio,
            noise_budget,
        })
    }
}

/// Secret-key holder, serving index resolution and the final decryption.
pub struct KeyHolder<'a, M> {
    module: &'a M,
    keys: ResolverKeys,
    shapes: Vec<TableShape>,
    precision: Precision,
    pool: ThreadPool,
}

impl<'a, M: ResolveFamily> KeyHolder<'a, M> {
    /// The table shapes are derived from `config`; the key holder never
    /// needs the tables themselves.
    pub fn new(module: &'a M, keys: ResolverKeys, config: &ProtocolConfig) -> Result<Self> {
        Ok(Self {
            module,
            keys,
            shapes: TableBuilder::new(config).shapes(module.row_size())?,
            precision: config.precision,
            pool: config.thread_pool()?,
        })
    }

    pub fn shapes(&self) -> &[TableShape] {
        &self.shapes
    }

    pub fn index_resolver(&self) -> IndexResolver<'_, M> {
        IndexResolver::new(self.module, &self.keys.sk, &self.keys.pk, &self.shapes)
    }

    pub fn result_decryptor(&self) -> ResultDecryptor<'_, M> {
        ResultDecryptor::new(self.module, &self.keys.sk, self.precision)
    }

    fn rows(&self, function: LookupFunction) -> Result<usize> {
        self.shapes
            .iter()
            .find(|s| s.function == function)
            .map(|s| s.rows)
            .ok_or_else(|| Error::Setup(format!("no table shape for {function}")))
    }

    /// Answers the pending differences of `functions` for every period with
    /// selection queries.
    pub fn resolve_round<H: Handoff>(
        &self,
        functions: &[LookupFunction],
        periods: &[PeriodId],
        handoff: &mut H,
    ) -> Result<()> {
        let resolver: IndexResolver<'_, M> = self.index_resolver();
        for period in periods {
            for f in functions {
                let mut consumed: Consumed = Consumed::new();
                let diff: TableDiff = TableDiff::receive(handoff, &mut consumed, *f, period, self.rows(*f)?)?;
                let query: SelectionQuery = self.pool.install(|| resolver.resolve(diff))?;
                query.send(handoff)?;
                consumed.release(handoff)?;
            }
        }
        Ok(())
    }

    pub fn decrypt_final<H: Handoff>(&self, day: &PeriodId, handoff: &mut H) -> Result<RatioResult> {
        let mut consumed: Consumed = Consumed::new();
        let result: RatioResult = self
            .result_decryptor()
            .decrypt(FinalCiphertext::receive(handoff, &mut consumed, day)?)?;
        consumed.release(handoff)?;
        Ok(result)
    }
}
