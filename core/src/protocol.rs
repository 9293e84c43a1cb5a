use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use tracing::{info, info_span};

use crate::{
    calibration,
    config::ProtocolConfig,
    error::{Error, Result},
    readings::DayReadings,
    roles::{ComputeServer, INTERVAL_FUNCTIONS, KeyHolder, RatioResult, SUM_FUNCTIONS},
    state::{Handoff, PeriodId},
    table::LookupFunction,
    trait_families::{EvaluateFamily, ResolveFamily},
};

/// Stages of one date, in order. The first four repeat once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DayState {
    AggregatedSums,
    TableDiffA,
    ResolvedIndexA,
    SelectedOutputA,
    TableDiffSums,
    ResolvedIndexSums,
    CombinedCrossTerms,
    TableDiffB,
    ResolvedIndexB,
    SelectedOutputB,
    FinalCombine,
    DecryptedRatio,
}

impl DayState {
    pub fn next(&self) -> Option<DayState> {
        use DayState::*;
        match self {
            AggregatedSums => Some(TableDiffA),
            TableDiffA => Some(ResolvedIndexA),
            ResolvedIndexA => Some(SelectedOutputA),
            SelectedOutputA => Some(TableDiffSums),
            TableDiffSums => Some(ResolvedIndexSums),
            ResolvedIndexSums => Some(CombinedCrossTerms),
            CombinedCrossTerms => Some(TableDiffB),
            TableDiffB => Some(ResolvedIndexB),
            ResolvedIndexB => Some(SelectedOutputB),
            SelectedOutputB => Some(FinalCombine),
            FinalCombine => Some(DecryptedRatio),
            DecryptedRatio => None,
        }
    }
}

impl fmt::Display for DayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Cooperative cancellation, observed between stages.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self, stage: DayState) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled { stage });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DayOutcome {
    pub ratio: f64,
    pub raw: i64,
    pub noise_budget: u32,
    /// Plaintext ratio, when calibration is enabled.
    pub calibration: Option<f64>,
    /// Stages entered, in order.
    pub stages: Vec<DayState>,
}

/// Drives both roles through a date, passing every message through a
/// [`Handoff`].
pub struct ProtocolOrchestrator<'a, M> {
    config: ProtocolConfig,
    server: ComputeServer<'a, M>,
    holder: KeyHolder<'a, M>,
    cancel: CancelToken,
}

impl<'a, M: EvaluateFamily + ResolveFamily> ProtocolOrchestrator<'a, M> {
    pub fn new(config: &ProtocolConfig, server: ComputeServer<'a, M>, holder: KeyHolder<'a, M>) -> Self {
        Self {
            config: config.clone(),
            server,
            holder,
            cancel: CancelToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn stage<T>(&self, state: DayState, stages: &mut Vec<DayState>, work: impl FnOnce() -> Result<T>) -> Result<T> {
        self.cancel.check(state)?;
        stages.push(state);
        let _span = info_span!("stage", %state).entered();
        work()
    }

    /// Runs every stage of `day`. Any error aborts the date.
    pub fn run_day<H: Handoff>(&self, day: &PeriodId, readings: &DayReadings, handoff: &mut H) -> Result<DayOutcome> {
        let _span = info_span!("day", %day, batch_size = self.config.batch_size).entered();
        let mut stages: Vec<DayState> = Vec::new();
        let (server, holder) = (&self.server, &self.holder);

        for (k, run) in self.config.runs().into_iter().enumerate() {
            let _run = info_span!("run", index = k, start = run.start, end = run.end).entered();
            let sums = self.stage(DayState::AggregatedSums, &mut stages, || {
                server.aggregate(day, run.clone(), readings)
            })?;
            self.stage(DayState::TableDiffA, &mut stages, || {
                server.diff_intervals(&sums, handoff)
            })?;
            let periods: Vec<PeriodId> = run.clone().map(|i| day.interval(i)).collect();
            self.stage(DayState::ResolvedIndexA, &mut stages, || {
                holder.resolve_round(&INTERVAL_FUNCTIONS, &periods, handoff)
            })?;
            self.stage(DayState::SelectedOutputA, &mut stages, || {
                server.select_intervals(day, k, run, handoff)
            })?;
        }

        let days: &[PeriodId] = std::slice::from_ref(day);
        self.stage(DayState::TableDiffSums, &mut stages, || server.diff_sums(day, handoff))?;
        self.stage(DayState::ResolvedIndexSums, &mut stages, || {
            holder.resolve_round(&SUM_FUNCTIONS, days, handoff)
        })?;
        self.stage(DayState::CombinedCrossTerms, &mut stages, || {
            server.combine_cross_terms(day, handoff)
        })?;
        self.stage(DayState::TableDiffB, &mut stages, || server.diff_cross(day, handoff))?;
        self.stage(DayState::ResolvedIndexB, &mut stages, || {
            holder.resolve_round(&[LookupFunction::Hundredth], days, handoff)
        })?;
        let hundredth = self.stage(DayState::SelectedOutputB, &mut stages, || {
            server.select_hundredth(day, handoff)
        })?;
        self.stage(DayState::FinalCombine, &mut stages, || {
            server.final_combine(day, hundredth, handoff)
        })?;
        let result: RatioResult = self.stage(DayState::DecryptedRatio, &mut stages, || {
            holder.decrypt_final(day, handoff)
        })?;

        let calibration: Option<f64> = self
            .config
            .calibration
            .then(|| calibration::day_ratio(&readings.intervals));
        info!(
            ratio = result.ratio,
            noise_budget = result.noise_budget,
            calibration,
            "day complete"
        );
        Ok(DayOutcome {
            ratio: result.ratio,
            raw: result.raw,
            noise_budget: result.noise_budget,
            calibration,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use backend::{
        CpuRef,
        hal::layouts::{BatchParams, Module},
    };
    use tempfile::TempDir;

    use super::{DayOutcome, DayState, ProtocolOrchestrator};
    use crate::{
        aggregation::{Aggregator, IntervalSums, table_diff},
        config::{ProtocolConfig, ReadingDomain},
        error::Error,
        lookup::ObliviousLookup,
        messages::{SelectedOutput, SelectionQuery, TableDiff},
        readings::DayReadings,
        resolver::IndexResolver,
        roles::{ComputeServer, KeyHolder},
        state::{MemoryHandoff, PeriodId, StateStore},
        table::{LookupFunction, LookupTable, TableBuilder, TableSet, TableShape},
        testing::TestContext,
    };

    fn orchestrator<'a>(ctx: &'a TestContext, config: &ProtocolConfig) -> ProtocolOrchestrator<'a, Module<CpuRef>> {
        let plain = TableBuilder::new(config).build_all().unwrap();
        let tables: TableSet = TableSet::encrypt(&ctx.module, &ctx.keys.evaluation.pk, &plain).unwrap();
        let server = ComputeServer::new(&ctx.module, ctx.keys.evaluation.clone(), tables, config).unwrap();
        let holder = KeyHolder::new(&ctx.module, ctx.keys.resolver_keys(), config).unwrap();
        ProtocolOrchestrator::new(config, server, holder)
    }

    /// 24 intervals of 4 meters spread over the default reading domain.
    fn readings() -> DayReadings {
        DayReadings::from_intervals(
            (0..24)
                .map(|h| {
                    (0..4)
                        .map(|m| 50.0 + ((h * 397 + m * 1013) % 5900) as f64 + 0.25 * m as f64)
                        .collect()
                })
                .collect(),
        )
    }

    fn day() -> PeriodId {
        PeriodId::day("2014-01-01").unwrap()
    }

    #[test]
    fn states_form_a_chain() {
        let mut state: DayState = DayState::AggregatedSums;
        let mut count: usize = 1;
        while let Some(next) = state.next() {
            state = next;
            count += 1;
        }
        assert_eq!(state, DayState::DecryptedRatio);
        assert_eq!(count, 12);
        assert_eq!(DayState::TableDiffB.to_string(), "TableDiffB");
    }

    #[test]
    fn batched_day_matches_calibration() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ProtocolConfig {
            calibration: true,
            ..ctx.config(4)
        };
        let orchestrator = orchestrator(&ctx, &config);
        let mut handoff: MemoryHandoff = MemoryHandoff::new();
        let outcome: DayOutcome = orchestrator.run_day(&day(), &readings(), &mut handoff).unwrap();

        let want: f64 = outcome.calibration.unwrap();
        assert!((outcome.ratio - want).abs() < 0.02, "{} vs {}", outcome.ratio, want);
        assert!(outcome.noise_budget > 0);
        assert!(handoff.is_empty());

        let mut chain: Vec<DayState> = vec![DayState::AggregatedSums];
        while let Some(next) = chain[chain.len() - 1].next() {
            chain.push(next);
        }
        assert_eq!(outcome.stages, chain);

        // same readings, same result
        let again: DayOutcome = orchestrator.run_day(&day(), &readings(), &mut handoff).unwrap();
        assert_eq!(again.raw, outcome.raw);
    }

    #[test]
    fn single_interval_runs_match_the_batched_day() {
        let ctx: TestContext = TestContext::new(10);
        let batched: ProtocolConfig = ctx.config(4);
        let single: ProtocolConfig = ProtocolConfig {
            batch_size: 1,
            calibration: true,
            ..ctx.config(4)
        };
        let mut handoff: MemoryHandoff = MemoryHandoff::new();
        let a: DayOutcome = orchestrator(&ctx, &batched)
            .run_day(&day(), &readings(), &mut handoff)
            .unwrap();
        let b: DayOutcome = orchestrator(&ctx, &single)
            .run_day(&day(), &readings(), &mut handoff)
            .unwrap();
        assert_eq!(a.raw, b.raw);
        assert_eq!(b.stages.len(), 4 * 24 + 8);
        assert!((b.ratio - b.calibration.unwrap()).abs() < 0.02);
    }

    #[test]
    fn day_through_the_state_store() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ProtocolConfig {
            batch_size: 8,
            ..ctx.config(4)
        };
        let dir: TempDir = tempfile::tempdir().unwrap();
        let mut store: StateStore = StateStore::new(dir.path()).unwrap();
        let outcome: DayOutcome = orchestrator(&ctx, &config)
            .run_day(&day(), &readings(), &mut store)
            .unwrap();

        let mut memory: MemoryHandoff = MemoryHandoff::new();
        let reference: DayOutcome = orchestrator(&ctx, &config)
            .run_day(&day(), &readings(), &mut memory)
            .unwrap();
        assert_eq!(outcome.raw, reference.raw);
        // every message was read back
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn readings_below_the_domain_abort_the_day() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ctx.config(3);
        let readings: DayReadings = DayReadings::from_intervals(vec![vec![10.0, 20.0, 5.0]; config.intervals_per_day]);
        let result = orchestrator(&ctx, &config).run_day(&day(), &readings, &mut MemoryHandoff::new());
        assert!(matches!(
            result,
            Err(Error::TableDomain {
                function: LookupFunction::LogMean
            })
        ));
    }

    #[test]
    fn log_mean_of_small_readings_with_a_wider_table() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ProtocolConfig {
            reading_domain: ReadingDomain { min: 0.0, max: 6000.0 },
            ..ctx.config(3)
        };
        let (rk, gk) = (&ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk);
        let table: LookupTable = TableBuilder::new(&config)
            .build(LookupFunction::LogMean)
            .unwrap()
            .encrypt(&ctx.module, &ctx.keys.evaluation.pk)
            .unwrap();
        let shapes: Vec<TableShape> = vec![table.shape()];
        let period: PeriodId = day().interval(0);

        let sums: IntervalSums = Aggregator::new(&ctx.module, &ctx.keys.evaluation.pk, rk, config.precision, 3)
            .aggregate(&period, &[10.0, 20.0, 5.0])
            .unwrap();
        assert_eq!(ctx.decrypt(&sums.log_sum)[0], 241);

        let diff: TableDiff = table_diff(&ctx.module, rk, &period, &sums.log_sum, &table).unwrap();
        let query: SelectionQuery = IndexResolver::new(&ctx.module, &ctx.keys.sk, &ctx.keys.evaluation.pk, &shapes)
            .resolve(diff)
            .unwrap();
        let out: SelectedOutput = ObliviousLookup::new(&ctx.module, rk, gk)
            .lookup(query, &table)
            .unwrap();
        // round_half_up(241 / 3)
        assert_eq!(ctx.decrypt(&out.components()[0])[0], 80);
    }

    #[test]
    fn cancelled_before_the_first_stage() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ctx.config(4);
        let orchestrator = orchestrator(&ctx, &config);
        orchestrator.cancel_token().cancel();
        assert!(matches!(
            orchestrator.run_day(&day(), &readings(), &mut MemoryHandoff::new()),
            Err(Error::Cancelled {
                stage: DayState::AggregatedSums
            })
        ));
    }

    #[test]
    fn small_modulus_runs_out_of_noise_budget() {
        let ctx: TestContext = TestContext::with_params(BatchParams {
            log_n: 12,
            coeff_modulus_bits: 109,
            ..BatchParams::default()
        });
        let config: ProtocolConfig = ctx.config(4);
        let result = orchestrator(&ctx, &config).run_day(&day(), &readings(), &mut MemoryHandoff::new());
        assert!(
            matches!(result, Err(Error::NoiseBudgetExhausted { op: "multiply", .. })),
            "{result:?}"
        );
    }
}
