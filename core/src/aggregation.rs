use backend::hal::{
    api::{BatchEncode, ModuleParams},
    layouts::{Ciphertext, Plaintext, PublicKey, RelinKey},
};
use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::{
    config::Precision,
    error::{Error, Result},
    messages::TableDiff,
    state::PeriodId,
    table::LookupTable,
    trait_families::EvaluateFamily,
};

/// Encodes `value` in every slot of the first row; the second row is zero.
pub fn encode_replicated<M: ModuleParams + BatchEncode>(module: &M, value: i64) -> Result<Plaintext> {
    Ok(module.encode_batch(&vec![value; module.row_size()])?)
}

/// Encrypted sums of one interval.
#[derive(Debug)]
pub struct IntervalSums {
    pub period: PeriodId,
    /// `sum round(P * ln(x + 2))`
    pub log_sum: Ciphertext,
    /// `sum round(P2 / ln(x + 2))`
    pub reciprocal_sum: Ciphertext,
}

/// Encrypts readings and folds them into interval sums.
pub struct Aggregator<'a, M> {
    module: &'a M,
    pk: &'a PublicKey,
    rk: &'a RelinKey,
    precision: Precision,
    meter_count: usize,
}

impl<'a, M: EvaluateFamily> Aggregator<'a, M> {
    pub fn new(module: &'a M, pk: &'a PublicKey, rk: &'a RelinKey, precision: Precision, meter_count: usize) -> Self {
        Self {
            module,
            pk,
            rk,
            precision,
            meter_count,
        }
    }

    fn encrypt_scalar(&self, value: i64) -> Result<Ciphertext> {
        Ok(self
            .module
            .encrypt(&encode_replicated(self.module, value)?, self.pk)?)
    }

    pub fn aggregate(&self, period: &PeriodId, readings: &[f64]) -> Result<IntervalSums> {
        let _span = info_span!("aggregate", %period).entered();
        if readings.len() != self.meter_count {
            return Err(Error::InvalidInput(format!(
                "{}: {} readings for {} meters",
                period,
                readings.len(),
                self.meter_count
            )));
        }
        if let Some(x) = readings.iter().find(|x| !x.is_finite() || **x <= -1.0) {
            return Err(Error::InvalidInput(format!("{period}: reading {x} outside (-1, inf)")));
        }

        let encrypted: Vec<(Ciphertext, Ciphertext)> = readings
            .par_iter()
            .map(|x| -> Result<(Ciphertext, Ciphertext)> {
                Ok((
                    self.encrypt_scalar(self.precision.log_encode(*x))?,
                    self.encrypt_scalar(self.precision.reciprocal_encode(*x))?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut iter = encrypted.into_iter();
        let (mut log_sum, mut reciprocal_sum) = iter
            .next()
            .ok_or_else(|| Error::InvalidInput(format!("{period}: no readings")))?;
        for (log_ct, reciprocal_ct) in iter {
            self.module.add_inplace(&mut log_sum, &log_ct)?;
            self.module.add_inplace(&mut reciprocal_sum, &reciprocal_ct)?;
            self.module.relinearize_inplace(&mut reciprocal_sum, self.rk)?;
        }

        debug!(
            budget = self.module.estimated_noise_budget(&log_sum),
            "interval sums"
        );
        Ok(IntervalSums {
            period: period.clone(),
            log_sum,
            reciprocal_sum,
        })
    }

    pub fn table_diff(&self, period: &PeriodId, target: &Ciphertext, table: &LookupTable) -> Result<TableDiff> {
        table_diff(self.module, self.rk, period, target, table)
    }
}

/// `target - row` for every input row of `table`, relinearized.
pub fn table_diff<M: EvaluateFamily>(
    module: &M,
    rk: &RelinKey,
    period: &PeriodId,
    target: &Ciphertext,
    table: &LookupTable,
) -> Result<TableDiff> {
    let _span = info_span!("table_diff", function = %table.function(), %period).entered();
    let rows: Vec<Ciphertext> = table
        .inputs()
        .par_iter()
        .map(|row| -> Result<Ciphertext> {
            let mut diff: Ciphertext = module.sub(target, row)?;
            module.relinearize_inplace(&mut diff, rk)?;
            Ok(diff)
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        rows = rows.len(),
        budget = rows
            .iter()
            .map(|ct| module.estimated_noise_budget(ct))
            .min()
            .unwrap_or(0),
        "table difference"
    );
    Ok(TableDiff {
        function: table.function(),
        period: period.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::{Aggregator, IntervalSums};
    use crate::{
        config::{Precision, ProtocolConfig},
        error::Error,
        messages::TableDiff,
        state::PeriodId,
        table::{LookupFunction, LookupTable, TableBuilder},
        testing::TestContext,
    };

    #[test]
    fn log_sum_of_known_readings() {
        let ctx: TestContext = TestContext::new(10);
        let p: Precision = Precision::default();
        let aggregator = Aggregator::new(
            &ctx.module,
            &ctx.keys.evaluation.pk,
            &ctx.keys.evaluation.rk,
            p,
            3,
        );
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap().interval(0);
        let sums: IntervalSums = aggregator.aggregate(&period, &[10.0, 20.0, 5.0]).unwrap();

        // round(32 ln 12) + round(32 ln 22) + round(32 ln 7)
        assert_eq!(80 + 99 + 62, 241);
        let log_sum: Vec<i64> = ctx.decrypt(&sums.log_sum);
        assert!(log_sum[..512].iter().all(|x| *x == 241));
        assert!(log_sum[512..].iter().all(|x| *x == 0));

        let want: i64 = [10.0, 20.0, 5.0].iter().map(|x| p.reciprocal_encode(*x)).sum();
        assert_eq!(ctx.decrypt(&sums.reciprocal_sum)[17], want);
    }

    #[test]
    fn rejects_wrong_meter_count_and_bad_values() {
        let ctx: TestContext = TestContext::new(10);
        let aggregator = Aggregator::new(
            &ctx.module,
            &ctx.keys.evaluation.pk,
            &ctx.keys.evaluation.rk,
            Precision::default(),
            3,
        );
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap();
        assert!(matches!(
            aggregator.aggregate(&period, &[1.0, 2.0]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate(&period, &[1.0, -1.0, 2.0]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            aggregator.aggregate(&period, &[1.0, f64::NAN, 2.0]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn table_difference_rows() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ctx.config(4);
        let plain = TableBuilder::new(&config).build(LookupFunction::LogMean).unwrap();
        let table: LookupTable = plain.encrypt(&ctx.module, &ctx.keys.evaluation.pk).unwrap();
        let aggregator = Aggregator::new(
            &ctx.module,
            &ctx.keys.evaluation.pk,
            &ctx.keys.evaluation.rk,
            config.precision,
            4,
        );
        let target: i64 = plain.inputs()[500];
        let diff: TableDiff = aggregator
            .table_diff(
                &PeriodId::day("2014-01-01").unwrap(),
                &ctx.encrypt_scalar(target),
                &table,
            )
            .unwrap();
        assert_eq!(diff.rows().len(), table.rows());
        let first_row: Vec<i64> = ctx.decrypt(&diff.rows()[0]);
        assert_eq!(first_row[500], 0);
        assert_eq!(first_row[499], 1);
        assert_eq!(first_row[501], -1);
    }
}
