use backend::hal::layouts::{Ciphertext, GaloisKeys, RelinKey};
use itertools::izip;
use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::{
    accumulate::{accumulate, fold_row},
    error::{Error, Result},
    messages::{SelectedOutput, SelectionQuery},
    table::LookupTable,
    trait_families::EvaluateFamily,
};

/// Retrieves the table cell a [`SelectionQuery`] points at without learning
/// which one it is.
///
/// For every row `r`: `mask_r = rotate(row_selector, -r) * col_selector` is
/// one-hot at the selected column for the selected row and zero elsewhere;
/// `sum_r mask_r * output_r` isolates the cell, and a final row fold copies it
/// to every slot.
pub struct ObliviousLookup<'a, M> {
    module: &'a M,
    rk: &'a RelinKey,
    gk: &'a GaloisKeys,
}

impl<'a, M: EvaluateFamily> ObliviousLookup<'a, M> {
    pub fn new(module: &'a M, rk: &'a RelinKey, gk: &'a GaloisKeys) -> Self {
        Self { module, rk, gk }
    }

    pub fn lookup(&self, query: SelectionQuery, table: &LookupTable) -> Result<SelectedOutput> {
        let _span = info_span!("lookup", function = %table.function(), period = %query.period).entered();
        if query.function != table.function() {
            return Err(Error::InvalidInput(format!(
                "{} query applied to the {} table",
                query.function,
                table.function()
            )));
        }
        table.check(self.module.row_size())?;

        let cells: Vec<Vec<Ciphertext>> = (0..table.rows())
            .into_par_iter()
            .map(|r| -> Result<Vec<Ciphertext>> {
                let mut mask: Ciphertext = self
                    .module
                    .rotate_rows(&query.row_selector, -(r as i64), self.gk)?;
                self.module.multiply_inplace(&mut mask, &query.col_selector)?;
                self.module.relinearize_inplace(&mut mask, self.rk)?;
                table
                    .outputs()
                    .iter()
                    .map(|out| -> Result<Ciphertext> {
                        let mut cell: Ciphertext = self.module.multiply(&mask, &out[r])?;
                        self.module.relinearize_inplace(&mut cell, self.rk)?;
                        Ok(cell)
                    })
                    .collect()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sums: Vec<Option<Ciphertext>> = vec![None; table.outputs().len()];
        for row in cells.iter() {
            for (sum, cell) in izip!(sums.iter_mut(), row.iter()) {
                accumulate(self.module, sum, cell)?;
            }
        }

        let components: Vec<Ciphertext> = sums
            .into_iter()
            .map(|sum| -> Result<Ciphertext> {
                let mut ct: Ciphertext =
                    sum.ok_or_else(|| Error::Setup(format!("{}: table has no rows", table.function())))?;
                fold_row(self.module, &mut ct, self.rk, self.gk)?;
                Ok(ct)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            budget = components
                .iter()
                .map(|ct| self.module.estimated_noise_budget(ct))
                .min()
                .unwrap_or(0),
            "selected output"
        );
        Ok(SelectedOutput {
            function: query.function,
            period: query.period,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use backend::hal::layouts::Ciphertext;

    use super::ObliviousLookup;
    use crate::{
        aggregation::table_diff,
        config::ProtocolConfig,
        error::Error,
        messages::{SelectedOutput, SelectionQuery},
        resolver::IndexResolver,
        state::PeriodId,
        table::{LookupFunction, LookupTable, PlainTable, TableBuilder, TableShape},
        testing::TestContext,
    };

    /// Query for cell `(row, col)` built the way the resolver builds it.
    fn query_at(ctx: &TestContext, function: LookupFunction, row: usize, col: usize) -> SelectionQuery {
        let rs: usize = ctx.module.row_size();
        let mut q0: Vec<i64> = vec![0; rs];
        q0[col] = 1;
        let q1: Vec<i64> = (0..rs).map(|i| q0[(i + row) % rs]).collect();
        SelectionQuery {
            function,
            period: PeriodId::day("2014-01-01").unwrap(),
            row_selector: ctx.encrypt_values(&q1),
            col_selector: ctx.encrypt_values(&q0),
        }
    }

    fn setup(ctx: &TestContext, function: LookupFunction) -> (PlainTable, LookupTable) {
        let config: ProtocolConfig = ctx.config(4);
        let plain: PlainTable = TableBuilder::new(&config).build(function).unwrap();
        let table: LookupTable = plain.encrypt(&ctx.module, &ctx.keys.evaluation.pk).unwrap();
        (plain, table)
    }

    #[test]
    fn selects_every_cell() {
        let ctx: TestContext = TestContext::new(10);
        let rs: usize = ctx.module.row_size();
        let (plain, table) = setup(&ctx, LookupFunction::LogMean);
        let lookup = ObliviousLookup::new(&ctx.module, &ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk);
        for (row, col) in [(0, 0), (0, 1), (0, 511), (1, 0), (1, 96)] {
            let out: SelectedOutput = lookup
                .lookup(query_at(&ctx, LookupFunction::LogMean, row, col), &table)
                .unwrap();
            assert_eq!(out.components().len(), 1);
            let have: Vec<i64> = ctx.decrypt(&out.components()[0]);
            let want: i64 = plain.outputs(0)[row * rs + col];
            assert!(have[..rs].iter().all(|x| *x == want), "({row}, {col})");
            assert!(have[rs..].iter().all(|x| *x == 0));
        }
    }

    #[test]
    fn selects_both_components() {
        let ctx: TestContext = TestContext::new(10);
        let rs: usize = ctx.module.row_size();
        let (plain, table) = setup(&ctx, LookupFunction::InverseSum);
        let lookup = ObliviousLookup::new(&ctx.module, &ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk);
        let (row, col) = (table.rows() - 1, 3);
        let out: SelectedOutput = lookup
            .lookup(query_at(&ctx, LookupFunction::InverseSum, row, col), &table)
            .unwrap();
        let components: Vec<Ciphertext> = out.into_components();
        assert_eq!(components.len(), 2);
        for (k, ct) in components.iter().enumerate() {
            assert_eq!(ctx.decrypt(ct)[7], plain.outputs(k)[row * rs + col]);
        }
    }

    #[test]
    fn mismatched_query_is_rejected() {
        let ctx: TestContext = TestContext::new(10);
        let (_, table) = setup(&ctx, LookupFunction::LogMean);
        let lookup = ObliviousLookup::new(&ctx.module, &ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk);
        assert!(matches!(
            lookup.lookup(query_at(&ctx, LookupFunction::Hundredth, 0, 0), &table),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn diff_resolve_lookup_returns_the_mean() {
        let ctx: TestContext = TestContext::new(10);
        let (plain, table) = setup(&ctx, LookupFunction::LogMean);
        let shapes: Vec<TableShape> = vec![table.shape()];
        let resolver = IndexResolver::new(&ctx.module, &ctx.keys.sk, &ctx.keys.evaluation.pk, &shapes);
        let lookup = ObliviousLookup::new(&ctx.module, &ctx.keys.evaluation.rk, &ctx.keys.evaluation.gk);
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap().interval(5);

        // four meters at 50 and one step above: sum = 4 * 126 + 1
        let target: i64 = 4 * 126 + 1;
        let run = || -> i64 {
            let diff = table_diff(
                &ctx.module,
                &ctx.keys.evaluation.rk,
                &period,
                &ctx.encrypt_scalar(target),
                &table,
            )
            .unwrap();
            let query: SelectionQuery = resolver.resolve(diff).unwrap();
            let out: SelectedOutput = lookup.lookup(query, &table).unwrap();
            ctx.decrypt(&out.components()[0])[0]
        };
        let first: i64 = run();
        assert_eq!(first, 126);
        assert_eq!(Some(vec![first]), plain.select(target));
        // the same inputs give the same output
        assert_eq!(run(), first);
    }
}
