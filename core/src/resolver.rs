use backend::hal::layouts::{Ciphertext, PublicKey, SecretKey};
use rayon::prelude::*;
use tracing::{debug, info_span};

use crate::{
    error::{Error, Result},
    messages::{SelectionQuery, TableDiff},
    table::{CrossingPolicy, TableShape},
    trait_families::ResolveFamily,
};

/// Position of the zero crossing of `values`.
///
/// Returns the first exact zero, or at the first pair of neighbours whose
/// signs change in the direction of `policy`, the one nearer to zero (the
/// lower index on ties).
pub fn find_crossing(values: &[i64], policy: CrossingPolicy) -> Option<usize> {
    for (i, a) in values.iter().enumerate() {
        if *a == 0 {
            return Some(i);
        }
        let Some(b) = values.get(i + 1) else {
            break;
        };
        let crossing: bool = match policy {
            CrossingPolicy::Falling => *a > 0 && *b < 0,
            CrossingPolicy::Rising => *a < 0 && *b > 0,
        };
        if crossing {
            return Some(if b.unsigned_abs() < a.unsigned_abs() { i + 1 } else { i });
        }
    }
    None
}

/// Turns a table difference into a selection query. Holds the secret key;
/// the resolved coordinate never leaves [`IndexResolver::resolve`].
pub struct IndexResolver<'a, M> {
    module: &'a M,
    sk: &'a SecretKey,
    pk: &'a PublicKey,
    shapes: &'a [TableShape],
}

impl<'a, M: ResolveFamily> IndexResolver<'a, M> {
    pub fn new(module: &'a M, sk: &'a SecretKey, pk: &'a PublicKey, shapes: &'a [TableShape]) -> Self {
        Self { module, sk, pk, shapes }
    }

    pub(crate) fn shape(&self, diff: &TableDiff) -> Result<TableShape> {
        self.shapes
            .iter()
            .find(|s| s.function == diff.function)
            .copied()
            .ok_or_else(|| Error::Setup(format!("no table shape for {}", diff.function)))
    }

    pub fn resolve(&self, diff: TableDiff) -> Result<SelectionQuery> {
        let _span = info_span!("resolve", function = %diff.function, period = %diff.period).entered();
        let shape: TableShape = self.shape(&diff)?;
        if diff.rows.len() != shape.rows {
            return Err(Error::InvalidInput(format!(
                "{}: {} difference rows for a table of {} rows",
                diff.function,
                diff.rows.len(),
                shape.rows
            )));
        }

        let row_size: usize = self.module.row_size();
        let decoded: Vec<Vec<i64>> = diff
            .rows
            .par_iter()
            .map(|ct| -> Result<Vec<i64>> {
                let mut values: Vec<i64> = self.module.decode_batch(&self.module.decrypt(ct, self.sk)?);
                values.truncate(row_size);
                Ok(values)
            })
            .collect::<Result<Vec<_>>>()?;
        let mut values: Vec<i64> = decoded.concat();
        values.truncate(shape.entries);

        let index: usize = find_crossing(&values, diff.function.policy()).ok_or(Error::TableDomain {
            function: diff.function,
        })?;
        let (row, col) = (index / row_size, index % row_size);

        let mut col_selector: Vec<i64> = vec![0; row_size];
        col_selector[col] = 1;
        let row_selector: Vec<i64> = (0..row_size)
            .map(|i| col_selector[(i + row) % row_size])
            .collect();

        let query: SelectionQuery = SelectionQuery {
            function: diff.function,
            period: diff.period,
            row_selector: self.encrypt(&row_selector)?,
            col_selector: self.encrypt(&col_selector)?,
        };
        debug!(rows = shape.rows, "query built");
        Ok(query)
    }

    fn encrypt(&self, values: &[i64]) -> Result<Ciphertext> {
        Ok(self
            .module
            .encrypt(&self.module.encode_batch(values)?, self.pk)?)
    }
}

#[cfg(test)]
mod tests {
    use backend::hal::layouts::Ciphertext;
    use proptest::prelude::*;

    use super::{IndexResolver, find_crossing};
    use crate::{
        aggregation::table_diff,
        config::ProtocolConfig,
        error::Error,
        messages::{SelectionQuery, TableDiff},
        state::PeriodId,
        table::{CrossingPolicy, LookupFunction, TableBuilder, TableShape},
        testing::TestContext,
    };

    #[test]
    fn crossing_falling() {
        assert_eq!(find_crossing(&[5, 3, 0, -2], CrossingPolicy::Falling), Some(2));
        assert_eq!(find_crossing(&[5, 3, -1, -4], CrossingPolicy::Falling), Some(2));
        assert_eq!(find_crossing(&[5, 1, -3, -4], CrossingPolicy::Falling), Some(1));
        // tie goes to the lower index
        assert_eq!(find_crossing(&[4, 2, -2, -4], CrossingPolicy::Falling), Some(1));
        assert_eq!(find_crossing(&[-1, -2, -3], CrossingPolicy::Falling), None);
        assert_eq!(find_crossing(&[1, 2, 3], CrossingPolicy::Falling), None);
        assert_eq!(find_crossing(&[], CrossingPolicy::Falling), None);
    }

    #[test]
    fn crossing_rising() {
        assert_eq!(find_crossing(&[-5, -3, 0, 2], CrossingPolicy::Rising), Some(2));
        assert_eq!(find_crossing(&[-5, -3, 1, 4], CrossingPolicy::Rising), Some(2));
        assert_eq!(find_crossing(&[-3, 3, 6], CrossingPolicy::Rising), Some(0));
        // a falling edge is not a rising crossing
        assert_eq!(find_crossing(&[3, -3, -6], CrossingPolicy::Rising), None);
        assert_eq!(find_crossing(&[0], CrossingPolicy::Rising), Some(0));
    }

    proptest! {
        #[test]
        fn crossing_is_nearest_input(
            inputs in proptest::collection::btree_set(-10_000i64..10_000, 2..64)
                .prop_map(|s| s.into_iter().collect::<Vec<i64>>()),
            pick in 0.0f64..1.0,
        ) {
            let mut inputs: Vec<i64> = inputs;
            let lo: i64 = inputs[0];
            let hi: i64 = inputs[inputs.len() - 1];
            let target: i64 = lo + ((hi - lo) as f64 * pick) as i64;
            let diffs: Vec<i64> = inputs.iter().map(|x| target - x).collect();
            let nearest: usize = (0..diffs.len()).min_by_key(|i| diffs[*i].unsigned_abs()).unwrap();
            prop_assert_eq!(find_crossing(&diffs, CrossingPolicy::Falling), Some(nearest));

            // the same table stored in descending order
            inputs.reverse();
            let diffs: Vec<i64> = inputs.iter().map(|x| target - x).collect();
            let nearest: usize = (0..diffs.len()).min_by_key(|i| diffs[*i].unsigned_abs()).unwrap();
            let found: usize = find_crossing(&diffs, CrossingPolicy::Rising).unwrap();
            prop_assert_eq!(diffs[found].unsigned_abs(), diffs[nearest].unsigned_abs());
        }
    }

    fn resolve_at(ctx: &TestContext, function: LookupFunction, target: i64) -> Result<(usize, usize), Error> {
        let config: ProtocolConfig = ctx.config(4);
        let plain = TableBuilder::new(&config).build(function).unwrap();
        let table = plain.encrypt(&ctx.module, &ctx.keys.evaluation.pk).unwrap();
        let shapes: Vec<TableShape> = vec![table.shape()];
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap();
        let diff: TableDiff = table_diff(
            &ctx.module,
            &ctx.keys.evaluation.rk,
            &period,
            &ctx.encrypt_scalar(target),
            &table,
        )
        .unwrap();
        let resolver = IndexResolver::new(&ctx.module, &ctx.keys.sk, &ctx.keys.evaluation.pk, &shapes);
        let query: SelectionQuery = resolver.resolve(diff)?;
        let col: Vec<i64> = ctx.decrypt(&query.col_selector);
        let row: Vec<i64> = ctx.decrypt(&query.row_selector);
        let c: usize = col.iter().position(|x| *x == 1).unwrap();
        assert_eq!(col.iter().filter(|x| **x != 0).count(), 1);
        assert_eq!(row.iter().filter(|x| **x != 0).count(), 1);
        // q1[i] = q0[(i + row) mod row_size]
        let rs: usize = ctx.module.row_size();
        let i: usize = row.iter().position(|x| *x == 1).unwrap();
        Ok(((c + rs - i) % rs, c))
    }

    #[test]
    fn resolves_exact_and_nearest_entries() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ctx.config(4);
        let plain = TableBuilder::new(&config).build(LookupFunction::LogMean).unwrap();

        let target: i64 = plain.inputs()[600];
        assert_eq!(resolve_at(&ctx, LookupFunction::LogMean, target).unwrap(), (1, 88));
        assert_eq!(resolve_at(&ctx, LookupFunction::LogMean, plain.inputs()[0]).unwrap(), (0, 0));

        let harmonic = TableBuilder::new(&config).build(LookupFunction::HarmonicMean).unwrap();
        let target: i64 = harmonic.inputs()[513];
        assert_eq!(resolve_at(&ctx, LookupFunction::HarmonicMean, target).unwrap(), (1, 1));
    }

    #[test]
    fn out_of_domain_input_has_no_crossing() {
        let ctx: TestContext = TestContext::new(10);
        let config: ProtocolConfig = ctx.config(4);
        let plain = TableBuilder::new(&config).build(LookupFunction::LogMean).unwrap();
        let below: i64 = plain.inputs()[0] - 10;
        assert!(matches!(
            resolve_at(&ctx, LookupFunction::LogMean, below),
            Err(Error::TableDomain {
                function: LookupFunction::LogMean
            })
        ));
    }

    #[test]
    fn rejects_wrong_row_count() {
        let ctx: TestContext = TestContext::new(10);
        let shapes: Vec<TableShape> = vec![TableShape {
            function: LookupFunction::Hundredth,
            entries: 10,
            rows: 1,
        }];
        let resolver = IndexResolver::new(&ctx.module, &ctx.keys.sk, &ctx.keys.evaluation.pk, &shapes);
        let rows: Vec<Ciphertext> = vec![ctx.encrypt_scalar(1), ctx.encrypt_scalar(2)];
        let diff: TableDiff = TableDiff {
            function: LookupFunction::Hundredth,
            period: PeriodId::day("2014-01-01").unwrap(),
            rows,
        };
        assert!(matches!(resolver.resolve(diff), Err(Error::InvalidInput(_))));

        let diff: TableDiff = TableDiff {
            function: LookupFunction::LogMean,
            period: PeriodId::day("2014-01-01").unwrap(),
            rows: vec![ctx.encrypt_scalar(1)],
        };
        assert!(matches!(resolver.resolve(diff), Err(Error::Setup(_))));
    }
}
