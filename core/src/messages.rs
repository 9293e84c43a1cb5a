//! Typed messages exchanged between the compute server and the key holder.
//!
//! None of them can be built outside this crate: a [`SelectionQuery`] only
//! comes out of the index resolver (or its persisted form), a
//! [`TableDiff`] only out of a table-difference step.

use backend::hal::layouts::Ciphertext;

use crate::{
    error::Result,
    state::{Consumed, Handoff, PeriodId, StageTag},
    table::LookupFunction,
};

/// `target - input_row[r]` for every input row of one table.
#[derive(Debug)]
pub struct TableDiff {
    pub(crate) function: LookupFunction,
    pub(crate) period: PeriodId,
    pub(crate) rows: Vec<Ciphertext>,
}

impl TableDiff {
    pub fn function(&self) -> LookupFunction {
        self.function
    }

    pub fn period(&self) -> &PeriodId {
        &self.period
    }

    pub fn rows(&self) -> &[Ciphertext] {
        &self.rows
    }

    pub(crate) fn send<H: Handoff>(&self, handoff: &mut H) -> Result<()> {
        handoff.put(StageTag::Diff(self.function), &self.period, &self.rows)
    }

    pub(crate) fn receive<H: Handoff>(
        handoff: &H,
        consumed: &mut Consumed,
        function: LookupFunction,
        period: &PeriodId,
        rows: usize,
    ) -> Result<Self> {
        Ok(Self {
            function,
            period: period.clone(),
            rows: consumed.read(handoff, StageTag::Diff(function), period, rows)?,
        })
    }
}

/// One-hot selection of a table cell `(row, col)`.
///
/// * `col_selector`: 1 at `col`.
/// * `row_selector`: `col_selector` shifted so that rotating it by `-r` lines
///   up with `col_selector` only for `r = row`.
///
/// Consumed by the lookup, never reused.
#[derive(Debug)]
pub struct SelectionQuery {
    pub(crate) function: LookupFunction,
    pub(crate) period: PeriodId,
    pub(crate) row_selector: Ciphertext,
    pub(crate) col_selector: Ciphertext,
}

impl SelectionQuery {
    pub fn function(&self) -> LookupFunction {
        self.function
    }

    pub fn period(&self) -> &PeriodId {
        &self.period
    }

    /// Persisted as row selector, then column selector.
    pub(crate) fn send<H: Handoff>(self, handoff: &mut H) -> Result<()> {
        handoff.put(
            StageTag::Query(self.function),
            &self.period,
            &[self.row_selector, self.col_selector],
        )
    }

    pub(crate) fn receive<H: Handoff>(
        handoff: &H,
        consumed: &mut Consumed,
        function: LookupFunction,
        period: &PeriodId,
    ) -> Result<Self> {
        let mut cts: Vec<Ciphertext> = consumed.read(handoff, StageTag::Query(function), period, 2)?;
        let col_selector: Ciphertext = cts.remove(1);
        let row_selector: Ciphertext = cts.remove(0);
        Ok(Self {
            function,
            period: period.clone(),
            row_selector,
            col_selector,
        })
    }
}

/// The looked-up value, one ciphertext per output component, replicated over
/// the first row.
#[derive(Debug)]
pub struct SelectedOutput {
    pub(crate) function: LookupFunction,
    pub(crate) period: PeriodId,
    pub(crate) components: Vec<Ciphertext>,
}

impl SelectedOutput {
    pub fn function(&self) -> LookupFunction {
        self.function
    }

    pub fn period(&self) -> &PeriodId {
        &self.period
    }

    pub fn components(&self) -> &[Ciphertext] {
        &self.components
    }

    pub fn into_components(self) -> Vec<Ciphertext> {
        self.components
    }
}

/// Fixed-point HM/AM ratio of a day, the only ciphertext the result
/// decryptor accepts.
#[derive(Debug)]
pub struct FinalCiphertext {
    pub(crate) period: PeriodId,
    pub(crate) ct: Ciphertext,
}

impl FinalCiphertext {
    pub fn period(&self) -> &PeriodId {
        &self.period
    }

    pub(crate) fn send<H: Handoff>(&self, handoff: &mut H) -> Result<()> {
        handoff.put(StageTag::Final, &self.period, std::slice::from_ref(&self.ct))
    }

    pub(crate) fn receive<H: Handoff>(handoff: &H, consumed: &mut Consumed, period: &PeriodId) -> Result<Self> {
        let mut cts: Vec<Ciphertext> = consumed.read(handoff, StageTag::Final, period, 1)?;
        Ok(Self {
            period: period.clone(),
            ct: cts.remove(0),
        })
    }
}
