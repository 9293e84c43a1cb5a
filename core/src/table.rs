//! Discretised lookup tables.
//!
//! Every nonlinear step of the protocol is a [`LookupFunction`]: an input
//! table listing each reachable input value and one or two output tables at
//! the same positions. [`TableBuilder`] derives the plaintext tables from the
//! protocol parameters; [`PlainTable::encrypt`] packs them into ciphertext
//! rows of `row_size` slots.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
    str::FromStr,
};

use backend::hal::layouts::{Ciphertext, PublicKey};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use tracing::{debug, info};
use utils::map::Map;

use crate::{
    config::{Precision, ProtocolConfig, ReadingDomain},
    error::{Error, Result},
    state::{read_ciphertexts, write_atomic, write_ciphertexts},
    trait_families::EvaluateFamily,
};

/// Rounds to the nearest integer, halves away from zero.
pub fn round_half_up(x: f64) -> i64 {
    x.round() as i64
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupFunction {
    /// Interval log-sum to mean log: `round(i / M)`.
    LogMean,
    /// Interval reciprocal-log-sum to harmonic mean of logs: `round(P * P2 * M / i)`.
    HarmonicMean,
    /// Day sum of log means to `round(2^s / i)`, split in two digits.
    InverseSum,
    /// Day sum of harmonic means, split in two digits.
    HarmonicSum,
    /// Cross term scale correction: `round(i / base)`.
    Hundredth,
}

/// Direction in which a table difference `target - input[i]` changes sign.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossingPolicy {
    /// Ascending input table: differences go from positive to negative.
    Falling,
    /// Descending input table: differences go from negative to positive.
    Rising,
}

impl LookupFunction {
    pub const ALL: [LookupFunction; 5] = [
        LookupFunction::LogMean,
        LookupFunction::HarmonicMean,
        LookupFunction::InverseSum,
        LookupFunction::HarmonicSum,
        LookupFunction::Hundredth,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LookupFunction::LogMean => "log_mean",
            LookupFunction::HarmonicMean => "harmonic_mean",
            LookupFunction::InverseSum => "inverse_sum",
            LookupFunction::HarmonicSum => "harmonic_sum",
            LookupFunction::Hundredth => "hundredth",
        }
    }

    pub(crate) fn code(&self) -> u32 {
        match self {
            LookupFunction::LogMean => 1,
            LookupFunction::HarmonicMean => 2,
            LookupFunction::InverseSum => 3,
            LookupFunction::HarmonicSum => 4,
            LookupFunction::Hundredth => 5,
        }
    }

    /// Number of output tables.
    pub fn output_count(&self) -> usize {
        match self {
            LookupFunction::InverseSum | LookupFunction::HarmonicSum => 2,
            _ => 1,
        }
    }

    pub fn policy(&self) -> CrossingPolicy {
        match self {
            LookupFunction::HarmonicMean => CrossingPolicy::Rising,
            _ => CrossingPolicy::Falling,
        }
    }
}

impl fmt::Display for LookupFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LookupFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LookupFunction::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown lookup function {s:?}")))
    }
}

/// Public layout of a table, all the key holder knows about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableShape {
    pub function: LookupFunction,
    /// Meaningful entries; the last row is padded beyond them.
    pub entries: usize,
    pub rows: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainTable {
    function: LookupFunction,
    meter_count: usize,
    inputs: Vec<i64>,
    outputs: Vec<Vec<i64>>,
}

impl PlainTable {
    pub fn function(&self) -> LookupFunction {
        self.function
    }

    pub fn meter_count(&self) -> usize {
        self.meter_count
    }

    pub fn entries(&self) -> usize {
        self.inputs.len()
    }

    pub fn inputs(&self) -> &[i64] {
        &self.inputs
    }

    pub fn outputs(&self, k: usize) -> &[i64] {
        &self.outputs[k]
    }

    pub fn rows(&self, row_size: usize) -> usize {
        self.entries().div_ceil(row_size)
    }

    pub fn shape(&self, row_size: usize) -> TableShape {
        TableShape {
            function: self.function,
            entries: self.entries(),
            rows: self.rows(row_size),
        }
    }

    /// Smallest and largest value of output `k`.
    pub fn output_bounds(&self, k: usize) -> (i64, i64) {
        let out: &[i64] = &self.outputs[k];
        let min: i64 = out.iter().copied().min().unwrap_or(0);
        let max: i64 = out.iter().copied().max().unwrap_or(0);
        (min, max)
    }

    /// Outputs at the position of `input`, if it is in the domain.
    pub fn select(&self, input: i64) -> Option<Vec<i64>> {
        let i: usize = self.inputs.iter().position(|x| *x == input)?;
        Some(self.outputs.iter().map(|out| out[i]).collect())
    }

    /// Packs the table in rows of `row_size` slots and encrypts every row.
    pub fn encrypt<M: EvaluateFamily>(&self, module: &M, pk: &PublicKey) -> Result<LookupTable> {
        let row_size: usize = module.row_size();
        let rows: usize = self.rows(row_size);
        if rows > row_size {
            return Err(Error::Setup(format!(
                "{}: {} rows exceed the row size {}",
                self.function, rows, row_size
            )));
        }
        let table: LookupTable = LookupTable {
            function: self.function,
            meter_count: self.meter_count,
            entries: self.entries(),
            inputs: encrypt_rows(module, pk, &self.inputs)?,
            outputs: self
                .outputs
                .iter()
                .map(|out| encrypt_rows(module, pk, out))
                .collect::<Result<Vec<_>>>()?,
        };
        debug!(function = %self.function, entries = table.entries, rows, "table encrypted");
        Ok(table)
    }
}

fn encrypt_rows<M: EvaluateFamily>(module: &M, pk: &PublicKey, values: &[i64]) -> Result<Vec<Ciphertext>> {
    values
        .par_chunks(module.row_size())
        .map(|chunk| -> Result<Ciphertext> { Ok(module.encrypt(&module.encode_batch(chunk)?, pk)?) })
        .collect()
}

/// Encrypted table: input rows and, per output component, the rows at the
/// same positions.
#[derive(Clone, Debug)]
pub struct LookupTable {
    function: LookupFunction,
    meter_count: usize,
    entries: usize,
    inputs: Vec<Ciphertext>,
    outputs: Vec<Vec<Ciphertext>>,
}

impl LookupTable {
    pub fn function(&self) -> LookupFunction {
        self.function
    }

    pub fn meter_count(&self) -> usize {
        self.meter_count
    }

    pub fn rows(&self) -> usize {
        self.inputs.len()
    }

    pub fn shape(&self) -> TableShape {
        TableShape {
            function: self.function,
            entries: self.entries,
            rows: self.rows(),
        }
    }

    pub fn inputs(&self) -> &[Ciphertext] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Vec<Ciphertext>] {
        &self.outputs
    }

    /// Checks the row layout against `row_size`.
    pub fn check(&self, row_size: usize) -> Result<()> {
        let rows: usize = self.rows();
        if self.outputs.len() != self.function.output_count() {
            return Err(Error::Setup(format!(
                "{}: {} output tables, expected {}",
                self.function,
                self.outputs.len(),
                self.function.output_count()
            )));
        }
        if let Some(out) = self.outputs.iter().find(|out| out.len() != rows) {
            return Err(Error::Setup(format!(
                "{}: {} output rows for {} input rows",
                self.function,
                out.len(),
                rows
            )));
        }
        if rows == 0 || rows > row_size || self.entries.div_ceil(row_size) != rows {
            return Err(Error::Setup(format!(
                "{}: {} entries in {} rows of {} slots",
                self.function, self.entries, rows, row_size
            )));
        }
        Ok(())
    }
}

/// The encrypted tables of one meter count.
pub struct TableSet {
    meter_count: usize,
    tables: Map<LookupFunction, LookupTable>,
}

impl TableSet {
    pub fn new(meter_count: usize) -> Self {
        Self {
            meter_count,
            tables: Map::new(),
        }
    }

    pub fn encrypt<M: EvaluateFamily>(module: &M, pk: &PublicKey, plain: &[PlainTable]) -> Result<Self> {
        let meter_count: usize = plain.first().map(|t| t.meter_count()).unwrap_or(0);
        let mut set: TableSet = TableSet::new(meter_count);
        for table in plain {
            set.insert(table.encrypt(module, pk)?)?;
        }
        Ok(set)
    }

    pub fn meter_count(&self) -> usize {
        self.meter_count
    }

    pub fn insert(&mut self, table: LookupTable) -> Result<()> {
        if table.meter_count() != self.meter_count {
            return Err(Error::Setup(format!(
                "{}: table for {} meters in a set for {}",
                table.function(),
                table.meter_count(),
                self.meter_count
            )));
        }
        self.tables.insert(table.function(), table);
        Ok(())
    }

    pub fn get(&self, function: LookupFunction) -> Result<&LookupTable> {
        self.tables
            .get(&function)
            .ok_or_else(|| Error::Setup(format!("no {} table for {} meters", function, self.meter_count)))
    }

    pub fn shapes(&self) -> Vec<TableShape> {
        LookupFunction::ALL
            .iter()
            .filter_map(|f| self.tables.get(f).map(LookupTable::shape))
            .collect()
    }
}

/// Derives the plaintext tables from the protocol parameters.
pub struct TableBuilder {
    meter_count: usize,
    intervals_per_day: usize,
    precision: Precision,
    domain: ReadingDomain,
    plain_modulus: u64,
}

impl TableBuilder {
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            meter_count: config.meter_count,
            intervals_per_day: config.intervals_per_day,
            precision: config.precision,
            domain: config.reading_domain,
            plain_modulus: config.he.plain_modulus,
        }
    }

    pub fn build(&self, function: LookupFunction) -> Result<PlainTable> {
        match function {
            LookupFunction::LogMean => self.log_mean(),
            LookupFunction::HarmonicMean => self.harmonic_mean(),
            LookupFunction::InverseSum => self.inverse_sum(&self.log_mean()?),
            LookupFunction::HarmonicSum => self.harmonic_sum(&self.harmonic_mean()?),
            LookupFunction::Hundredth => {
                let inverse: PlainTable = self.inverse_sum(&self.log_mean()?)?;
                let harmonic: PlainTable = self.harmonic_sum(&self.harmonic_mean()?)?;
                self.hundredth(&inverse, &harmonic)
            }
        }
    }

    /// All five tables, in [`LookupFunction::ALL`] order.
    pub fn build_all(&self) -> Result<Vec<PlainTable>> {
        let log_mean: PlainTable = self.log_mean()?;
        let harmonic_mean: PlainTable = self.harmonic_mean()?;
        let inverse_sum: PlainTable = self.inverse_sum(&log_mean)?;
        let harmonic_sum: PlainTable = self.harmonic_sum(&harmonic_mean)?;
        let hundredth: PlainTable = self.hundredth(&inverse_sum, &harmonic_sum)?;
        Ok(vec![log_mean, harmonic_mean, inverse_sum, harmonic_sum, hundredth])
    }

    pub fn shapes(&self, row_size: usize) -> Result<Vec<TableShape>> {
        Ok(self.build_all()?.iter().map(|t| t.shape(row_size)).collect())
    }

    fn log_mean(&self) -> Result<PlainTable> {
        let m: i64 = self.meter_count as i64;
        let lo: i64 = m * self.precision.log_encode(self.domain.min);
        let hi: i64 = m * self.precision.log_encode(self.domain.max);
        let inputs: Vec<i64> = (lo..=hi).collect();
        let outputs: Vec<i64> = inputs
            .iter()
            .map(|i| round_half_up(*i as f64 / m as f64))
            .collect();
        self.finish(LookupFunction::LogMean, inputs, vec![outputs])
    }

    fn harmonic_mean(&self) -> Result<PlainTable> {
        let m: i64 = self.meter_count as i64;
        // the reciprocal encoding decreases with the reading
        let lo: i64 = m * self.precision.reciprocal_encode(self.domain.max);
        let hi: i64 = m * self.precision.reciprocal_encode(self.domain.min);
        if lo <= 0 {
            return Err(Error::Setup(format!(
                "reciprocal scale {} too small for readings up to {}",
                self.precision.reciprocal_scale, self.domain.max
            )));
        }
        let scale: f64 = self.precision.log_scale as f64 * self.precision.reciprocal_scale as f64 * m as f64;
        let inputs: Vec<i64> = (lo..=hi).rev().collect();
        let outputs: Vec<i64> = inputs
            .iter()
            .map(|i| round_half_up(scale / *i as f64))
            .collect();
        self.finish(LookupFunction::HarmonicMean, inputs, vec![outputs])
    }

    fn inverse_sum(&self, log_mean: &PlainTable) -> Result<PlainTable> {
        let (min, max) = log_mean.output_bounds(0);
        let h: i64 = self.intervals_per_day as i64;
        if min <= 0 {
            return Err(Error::Setup(format!("log means must be positive, found {min}")));
        }
        let base: i64 = self.precision.split_base as i64;
        let numerator: f64 = (self.precision.inverse_scale_log2 as f64).exp2();
        let inputs: Vec<i64> = (h * min..=h * max).collect();
        let (high, low): (Vec<i64>, Vec<i64>) = inputs
            .iter()
            .map(|i| {
                let v: i64 = round_half_up(numerator / *i as f64);
                (v / base, v % base)
            })
            .unzip();
        self.finish(LookupFunction::InverseSum, inputs, vec![high, low])
    }

    fn harmonic_sum(&self, harmonic_mean: &PlainTable) -> Result<PlainTable> {
        let (min, max) = harmonic_mean.output_bounds(0);
        let h: i64 = self.intervals_per_day as i64;
        let base: i64 = self.precision.split_base as i64;
        let inputs: Vec<i64> = (h * min..=h * max).collect();
        let (high, low): (Vec<i64>, Vec<i64>) = inputs.iter().map(|i| (i / base, i % base)).unzip();
        self.finish(LookupFunction::HarmonicSum, inputs, vec![high, low])
    }

    /// Domain of `AM1 * HM2 + AM2 * HM1` over the output ranges of the two
    /// sum tables.
    fn hundredth(&self, inverse_sum: &PlainTable, harmonic_sum: &PlainTable) -> Result<PlainTable> {
        let (am1_min, am1_max) = inverse_sum.output_bounds(0);
        let (am2_min, am2_max) = inverse_sum.output_bounds(1);
        let (hm1_min, hm1_max) = harmonic_sum.output_bounds(0);
        let (hm2_min, hm2_max) = harmonic_sum.output_bounds(1);
        let lo: i64 = am1_min * hm2_min + am2_min * hm1_min;
        let hi: i64 = am1_max * hm2_max + am2_max * hm1_max;
        let base: f64 = self.precision.split_base as f64;

        let final_max: i64 = am1_max * hm1_max + round_half_up(hi as f64 / base);
        self.check_magnitude(LookupFunction::Hundredth, final_max)?;

        let inputs: Vec<i64> = (lo..=hi).collect();
        let outputs: Vec<i64> = inputs
            .iter()
            .map(|i| round_half_up(*i as f64 / base))
            .collect();
        self.finish(LookupFunction::Hundredth, inputs, vec![outputs])
    }

    fn check_magnitude(&self, function: LookupFunction, value: i64) -> Result<()> {
        if value.unsigned_abs() > self.plain_modulus / 2 {
            return Err(Error::Setup(format!(
                "{}: value {} does not fit the plaintext modulus {}",
                function, value, self.plain_modulus
            )));
        }
        Ok(())
    }

    fn finish(&self, function: LookupFunction, inputs: Vec<i64>, outputs: Vec<Vec<i64>>) -> Result<PlainTable> {
        if inputs.is_empty() {
            return Err(Error::Setup(format!("{function}: empty domain")));
        }
        for v in inputs.iter().chain(outputs.iter().flatten()) {
            self.check_magnitude(function, *v)?;
        }
        debug!(
            %function,
            entries = inputs.len(),
            first = inputs[0],
            last = inputs[inputs.len() - 1],
            "plain table built"
        );
        Ok(PlainTable {
            function,
            meter_count: self.meter_count,
            inputs,
            outputs,
        })
    }
}

const TABLE_MAGIC: u32 = 0x4f42_5442;
const TABLE_VERSION: u32 = 1;

/// Encrypted tables on disk: `{function}_input_{M}` and
/// `{function}_output{k}_{M}`, `k` counting from 1.
pub struct TableStore {
    dir: PathBuf,
}

struct TableHeader {
    function: LookupFunction,
    meter_count: usize,
    entries: usize,
}

impl TableStore {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub fn input_path(&self, function: LookupFunction, meter_count: usize) -> PathBuf {
        self.dir.join(format!("{function}_input_{meter_count}"))
    }

    pub fn output_path(&self, function: LookupFunction, k: usize, meter_count: usize) -> PathBuf {
        self.dir.join(format!("{function}_output{}_{meter_count}", k + 1))
    }

    pub fn save(&self, table: &LookupTable) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|err| Error::Setup(format!("{}: {}", self.dir.display(), err)))?;
        let header: TableHeader = TableHeader {
            function: table.function,
            meter_count: table.meter_count,
            entries: table.entries,
        };
        save_rows(&self.input_path(table.function, table.meter_count), &header, &table.inputs)?;
        for (k, rows) in table.outputs.iter().enumerate() {
            save_rows(&self.output_path(table.function, k, table.meter_count), &header, rows)?;
        }
        Ok(())
    }

    pub fn load(&self, function: LookupFunction, meter_count: usize) -> Result<LookupTable> {
        let (header, inputs) = load_rows(&self.input_path(function, meter_count))?;
        if header.function != function || header.meter_count != meter_count {
            return Err(Error::Setup(format!(
                "{}: holds the {} table for {} meters",
                self.input_path(function, meter_count).display(),
                header.function,
                header.meter_count
            )));
        }
        let outputs: Vec<Vec<Ciphertext>> = (0..function.output_count())
            .map(|k| {
                let path: PathBuf = self.output_path(function, k, meter_count);
                let (out_header, rows) = load_rows(&path)?;
                if out_header.function != function
                    || out_header.meter_count != meter_count
                    || out_header.entries != header.entries
                {
                    return Err(Error::Setup(format!("{}: does not match the input table", path.display())));
                }
                Ok(rows)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LookupTable {
            function,
            meter_count,
            entries: header.entries,
            inputs,
            outputs,
        })
    }

    pub fn save_set(&self, set: &TableSet) -> Result<()> {
        for function in LookupFunction::ALL {
            self.save(set.get(function)?)?;
        }
        info!(dir = %self.dir.display(), meters = set.meter_count(), "tables saved");
        Ok(())
    }

    pub fn load_set(&self, meter_count: usize) -> Result<TableSet> {
        let mut set: TableSet = TableSet::new(meter_count);
        for function in LookupFunction::ALL {
            set.insert(self.load(function, meter_count)?)?;
        }
        Ok(set)
    }
}

fn save_rows(path: &Path, header: &TableHeader, rows: &[Ciphertext]) -> Result<()> {
    write_atomic(path, |writer: &mut BufWriter<&mut File>| {
        writer.write_u32::<LittleEndian>(TABLE_MAGIC)?;
        writer.write_u32::<LittleEndian>(TABLE_VERSION)?;
        writer.write_u32::<LittleEndian>(header.function.code())?;
        writer.write_u64::<LittleEndian>(header.meter_count as u64)?;
        writer.write_u64::<LittleEndian>(header.entries as u64)?;
        write_ciphertexts(writer, rows)
    })
    .map_err(|err| Error::Setup(format!("{}: {}", path.display(), err)))
}

fn load_rows(path: &Path) -> Result<(TableHeader, Vec<Ciphertext>)> {
    let setup = |err: io::Error| Error::Setup(format!("{}: {}", path.display(), err));
    let bytes: Vec<u8> = fs::read(path).map_err(setup)?;
    let mut reader: &[u8] = &bytes;
    let magic: u32 = reader.read_u32::<LittleEndian>().map_err(setup)?;
    let version: u32 = reader.read_u32::<LittleEndian>().map_err(setup)?;
    if magic != TABLE_MAGIC || version != TABLE_VERSION {
        return Err(Error::Setup(format!("{}: not a table file", path.display())));
    }
    let code: u32 = reader.read_u32::<LittleEndian>().map_err(setup)?;
    let function: LookupFunction = LookupFunction::ALL
        .into_iter()
        .find(|f| f.code() == code)
        .ok_or_else(|| Error::Setup(format!("{}: unknown function code {}", path.display(), code)))?;
    let meter_count: usize = reader.read_u64::<LittleEndian>().map_err(setup)? as usize;
    let entries: usize = reader.read_u64::<LittleEndian>().map_err(setup)? as usize;
    let rows: Vec<Ciphertext> = read_ciphertexts(&mut reader).map_err(setup)?;
    if !reader.is_empty() {
        return Err(Error::Setup(format!("{}: trailing bytes", path.display())));
    }
    Ok((
        TableHeader {
            function,
            meter_count,
            entries,
        },
        rows,
    ))
}
