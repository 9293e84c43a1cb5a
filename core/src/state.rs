//! Intermediate state exchanged between the two roles.
//!
//! Every message is a fixed-count sequence of ciphertexts keyed by a
//! [`StageTag`] and a [`PeriodId`]. Reading a message leaves it in place; the
//! consuming stage removes its inputs through [`Consumed::release`] only once
//! its own outputs are stored, so a failed stage can be retried.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use backend::hal::layouts::{Ciphertext, ReaderFrom, WriterTo};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tempfile::NamedTempFile;
use tracing::debug;
use utils::map::Map;

use crate::{
    error::{Error, Result},
    table::LookupFunction,
};

const STATE_MAGIC: u32 = 0x4f42_5354;
const STATE_VERSION: u32 = 1;

/// A day, or one interval of a day.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeriodId {
    date: String,
    interval: Option<u32>,
}

impl PeriodId {
    /// `date` is used verbatim in file names: ASCII digits and `-` only.
    pub fn day(date: &str) -> Result<Self> {
        if date.is_empty() || !date.chars().all(|c| c.is_ascii_digit() || c == '-') {
            return Err(Error::InvalidInput(format!("malformed date {date:?}")));
        }
        Ok(Self {
            date: date.to_string(),
            interval: None,
        })
    }

    pub fn interval(&self, interval: usize) -> Self {
        Self {
            date: self.date.clone(),
            interval: Some(interval as u32),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn interval_index(&self) -> Option<u32> {
        self.interval
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interval {
            Some(h) => write!(f, "{}_h{:02}", self.date, h),
            None => write!(f, "{}", self.date),
        }
    }
}

/// Kind of message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageTag {
    /// Table difference, one ciphertext per input-table row.
    Diff(LookupFunction),
    /// Selection query: row selector, then column selector.
    Query(LookupFunction),
    /// Day running sum of a selected output.
    Running(LookupFunction),
    /// `AM1 * HM2 + AM2 * HM1`.
    CrossTerm,
    /// `AM1 * HM1`, waiting for the corrected cross term.
    Product,
    Final,
}

impl StageTag {
    pub fn code(&self) -> u32 {
        match self {
            StageTag::Diff(f) => 0x100 | f.code(),
            StageTag::Query(f) => 0x200 | f.code(),
            StageTag::Running(f) => 0x300 | f.code(),
            StageTag::CrossTerm => 0x400,
            StageTag::Product => 0x500,
            StageTag::Final => 0x600,
        }
    }
}

impl fmt::Display for StageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageTag::Diff(func) => write!(f, "diff_{func}"),
            StageTag::Query(func) => write!(f, "query_{func}"),
            StageTag::Running(func) => write!(f, "running_{func}"),
            StageTag::CrossTerm => write!(f, "cross"),
            StageTag::Product => write!(f, "product"),
            StageTag::Final => write!(f, "final"),
        }
    }
}

/// Message channel between the compute server and the key holder.
pub trait Handoff {
    /// Stores `cts` under `(tag, period)`, superseding any previous message.
    fn put(&mut self, tag: StageTag, period: &PeriodId, cts: &[Ciphertext]) -> Result<()>;

    /// Returns the message under `(tag, period)`, which must hold exactly
    /// `expected` ciphertexts.
    fn get(&self, tag: StageTag, period: &PeriodId, expected: usize) -> Result<Vec<Ciphertext>>;

    /// Discards the message under `(tag, period)`. Removing an absent message
    /// is not an error.
    fn remove(&mut self, tag: StageTag, period: &PeriodId) -> Result<()>;
}

/// Inputs read by a stage, removed together once the stage has stored its
/// outputs.
#[derive(Default, Debug)]
pub struct Consumed {
    keys: Vec<(StageTag, PeriodId)>,
}

impl Consumed {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`Handoff::get`], recording the message for release.
    pub fn read<H: Handoff>(
        &mut self,
        handoff: &H,
        tag: StageTag,
        period: &PeriodId,
        expected: usize,
    ) -> Result<Vec<Ciphertext>> {
        let cts: Vec<Ciphertext> = handoff.get(tag, period, expected)?;
        self.mark(tag, period);
        Ok(cts)
    }

    /// Records a message read elsewhere.
    pub fn mark(&mut self, tag: StageTag, period: &PeriodId) {
        self.keys.push((tag, period.clone()));
    }

    pub fn release<H: Handoff>(self, handoff: &mut H) -> Result<()> {
        self.keys
            .into_iter()
            .try_for_each(|(tag, period)| handoff.remove(tag, &period))
    }
}

fn check_count(key: &str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::handoff(
            key,
            format!("expected {expected} ciphertexts, found {found}"),
        ));
    }
    Ok(())
}

/// In-process [`Handoff`].
#[derive(Default)]
pub struct MemoryHandoff {
    messages: Map<(StageTag, PeriodId), Vec<Ciphertext>>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Handoff for MemoryHandoff {
    fn put(&mut self, tag: StageTag, period: &PeriodId, cts: &[Ciphertext]) -> Result<()> {
        self.messages.insert((tag, period.clone()), cts.to_vec());
        Ok(())
    }

    fn get(&self, tag: StageTag, period: &PeriodId, expected: usize) -> Result<Vec<Ciphertext>> {
        let key: String = format!("{tag}_{period}");
        let cts: &Vec<Ciphertext> = self
            .messages
            .get(&(tag, period.clone()))
            .ok_or_else(|| Error::handoff(&key, "missing"))?;
        check_count(&key, expected, cts.len())?;
        Ok(cts.clone())
    }

    fn remove(&mut self, tag: StageTag, period: &PeriodId) -> Result<()> {
        self.messages.remove(&(tag, period.clone()));
        Ok(())
    }
}

/// File-backed [`Handoff`]: one file `{tag}_{period}` per message.
///
/// File layout, little endian: magic, version, stage code (u32 each),
/// ciphertext count (u64), then the ciphertexts.
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|err| Error::Setup(format!("{}: {}", dir.display(), err)))?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn path(&self, tag: StageTag, period: &PeriodId) -> PathBuf {
        self.dir.join(format!("{tag}_{period}"))
    }
}

impl Handoff for StateStore {
    fn put(&mut self, tag: StageTag, period: &PeriodId, cts: &[Ciphertext]) -> Result<()> {
        let path: PathBuf = self.path(tag, period);
        write_atomic(&path, |writer| write_frame(writer, tag.code(), cts))
            .map_err(|err| Error::handoff(path.display(), err))?;
        debug!(path = %path.display(), count = cts.len(), "state written");
        Ok(())
    }

    fn get(&self, tag: StageTag, period: &PeriodId, expected: usize) -> Result<Vec<Ciphertext>> {
        let path: PathBuf = self.path(tag, period);
        let key: String = path.display().to_string();
        let bytes: Vec<u8> = fs::read(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => Error::handoff(&key, "missing"),
            _ => Error::handoff(&key, err),
        })?;
        let cts: Vec<Ciphertext> = read_frame(&bytes, tag.code()).map_err(|err| Error::handoff(&key, err))?;
        check_count(&key, expected, cts.len())?;
        Ok(cts)
    }

    fn remove(&mut self, tag: StageTag, period: &PeriodId) -> Result<()> {
        let path: PathBuf = self.path(tag, period);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "state consumed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::handoff(path.display(), err)),
        }
    }
}

/// Writes `path` through a temporary file in the same directory, so readers
/// only ever see complete files.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
{
    let dir: &Path = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp: NamedTempFile = NamedTempFile::new_in(dir)?;
    {
        let mut writer: BufWriter<&mut File> = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

pub(crate) fn write_frame<W: Write>(writer: &mut W, code: u32, cts: &[Ciphertext]) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(STATE_MAGIC)?;
    writer.write_u32::<LittleEndian>(STATE_VERSION)?;
    writer.write_u32::<LittleEndian>(code)?;
    write_ciphertexts(writer, cts)
}

pub(crate) fn read_frame(bytes: &[u8], code: u32) -> io::Result<Vec<Ciphertext>> {
    let mut reader: &[u8] = bytes;
    let magic: u32 = reader.read_u32::<LittleEndian>()?;
    if magic != STATE_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("bad magic {magic:#x}")));
    }
    let version: u32 = reader.read_u32::<LittleEndian>()?;
    if version != STATE_VERSION {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unsupported version {version}")));
    }
    let have: u32 = reader.read_u32::<LittleEndian>()?;
    if have != code {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("stage code {have:#x}, expected {code:#x}"),
        ));
    }
    let cts: Vec<Ciphertext> = read_ciphertexts(&mut reader)?;
    if !reader.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} trailing bytes", reader.len()),
        ));
    }
    Ok(cts)
}

pub(crate) fn write_ciphertexts<W: Write>(writer: &mut W, cts: &[Ciphertext]) -> io::Result<()> {
    writer.write_u64::<LittleEndian>(cts.len() as u64)?;
    cts.iter().try_for_each(|ct| ct.write_to(writer))
}

/// Upper bound on a ciphertext count prefix.
const MAX_CIPHERTEXTS: u64 = 1 << 20;

pub(crate) fn read_ciphertexts<R: Read>(reader: &mut R) -> io::Result<Vec<Ciphertext>> {
    let count: u64 = reader.read_u64::<LittleEndian>()?;
    if count > MAX_CIPHERTEXTS {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("{count} ciphertexts")));
    }
    (0..count)
        .map(|_| {
            let mut ct: Ciphertext = Ciphertext::alloc(0);
            ct.read_from(reader)?;
            Ok(ct)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use backend::{
        FheBfv,
        hal::{
            api::{BatchDecode, Decrypt, Encrypt, ModuleNew},
            layouts::{BatchParams, Ciphertext, Module},
        },
    };
    use sampling::source::Source;

    use super::{Consumed, Handoff, MemoryHandoff, PeriodId, StageTag, StateStore};
    use crate::{
        aggregation::encode_replicated, error::Error, keys::KeySet, table::LookupFunction, testing::TestContext,
    };

    fn sample(ctx: &TestContext, count: usize) -> Vec<Ciphertext> {
        (0..count).map(|i| ctx.encrypt_scalar(i as i64 + 1)).collect()
    }

    #[test]
    fn period_names() {
        let day: PeriodId = PeriodId::day("2014-01-01").unwrap();
        assert_eq!(day.to_string(), "2014-01-01");
        assert_eq!(day.interval(3).to_string(), "2014-01-01_h03");
        assert!(PeriodId::day("2014/01/01").is_err());
        assert!(PeriodId::day("").is_err());
        assert_eq!(
            format!("{}_{}", StageTag::Diff(LookupFunction::LogMean), day.interval(3)),
            "diff_log_mean_2014-01-01_h03"
        );
    }

    #[test]
    fn memory_handoff_keeps_messages_until_removed() {
        let ctx: TestContext = TestContext::new(10);
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap();
        let tag: StageTag = StageTag::Query(LookupFunction::Hundredth);
        let mut handoff: MemoryHandoff = MemoryHandoff::new();
        handoff.put(tag, &period, &sample(&ctx, 2)).unwrap();

        assert!(matches!(handoff.get(tag, &period, 3), Err(Error::StateHandoff { .. })));
        assert_eq!(handoff.len(), 1);
        assert_eq!(handoff.get(tag, &period, 2).unwrap(), sample(&ctx, 2));
        assert_eq!(handoff.get(tag, &period, 2).unwrap(), sample(&ctx, 2));

        handoff.remove(tag, &period).unwrap();
        assert!(handoff.is_empty());
        assert!(matches!(handoff.get(tag, &period, 2), Err(Error::StateHandoff { .. })));
        // idempotent
        handoff.remove(tag, &period).unwrap();
    }

    #[test]
    fn consumed_inputs_are_released_together() {
        let ctx: TestContext = TestContext::new(10);
        let day: PeriodId = PeriodId::day("2014-01-01").unwrap();
        let mut handoff: MemoryHandoff = MemoryHandoff::new();
        handoff.put(StageTag::Product, &day, &sample(&ctx, 1)).unwrap();
        handoff.put(StageTag::CrossTerm, &day, &sample(&ctx, 1)).unwrap();

        let mut consumed: Consumed = Consumed::new();
        consumed.read(&handoff, StageTag::Product, &day, 1).unwrap();
        assert!(consumed.read(&handoff, StageTag::Final, &day, 1).is_err());
        consumed.mark(StageTag::CrossTerm, &day);
        handoff.put(StageTag::Final, &day, &sample(&ctx, 1)).unwrap();
        assert_eq!(handoff.len(), 3);

        consumed.release(&mut handoff).unwrap();
        assert_eq!(handoff.len(), 1);
        assert!(handoff.get(StageTag::Final, &day, 1).is_ok());
    }

    #[test]
    fn state_store_round_trip() {
        let ctx: TestContext = TestContext::new(10);
        let dir = tempfile::tempdir().unwrap();
        let mut store: StateStore = StateStore::new(dir.path()).unwrap();
        let period: PeriodId = PeriodId::day("2014-01-01").unwrap().interval(7);
        let tag: StageTag = StageTag::Diff(LookupFunction::HarmonicMean);
        let cts: Vec<Ciphertext> = sample(&ctx, 3);

        store.put(tag, &period, &cts).unwrap();
        let path = store.path(tag, &period);
        assert!(path.ends_with("diff_harmonic_mean_2014-01-01_h07"));
        assert!(path.exists());

        assert_eq!(store.get(tag, &period, 3).unwrap(), cts);
        assert!(path.exists());
        store.remove(tag, &period).unwrap();
        assert!(!path.exists());
        assert!(matches!(store.get(tag, &period, 3), Err(Error::StateHandoff { .. })));
        store.remove(tag, &period).unwrap();
    }

    #[test]
    fn state_store_rejects_damaged_files() {
        let ctx: TestContext = TestContext::new(10);
        let dir = tempfile::tempdir().unwrap();
        let mut store: StateStore = StateStore::new(dir.path()).unwrap();
        let period: PeriodId = PeriodId::day("2014-01-02").unwrap();
        let tag: StageTag = StageTag::Final;

        // truncated
        store.put(tag, &period, &sample(&ctx, 1)).unwrap();
        let path = store.path(tag, &period);
        let bytes: Vec<u8> = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 9]).unwrap();
        assert!(matches!(store.get(tag, &period, 1), Err(Error::StateHandoff { .. })));

        // trailing garbage
        let mut padded: Vec<u8> = bytes.clone();
        padded.push(0);
        fs::write(&path, &padded).unwrap();
        assert!(matches!(store.get(tag, &period, 1), Err(Error::StateHandoff { .. })));

        // count mismatch
        fs::write(&path, &bytes).unwrap();
        assert!(matches!(store.get(tag, &period, 2), Err(Error::StateHandoff { .. })));

        // a message of another stage
        fs::write(store.path(StageTag::CrossTerm, &period), &bytes).unwrap();
        assert!(matches!(
            store.get(StageTag::CrossTerm, &period, 1),
            Err(Error::StateHandoff { .. })
        ));
    }

    #[test]
    fn state_files_hold_no_slot_values() {
        let module: Module<FheBfv> = Module::<FheBfv>::new(BatchParams {
            log_n: 10,
            ..BatchParams::default()
        })
        .unwrap();
        let keys: KeySet = KeySet::generate(&module, &mut Source::new([7u8; 32])).unwrap();
        let value: i64 = 123456;
        let ct: Ciphertext = module
            .encrypt(&encode_replicated(&module, value).unwrap(), &keys.evaluation.pk)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut store: StateStore = StateStore::new(dir.path()).unwrap();
        let day: PeriodId = PeriodId::day("2014-01-03").unwrap();
        store.put(StageTag::Final, &day, &[ct]).unwrap();

        let bytes: Vec<u8> = fs::read(store.path(StageTag::Final, &day)).unwrap();
        let needle: [u8; 8] = (value as u64).to_le_bytes();
        assert!(!bytes.windows(8).any(|w| w == needle));

        let stored: Vec<Ciphertext> = store.get(StageTag::Final, &day, 1).unwrap();
        let slots: Vec<i64> = module.decode_batch(&module.decrypt(&stored[0], &keys.sk).unwrap());
        assert!(slots[..module.row_size()].iter().all(|x| *x == value));
    }
}
