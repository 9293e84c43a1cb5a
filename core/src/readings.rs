use std::{fs::File, path::Path};

use csv::{ReaderBuilder, StringRecord, Writer};
use tracing::debug;

use crate::error::{Error, Result};

/// Readings of one day, one row of meter values per interval.
#[derive(Clone, Debug, PartialEq)]
pub struct DayReadings {
    pub timestamps: Vec<String>,
    pub intervals: Vec<Vec<f64>>,
}

impl DayReadings {
    /// Intervals labelled by their index.
    pub fn from_intervals(intervals: Vec<Vec<f64>>) -> Self {
        Self {
            timestamps: (0..intervals.len()).map(|i| format!("{i:02}")).collect(),
            intervals,
        }
    }

    /// Reads a day file: a header starting with `TimeSlot`, then
    /// `timestamp,v1,...,vM` per interval. Rows are returned in timestamp order.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let invalid = |msg: String| Error::InvalidInput(format!("{}: {}", path.display(), msg));
        let file: File = File::open(path).map_err(|err| invalid(err.to_string()))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let header: &StringRecord = reader.headers().map_err(|err| invalid(err.to_string()))?;
        if !header.get(0).is_some_and(|h| h.starts_with("TimeSlot")) {
            return Err(invalid("header must start with TimeSlot".into()));
        }
        let meters: usize = header.len() - 1;

        let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record: StringRecord = record.map_err(|err| invalid(err.to_string()))?;
            let timestamp: String = record.get(0).unwrap_or_default().to_string();
            let values: Vec<f64> = record
                .iter()
                .skip(1)
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|err| invalid(format!("row {}: {:?}: {}", line + 2, v, err)))
                })
                .collect::<Result<Vec<_>>>()?;
            if values.len() != meters {
                return Err(invalid(format!(
                    "row {}: {} values for {} meters",
                    line + 2,
                    values.len(),
                    meters
                )));
            }
            rows.push((timestamp, values));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(path = %path.display(), intervals = rows.len(), meters, "readings loaded");

        let (timestamps, intervals) = rows.into_iter().unzip();
        Ok(Self {
            timestamps,
            intervals,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let io_err = |err: csv::Error| Error::InvalidInput(format!("{}: {}", path.display(), err));
        let mut writer: Writer<File> = Writer::from_path(path).map_err(io_err)?;
        let meters: usize = self.intervals.first().map(Vec::len).unwrap_or(0);
        let mut header: Vec<String> = vec!["TimeSlot".to_string()];
        header.extend((1..=meters).map(|m| format!("meter_{m}")));
        writer.write_record(&header).map_err(io_err)?;
        for (timestamp, values) in self.timestamps.iter().zip(self.intervals.iter()) {
            let mut record: Vec<String> = vec![timestamp.clone()];
            record.extend(values.iter().map(f64::to_string));
            writer.write_record(&record).map_err(io_err)?;
        }
        writer
            .flush()
            .map_err(|err| Error::InvalidInput(format!("{}: {}", path.display(), err)))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use tempfile::TempDir;

    use super::DayReadings;
    use crate::error::Error;

    #[test]
    fn loads_rows_in_timestamp_order() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("day.csv");
        fs::write(
            &path,
            "TimeSlot,a,b,c\n2014-01-01 01:00,1,2,3\n2014-01-01 00:00,10,20,5\n",
        )
        .unwrap();
        let day: DayReadings = DayReadings::load_csv(&path).unwrap();
        assert_eq!(day.timestamps, vec!["2014-01-01 00:00", "2014-01-01 01:00"]);
        assert_eq!(day.intervals, vec![vec![10.0, 20.0, 5.0], vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn written_file_reads_back() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("day.csv");
        let day: DayReadings = DayReadings::from_intervals(vec![vec![50.5, 60.0], vec![70.25, 6000.0]]);
        day.write_csv(&path).unwrap();
        assert_eq!(DayReadings::load_csv(&path).unwrap(), day);
    }

    #[test]
    fn malformed_files() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("day.csv");

        fs::write(&path, "Time,a\n00,1\n").unwrap();
        assert!(matches!(DayReadings::load_csv(&path), Err(Error::InvalidInput(_))));

        fs::write(&path, "TimeSlot,a,b\n00,1,x\n").unwrap();
        assert!(matches!(DayReadings::load_csv(&path), Err(Error::InvalidInput(_))));

        assert!(matches!(
            DayReadings::load_csv(&dir.path().join("missing.csv")),
            Err(Error::InvalidInput(_))
        ));
    }
}
