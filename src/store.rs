//! Flat delimited record store.
//!
//! One record per line, comma-delimited, fixed column order, no header,
//! no quoting. A field holding a comma or newline breaks column alignment
//! on the next read; appends log a warning but still write it.
//!
//! Appends never touch existing bytes. `delete_at` reads the whole file,
//! cuts out one row and rewrites the rest. With [`RewriteMode::InPlace`]
//! the file is truncated before the rewrite, so a crash mid-write loses
//! data. [`RewriteMode::TempThenRename`] writes a sibling temp file and
//! renames it over the store instead.
//!
//! No locking: at most one reader/writer may use a store file at a time.

use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A record type with a fixed column layout.
pub trait StoreRecord: Sized {
    /// Number of columns in every stored row.
    const COLUMNS: usize;

    /// Fields in column order.
    fn to_fields(&self) -> Vec<String>;

    /// Parses one stored row. `row` is its position, for error reporting.
    fn from_fields(fields: &[String], row: usize) -> Result<Self, CoreError>;
}

/// How a full rewrite reaches the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteMode {
    /// Truncate the store and write the remaining rows into it.
    #[default]
    InPlace,
    /// Write the remaining rows to a temp file, then rename it over the store.
    TempThenRename,
}

/// A stored row with the byte offset where it starts.
struct ScannedRow {
    start: usize,
    fields: Vec<String>,
}

pub struct RecordStore<R> {
    path: PathBuf,
    mode: RewriteMode,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoreRecord> RecordStore<R> {
    /// The file is not created until the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_mode(path, RewriteMode::default())
    }

    pub fn with_mode(path: impl Into<PathBuf>, mode: RewriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> RewriteMode {
        self.mode
    }

    /// Appends one row. Existing content is never read or rewritten.
    pub fn append(&self, record: &R) -> Result<(), CoreError> {
        self.append_many(std::slice::from_ref(record))
    }

    /// Appends rows in order through a single open handle. An unterminated
    /// final row gets its line break first, so the new rows never run into it.
    pub fn append_many(&self, records: &[R]) -> Result<(), CoreError> {
        let bytes = encode_rows(records.iter().map(StoreRecord::to_fields))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        if !bytes.is_empty() && !ends_with_newline(&mut file)? {
            file.write_all(b"\n")?;
        }
        file.write_all(&bytes)?;

        tracing::info!(path = %self.path.display(), rows = records.len(), "Appended rows");
        Ok(())
    }

    /// Every row as raw columns, in file order. A missing file is an
    /// empty store. Fails on the first row whose column count is wrong.
    pub fn read_all(&self) -> Result<Vec<Vec<String>>, CoreError> {
        Ok(self
            .scan()?
            .1
            .into_iter()
            .map(|row| row.fields)
            .collect())
    }

    /// Every row parsed into a record.
    pub fn read_records(&self) -> Result<Vec<R>, CoreError> {
        self.read_all()?
            .iter()
            .enumerate()
            .map(|(i, fields)| R::from_fields(fields, i))
            .collect()
    }

    pub fn len(&self) -> Result<usize, CoreError> {
        Ok(self.scan()?.1.len())
    }

    pub fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.len()? == 0)
    }

    /// Removes the row at `index` and rewrites the file. Every other row
    /// keeps its exact bytes and relative order. An out-of-range index
    /// leaves the file untouched.
    pub fn delete_at(&self, index: usize) -> Result<(), CoreError> {
        let (bytes, rows) = self.scan()?;
        if index >= rows.len() {
            return Err(CoreError::Index {
                index,
                len: rows.len(),
            });
        }

        let start = rows[index].start;
        let end = rows.get(index + 1).map_or(bytes.len(), |next| next.start);
        let mut remaining = Vec::with_capacity(bytes.len() - (end - start));
        remaining.extend_from_slice(&bytes[..start]);
        remaining.extend_from_slice(&bytes[end..]);

        self.rewrite(&remaining)?;
        tracing::info!(path = %self.path.display(), index, "Deleted row");
        Ok(())
    }

    /// Truncates the store to empty, creating it if needed.
    pub fn clear(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::File::create(&self.path)?;
        tracing::info!(path = %self.path.display(), "Cleared store");
        Ok(())
    }

    /// Replaces the whole store with `records`.
    pub fn replace_all(&self, records: &[R]) -> Result<(), CoreError> {
        match self.mode {
            RewriteMode::InPlace => {
                self.clear()?;
                self.append_many(records)
            }
            RewriteMode::TempThenRename => {
                let bytes = encode_rows(records.iter().map(StoreRecord::to_fields))?;
                self.rewrite(&bytes)?;
                tracing::info!(path = %self.path.display(), rows = records.len(), "Rewrote store");
                Ok(())
            }
        }
    }

    fn rewrite(&self, bytes: &[u8]) -> Result<(), CoreError> {
        match self.mode {
            RewriteMode::InPlace => std::fs::write(&self.path, bytes)?,
            RewriteMode::TempThenRename => {
                let dir = self
                    .path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                std::fs::create_dir_all(dir)?;
                let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
                tmp.write_all(bytes)?;
                tmp.as_file().sync_all()?;
                tmp.persist(&self.path).map_err(|e| e.error)?;
            }
        }
        Ok(())
    }

    /// Reads the file and splits it into rows, checking column counts.
    fn scan(&self) -> Result<(Vec<u8>, Vec<ScannedRow>), CoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
            Err(e) => return Err(e.into()),
        };

        // Quoting is off, so every line is exactly one row. A blank line
        // is a zero-column row, not a separator.
        let mut rows = Vec::new();
        let mut offset = 0;
        for line in bytes.split_inclusive(|b| *b == b'\n') {
            let start = offset;
            offset += line.len();

            let i = rows.len();
            let content = trim_line_end(line);
            if content.is_empty() {
                return Err(CoreError::format(
                    i,
                    format!("expected {} columns, found 0", R::COLUMNS),
                ));
            }
            let fields = parse_line(content, i)?;
            if fields.len() != R::COLUMNS {
                return Err(CoreError::format(
                    i,
                    format!("expected {} columns, found {}", R::COLUMNS, fields.len()),
                ));
            }
            rows.push(ScannedRow { start, fields });
        }

        tracing::debug!(path = %self.path.display(), rows = rows.len(), "Scanned store");
        Ok((bytes, rows))
    }
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut std::fs::File) -> Result<bool, CoreError> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Splits one stored line into its columns.
fn parse_line(line: &[u8], row: usize) -> Result<Vec<String>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(line);

    let mut record = csv::StringRecord::new();
    reader
        .read_record(&mut record)
        .map_err(|e| CoreError::format(row, e.to_string()))?;
    Ok(record.iter().map(str::to_string).collect())
}

/// Serializes rows without quoting, one per `\n`-terminated line.
fn encode_rows(rows: impl Iterator<Item = Vec<String>>) -> Result<Vec<u8>, CoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for fields in rows {
        if fields.iter().any(|f| f.contains([',', '\n', '\r'])) {
            tracing::warn!(?fields, "Field contains a delimiter; row alignment will break");
        }
        writer.write_record(&fields)?;
    }

    writer
        .into_inner()
        .map_err(|e| CoreError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::models::{CardiacEvent, PatientMeasurement, VisitReason, VisitRecord};

    fn visit(name: &str, reason: VisitReason, day: u32, duration: u32) -> VisitRecord {
        VisitRecord {
            patient_name: name.into(),
            reason,
            date: NaiveDate::from_ymd_opt(2022, 1, day).unwrap(),
            duration,
        }
    }

    fn abc() -> Vec<VisitRecord> {
        vec![
            visit("Alice Smith", VisitReason::Fever, 3, 20),
            visit("Bob Jones", VisitReason::Cough, 9, 12),
            visit("Ivy Moore", VisitReason::Injury, 27, 45),
        ]
    }

    fn setup(mode: RewriteMode) -> (tempfile::TempDir, RecordStore<VisitRecord>) {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::with_mode(dir.path().join("visit_data.csv"), mode);
        (dir, store)
    }

    #[test]
    fn file_is_created_lazily() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        assert!(!store.path().exists());
        assert!(store.read_all().unwrap().is_empty());
        assert!(!store.path().exists());

        store.append(&abc()[0]).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn append_writes_plain_lines_without_header() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        for r in abc() {
            store.append(&r).unwrap();
        }
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            content,
            "Alice Smith,Fever,2022-01-03,20\n\
             Bob Jones,Cough,2022-01-09,12\n\
             Ivy Moore,Injury,2022-01-27,45\n"
        );
    }

    #[test]
    fn append_does_not_rewrite_existing_bytes() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        // Foreign line ending on an existing row must survive an append.
        std::fs::write(store.path(), "Jack Taylor,Allergy,2022-04-01,15\r\n").unwrap();
        store.append(&abc()[0]).unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            content,
            "Jack Taylor,Allergy,2022-04-01,15\r\nAlice Smith,Fever,2022-01-03,20\n"
        );
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        store.append_many(&abc()).unwrap();
        assert_eq!(store.read_records().unwrap(), abc());
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn measurement_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store: RecordStore<PatientMeasurement> = RecordStore::new(dir.path().join("data.csv"));
        let m = PatientMeasurement::new(1.77, 81.3, CardiacEvent::Yes).unwrap();
        store.append(&m).unwrap();

        let back = store.read_records().unwrap();
        assert_eq!(back, vec![m]);
        let raw = store.read_all().unwrap();
        assert_eq!(raw[0][2].parse::<f64>().unwrap(), m.bmi());
    }

    #[test]
    fn delete_middle_row_keeps_order() {
        for mode in [RewriteMode::InPlace, RewriteMode::TempThenRename] {
            let (_dir, store) = setup(mode);
            let rows = abc();
            store.append_many(&rows).unwrap();

            store.delete_at(1).unwrap();
            assert_eq!(store.read_records().unwrap(), vec![rows[0].clone(), rows[2].clone()]);
        }
    }

    #[test]
    fn delete_leaves_other_rows_byte_identical() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        let original = "Alice Smith,Fever,2022-01-03,20\r\n\
                        Bob Jones,Cough,2022-01-09,12\n\
                        Ivy Moore,Injury,2022-01-27,45";
        std::fs::write(store.path(), original).unwrap();

        store.delete_at(1).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "Alice Smith,Fever,2022-01-03,20\r\nIvy Moore,Injury,2022-01-27,45"
        );

        store.delete_at(1).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "Alice Smith,Fever,2022-01-03,20\r\n"
        );
    }

    #[test]
    fn append_after_unterminated_row_starts_a_new_line() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        std::fs::write(
            store.path(),
            "Alice Smith,Fever,2022-01-03,20\nBob Jones,Cough,2022-01-09,12\nIvy Moore,Injury,2022-01-27,45",
        )
        .unwrap();

        store.delete_at(1).unwrap();
        let extra = visit("Emma Brown", VisitReason::Allergy, 14, 22);
        store.append(&extra).unwrap();

        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "Alice Smith,Fever,2022-01-03,20\n\
             Ivy Moore,Injury,2022-01-27,45\n\
             Emma Brown,Allergy,2022-01-14,22\n"
        );
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.read_records().unwrap()[2], extra);
    }

    #[test]
    fn blank_line_is_a_malformed_row() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        std::fs::write(
            store.path(),
            "Alice Smith,Fever,2022-01-03,20\n\nBob Jones,Cough,2022-01-09,12\n",
        )
        .unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, CoreError::Format { row: 1, .. }));
        assert!(err.to_string().contains("found 0"));
        assert!(matches!(store.delete_at(0), Err(CoreError::Format { row: 1, .. })));
    }

    #[test]
    fn delete_out_of_range_leaves_file_unchanged() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        store.append_many(&abc()).unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store.delete_at(5).unwrap_err();
        assert!(matches!(err, CoreError::Index { index: 5, len: 3 }));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn delete_on_missing_store_is_index_error() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        assert!(matches!(
            store.delete_at(0),
            Err(CoreError::Index { index: 0, len: 0 })
        ));
    }

    #[test]
    fn wrong_column_count_fails_whole_read() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        std::fs::write(
            store.path(),
            "Alice Smith,Fever,2022-01-03,20\nBob, Jones,Cough,2022-01-09,12\n",
        )
        .unwrap();

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, CoreError::Format { row: 1, .. }));
    }

    #[test]
    fn embedded_comma_breaks_alignment() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        let mut r = abc()[0].clone();
        r.patient_name = "Smith, Alice".into();
        store.append(&r).unwrap();
        assert!(matches!(store.read_all(), Err(CoreError::Format { row: 0, .. })));
    }

    #[test]
    fn clear_truncates() {
        let (_dir, store) = setup(RewriteMode::InPlace);
        store.append_many(&abc()).unwrap();
        store.clear().unwrap();
        assert!(store.path().exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn replace_all_rewrites_in_both_modes() {
        for mode in [RewriteMode::InPlace, RewriteMode::TempThenRename] {
            let (_dir, store) = setup(mode);
            store.append_many(&abc()).unwrap();
            let replacement = vec![visit("Emma Brown", VisitReason::Allergy, 14, 22)];
            store.replace_all(&replacement).unwrap();
            assert_eq!(store.read_records().unwrap(), replacement);
        }
    }

    #[test]
    fn temp_then_rename_leaves_no_stray_files() {
        let (dir, store) = setup(RewriteMode::TempThenRename);
        store.append_many(&abc()).unwrap();
        store.delete_at(0).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
    }
}
