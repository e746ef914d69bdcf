// csv_indexer/src/source.rs
// Row sources feeding the ingestion pipeline.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ByteRecord, ErrorKind, ReaderBuilder};

use crate::error::{IngestError, Result};

/// One row's values, in column order.
pub type RawRecord = Vec<String,>;

/// Outcome of pulling one row from a [`RecordSource`].
#[derive(Debug, Clone, PartialEq, Eq,)]
pub enum SourceRow {
    Record(RawRecord,),
    /// The row broke the format rules. `values` holds whatever could be
    /// recovered from it and may be empty.
    Malformed {
        values: RawRecord,
        reason: String,
    },
    End,
}

/// A lazy, finite, non-restartable sequence of rows.
///
/// Malformed rows are reported in-band and never end the sequence. `Err` is
/// reserved for failures of the underlying stream, which are fatal.
pub trait RecordSource {
    fn next_row(&mut self,) -> Result<SourceRow,>;
}

/// Options for the delimited-text reader.
#[derive(Debug, Clone, Copy,)]
pub struct CsvOptions {
    pub delimiter: u8,
    /// Accept rows whose width differs from the first row.
    pub flexible:  bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            flexible:  false,
        }
    }
}

pub struct CsvRecordSource<R: Read,> {
    reader:    csv::Reader<RawTap<R,>,>,
    record:    ByteRecord,
    delimiter: u8,
}

/// Keeps the bytes handed to the csv reader until the record they belong to
/// has been checked, so quoting can be validated against the raw text.
struct RawTap<R,> {
    inner: R,
    buf:   Vec<u8,>,
    /// Stream offset of `buf[0]`.
    base:  u64,
}

impl<R: Read,> Read for RawTap<R,> {
    fn read(&mut self, out: &mut [u8],) -> std::io::Result<usize,> {
        let n = self.inner.read(out,)?;
        self.buf.extend_from_slice(&out[..n],);
        Ok(n,)
    }
}

impl<R,> RawTap<R,> {
    fn slice(&self, start: u64, end: u64,) -> &[u8] {
        let end = (end.saturating_sub(self.base,) as usize).min(self.buf.len(),);
        let start = (start.saturating_sub(self.base,) as usize).min(end,);
        &self.buf[start..end]
    }

    fn release(&mut self, upto: u64,) {
        let n = (upto.saturating_sub(self.base,) as usize).min(self.buf.len(),);
        self.buf.drain(..n,);
        self.base += n as u64;
    }
}

impl CsvRecordSource<File,> {
    pub fn open(path: &Path, options: CsvOptions,) -> Result<Self,> {
        let file = File::open(path,).map_err(|e| {
            IngestError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to open {}: {}", path.display(), e),
            ),)
        },)?;
        Ok(Self::from_reader(file, options,),)
    }
}

impl<R: Read,> CsvRecordSource<R,> {
    pub fn from_reader(rdr: R, options: CsvOptions,) -> Self {
        // Headers are rows like any other here; schema inference consumes them.
        let reader = ReaderBuilder::new()
            .delimiter(options.delimiter,)
            .has_headers(false,)
            .flexible(options.flexible,)
            .from_reader(RawTap {
                inner: rdr,
                buf:   Vec::new(),
                base:  0,
            },);
        Self {
            reader,
            record: ByteRecord::new(),
            delimiter: options.delimiter,
        }
    }
}

impl<R: Read,> RecordSource for CsvRecordSource<R,> {
    fn next_row(&mut self,) -> Result<SourceRow,> {
        let res = self.reader.read_byte_record(&mut self.record,);
        let end = self.reader.position().byte();
        let row = self.classify(res, end,);
        self.reader.get_mut().release(end,);
        row
    }
}

impl<R: Read,> CsvRecordSource<R,> {
    fn classify(&self, res: csv::Result<bool,>, end: u64,) -> Result<SourceRow,> {
        match res {
            Ok(false,) => Ok(SourceRow::End,),
            Ok(true,) => {
                let start = self.record.position().map_or(end, |p| p.byte(),);
                let raw = self.reader.get_ref().slice(start, end,);
                match quote_error(raw, self.delimiter,) {
                    Some(reason,) => Ok(SourceRow::Malformed {
                        values: self
                            .record
                            .iter()
                            .map(|f| String::from_utf8_lossy(f,).into_owned(),)
                            .collect(),
                        reason: format!(
                            "line {}: {}",
                            self.record.position().map(|p| p.line(),).unwrap_or_default(),
                            reason
                        ),
                    },),
                    None => Ok(decode_fields(&self.record,),),
                }
            },
            Err(err,) => {
                let line = err.position().map(|p| p.line(),);
                match err.into_kind() {
                    ErrorKind::Io(io,) => Err(IngestError::IoError(io,),),
                    ErrorKind::UnequalLengths {
                        expected_len, len, ..
                    } => Ok(SourceRow::Malformed {
                        values: Vec::new(),
                        reason: format!(
                            "line {}: found {} fields, expected {}",
                            line.unwrap_or_default(),
                            len,
                            expected_len
                        ),
                    },),
                    other => Ok(SourceRow::Malformed {
                        values: Vec::new(),
                        reason: format!("line {}: {:?}", line.unwrap_or_default(), other),
                    },),
                }
            },
        }
    }
}

/// Checks the raw text of one record against strict CSV quoting: a quote
/// may only open a field, and a quoted field must close right before a
/// delimiter or the line end.
fn quote_error(raw: &[u8], delimiter: u8,) -> Option<&'static str,> {
    let is_eol = |b: u8| b == b'\r' || b == b'\n';
    let n = raw.len();
    // Blank lines skipped ahead of the record.
    let mut i = raw.iter().take_while(|b| is_eol(**b,),).count();

    loop {
        if i < n && raw[i] == b'"' {
            i += 1;
            loop {
                if i >= n {
                    return Some("unterminated quoted field",);
                }
                if raw[i] == b'"' {
                    if i + 1 < n && raw[i + 1] == b'"' {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    if i < n && raw[i] != delimiter && !is_eol(raw[i],) {
                        return Some("extraneous or missing \" in quoted field",);
                    }
                    break;
                }
                i += 1;
            }
        } else {
            while i < n && raw[i] != delimiter && !is_eol(raw[i],) {
                if raw[i] == b'"' {
                    return Some("bare \" in non-quoted field",);
                }
                i += 1;
            }
        }

        if i >= n || is_eol(raw[i],) {
            return None;
        }
        // Delimiter: next field.
        i += 1;
    }
}

fn decode_fields(record: &ByteRecord,) -> SourceRow {
    let mut values = Vec::with_capacity(record.len(),);
    let mut bad_field = None;
    for (idx, field,) in record.iter().enumerate() {
        match std::str::from_utf8(field,) {
            Ok(s,) => values.push(s.to_string(),),
            Err(_,) => {
                bad_field.get_or_insert(idx,);
                values.push(String::from_utf8_lossy(field,).into_owned(),);
            },
        }
    }

    match bad_field {
        None => SourceRow::Record(values,),
        Some(idx,) => SourceRow::Malformed {
            values,
            reason: format!(
                "line {}: field {} is not valid UTF-8",
                record.position().map(|p| p.line(),).unwrap_or_default(),
                idx
            ),
        },
    }
}
