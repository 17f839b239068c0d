use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

/// Replaces every run of non-word characters with one underscore, then
/// lower-cases the result.
pub fn normalize_header(cell: &str) -> String {
    NON_WORD.replace_all(cell, "_").to_lowercase()
}

pub fn normalize_headers<'a, I>(cells: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    cells.into_iter().map(normalize_header).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRewrite {
    pub columns: Vec<String>,
    pub data_bytes: u64,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("file has no header row")]
    Empty,
    #[error("unreadable header row: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Rewrites the header row of the CSV file at `path` in place.
///
/// The header is parsed as a CSV record; everything after it is copied as raw
/// bytes. The result is written to `{path}.tmp` and renamed over `path`, so
/// readers only ever see the old file or the fully rewritten one. A temp file
/// left behind by an interrupted rewrite is overwritten by the next attempt.
pub fn rewrite_header_in_place(path: &Path) -> Result<HeaderRewrite, RewriteError> {
    let header = read_header(path)?;
    let columns = normalize_headers(header.cells.iter());

    let temp_path = rewrite_temp_path(path);
    let data_bytes = match write_rewritten(path, &temp_path, &columns, &header) {
        Ok(data_bytes) => data_bytes,
        Err(err) => {
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }
    };

    Ok(HeaderRewrite {
        columns,
        data_bytes,
    })
}

/// Sibling path the rewrite is staged in: the file name with `.tmp` appended.
pub fn rewrite_temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_rewritten(
    path: &Path,
    temp_path: &Path,
    columns: &[String],
    header: &RawHeader,
) -> Result<u64, RewriteError> {
    let temp = File::create(temp_path)?;
    let mut source = File::open(path)?;
    source.seek(SeekFrom::Start(header.end))?;
    let data_bytes = {
        let mut writer = BufWriter::new(&temp);
        writer.write_all(columns.join(",").as_bytes())?;
        writer.write_all(header.terminator)?;
        let copied = io::copy(&mut BufReader::new(source), &mut writer)?;
        writer.flush()?;
        copied
    };
    temp.sync_all()?;
    fs::rename(temp_path, path)?;
    Ok(data_bytes)
}

struct RawHeader {
    cells: csv::StringRecord,
    terminator: &'static [u8],
    /// Offset of the first data byte.
    end: u64,
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const CRLF: &[u8] = b"\r\n";
const LF: &[u8] = b"\n";
const CR: &[u8] = b"\r";
const NO_TERMINATOR: &[u8] = b"";

/// Parses the first record of the file with the CSV reader and works out
/// where the data rows start.
fn read_header(path: &Path) -> Result<RawHeader, RewriteError> {
    let mut file = File::open(path)?;
    let bom_len = skip_byte_order_mark(&mut file)?;

    let mut cells = csv::StringRecord::new();
    let parsed = {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(&mut file);
        if !reader.read_record(&mut cells)? {
            return Err(RewriteError::Empty);
        }
        bom_len + reader.position().byte()
    };

    // The reader may stop before, inside or after the record terminator.
    let start = parsed.saturating_sub(2);
    file.seek(SeekFrom::Start(start))?;
    let mut window = Vec::with_capacity(4);
    Read::by_ref(&mut file).take(4).read_to_end(&mut window)?;
    let split = ((parsed - start) as usize).min(window.len());
    let (before, after) = window.split_at(split);
    let (terminator, trailing) = split_terminator(before, after);

    Ok(RawHeader {
        cells,
        terminator,
        end: parsed + trailing,
    })
}

fn skip_byte_order_mark(file: &mut File) -> io::Result<u64> {
    let mut prefix = Vec::with_capacity(UTF8_BOM.len());
    Read::by_ref(&mut *file)
        .take(UTF8_BOM.len() as u64)
        .read_to_end(&mut prefix)?;
    let skip = if prefix == UTF8_BOM {
        UTF8_BOM.len() as u64
    } else {
        0
    };
    file.seek(SeekFrom::Start(skip))?;
    Ok(skip)
}

/// Returns the header's line terminator and how many of its bytes lie past
/// the parsed offset.
fn split_terminator(before: &[u8], after: &[u8]) -> (&'static [u8], u64) {
    if before.ends_with(CRLF) {
        (CRLF, 0)
    } else if before.ends_with(LF) {
        (LF, 0)
    } else if before.ends_with(CR) {
        if after.starts_with(LF) { (CRLF, 1) } else { (CR, 0) }
    } else if after.starts_with(CRLF) {
        (CRLF, 2)
    } else if after.starts_with(LF) {
        (LF, 1)
    } else if after.starts_with(CR) {
        (CR, 1)
    } else {
        (NO_TERMINATOR, 0)
    }
}
