use std::env;
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use polars::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{HabitatError, Result};

pub fn project_root() -> PathBuf {
    match env::var_os("PROJECT_ROOT") {
        Some(val) => PathBuf::from(val),
        None => {
            // Fall back to current directory if PROJECT_ROOT not set
            env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        }
    }
}

/// Reads a tab-separated table, gunzipping `.gz` files on the fly.
///
/// Every column comes back as a string column; callers parse numbers
/// themselves so a bad cell names its row instead of nulling out.
pub fn read_tsv(path: &Path) -> Result<DataFrame> {
    info!("Reading {}", path.display());
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;

    let bytes = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut inflated = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated)?;
        inflated
    } else {
        raw
    };

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(b'\t'))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()?;

    debug!("{}: {} rows x {} columns", path.display(), df.height(), df.width());
    Ok(df)
}

// ─── Column access ───────────────────────────────────────────────────────────

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// String view of a required column.
pub fn str_column<'a>(df: &'a DataFrame, table: &str, name: &str) -> Result<&'a StringChunked> {
    if !has_column(df, name) {
        return Err(HabitatError::MissingColumn {
            table: table.to_string(),
            column: name.to_string(),
        });
    }
    Ok(df.column(name)?.str()?)
}

/// String view of an optional column, `None` when the table lacks it.
pub fn opt_str_column<'a>(df: &'a DataFrame, name: &str) -> Result<Option<&'a StringChunked>> {
    if has_column(df, name) {
        Ok(Some(df.column(name)?.str()?))
    } else {
        Ok(None)
    }
}

/// Locates one cell for error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Cell<'a> {
    pub table: &'a str,
    pub row: usize,
    pub column: &'a str,
    pub key: &'a str,
}

impl Cell<'_> {
    pub fn malformed(&self, value: &str, reason: &str) -> HabitatError {
        HabitatError::MalformedInputRow {
            table: self.table.to_string(),
            // 1-based, counting data rows only
            row: self.row + 1,
            column: self.column.to_string(),
            key: self.key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn required<'v>(&self, value: Option<&'v str>) -> Result<&'v str> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && !is_na(v) => Ok(v),
            _ => Err(self.malformed("", "required value is missing")),
        }
    }

    /// Non-negative count. Accepts integral floats such as `1200.0`.
    pub fn count(&self, value: Option<&str>) -> Result<u64> {
        let v = self.required(value)?;
        if let Ok(n) = v.parse::<u64>() {
            return Ok(n);
        }
        match v.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
            Ok(_) => Err(self.malformed(v, "expected a non-negative integer")),
            Err(_) => Err(self.malformed(v, "not a number")),
        }
    }

    pub fn opt_count(&self, value: Option<&str>) -> Result<Option<u64>> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && !is_na(v) => self.count(Some(v)).map(Some),
            _ => Ok(None),
        }
    }

    pub fn number(&self, value: Option<&str>) -> Result<f64> {
        let v = self.required(value)?;
        match v.parse::<f64>() {
            Ok(f) if !f.is_nan() => Ok(f),
            _ => Err(self.malformed(v, "not a number")),
        }
    }

    pub fn opt_number(&self, value: Option<&str>) -> Result<Option<f64>> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() && !is_na(v) => self.number(Some(v)).map(Some),
            _ => Ok(None),
        }
    }

    /// pandas-style booleans: `True`/`False`, `true`/`false`, `1`/`0`.
    pub fn flag(&self, value: Option<&str>) -> Result<bool> {
        let v = self.required(value)?;
        match v {
            "True" | "true" | "TRUE" | "1" => Ok(true),
            "False" | "false" | "FALSE" | "0" => Ok(false),
            other => Err(self.malformed(other, "expected a boolean")),
        }
    }
}

const NA_VALUES: [&str; 5] = ["NA", "NaN", "nan", "None", "null"];

fn is_na(v: &str) -> bool {
    NA_VALUES.contains(&v)
}

/// Pass-through string column, all-null when the table lacks it.
pub fn text_column(df: &DataFrame, name: &str) -> Result<Column> {
    if has_column(df, name) {
        Ok(df.column(name)?.clone())
    } else {
        Ok(Column::from(Series::full_null(name.into(), df.height(), &DataType::String)))
    }
}

/// Join-key normalization: integral numbers compare by value (`9606` ==
/// `9606.0`) and missing values become `""`, so they match each other.
pub fn join_key(name: &str) -> Expr {
    let number = col(name).cast(DataType::Float64);
    let integer = number.clone().cast(DataType::Int64);
    let missing = NA_VALUES
        .iter()
        .fold(col(name).is_null(), |acc, na| acc.or(col(name).eq(lit(*na))));

    when(integer.clone().cast(DataType::Float64).eq(number))
        .then(integer.cast(DataType::String))
        .when(missing)
        .then(lit(""))
        .otherwise(col(name))
        .fill_null(lit(""))
}

/// First row (0-based) of `column` that repeats an earlier value.
pub fn first_duplicate(df: &DataFrame, column: &str) -> Result<Option<(usize, String)>> {
    let keyed = df.select([column])?.lazy().with_row_index("row", None);
    let first_rows = keyed
        .clone()
        .group_by([col(column)])
        .agg([col("row").min().alias("first_row")]);

    let repeats = keyed
        .join(first_rows, [col(column)], [col(column)], JoinArgs::from(JoinType::Inner))
        .filter(col("row").neq(col("first_row")))
        .sort_by_exprs([col("row")], SortMultipleOptions::default())
        .limit(1)
        .collect()?;

    first_row_of(&repeats, column)
}

/// A key that maps to two different values.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// 0-based row of the first disagreeing entry.
    pub row: usize,
    pub value: String,
    pub earlier: String,
}

/// First row whose `value` disagrees with an earlier row sharing its `keys`.
pub fn first_conflict(df: &DataFrame, keys: &[&str], value: &str) -> Result<Option<Conflict>> {
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();
    let keyed = df.clone().lazy().with_row_index("row", None);
    let earliest = keyed
        .clone()
        .group_by(key_exprs.clone())
        .agg([col(value).first().alias("earlier")]);

    let conflicts = keyed
        .join(earliest, key_exprs.clone(), key_exprs, JoinArgs::from(JoinType::Inner))
        .filter(col(value).neq(col("earlier")))
        .sort_by_exprs([col("row")], SortMultipleOptions::default())
        .limit(1)
        .collect()?;

    let Some((row, value)) = first_row_of(&conflicts, value)? else {
        return Ok(None);
    };
    let earlier = conflicts.column("earlier")?.str()?.get(0).unwrap_or_default().to_string();
    Ok(Some(Conflict { row, value, earlier }))
}

/// (`row`, `column`) of the first row of a frame carrying a row index.
fn first_row_of(df: &DataFrame, column: &str) -> Result<Option<(usize, String)>> {
    if df.height() == 0 {
        return Ok(None);
    }
    let rows = df.column("row")?.cast(&DataType::UInt64)?;
    let row = rows.u64()?.get(0).unwrap_or_default() as usize;
    let value = df.column(column)?.str()?.get(0).unwrap_or_default().to_string();
    Ok(Some((row, value)))
}

/// Rejects a table whose `column` holds the same key twice.
pub fn reject_duplicates(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    match first_duplicate(df, column)? {
        Some((row, key)) => {
            let cell = Cell { table, row, column, key: &key };
            Err(cell.malformed(&key, "duplicate key"))
        }
        None => Ok(()),
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Writes through a temporary file in the destination directory and renames
/// it into place, so a crash never leaves a half-written table behind.
fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(path).map_err(|e| HabitatError::Io(e.error))?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Serializes typed rows as a TSV with a header row.
pub fn write_records_tsv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomically(path, |file| {
        let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

pub fn write_dataframe_tsv(path: &Path, df: &DataFrame) -> Result<()> {
    write_atomically(path, |file| {
        CsvWriter::new(file)
            .include_header(true)
            .with_separator(b'\t')
            .finish(&mut df.clone())?;
        Ok(())
    })
}
