//! File boundaries: source CSV tables and harmonized table exports.

use std::fs::File;
use std::path::Path;

use log::debug;
use polars::prelude::*;
use polars_io::parquet::ParquetWriter;

use crate::error::Result;
use crate::records::SourceMapping;

pub fn read_csv<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<DataFrame> {
    let file = File::open(path.as_ref())?;

    let df = CsvReader::new(file)
        .has_header(true)
        .with_delimiter(delimiter)
        // types are inferred from every row
        .infer_schema(None)
        .finish()?;
    debug!(
        "read {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.as_ref().display()
    );
    Ok(df)
}

/// Reads a source table using the delimiter its mapping declares.
pub fn read_source<P: AsRef<Path>>(path: P, source: &SourceMapping) -> Result<DataFrame> {
    read_csv(path, source.delimiter)
}

pub fn write_csv<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    CsvWriter::new(&mut file).finish(df)?;

    Ok(())
}

pub fn write_parquet<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path)?;

    ParquetWriter::new(&mut file).finish(df)?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteFormat {
    Csv,
    Parquet,
}

impl WriteFormat {
    /// Parquet for `.parquet`/`.pq`, CSV otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") || ext.eq_ignore_ascii_case("pq") => {
                WriteFormat::Parquet
            }
            _ => WriteFormat::Csv,
        }
    }
}

pub fn write_table<P: AsRef<Path>>(path: P, df: &mut DataFrame) -> Result<()> {
    match WriteFormat::from_path(path.as_ref()) {
        WriteFormat::Csv => write_csv(path, df),
        WriteFormat::Parquet => write_parquet(path, df),
    }
}
