//! Reconciles the two source tables into the canonical patient schema.
//!
//! Each source is projected through its [`SourceMapping`], the projections are
//! stacked, and the remaining gaps are filled with the median of the combined
//! table. Medians are computed once, after concatenation, never per source.

use log::{debug, info};
use polars::prelude::*;

use crate::error::{Result, RiskError};
use crate::records::{
    PatientRecord, SourceMapping, Transform, CANONICAL_COLUMNS, CARDIO_SOURCE,
    FEATURE_COLUMNS, HEART_SOURCE, TARGET_COLUMN,
};

/// Projects one source table onto the canonical columns, in canonical order.
///
/// Every mapped column is cast to `Float64`; values that cannot be cast
/// become nulls and are left for [`impute_median`].
pub fn project(df: &DataFrame, source: &SourceMapping) -> Result<DataFrame> {
    let present = df.get_column_names();
    if let Some(column) = source.required_columns().find(|c| !present.contains(c)) {
        return Err(RiskError::SchemaMismatch {
            source_name: source.name,
            column: column.to_string(),
        });
    }

    let height = df.height();
    let mut columns: Vec<Series> = Vec::with_capacity(CANONICAL_COLUMNS.len());
    for mapping in source.columns {
        let values = df.column(mapping.source)?.cast(&DataType::Float64)?;
        let transform = mapping.transform;
        let mut series = match transform {
            Transform::Identity => values,
            _ => values.f64()?.apply(|v| transform.apply(v)).into_series(),
        };
        series.rename(mapping.canonical);
        columns.push(series);
    }
    for (name, value) in source.defaults {
        columns.push(Series::new(name, vec![*value; height]));
    }

    let projected = DataFrame::new(columns)?.select(CANONICAL_COLUMNS)?;
    if projected.height() == 0 {
        return Err(RiskError::EmptyDataset {
            source_name: source.name,
        });
    }
    debug!(
        "projected source {:?}: {} rows, defaults for {:?}",
        source.name,
        projected.height(),
        source.defaults.iter().map(|(name, _)| *name).collect::<Vec<_>>()
    );
    Ok(projected)
}

/// Replaces the nulls of every numeric column with that column's median.
///
/// Columns without any non-null value are left untouched. Running this on an
/// already imputed frame returns it unchanged.
pub fn impute_median(mut df: DataFrame) -> Result<DataFrame> {
    let gaps: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|s| s.dtype().is_numeric() && s.null_count() > 0)
        .map(|s| s.name().to_string())
        .collect();

    for name in gaps {
        let column = df.column(&name)?.cast(&DataType::Float64)?;
        let Some(median) = column.median() else {
            debug!("column {:?} has no values to take a median from", name);
            continue;
        };
        debug!(
            "imputing {} missing {:?} values with median {}",
            column.null_count(),
            name,
            median
        );
        let filled = column.f64()?.fill_null_with_values(median)?.into_series();
        df.with_column(filled)?;
    }
    Ok(df)
}

/// Projects both sources, stacks them and imputes the combined table.
pub fn harmonize_frames(cardio: &DataFrame, heart: &DataFrame) -> Result<DataFrame> {
    let cardio = project(cardio, &CARDIO_SOURCE)?;
    let heart = project(heart, &HEART_SOURCE)?;
    info!(
        "harmonizing {} {:?} rows with {} {:?} rows",
        cardio.height(),
        CARDIO_SOURCE.name,
        heart.height(),
        HEART_SOURCE.name
    );

    let combined = cardio.vstack(&heart)?;
    impute_median(combined)
}

/// Reads a harmonized frame into typed records, rejecting any remaining gap.
pub fn to_records(df: &DataFrame) -> Result<Vec<PatientRecord>> {
    let table = df.select(CANONICAL_COLUMNS)?;

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(CANONICAL_COLUMNS.len());
    for name in CANONICAL_COLUMNS {
        let series = table.column(name)?.cast(&DataType::Float64)?;
        let values = series
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| value.ok_or(RiskError::MissingValue { column: name, row }))
            .collect::<Result<Vec<f64>>>()?;
        columns.push(values);
    }

    let records = (0..table.height())
        .map(|row| PatientRecord {
            age: columns[0][row],
            sex: columns[1][row],
            bp: columns[2][row],
            chol: columns[3][row],
            sugar: columns[4][row],
            ecg: columns[5][row],
            heartrate: columns[6][row],
            exercise: columns[7][row],
            smoking: columns[8][row],
            alcohol: columns[9][row],
            // an imputed label can land on .5
            target: columns[10][row].round() as i32,
        })
        .collect();
    Ok(records)
}

/// Canonical frame view of typed records, for export.
pub fn records_to_frame(records: &[PatientRecord]) -> Result<DataFrame> {
    let mut columns: Vec<Series> = FEATURE_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<f64> = records.iter().map(|r| r.features()[i]).collect();
            Series::new(name, values)
        })
        .collect();
    let target: Vec<f64> = records.iter().map(|r| f64::from(r.target)).collect();
    columns.push(Series::new(TARGET_COLUMN, target));

    Ok(DataFrame::new(columns)?)
}

/// Full harmonizer contract: two raw source tables in, canonical rows out.
pub fn harmonize(cardio: &DataFrame, heart: &DataFrame) -> Result<Vec<PatientRecord>> {
    let combined = harmonize_frames(cardio, heart)?;
    let records = to_records(&combined)?;
    info!("harmonized table has {} records", records.len());
    Ok(records)
}
