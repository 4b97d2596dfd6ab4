//! Labeled transaction CSV reader and writer.
use std::path::Path;

use csv::StringRecord;

use crate::data_handling::{Dataset, FeatureFrame, LabelVector};
use crate::error::{FraudError, Result};

fn parse_feature(field: &str, column: &str, line: usize) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("na") || field.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| {
        FraudError::Schema(format!(
            "Column '{}' has non-numeric value '{}' on line {}",
            column, field, line
        ))
    })
}

fn parse_label(field: &str, line: usize) -> Result<u8> {
    match field.trim().parse::<f64>() {
        Ok(v) if v == 0.0 => Ok(0),
        Ok(v) if v == 1.0 => Ok(1),
        _ => Err(FraudError::Schema(format!(
            "Label must be 0 or 1, found '{}' on line {}",
            field, line
        ))),
    }
}

/// Read a headered CSV where every column except `target_column` is a
/// numeric feature.
pub fn read_labeled_csv<P: AsRef<Path>>(path: P, target_column: &str) -> Result<Dataset> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let Some(target_idx) = headers.iter().position(|h| h == target_column) else {
        return Err(FraudError::Schema(format!(
            "Target column '{}' not found",
            target_column
        )));
    };

    let feature_names: Vec<String> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target_idx)
        .map(|(_, h)| h.to_string())
        .collect();

    let mut values = Vec::new();
    let mut labels = Vec::new();
    let mut record = StringRecord::new();
    let mut line = 1;
    while reader.read_record(&mut record)? {
        line += 1;
        for (i, field) in record.iter().enumerate() {
            if i == target_idx {
                labels.push(parse_label(field, line)?);
            } else {
                values.push(parse_feature(field, &headers[i], line)?);
            }
        }
    }

    let nrows = labels.len();
    let values = ndarray::Array2::from_shape_vec((nrows, feature_names.len()), values)
        .map_err(|e| FraudError::Schema(e.to_string()))?;

    log::debug!("Read {} rows from {}", nrows, path.display());

    Dataset::new(FeatureFrame::new(feature_names, values)?, LabelVector::from(labels))
}

/// Write a dataset back out with the label as the last column.
pub fn write_labeled_csv<P: AsRef<Path>>(path: P, dataset: &Dataset, target_column: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = dataset.features.columns().iter().map(String::as_str).collect();
    header.push(target_column);
    writer.write_record(&header)?;

    for (row, label) in dataset.features.values().outer_iter().zip(dataset.labels.iter()) {
        let mut record: Vec<String> = row
            .iter()
            .map(|v| if v.is_nan() { String::new() } else { v.to_string() })
            .collect();
        record.push(label.to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
