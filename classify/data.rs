//! # Data Loading and Cleaning Module
//!
//! This module is the only place that touches user-provided data. It reads a
//! spreadsheet (the first sheet of a workbook, or a delimited text export),
//! drops incomplete records, and turns the named columns into the `ndarray`
//! structures the classifier consumes.
//!
//! - Named Schema: feature and target column names come from the run
//!   configuration and are matched exactly (case and spacing included).
//! - Complete Records: any row with a missing cell in any column is dropped
//!   before selection, so downstream stages only see complete rows. Empty
//!   cells and the usual spreadsheet markers (`NA`, `N/A`, `NaN`, `null`,
//!   `#N/A`, ...) all count as missing.
//! - User-Centric Errors: failures are assumed to be input errors and the
//!   `DataError` enum says which column is at fault.

use crate::config::DataSettings;
use calamine::{Data, Range, Reader, open_workbook_auto};
use ndarray::{Array1, Array2, Axis, ShapeBuilder};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Feature matrix and aligned binary target, ready for model training.
#[derive(Debug, Clone)]
pub struct TrainingData {
    /// Shape: [n_samples, n_features], columns in `feature_names` order.
    pub features: Array2<f64>,
    /// 0.0 / 1.0 labels, one per feature row.
    pub target: Array1<f64>,
    pub feature_names: Vec<String>,
}

impl TrainingData {
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Per-feature column means, or `None` when there are no rows.
    pub fn feature_means(&self) -> Option<Array1<f64>> {
        self.features.mean_axis(Axis(0))
    }
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to read workbook: {0}")]
    WorkbookError(#[from] calamine::Error),
    #[error("The workbook '{0}' has no worksheets, or its first sheet has no header row.")]
    EmptyWorkbook(String),
    #[error("The field separator must be a single ASCII character, got {0:?}.")]
    InvalidSeparator(char),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error("Missing or null values were found in the required column '{0}'.")]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error(
        "The target column '{column_name}' must contain only 0 and 1, but row {row} holds {value}."
    )]
    NonBinaryTarget {
        column_name: String,
        row: usize,
        value: f64,
    },
    #[error("Internal error: selected columns could not be assembled into a matrix: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

/// Cell texts read as missing, in addition to empty cells.
pub const MISSING_VALUE_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn is_missing_token(text: &str) -> bool {
    text.is_empty() || MISSING_VALUE_TOKENS.contains(&text)
}

/// Field separator for `path`: tab for `.tsv`/`.tab`/`.txt`, comma otherwise.
pub fn infer_separator(path: &Path) -> u8 {
    match extension_of(path).as_deref() {
        Some("tsv" | "tab" | "txt") => b'\t',
        _ => b',',
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_workbook(path: &Path) -> bool {
    matches!(
        extension_of(path).as_deref(),
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods")
    )
}

/// Reads a spreadsheet with a header row into a `DataFrame`.
///
/// Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read from their
/// first sheet; anything else is parsed as delimited text. Missing cells
/// become nulls either way.
pub fn load_table(path: &Path, separator: Option<char>) -> Result<DataFrame, DataError> {
    log::info!("Loading data from '{}'", path.display());
    let df = if is_workbook(path) {
        read_workbook(path)?
    } else {
        read_delimited(path, separator)?
    };
    log::info!(
        "Loaded {} rows and {} columns.",
        df.height(),
        df.width()
    );
    Ok(df)
}

fn read_delimited(path: &Path, separator: Option<char>) -> Result<DataFrame, DataError> {
    let separator = match separator {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => return Err(DataError::InvalidSeparator(c)),
        None => infer_separator(path),
    };
    let null_values = NullValues::AllColumns(
        MISSING_VALUE_TOKENS
            .iter()
            .map(|token| PlSmallStr::from(*token))
            .collect(),
    );

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(
                    CsvParseOptions::default()
                        .with_separator(separator)
                        .with_null_values(Some(null_values)),
                ),
        )
        .finish()?;
    Ok(df)
}

fn read_workbook(path: &Path) -> Result<DataFrame, DataError> {
    let source = path.display().to_string();
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::EmptyWorkbook(source.clone()))??;
    sheet_to_dataframe(&sheet, &source)
}

/// Numeric view of a cell, `None` if the cell is not a number or boolean.
fn cell_number(cell: &Data) -> Option<f64> {
    match cell {
        Data::Int(v) => Some(*v as f64),
        Data::Float(v) => Some(*v),
        Data::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn cell_is_missing(cell: &Data) -> bool {
    match cell {
        Data::Empty | Data::Error(_) => true,
        Data::String(text) => is_missing_token(text.trim()),
        _ => false,
    }
}

/// First row is the header. A column whose present cells are all numbers
/// (or booleans) becomes `Float64`; any other column is kept as text.
fn sheet_to_dataframe(sheet: &Range<Data>, source: &str) -> Result<DataFrame, DataError> {
    let mut rows = sheet.rows();
    let header = rows
        .next()
        .ok_or_else(|| DataError::EmptyWorkbook(source.to_string()))?;
    let body: Vec<&[Data]> = rows.collect();

    let columns: Vec<Column> = header
        .iter()
        .enumerate()
        .map(|(j, name_cell)| -> Column {
            let name = match name_cell {
                Data::Empty => format!("Unnamed: {j}"),
                other => other.to_string(),
            };
            let cells = || body.iter().map(move |row| &row[j]);
            let numeric = cells().all(|cell| cell_is_missing(cell) || cell_number(cell).is_some());
            if numeric {
                let values: Vec<Option<f64>> = cells()
                    .map(|cell| if cell_is_missing(cell) { None } else { cell_number(cell) })
                    .collect();
                Series::new(name.into(), values).into()
            } else {
                let values: Vec<Option<String>> = cells()
                    .map(|cell| (!cell_is_missing(cell)).then(|| cell.to_string()))
                    .collect();
                Series::new(name.into(), values).into()
            }
        })
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Fails with `ColumnNotFound` naming the first absent column.
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), DataError> {
    let present: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    for name in required {
        if !present.contains(*name) {
            return Err(DataError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Removes every row holding a null in any column. The column set is unchanged.
pub fn drop_missing(df: DataFrame) -> Result<DataFrame, DataError> {
    let before = df.height();
    let cleaned = df.lazy().drop_nulls(None).collect()?;
    let dropped = before - cleaned.height();
    if dropped > 0 {
        log::info!(
            "Dropped {dropped} of {before} rows containing missing values; {} remain.",
            cleaned.height()
        );
    }
    Ok(cleaned)
}

/// Extracts the named feature columns and the binary target, preserving row order.
pub fn select_training_data(
    df: &DataFrame,
    feature_names: &[String],
    target_name: &str,
) -> Result<TrainingData, DataError> {
    let mut required: Vec<&str> = feature_names.iter().map(|s| s.as_str()).collect();
    required.push(target_name);
    require_columns(df, &required)?;
    log::info!("All required columns found: {required:?}");

    let n = df.height();
    let mut buffer = Vec::with_capacity(n * feature_names.len());
    for name in feature_names {
        let mut column = extract_numeric_column(df, name)?;
        buffer.append(&mut column);
    }
    // Columns were appended one after another, so the buffer is column-major.
    let features = Array2::from_shape_vec((n, feature_names.len()).f(), buffer)?;

    let target_values = extract_numeric_column(df, target_name)?;
    for (row, &value) in target_values.iter().enumerate() {
        if value != 0.0 && value != 1.0 {
            return Err(DataError::NonBinaryTarget {
                column_name: target_name.to_string(),
                row: row + 1,
                value,
            });
        }
    }

    Ok(TrainingData {
        features,
        target: Array1::from_vec(target_values),
        feature_names: feature_names.to_vec(),
    })
}

/// Load → drop incomplete rows → check schema and select.
pub fn load_training_data(path: &Path, settings: &DataSettings) -> Result<TrainingData, DataError> {
    let df = load_table(path, settings.separator)?;
    let cleaned = drop_missing(df)?;
    let data = select_training_data(&cleaned, &settings.features, &settings.target)?;
    log::info!(
        "Selected {} training rows with {} features.",
        data.n_samples(),
        data.features.ncols()
    );
    Ok(data)
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = match series.cast(&DataType::Float64) {
        Ok(casted) => casted,
        Err(_) => {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }
    };

    // Non-strict casts turn unparseable cells into nulls.
    if casted.null_count() > 0 {
        return Err(DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "f64 (numeric)",
            found_type: format!("{:?}", series.dtype()),
        });
    }

    let chunked = casted.f64()?.rechunk();
    let values: Vec<f64> = chunked.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::{Builder, NamedTempFile};

    fn create_test_file(content: &str, suffix: &str) -> io::Result<NamedTempFile> {
        let mut file = Builder::new().suffix(suffix).tempfile()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    fn default_settings() -> DataSettings {
        DataSettings::default()
    }

    const HEADER: &str = "ID,smoker,alcoholic,pregnant,breast cancer";

    #[test]
    fn test_separator_inference() {
        assert_eq!(infer_separator(Path::new("a.tsv")), b'\t');
        assert_eq!(infer_separator(Path::new("a.TXT")), b'\t');
        assert_eq!(infer_separator(Path::new("a.csv")), b',');
        assert_eq!(infer_separator(Path::new("noext")), b',');
    }

    #[test]
    fn test_load_training_data_success() {
        let content = format!(
            "{HEADER}\n1,1,0,0,1\n2,0,1,0,0\n3,1,1,1,1\n4,0,0,0,0"
        );
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();

        assert_eq!(data.features.shape(), &[4, 3]);
        assert_eq!(data.target.len(), 4);
        assert_eq!(data.feature_names, vec!["smoker", "alcoholic", "pregnant"]);

        // Row-major view of a column-major buffer must still line up with the file.
        assert_abs_diff_eq!(data.features[[0, 0]], 1.0);
        assert_abs_diff_eq!(data.features[[0, 1]], 0.0);
        assert_abs_diff_eq!(data.features[[1, 1]], 1.0);
        assert_abs_diff_eq!(data.features[[2, 2]], 1.0);
        assert_abs_diff_eq!(data.target[2], 1.0);
        assert_abs_diff_eq!(data.target[3], 0.0);
    }

    #[test]
    fn test_rows_with_missing_cells_are_dropped() {
        // Row 2 misses a feature, row 4 misses an unused column; both go.
        let content = format!(
            "{HEADER}\n1,1,0,0,1\n2,,1,0,0\n3,1,1,1,1\n,0,0,0,0\n5,0,0,1,0"
        );
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();

        assert_eq!(data.n_samples(), 3);
        assert_abs_diff_eq!(data.features[[2, 2]], 1.0);
        assert_abs_diff_eq!(data.target[2], 0.0);
    }

    #[test]
    fn test_all_rows_dropped_leaves_empty_selection() {
        let content = format!("{HEADER}\n1,,0,0,1\n2,0,,0,0");
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();
        assert_eq!(data.n_samples(), 0);
        assert!(data.feature_means().is_none());
    }

    #[test]
    fn test_tab_separated_input() {
        let content = "smoker\talcoholic\tpregnant\tbreast cancer\n1\t0\t0\t1\n0\t0\t1\t0";
        let file = create_test_file(content, ".tsv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_abs_diff_eq!(data.features[[1, 2]], 1.0);
    }

    #[test]
    fn test_boolean_columns_are_coded_as_numbers() {
        let content = format!("{HEADER}\n1,true,false,false,1\n2,false,true,false,0");
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();
        assert_abs_diff_eq!(data.features[[0, 0]], 1.0);
        assert_abs_diff_eq!(data.features[[1, 0]], 0.0);
        assert_abs_diff_eq!(data.features[[1, 1]], 1.0);
    }

    #[test]
    fn test_feature_means() {
        let content = format!("{HEADER}\n1,1,0,0,1\n2,0,1,0,0\n3,1,1,0,1\n4,0,0,1,0");
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();
        let means = data.feature_means().unwrap();
        assert_abs_diff_eq!(means[0], 0.5);
        assert_abs_diff_eq!(means[1], 0.5);
        assert_abs_diff_eq!(means[2], 0.25);
    }

    #[test]
    fn test_error_column_not_found() {
        let content = "ID,smoker,alcoholic,breast cancer\n1,1,0,1";
        let file = create_test_file(content, ".csv").unwrap();
        let err = load_training_data(file.path(), &default_settings()).unwrap_err();
        match err {
            DataError::ColumnNotFound(col) => assert_eq!(col, "pregnant"),
            other => panic!("Expected ColumnNotFound(pregnant), got {:?}", other),
        }
    }

    #[test]
    fn test_error_missing_file() {
        let err = load_training_data(Path::new("/nonexistent/cohort.csv"), &default_settings())
            .unwrap_err();
        assert!(matches!(err, DataError::IoError(_)));
    }

    #[test]
    fn test_missing_value_markers_are_dropped() {
        // "NA" in a feature column must not turn it into text, and "NA" in
        // the unused ID column still drops its row.
        let content = format!(
            "{HEADER}\n1,1,0,0,1\n2,NA,1,0,0\n3,0,1,1,0\n4,1,0,1,1\nNA,0,0,1,0\n6,N/A,0,0,1\n7,0,null,0,0\n8,0,0,NaN,1"
        );
        let file = create_test_file(&content, ".csv").unwrap();
        let data = load_training_data(file.path(), &default_settings()).unwrap();

        assert_eq!(data.n_samples(), 3);
        assert_eq!(data.features.column(0).to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(data.target.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_error_invalid_separator() {
        let file = create_test_file("a;b\n1;2", ".csv").unwrap();
        let err = load_table(file.path(), Some('§')).unwrap_err();
        assert!(matches!(err, DataError::InvalidSeparator('§')));
    }

    fn write_workbook(path: &Path) {
        use rust_xlsxwriter::Workbook;

        let header = ["ID", "smoker", "alcoholic", "pregnant", "breast cancer"];
        // `None` cells are left unwritten; the string cell is a missing marker.
        let rows: [[Option<f64>; 5]; 5] = [
            [Some(1.0), Some(1.0), Some(0.0), Some(0.0), Some(1.0)],
            [Some(2.0), Some(0.0), Some(1.0), Some(1.0), Some(0.0)],
            [Some(3.0), None, Some(1.0), Some(0.0), Some(1.0)],
            [Some(4.0), Some(1.0), Some(1.0), Some(0.0), Some(1.0)],
            [None, Some(0.0), Some(0.0), Some(1.0), Some(0.0)],
        ];

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        for (i, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                if let Some(value) = cell {
                    sheet.write_number(i as u32 + 1, col as u16, *value).unwrap();
                }
            }
        }
        sheet.write_string(5, 0, "NA").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_workbook_first_sheet_is_loaded_and_cleaned() {
        let file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        write_workbook(file.path());

        let data = load_training_data(file.path(), &default_settings()).unwrap();
        assert_eq!(data.n_samples(), 3);
        assert_eq!(data.features.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(data.features.row(1).to_vec(), vec![0.0, 1.0, 1.0]);
        assert_eq!(data.features.row(2).to_vec(), vec![1.0, 1.0, 0.0]);
        assert_eq!(data.target.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sheet_cells_become_typed_columns() {
        let mut sheet: Range<Data> = Range::new((0, 0), (3, 2));
        sheet.set_value((0, 0), Data::String("smoker".to_string()));
        sheet.set_value((0, 1), Data::String("label".to_string()));
        sheet.set_value((1, 0), Data::Int(1));
        sheet.set_value((2, 0), Data::Bool(false));
        sheet.set_value((3, 0), Data::Error(calamine::CellErrorType::NA));
        sheet.set_value((1, 1), Data::String("yes".to_string()));
        sheet.set_value((2, 1), Data::String("n/a".to_string()));
        sheet.set_value((3, 1), Data::Float(2.5));

        let df = sheet_to_dataframe(&sheet, "test").unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["smoker", "label", "Unnamed: 2"]);
        assert_eq!(df.column("smoker").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("smoker").unwrap().null_count(), 1);
        assert_eq!(df.column("label").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("label").unwrap().null_count(), 1);
        assert_eq!(df.column("Unnamed: 2").unwrap().null_count(), 3);
        assert_eq!(drop_missing(df).unwrap().height(), 0);
    }

    #[test]
    fn test_error_unreadable_workbook() {
        let err = load_table(Path::new("/nonexistent/sample_data.xlsx"), None).unwrap_err();
        assert!(matches!(err, DataError::WorkbookError(_)));
    }

    #[test]
    fn test_error_workbook_without_header() {
        let sheet: Range<Data> = Range::empty();
        let err = sheet_to_dataframe(&sheet, "empty.xlsx").unwrap_err();
        assert!(matches!(err, DataError::EmptyWorkbook(name) if name == "empty.xlsx"));
    }

    #[test]
    fn test_error_wrong_type() {
        let content = format!("{HEADER}\n1,yes,0,0,1\n2,no,1,0,0");
        let file = create_test_file(&content, ".csv").unwrap();
        let result = load_training_data(file.path(), &default_settings());
        match result {
            Err(DataError::ColumnWrongType {
                column_name,
                expected_type,
                ..
            }) => {
                assert_eq!(column_name, "smoker");
                assert_eq!(expected_type, "f64 (numeric)");
            }
            _ => panic!("Expected ColumnWrongType for 'smoker', got {:?}", result),
        }
    }

    #[test]
    fn test_error_non_binary_target() {
        let content = format!("{HEADER}\n1,1,0,0,1\n2,0,1,0,2");
        let file = create_test_file(&content, ".csv").unwrap();
        let err = load_training_data(file.path(), &default_settings()).unwrap_err();
        match err {
            DataError::NonBinaryTarget { row, value, .. } => {
                assert_eq!(row, 2);
                assert_abs_diff_eq!(value, 2.0);
            }
            other => panic!("Expected NonBinaryTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_column_names() {
        let content = "age_band,exposed,outcome\n1,0,1\n0,1,0";
        let file = create_test_file(content, ".csv").unwrap();
        let settings = DataSettings {
            features: vec!["exposed".to_string(), "age_band".to_string()],
            target: "outcome".to_string(),
            ..DataSettings::default()
        };
        let data = load_training_data(file.path(), &settings).unwrap();
        assert_abs_diff_eq!(data.features[[0, 0]], 0.0);
        assert_abs_diff_eq!(data.features[[0, 1]], 1.0);
        assert_eq!(data.feature_names, vec!["exposed", "age_band"]);
    }
}
