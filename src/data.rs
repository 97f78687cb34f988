//! Search Console dataset ingestion and normalization

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SerplensError};

/// Column names as they appear in a Search Console export
pub const SOURCE_QUERY_COLUMN: &str = "Top queries";
pub const SOURCE_CTR_COLUMN: &str = "CTR";
pub const SOURCE_POSITION_COLUMN: &str = "Position";
pub const SOURCE_IMPRESSIONS_COLUMN: &str = "Impressions";
pub const SOURCE_CLICKS_COLUMN: &str = "Clicks";

/// Normalized schema
pub const QUERY_COLUMN: &str = "query";
pub const CTR_COLUMN: &str = "ctr";
pub const POSITION_COLUMN: &str = "position";
pub const IMPRESSIONS_COLUMN: &str = "impressions";
pub const CLICKS_COLUMN: &str = "clicks";
pub const PREDICTED_CLICKS_COLUMN: &str = "predicted_clicks";

/// Feature triple used for training, in fixed order
pub const FEATURE_COLUMNS: [&str; 3] = [CTR_COLUMN, POSITION_COLUMN, IMPRESSIONS_COLUMN];

/// Training target
pub const TARGET_COLUMN: &str = CLICKS_COLUMN;

/// Raw model outputs are floored here; area-based bubble sizing breaks on
/// zero or negative values.
pub const PREDICTION_FLOOR: f64 = 0.01;

const REQUIRED_SOURCE_COLUMNS: [&str; 5] = [
    SOURCE_QUERY_COLUMN,
    SOURCE_CTR_COLUMN,
    SOURCE_POSITION_COLUMN,
    SOURCE_IMPRESSIONS_COLUMN,
    SOURCE_CLICKS_COLUMN,
];

const NORMALIZED_NUMERIC_COLUMNS: [&str; 4] =
    [CTR_COLUMN, POSITION_COLUMN, IMPRESSIONS_COLUMN, CLICKS_COLUMN];

fn malformed(column: &str, reason: impl Into<String>) -> SerplensError {
    SerplensError::MalformedColumn {
        column: column.to_string(),
        reason: reason.into(),
    }
}

/// Convert a percentage value ("12.3%", "0%", with or without the suffix)
/// to a fraction: "12.3%" becomes 0.123.
pub fn parse_ctr(value: &str) -> Result<f64> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let number: f64 = stripped.parse().map_err(|_| {
        malformed(
            SOURCE_CTR_COLUMN,
            format!("cannot parse '{}' as a percentage", value),
        )
    })?;
    Ok(number / 100.0)
}

/// One row of search-performance data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Query text (free text, may repeat)
    pub query: String,
    /// Click-through rate as a fraction in [0, 1]
    pub ctr: f64,
    /// Average ranking position, lower is better
    pub position: f64,
    pub impressions: f64,
    pub clicks: f64,
    /// Present only after model scoring, floored at [`PREDICTION_FLOOR`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_clicks: Option<f64>,
}

/// An ordered, normalized collection of observations. Row order matches the
/// upload file and is preserved for display; training shuffles internally.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
}

impl Dataset {
    /// Wrap an already-normalized frame (`query`, `ctr`, `position`,
    /// `impressions`, `clicks`). Numeric columns are cast to f64 and checked
    /// for missing values.
    pub fn new(df: DataFrame) -> Result<Self> {
        for name in [QUERY_COLUMN, CTR_COLUMN, POSITION_COLUMN, IMPRESSIONS_COLUMN, CLICKS_COLUMN] {
            if df.column(name).is_err() {
                return Err(malformed(name, "column missing"));
            }
        }

        let mut df = df;
        for name in NORMALIZED_NUMERIC_COLUMNS {
            let casted = df
                .column(name)?
                .cast(&DataType::Float64)
                .map_err(|_| malformed(name, "expected a numeric column"))?;
            if casted.null_count() > 0 {
                return Err(malformed(name, "contains missing or non-numeric values"));
            }
            df.replace(name, casted.as_materialized_series().clone())?;
        }

        Ok(Self { df })
    }

    /// Load and normalize a Search Console CSV export from disk
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file)
            .finish()?;
        Self::normalize(df)
    }

    /// Load and normalize a Search Console CSV export from an in-memory
    /// buffer (e.g. an HTTP upload)
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()?;
        Self::normalize(df)
    }

    /// Normalize a raw export frame: require the five source columns,
    /// convert `CTR` percentage strings to fractions, cast numerics to f64
    /// and reject missing values.
    pub fn normalize(df: DataFrame) -> Result<Self> {
        for name in REQUIRED_SOURCE_COLUMNS {
            if df.column(name).is_err() {
                return Err(malformed(name, "column missing"));
            }
        }

        let n_rows = df.height();

        // Query text; cast covers exports where every query is numeric
        let query_col = df
            .column(SOURCE_QUERY_COLUMN)?
            .cast(&DataType::String)
            .map_err(|_| malformed(SOURCE_QUERY_COLUMN, "expected text values"))?;
        let query_ca = query_col
            .str()
            .map_err(|e| SerplensError::DataError(e.to_string()))?;
        let mut queries: Vec<String> = Vec::with_capacity(n_rows);
        for opt in query_ca.into_iter() {
            let value = opt.ok_or_else(|| malformed(SOURCE_QUERY_COLUMN, "contains missing values"))?;
            queries.push(value.to_string());
        }

        // CTR arrives as percentage strings; some exports pre-strip the suffix
        let ctr_col = df.column(SOURCE_CTR_COLUMN)?;
        let ctr: Vec<f64> = if let Ok(ca) = ctr_col.str() {
            let mut values = Vec::with_capacity(n_rows);
            for opt in ca.into_iter() {
                let raw = opt.ok_or_else(|| malformed(SOURCE_CTR_COLUMN, "contains missing values"))?;
                values.push(parse_ctr(raw)?);
            }
            values
        } else {
            let casted = ctr_col
                .cast(&DataType::Float64)
                .map_err(|_| malformed(SOURCE_CTR_COLUMN, "expected percentage values"))?;
            let ca = casted
                .f64()
                .map_err(|e| SerplensError::DataError(e.to_string()))?;
            let mut values = Vec::with_capacity(n_rows);
            for opt in ca.into_iter() {
                let v = opt.ok_or_else(|| malformed(SOURCE_CTR_COLUMN, "contains missing values"))?;
                values.push(v / 100.0);
            }
            values
        };

        let position = numeric_column(&df, SOURCE_POSITION_COLUMN)?;
        let impressions = numeric_column(&df, SOURCE_IMPRESSIONS_COLUMN)?;
        let clicks = numeric_column(&df, SOURCE_CLICKS_COLUMN)?;

        let df = DataFrame::new(vec![
            Column::new(QUERY_COLUMN.into(), queries),
            Column::new(CTR_COLUMN.into(), ctr),
            Column::new(POSITION_COLUMN.into(), position),
            Column::new(IMPRESSIONS_COLUMN.into(), impressions),
            Column::new(CLICKS_COLUMN.into(), clicks),
        ])?;

        Ok(Self { df })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Borrow the underlying frame
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Column names in schema order
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Whether model predictions have been appended
    pub fn has_predictions(&self) -> bool {
        self.df.column(PREDICTED_CLICKS_COLUMN).is_ok()
    }

    /// Feature matrix (ctr, position, impressions), row-major
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        let n_rows = self.len();
        let col_data: Vec<Vec<f64>> = FEATURE_COLUMNS
            .iter()
            .map(|name| self.numeric_values(name))
            .collect::<Result<_>>()?;
        let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
        Ok(Array2::from_shape_fn(
            (n_rows, FEATURE_COLUMNS.len()),
            |(r, c)| col_refs[c][r],
        ))
    }

    /// Training target (clicks)
    pub fn target(&self) -> Result<Array1<f64>> {
        Ok(Array1::from_vec(self.numeric_values(TARGET_COLUMN)?))
    }

    /// Append raw model predictions as `predicted_clicks`, floored at
    /// [`PREDICTION_FLOOR`]. Returns a new dataset; the input is untouched.
    pub fn with_predicted_clicks(&self, predictions: &Array1<f64>) -> Result<Dataset> {
        if predictions.len() != self.len() {
            return Err(SerplensError::ShapeError {
                expected: format!("{} predictions", self.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }

        let floored: Vec<f64> = predictions.iter().map(|&v| v.max(PREDICTION_FLOOR)).collect();
        let mut df = self.df.clone();
        df.with_column(Series::new(PREDICTED_CLICKS_COLUMN.into(), floored))?;
        Ok(Dataset { df })
    }

    /// Typed rows, in display order
    pub fn observations(&self) -> Result<Vec<Observation>> {
        let query_col = self.df.column(QUERY_COLUMN)?;
        let query_ca = query_col
            .str()
            .map_err(|e| SerplensError::DataError(e.to_string()))?;

        let ctr = self.numeric_values(CTR_COLUMN)?;
        let position = self.numeric_values(POSITION_COLUMN)?;
        let impressions = self.numeric_values(IMPRESSIONS_COLUMN)?;
        let clicks = self.numeric_values(CLICKS_COLUMN)?;
        let predicted = if self.has_predictions() {
            Some(self.numeric_values(PREDICTED_CLICKS_COLUMN)?)
        } else {
            None
        };

        let mut rows = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            rows.push(Observation {
                query: query_ca.get(i).unwrap_or_default().to_string(),
                ctr: ctr[i],
                position: position[i],
                impressions: impressions[i],
                clicks: clicks[i],
                predicted_clicks: predicted.as_ref().map(|p| p[i]),
            });
        }
        Ok(rows)
    }

    /// First `n` rows as typed observations
    pub fn preview(&self, n: usize) -> Result<Vec<Observation>> {
        let head = Dataset {
            df: self.df.head(Some(n)),
        };
        head.observations()
    }

    fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let casted = self.df.column(name)?.cast(&DataType::Float64)?;
        let ca = casted
            .f64()
            .map_err(|e| SerplensError::DataError(e.to_string()))?;
        Ok(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect())
    }
}

/// Cast a source column to f64, rejecting missing or non-numeric values
fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let casted = df
        .column(name)?
        .cast(&DataType::Float64)
        .map_err(|_| malformed(name, "expected a numeric column"))?;
    if casted.null_count() > 0 {
        return Err(malformed(name, "contains missing or non-numeric values"));
    }
    let ca = casted
        .f64()
        .map_err(|e| SerplensError::DataError(e.to_string()))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_CSV: &str = "\
Top queries,Clicks,Impressions,CTR,Position
best running shoes,120,2400,5%,3.2
trail shoes,80,1600,5%,4.1
winter boots,15,3000,0.5%,12.7
sandals sale,4,800,0.5%,22.4
";

    fn create_test_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{}", SAMPLE_CSV).unwrap();
        file
    }

    #[test]
    fn test_parse_ctr() {
        assert!((parse_ctr("12.3%").unwrap() - 0.123).abs() < 1e-12);
        assert_eq!(parse_ctr("0%").unwrap(), 0.0);
        assert!((parse_ctr(" 45.6% ").unwrap() - 0.456).abs() < 1e-12);
        // suffix already stripped upstream
        assert!((parse_ctr("12.3").unwrap() - 0.123).abs() < 1e-12);
    }

    #[test]
    fn test_parse_ctr_garbage_rejected() {
        let err = parse_ctr("abc%").unwrap_err();
        assert!(matches!(err, SerplensError::MalformedColumn { ref column, .. } if column == "CTR"));
    }

    #[test]
    fn test_from_csv_bytes_normalizes() {
        let dataset = Dataset::from_csv_bytes(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(dataset.len(), 4);

        let rows = dataset.observations().unwrap();
        assert_eq!(rows[0].query, "best running shoes");
        assert!((rows[0].ctr - 0.05).abs() < 1e-12);
        assert_eq!(rows[0].clicks, 120.0);
        assert_eq!(rows[2].position, 12.7);
        assert!(rows[0].predicted_clicks.is_none());
    }

    #[test]
    fn test_from_csv_path() {
        let file = create_test_csv();
        let dataset = Dataset::from_csv_path(file.path()).unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(
            dataset.column_names(),
            vec!["query", "ctr", "position", "impressions", "clicks"]
        );
    }

    #[test]
    fn test_missing_column_rejected() {
        let csv = "Top queries,Clicks,Impressions,Position\nshoes,1,10,2.0\n";
        let err = Dataset::from_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, SerplensError::MalformedColumn { ref column, .. } if column == "CTR"));
    }

    #[test]
    fn test_non_numeric_position_rejected() {
        let csv = "Top queries,Clicks,Impressions,CTR,Position\nshoes,1,10,5%,high\n";
        let err = Dataset::from_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(
            matches!(err, SerplensError::MalformedColumn { ref column, .. } if column == "Position")
        );
    }

    #[test]
    fn test_missing_value_rejected() {
        let csv = "Top queries,Clicks,Impressions,CTR,Position\nshoes,,10,5%,2.0\n";
        let err = Dataset::from_csv_bytes(csv.as_bytes()).unwrap_err();
        assert!(
            matches!(err, SerplensError::MalformedColumn { ref column, .. } if column == "Clicks")
        );
    }

    #[test]
    fn test_feature_matrix_order() {
        let dataset = Dataset::from_csv_bytes(SAMPLE_CSV.as_bytes()).unwrap();
        let x = dataset.feature_matrix().unwrap();
        assert_eq!(x.nrows(), 4);
        assert_eq!(x.ncols(), 3);
        // columns are (ctr, position, impressions)
        assert!((x[[0, 0]] - 0.05).abs() < 1e-12);
        assert_eq!(x[[0, 1]], 3.2);
        assert_eq!(x[[0, 2]], 2400.0);

        let y = dataset.target().unwrap();
        assert_eq!(y.len(), 4);
        assert_eq!(y[0], 120.0);
    }

    #[test]
    fn test_prediction_floor() {
        let dataset = Dataset::from_csv_bytes(SAMPLE_CSV.as_bytes()).unwrap();
        let raw = array![-5.0, 0.0, 0.005, 2.0];
        let scored = dataset.with_predicted_clicks(&raw).unwrap();

        assert!(scored.has_predictions());
        assert!(!dataset.has_predictions(), "input must stay untouched");

        let rows = scored.observations().unwrap();
        assert_eq!(rows[0].predicted_clicks, Some(PREDICTION_FLOOR));
        assert_eq!(rows[1].predicted_clicks, Some(PREDICTION_FLOOR));
        assert_eq!(rows[2].predicted_clicks, Some(PREDICTION_FLOOR));
        assert_eq!(rows[3].predicted_clicks, Some(2.0));
    }

    #[test]
    fn test_prediction_length_mismatch() {
        let dataset = Dataset::from_csv_bytes(SAMPLE_CSV.as_bytes()).unwrap();
        let raw = array![1.0, 2.0];
        assert!(dataset.with_predicted_clicks(&raw).is_err());
    }

    #[test]
    fn test_preview_truncates() {
        let dataset = Dataset::from_csv_bytes(SAMPLE_CSV.as_bytes()).unwrap();
        let rows = dataset.preview(2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].query, "trail shoes");
    }
}
