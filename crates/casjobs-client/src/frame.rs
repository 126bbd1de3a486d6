// crates/casjobs-client/src/frame.rs
// ============================================================================
// Module: Tabular Frame
// Description: In-memory tabular frame for query results and uploads.
// Purpose: Convert between CSV text, JSON result sets, and typed cells.
// Dependencies: csv, serde_json
// ============================================================================

//! ## Overview
//! [`DataFrame`] holds column labels, rows of typed [`Cell`] values, and a row
//! [`RowIndex`]. Frames are built from the service's CSV or JSON result sets
//! and serialized back to CSV for table uploads.
//! Invariants:
//! - Every row has exactly one cell per column.
//! - A labelled index has exactly one label per row.
//! - CSV columns are typed as a whole: integer, float, bool, or text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::Read;

use serde_json::Value;

use crate::error::CasJobsError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header used for an unnamed index when serializing.
pub const DEFAULT_INDEX_NAME: &str = "index";

// ============================================================================
// SECTION: Cells
// ============================================================================

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Text value.
    Text(String),
}

impl Cell {
    /// Converts a JSON value into a cell.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number.as_i64().map_or_else(
                || number.as_f64().map_or(Self::Null, Self::Float),
                Self::Int,
            ),
            Value::String(text) => Self::Text(text.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    /// Converts the cell into a JSON value; non-finite floats become null.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Int(value) => Value::from(*value),
            Self::Float(value) => {
                serde_json::Number::from_f64(*value).map_or(Value::Null, Value::Number)
            }
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Text(text) => Value::String(text.clone()),
        }
    }

    /// Returns the value as a float when it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Matches numeric array promotion semantics.")]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as an integer when it is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the value as text when it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true for [`Cell::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the cell as a CSV field.
    fn to_field(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Formats floats so integral values keep a decimal point.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Column Typing
// ============================================================================

/// Inferred type of a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// Every non-empty field parses as an integer.
    Int,
    /// Every non-empty field parses as a number.
    Float,
    /// Every non-empty field is a boolean literal.
    Bool,
    /// Anything else.
    Text,
}

/// Parses a boolean literal the way the service's CSV consumers do.
fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Infers the type shared by every non-empty field.
fn infer_kind<'a>(fields: impl Iterator<Item = &'a str> + Clone) -> ColumnKind {
    let mut present = fields.filter(|field| !field.is_empty());
    if present.clone().all(|field| field.parse::<i64>().is_ok()) {
        ColumnKind::Int
    } else if present.clone().all(|field| field.parse::<f64>().is_ok()) {
        ColumnKind::Float
    } else if present.all(|field| parse_bool(field).is_some()) {
        ColumnKind::Bool
    } else {
        ColumnKind::Text
    }
}

/// Converts a field into a cell of the inferred kind.
fn typed_cell(field: &str, kind: ColumnKind) -> Cell {
    if field.is_empty() {
        return Cell::Null;
    }
    let parsed = match kind {
        ColumnKind::Int => field.parse().ok().map(Cell::Int),
        ColumnKind::Float => field.parse().ok().map(Cell::Float),
        ColumnKind::Bool => parse_bool(field).map(Cell::Bool),
        ColumnKind::Text => None,
    };
    parsed.unwrap_or_else(|| Cell::Text(field.to_string()))
}

// ============================================================================
// SECTION: Frame
// ============================================================================

/// Row index of a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RowIndex {
    /// Synthetic `0..n` index.
    Range,
    /// Index promoted from a column.
    Labels {
        /// Index name, usually the promoted column's header.
        name: Option<String>,
        /// One label per row.
        labels: Vec<Cell>,
    },
}

/// In-memory tabular frame.
///
/// # Invariants
/// - `rows[i].len() == columns.len()` for every row.
/// - [`RowIndex::Labels`] carries exactly `rows.len()` labels.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    /// Column labels.
    columns: Vec<String>,
    /// Row-major cells.
    rows: Vec<Vec<Cell>>,
    /// Row index.
    index: RowIndex,
}

impl DataFrame {
    /// Builds a frame with a synthetic range index.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::InvalidArgument`] when a row width differs from
    /// the number of columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, CasJobsError> {
        if let Some((position, row)) =
            rows.iter().enumerate().find(|(_, row)| row.len() != columns.len())
        {
            return Err(CasJobsError::InvalidArgument(format!(
                "row {position} has {} cells but the frame has {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            rows,
            index: RowIndex::Range,
        })
    }

    /// Replaces the row index with explicit labels.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::InvalidArgument`] when the label count differs
    /// from the row count.
    pub fn with_index(
        mut self,
        name: Option<String>,
        labels: Vec<Cell>,
    ) -> Result<Self, CasJobsError> {
        if labels.len() != self.rows.len() {
            return Err(CasJobsError::InvalidArgument(format!(
                "index has {} labels but the frame has {} rows",
                labels.len(),
                self.rows.len()
            )));
        }
        self.index = RowIndex::Labels {
            name,
            labels,
        };
        Ok(self)
    }

    /// Parses CSV text with a header row.
    ///
    /// `index_col` promotes the column at that position to the row index;
    /// `None` keeps a synthetic range index.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] for malformed CSV and
    /// [`CasJobsError::InvalidArgument`] when `index_col` is out of range.
    pub fn from_csv<R: Read>(reader: R, index_col: Option<usize>) -> Result<Self, CasJobsError> {
        let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|err| CasJobsError::Decode(err.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(CasJobsError::Decode("no columns to parse from csv".to_string()));
        }
        let mut records = Vec::new();
        for record in csv_reader.records() {
            records.push(record.map_err(|err| CasJobsError::Decode(err.to_string()))?);
        }
        if let Some(position) = index_col
            && position >= headers.len()
        {
            return Err(CasJobsError::InvalidArgument(format!(
                "index column {position} is out of range for {} columns",
                headers.len()
            )));
        }

        let kinds: Vec<ColumnKind> = (0..headers.len())
            .map(|column| {
                infer_kind(records.iter().map(move |record| record.get(column).unwrap_or("")))
            })
            .collect();

        let mut columns = Vec::with_capacity(headers.len());
        let mut index_name = None;
        for (position, header) in headers.into_iter().enumerate() {
            if Some(position) == index_col {
                index_name = Some(header);
            } else {
                columns.push(header);
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        let mut labels = Vec::with_capacity(records.len());
        for record in &records {
            let mut row = Vec::with_capacity(columns.len());
            for (position, (field, kind)) in record.iter().zip(&kinds).enumerate() {
                let cell = typed_cell(field, *kind);
                if Some(position) == index_col {
                    labels.push(cell);
                } else {
                    row.push(cell);
                }
            }
            rows.push(row);
        }

        let frame = Self::new(columns, rows)?;
        if index_col.is_some() {
            frame.with_index(index_name.filter(|name| !name.is_empty()), labels)
        } else {
            Ok(frame)
        }
    }

    /// Builds a frame from the service's structured result record.
    ///
    /// The record has the shape `{"Result": [{"Columns": [...], "Data": [[...], ...]}]}`;
    /// only the first result set is used.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when the record has another shape.
    pub fn from_result_json(value: &Value) -> Result<Self, CasJobsError> {
        let result = value
            .get("Result")
            .and_then(Value::as_array)
            .and_then(|sets| sets.first())
            .ok_or_else(|| CasJobsError::Decode("missing Result[0] in response".to_string()))?;
        let columns = result
            .get("Columns")
            .and_then(Value::as_array)
            .ok_or_else(|| CasJobsError::Decode("missing Columns in result set".to_string()))?
            .iter()
            .map(|column| column.as_str().map_or_else(|| column.to_string(), str::to_string))
            .collect::<Vec<_>>();
        let data = result
            .get("Data")
            .and_then(Value::as_array)
            .ok_or_else(|| CasJobsError::Decode("missing Data in result set".to_string()))?;
        let mut rows = Vec::with_capacity(data.len());
        for row in data {
            let cells = row
                .as_array()
                .ok_or_else(|| CasJobsError::Decode("result row is not an array".to_string()))?;
            rows.push(cells.iter().map(Cell::from_json).collect());
        }
        Self::new(columns, rows).map_err(|err| CasJobsError::Decode(err.to_string()))
    }

    /// Serializes the frame, index first, to UTF-8 CSV.
    ///
    /// The index header is its name, or [`DEFAULT_INDEX_NAME`] when the index
    /// is unnamed.
    ///
    /// # Errors
    ///
    /// Returns [`CasJobsError::Decode`] when the CSV writer fails.
    pub fn to_csv(&self) -> Result<Vec<u8>, CasJobsError> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        let index_header = self.index_name().unwrap_or(DEFAULT_INDEX_NAME);
        let header = std::iter::once(index_header).chain(self.columns.iter().map(String::as_str));
        writer.write_record(header).map_err(|err| CasJobsError::Decode(err.to_string()))?;
        for (label, row) in self.index_labels().iter().zip(&self.rows) {
            let record = std::iter::once(label.to_field()).chain(row.iter().map(Cell::to_field));
            writer.write_record(record).map_err(|err| CasJobsError::Decode(err.to_string()))?;
        }
        writer.into_inner().map_err(|err| CasJobsError::Decode(err.to_string()))
    }

    /// Renders the frame as `{"index_name", "columns", "index", "data"}` JSON.
    #[must_use]
    pub fn to_split_json(&self) -> Value {
        let index: Vec<Value> = self.index_labels().iter().map(Cell::to_json).collect();
        let data: Vec<Value> = self
            .rows
            .iter()
            .map(|row| Value::Array(row.iter().map(Cell::to_json).collect()))
            .collect();
        serde_json::json!({
            "index_name": self.index_name(),
            "columns": self.columns,
            "index": index,
            "data": data,
        })
    }

    /// Returns the cell values without labels.
    #[must_use]
    pub fn to_array(&self) -> CellArray {
        CellArray {
            rows: self.rows.len(),
            columns: self.columns.len(),
            data: self.rows.iter().flatten().cloned().collect(),
        }
    }

    /// Returns the column labels.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the row index.
    #[must_use]
    pub const fn index(&self) -> &RowIndex {
        &self.index
    }

    /// Returns the index name, treating an empty name as unnamed.
    #[must_use]
    pub fn index_name(&self) -> Option<&str> {
        match &self.index {
            RowIndex::Labels {
                name: Some(name), ..
            } if !name.is_empty() => Some(name),
            _ => None,
        }
    }

    /// Names the row index, promoting a range index to explicit labels.
    pub fn set_index_name(&mut self, name: impl Into<String>) {
        let labels = self.index_labels();
        self.index = RowIndex::Labels {
            name: Some(name.into()),
            labels,
        };
    }

    /// Returns one label per row, materializing a range index.
    #[must_use]
    pub fn index_labels(&self) -> Vec<Cell> {
        match &self.index {
            RowIndex::Range => (0..self.rows.len())
                .map(|row| Cell::Int(i64::try_from(row).unwrap_or(i64::MAX)))
                .collect(),
            RowIndex::Labels {
                labels, ..
            } => labels.clone(),
        }
    }

    /// Returns the cell at `row` in the named column.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let position = self.columns.iter().position(|label| label == column)?;
        self.rows.get(row)?.get(position)
    }

    /// Returns the number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the frame has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// SECTION: Arrays
// ============================================================================

/// Row-major two-dimensional array of cells without labels.
#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    /// Number of rows.
    rows: usize,
    /// Number of columns.
    columns: usize,
    /// Row-major values.
    data: Vec<Cell>,
}

impl CellArray {
    /// Returns `(rows, columns)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.columns)
    }

    /// Returns the value at `(row, column)`.
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> Option<&Cell> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.data.get(row * self.columns + column)
    }

    /// Returns one row.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        if row >= self.rows {
            return None;
        }
        self.data.get(row * self.columns..(row + 1) * self.columns)
    }

    /// Returns all values, row-major.
    #[must_use]
    pub fn as_slice(&self) -> &[Cell] {
        &self.data
    }

    /// Returns the values as floats when every value is numeric.
    #[must_use]
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        self.data.iter().map(Cell::as_f64).collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
