use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{ColumnSpec, Schema};

/// Which kind of vehicle document a run reads. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DocumentMode {
    /// Vehicle registration certificate (行驶证).
    License,
    /// Motor-vehicle sales invoice (机动车销售统一发票).
    Invoice,
}

impl DocumentMode {
    pub fn schema(self) -> &'static Schema {
        Schema::for_mode(self)
    }
}

impl std::fmt::Display for DocumentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentMode::License => write!(f, "license"),
            DocumentMode::Invoice => write!(f, "invoice"),
        }
    }
}

/// One entry of the license `words_result` object. Only `words` is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LicenseField {
    #[serde(default)]
    pub words: String,
}

/// One recognized token of an invoice, in reading order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrToken {
    pub position: usize,
    pub text: String,
    /// Value the service already paired with this token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl OcrToken {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        Self { position, text: text.into(), value: None }
    }

    pub fn with_value(position: usize, text: impl Into<String>, value: impl Into<String>) -> Self {
        Self { position, text: text.into(), value: Some(value.into()) }
    }
}

/// What the OCR service returned for a single image.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFieldResult {
    License(HashMap<String, LicenseField>),
    /// Invoice text as a token stream in reading order; labels still need pairing.
    Invoice(Vec<OcrToken>),
    /// Invoice fields the service already keyed by label.
    InvoiceFields(HashMap<String, String>),
}

/// A row aligned to a schema. The first cell is the unit name; length always equals the schema's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    cells: Vec<String>,
}

impl Row {
    /// Build a row by asking `value_for` about every column after the unit column.
    pub fn build(schema: &Schema, unit: &str, mut value_for: impl FnMut(&ColumnSpec) -> String) -> Self {
        let mut cells = Vec::with_capacity(schema.len());
        cells.push(unit.to_string());
        cells.extend(schema.field_columns().iter().map(&mut value_for));
        Self { cells }
    }

    /// Row for an image whose OCR failed: unit name plus empty cells.
    pub fn empty(schema: &Schema, unit: &str) -> Self {
        Self::build(schema, unit, |_| String::new())
    }

    pub fn unit(&self) -> &str {
        &self.cells[0]
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [String] {
        &mut self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell under the given header, if the header exists.
    pub fn get(&self, schema: &Schema, header: &str) -> Option<&str> {
        schema.index_of(header).map(|i| self.cells[i].as_str())
    }
}

/// Rows of one run plus the schema they follow.
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub schema: &'static Schema,
    pub rows: Vec<Row>,
}

impl ResultTable {
    pub fn new(schema: &'static Schema) -> Self {
        Self { schema, rows: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of a batch run: either rows to export or an explicit "nothing produced".
#[derive(Debug)]
pub enum BatchOutcome {
    Table(ResultTable),
    NoData,
}
