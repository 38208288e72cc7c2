use std::collections::HashMap;

use crate::models::Schema;
use crate::pairing::{fill_invoice_codes, fill_invoice_codes_from_fields, FieldResolver};
use crate::sanitize;
use crate::types::{LicenseField, OcrToken, RawFieldResult, Row};

/// Flat label -> text lookup a row is built from.
pub trait FieldLookup {
    fn text_for(&self, label: &str) -> Option<&str>;
}

impl FieldLookup for HashMap<String, String> {
    fn text_for(&self, label: &str) -> Option<&str> {
        self.get(label).map(String::as_str)
    }
}

/// License results nest the text one level down, under `words`.
impl FieldLookup for HashMap<String, LicenseField> {
    fn text_for(&self, label: &str) -> Option<&str> {
        self.get(label).map(|f| f.words.as_str())
    }
}

/// Build a schema-shaped row. Missing labels become empty cells; extra labels are ignored.
pub fn normalize(fields: &impl FieldLookup, schema: &Schema, unit: &str) -> Row {
    let mut row = Row::build(schema, unit, |col| fields.text_for(col.header).unwrap_or_default().to_string());
    sanitize::clean_row(row.cells_mut());
    row
}

/// Resolve invoice tokens into fields, then normalize.
pub fn normalize_invoice(tokens: &[OcrToken], resolver: &dyn FieldResolver, schema: &Schema, unit: &str) -> Row {
    let mut fields = resolver.resolve(tokens);
    fill_invoice_codes(tokens, &mut fields);
    normalize(&fields, schema, unit)
}

/// Route a raw OCR result to the normalizer matching its shape.
/// Only token streams go through `resolver`; keyed invoice fields are used as they are.
pub fn row_from_result(raw: &RawFieldResult, resolver: &dyn FieldResolver, schema: &Schema, unit: &str) -> Row {
    match raw {
        RawFieldResult::License(map) => normalize(map, schema, unit),
        RawFieldResult::Invoice(tokens) => normalize_invoice(tokens, resolver, schema, unit),
        RawFieldResult::InvoiceFields(fields) => {
            let mut fields = fields.clone();
            fill_invoice_codes_from_fields(&mut fields);
            normalize(&fields, schema, unit)
        }
    }
}
