mod schema;

pub use schema::{
    ColumnSpec, Schema, DATE_DISPLAY_FORMAT, DATE_PATTERN, INVOICE_SCHEMA, LICENSE_SCHEMA, UNIT_COLUMN,
};
