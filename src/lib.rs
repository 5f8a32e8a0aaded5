//! sheetjson - Convert header-protocol spreadsheet tables into typed JSON records
//!
//! This crate reads data tables that designers author in spreadsheets, validates them
//! against an explicitly declared record schema, and converts every data row into a
//! typed record ready for JSON serialization. It targets content build pipelines where
//! client and server builds need different subsets of the same table.
//!
//! # Table Protocol
//!
//! ```text
//! | #    | Name   | DropRate | EOC |   <- start row: column count is the index of EOC
//! | Id   | Name   | DropRate |     |   <- title row
//! | INT  | STRING | FLOAT    |     |   <- type row
//! | A    | A      | S        |     |   <- audience row (A = both, S = server, C = client)
//! | 1    | Slime  | 0.5      |     |   <- data rows (blank rows are skipped)
//! | EOR  |        |          |     |   <- end of table
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::fs::File;
//! use sheetjson::{ConverterBuilder, FieldDescriptor, RecordSchema, ScalarType};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Declare the target record
//!     let schema = RecordSchema::new("Monster")
//!         .field(FieldDescriptor::required("Id", ScalarType::Int))
//!         .field(FieldDescriptor::scalar("Name", ScalarType::String));
//!
//!     // Create a converter with default settings (client audience, first sheet)
//!     let converter = ConverterBuilder::new().build()?;
//!
//!     // Convert the workbook to JSON
//!     let json = converter.convert_to_string(File::open("Monster.xlsx")?, &schema)?;
//!     println!("{}", json);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Batch Conversion
//!
//! ```rust,no_run
//! use std::path::Path;
//! use sheetjson::{config, BatchConverter, ConverterBuilder, JsonStyle};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = config::load_registry(Path::new("registry.json"))?;
//!     let converter = ConverterBuilder::new()
//!         .with_json_style(JsonStyle::Pretty)
//!         .build()?;
//!
//!     // Writes json/client/<file>.json and json/server/<file>.json
//!     let report = BatchConverter::new(converter).run(&registry, Path::new("tables"), Path::new("json"))?;
//!     print!("{}", report.diagnostics);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Custom Sheets
//!
//! Any row provider can be converted by implementing [`SheetData`]:
//!
//! ```rust
//! use sheetjson::{Audience, ConverterBuilder, FieldDescriptor, MemorySheet, RecordSchema, ScalarType};
//!
//! # fn main() -> Result<(), sheetjson::SheetJsonError> {
//! let sheet = MemorySheet::from_texts(&[
//!     vec!["#", "", "EOC"],
//!     vec!["Id", "Name"],
//!     vec!["INT", "STRING"],
//!     vec!["A", "A"],
//!     vec!["1", "Alice"],
//!     vec!["EOR"],
//! ]);
//! let schema = RecordSchema::new("Item")
//!     .field(FieldDescriptor::scalar("Id", ScalarType::Int))
//!     .field(FieldDescriptor::scalar("Name", ScalarType::String));
//!
//! let converter = ConverterBuilder::new().build()?;
//! let records = converter.convert_rows(sheet, &schema, Audience::Client)?;
//! assert_eq!(serde_json::to_string(&records)?, r#"[{"Id":1,"Name":"Alice"}]"#);
//! # Ok(())
//! # }
//! ```

mod api;
mod batch;
mod binder;
mod builder;
pub mod config;
mod conformance;
mod error;
mod header;
pub mod output;
mod schema;
mod security;
mod source;
mod types;

// 公開API
pub use api::{
    Audience, ColumnAudience, JsonStyle, ParseScalarError, Presence, ScalarType, SheetSelector,
};
pub use batch::{BatchConverter, BatchEntry, BatchReport};
pub use binder::RecordBinder;
pub use builder::{Converter, ConverterBuilder, DatasetReport};
pub use conformance::{FieldPlacement, RecordLayout, TypeConformanceChecker};
pub use error::{Diagnostics, ErrorKind, SheetJsonError};
pub use header::{TableHeaderParser, END_OF_COLUMN, END_OF_ROW, START_OF_TABLE};
pub use output::JsonEncoder;
pub use schema::{
    DatasetEntry, DatasetRegistry, FieldDescriptor, FieldKind, RecordSchema, TableRecord,
};
pub use source::{CalamineSheet, MemorySheet, RowSource, SheetData};
pub use types::{BoundRecord, BoundValue, ColumnDescriptor, ColumnSchema, RawRow, ScalarValue};
