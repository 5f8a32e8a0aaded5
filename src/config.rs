//! Registry Configuration Module
//!
//! 変換対象データセットの一覧をJSONファイルから読み込むモジュール。
//!
//! # ファイル形式
//!
//! ```json
//! {
//!   "datasets": [
//!     {
//!       "file": "Monster",
//!       "record": {
//!         "name": "Monster",
//!         "fields": [
//!           { "name": "id", "title": "Id", "type": "INT", "presence": "required" },
//!           { "name": "Name", "type": "STRING" },
//!           { "name": "Stats", "record": { "name": "Stats", "fields": [
//!             { "name": "hp", "type": "INT" }
//!           ] } },
//!           { "name": "Drops", "array": { "length": 3, "type": "UINT", "presence": "optional" } }
//!         ]
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! フィールドは`type`・`record`・`array`のいずれか1つを持ちます。

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::api::{Presence, ScalarType};
use crate::error::SheetJsonError;
use crate::schema::{DatasetRegistry, FieldDescriptor, FieldKind, RecordSchema};
use crate::security::validate_file_base_name;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    datasets: Vec<DatasetSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetSpec {
    file: String,
    record: RecordSpec,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordSpec {
    name: String,
    fields: Vec<FieldSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    record: Option<RecordSpec>,
    #[serde(default)]
    array: Option<ArraySpec>,
    /// スカラーのフィールドにだけ指定できる
    #[serde(default)]
    presence: Option<Presence>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArraySpec {
    length: usize,
    #[serde(default, rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    record: Option<RecordSpec>,
    #[serde(default)]
    presence: Option<Presence>,
}

/// レジストリファイルを読み込む
///
/// # 発生し得るエラー
///
/// * `Io` - ファイルを読めない場合
/// * `Config` - JSONとして不正、またはフィールドの種類が指定されていない場合
/// * `SchemaDeclaration` - 型名が不正、またはスキーマの検証に失敗した場合
/// * `SecurityViolation` - ファイル名にパス区切りなどが含まれる場合
pub fn load_registry(path: &Path) -> Result<DatasetRegistry, SheetJsonError> {
    let text = fs::read_to_string(path)?;
    let registry = parse_registry(&text)?;
    debug!(path = %path.display(), datasets = registry.len(), "loaded dataset registry");
    Ok(registry)
}

/// レジストリのJSONテキストを解析する
pub fn parse_registry(text: &str) -> Result<DatasetRegistry, SheetJsonError> {
    let file: RegistryFile = serde_json::from_str(text)
        .map_err(|e| SheetJsonError::Config(format!("Invalid registry file: {}", e)))?;

    let mut registry = DatasetRegistry::new();
    for dataset in file.datasets {
        validate_file_base_name(&dataset.file).map_err(SheetJsonError::SecurityViolation)?;
        let schema = record_schema(dataset.record)?;
        schema.validate()?;
        registry = registry.register(dataset.file, schema);
    }
    Ok(registry)
}

fn record_schema(spec: RecordSpec) -> Result<RecordSchema, SheetJsonError> {
    let record_name = spec.name;
    let mut schema = RecordSchema::new(record_name.clone());
    for field in spec.fields {
        let kind = field_kind(
            &format!("{}.{}", record_name, field.name),
            field.ty,
            field.record,
            field.array,
            field.presence,
        )?;
        let mut descriptor = FieldDescriptor::new(field.name, kind);
        if let Some(title) = field.title {
            descriptor = descriptor.with_title(title);
        }
        schema = schema.field(descriptor);
    }
    Ok(schema)
}

fn field_kind(
    path: &str,
    ty: Option<String>,
    record: Option<RecordSpec>,
    array: Option<ArraySpec>,
    presence: Option<Presence>,
) -> Result<FieldKind, SheetJsonError> {
    if presence.is_some() && ty.is_none() {
        return Err(SheetJsonError::Config(format!(
            "Field '{}' declares 'presence' without 'type'; use the element presence for arrays",
            path
        )));
    }
    match (ty, record, array) {
        (Some(ty), None, None) => Ok(FieldKind::Scalar {
            ty: ScalarType::from_str(&ty)?,
            presence: presence.unwrap_or_default(),
        }),
        (None, Some(record), None) => Ok(FieldKind::Record(record_schema(record)?)),
        (None, None, Some(array)) => {
            let element = field_kind(
                &format!("{}[]", path),
                array.ty,
                array.record,
                None,
                array.presence,
            )?;
            Ok(FieldKind::Array {
                element: Box::new(element),
                length: array.length,
            })
        }
        _ => Err(SheetJsonError::Config(format!(
            "Field '{}' must declare exactly one of 'type', 'record' or 'array'",
            path
        ))),
    }
}
