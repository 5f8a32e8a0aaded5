//! Type Conformance Module
//!
//! レコードスキーマと表ヘッダーの宣言型を照合するモジュール。
//!
//! 照合はデータセットごとに1回、行のバインドより前に実行されます。
//! 結果として得られる [`RecordLayout`] は、各フィールドが表のどの列から始まるかを
//! 保持し、[`RecordBinder`](crate::binder::RecordBinder) がそのまま使用します。
//!
//! # 列の割り当て
//!
//! - 列を左から順に見て、タイトルが一致するフィールドをその列に割り当てる
//! - 一致するフィールドがない列は読み飛ばす（表にだけある列は許される）
//! - ネストしたレコード・配列は、割り当てられた列から葉の数だけ連続した列を占める
//! - 同じタイトルの列が複数ある場合は最初の列が使われる
//! - 無視列のタイトルを持つフィールドは列を占めず、常に`null`になる

use std::collections::HashSet;

use tracing::debug;

use crate::api::ScalarType;
use crate::error::SheetJsonError;
use crate::schema::{FieldDescriptor, FieldKind, RecordSchema};
use crate::types::{ColumnDescriptor, ColumnSchema};

/// フィールドと、その先頭列の対応
#[derive(Debug, Clone, Copy)]
pub struct FieldPlacement<'a> {
    /// 割り当てられたフィールド
    pub field: &'a FieldDescriptor,
    /// 無視列を除いた列の中での先頭位置
    pub column: usize,
}

/// 型チェック済みのレコードと列の対応表
#[derive(Debug, Clone)]
pub struct RecordLayout<'a> {
    record: &'a RecordSchema,
    placements: Vec<FieldPlacement<'a>>,
    ignored_fields: Vec<&'a FieldDescriptor>,
}

impl<'a> RecordLayout<'a> {
    pub fn record(&self) -> &'a RecordSchema {
        self.record
    }

    /// 列に割り当てられたフィールド（列順）
    pub fn placements(&self) -> &[FieldPlacement<'a>] {
        &self.placements
    }

    /// 無視列を指すフィールド
    pub fn ignored_fields(&self) -> &[&'a FieldDescriptor] {
        &self.ignored_fields
    }
}

/// 型適合チェッカー
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeConformanceChecker;

impl TypeConformanceChecker {
    pub fn new() -> Self {
        Self
    }

    /// レコードスキーマを列スキーマと照合する
    ///
    /// # 発生し得るエラー
    ///
    /// * `TypeMismatch` - スカラーの葉の型が列の宣言型と一致しない
    /// * `StructuralTypeMisuse` - ネスト・配列フィールドが残りの列に収まらない
    pub fn check<'a>(
        &self,
        record: &'a RecordSchema,
        columns: &ColumnSchema,
    ) -> Result<RecordLayout<'a>, SheetJsonError> {
        let descriptors = columns.columns();
        let mut placements = Vec::new();
        let mut placed = HashSet::new();

        let mut index = 0;
        while index < descriptors.len() {
            let title = descriptors[index].title.as_str();
            let field = match record.field_by_title(title) {
                Some(field) if placed.insert(field.name()) => field,
                _ => {
                    index += 1;
                    continue;
                }
            };

            let width = field.kind().width();
            let remaining = descriptors.len() - index;
            if width > remaining {
                return Err(SheetJsonError::StructuralTypeMisuse {
                    field: field.name().to_string(),
                    message: format!(
                        "needs {} columns starting at '{}' but only {} remain",
                        width, title, remaining
                    ),
                });
            }

            let mut leaves = Vec::with_capacity(width);
            collect_leaves(field.kind(), field.name().to_string(), &mut leaves);
            for ((path, ty), column) in leaves.iter().zip(&descriptors[index..index + width]) {
                check_leaf(path, *ty, column)?;
            }

            placements.push(FieldPlacement {
                field,
                column: index,
            });
            index += width;
        }

        let ignored_fields = record
            .fields()
            .iter()
            .filter(|f| !placed.contains(f.name()) && columns.is_ignored_title(f.title()))
            .collect::<Vec<_>>();

        debug!(
            record = record.name(),
            placed = placements.len(),
            ignored = ignored_fields.len(),
            "record schema conforms to table"
        );
        Ok(RecordLayout {
            record,
            placements,
            ignored_fields,
        })
    }
}

/// スカラーの葉を深さ優先で列挙する（配列要素はインデックス順）
fn collect_leaves(kind: &FieldKind, path: String, out: &mut Vec<(String, ScalarType)>) {
    match kind {
        FieldKind::Scalar { ty, .. } => out.push((path, *ty)),
        FieldKind::Record(schema) => {
            for field in schema.fields() {
                collect_leaves(field.kind(), format!("{}.{}", path, field.name()), out);
            }
        }
        FieldKind::Array { element, length } => {
            for i in 0..*length {
                collect_leaves(element, format!("{}[{}]", path, i), out);
            }
        }
    }
}

fn check_leaf(path: &str, ty: ScalarType, column: &ColumnDescriptor) -> Result<(), SheetJsonError> {
    if ty.matches_token(&column.declared_type) {
        return Ok(());
    }
    Err(SheetJsonError::TypeMismatch {
        title: column.title.clone(),
        field: path.to_string(),
        declared: column.declared_type.clone(),
        expected: ty.token(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Audience, ColumnAudience};
    use crate::error::ErrorKind;

    fn columns(defs: &[(&str, &str, ColumnAudience)], audience: Audience) -> ColumnSchema {
        let mut kept = Vec::new();
        let mut ignored = Vec::new();
        for (index, (title, declared, column_audience)) in defs.iter().enumerate() {
            let descriptor = ColumnDescriptor {
                index,
                title: title.to_string(),
                declared_type: declared.to_string(),
                audience: *column_audience,
            };
            if column_audience.is_needed_by(audience) {
                kept.push(descriptor);
            } else {
                ignored.push(descriptor);
            }
        }
        ColumnSchema::new(kept, ignored, defs.len())
    }

    fn all(defs: &[(&str, &str)]) -> ColumnSchema {
        let defs: Vec<_> = defs
            .iter()
            .map(|(t, d)| (*t, *d, ColumnAudience::All))
            .collect();
        columns(&defs, Audience::Client)
    }

    #[test]
    fn test_matching_scalars() {
        let record = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::optional("Name", ScalarType::String));
        let table = all(&[("Id", "int"), ("Name", "STRING")]);

        let layout = TypeConformanceChecker::new().check(&record, &table).unwrap();
        let placed: Vec<_> = layout
            .placements()
            .iter()
            .map(|p| (p.field.name(), p.column))
            .collect();
        assert_eq!(placed, vec![("Id", 0), ("Name", 1)]);
    }

    #[test]
    fn test_type_mismatch() {
        let record = RecordSchema::new("Item").field(FieldDescriptor::scalar("Id", ScalarType::Int));
        let table = all(&[("Id", "STRING")]);

        let err = TypeConformanceChecker::new().check(&record, &table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaTypeMismatch);
        assert!(err.to_string().contains("'Id'"));
    }

    #[test]
    fn test_extra_columns_and_fields_are_legal() {
        let record = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::scalar("Unused", ScalarType::Bool));
        let table = all(&[("Memo", "STRING"), ("Id", "INT")]);

        let layout = TypeConformanceChecker::new().check(&record, &table).unwrap();
        assert_eq!(layout.placements().len(), 1);
        assert_eq!(layout.placements()[0].column, 1);
    }

    #[test]
    fn test_ignored_column_is_not_type_checked() {
        // サーバー専用列はクライアント出力では型が合わなくても問題ない
        let record = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::scalar("Secret", ScalarType::Int));
        let table = columns(
            &[
                ("Id", "INT", ColumnAudience::All),
                ("Secret", "STRING", ColumnAudience::ServerOnly),
            ],
            Audience::Client,
        );

        let layout = TypeConformanceChecker::new().check(&record, &table).unwrap();
        assert_eq!(layout.placements().len(), 1);
        let ignored: Vec<_> = layout.ignored_fields().iter().map(|f| f.name()).collect();
        assert_eq!(ignored, vec!["Secret"]);
    }

    #[test]
    fn test_nested_and_array_leaves_use_consecutive_columns() {
        let stats = RecordSchema::new("Stats")
            .field(FieldDescriptor::scalar("hp", ScalarType::Int))
            .field(FieldDescriptor::scalar("speed", ScalarType::Float));
        let record = RecordSchema::new("Monster")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::record("Stats", stats))
            .field(FieldDescriptor::array(
                "Tags",
                FieldKind::scalar(ScalarType::String),
                2,
            ));
        let table = all(&[
            ("Id", "INT"),
            ("Stats", "INT"),
            ("", "FLOAT"),
            ("Tags", "STRING"),
            ("", "STRING"),
        ]);

        let layout = TypeConformanceChecker::new().check(&record, &table).unwrap();
        let columns: Vec<_> = layout.placements().iter().map(|p| p.column).collect();
        assert_eq!(columns, vec![0, 1, 3]);
    }

    #[test]
    fn test_nested_leaf_mismatch_names_path() {
        let stats = RecordSchema::new("Stats")
            .field(FieldDescriptor::scalar("hp", ScalarType::Int))
            .field(FieldDescriptor::scalar("speed", ScalarType::Float));
        let record = RecordSchema::new("Monster").field(FieldDescriptor::record("Stats", stats));
        let table = all(&[("Stats", "INT"), ("", "INT")]);

        match TypeConformanceChecker::new().check(&record, &table) {
            Err(SheetJsonError::TypeMismatch { field, .. }) => assert_eq!(field, "Stats.speed"),
            other => panic!("Expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_array_wider_than_table() {
        let record = RecordSchema::new("Item").field(FieldDescriptor::array(
            "Tags",
            FieldKind::scalar(ScalarType::String),
            3,
        ));
        let table = all(&[("Tags", "STRING"), ("", "STRING")]);

        let err = TypeConformanceChecker::new().check(&record, &table).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralTypeMisuse);
    }

    #[test]
    fn test_first_column_with_title_wins() {
        let record = RecordSchema::new("Item").field(FieldDescriptor::scalar("Id", ScalarType::Int));
        let table = all(&[("Id", "INT"), ("Id", "STRING")]);

        let layout = TypeConformanceChecker::new().check(&record, &table).unwrap();
        assert_eq!(layout.placements().len(), 1);
        assert_eq!(layout.placements()[0].column, 0);
    }
}
