//! Record Binder Module
//!
//! 1行分のセル文字列を [`RecordLayout`] に従って [`BoundRecord`] に変換するモジュール。
//!
//! # 空セルの扱い
//!
//! 前後の空白を除いて空になるセルは空として扱います。
//!
//! | 種類 | 空セル | 値あり |
//! |------|--------|--------|
//! | `Defaulted`の文字列 | `null` | そのままの文字列 |
//! | `Defaulted`の数値・論理値 | ゼロ値 | 解析した値 |
//! | `Optional` | `null` | 解析した値 |
//! | `Required` | `FieldCannotBeNull` | 解析した値 |
//!
//! ネストしたレコード・配列は、すべての葉が`null`なら`null`になります。
//! 行全体で`null`でない値が1つもなければ、レコード自体が`None`になります。

use crate::api::{Presence, ScalarType};
use crate::conformance::RecordLayout;
use crate::error::SheetJsonError;
use crate::schema::FieldKind;
use crate::types::{BoundRecord, BoundValue, RawRow};

/// 行内の読み出し位置
struct CellCursor<'r> {
    cells: &'r [Option<String>],
    position: usize,
    row_number: usize,
}

impl<'r> CellCursor<'r> {
    fn new(row: &'r RawRow, row_number: usize) -> Self {
        Self {
            cells: row.cells(),
            position: 0,
            row_number,
        }
    }

    fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// 次のセルを読む（行末を超えた場合は`None`）
    fn next_cell(&mut self) -> Option<Option<&'r str>> {
        let cell = self.cells.get(self.position)?;
        self.position += 1;
        Some(cell.as_deref())
    }
}

/// レコードバインダー
#[derive(Debug, Clone, Copy)]
pub struct RecordBinder<'l, 'a> {
    layout: &'l RecordLayout<'a>,
}

impl<'l, 'a> RecordBinder<'l, 'a> {
    pub fn new(layout: &'l RecordLayout<'a>) -> Self {
        Self { layout }
    }

    /// 1行をレコードに変換する
    ///
    /// `row_number`はエラーメッセージ用のシート上の行番号（1始まり）です。
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(record))` - 値を持つレコード
    /// * `Ok(None)` - すべての値が`null`で、レコードが省略される場合
    /// * `Err(_)` - 必須フィールドが空、またはセルを解析できない場合
    pub fn bind(&self, row: &RawRow, row_number: usize) -> Result<Option<BoundRecord>, SheetJsonError> {
        let mut record = BoundRecord::new();
        for field in self.layout.record().fields() {
            record.set(field.name(), field.kind().default_value());
        }
        for field in self.layout.ignored_fields() {
            record.set(field.name(), BoundValue::Null);
        }

        let mut cursor = CellCursor::new(row, row_number);
        let mut has_value = false;
        for placement in self.layout.placements() {
            let field = placement.field;
            cursor.seek(placement.column);
            if let Some(value) = bind_kind(field.kind(), &mut cursor, field.name())? {
                has_value |= !value.is_null();
                record.set(field.name(), value);
            }
        }

        Ok(has_value.then_some(record))
    }
}

/// フィールドの種類に応じて値をバインドする
///
/// セルが尽きている場合は`None`を返し、呼び出し側は初期値を保持します。
fn bind_kind(
    kind: &FieldKind,
    cursor: &mut CellCursor<'_>,
    path: &str,
) -> Result<Option<BoundValue>, SheetJsonError> {
    match kind {
        FieldKind::Scalar { ty, presence } => match cursor.next_cell() {
            Some(cell) => bind_scalar(*ty, *presence, cell, cursor.row_number, path).map(Some),
            None => Ok(None),
        },
        FieldKind::Record(schema) => {
            let mut nested = BoundRecord::new();
            let mut has_value = false;
            for field in schema.fields() {
                let child_path = format!("{}.{}", path, field.name());
                let value = bind_kind(field.kind(), cursor, &child_path)?
                    .unwrap_or_else(|| field.kind().default_value());
                has_value |= !value.is_null();
                nested.set(field.name(), value);
            }
            Ok(Some(if has_value {
                BoundValue::Record(nested)
            } else {
                BoundValue::Null
            }))
        }
        FieldKind::Array { element, length } => {
            let mut items = Vec::with_capacity(*length);
            for i in 0..*length {
                let child_path = format!("{}[{}]", path, i);
                let value =
                    bind_kind(element, cursor, &child_path)?.unwrap_or_else(|| element.default_value());
                items.push(value);
            }
            Ok(Some(if items.iter().all(BoundValue::is_null) {
                BoundValue::Null
            } else {
                BoundValue::Array(items)
            }))
        }
    }
}

fn bind_scalar(
    ty: ScalarType,
    presence: Presence,
    cell: Option<&str>,
    row_number: usize,
    path: &str,
) -> Result<BoundValue, SheetJsonError> {
    let text = match cell {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return match presence {
                Presence::Defaulted => Ok(ty.zero_value().into()),
                Presence::Optional => Ok(BoundValue::Null),
                Presence::Required => Err(SheetJsonError::FieldCannotBeNull {
                    row: row_number,
                    field: path.to_string(),
                }),
            };
        }
    };

    ty.parse_text(text)
        .map(BoundValue::Scalar)
        .map_err(|e| SheetJsonError::ScalarParse {
            row: row_number,
            field: path.to_string(),
            expected: e.ty.token(),
            text: text.to_string(),
        })
}
