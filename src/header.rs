//! Table Header Module
//!
//! シート内に埋め込まれた表ヘッダーを解析するモジュール。
//!
//! # ヘッダーの構造
//!
//! 1. 開始行: 先頭セルが`#`、続くセルのどこかに`EOC`（この列は含まない）
//! 2. タイトル行: 列ごとのタイトル
//! 3. 型行: 列ごとの宣言型（`INT`, `STRING`など）
//! 4. 対象指定行: 列ごとの`A`（両方）/ `S`（サーバー）/ `C`（クライアント）
//!
//! ```text
//! | #      | Name   | Memo   | EOC |
//! | Id     | Name   | Memo   |     |
//! | INT    | STRING | STRING |     |
//! | A      | A      | S      |     |
//! | 1      | Alice  | boss   |     |
//! | EOR    |        |        |     |
//! ```

use tracing::debug;

use crate::api::{Audience, ColumnAudience};
use crate::error::SheetJsonError;
use crate::security::SecurityConfig;
use crate::source::{RowSource, SheetData};
use crate::types::{ColumnDescriptor, ColumnSchema, RawRow};

/// 表の開始記号
pub const START_OF_TABLE: &str = "#";

/// 列の終端記号（この列は表に含まない）
pub const END_OF_COLUMN: &str = "EOC";

/// 行の終端記号（この行は表に含まない）
pub const END_OF_ROW: &str = "EOR";

/// 表ヘッダーパーサー
///
/// データセットごとに1回だけ実行され、要求された側に不要な列を取り除いた
/// [`ColumnSchema`] を返します。解析後の [`RowSource`] は無視列を除いた行を返します。
#[derive(Debug, Clone)]
pub struct TableHeaderParser {
    audience: Audience,
    limits: SecurityConfig,
}

impl TableHeaderParser {
    pub fn new(audience: Audience) -> Self {
        Self {
            audience,
            limits: SecurityConfig::default(),
        }
    }

    /// ヘッダーを解析する
    ///
    /// # 処理フロー
    ///
    /// 1. 開始行を探す（空行や他の行は読み飛ばす）
    /// 2. `EOC`までの列数を数える
    /// 3. タイトル行・型行・対象指定行を順に読む
    /// 4. 無視列を決定し、以後の行から取り除くよう`RowSource`に設定する
    ///
    /// # 発生し得るエラー
    ///
    /// ヘッダーのどこかが不正な場合、部分的なスキーマは返さずにエラーを返します。
    pub fn parse<S: SheetData>(
        &self,
        source: &mut RowSource<S>,
    ) -> Result<ColumnSchema, SheetJsonError> {
        let column_count = self.find_start_and_count_columns(source)?;
        // 以後の行はEOCより右を切り捨て、足りない分を空セルで補う
        source.set_layout(column_count, Vec::new());

        let titles = read_header_row(source, column_count, "title", SheetJsonError::TitleRowMissing)?;
        let types = read_header_row(source, column_count, "type", SheetJsonError::TypeRowMissing)?;
        let audiences = self.read_audience_row(source, column_count)?;

        let mut columns = Vec::with_capacity(column_count);
        let mut ignored = Vec::new();
        for (index, audience) in audiences.into_iter().enumerate() {
            let descriptor = ColumnDescriptor {
                index,
                title: titles.cell(index).unwrap_or_default().to_string(),
                declared_type: types.cell(index).unwrap_or_default().to_string(),
                audience,
            };
            if audience.is_needed_by(self.audience) {
                columns.push(descriptor);
            } else {
                ignored.push(descriptor);
            }
        }

        let schema = ColumnSchema::new(columns, ignored, column_count);
        source.set_layout(column_count, schema.ignored_indices());
        debug!(
            columns = column_count,
            kept = schema.len(),
            ignored = schema.ignored().len(),
            audience = %self.audience,
            "parsed table header"
        );
        Ok(schema)
    }

    /// 開始行を探し、列数を返す
    fn find_start_and_count_columns<S: SheetData>(
        &self,
        source: &mut RowSource<S>,
    ) -> Result<usize, SheetJsonError> {
        loop {
            let row = source.next_row().ok_or(SheetJsonError::StartTokenNotFound)?;
            if row.first() != Some(START_OF_TABLE) {
                continue;
            }

            // 先頭の`#`の列もデータ列として数える
            let column_count = (1..row.len())
                .find(|&index| row.cell(index) == Some(END_OF_COLUMN))
                .ok_or(SheetJsonError::EndOfColumnTokenNotFound)?;

            if column_count > self.limits.max_column_count {
                return Err(SheetJsonError::SecurityViolation(format!(
                    "Column count {} exceeds maximum {}",
                    column_count, self.limits.max_column_count
                )));
            }
            debug!(row = source.row_number(), column_count, "found table start row");
            return Ok(column_count);
        }
    }

    /// 対象指定行を読み、列ごとの対象指定を返す
    fn read_audience_row<S: SheetData>(
        &self,
        source: &mut RowSource<S>,
        column_count: usize,
    ) -> Result<Vec<ColumnAudience>, SheetJsonError> {
        let row = source
            .next_row()
            .filter(|r| !r.is_empty())
            .ok_or(SheetJsonError::AudienceRowMissing)?;
        if row.is_end_of_table() {
            return Err(SheetJsonError::EndOfRowTokenTooEarly { row: "audience" });
        }

        (0..column_count)
            .map(|index| {
                let token = row.cell(index).filter(|t| !t.is_empty()).ok_or_else(|| {
                    SheetJsonError::AudienceColumnsInvalid {
                        column: index,
                        message: "missing audience".to_string(),
                    }
                })?;
                ColumnAudience::from_token(token).ok_or_else(|| {
                    SheetJsonError::AudienceColumnsInvalid {
                        column: index,
                        message: format!("unknown audience '{}' (expected A, S or C)", token),
                    }
                })
            })
            .collect()
    }
}

/// タイトル行・型行を読む
///
/// 行は列数ぶんに揃えられているため、最後の非空セルまでの長さで列数の不足を判定します。
fn read_header_row<S: SheetData>(
    source: &mut RowSource<S>,
    column_count: usize,
    name: &'static str,
    missing: SheetJsonError,
) -> Result<RawRow, SheetJsonError> {
    let row = match source.next_row() {
        Some(row) if !row.is_empty() => row,
        _ => return Err(missing),
    };
    if row.is_end_of_table() {
        return Err(SheetJsonError::EndOfRowTokenTooEarly { row: name });
    }

    let actual = row
        .cells()
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |index| index + 1);
    if actual != column_count {
        return Err(SheetJsonError::ColumnCountMismatch {
            row: name,
            expected: column_count,
            actual,
        });
    }
    Ok(row)
}
