//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! シートから読んだ生の行、ヘッダーから作る列スキーマ、バインド後のレコードを扱います。

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::api::ColumnAudience;
use crate::header::END_OF_ROW;

/// シート1行分の生のセル文字列
///
/// セル数はスキーマより短い場合があります（末尾の欠けたセルは空として扱う）。
/// バックエンドのデータを持たない空行は長さ0の行になります。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<Option<String>>,
    /// 無視列を取り除く前の先頭セルが`EOR`だったか
    end_of_table: bool,
}

impl RawRow {
    /// セル列から行を生成
    pub fn new(cells: Vec<Option<String>>) -> Self {
        let end_of_table = cells.first().and_then(|c| c.as_deref()) == Some(END_OF_ROW);
        Self {
            cells,
            end_of_table,
        }
    }

    /// 文字列スライスから行を生成（空文字列は`None`として扱う）
    ///
    /// テストやメモリ上のシートの構築用です。
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| {
                    let t = t.as_ref();
                    if t.is_empty() {
                        None
                    } else {
                        Some(t.to_string())
                    }
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// セルを1つも持たない行かどうか
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 指定列のセル文字列（範囲外・空セルは`None`）
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.as_deref())
    }

    pub fn cells(&self) -> &[Option<String>] {
        &self.cells
    }

    /// 先頭セル
    pub fn first(&self) -> Option<&str> {
        self.cell(0)
    }

    /// 表の終端行（シート上の先頭セルが`EOR`）かどうか
    ///
    /// 先頭列が無視列として取り除かれた後も判定は変わりません。
    pub fn is_end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// 空行かどうか
    ///
    /// すべてのセルが`null`または空文字列の場合、あるいは先頭セルが空の場合に
    /// 空行とみなします。空白のみのセルは空ではありません。
    pub fn is_blank(&self) -> bool {
        let first_missing = self.cells.first().map_or(true, |c| is_null_or_empty(c));
        first_missing || self.cells.iter().all(is_null_or_empty)
    }

    /// 無視列を取り除いた行を返す
    ///
    /// `ignored`は昇順の列インデックスです。
    pub(crate) fn without_columns(self, ignored: &[usize]) -> Self {
        if ignored.is_empty() {
            return self;
        }
        Self {
            cells: self
                .cells
                .into_iter()
                .enumerate()
                .filter(|(index, _)| ignored.binary_search(index).is_err())
                .map(|(_, cell)| cell)
                .collect(),
            end_of_table: self.end_of_table,
        }
    }
}

fn is_null_or_empty(cell: &Option<String>) -> bool {
    cell.as_deref().map_or(true, str::is_empty)
}

/// 列の記述子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// 表の元の列インデックス（0始まり、無視列を含めた位置）
    pub index: usize,

    /// タイトル行の文字列
    pub title: String,

    /// 型行のトークン（検証前の生の文字列）
    pub declared_type: String,

    /// 対象指定
    pub audience: ColumnAudience,
}

/// ヘッダーから構築された列スキーマ
///
/// 要求された側に不要な列（無視列）は取り除かれています。データセットを開くたびに
/// 一度だけ構築され、以後は変更されません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<ColumnDescriptor>,
    ignored: Vec<ColumnDescriptor>,
    column_count: usize,
}

impl ColumnSchema {
    pub(crate) fn new(
        columns: Vec<ColumnDescriptor>,
        ignored: Vec<ColumnDescriptor>,
        column_count: usize,
    ) -> Self {
        Self {
            columns,
            ignored,
            column_count,
        }
    }

    /// 無視列を除いた列
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// 無視列を除いた列数
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// 開始行から数えた列数（無視列を含む）
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// 無視された列
    pub fn ignored(&self) -> &[ColumnDescriptor] {
        &self.ignored
    }

    /// 無視列の元インデックス（昇順）
    pub fn ignored_indices(&self) -> Vec<usize> {
        self.ignored.iter().map(|c| c.index).collect()
    }

    /// 残った列のタイトル
    pub fn titles(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.title.as_str()).collect()
    }

    /// 指定タイトルが無視列のものかどうか
    pub fn is_ignored_title(&self, title: &str) -> bool {
        self.ignored.iter().any(|c| c.title == title)
    }
}

/// 宣言型に従って解析されたスカラー値
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Byte(u8),
    UShort(u16),
    UInt(u32),
    ULong(u64),
    String(String),
    Bool(bool),
    Float(f32),
    Int(i32),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Byte(v) => write!(f, "{}", v),
            ScalarValue::UShort(v) => write!(f, "{}", v),
            ScalarValue::UInt(v) => write!(f, "{}", v),
            ScalarValue::ULong(v) => write!(f, "{}", v),
            ScalarValue::String(v) => f.write_str(v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScalarValue::Byte(v) => serializer.serialize_u8(*v),
            ScalarValue::UShort(v) => serializer.serialize_u16(*v),
            ScalarValue::UInt(v) => serializer.serialize_u32(*v),
            ScalarValue::ULong(v) => serializer.serialize_u64(*v),
            ScalarValue::String(v) => serializer.serialize_str(v),
            ScalarValue::Bool(v) => serializer.serialize_bool(*v),
            ScalarValue::Float(v) => serializer.serialize_f32(*v),
            ScalarValue::Int(v) => serializer.serialize_i32(*v),
        }
    }
}

/// バインドされたフィールド値
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    /// 値なし（JSONの`null`）
    Null,
    /// スカラー値
    Scalar(ScalarValue),
    /// ネストしたレコード
    Record(BoundRecord),
    /// 固定長配列
    Array(Vec<BoundValue>),
}

impl BoundValue {
    pub fn is_null(&self) -> bool {
        matches!(self, BoundValue::Null)
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            BoundValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BoundRecord> {
        match self {
            BoundValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[BoundValue]> {
        match self {
            BoundValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<ScalarValue> for BoundValue {
    fn from(value: ScalarValue) -> Self {
        BoundValue::Scalar(value)
    }
}

impl From<Option<ScalarValue>> for BoundValue {
    fn from(value: Option<ScalarValue>) -> Self {
        value.map_or(BoundValue::Null, BoundValue::Scalar)
    }
}

impl Serialize for BoundValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BoundValue::Null => serializer.serialize_none(),
            BoundValue::Scalar(v) => v.serialize(serializer),
            BoundValue::Record(r) => r.serialize(serializer),
            BoundValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// 1行から作られたレコード
///
/// フィールドはレコードスキーマの宣言順に並びます。JSONではオブジェクトとして
/// 同じ順序で出力されます。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundRecord {
    fields: Vec<(String, BoundValue)>,
}

impl BoundRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// フィールドを追加、または既存フィールドの値を置き換える
    pub fn set(&mut self, name: &str, value: BoundValue) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// フィールド値を取得
    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, BoundValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `serde_json::Value`に変換
    pub fn to_json_value(&self) -> serde_json::Value {
        // 文字列キーのマップと有限でない浮動小数点（nullになる）しか含まないため失敗しない
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for BoundRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
