//! Record Schema Module
//!
//! 変換先レコードの構造を明示的に宣言するための型を定義するモジュール。
//! フィールドごとに名前・タイトル・種類を持ち、行のバインド時に毎回解析し直すことはありません。

use std::collections::HashSet;

use crate::api::{Presence, ScalarType};
use crate::error::SheetJsonError;
use crate::security::SecurityConfig;
use crate::types::BoundValue;

/// フィールドの種類
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// スカラー（セル1つ）
    Scalar {
        /// 基本型
        ty: ScalarType,
        /// 空セルの扱い
        presence: Presence,
    },

    /// ネストしたレコード
    Record(RecordSchema),

    /// 固定長配列
    Array {
        /// 要素の種類
        element: Box<FieldKind>,
        /// 要素数
        length: usize,
    },
}

impl FieldKind {
    /// デフォルトの扱いのスカラー
    pub fn scalar(ty: ScalarType) -> Self {
        FieldKind::Scalar {
            ty,
            presence: Presence::Defaulted,
        }
    }

    /// 空なら`null`になるスカラー
    pub fn optional(ty: ScalarType) -> Self {
        FieldKind::Scalar {
            ty,
            presence: Presence::Optional,
        }
    }

    /// 空を許さないスカラー
    pub fn required(ty: ScalarType) -> Self {
        FieldKind::Scalar {
            ty,
            presence: Presence::Required,
        }
    }

    /// 表上で占める列数（スカラーの葉の数）
    pub fn width(&self) -> usize {
        match self {
            FieldKind::Scalar { .. } => 1,
            FieldKind::Record(schema) => schema.width(),
            FieldKind::Array { element, length } => element.width() * length,
        }
    }

    /// 対応する列がないときの初期値
    ///
    /// 値型のスカラーはゼロ値、それ以外は`null`です。
    pub fn default_value(&self) -> BoundValue {
        match self {
            FieldKind::Scalar {
                ty,
                presence: Presence::Defaulted,
            } => ty.zero_value().into(),
            _ => BoundValue::Null,
        }
    }

    fn validate(&self, path: &str, limits: &SecurityConfig) -> Result<(), SheetJsonError> {
        match self {
            FieldKind::Scalar { .. } => Ok(()),
            FieldKind::Record(schema) => schema.validate_with(path, limits),
            FieldKind::Array { element, length } => {
                if *length == 0 {
                    return Err(SheetJsonError::SchemaDeclaration(format!(
                        "Array field '{}' must have a length of at least 1",
                        path
                    )));
                }
                if *length > limits.max_array_length {
                    return Err(SheetJsonError::SecurityViolation(format!(
                        "Array field '{}' length {} exceeds maximum {}",
                        path, length, limits.max_array_length
                    )));
                }
                element.validate(&format!("{}[]", path), limits)
            }
        }
    }
}

/// レコードのフィールド記述子
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    title: Option<String>,
    kind: FieldKind,
}

impl FieldDescriptor {
    /// 任意の種類のフィールドを生成
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            title: None,
            kind,
        }
    }

    /// デフォルトの扱いのスカラーフィールド
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, FieldKind::scalar(ty))
    }

    /// 空なら`null`になるスカラーフィールド
    pub fn optional(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, FieldKind::optional(ty))
    }

    /// 空を許さないスカラーフィールド
    pub fn required(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, FieldKind::required(ty))
    }

    /// ネストしたレコードのフィールド
    pub fn record(name: impl Into<String>, schema: RecordSchema) -> Self {
        Self::new(name, FieldKind::Record(schema))
    }

    /// 固定長配列のフィールド
    pub fn array(name: impl Into<String>, element: FieldKind, length: usize) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                element: Box::new(element),
                length,
            },
        )
    }

    /// 表のタイトルを明示的に指定する（省略時はフィールド名）
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 表のタイトル
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// 変換先レコードのスキーマ
///
/// # 使用例
///
/// ```rust
/// use sheetjson::{FieldDescriptor, RecordSchema, ScalarType};
///
/// let schema = RecordSchema::new("Item")
///     .field(FieldDescriptor::scalar("id", ScalarType::Int).with_title("Id"))
///     .field(FieldDescriptor::scalar("name", ScalarType::String).with_title("Name"));
///
/// assert_eq!(schema.width(), 2);
/// assert!(schema.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// フィールドを追加する
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// レコード型の名前（診断メッセージ用）
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// タイトルからフィールドを探す
    pub fn field_by_title(&self, title: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.title() == title)
    }

    /// 表上で占める列数の合計
    pub fn width(&self) -> usize {
        self.fields.iter().map(|f| f.kind.width()).sum()
    }

    /// 宣言を検証する
    ///
    /// # 発生し得るエラー
    ///
    /// * `SchemaDeclaration` - 名前が空、フィールドがない、タイトルが重複、配列長が0
    /// * `SecurityViolation` - 配列長が上限を超える
    pub fn validate(&self) -> Result<(), SheetJsonError> {
        self.validate_with(&self.name, &SecurityConfig::default())
    }

    pub(crate) fn validate_with(
        &self,
        path: &str,
        limits: &SecurityConfig,
    ) -> Result<(), SheetJsonError> {
        if self.name.trim().is_empty() {
            return Err(SheetJsonError::SchemaDeclaration(format!(
                "Record at '{}' has an empty name",
                path
            )));
        }
        if self.fields.is_empty() {
            return Err(SheetJsonError::SchemaDeclaration(format!(
                "Record '{}' declares no fields",
                self.name
            )));
        }

        let mut titles = HashSet::new();
        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() || field.title().trim().is_empty() {
                return Err(SheetJsonError::SchemaDeclaration(format!(
                    "Record '{}' has a field with an empty name or title",
                    self.name
                )));
            }
            if !names.insert(field.name.as_str()) {
                return Err(SheetJsonError::SchemaDeclaration(format!(
                    "Record '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
            if !titles.insert(field.title()) {
                return Err(SheetJsonError::SchemaDeclaration(format!(
                    "Record '{}' maps title '{}' to more than one field",
                    self.name,
                    field.title()
                )));
            }
            field
                .kind
                .validate(&format!("{}.{}", path, field.name), limits)?;
        }
        Ok(())
    }
}

/// 静的にスキーマを宣言するレコード型
///
/// `serde::Deserialize`と組み合わせると、`Converter::convert_typed`で
/// 型付きのレコード列を直接得られます。
///
/// ```rust
/// use serde::Deserialize;
/// use sheetjson::{FieldDescriptor, RecordSchema, ScalarType, TableRecord};
///
/// #[derive(Deserialize)]
/// struct Item {
///     #[serde(rename = "Id")]
///     id: i32,
/// }
///
/// impl TableRecord for Item {
///     fn schema() -> RecordSchema {
///         RecordSchema::new("Item").field(FieldDescriptor::scalar("Id", ScalarType::Int))
///     }
/// }
///
/// assert_eq!(Item::schema().width(), 1);
/// ```
pub trait TableRecord {
    fn schema() -> RecordSchema;
}

/// 変換対象の1データセット
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    /// 拡張子を除いたファイル名
    pub file_base_name: String,
    /// 変換先レコードのスキーマ
    pub schema: RecordSchema,
}

impl DatasetEntry {
    pub fn new(file_base_name: impl Into<String>, schema: RecordSchema) -> Self {
        Self {
            file_base_name: file_base_name.into(),
            schema,
        }
    }
}

/// 変換対象データセットの一覧（登録順に処理される）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetRegistry {
    entries: Vec<DatasetEntry>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// データセットを登録する
    pub fn register(mut self, file_base_name: impl Into<String>, schema: RecordSchema) -> Self {
        self.entries.push(DatasetEntry::new(file_base_name, schema));
        self
    }

    /// 型付きレコードのデータセットを登録する
    pub fn register_type<T: TableRecord>(self, file_base_name: impl Into<String>) -> Self {
        self.register(file_base_name, T::schema())
    }

    pub fn push(&mut self, entry: DatasetEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[DatasetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
