//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。
//! `Converter`はデータセット1つ分の変換（オープン → ヘッダー解析 → 型チェック →
//! 行のバインド → クローズ）を実行します。

use std::io::{Read, Seek};
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::api::{Audience, JsonStyle, SheetSelector};
use crate::binder::RecordBinder;
use crate::conformance::TypeConformanceChecker;
use crate::error::{Diagnostics, ErrorKind, SheetJsonError};
use crate::header::TableHeaderParser;
use crate::output::JsonEncoder;
use crate::schema::{RecordSchema, TableRecord};
use crate::security::validate_file_base_name;
use crate::source::{CalamineSheet, RowSource, SheetData};
use crate::types::BoundRecord;

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// 出力対象（クライアント / サーバー）
    pub audience: Audience,

    /// シート選択方式
    pub sheet_selector: SheetSelector,

    /// データセットファイルの拡張子（`.`を含む）
    pub extension: String,

    /// JSON出力の書式
    pub json_style: JsonStyle,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            audience: Audience::Client,
            sheet_selector: SheetSelector::Index(0),
            extension: ".xlsx".to_string(),
            json_style: JsonStyle::Compact,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust
/// use sheetjson::{Audience, ConverterBuilder, SheetSelector};
///
/// # fn main() -> Result<(), sheetjson::SheetJsonError> {
/// let converter = ConverterBuilder::new()
///     .with_audience(Audience::Server)
///     .with_sheet_selector(SheetSelector::Index(0))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - 出力対象: クライアント
    /// - シート選択: 最初のシート
    /// - 拡張子: `.xlsx`
    /// - JSON書式: 圧縮形式
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// 出力対象を指定する
    ///
    /// 対象に不要な列（`S`または`C`の列）は変換前に取り除かれます。
    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.config.audience = audience;
        self
    }

    /// 変換対象のシートを選択する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use sheetjson::{ConverterBuilder, SheetSelector};
    ///
    /// // シートをインデックスで指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Index(1));
    ///
    /// // シートを名前で指定
    /// let builder = ConverterBuilder::new()
    ///     .with_sheet_selector(SheetSelector::Name("Items".to_string()));
    /// ```
    pub fn with_sheet_selector(mut self, selector: SheetSelector) -> Self {
        self.config.sheet_selector = selector;
        self
    }

    /// データセットファイルの拡張子を指定する（例: `.xlsx`, `.xls`, `.ods`）
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into();
        self
    }

    /// JSON出力の書式を指定する
    pub fn with_json_style(mut self, style: JsonStyle) -> Self {
        self.config.json_style = style;
        self
    }

    /// 設定を検証し、`Converter`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `SheetJsonError::Config(String)`: 設定の検証に失敗した場合
    ///   * 拡張子が空、または`.`で始まらない
    ///   * シート名の指定が空文字列
    pub fn build(self) -> Result<Converter, SheetJsonError> {
        // 1. 拡張子の検証
        let extension = &self.config.extension;
        if extension.len() < 2 || !extension.starts_with('.') {
            return Err(SheetJsonError::Config(format!(
                "Invalid extension '{}': must start with '.' and name a file type",
                extension
            )));
        }
        if extension.contains(['/', '\\']) {
            return Err(SheetJsonError::Config(format!(
                "Invalid extension '{}': must not contain a path separator",
                extension
            )));
        }

        // 2. シート名の検証
        if let SheetSelector::Name(ref name) = self.config.sheet_selector {
            if name.trim().is_empty() {
                return Err(SheetJsonError::Config(
                    "Sheet name must not be empty".to_string(),
                ));
            }
        }

        Ok(Converter::new(self.config))
    }
}

/// データセット1つ分の変換結果
///
/// 成功・失敗にかかわらず、ファイル名・レコード型で修飾された診断メッセージを保持します。
#[derive(Debug)]
pub struct DatasetReport {
    /// 拡張子を除いたファイル名
    pub file_base_name: String,

    /// レコード型の名前
    pub record_type: String,

    /// 出力対象
    pub audience: Audience,

    /// バインドされたレコード列、または最初に発生したエラー
    pub result: Result<Vec<BoundRecord>, SheetJsonError>,

    /// 診断メッセージ
    pub diagnostics: Diagnostics,
}

impl DatasetReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// 成功した場合のレコード列
    pub fn records(&self) -> Option<&[BoundRecord]> {
        self.result.as_deref().ok()
    }

    /// 失敗した場合のエラーの種類
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(SheetJsonError::kind)
    }
}

/// 変換処理のファサード
///
/// 埋め込みヘッダーを持つシートをレコード列に変換するためのメインエントリーポイントです。
///
/// # 使用例
///
/// ```rust,no_run
/// use sheetjson::{ConverterBuilder, FieldDescriptor, RecordSchema, ScalarType};
/// use std::fs::File;
///
/// # fn main() -> Result<(), sheetjson::SheetJsonError> {
/// let schema = RecordSchema::new("Item")
///     .field(FieldDescriptor::scalar("Id", ScalarType::Int))
///     .field(FieldDescriptor::scalar("Name", ScalarType::String));
///
/// let converter = ConverterBuilder::new().build()?;
/// let json = converter.convert_to_string(File::open("Item.xlsx")?, &schema)?;
/// println!("{}", json);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,
}

impl Converter {
    pub(crate) fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// 設定された出力対象
    pub fn audience(&self) -> Audience {
        self.config.audience
    }

    /// 設定されたJSON書式のエンコーダー
    pub fn encoder(&self) -> JsonEncoder {
        JsonEncoder::from_style(self.config.json_style)
    }

    /// ディレクトリ内のデータセットファイルを変換する
    ///
    /// `directory/<file_base_name><拡張子>`を開き、指定された対象向けに変換します。
    /// エラーは戻り値ではなく [`DatasetReport::result`] に格納され、診断メッセージが付与されます。
    ///
    /// # 処理フロー
    ///
    /// 1. スキーマとファイル名の検証
    /// 2. シートを開く
    /// 3. ヘッダー解析 → 型チェック → 行のバインド
    /// 4. シートを閉じる（エラー時も必ず閉じる）
    pub fn convert_dataset(
        &self,
        directory: &Path,
        file_base_name: &str,
        schema: &RecordSchema,
        audience: Audience,
    ) -> DatasetReport {
        let result = self.open_and_convert(directory, file_base_name, schema, audience);

        let mut diagnostics = Diagnostics::new();
        match &result {
            Ok(records) => {
                info!(
                    file = file_base_name,
                    record = schema.name(),
                    %audience,
                    records = records.len(),
                    "dataset converted"
                );
            }
            Err(e) => {
                warn!(
                    file = file_base_name,
                    record = schema.name(),
                    %audience,
                    code = e.kind().code(),
                    error = %e,
                    "dataset conversion failed"
                );
                diagnostics.push(format!(
                    "{} ({}) {} conversion failed: [{}] {}",
                    file_base_name,
                    schema.name(),
                    audience,
                    e.kind(),
                    e
                ));
            }
        }

        DatasetReport {
            file_base_name: file_base_name.to_string(),
            record_type: schema.name().to_string(),
            audience,
            result,
            diagnostics,
        }
    }

    fn open_and_convert(
        &self,
        directory: &Path,
        file_base_name: &str,
        schema: &RecordSchema,
        audience: Audience,
    ) -> Result<Vec<BoundRecord>, SheetJsonError> {
        validate_file_base_name(file_base_name).map_err(SheetJsonError::SecurityViolation)?;
        // シートを開く前にスキーマを検証する
        schema.validate()?;

        let path = directory.join(format!("{}{}", file_base_name, self.config.extension));
        debug!(path = %path.display(), "opening dataset");
        let sheet = CalamineSheet::open(&path, &self.config.sheet_selector)?;
        self.convert_rows(sheet, schema, audience)
    }

    /// メモリ上のワークブックを変換する
    ///
    /// 出力対象とシートはビルダーの設定に従います。
    pub fn convert<R: Read + Seek>(
        &self,
        input: R,
        schema: &RecordSchema,
    ) -> Result<Vec<BoundRecord>, SheetJsonError> {
        schema.validate()?;
        let sheet = CalamineSheet::from_reader(input, &self.config.sheet_selector)?;
        self.convert_rows(sheet, schema, self.config.audience)
    }

    /// メモリ上のワークブックを変換し、JSON文字列を返す
    pub fn convert_to_string<R: Read + Seek>(
        &self,
        input: R,
        schema: &RecordSchema,
    ) -> Result<String, SheetJsonError> {
        let records = self.convert(input, schema)?;
        self.encoder().encode(&records)
    }

    /// 型付きレコード列に変換する
    ///
    /// スキーマは`T::schema()`から取得し、各レコードを`serde`で`T`に変換します。
    ///
    /// ```rust,no_run
    /// use serde::Deserialize;
    /// use sheetjson::{ConverterBuilder, FieldDescriptor, RecordSchema, ScalarType, TableRecord};
    /// use std::fs::File;
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
    /// # fn main() -> Result<(), sheetjson::SheetJsonError> {
    /// let converter = ConverterBuilder::new().build()?;
    /// let items: Vec<Item> = converter.convert_typed(File::open("Item.xlsx")?)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn convert_typed<T, R>(&self, input: R) -> Result<Vec<T>, SheetJsonError>
    where
        T: TableRecord + DeserializeOwned,
        R: Read + Seek,
    {
        let schema = T::schema();
        self.convert(input, &schema)?
            .iter()
            .map(|record| serde_json::from_value(record.to_json_value()).map_err(SheetJsonError::from))
            .collect()
    }

    /// 任意のシートを変換する
    ///
    /// シートの所有権を受け取り、成功・失敗にかかわらず返す前に閉じます。
    pub fn convert_rows<S: SheetData>(
        &self,
        sheet: S,
        schema: &RecordSchema,
        audience: Audience,
    ) -> Result<Vec<BoundRecord>, SheetJsonError> {
        let mut source = RowSource::new(sheet);
        let result = schema
            .validate()
            .and_then(|()| run_pipeline(&mut source, schema, audience));
        source.close();
        result
    }
}

/// ヘッダー解析から終端行までを実行する
fn run_pipeline<S: SheetData>(
    source: &mut RowSource<S>,
    schema: &RecordSchema,
    audience: Audience,
) -> Result<Vec<BoundRecord>, SheetJsonError> {
    let columns = TableHeaderParser::new(audience).parse(source)?;
    let layout = TypeConformanceChecker::new().check(schema, &columns)?;
    let binder = RecordBinder::new(&layout);

    let mut records = Vec::new();
    loop {
        let row = source.next_row().ok_or(SheetJsonError::EndOfRowTokenNotFound)?;
        if row.is_end_of_table() {
            break;
        }
        if row.is_blank() {
            continue;
        }
        if let Some(record) = binder.bind(&row, source.row_number())? {
            records.push(record);
        }
    }

    debug!(records = records.len(), "reached end of table");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ScalarType;
    use crate::schema::FieldDescriptor;
    use crate::source::MemorySheet;
    use serde_json::json;

    fn item_schema() -> RecordSchema {
        RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::scalar("Name", ScalarType::String))
    }

    fn sheet(data: &[Vec<&str>]) -> MemorySheet {
        let mut rows = vec![
            vec!["#", "", "EOC"],
            vec!["Id", "Name"],
            vec!["INT", "STRING"],
            vec!["A", "A"],
        ];
        rows.extend(data.iter().cloned());
        MemorySheet::from_texts(&rows)
    }

    fn convert(
        data: &[Vec<&str>],
        schema: &RecordSchema,
    ) -> Result<serde_json::Value, SheetJsonError> {
        let converter = ConverterBuilder::new().build()?;
        let records = converter.convert_rows(sheet(data), schema, Audience::Client)?;
        Ok(serde_json::to_value(&records)?)
    }

    #[test]
    fn test_converter_builder_new() {
        let builder = ConverterBuilder::new();
        assert_eq!(builder.config.audience, Audience::Client);
        assert_eq!(builder.config.sheet_selector, SheetSelector::Index(0));
        assert_eq!(builder.config.extension, ".xlsx");
        assert_eq!(builder.config.json_style, JsonStyle::Compact);
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = ConverterBuilder::new()
            .with_audience(Audience::Server)
            .with_sheet_selector(SheetSelector::Name("Items".to_string()))
            .with_extension(".xls")
            .with_json_style(JsonStyle::Pretty);

        assert_eq!(builder.config.audience, Audience::Server);
        assert!(matches!(
            builder.config.sheet_selector,
            SheetSelector::Name(ref name) if name == "Items"
        ));
        assert_eq!(builder.config.extension, ".xls");
        assert_eq!(builder.config.json_style, JsonStyle::Pretty);
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_build_with_invalid_extension() {
        for extension in ["", ".", "xlsx", "./x"] {
            match ConverterBuilder::new().with_extension(extension).build() {
                Err(SheetJsonError::Config(msg)) => assert!(msg.contains("extension")),
                other => panic!("Expected Config error for '{}', got {:?}", extension, other),
            }
        }
    }

    #[test]
    fn test_build_with_empty_sheet_name() {
        let result = ConverterBuilder::new()
            .with_sheet_selector(SheetSelector::Name("  ".to_string()))
            .build();
        assert!(matches!(result, Err(SheetJsonError::Config(_))));
    }

    #[test]
    fn test_simple_table() {
        let value = convert(&[vec!["1", "Alice"], vec!["EOR"]], &item_schema()).unwrap();
        assert_eq!(value, json!([{"Id": 1, "Name": "Alice"}]));
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let value = convert(
            &[
                vec!["1", "Alice"],
                vec![],
                vec!["", "orphan"],
                vec!["2", "Bob"],
                vec!["EOR", "ignored"],
                vec!["3", "after end"],
            ],
            &item_schema(),
        )
        .unwrap();
        assert_eq!(
            value,
            json!([{"Id": 1, "Name": "Alice"}, {"Id": 2, "Name": "Bob"}])
        );
    }

    #[test]
    fn test_missing_end_of_row_token() {
        let err = convert(&[vec!["1", "Alice"]], &item_schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RowEndNotFound);
    }

    #[test]
    fn test_ignored_first_column_keeps_end_of_row() {
        let rows = [
            vec!["#", "", "EOC"],
            vec!["Secret", "Name"],
            vec!["INT", "STRING"],
            vec!["S", "A"],
            vec!["7", "Alice"],
            vec!["EOR"],
        ];
        let schema = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Secret", ScalarType::Int))
            .field(FieldDescriptor::scalar("Name", ScalarType::String));
        let converter = ConverterBuilder::new().build().unwrap();

        let client = converter
            .convert_rows(MemorySheet::from_texts(&rows), &schema, Audience::Client)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&client).unwrap(),
            json!([{"Secret": null, "Name": "Alice"}])
        );

        let server = converter
            .convert_rows(MemorySheet::from_texts(&rows), &schema, Audience::Server)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&server).unwrap(),
            json!([{"Secret": 7, "Name": "Alice"}])
        );
    }

    #[test]
    fn test_empty_table() {
        let value = convert(&[vec!["EOR"]], &item_schema()).unwrap();
        assert_eq!(value, json!([]));
    }

    #[test]
    fn test_bind_error_aborts_dataset() {
        let err = convert(
            &[vec!["1", "Alice"], vec!["x", "Bob"], vec!["EOR"]],
            &item_schema(),
        )
        .unwrap_err();
        match err {
            SheetJsonError::ScalarParse { row, .. } => assert_eq!(row, 6),
            other => panic!("Expected ScalarParse, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_before_rows() {
        let schema = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::scalar("Name", ScalarType::Int));
        // 不正な行があっても型チェックが先に失敗する
        let err = convert(&[vec!["bad", "row"]], &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaTypeMismatch);
    }

    #[test]
    fn test_convert_rows_validates_schema() {
        let schema = RecordSchema::new("Item")
            .field(FieldDescriptor::scalar("Id", ScalarType::Int))
            .field(FieldDescriptor::scalar("Other", ScalarType::Int).with_title("Id"));
        let err = convert(&[vec!["1", "Alice"], vec!["EOR"]], &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaDeclarationInvalid);
    }

    #[test]
    fn test_convert_dataset_missing_file() {
        let converter = ConverterBuilder::new().build().unwrap();
        let report = converter.convert_dataset(
            Path::new("no/such/dir"),
            "Item",
            &item_schema(),
            Audience::Client,
        );
        assert!(!report.is_success());
        assert_eq!(report.error_kind(), Some(ErrorKind::FileNotFound));
        assert!(report.records().is_none());
        let line = &report.diagnostics.lines()[0];
        assert!(line.starts_with("Item (Item) CLIENT conversion failed: [FILE_NOT_EXIST]"));
    }

    #[test]
    fn test_convert_dataset_rejects_unsafe_name() {
        let converter = ConverterBuilder::new().build().unwrap();
        let report = converter.convert_dataset(
            Path::new("."),
            "../secret",
            &item_schema(),
            Audience::Server,
        );
        assert_eq!(report.error_kind(), Some(ErrorKind::SecurityViolation));
    }

    #[test]
    fn test_convert_dataset_rejects_invalid_schema() {
        let converter = ConverterBuilder::new().build().unwrap();
        let report = converter.convert_dataset(
            Path::new("."),
            "Item",
            &RecordSchema::new("Empty"),
            Audience::Client,
        );
        assert_eq!(report.error_kind(), Some(ErrorKind::SchemaDeclarationInvalid));
    }

    #[test]
    fn test_converter_convert_with_invalid_input() {
        let converter = ConverterBuilder::new().build().unwrap();
        let result = converter.convert(std::io::Cursor::new(Vec::<u8>::new()), &item_schema());
        assert!(result.is_err());
    }
}
