//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型と、データセット単位の診断メッセージを定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use std::fmt;

use thiserror::Error;

/// sheetjsonクレート全体で使用するエラー型
///
/// シートのオープン、ヘッダー解析、型チェック、行のバインド中に発生する
/// すべてのエラーを統一的に扱います。最初に発生したエラーでそのデータセットの
/// 処理は中断され、シートは必ずクローズされます。
///
/// エラーの種類は [`SheetJsonError::kind`] で [`ErrorKind`] として取得できます。
///
/// # 使用例
///
/// ```rust
/// use sheetjson::{ErrorKind, SheetJsonError};
///
/// let error = SheetJsonError::StartTokenNotFound;
/// assert_eq!(error.kind(), ErrorKind::HeaderStartNotFound);
/// assert_eq!(error.kind().code(), 10);
/// ```
#[derive(Error, Debug)]
pub enum SheetJsonError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSONのエンコード・デコード中に発生したエラー
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// `ConverterBuilder::build()`時や、レジストリファイルの読み込み時に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 対象ファイルが存在しない
    #[error("File not found: {path}")]
    FileNotFound {
        /// 探索したファイルパス
        path: String,
    },

    /// ファイルは存在するが、ワークブックまたはシートとして開けない
    #[error("Failed to open '{path}': {message}")]
    FileOpen {
        /// 開こうとしたファイルパス
        path: String,
        /// 失敗理由
        message: String,
    },

    /// レコードスキーマの宣言が不正（タイトル重複、空の名前など）
    #[error("Invalid schema declaration: {0}")]
    SchemaDeclaration(String),

    /// 開始記号（`#`）を持つ行が見つからない
    #[error("Cannot find the table start token '#'")]
    StartTokenNotFound,

    /// 開始行に列終端記号（`EOC`）が見つからない
    #[error("Cannot find the end-of-column token 'EOC' in the start row")]
    EndOfColumnTokenNotFound,

    /// タイトル行が存在しない
    #[error("The table has no title row")]
    TitleRowMissing,

    /// 型行が存在しない
    #[error("The table has no type row")]
    TypeRowMissing,

    /// 対象指定行（A/S/C）が存在しない
    #[error("The table has no audience row")]
    AudienceRowMissing,

    /// タイトル行・型行の列数が開始行の列数と一致しない
    #[error("The {row} row has {actual} columns, expected {expected}")]
    ColumnCountMismatch {
        /// 対象行の名前（"title" / "type"）
        row: &'static str,
        /// 開始行から数えた列数
        expected: usize,
        /// 実際の列数
        actual: usize,
    },

    /// 対象指定行の列が不足している、または未知の指定がある
    #[error("Audience row is invalid at column {column}: {message}")]
    AudienceColumnsInvalid {
        /// 問題のある列インデックス（0始まり）
        column: usize,
        /// 詳細
        message: String,
    },

    /// ヘッダー行の途中で行終端記号（`EOR`）に遭遇した
    #[error("Reached the end-of-row token 'EOR' while reading the {row} row")]
    EndOfRowTokenTooEarly {
        /// 読み込み中だった行の名前
        row: &'static str,
    },

    /// レコードのフィールド型と表の宣言型が一致しない
    #[error("Column '{title}' is declared as '{declared}' but field '{field}' expects {expected}")]
    TypeMismatch {
        /// 列タイトル
        title: String,
        /// フィールド名（ネストはドット区切り）
        field: String,
        /// 表で宣言された型トークン
        declared: String,
        /// フィールドが期待する型トークン
        expected: &'static str,
    },

    /// データ行の後に行終端記号（`EOR`）が見つからない
    #[error("Cannot find the end-of-row token 'EOR' before the end of the sheet")]
    EndOfRowTokenNotFound,

    /// 必須フィールドのセルが空
    #[error("Row {row}: field '{field}' cannot be empty")]
    FieldCannotBeNull {
        /// シート上の行番号（1始まり）
        row: usize,
        /// フィールド名
        field: String,
    },

    /// セル文字列をスカラー値に変換できない
    #[error("Row {row}: cannot parse '{text}' as {expected} for field '{field}'")]
    ScalarParse {
        /// シート上の行番号（1始まり）
        row: usize,
        /// フィールド名
        field: String,
        /// 期待する型トークン
        expected: &'static str,
        /// セルの文字列
        text: String,
    },

    /// 構造体・配列フィールドが表の列構造に収まらない
    #[error("Field '{field}' cannot be laid out over the table columns: {message}")]
    StructuralTypeMisuse {
        /// フィールド名
        field: String,
        /// 詳細
        message: String,
    },
}

impl SheetJsonError {
    /// エラーの種類を取得
    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetJsonError::Io(_) => ErrorKind::FileOpenFailure,
            SheetJsonError::Json(_) => ErrorKind::Encoding,
            SheetJsonError::Config(_) => ErrorKind::Configuration,
            SheetJsonError::SecurityViolation(_) => ErrorKind::SecurityViolation,
            SheetJsonError::FileNotFound { .. } => ErrorKind::FileNotFound,
            SheetJsonError::FileOpen { .. } => ErrorKind::FileOpenFailure,
            SheetJsonError::SchemaDeclaration(_) => ErrorKind::SchemaDeclarationInvalid,
            SheetJsonError::StartTokenNotFound => ErrorKind::HeaderStartNotFound,
            SheetJsonError::EndOfColumnTokenNotFound => ErrorKind::HeaderColumnCountMissing,
            SheetJsonError::TitleRowMissing => ErrorKind::TitleRowMissing,
            SheetJsonError::TypeRowMissing => ErrorKind::TypeRowMissing,
            SheetJsonError::AudienceRowMissing => ErrorKind::AudienceRowMissing,
            SheetJsonError::ColumnCountMismatch { .. } => ErrorKind::ColumnCountMismatch,
            SheetJsonError::AudienceColumnsInvalid { .. } => ErrorKind::AudienceColumnsInvalid,
            SheetJsonError::EndOfRowTokenTooEarly { .. } => ErrorKind::HeaderRowTooEarlyTerminated,
            SheetJsonError::TypeMismatch { .. } => ErrorKind::SchemaTypeMismatch,
            SheetJsonError::EndOfRowTokenNotFound => ErrorKind::RowEndNotFound,
            SheetJsonError::FieldCannotBeNull { .. } => ErrorKind::FieldCannotBeNull,
            SheetJsonError::ScalarParse { .. } => ErrorKind::ScalarParseFailure,
            SheetJsonError::StructuralTypeMisuse { .. } => ErrorKind::StructuralTypeMisuse,
        }
    }
}

/// エラーの種類
///
/// 呼び出し側がメッセージ文字列に依存せずに失敗理由を判定するための分類です。
/// [`ErrorKind::code`] は旧ツールと互換の数値コードを返します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    FileNotFound,
    FileOpenFailure,
    SchemaDeclarationInvalid,
    HeaderStartNotFound,
    HeaderColumnCountMissing,
    TitleRowMissing,
    TypeRowMissing,
    AudienceRowMissing,
    ColumnCountMismatch,
    AudienceColumnsInvalid,
    HeaderRowTooEarlyTerminated,
    SchemaTypeMismatch,
    RowEndNotFound,
    FieldCannotBeNull,
    ScalarParseFailure,
    StructuralTypeMisuse,
    Configuration,
    SecurityViolation,
    Encoding,
}

impl ErrorKind {
    /// 数値コード
    ///
    /// 旧ツールに存在しない種類（設定・セキュリティ・エンコード）は100番台を使用します。
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::FileNotFound => 1,
            ErrorKind::FileOpenFailure => 2,
            ErrorKind::SchemaDeclarationInvalid => 3,
            ErrorKind::HeaderStartNotFound => 10,
            ErrorKind::HeaderColumnCountMissing => 20,
            ErrorKind::ColumnCountMismatch => 22,
            ErrorKind::AudienceColumnsInvalid => 23,
            ErrorKind::HeaderRowTooEarlyTerminated => 30,
            ErrorKind::TypeRowMissing => 31,
            ErrorKind::AudienceRowMissing => 32,
            ErrorKind::RowEndNotFound => 33,
            ErrorKind::SchemaTypeMismatch => 40,
            ErrorKind::FieldCannotBeNull => 43,
            ErrorKind::ScalarParseFailure => 44,
            ErrorKind::StructuralTypeMisuse => 45,
            ErrorKind::TitleRowMissing => 46,
            ErrorKind::Configuration => 100,
            ErrorKind::SecurityViolation => 101,
            ErrorKind::Encoding => 102,
        }
    }

    /// ログ・診断メッセージ用のラベル
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::FileNotFound => "FILE_NOT_EXIST",
            ErrorKind::FileOpenFailure => "FILE_OPEN_ERROR",
            ErrorKind::SchemaDeclarationInvalid => "ENUM_ATTRIBUTE_ERROR",
            ErrorKind::HeaderStartNotFound => "CANT_FIND_START_TOKEN",
            ErrorKind::HeaderColumnCountMissing => "CANT_FIND_END_OF_COL_TOKEN",
            ErrorKind::ColumnCountMismatch => "TYPE_COL_NUM_NOT_ENOUGH",
            ErrorKind::AudienceColumnsInvalid => "INSTRUCT_IGNORE_COL_NOT_ENOUGH",
            ErrorKind::HeaderRowTooEarlyTerminated => "END_OF_ROW_TOKEN_TO_EARLY",
            ErrorKind::TypeRowMissing => "DONT_HAVE_TYPE_ROW",
            ErrorKind::AudienceRowMissing => "DONT_INSTRUCT_NEED_ROW",
            ErrorKind::RowEndNotFound => "CANT_FIND_END_OF_ROW_TOKEN",
            ErrorKind::SchemaTypeMismatch => "TABLE_TYPE_IS_NOT_CONFORM",
            ErrorKind::FieldCannotBeNull => "DATA_CANT_BE_NULL",
            ErrorKind::ScalarParseFailure => "GET_BASE_TYPE_ERROR",
            ErrorKind::StructuralTypeMisuse => "NOT_ARRAY_TYPE_USE_GET_ARRAY_METHOD",
            ErrorKind::TitleRowMissing => "DONT_HAVE_TITLE_ROW",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::SecurityViolation => "SECURITY_VIOLATION",
            ErrorKind::Encoding => "ENCODING_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 診断メッセージの蓄積
///
/// データセットごとに生成され、結果と一緒に呼び出し側へ返されます。
/// バッチ処理ではすべてのデータセットの診断を連結します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    lines: Vec<String>,
}

impl Diagnostics {
    /// 空の診断を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 1行追加
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// 別の診断を末尾に連結
    pub fn extend(&mut self, other: Diagnostics) {
        self.lines.extend(other.lines);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
