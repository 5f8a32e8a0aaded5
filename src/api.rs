//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。
//! 宣言型トークンから解析関数への対応表もここに置きます。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SheetJsonError;
use crate::types::ScalarValue;

/// 変換結果を必要とする側
///
/// 対象指定行で`S`（サーバーのみ）または`C`（クライアントのみ）と指定された列は、
/// 要求された側と一致しない場合に無視されます。`A`の列は常に残ります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    /// クライアント向け出力
    Client,
    /// サーバー向け出力
    Server,
}

impl Audience {
    /// バッチ処理で使用する全対象（旧ツールと同じ順序）
    pub const ALL: [Audience; 2] = [Audience::Client, Audience::Server];

    /// 出力ディレクトリ名
    pub fn dir_name(self) -> &'static str {
        match self {
            Audience::Client => "client",
            Audience::Server => "server",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Audience::Client => f.write_str("CLIENT"),
            Audience::Server => f.write_str("SERVER"),
        }
    }
}

/// 列ごとの対象指定（対象指定行の`A`/`S`/`C`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnAudience {
    /// 両方が必要（`A`）
    All,
    /// サーバーのみ（`S`）
    ServerOnly,
    /// クライアントのみ（`C`）
    ClientOnly,
}

impl ColumnAudience {
    /// セル文字列から対象指定を取得（大文字小文字を区別しない）
    ///
    /// 前後の空白は許容しません。空文字列や未知の文字は`None`です。
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("A") {
            Some(ColumnAudience::All)
        } else if token.eq_ignore_ascii_case("S") {
            Some(ColumnAudience::ServerOnly)
        } else if token.eq_ignore_ascii_case("C") {
            Some(ColumnAudience::ClientOnly)
        } else {
            None
        }
    }

    /// 要求された側にこの列が必要かどうか
    pub fn is_needed_by(self, audience: Audience) -> bool {
        match self {
            ColumnAudience::All => true,
            ColumnAudience::ServerOnly => audience == Audience::Server,
            ColumnAudience::ClientOnly => audience == Audience::Client,
        }
    }
}

/// 表で宣言できるスカラー型
///
/// 型行に書かれるトークン（`BYTE`, `USHORT`, `UINT`, `ULONG`, `STRING`, `BOOL`,
/// `FLOAT`, `INT`）と1対1に対応します。各トークンの解析関数は
/// [`ScalarType::parse_text`] の閉じた`match`で決まります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScalarType {
    Byte,
    UShort,
    UInt,
    ULong,
    String,
    Bool,
    Float,
    Int,
}

impl ScalarType {
    /// すべての宣言型
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Byte,
        ScalarType::UShort,
        ScalarType::UInt,
        ScalarType::ULong,
        ScalarType::String,
        ScalarType::Bool,
        ScalarType::Float,
        ScalarType::Int,
    ];

    /// 型行に書かれるトークン
    pub fn token(self) -> &'static str {
        match self {
            ScalarType::Byte => "BYTE",
            ScalarType::UShort => "USHORT",
            ScalarType::UInt => "UINT",
            ScalarType::ULong => "ULONG",
            ScalarType::String => "STRING",
            ScalarType::Bool => "BOOL",
            ScalarType::Float => "FLOAT",
            ScalarType::Int => "INT",
        }
    }

    /// トークンから型を取得（大文字小文字を区別しない）
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.token().eq_ignore_ascii_case(token))
    }

    /// 宣言トークンがこの型と一致するか
    pub fn matches_token(self, token: &str) -> bool {
        self.token().eq_ignore_ascii_case(token)
    }

    /// 文字列型かどうか（空セルは`null`になる）
    pub fn is_textual(self) -> bool {
        matches!(self, ScalarType::String)
    }

    /// 空セルに対応するゼロ値
    ///
    /// 文字列型にはゼロ値がないため`None`を返します。
    pub fn zero_value(self) -> Option<ScalarValue> {
        match self {
            ScalarType::Byte => Some(ScalarValue::Byte(0)),
            ScalarType::UShort => Some(ScalarValue::UShort(0)),
            ScalarType::UInt => Some(ScalarValue::UInt(0)),
            ScalarType::ULong => Some(ScalarValue::ULong(0)),
            ScalarType::String => None,
            ScalarType::Bool => Some(ScalarValue::Bool(false)),
            ScalarType::Float => Some(ScalarValue::Float(0.0)),
            ScalarType::Int => Some(ScalarValue::Int(0)),
        }
    }

    /// 空でないセル文字列を値に変換
    ///
    /// 整数型は前後の空白と先頭の符号を許容し、範囲外は失敗します。
    /// `BOOL`は`true`/`false`を大文字小文字を区別せずに受け付けます。
    /// `FLOAT`は有限の値だけを受け付けます。
    /// 文字列型は入力をそのまま返します。
    pub fn parse_text(self, text: &str) -> Result<ScalarValue, ParseScalarError> {
        let trimmed = text.trim();
        let err = || ParseScalarError { ty: self };
        match self {
            ScalarType::Byte => trimmed.parse().map(ScalarValue::Byte).map_err(|_| err()),
            ScalarType::UShort => trimmed.parse().map(ScalarValue::UShort).map_err(|_| err()),
            ScalarType::UInt => trimmed.parse().map(ScalarValue::UInt).map_err(|_| err()),
            ScalarType::ULong => trimmed.parse().map(ScalarValue::ULong).map_err(|_| err()),
            ScalarType::String => Ok(ScalarValue::String(text.to_string())),
            ScalarType::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok(ScalarValue::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok(ScalarValue::Bool(false))
                } else {
                    Err(err())
                }
            }
            // NaN・無限大・f32の範囲外は失敗
            ScalarType::Float => trimmed
                .parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .map(ScalarValue::Float)
                .ok_or_else(err),
            ScalarType::Int => trimmed.parse().map(ScalarValue::Int).map_err(|_| err()),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ScalarType {
    type Err = SheetJsonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s)
            .ok_or_else(|| SheetJsonError::SchemaDeclaration(format!("Unknown scalar type '{}'", s)))
    }
}

/// スカラー解析の失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseScalarError {
    /// 解析しようとした型
    pub ty: ScalarType,
}

/// 空セルの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// 文字列は`null`、数値・論理値はゼロ値（デフォルト）
    #[default]
    Defaulted,
    /// 空なら`null`
    Optional,
    /// 空ならエラー（`FieldCannotBeNull`）
    Required,
}

/// シート選択方式
///
/// ワークブック内のどのシートを表として読むかを指定します。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SheetSelector {
    /// インデックス指定（0始まり、デフォルトは最初のシート）
    Index(usize),

    /// シート名指定
    ///
    /// 例: `SheetSelector::Name("Items".to_string())`
    Name(String),
}

impl Default for SheetSelector {
    fn default() -> Self {
        SheetSelector::Index(0)
    }
}

/// JSON出力の書式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum JsonStyle {
    /// 1行の圧縮形式（デフォルト）
    #[default]
    Compact,

    /// インデント付き
    Pretty,
}
