//! Output Module
//!
//! バインド済みレコードのJSONエンコードと、出力済みJSONの読み戻しを提供するモジュール。

use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::JsonStyle;
use crate::error::SheetJsonError;

/// JSONエンコーダー（Strategy Pattern）
///
/// 出力書式ごとのエンコード方法をenumとして表現します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonEncoder {
    Compact,
    Pretty,
}

impl JsonEncoder {
    /// 出力書式からエンコーダーを生成
    pub fn from_style(style: JsonStyle) -> Self {
        match style {
            JsonStyle::Compact => JsonEncoder::Compact,
            JsonStyle::Pretty => JsonEncoder::Pretty,
        }
    }

    /// 値をJSON文字列にエンコードする
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, SheetJsonError> {
        let text = match self {
            JsonEncoder::Compact => serde_json::to_string(value)?,
            JsonEncoder::Pretty => serde_json::to_string_pretty(value)?,
        };
        Ok(text)
    }

    /// 値をJSONとしてライターに書き出す
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - 出力に成功した場合
    /// * `Err(SheetJsonError)` - エンコードまたは書き込みに失敗した場合
    pub fn render<W: Write, T: Serialize + ?Sized>(
        &self,
        value: &T,
        writer: &mut W,
    ) -> Result<(), SheetJsonError> {
        match self {
            JsonEncoder::Compact => serde_json::to_writer(&mut *writer, value)?,
            JsonEncoder::Pretty => serde_json::to_writer_pretty(&mut *writer, value)?,
        }
        writer.flush()?;
        Ok(())
    }
}

/// 出力済みのJSONテキストからレコード列を読み戻す
///
/// 最初のJSON値だけを解析し、その後ろに続く内容は無視します。
/// 空のテキスト（変換に失敗したデータセットの出力）は空のレコード列になります。
///
/// ```rust
/// use sheetjson::output::records_from_json;
///
/// let records: Vec<serde_json::Value> = records_from_json(r#"[{"Id":1}] trailing"#).unwrap();
/// assert_eq!(records.len(), 1);
/// ```
pub fn records_from_json<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, SheetJsonError> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Vec<T>>();
    match stream.next() {
        Some(records) => Ok(records?),
        None => Ok(Vec::new()),
    }
}
