//! Row Source Module
//!
//! calamineを使用したシート読み込みと、行単位の読み出しを提供するモジュール。
//!
//! [`SheetData`] はスプレッドシートリーダーとの境界です。[`RowSource`] はシートを
//! 1つだけ所有し、ヘッダー解析後は無視列を取り除いた行を返します。シートは
//! [`RowSource::close`] または`Drop`で必ず解放されます。

use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::api::SheetSelector;
use crate::error::SheetJsonError;
use crate::security::SecurityConfig;
use crate::types::RawRow;

/// スプレッドシートリーダーが提供するシートの内容
///
/// 行・列は0始まりの絶対位置です。
pub trait SheetData {
    /// 最後にデータがある行までの行数
    fn row_count(&self) -> usize;

    /// 指定行の実データ幅（最後の非空セルの列 + 1）
    ///
    /// 行にデータが1つもない場合は0を返します。
    fn row_width(&self, row: usize) -> usize;

    /// セルの文字列表現（空セルは`None`）
    fn cell(&self, row: usize, col: usize) -> Option<String>;
}

/// calamineで読み込んだワークシート
#[derive(Debug, Clone)]
pub struct CalamineSheet {
    name: String,
    range: Range<Data>,
}

impl CalamineSheet {
    /// ファイルパスからワークシートを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(CalamineSheet)` - シートの読み込みに成功した場合
    /// * `Err(SheetJsonError::FileNotFound)` - ファイルが存在しない場合
    /// * `Err(SheetJsonError::FileOpen)` - ワークブックとして開けない、またはシートがない場合
    /// * `Err(SheetJsonError::SecurityViolation)` - ファイルサイズが上限を超える場合
    pub fn open(path: &Path, selector: &SheetSelector) -> Result<Self, SheetJsonError> {
        let source_name = path.display().to_string();
        if !path.is_file() {
            return Err(SheetJsonError::FileNotFound { path: source_name });
        }

        let security_config = SecurityConfig::default();
        let size = fs::metadata(path)
            .map_err(|e| open_error(&source_name, e))?
            .len();
        if size > security_config.max_input_file_size {
            return Err(SheetJsonError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, security_config.max_input_file_size
            )));
        }

        let workbook = open_workbook_auto(path).map_err(|e| open_error(&source_name, e))?;
        Self::select(workbook, selector, &source_name)
    }

    /// メモリ上のワークブックからワークシートを開く
    pub fn from_reader<R: Read + Seek>(
        mut reader: R,
        selector: &SheetSelector,
    ) -> Result<Self, SheetJsonError> {
        let security_config = SecurityConfig::default();

        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        if bytes_read as u64 > security_config.max_input_file_size {
            return Err(SheetJsonError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, security_config.max_input_file_size
            )));
        }

        let source_name = "<memory>";
        let workbook =
            open_workbook_auto_from_rs(Cursor::new(buffer)).map_err(|e| open_error(source_name, e))?;
        Self::select(workbook, selector, source_name)
    }

    fn select<RS: Read + Seek>(
        mut workbook: Sheets<RS>,
        selector: &SheetSelector,
        source_name: &str,
    ) -> Result<Self, SheetJsonError> {
        let sheet_names = workbook.sheet_names();
        let name = match selector {
            SheetSelector::Index(index) => sheet_names.get(*index).cloned().ok_or_else(|| {
                open_error(
                    source_name,
                    format!(
                        "Sheet index {} is out of range (total: {})",
                        index,
                        sheet_names.len()
                    ),
                )
            })?,
            SheetSelector::Name(name) => {
                if !sheet_names.contains(name) {
                    return Err(open_error(source_name, format!("Sheet '{}' not found", name)));
                }
                name.clone()
            }
        };

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| open_error(source_name, e))?;
        debug!(sheet = %name, path = source_name, "opened worksheet");

        Ok(Self { name, range })
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, row: usize, col: usize) -> Option<&Data> {
        let row = u32::try_from(row).ok()?;
        let col = u32::try_from(col).ok()?;
        self.range.get_value((row, col))
    }
}

impl SheetData for CalamineSheet {
    fn row_count(&self) -> usize {
        self.range.end().map_or(0, |(row, _)| row as usize + 1)
    }

    fn row_width(&self, row: usize) -> usize {
        let (Some((start_row, _)), Some((end_row, end_col))) = (self.range.start(), self.range.end())
        else {
            return 0;
        };
        if row < start_row as usize || row > end_row as usize {
            return 0;
        }
        (0..=end_col as usize)
            .rev()
            .find(|&col| self.value(row, col).is_some_and(|d| !matches!(d, Data::Empty)))
            .map_or(0, |col| col + 1)
    }

    fn cell(&self, row: usize, col: usize) -> Option<String> {
        self.value(row, col).and_then(cell_text)
    }
}

/// セル値を文字列に変換
///
/// 整数値の浮動小数点は小数部なし、論理値は`TRUE`/`FALSE`、日付はISO 8601で出力します。
pub(crate) fn cell_text(data: &Data) -> Option<String> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => Some(
            serial_to_iso8601(dt.as_f64()).unwrap_or_else(|| dt.as_f64().to_string()),
        ),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(e) => Some(format!("{:?}", e)),
    }
}

/// Excelのシリアル日付値をISO 8601文字列に変換
///
/// 1900年システム（1899年12月30日起算）を使用します。時刻部分がない場合は日付のみです。
fn serial_to_iso8601(serial_value: f64) -> Option<String> {
    if !serial_value.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial_value * 86_400.0).round() as i64;
    let datetime = epoch.checked_add_signed(Duration::seconds(seconds))?;
    if seconds % 86_400 == 0 {
        Some(datetime.format("%Y-%m-%d").to_string())
    } else {
        Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

fn open_error(path: &str, message: impl ToString) -> SheetJsonError {
    SheetJsonError::FileOpen {
        path: path.to_string(),
        message: message.to_string(),
    }
}

/// メモリ上の行から構成されるシート
///
/// テストや、calamine以外のリーダーで読んだデータの変換に使用します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySheet {
    rows: Vec<RawRow>,
}

impl MemorySheet {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self { rows }
    }

    /// 文字列の2次元配列から生成（空文字列は空セル）
    pub fn from_texts<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self {
            rows: rows.iter().map(|r| RawRow::from_texts(r)).collect(),
        }
    }
}

impl SheetData for MemorySheet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_width(&self, row: usize) -> usize {
        self.rows.get(row).map_or(0, |r| {
            r.cells()
                .iter()
                .rposition(Option::is_some)
                .map_or(0, |col| col + 1)
        })
    }

    fn cell(&self, row: usize, col: usize) -> Option<String> {
        self.rows
            .get(row)
            .and_then(|r| r.cell(col))
            .map(str::to_string)
    }
}

/// シートから1行ずつ読み出すカーソル
///
/// 列数と無視列が設定される前（ヘッダー解析中）は各行の実データ幅まで読み、
/// 設定後は列数ちょうどの行から無視列を取り除いて返します。
#[derive(Debug)]
pub struct RowSource<S: SheetData> {
    sheet: Option<S>,
    next_row: usize,
    column_count: Option<usize>,
    ignored: Vec<usize>,
}

impl<S: SheetData> RowSource<S> {
    /// シートの所有権を受け取り、先頭行から読み出すカーソルを生成
    pub fn new(sheet: S) -> Self {
        Self {
            sheet: Some(sheet),
            next_row: 0,
            column_count: None,
            ignored: Vec::new(),
        }
    }

    /// 次の行を取得
    ///
    /// 最後のデータ行を超えると`None`を返します。データのない行は長さ0の行です。
    pub fn next_row(&mut self) -> Option<RawRow> {
        let sheet = self.sheet.as_ref()?;
        if self.next_row >= sheet.row_count() {
            return None;
        }
        let row = self.next_row;
        self.next_row += 1;

        let width = sheet.row_width(row);
        if width == 0 {
            return Some(RawRow::default());
        }

        let real_width = self.column_count.unwrap_or(width);
        let cells = (0..real_width).map(|col| sheet.cell(row, col)).collect();
        // 終端行の判定は無視列を取り除く前の先頭セルで行う
        Some(RawRow::new(cells).without_columns(&self.ignored))
    }

    /// 表の列数と無視列を設定する（以後の行に適用される）
    pub(crate) fn set_layout(&mut self, column_count: usize, mut ignored: Vec<usize>) {
        ignored.sort_unstable();
        ignored.dedup();
        self.column_count = Some(column_count);
        self.ignored = ignored;
    }

    /// 直前に返した行のシート上の行番号（1始まり）
    pub fn row_number(&self) -> usize {
        self.next_row
    }

    pub fn is_open(&self) -> bool {
        self.sheet.is_some()
    }

    /// シートを解放する
    ///
    /// 何度呼び出しても安全です。
    pub fn close(&mut self) {
        if self.sheet.take().is_some() {
            debug!("closed row source");
        }
        self.next_row = 0;
        self.column_count = None;
        self.ignored.clear();
    }
}

impl<S: SheetData> Drop for RowSource<S> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> MemorySheet {
        MemorySheet::new(vec![
            RawRow::from_texts(&["#", "a", "b", "EOC"]),
            RawRow::default(),
            RawRow::from_texts(&["1", "2", "3", "", "extra"]),
            RawRow::from_texts(&["x"]),
        ])
    }

    #[test]
    fn test_rows_before_layout_use_actual_width() {
        let mut source = RowSource::new(sheet());
        assert_eq!(
            source.next_row(),
            Some(RawRow::from_texts(&["#", "a", "b", "EOC"]))
        );
        assert_eq!(source.row_number(), 1);
        // データのない行は長さ0
        assert_eq!(source.next_row(), Some(RawRow::default()));
        assert_eq!(
            source.next_row().map(|r| r.len()),
            Some(5),
            "width runs to the last non-empty cell"
        );
    }

    #[test]
    fn test_layout_pads_and_filters_rows() {
        let mut source = RowSource::new(sheet());
        source.next_row();
        source.next_row();
        source.set_layout(3, vec![1]);

        assert_eq!(source.next_row(), Some(RawRow::from_texts(&["1", "3"])));
        // 短い行は列数まで空セルで補われる
        assert_eq!(
            source.next_row(),
            Some(RawRow::new(vec![Some("x".to_string()), None]))
        );
        assert_eq!(source.next_row(), None);
        assert_eq!(source.next_row(), None);
    }

    #[test]
    fn test_end_of_table_survives_ignored_first_column() {
        let mut source = RowSource::new(MemorySheet::from_texts(&[
            vec!["7", "Alice"],
            vec!["EOR"],
        ]));
        source.set_layout(2, vec![0]);

        let row = source.next_row().unwrap();
        assert_eq!(row, RawRow::from_texts(&["Alice"]));
        assert!(!row.is_end_of_table());

        let row = source.next_row().unwrap();
        assert!(row.is_end_of_table());
        assert!(row.is_blank());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut source = RowSource::new(sheet());
        assert!(source.is_open());
        source.close();
        source.close();
        assert!(!source.is_open());
        assert_eq!(source.next_row(), None);
    }

    #[test]
    fn test_memory_sheet_width() {
        let sheet = MemorySheet::from_texts(&[vec!["a", "", "c", ""], vec!["", ""]]);
        assert_eq!(sheet.row_width(0), 3);
        assert_eq!(sheet.row_width(1), 0);
        assert_eq!(sheet.row_width(5), 0);
        assert_eq!(sheet.cell(0, 2), Some("c".to_string()));
        assert_eq!(sheet.cell(0, 1), None);
    }

    #[test]
    fn test_cell_text_rendering() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::Float(1.0)), Some("1".to_string()));
        assert_eq!(cell_text(&Data::Float(2.5)), Some("2.5".to_string()));
        assert_eq!(cell_text(&Data::Int(-3)), Some("-3".to_string()));
        assert_eq!(cell_text(&Data::Bool(true)), Some("TRUE".to_string()));
        assert_eq!(
            cell_text(&Data::String("Alice".to_string())),
            Some("Alice".to_string())
        );
    }

    #[test]
    fn test_serial_to_iso8601() {
        assert_eq!(serial_to_iso8601(45_658.0), Some("2025-01-01".to_string()));
        assert_eq!(
            serial_to_iso8601(45_658.5),
            Some("2025-01-01T12:00:00".to_string())
        );
        assert_eq!(serial_to_iso8601(f64::NAN), None);
    }

    #[test]
    fn test_open_missing_file() {
        let result = CalamineSheet::open(
            Path::new("definitely/not/here.xlsx"),
            &SheetSelector::default(),
        );
        assert!(matches!(result, Err(SheetJsonError::FileNotFound { .. })));
    }

    #[test]
    fn test_open_invalid_bytes() {
        let result = CalamineSheet::from_reader(Cursor::new(vec![1u8, 2, 3]), &SheetSelector::default());
        assert!(matches!(result, Err(SheetJsonError::FileOpen { .. })));
    }
}
