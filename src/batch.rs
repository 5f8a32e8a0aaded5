//! Batch Module
//!
//! 登録されたすべてのデータセットを、クライアント用とサーバー用にそれぞれ変換して
//! JSONファイルに書き出すモジュール。
//!
//! # 出力レイアウト
//!
//! ```text
//! <output>/client/<file>.json
//! <output>/server/<file>.json
//! ```
//!
//! 1つのデータセットの失敗は記録されるだけで、残りのデータセットの変換は続行されます。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::api::Audience;
use crate::builder::Converter;
use crate::error::{Diagnostics, ErrorKind, SheetJsonError};
use crate::schema::DatasetRegistry;

/// 出力ファイルの拡張子
const JSON_EXTENSION: &str = "json";

/// 1データセット・1対象ぶんの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub file_base_name: String,
    pub record_type: String,
    pub audience: Audience,
    /// 書き出したレコード数
    pub records: usize,
    /// 書き出したファイル（失敗時は`None`）
    pub output_path: Option<PathBuf>,
    /// 失敗時のエラーの種類
    pub error_kind: Option<ErrorKind>,
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}

/// バッチ変換全体の結果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 処理順（データセット順、各データセット内は対象順）の結果
    pub entries: Vec<BatchEntry>,
    pub succeeded: usize,
    pub failed: usize,
    /// 全データセットの診断メッセージ（最後に集計行）
    pub diagnostics: Diagnostics,
    /// `name: O` / `name: X` 形式のファイル一覧
    pub file_list: Vec<String>,
}

impl BatchReport {
    /// すべて成功したかどうか
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// 集計行
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded, self.failed)
    }
}

/// バッチ変換ドライバー
///
/// # 使用例
///
/// ```rust,no_run
/// use std::path::Path;
/// use sheetjson::{BatchConverter, ConverterBuilder, DatasetRegistry, FieldDescriptor, RecordSchema, ScalarType};
///
/// # fn main() -> Result<(), sheetjson::SheetJsonError> {
/// let registry = DatasetRegistry::new().register(
///     "Item",
///     RecordSchema::new("Item").field(FieldDescriptor::scalar("Id", ScalarType::Int)),
/// );
/// let batch = BatchConverter::new(ConverterBuilder::new().build()?);
/// let report = batch.run(&registry, Path::new("tables"), Path::new("json"))?;
/// println!("{}", report.summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BatchConverter {
    converter: Converter,
    audiences: Vec<Audience>,
}

impl BatchConverter {
    /// クライアント・サーバーの両方を出力するドライバーを生成
    pub fn new(converter: Converter) -> Self {
        Self {
            converter,
            audiences: Audience::ALL.to_vec(),
        }
    }

    /// 出力する対象を限定する
    pub fn with_audiences(mut self, audiences: &[Audience]) -> Self {
        self.audiences = audiences.to_vec();
        self
    }

    /// 登録順にすべてのデータセットを変換する
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchReport)` - 個々のデータセットの成否にかかわらず、処理を終えた場合
    /// * `Err(SheetJsonError::Io)` - 出力ディレクトリを作成できない場合
    pub fn run(
        &self,
        registry: &DatasetRegistry,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<BatchReport, SheetJsonError> {
        for audience in &self.audiences {
            fs::create_dir_all(output_dir.join(audience.dir_name()))?;
        }

        let encoder = self.converter.encoder();
        let mut report = BatchReport::default();

        for dataset in registry.entries() {
            for &audience in &self.audiences {
                let dataset_report = self.converter.convert_dataset(
                    input_dir,
                    &dataset.file_base_name,
                    &dataset.schema,
                    audience,
                );
                let mut diagnostics = dataset_report.diagnostics;
                let output_path = output_dir
                    .join(audience.dir_name())
                    .join(format!("{}.{}", dataset.file_base_name, JSON_EXTENSION));

                let written = dataset_report.result.and_then(|records| {
                    let text = encoder.encode(&records)?;
                    fs::write(&output_path, text)?;
                    Ok(records.len())
                });

                let entry = match written {
                    Ok(records) => {
                        diagnostics.push(format!(
                            "{} ({}) {} converted {} records to {}",
                            dataset.file_base_name,
                            dataset.schema.name(),
                            audience,
                            records,
                            output_path.display()
                        ));
                        report.succeeded += 1;
                        report
                            .file_list
                            .push(format!("{}: O", dataset.file_base_name));
                        BatchEntry {
                            file_base_name: dataset.file_base_name.clone(),
                            record_type: dataset.schema.name().to_string(),
                            audience,
                            records,
                            output_path: Some(output_path),
                            error_kind: None,
                        }
                    }
                    Err(e) => {
                        // 変換エラーはconvert_datasetが診断済み。書き込みエラーだけここで記録する
                        if diagnostics.is_empty() {
                            diagnostics.push(format!(
                                "{} ({}) {} failed to write {}: [{}] {}",
                                dataset.file_base_name,
                                dataset.schema.name(),
                                audience,
                                output_path.display(),
                                e.kind(),
                                e
                            ));
                        }
                        report.failed += 1;
                        report
                            .file_list
                            .push(format!("{}: X", dataset.file_base_name));
                        BatchEntry {
                            file_base_name: dataset.file_base_name.clone(),
                            record_type: dataset.schema.name().to_string(),
                            audience,
                            records: 0,
                            output_path: None,
                            error_kind: Some(e.kind()),
                        }
                    }
                };

                report.diagnostics.extend(diagnostics);
                report.entries.push(entry);
            }
        }

        let summary = report.summary();
        report.diagnostics.push(summary);
        info!(
            datasets = registry.len(),
            succeeded = report.succeeded,
            failed = report.failed,
            "batch conversion finished"
        );
        Ok(report)
    }
}
