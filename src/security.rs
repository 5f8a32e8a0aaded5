//! Security Module
//!
//! 入力に対する制限を実装するモジュール。
//! 巨大なファイル、異常な列数、パストラバーサルを含むデータセット名への対策を提供します。

/// セキュリティ設定
///
/// ファイル処理時の制限を定義します。
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
    /// 開始行から数えた列数の上限
    /// デフォルト: 16384（Excelの最大列数）
    pub max_column_count: usize,
    /// 配列フィールドの要素数の上限
    /// デフォルト: 16384
    pub max_array_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_input_file_size: 2_147_483_648, // 2GB
            max_column_count: 16_384,
            max_array_length: 16_384,
        }
    }
}

/// データセット名（拡張子なしのファイル名）の検証
///
/// レジストリファイルから読んだ名前で入力ディレクトリの外を参照させないため、
/// ディレクトリ区切りや`..`を含む名前を拒否します。
///
/// # 戻り値
///
/// * `Ok(())` - 名前が安全な場合
/// * `Err(String)` - 名前が危険な場合
pub(crate) fn validate_file_base_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Empty file name is not allowed".to_string());
    }

    if name.contains('/') || name.contains('\\') {
        return Err(format!("Path separator in file name is not allowed: {}", name));
    }

    if name.contains("..") {
        return Err(format!("Path traversal detected: {}", name));
    }

    // Windowsのドライブ指定（`C:`）
    if name.contains(':') {
        return Err(format!("Drive prefix in file name is not allowed: {}", name));
    }

    Ok(())
}
