//! 辞書 trait 定義

use super::Locale;

/// ロケールごとの単語辞書
///
/// 照合は同期的でローカルに完結すること。`word` は正規化済みで渡されます。
#[cfg_attr(test, mockall::automock)]
pub trait Dictionary: Send + Sync {
    fn contains(&self, word: &str, locale: Locale) -> bool;
}
