//! 辞書の実装
//!
//! ロケールごとに正規化済みの単語集合をメモリ上に持ちます。単語リストは
//! 1 行 1 単語のプレーンテキストから読み込みます（`#` で始まる行は無視）。

use std::{
    collections::{HashMap, HashSet},
    io,
    path::Path,
};

use crate::domain::{Dictionary, Locale};

#[derive(Debug, Default)]
pub struct InMemoryDictionary {
    words: HashMap<Locale, HashSet<String>>,
}

impl InMemoryDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// 単語を正規化して登録した辞書を作成
    pub fn from_words<I, S>(locale: Locale, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dictionary = Self::new();
        dictionary.extend(locale, words);
        dictionary
    }

    /// 単語を追加し、追加後の語数を返す
    pub fn extend<I, S>(&mut self, locale: Locale, words: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = self.words.entry(locale).or_default();
        for word in words {
            let normalized = locale.normalize_word(word.as_ref());
            if !normalized.is_empty() {
                set.insert(normalized);
            }
        }
        set.len()
    }

    /// 単語リストファイルを読み込む
    pub fn load_word_list(&mut self, locale: Locale, path: &Path) -> io::Result<usize> {
        let content = std::fs::read_to_string(path)?;
        let words = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        let count = self.extend(locale, words);
        tracing::info!(
            "Loaded {} word list from {} ({} words)",
            locale,
            path.display(),
            count
        );
        Ok(count)
    }

    pub fn len(&self, locale: Locale) -> usize {
        self.words.get(&locale).map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.words.values().all(HashSet::is_empty)
    }
}

impl Dictionary for InMemoryDictionary {
    fn contains(&self, word: &str, locale: Locale) -> bool {
        self.words
            .get(&locale)
            .is_some_and(|set| set.contains(word))
    }
}
