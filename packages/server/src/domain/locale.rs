//! ロケールと文字の正規化
//!
//! 見た目や発音が同じ文字の異体（語末形、アクセント付き文字など）を一つの
//! 代表形に畳み込みます。盤面のセルと提出された単語の両方に同じ規則を適用します。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::ValueObjectError;

/// ルームの言語設定（正規化規則と辞書の選択に影響）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    He,
    Es,
    El,
}

impl Locale {
    pub const ALL: [Locale; 4] = [Locale::En, Locale::He, Locale::Es, Locale::El];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::He => "he",
            Locale::Es => "es",
            Locale::El => "el",
        }
    }

    /// 1 文字を代表形に正規化
    pub fn normalize_char(&self, c: char) -> char {
        match self {
            Locale::En => upper(c),
            Locale::He => match c {
                'ך' => 'כ',
                'ם' => 'מ',
                'ן' => 'נ',
                'ף' => 'פ',
                'ץ' => 'צ',
                other => other,
            },
            Locale::Es => match upper(c) {
                'Á' => 'A',
                'É' => 'E',
                'Í' => 'I',
                'Ó' => 'O',
                'Ú' | 'Ü' => 'U',
                other => other,
            },
            Locale::El => match upper(c) {
                'Ά' => 'Α',
                'Έ' => 'Ε',
                'Ή' => 'Η',
                'Ί' | 'Ϊ' | 'ΐ' => 'Ι',
                'Ό' => 'Ο',
                'Ύ' | 'Ϋ' | 'ΰ' => 'Υ',
                'Ώ' => 'Ω',
                other => other,
            },
        }
    }

    /// 単語全体を正規化（前後の空白は除去）
    ///
    /// 分解形（基底文字 + 結合用ダイアクリティカルマーク）の入力も合成済みの文字と
    /// 同じ結果になるよう、結合文字は取り除く。スペイン語の Ñ だけは残す。
    pub fn normalize_word(&self, word: &str) -> String {
        let mut normalized = String::with_capacity(word.len());
        for c in word.trim().chars() {
            if !is_combining_mark(c) {
                normalized.push(self.normalize_char(c));
                continue;
            }
            if *self == Locale::Es && c == COMBINING_TILDE && normalized.ends_with('N') {
                normalized.pop();
                normalized.push('Ñ');
            }
        }
        normalized
    }

    /// グリッド生成用の文字と出現頻度の重み
    pub fn letter_weights(&self) -> &'static [(char, u32)] {
        match self {
            Locale::En => &[
                ('E', 12),
                ('T', 9),
                ('A', 8),
                ('O', 8),
                ('I', 7),
                ('N', 7),
                ('S', 6),
                ('H', 6),
                ('R', 6),
                ('D', 4),
                ('L', 4),
                ('C', 3),
                ('U', 3),
                ('M', 2),
                ('W', 2),
                ('F', 2),
                ('G', 2),
                ('Y', 2),
                ('P', 2),
                ('B', 1),
                ('V', 1),
                ('K', 1),
                ('J', 1),
                ('X', 1),
                ('Q', 1),
                ('Z', 1),
            ],
            Locale::He => &[
                ('י', 11),
                ('ו', 10),
                ('ה', 9),
                ('ל', 7),
                ('א', 6),
                ('ר', 6),
                ('מ', 6),
                ('ת', 5),
                ('ב', 5),
                ('ש', 4),
                ('נ', 4),
                ('ד', 3),
                ('כ', 3),
                ('ע', 3),
                ('ח', 2),
                ('פ', 2),
                ('ק', 2),
                ('צ', 1),
                ('ג', 1),
                ('ס', 1),
                ('ז', 1),
                ('ט', 1),
            ],
            Locale::Es => &[
                ('E', 13),
                ('A', 12),
                ('O', 9),
                ('S', 8),
                ('R', 7),
                ('N', 7),
                ('I', 6),
                ('D', 6),
                ('L', 5),
                ('C', 5),
                ('T', 5),
                ('U', 4),
                ('M', 3),
                ('P', 3),
                ('B', 2),
                ('G', 1),
                ('V', 1),
                ('Y', 1),
                ('Q', 1),
                ('H', 1),
                ('F', 1),
                ('Z', 1),
                ('J', 1),
                ('Ñ', 1),
            ],
            Locale::El => &[
                ('Α', 12),
                ('Ο', 10),
                ('Ι', 9),
                ('Ε', 8),
                ('Τ', 8),
                ('Σ', 7),
                ('Ν', 7),
                ('Η', 5),
                ('Υ', 4),
                ('Ρ', 5),
                ('Π', 4),
                ('Κ', 4),
                ('Μ', 3),
                ('Λ', 3),
                ('Ω', 2),
                ('Δ', 2),
                ('Γ', 2),
                ('Χ', 1),
                ('Θ', 1),
                ('Φ', 1),
                ('Β', 1),
                ('Ξ', 1),
                ('Ζ', 1),
                ('Ψ', 1),
            ],
        }
    }
}

const COMBINING_TILDE: char = '\u{0303}';

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

fn upper(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

impl FromStr for Locale {
    type Err = ValueObjectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "he" => Ok(Locale::He),
            "es" => Ok(Locale::Es),
            "el" => Ok(Locale::El),
            other => Err(ValueObjectError::UnsupportedLocale(other.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
