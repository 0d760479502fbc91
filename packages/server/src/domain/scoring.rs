//! 単語の得点計算（コンボボーナス付き）
//!
//! `score` は単語の長さとコンボレベルだけで決まる純粋関数です。
//! コンボによる加算には上限があり、連続正解がどれだけ続いても得点は有界です。

/// これを超えるコンボレベルは加算に影響しない
pub const COMBO_CAP: u32 = 10;

/// 文字数ごとの基本点（最後の要素はそれより長い単語にも適用）
const BASE_POINTS: [u32; 10] = [0, 0, 1, 2, 3, 5, 7, 10, 13, 15];

/// `len` 文字の単語の基本点
pub fn base_points(len: usize) -> u32 {
    BASE_POINTS[len.min(BASE_POINTS.len() - 1)]
}

/// コンボ倍率を 0.5 単位で表した値（短い単語は 0.5、7 文字以上は 2.0）
fn length_factor_halves(len: usize) -> u32 {
    match len {
        0..=3 => 1,
        4 => 2,
        5 | 6 => 3,
        _ => 4,
    }
}

/// `floor(min(combo, COMBO_CAP) * length_factor(len))`
pub fn combo_bonus(len: usize, combo_level: u32) -> u32 {
    combo_level.min(COMBO_CAP) * length_factor_halves(len) / 2
}

/// 1 単語で得られるボーナスの最大値
pub fn max_combo_bonus() -> u32 {
    combo_bonus(usize::MAX, COMBO_CAP)
}

/// `combo_level` での `len` 文字の単語の得点
pub fn score_len(len: usize, combo_level: u32) -> u32 {
    base_points(len) + combo_bonus(len, combo_level)
}

/// `combo_level` での `word`（正規化済み）の得点
pub fn score(word: &str, combo_level: u32) -> u32 {
    score_len(word.chars().count(), combo_level)
}

/// 直前の有効な提出から `elapsed_ms` 後の提出に適用するコンボレベル
///
/// ウィンドウを過ぎていれば 0 からやり直す。
pub fn effective_combo(current: u32, elapsed_ms: Option<u64>, window_ms: u64) -> u32 {
    match elapsed_ms {
        Some(elapsed) if elapsed <= window_ms => current,
        _ => 0,
    }
}
