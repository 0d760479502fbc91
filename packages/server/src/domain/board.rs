//! 盤面と単語パス検証
//!
//! - `Grid`: 1 文字セルの 2 次元配列
//! - `BoardIndex`: ラウンド開始時に一度だけ構築する「文字 → 座標リスト」の索引
//! - `WordValidator`: 索引を使った 8 方向 DFS で隣接パスの有無を判定

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Locale, ValueObjectError};

/// 盤面の一辺の最大セル数
pub const MAX_GRID_SIDE: usize = 8;

/// 盤面上の座標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// 1 文字セルの長方形グリッド
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: Vec<Vec<char>>,
}

impl Grid {
    /// 文字列の行リストからグリッドを作成（各セルはちょうど 1 文字）
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self, ValueObjectError> {
        let cells = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let mut chars = cell.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) if !c.is_whitespace() => Ok(c),
                            _ => Err(ValueObjectError::InvalidGrid(format!(
                                "cell '{cell}' must be a single character"
                            ))),
                        }
                    })
                    .collect::<Result<Vec<char>, _>>()
            })
            .collect::<Result<Vec<Vec<char>>, _>>()?;
        Self::new(cells)
    }

    /// セル配列からグリッドを作成
    pub fn new(cells: Vec<Vec<char>>) -> Result<Self, ValueObjectError> {
        let height = cells.len();
        if height == 0 || height > MAX_GRID_SIDE {
            return Err(ValueObjectError::InvalidGrid(format!(
                "grid must have 1-{MAX_GRID_SIDE} rows"
            )));
        }
        let width = cells[0].len();
        if width == 0 || width > MAX_GRID_SIDE {
            return Err(ValueObjectError::InvalidGrid(format!(
                "grid must have 1-{MAX_GRID_SIDE} columns"
            )));
        }
        if cells.iter().any(|row| row.len() != width) {
            return Err(ValueObjectError::InvalidGrid(
                "grid rows must all have the same length".to_string(),
            ));
        }
        Ok(Self { cells })
    }

    /// ロケールの文字頻度に従ったランダムな正方グリッドを生成
    pub fn random<R: Rng>(
        size: usize,
        locale: Locale,
        rng: &mut R,
    ) -> Result<Self, ValueObjectError> {
        let weights = locale.letter_weights();
        let total: u32 = weights.iter().map(|(_, w)| w).sum();
        let mut cells = Vec::with_capacity(size);
        for _ in 0..size {
            let mut row = Vec::with_capacity(size);
            for _ in 0..size {
                row.push(pick_letter(weights, total, rng));
            }
            cells.push(row);
        }
        Self::new(cells)
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    pub fn width(&self) -> usize {
        self.cells[0].len()
    }

    pub fn cell(&self, at: Coord) -> Option<char> {
        self.cells.get(at.row).and_then(|row| row.get(at.col)).copied()
    }

    /// 行ごとの文字列表現（送信用）
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }
}

fn pick_letter<R: Rng>(weights: &[(char, u32)], total: u32, rng: &mut R) -> char {
    let mut roll = rng.random_range(0..total);
    for (letter, weight) in weights {
        if roll < *weight {
            return *letter;
        }
        roll -= weight;
    }
    weights[weights.len() - 1].0
}

/// 文字 → 座標リストの索引
///
/// 構築後は変更されない。ラウンドごとに作り直す。
#[derive(Debug, Clone)]
pub struct BoardIndex {
    height: usize,
    width: usize,
    /// 正規化済みセル（行優先のフラット配列）
    cells: Vec<char>,
    locations: HashMap<char, Vec<Coord>>,
}

impl BoardIndex {
    pub fn new(grid: &Grid, locale: Locale) -> Self {
        let height = grid.height();
        let width = grid.width();
        let mut cells = Vec::with_capacity(height * width);
        let mut locations: HashMap<char, Vec<Coord>> = HashMap::new();
        for (row, line) in grid.cells.iter().enumerate() {
            for (col, &raw) in line.iter().enumerate() {
                let letter = locale.normalize_char(raw);
                cells.push(letter);
                locations
                    .entry(letter)
                    .or_default()
                    .push(Coord::new(row, col));
            }
        }
        Self {
            height,
            width,
            cells,
            locations,
        }
    }

    /// 正規化済みの文字が現れる座標
    pub fn locations_of(&self, letter: char) -> &[Coord] {
        self.locations
            .get(&letter)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn offset(&self, at: Coord) -> usize {
        at.row * self.width + at.col
    }

    fn letter_at(&self, at: Coord) -> char {
        self.cells[self.offset(at)]
    }

    fn neighbours(&self, at: Coord) -> impl Iterator<Item = Coord> + '_ {
        let rows = at.row.saturating_sub(1)..=(at.row + 1).min(self.height - 1);
        rows.flat_map(move |row| {
            let cols = at.col.saturating_sub(1)..=(at.col + 1).min(self.width - 1);
            cols.map(move |col| Coord::new(row, col))
        })
        .filter(move |c| *c != at)
    }
}

/// 盤面上の隣接パス検証
#[derive(Debug, Clone)]
pub struct WordValidator {
    index: BoardIndex,
    locale: Locale,
    min_len: usize,
}

impl WordValidator {
    pub fn new(grid: &Grid, locale: Locale, min_len: usize) -> Self {
        Self {
            index: BoardIndex::new(grid, locale),
            locale,
            min_len,
        }
    }

    /// 単語が最小文字数を満たすか（正規化後の文字数で判定）
    pub fn is_long_enough(&self, word: &str) -> bool {
        self.locale.normalize_word(word).chars().count() >= self.min_len
    }

    /// 単語を辿る隣接パスが盤面上に存在するか
    ///
    /// 同じセルは 1 パス内で再利用しない。訪問マークは探索ごとに 1 つのバッファを
    /// 使い回し、バックトラック時に戻す。
    pub fn is_on_board(&self, word: &str) -> bool {
        let letters: Vec<char> = self.locale.normalize_word(word).chars().collect();
        if letters.len() < self.min_len || letters.is_empty() {
            return false;
        }
        if letters.len() > self.index.cells.len() {
            return false;
        }
        let mut visited = vec![false; self.index.cells.len()];
        self.index
            .locations_of(letters[0])
            .iter()
            .any(|&start| self.search(start, &letters, 0, &mut visited))
    }

    fn search(&self, at: Coord, letters: &[char], depth: usize, visited: &mut [bool]) -> bool {
        if self.index.letter_at(at) != letters[depth] {
            return false;
        }
        if depth + 1 == letters.len() {
            return true;
        }
        let slot = self.index.offset(at);
        visited[slot] = true;
        let found = self.index.neighbours(at).any(|next| {
            !visited[self.index.offset(next)] && self.search(next, letters, depth + 1, visited)
        });
        visited[slot] = false;
        found
    }
}
