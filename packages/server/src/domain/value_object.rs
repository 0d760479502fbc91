//! 値オブジェクト
//!
//! 生成時にバリデーションを行い、不正な値がドメインに入り込まないようにします。

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ValueObjectError;

/// プレイヤー ID の最大長
pub const PLAYER_ID_MAX_LEN: usize = 64;
/// 表示名の最大文字数
pub const DISPLAY_NAME_MAX_CHARS: usize = 24;
/// ルームコードの桁数
pub const ROOM_CODE_LEN: usize = 6;
/// チャット本文の最大文字数
pub const MESSAGE_CONTENT_MAX_CHARS: usize = 500;

/// セッション単位の接続 ID
///
/// 再接続時には同じ ID を名乗ることで、猶予期間中の状態を引き継ぎます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// 新しい PlayerId を作成
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let valid = !value.is_empty()
            && value.len() <= PLAYER_ID_MAX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(value))
        } else {
            Err(ValueObjectError::InvalidPlayerId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// ルーム内で表示される名前
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// 新しい DisplayName を作成（前後の空白は除去）
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let trimmed = value.trim();
        let chars = trimmed.chars().count();
        if chars == 0 || chars > DISPLAY_NAME_MAX_CHARS || trimmed.chars().any(char::is_control)
        {
            return Err(ValueObjectError::InvalidDisplayName);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 大文字小文字を区別しない比較
    pub fn eq_ignore_case(&self, other: &DisplayName) -> bool {
        self.0.to_lowercase() == other.0.to_lowercase()
    }

    /// 衝突回避用の接尾辞を付けた名前を返す
    pub fn with_suffix(&self, n: usize) -> DisplayName {
        let suffix = format!(" {n}");
        let keep = DISPLAY_NAME_MAX_CHARS.saturating_sub(suffix.chars().count());
        let base: String = self.0.chars().take(keep).collect();
        DisplayName(format!("{}{}", base.trim_end(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 共有しやすい 6 桁の数字ルームコード
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// 共有ストア上のルームのキー（スナップショットとイベントチャンネル）の接頭辞
    pub const STORE_KEY_PREFIX: &'static str = "room:";

    /// 文字列からルームコードを作成
    pub fn parse(value: &str) -> Result<Self, ValueObjectError> {
        if value.len() == ROOM_CODE_LEN && value.chars().all(|c| c.is_ascii_digit()) {
            Ok(Self(value.to_string()))
        } else {
            Err(ValueObjectError::InvalidRoomCode(value.to_string()))
        }
    }

    /// ランダムなルームコードを生成（衝突チェックは呼び出し側の責務）
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let n: u32 = rng.random_range(0..1_000_000);
        Self(format!("{n:06}"))
    }

    /// 共有ストア上のスナップショットキー
    pub fn store_key(&self) -> String {
        format!("{}{}", Self::STORE_KEY_PREFIX, self.0)
    }

    /// ルームを動かしているインスタンス ID のキー
    pub fn host_key(&self) -> String {
        format!("host:{}", self.0)
    }

    /// スナップショットキーからルームコードを取り出す
    pub fn from_store_key(key: &str) -> Option<Self> {
        key.strip_prefix(Self::STORE_KEY_PREFIX)
            .and_then(|code| Self::parse(code).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for RoomCode {
    type Err = ValueObjectError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// チャット本文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageContent(String);

impl MessageContent {
    /// 新しい MessageContent を作成
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        let chars = value.chars().count();
        if value.trim().is_empty() || chars > MESSAGE_CONTENT_MAX_CHARS {
            return Err(ValueObjectError::InvalidMessageContent);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix タイムスタンプ（ミリ秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// `earlier` からの経過ミリ秒（負にはならない）
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        u64::try_from(self.0 - earlier.0).unwrap_or(0)
    }

    pub fn plus_millis(&self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(i64::try_from(millis).unwrap_or(i64::MAX)))
    }
}
