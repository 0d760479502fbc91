//! Room エンティティ
//!
//! ルームの権威的な状態（フェーズ、盤面、参加者、得点、単語台帳）を保持します。
//! 状態を変更するのはルームワーカーだけで、フィールド単位のロックは持ちません。

use serde::{Deserialize, Serialize};

use super::{Player, Presence, Role, WordLedger};
use crate::domain::{
    DisplayName, GameError, Grid, Locale, PhaseAction, PlayerId, RoomCode, RoomPhase, Timestamp,
};

/// ラウンドごとの盤面の決め方
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum GridSource {
    /// 作成時に指定された盤面を毎ラウンド使う
    Fixed { grid: Grid },
    /// 毎ラウンド `size` × `size` の盤面をランダム生成する
    Random { size: usize },
}

/// ラウンド設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettings {
    pub duration_secs: u64,
    pub grid: GridSource,
}

/// ラウンド結果の 1 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub player: PlayerId,
    pub name: DisplayName,
    pub score: u32,
    pub words: Vec<String>,
}

/// ゲームルーム
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub locale: Locale,
    pub phase: RoomPhase,
    pub settings: RoundSettings,
    /// 現在（または直前）のラウンドの盤面
    pub grid: Option<Grid>,
    /// 開始済みラウンド数
    pub round: u32,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub owner: Option<PlayerId>,
    pub players: Vec<Player>,
    pub words: WordLedger,
    pub max_players: usize,
}

impl Room {
    pub fn new(
        code: RoomCode,
        locale: Locale,
        settings: RoundSettings,
        created_at: Timestamp,
        max_players: usize,
    ) -> Self {
        Self {
            code,
            locale,
            phase: RoomPhase::Waiting,
            settings,
            grid: None,
            round: 0,
            created_at,
            started_at: None,
            owner: None,
            players: Vec::new(),
            words: WordLedger::new(),
            max_players,
        }
    }

    // ========================================
    // 参加者
    // ========================================

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn is_owner(&self, id: &PlayerId) -> bool {
        self.owner.as_ref() == Some(id)
    }

    /// 接続中のプレイヤー ID（参加順）
    pub fn connected_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_connected())
            .map(|p| p.id.clone())
            .collect()
    }

    /// 接続状態を問わない全参加者の ID（参加順）
    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    /// ルーム内で一意な表示名（大文字小文字を区別せず衝突したら接尾辞を付ける）
    pub fn unique_name(&self, wanted: &DisplayName) -> DisplayName {
        let taken = |candidate: &DisplayName| {
            self.players
                .iter()
                .any(|p| p.name.eq_ignore_case(candidate))
        };
        if !taken(wanted) {
            return wanted.clone();
        }
        (2..)
            .map(|n| wanted.with_suffix(n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| wanted.clone())
    }

    /// 新しいプレイヤーを追加（オーナー不在なら最初のプレイヤーがオーナー）
    pub fn add_player(
        &mut self,
        id: PlayerId,
        name: &DisplayName,
        now: Timestamp,
    ) -> Result<&Player, GameError> {
        if self.player(&id).is_some() {
            return Err(GameError::InvalidInput(format!(
                "player '{id}' is already in the room"
            )));
        }
        if self.players.len() >= self.max_players {
            return Err(GameError::RoomFull);
        }
        let name = self.unique_name(name);
        let role = if self.owner.is_none() {
            self.owner = Some(id.clone());
            Role::Owner
        } else {
            Role::Participant
        };
        self.players.push(Player::new(id, name, role, now));
        Ok(&self.players[self.players.len() - 1])
    }

    /// プレイヤーを取り除く（単語台帳はそのまま残す）
    pub fn remove_player(&mut self, id: &PlayerId) -> Option<Player> {
        let index = self.players.iter().position(|p| &p.id == id)?;
        let mut removed = self.players.remove(index);
        removed.presence = Presence::Evicted;
        if self.owner.as_ref() == Some(id) {
            self.owner = None;
        }
        Some(removed)
    }

    /// 次のオーナー候補：接続中で最も早く参加したプレイヤー
    pub fn next_owner_candidate(&self, excluding: &PlayerId) -> Option<PlayerId> {
        self.players
            .iter()
            .filter(|p| &p.id != excluding && p.is_connected())
            .min_by_key(|p| p.joined_at)
            .map(|p| p.id.clone())
    }

    /// オーナー権限を移譲
    pub fn transfer_ownership(&mut self, to: &PlayerId) -> Result<(), GameError> {
        if self.player(to).is_none() {
            return Err(GameError::NotInRoom);
        }
        for player in self.players.iter_mut() {
            player.role = if &player.id == to {
                Role::Owner
            } else {
                Role::Participant
            };
        }
        self.owner = Some(to.clone());
        Ok(())
    }

    // ========================================
    // ライフサイクル
    // ========================================

    /// ラウンドを開始し、得点と単語台帳をリセットする
    pub fn start_round(&mut self, grid: Grid, now: Timestamp) -> Result<(), GameError> {
        let next = self.phase.transition(PhaseAction::Start)?;
        self.phase = next;
        self.grid = Some(grid);
        self.round += 1;
        self.started_at = Some(now);
        self.words.clear();
        for player in self.players.iter_mut() {
            player.reset_for_round();
        }
        Ok(())
    }

    pub fn end_round(&mut self) -> Result<(), GameError> {
        self.phase = self.phase.transition(PhaseAction::End)?;
        Ok(())
    }

    /// 審査が必要なら reviewing へ、不要なら何もしない
    pub fn begin_review(&mut self) -> Result<bool, GameError> {
        if !self.words.has_pending() {
            return Ok(false);
        }
        self.phase = self.phase.transition(PhaseAction::Review)?;
        Ok(true)
    }

    /// 結果を確定して waiting に戻る（審査中は全て解決済みであること）
    pub fn finalize(&mut self) -> Result<(), GameError> {
        if self.phase == RoomPhase::Reviewing && self.words.has_pending() {
            return Err(GameError::InvalidTransition {
                from: self.phase,
                action: PhaseAction::Finalize,
            });
        }
        self.phase = self.phase.transition(PhaseAction::Finalize)?;
        Ok(())
    }

    /// 残り秒数（ラウンド進行中のみ）
    pub fn remaining_secs(&self, now: Timestamp) -> Option<u64> {
        if self.phase != RoomPhase::Active {
            return None;
        }
        let started = self.started_at?;
        let elapsed_ms = now.millis_since(started);
        let total_ms = self.settings.duration_secs * 1000;
        Some(total_ms.saturating_sub(elapsed_ms).div_ceil(1000))
    }

    /// 得点の高い順（同点は名前順）の結果表
    pub fn scores(&self) -> Vec<ScoreLine> {
        let mut lines: Vec<ScoreLine> = self
            .players
            .iter()
            .map(|p| ScoreLine {
                player: p.id.clone(),
                name: p.name.clone(),
                score: p.score,
                words: self.words.scored_words_of(&p.id),
            })
            .collect();
        lines.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.name.as_str().cmp(b.name.as_str()))
        });
        lines
    }
}
