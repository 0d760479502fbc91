//! ルームワーカー
//!
//! 1 ルームにつき 1 つの tokio タスクが、そのルームのコマンドキューを到着順に
//! 処理します。ルームの状態を変更するのはこのタスクだけなので、フィールド単位の
//! ロックは必要ありません。
//!
//! タイマー（ラウンド、猶予期間、アイドル）と外部裁定は別タスクで動き、
//! 結果をコマンドとしてキューに戻します。ストアへの書き込みは `Replicator`
//! に積むだけで、ワーカーが外部システムを待つことはありません。

use std::{sync::Arc, time::Duration};

use gridword_shared::time::Clock;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};

use super::{
    presence::PresenceManager,
    replication::Replicator,
    validation_pipeline::{Screening, ValidationPipeline},
};
use crate::{
    config::ServerConfig,
    domain::{
        CloseReason, DisplayName, FoundWord, GameError, GameEvent, Grid, GridSource,
        MessageContent, MessagePusher, PhaseAction, PlayerId, Presence, RejectReason, Room,
        RoomCode, RoomPhase, RoomView, SharedStore, Timestamp, ValidationOutcome, Verdict,
        WordValidator, scoring,
    },
};

/// ルームワーカーへのコマンド
#[derive(Debug)]
pub enum RoomCommand {
    /// 参加（同じ ID で再度送ると再接続）
    Join {
        player: PlayerId,
        name: DisplayName,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Leave {
        player: PlayerId,
    },
    /// ソケットが切れた（猶予期間に入る）
    Disconnect {
        player: PlayerId,
    },
    Start {
        player: PlayerId,
    },
    SubmitWord {
        player: PlayerId,
        word: String,
    },
    EndEarly {
        player: PlayerId,
    },
    ResolveReview {
        player: PlayerId,
        word: String,
        verdict: Verdict,
    },
    Close {
        player: PlayerId,
    },
    Chat {
        player: PlayerId,
        content: MessageContent,
    },
    /// 外部裁定の結果
    ArbitrationVerdict {
        submission: u64,
        round: u32,
        verdict: Verdict,
    },
    Tick {
        round: u32,
    },
    RoundExpired {
        round: u32,
    },
    GraceExpired {
        player: PlayerId,
        epoch: u64,
    },
    IdleExpired {
        epoch: u64,
    },
    Snapshot {
        reply: oneshot::Sender<Room>,
    },
}

/// ワーカーが使う協調者
#[derive(Clone)]
pub struct WorkerDeps {
    pub config: Arc<ServerConfig>,
    pub message_pusher: Arc<dyn MessagePusher>,
    pub pipeline: Arc<ValidationPipeline>,
    pub store: Option<Arc<dyn SharedStore>>,
    pub clock: Arc<dyn Clock>,
}

/// ルームワーカーへの送信口
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    tx: mpsc::UnboundedSender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// コマンドを送る（ワーカーが終了していれば `RoomNotFound`）
    pub fn send(&self, command: RoomCommand) -> Result<(), GameError> {
        self.tx
            .send(command)
            .map_err(|_| GameError::RoomNotFound(self.code.to_string()))
    }

    /// 参加してワーカーの判定を待つ
    pub async fn join(&self, player: PlayerId, name: DisplayName) -> Result<(), GameError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Join {
            player,
            name,
            reply,
        })?;
        rx.await
            .map_err(|_| GameError::RoomNotFound(self.code.to_string()))?
    }

    /// 現在のルーム状態のコピー
    pub async fn snapshot(&self) -> Result<Room, GameError> {
        let (reply, rx) = oneshot::channel();
        self.send(RoomCommand::Snapshot { reply })?;
        rx.await
            .map_err(|_| GameError::RoomNotFound(self.code.to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

enum Flow {
    Continue,
    Stop,
}

pub struct RoomWorker {
    room: Room,
    validator: Option<WordValidator>,
    deps: WorkerDeps,
    replicator: Replicator,
    presence: PresenceManager,
    tx: mpsc::UnboundedSender<RoomCommand>,
    round_timer: Option<JoinHandle<()>>,
    idle_timer: Option<JoinHandle<()>>,
    idle_epoch: u64,
}

impl RoomWorker {
    /// ワーカーを起動し、送信口とタスクのハンドルを返す
    pub fn spawn(room: Room, deps: WorkerDeps) -> (RoomHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let replicator = match &deps.store {
            Some(store) => {
                Replicator::spawn(store.clone(), deps.config.store.instance_id.clone())
            }
            None => Replicator::disabled(),
        };
        let code = room.code.clone();
        let validator = match (&room.grid, room.phase) {
            (Some(grid), RoomPhase::Active) => Some(WordValidator::new(
                grid,
                room.locale,
                deps.config.game.min_word_len,
            )),
            _ => None,
        };
        let worker = RoomWorker {
            room,
            validator,
            deps,
            replicator,
            presence: PresenceManager::new(),
            tx: tx.clone(),
            round_timer: None,
            idle_timer: None,
            idle_epoch: 0,
        };
        let task = tokio::spawn(worker.run(rx));
        (RoomHandle { code, tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        tracing::info!("Room {} worker started", self.room.code);
        self.resume_grace_timers();
        if self.room.phase == RoomPhase::Waiting {
            self.arm_idle_timer();
        }
        self.replicator.claim(&self.room.code);
        self.replicator.save(&self.room);

        while let Some(command) = rx.recv().await {
            if let Flow::Stop = self.handle(command).await {
                break;
            }
        }

        self.stop_timers();
        tracing::info!("Room {} worker stopped", self.room.code);
    }

    async fn handle(&mut self, command: RoomCommand) -> Flow {
        match command {
            RoomCommand::Join {
                player,
                name,
                reply,
            } => {
                let result = self.on_join(&player, name).await;
                let _ = reply.send(result.as_ref().map(|_| ()).map_err(Clone::clone));
                self.finish(&player, result).await
            }
            RoomCommand::Leave { player } => {
                let result = self.on_leave(&player).await;
                self.finish(&player, result).await
            }
            RoomCommand::Disconnect { player } => self.on_disconnect(&player).await,
            RoomCommand::Start { player } => {
                let result = self.on_start(&player).await;
                self.finish(&player, result).await
            }
            RoomCommand::SubmitWord { player, word } => {
                let result = self.on_submit(&player, word).await;
                self.finish(&player, result).await
            }
            RoomCommand::EndEarly { player } => {
                let result = self.on_end_early(&player).await;
                self.finish(&player, result).await
            }
            RoomCommand::ResolveReview {
                player,
                word,
                verdict,
            } => {
                let result = self.on_resolve_review(&player, word, verdict).await;
                self.finish(&player, result).await
            }
            RoomCommand::Close { player } => {
                let result = self.on_close(&player).await;
                self.finish(&player, result).await
            }
            RoomCommand::Chat { player, content } => {
                let result = self.on_chat(&player, content).await;
                self.finish(&player, result).await
            }
            RoomCommand::ArbitrationVerdict {
                submission,
                round,
                verdict,
            } => self.on_verdict(submission, round, verdict).await,
            RoomCommand::Tick { round } => {
                self.on_tick(round).await;
                Flow::Continue
            }
            RoomCommand::RoundExpired { round } => self.on_round_expired(round).await,
            RoomCommand::GraceExpired { player, epoch } => {
                self.on_grace_expired(player, epoch).await
            }
            RoomCommand::IdleExpired { epoch } => self.on_idle_expired(epoch).await,
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.room.clone());
                Flow::Continue
            }
        }
    }

    /// プレイヤー起点のコマンドの後処理（エラーは本人にだけ通知）
    async fn finish(&mut self, player: &PlayerId, result: Result<Flow, GameError>) -> Flow {
        match result {
            Ok(Flow::Stop) => Flow::Stop,
            Ok(Flow::Continue) => {
                self.touch();
                Flow::Continue
            }
            Err(e) => {
                match &e {
                    GameError::InvalidTransition { from, action } => tracing::warn!(
                        "Room {}: rejected {:?} from '{}' while {}",
                        self.room.code,
                        action,
                        player,
                        from.as_str()
                    ),
                    other => tracing::debug!(
                        "Room {}: command from '{}' failed: {}",
                        self.room.code,
                        player,
                        other
                    ),
                }
                self.push(player, &GameEvent::from(e)).await;
                Flow::Continue
            }
        }
    }

    // ========================================
    // 参加者
    // ========================================

    async fn on_join(&mut self, player: &PlayerId, name: DisplayName) -> Result<Flow, GameError> {
        if let Some(existing) = self.room.player_mut(player) {
            let was_away = !existing.is_connected();
            existing.presence = Presence::Connected;
            self.presence.cancel(player);
            self.push_joined(player, true).await;
            if was_away {
                tracing::info!("Player '{}' reconnected to room {}", player, self.room.code);
                self.broadcast(GameEvent::roster(&self.room)).await;
                self.replicator.save(&self.room);
            }
            return Ok(Flow::Continue);
        }

        let now = self.now();
        let joined_as = self.room.add_player(player.clone(), &name, now)?.name.clone();
        tracing::info!(
            "Player '{}' joined room {} as '{}'",
            player,
            self.room.code,
            joined_as
        );
        self.push_joined(player, false).await;
        self.broadcast(GameEvent::roster(&self.room)).await;
        self.replicator.save(&self.room);
        Ok(Flow::Continue)
    }

    async fn on_leave(&mut self, player: &PlayerId) -> Result<Flow, GameError> {
        if self.room.player(player).is_none() {
            return Err(GameError::NotInRoom);
        }
        self.presence.cancel(player);
        let was_owner = self.room.is_owner(player);
        self.room.remove_player(player);
        tracing::info!("Player '{}' left room {}", player, self.room.code);
        Ok(self.after_departure(player, was_owner).await)
    }

    async fn on_disconnect(&mut self, player: &PlayerId) -> Flow {
        let grace = match self.room.player(player) {
            Some(p) if p.is_connected() => self.deps.config.presence.grace_for(p.is_owner()),
            _ => return Flow::Continue,
        };
        let deadline = self.now().plus_millis(duration_millis(grace));
        if let Some(p) = self.room.player_mut(player) {
            p.presence = Presence::GracePeriod { deadline };
        }
        self.presence.schedule(player.clone(), grace, self.tx.clone());
        tracing::info!(
            "Player '{}' disconnected from room {}, grace period {:?}",
            player,
            self.room.code,
            grace
        );
        self.broadcast(GameEvent::roster(&self.room)).await;
        self.replicator.save(&self.room);
        Flow::Continue
    }

    async fn on_grace_expired(&mut self, player: PlayerId, epoch: u64) -> Flow {
        if !self.presence.expire(&player, epoch) {
            tracing::debug!("Ignoring stale grace expiry for '{}'", player);
            return Flow::Continue;
        }
        match self.room.player(&player) {
            Some(p) if p.is_in_grace_period() => {}
            _ => return Flow::Continue,
        }
        let was_owner = self.room.is_owner(&player);
        self.room.remove_player(&player);
        tracing::info!(
            "Player '{}' evicted from room {} after grace period",
            player,
            self.room.code
        );
        self.after_departure(&player, was_owner).await
    }

    /// 退出・追放の後処理：オーナーの引き継ぎ、空になったルームのクローズ
    async fn after_departure(&mut self, departed: &PlayerId, was_owner: bool) -> Flow {
        if !was_owner && self.room.players.is_empty() {
            return self.close(CloseReason::Empty).await;
        }
        if was_owner {
            let Some(next) = self.room.next_owner_candidate(departed) else {
                return self.close(CloseReason::OwnerLeft).await;
            };
            if let Err(e) = self.room.transfer_ownership(&next) {
                tracing::warn!("Room {}: ownership transfer failed: {}", self.room.code, e);
                return self.close(CloseReason::OwnerLeft).await;
            }
            tracing::info!("Room {}: ownership transferred to '{}'", self.room.code, next);
            self.broadcast(GameEvent::OwnerTransferred {
                room: self.room.code.clone(),
                new_owner: next,
            })
            .await;
        }
        self.broadcast(GameEvent::roster(&self.room)).await;
        self.replicator.save(&self.room);
        Flow::Continue
    }

    async fn on_chat(
        &mut self,
        player: &PlayerId,
        content: MessageContent,
    ) -> Result<Flow, GameError> {
        let name = self
            .room
            .player(player)
            .map(|p| p.name.clone())
            .ok_or(GameError::NotInRoom)?;
        self.broadcast(GameEvent::Chat {
            room: self.room.code.clone(),
            from: player.clone(),
            name,
            content,
            timestamp: self.now(),
        })
        .await;
        Ok(Flow::Continue)
    }

    async fn on_close(&mut self, player: &PlayerId) -> Result<Flow, GameError> {
        self.require_owner(player)?;
        Ok(self.close(CloseReason::ClosedByOwner).await)
    }

    // ========================================
    // ラウンド
    // ========================================

    async fn on_start(&mut self, player: &PlayerId) -> Result<Flow, GameError> {
        self.require_owner(player)?;
        // 遷移できない場合は盤面を作る前に弾く
        self.room.phase.transition(PhaseAction::Start)?;
        let grid = self.next_grid()?;
        self.room.start_round(grid.clone(), self.now())?;
        self.validator = Some(WordValidator::new(
            &grid,
            self.room.locale,
            self.deps.config.game.min_word_len,
        ));
        self.cancel_idle_timer();
        self.arm_round_timer();
        tracing::info!(
            "Room {}: round {} started ({}s)",
            self.room.code,
            self.room.round,
            self.room.settings.duration_secs
        );
        self.broadcast(GameEvent::RoundStarted {
            room: self.room.code.clone(),
            round: self.room.round,
            grid,
            duration_secs: self.room.settings.duration_secs,
        })
        .await;
        self.replicator.save(&self.room);
        Ok(Flow::Continue)
    }

    fn next_grid(&self) -> Result<Grid, GameError> {
        match &self.room.settings.grid {
            GridSource::Fixed { grid } => Ok(grid.clone()),
            GridSource::Random { size } => {
                Ok(Grid::random(*size, self.room.locale, &mut rand::rng())?)
            }
        }
    }

    async fn on_end_early(&mut self, player: &PlayerId) -> Result<Flow, GameError> {
        self.require_owner(player)?;
        self.finish_round().await?;
        Ok(Flow::Continue)
    }

    async fn on_round_expired(&mut self, round: u32) -> Flow {
        if round != self.room.round || self.room.phase != RoomPhase::Active {
            return Flow::Continue;
        }
        self.round_timer = None;
        if let Err(e) = self.finish_round().await {
            tracing::warn!("Room {}: failed to end round: {}", self.room.code, e);
        }
        Flow::Continue
    }

    async fn on_tick(&mut self, round: u32) {
        if round != self.room.round || self.room.phase != RoomPhase::Active {
            return;
        }
        if let Some(seconds) = self.room.remaining_secs(self.now()) {
            let event = GameEvent::TimeRemaining {
                room: self.room.code.clone(),
                seconds,
            };
            let targets = self.room.connected_ids();
            self.deps.message_pusher.broadcast(&targets, &event).await;
        }
    }

    /// active → ended、続けて審査または結果確定
    async fn finish_round(&mut self) -> Result<(), GameError> {
        self.room.end_round()?;
        if let Some(timer) = self.round_timer.take() {
            timer.abort();
        }
        tracing::info!("Room {}: round {} ended", self.room.code, self.room.round);
        self.broadcast(GameEvent::RoundEnded {
            room: self.room.code.clone(),
            round: self.room.round,
        })
        .await;

        if self.room.begin_review()? {
            let words = self.room.words.pending_words();
            tracing::info!(
                "Room {}: {} word(s) awaiting review",
                self.room.code,
                words.len()
            );
            self.broadcast(GameEvent::ReviewRequired {
                room: self.room.code.clone(),
                words,
            })
            .await;
            self.replicator.save(&self.room);
            Ok(())
        } else {
            self.finalize_round().await
        }
    }

    async fn finalize_round(&mut self) -> Result<(), GameError> {
        self.room.finalize()?;
        let scores = self.room.scores();
        tracing::info!("Room {}: round {} finalized", self.room.code, self.room.round);
        self.broadcast(GameEvent::RoundFinalized {
            room: self.room.code.clone(),
            round: self.room.round,
            scores,
        })
        .await;
        self.arm_idle_timer();
        self.replicator.save(&self.room);
        Ok(())
    }

    // ========================================
    // 単語
    // ========================================

    async fn on_submit(&mut self, player: &PlayerId, word: String) -> Result<Flow, GameError> {
        if self.room.player(player).is_none() {
            return Err(GameError::NotInRoom);
        }
        let locale = self.room.locale;
        let normalized = locale.normalize_word(&word);
        if normalized.is_empty() {
            return Err(GameError::InvalidInput("word must not be empty".to_string()));
        }
        let code = self.room.code.clone();
        let screening = match (&self.validator, self.room.phase) {
            (Some(validator), RoomPhase::Active) => self.deps.pipeline.screen(
                validator,
                &self.room.words,
                player,
                &normalized,
                locale,
            ),
            _ => Screening::Rejected(RejectReason::RoundNotActive),
        };
        let now = self.now();
        let round = self.room.round;
        let window_ms = duration_millis(self.deps.config.game.combo_window);

        match screening {
            Screening::DictionaryHit => {
                let standing = self.room.player_mut(player).map(|p| {
                    let effective = p.effective_combo(now, window_ms);
                    let points = scoring::score(&normalized, effective);
                    p.record_valid(points, effective, now);
                    (effective, points, p.combo, p.score)
                });
                let Some((effective, points, combo, score)) = standing else {
                    return Err(GameError::NotInRoom);
                };
                self.room.words.record(
                    normalized.clone(),
                    player.clone(),
                    now,
                    ValidationOutcome::DictionaryHit,
                    points,
                    effective,
                    round,
                );
                tracing::debug!(
                    "Room {}: '{}' accepted for '{}' (+{})",
                    code,
                    normalized,
                    player,
                    points
                );
                self.broadcast(GameEvent::WordAccepted {
                    room: code,
                    player: player.clone(),
                    word: normalized,
                    points,
                    combo_level: combo,
                    score,
                })
                .await;
                self.replicator.save(&self.room);
            }
            Screening::Rejected(reason) => {
                if reason.resets_combo() {
                    if let Some(p) = self.room.player_mut(player) {
                        p.reset_combo();
                    }
                }
                let outcome = match reason {
                    RejectReason::NotOnBoard => Some(ValidationOutcome::NotOnBoard),
                    RejectReason::NotInDictionary => Some(ValidationOutcome::DictionaryMiss),
                    _ => None,
                };
                if let Some(outcome) = outcome {
                    self.room.words.record(
                        normalized.clone(),
                        player.clone(),
                        now,
                        outcome,
                        0,
                        0,
                        round,
                    );
                }
                tracing::debug!(
                    "Room {}: '{}' from '{}' rejected: {:?}",
                    code,
                    normalized,
                    player,
                    reason
                );
                self.push(
                    player,
                    &GameEvent::WordRejected {
                        room: code,
                        word: normalized,
                        reason,
                    },
                )
                .await;
            }
            Screening::NeedsArbitration => {
                let captured = self
                    .room
                    .player(player)
                    .map(|p| p.effective_combo(now, window_ms))
                    .unwrap_or(0);
                let submission = self.room.words.record(
                    normalized.clone(),
                    player.clone(),
                    now,
                    ValidationOutcome::PendingArbitration,
                    0,
                    captured,
                    round,
                );
                self.push(
                    player,
                    &GameEvent::WordPendingArbitration {
                        room: code,
                        word: normalized.clone(),
                    },
                )
                .await;
                let tx = self.tx.clone();
                self.deps.pipeline.dispatch(normalized, locale, move |verdict| {
                    let _ = tx.send(RoomCommand::ArbitrationVerdict {
                        submission,
                        round,
                        verdict,
                    });
                });
                self.replicator.save(&self.room);
            }
        }
        Ok(Flow::Continue)
    }

    async fn on_verdict(&mut self, submission: u64, round: u32, verdict: Verdict) -> Flow {
        if round != self.room.round {
            tracing::debug!("Ignoring verdict for submission {} of round {}", submission, round);
            return Flow::Continue;
        }
        let Some(entry) = self
            .room
            .words
            .get(submission)
            .filter(|e| e.outcome.is_pending())
            .cloned()
        else {
            return Flow::Continue;
        };
        self.apply_verdict(&entry, verdict).await;
        if self.room.phase == RoomPhase::Reviewing && !self.room.words.has_pending() {
            if let Err(e) = self.finalize_round().await {
                tracing::warn!("Room {}: failed to finalize: {}", self.room.code, e);
            }
        }
        Flow::Continue
    }

    async fn on_resolve_review(
        &mut self,
        player: &PlayerId,
        word: String,
        verdict: Verdict,
    ) -> Result<Flow, GameError> {
        self.require_owner(player)?;
        if self.room.phase != RoomPhase::Reviewing {
            return Err(GameError::InvalidTransition {
                from: self.room.phase,
                action: PhaseAction::Finalize,
            });
        }
        let normalized = self.room.locale.normalize_word(&word);
        let submissions = self.room.words.pending_ids_for(&normalized);
        if submissions.is_empty() {
            return Err(GameError::InvalidInput(format!(
                "'{normalized}' is not awaiting review"
            )));
        }
        for submission in submissions {
            if let Some(entry) = self.room.words.get(submission).cloned() {
                self.apply_verdict(&entry, verdict).await;
            }
        }
        if !self.room.words.has_pending() {
            self.finalize_round().await?;
        }
        Ok(Flow::Continue)
    }

    /// 裁定待ちの提出に結果を適用する
    ///
    /// 重複判定は適用時点のルーム状態で行い、得点は提出時に記録したコンボで計算する。
    async fn apply_verdict(&mut self, entry: &FoundWord, verdict: Verdict) {
        let code = self.room.code.clone();
        if verdict.is_accepted() && !self.room.words.is_claimed(&entry.word) {
            let points = scoring::score(&entry.word, entry.captured_combo);
            self.room
                .words
                .resolve(entry.id, ValidationOutcome::ArbitrationAccepted, points);
            let standing = self.room.player_mut(&entry.player).map(|p| {
                p.record_late_accept(points, entry.captured_combo, entry.submitted_at);
                (p.combo, p.score)
            });
            tracing::debug!(
                "Room {}: '{}' accepted by arbitration for '{}' (+{})",
                code,
                entry.word,
                entry.player,
                points
            );
            if let Some((combo, score)) = standing {
                self.broadcast(GameEvent::WordAccepted {
                    room: code,
                    player: entry.player.clone(),
                    word: entry.word.clone(),
                    points,
                    combo_level: combo,
                    score,
                })
                .await;
            }
        } else {
            let reason = if verdict.is_accepted() {
                RejectReason::DuplicateWord
            } else {
                RejectReason::ArbitrationRejected
            };
            self.room
                .words
                .resolve(entry.id, ValidationOutcome::ArbitrationRejected, 0);
            self.push(
                &entry.player,
                &GameEvent::WordRejected {
                    room: code,
                    word: entry.word.clone(),
                    reason,
                },
            )
            .await;
        }
        self.replicator.save(&self.room);
    }

    // ========================================
    // タイマー
    // ========================================

    fn arm_round_timer(&mut self) {
        if let Some(timer) = self.round_timer.take() {
            timer.abort();
        }
        let tx = self.tx.clone();
        let round = self.room.round;
        let duration = Duration::from_secs(self.room.settings.duration_secs);
        let tick = self
            .deps
            .config
            .game
            .tick_interval
            .max(Duration::from_millis(100));
        self.round_timer = Some(tokio::spawn(async move {
            let deadline = Instant::now() + duration;
            let mut ticks = tokio::time::interval_at(Instant::now() + tick, tick);
            loop {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(deadline) => {
                        let _ = tx.send(RoomCommand::RoundExpired { round });
                        break;
                    }
                    _ = ticks.tick() => {
                        if tx.send(RoomCommand::Tick { round }).is_err() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    fn arm_idle_timer(&mut self) {
        self.cancel_idle_timer();
        self.idle_epoch += 1;
        let epoch = self.idle_epoch;
        let tx = self.tx.clone();
        let after = self.deps.config.game.idle_timeout;
        self.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RoomCommand::IdleExpired { epoch });
        }));
    }

    fn cancel_idle_timer(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }

    /// waiting 中の操作でアイドルタイマーを延長する
    fn touch(&mut self) {
        if self.room.phase == RoomPhase::Waiting {
            self.arm_idle_timer();
        }
    }

    async fn on_idle_expired(&mut self, epoch: u64) -> Flow {
        if epoch != self.idle_epoch || self.room.phase != RoomPhase::Waiting {
            return Flow::Continue;
        }
        self.close(CloseReason::Idle).await
    }

    /// 復旧したルームの猶予期間中プレイヤーにタイマーを張り直す
    fn resume_grace_timers(&mut self) {
        let now = self.now();
        let waiting: Vec<(PlayerId, Timestamp)> = self
            .room
            .players
            .iter()
            .filter_map(|p| match p.presence {
                Presence::GracePeriod { deadline } => Some((p.id.clone(), deadline)),
                _ => None,
            })
            .collect();
        for (player, deadline) in waiting {
            let remaining = Duration::from_millis(deadline.millis_since(now));
            self.presence.schedule(player, remaining, self.tx.clone());
        }
    }

    fn stop_timers(&mut self) {
        if let Some(timer) = self.round_timer.take() {
            timer.abort();
        }
        self.cancel_idle_timer();
        self.presence.cancel_all();
    }

    // ========================================
    // 補助
    // ========================================

    async fn close(&mut self, reason: CloseReason) -> Flow {
        tracing::info!("Room {} closed: {:?}", self.room.code, reason);
        self.broadcast(GameEvent::RoomClosed {
            room: self.room.code.clone(),
            reason,
        })
        .await;
        self.stop_timers();
        self.replicator.remove(&self.room.code);
        Flow::Stop
    }

    fn require_owner(&self, player: &PlayerId) -> Result<(), GameError> {
        if self.room.player(player).is_none() {
            return Err(GameError::NotInRoom);
        }
        if !self.room.is_owner(player) {
            return Err(GameError::NotOwner);
        }
        Ok(())
    }

    async fn push_joined(&self, player: &PlayerId, reconnected: bool) {
        let event = GameEvent::Joined {
            room: RoomView::from(&self.room),
            you: player.clone(),
            reconnected,
            found_words: self.room.words.scored_words_of(player),
            pending_words: self.room.words.pending_words_of(player),
            remaining_secs: self.room.remaining_secs(self.now()),
        };
        self.push(player, &event).await;
    }

    async fn push(&self, player: &PlayerId, event: &GameEvent) {
        if let Err(e) = self.deps.message_pusher.push_to(player, event).await {
            tracing::debug!("Could not deliver {} to '{}': {}", event.name(), player, e);
        }
    }

    /// 接続中の全員に送り、他インスタンス向けに公開する
    async fn broadcast(&self, event: GameEvent) {
        let targets = self.room.connected_ids();
        self.deps.message_pusher.broadcast(&targets, &event).await;
        self.replicator.publish(&self.room.code, &event, self.room.member_ids());
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.deps.clock.now_millis())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
