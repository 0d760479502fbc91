//! 切断中プレイヤーの猶予タイマー管理
//!
//! 切断されたプレイヤーごとに 1 つのタイマーを持ちます。タイマーは期限が来ると
//! ルームワーカーのキューに `GraceExpired` を送るだけで、状態の変更はワーカーが
//! 行います。再接続でタイマーを取り消した後に古い通知が届いても、エポックが
//! 一致しないので無視されます。

use std::{collections::HashMap, time::Duration};

use tokio::{sync::mpsc, task::JoinHandle};

use super::room_worker::RoomCommand;
use crate::domain::PlayerId;

struct GraceTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct PresenceManager {
    timers: HashMap<PlayerId, GraceTimer>,
    next_epoch: u64,
}

impl PresenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 猶予タイマーを開始し、そのエポックを返す（既存のタイマーは置き換える）
    pub fn schedule(
        &mut self,
        player: PlayerId,
        grace: Duration,
        tx: mpsc::UnboundedSender<RoomCommand>,
    ) -> u64 {
        self.cancel(&player);
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let target = player.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(RoomCommand::GraceExpired {
                player: target,
                epoch,
            });
        });
        self.timers.insert(player, GraceTimer { epoch, handle });
        epoch
    }

    /// タイマーを取り消す（再接続・退出時）
    pub fn cancel(&mut self, player: &PlayerId) -> bool {
        match self.timers.remove(player) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 期限切れ通知を受理する。最新のタイマーからの通知ならエントリを消して true
    pub fn expire(&mut self, player: &PlayerId, epoch: u64) -> bool {
        match self.timers.get(player) {
            Some(timer) if timer.epoch == epoch => {
                self.timers.remove(player);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self, player: &PlayerId) -> bool {
        self.timers.contains_key(player)
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.handle.abort();
        }
    }
}

impl Drop for PresenceManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
