//! Conversion logic between DTOs and domain types.

use gridword_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{
        CloseReason, DisplayName, GameError, GameEvent, Grid, Locale, MessageContent, PlayerView,
        Presence, RejectReason, Role, Room, RoomCode, RoomView, ScoreLine, Verdict,
    },
    infrastructure::dto::{
        http::{PlayerDetailDto, RoomDetailDto, RoomSummaryDto},
        websocket as dto,
    },
    usecase::{CreateRoomRequest, PlayerAction},
};

// ========================================
// DTO → Domain
// ========================================

impl From<dto::VerdictDto> for Verdict {
    fn from(dto: dto::VerdictDto) -> Self {
        match dto {
            dto::VerdictDto::Accepted => Verdict::Accepted,
            dto::VerdictDto::Rejected => Verdict::Rejected,
        }
    }
}

impl TryFrom<dto::ClientMessage> for PlayerAction {
    type Error = GameError;

    fn try_from(message: dto::ClientMessage) -> Result<Self, Self::Error> {
        let action = match message {
            dto::ClientMessage::CreateRoom {
                name,
                duration_secs,
                locale,
                grid_size,
                grid,
            } => {
                let locale = locale.map(|l| l.parse::<Locale>()).transpose()?;
                let grid = grid.map(Grid::from_rows).transpose()?;
                PlayerAction::CreateRoom {
                    name: DisplayName::new(name)?,
                    request: CreateRoomRequest {
                        duration_secs,
                        locale,
                        grid_size,
                        grid,
                    },
                }
            }
            dto::ClientMessage::Join { room, name } => PlayerAction::Join {
                room: RoomCode::parse(&room)?,
                name: DisplayName::new(name)?,
            },
            dto::ClientMessage::Start { room } => PlayerAction::Start {
                room: RoomCode::parse(&room)?,
            },
            dto::ClientMessage::SubmitWord { room, word } => PlayerAction::SubmitWord {
                room: RoomCode::parse(&room)?,
                word,
            },
            dto::ClientMessage::EndEarly { room } => PlayerAction::EndEarly {
                room: RoomCode::parse(&room)?,
            },
            dto::ClientMessage::ResolveReview {
                room,
                word,
                verdict,
            } => PlayerAction::ResolveReview {
                room: RoomCode::parse(&room)?,
                word,
                verdict: verdict.into(),
            },
            dto::ClientMessage::Leave { room } => PlayerAction::Leave {
                room: RoomCode::parse(&room)?,
            },
            dto::ClientMessage::CloseRoom { room } => PlayerAction::CloseRoom {
                room: RoomCode::parse(&room)?,
            },
            dto::ClientMessage::Chat { room, text } => PlayerAction::Chat {
                room: RoomCode::parse(&room)?,
                content: MessageContent::new(text)?,
            },
            dto::ClientMessage::Heartbeat => PlayerAction::Heartbeat,
        };
        Ok(action)
    }
}

// ========================================
// Domain → DTO
// ========================================

fn reject_reason_str(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::TooShort => "tooShort",
        RejectReason::NotOnBoard => "notOnBoard",
        RejectReason::NotInDictionary => "notInDictionary",
        RejectReason::DuplicateWord => "duplicateWord",
        RejectReason::ArbitrationRejected => "arbitrationRejected",
        RejectReason::RoundNotActive => "roundNotActive",
    }
}

fn close_reason_str(reason: CloseReason) -> &'static str {
    match reason {
        CloseReason::OwnerLeft => "ownerLeft",
        CloseReason::ClosedByOwner => "closedByOwner",
        CloseReason::Idle => "idle",
        CloseReason::Empty => "empty",
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Owner => "owner",
        Role::Participant => "participant",
    }
}

fn presence_str(presence: Presence) -> &'static str {
    match presence {
        Presence::Connected => "connected",
        Presence::GracePeriod { .. } => "gracePeriod",
        Presence::Evicted => "evicted",
    }
}

impl From<PlayerView> for dto::PlayerInfo {
    fn from(view: PlayerView) -> Self {
        Self {
            id: view.id.into_string(),
            name: view.name.as_str().to_string(),
            role: role_str(view.role).to_string(),
            connected: view.connected,
            score: view.score,
            combo: view.combo,
        }
    }
}

impl From<RoomView> for dto::RoomInfo {
    fn from(view: RoomView) -> Self {
        Self {
            code: view.code.as_str().to_string(),
            locale: view.locale.as_str().to_string(),
            phase: view.phase.as_str().to_string(),
            round: view.round,
            duration_secs: view.duration_secs,
            owner: view.owner.map(|o| o.into_string()),
            players: view.players.into_iter().map(Into::into).collect(),
            grid: view.grid.map(|g| g.rows()),
            created_at: view.created_at.value(),
        }
    }
}

impl From<ScoreLine> for dto::ScoreInfo {
    fn from(line: ScoreLine) -> Self {
        Self {
            player: line.player.into_string(),
            name: line.name.as_str().to_string(),
            score: line.score,
            words: line.words,
        }
    }
}

impl From<GameEvent> for dto::ServerMessage {
    fn from(event: GameEvent) -> Self {
        match event {
            GameEvent::Joined {
                room,
                you,
                reconnected,
                found_words,
                pending_words,
                remaining_secs,
            } => Self::Joined {
                room: room.into(),
                you: you.into_string(),
                reconnected,
                found_words,
                pending_words,
                remaining_secs,
            },
            GameEvent::RosterUpdated {
                room,
                owner,
                players,
            } => Self::RosterUpdated {
                room: room.as_str().to_string(),
                owner: owner.map(|o| o.into_string()),
                players: players.into_iter().map(Into::into).collect(),
            },
            GameEvent::RoundStarted {
                room,
                round,
                grid,
                duration_secs,
            } => Self::RoundStarted {
                room: room.as_str().to_string(),
                round,
                grid: grid.rows(),
                duration_secs,
            },
            GameEvent::TimeRemaining { room, seconds } => Self::TimeRemaining {
                room: room.as_str().to_string(),
                seconds,
            },
            GameEvent::WordAccepted {
                room,
                player,
                word,
                points,
                combo_level,
                score,
            } => Self::WordAccepted {
                room: room.as_str().to_string(),
                player: player.into_string(),
                word,
                points,
                combo_level,
                score,
            },
            GameEvent::WordRejected { room, word, reason } => Self::WordRejected {
                room: room.as_str().to_string(),
                word,
                reason: reject_reason_str(reason).to_string(),
            },
            GameEvent::WordPendingArbitration { room, word } => Self::WordPendingArbitration {
                room: room.as_str().to_string(),
                word,
            },
            GameEvent::RoundEnded { room, round } => Self::RoundEnded {
                room: room.as_str().to_string(),
                round,
            },
            GameEvent::ReviewRequired { room, words } => Self::ReviewRequired {
                room: room.as_str().to_string(),
                words,
            },
            GameEvent::RoundFinalized {
                room,
                round,
                scores,
            } => Self::RoundFinalized {
                room: room.as_str().to_string(),
                round,
                scores: scores.into_iter().map(Into::into).collect(),
            },
            GameEvent::RateLimited { event_type } => Self::RateLimited {
                event_type: event_type.as_str().to_string(),
            },
            GameEvent::OwnerTransferred { room, new_owner } => Self::OwnerTransferred {
                room: room.as_str().to_string(),
                new_owner: new_owner.into_string(),
            },
            GameEvent::RoomClosed { room, reason } => Self::RoomClosed {
                room: room.as_str().to_string(),
                reason: close_reason_str(reason).to_string(),
            },
            GameEvent::Chat {
                room,
                from,
                name,
                content,
                timestamp,
            } => Self::Chat {
                room: room.as_str().to_string(),
                from: from.into_string(),
                name: name.as_str().to_string(),
                text: content.into_string(),
                timestamp: timestamp.value(),
            },
            GameEvent::HeartbeatAck { timestamp } => Self::HeartbeatAck {
                timestamp: timestamp.value(),
            },
            GameEvent::Error { code, message } => Self::Error { code, message },
        }
    }
}

impl From<&Room> for RoomSummaryDto {
    fn from(room: &Room) -> Self {
        Self {
            code: room.code.as_str().to_string(),
            locale: room.locale.as_str().to_string(),
            phase: room.phase.as_str().to_string(),
            round: room.round,
            players: room
                .players
                .iter()
                .map(|p| p.name.as_str().to_string())
                .collect(),
            created_at: timestamp_to_rfc3339(room.created_at.value()),
        }
    }
}

impl From<&Room> for RoomDetailDto {
    fn from(room: &Room) -> Self {
        Self {
            code: room.code.as_str().to_string(),
            locale: room.locale.as_str().to_string(),
            phase: room.phase.as_str().to_string(),
            round: room.round,
            duration_secs: room.settings.duration_secs,
            owner: room.owner.as_ref().map(|o| o.as_str().to_string()),
            players: room
                .players
                .iter()
                .map(|p| PlayerDetailDto {
                    id: p.id.as_str().to_string(),
                    name: p.name.as_str().to_string(),
                    role: role_str(p.role).to_string(),
                    presence: presence_str(p.presence).to_string(),
                    score: p.score,
                    joined_at: timestamp_to_rfc3339(p.joined_at.value()),
                })
                .collect(),
            grid: room.grid.as_ref().map(Grid::rows),
            found_words: room.words.claimed_count(),
            created_at: timestamp_to_rfc3339(room.created_at.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventKind, GridSource, PlayerId, RoundSettings, Timestamp};

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s.to_string()).unwrap()
    }

    #[test]
    fn test_client_message_to_action() {
        // テスト項目: DTO の submit-word が検証済みのドメイン型に変換される
        // given (前提条件):
        let message = dto::ClientMessage::SubmitWord {
            room: "123456".to_string(),
            word: "cat".to_string(),
        };

        // when (操作):
        let action = PlayerAction::try_from(message).unwrap();

        // then (期待する結果):
        assert_eq!(action.kind(), EventKind::SubmitWord);
        match action {
            PlayerAction::SubmitWord { room, word } => {
                assert_eq!(room.as_str(), "123456");
                assert_eq!(word, "cat");
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_create_room_with_fixed_grid_and_locale() {
        // テスト項目: create-room の盤面とロケールが変換される
        // given (前提条件):
        let message = dto::ClientMessage::CreateRoom {
            name: "Alice".to_string(),
            duration_secs: Some(90),
            locale: Some("he".to_string()),
            grid_size: None,
            grid: Some(vec![
                vec!["C".to_string(), "A".to_string()],
                vec!["T".to_string(), "S".to_string()],
            ]),
        };

        // when (操作):
        let action = PlayerAction::try_from(message).unwrap();

        // then (期待する結果):
        match action {
            PlayerAction::CreateRoom { name, request } => {
                assert_eq!(name.as_str(), "Alice");
                assert_eq!(request.duration_secs, Some(90));
                assert_eq!(request.locale, Some(Locale::He));
                assert_eq!(request.grid.unwrap().width(), 2);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_fields_become_invalid_input() {
        // テスト項目: 不正なルームコードや盤面は invalidInput になる
        // given (前提条件):
        let bad_room = dto::ClientMessage::Start {
            room: "12".to_string(),
        };
        let bad_grid = dto::ClientMessage::CreateRoom {
            name: "Alice".to_string(),
            duration_secs: None,
            locale: None,
            grid_size: None,
            grid: Some(vec![vec!["AB".to_string()]]),
        };
        let empty_chat = dto::ClientMessage::Chat {
            room: "123456".to_string(),
            text: "   ".to_string(),
        };

        // when (操作):
        let results = [
            PlayerAction::try_from(bad_room),
            PlayerAction::try_from(bad_grid),
            PlayerAction::try_from(empty_chat),
        ];

        // then (期待する結果):
        for result in results {
            assert!(matches!(result, Err(GameError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_rejection_event_to_dto() {
        // テスト項目: 却下理由は camelCase の文字列になる
        // given (前提条件):
        let event = GameEvent::WordRejected {
            room: RoomCode::parse("123456").unwrap(),
            word: "ZZZ".to_string(),
            reason: RejectReason::NotOnBoard,
        };

        // when (操作):
        let message = dto::ServerMessage::from(event);

        // then (期待する結果):
        assert_eq!(
            message,
            dto::ServerMessage::WordRejected {
                room: "123456".to_string(),
                word: "ZZZ".to_string(),
                reason: "notOnBoard".to_string(),
            }
        );
    }

    #[test]
    fn test_rate_limited_event_to_dto() {
        // テスト項目: rateLimited はイベント種別を kebab-case で伝える
        // given (前提条件):
        let event = GameEvent::from(GameError::RateLimited(EventKind::SubmitWord));

        // when (操作):
        let value = serde_json::to_value(dto::ServerMessage::from(event)).unwrap();

        // then (期待する結果):
        assert_eq!(value["type"], "rate-limited");
        assert_eq!(value["event_type"], "submit-word");
    }

    #[test]
    fn test_room_detail_dto() {
        // テスト項目: ルーム詳細にプレイヤーの状態が含まれる
        // given (前提条件):
        let mut room = Room::new(
            RoomCode::parse("123456").unwrap(),
            Locale::En,
            RoundSettings {
                duration_secs: 60,
                grid: GridSource::Random { size: 4 },
            },
            Timestamp::new(0),
            8,
        );
        room.add_player(
            pid("alice"),
            &DisplayName::new("Alice".to_string()).unwrap(),
            Timestamp::new(0),
        )
        .unwrap();

        // when (操作):
        let detail = RoomDetailDto::from(&room);

        // then (期待する結果):
        assert_eq!(detail.code, "123456");
        assert_eq!(detail.phase, "waiting");
        assert_eq!(detail.owner, Some("alice".to_string()));
        assert_eq!(detail.players[0].role, "owner");
        assert_eq!(detail.players[0].presence, "connected");
        assert!(detail.grid.is_none());
    }
}
