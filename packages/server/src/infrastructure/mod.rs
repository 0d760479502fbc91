//! インフラ層
//!
//! ドメイン層の trait（辞書、判定オラクル、共有ストア、メッセージ送信）の具体的な実装を提供します。

pub mod dictionary;
pub mod dto;
pub mod message_pusher;
pub mod oracle;
pub mod store;
