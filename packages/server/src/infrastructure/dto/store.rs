//! Shared store service DTOs.
//!
//! Request and response bodies exchanged between `RemoteStore` and the
//! `gridword-store` service. Keys and channels travel in the query string.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelQuery {
    pub channel: String,
}

/// Response of `GET /store/value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueDto {
    pub value: Option<String>,
}

/// Body of `PUT /store/value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValueDto {
    pub value: String,
}

/// Body of `GET /store/keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysDto {
    pub keys: Vec<String>,
}

/// Body of `POST /store/publish`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishDto {
    pub payload: String,
}

/// Body of `POST /store/lock/acquire`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireLockDto {
    pub lease_ms: u64,
}

/// Response of `POST /store/lock/acquire`; `None` while another holder has it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTokenDto {
    pub token: Option<String>,
}

/// Body of `POST /store/lock/release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLockDto {
    pub token: String,
}

/// Response of `POST /store/lock/release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedDto {
    pub released: bool,
}
