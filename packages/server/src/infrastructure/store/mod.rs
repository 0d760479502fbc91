//! 共有ストアの実装
//!
//! - `InMemoryStore`: 単一プロセス内で完結する実装（テスト・単体起動用）
//! - `RemoteStore`: 複数インスタンスで共有する `gridword-store` へのクライアント
//! - `ResilientStore`: 任意の実装にサーキットブレーカーとタイムアウトを付けるラッパー

mod circuit_breaker;
mod inmemory;
mod remote;
mod resilient;

pub use circuit_breaker::CircuitState;
pub use inmemory::InMemoryStore;
pub use remote::RemoteStore;
pub use resilient::ResilientStore;
