//! 判定オラクルの実装

mod http;

pub use http::HttpArbitrationOracle;
