//! 外部裁定サービス trait 定義
//!
//! 盤面上には存在するが辞書にない単語について、最終的な受理・却下を決める
//! 外部の仕組み（人手やコミュニティ投票など）へのインターフェースです。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Locale, OracleError};

/// 裁定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Accepted,
    Rejected,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accepted
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArbitrationOracle: Send + Sync {
    /// 単語の裁定を依頼し、結果が出るまで待つ
    async fn submit_for_review(&self, word: &str, locale: Locale) -> Result<Verdict, OracleError>;
}
