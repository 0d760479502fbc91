//! 外部の判定サービスを呼び出す HTTP クライアント
//!
//! `POST {base_url}/review` に `{"word": "...", "locale": "en"}` を送り、
//! 判定が出たら `{"verdict": "accepted" | "rejected"}` が返ります。

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::domain::{ArbitrationOracle, Locale, OracleError, Verdict};

#[derive(Debug, Serialize)]
struct ReviewRequest<'a> {
    word: &'a str,
    locale: Locale,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    verdict: VerdictBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum VerdictBody {
    Accepted,
    Rejected,
}

pub struct HttpArbitrationOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArbitrationOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/review", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ArbitrationOracle for HttpArbitrationOracle {
    async fn submit_for_review(&self, word: &str, locale: Locale) -> Result<Verdict, OracleError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&ReviewRequest { word, locale })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(OracleError::Unavailable(format!(
                "arbitration service returned {}",
                status
            )));
        }

        let body: ReviewResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;
        tracing::debug!("Arbitration verdict for '{}': {:?}", word, body.verdict);

        Ok(match body.verdict {
            VerdictBody::Accepted => Verdict::Accepted,
            VerdictBody::Rejected => Verdict::Rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_verdict_is_parsed() {
        // テスト項目: サービスの裁定結果を Verdict に変換できる
        // given (前提条件):
        let app = Router::new().route(
            "/review",
            post(|Json(body): Json<Value>| async move {
                let verdict = if body["word"] == "tacs" && body["locale"] == "en" {
                    "accepted"
                } else {
                    "rejected"
                };
                Json(json!({ "verdict": verdict }))
            }),
        );
        let oracle = HttpArbitrationOracle::new(serve(app).await + "/");

        // when (操作):
        let accepted = oracle.submit_for_review("tacs", Locale::En).await;
        let rejected = oracle.submit_for_review("qqq", Locale::En).await;

        // then (期待する結果):
        assert_eq!(accepted, Ok(Verdict::Accepted));
        assert_eq!(rejected, Ok(Verdict::Rejected));
    }

    #[tokio::test]
    async fn test_error_status_is_unavailable() {
        // テスト項目: エラーステータスは Unavailable として扱われる
        // given (前提条件):
        let app = Router::new().route("/review", post(|| async { AxumStatus::BAD_GATEWAY }));
        let oracle = HttpArbitrationOracle::new(serve(app).await);

        // when (操作):
        let result = oracle.submit_for_review("tacs", Locale::En).await;

        // then (期待する結果):
        assert!(matches!(result, Err(OracleError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // テスト項目: 接続できない場合は Unavailable を返す
        // given (前提条件):
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let oracle = HttpArbitrationOracle::new(format!("http://{}", addr));

        // when (操作):
        let result = oracle.submit_for_review("tacs", Locale::En).await;

        // then (期待する結果):
        assert!(matches!(result, Err(OracleError::Unavailable(_))));
    }
}
