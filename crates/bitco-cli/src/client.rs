//! 게이트웨이 RPC 클라이언트.
//!
//! 모든 요청은 생성 시 지정한 타임아웃으로 제한됩니다. 게이트웨이가 반환한
//! 에러 본문은 [`ApiErrorResponse`]로 그대로 보존됩니다.

use std::time::Duration;

use bitco_core::{Balance, DealerRate, Order, OrderBook, Pair, Quote, QuoteRequest, Ticker};
use bitco_gateway::routes::{
    BuyRequest, HealthResponse, OpenOrdersResponse, PositionResponse, RecentTradesResponse,
    SellRequest, TicksResponse, TradeRecordsResponse,
};
use bitco_gateway::{ApiErrorResponse, AssetsSummary, CancelResult};
use bitco_ledger::ReconcileOutcome;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// 기본 게이트웨이 주소.
pub const DEFAULT_GATEWAY_ADDR: &str = "http://127.0.0.1:50051";

/// 기본 요청 타임아웃.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// 클라이언트 에러.
#[derive(Debug, Error)]
pub enum ClientError {
    /// 연결 실패, 타임아웃, 본문 디코딩 실패
    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// 게이트웨이가 에러 본문과 함께 거부
    #[error("{error} (HTTP {status})")]
    Api { status: u16, error: ApiErrorResponse },

    /// 에러 본문 형식이 아닌 실패 응답
    #[error("Unexpected response (HTTP {status}): {body}")]
    Unexpected { status: u16, body: String },
}

impl ClientError {
    /// 게이트웨이 에러 코드 (예: "POSITION_CONFLICT").
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { error, .. } => Some(&error.code),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// 게이트웨이 RPC 클라이언트.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    /// 새 클라이언트를 생성합니다.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        debug!(path, "GET");
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        debug!(path, "POST");
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(error) => Err(ClientError::Api {
                status: status.as_u16(),
                error,
            }),
            Err(_) => Err(ClientError::Unexpected {
                status: status.as_u16(),
                body,
            }),
        }
    }

    fn limit_query(limit: Option<u32>) -> String {
        limit.map(|n| format!("?limit={}", n)).unwrap_or_default()
    }

    // ==================== 조회 ====================

    pub async fn health(&self) -> ClientResult<HealthResponse> {
        self.get("/health").await
    }

    pub async fn balances(&self) -> ClientResult<Balance> {
        self.get("/api/v1/balances").await
    }

    pub async fn assets(&self, pair: Pair) -> ClientResult<AssetsSummary> {
        self.get(&format!("/api/v1/assets?pair={}", pair)).await
    }

    pub async fn quote(&self, request: &QuoteRequest) -> ClientResult<Quote> {
        self.post("/api/v1/quote", request).await
    }

    pub async fn dealer_rate(&self, pair: Pair) -> ClientResult<DealerRate> {
        self.get(&format!("/api/v1/rate/{}", pair)).await
    }

    pub async fn ticker(&self, pair: Pair) -> ClientResult<Ticker> {
        self.get(&format!("/api/v1/ticker?pair={}", pair)).await
    }

    pub async fn order_book(&self, pair: Pair) -> ClientResult<OrderBook> {
        self.get(&format!("/api/v1/order-book?pair={}", pair)).await
    }

    pub async fn recent_trades(&self, pair: Pair) -> ClientResult<RecentTradesResponse> {
        self.get(&format!("/api/v1/trades/recent?pair={}", pair))
            .await
    }

    pub async fn open_orders(&self) -> ClientResult<OpenOrdersResponse> {
        self.get("/api/v1/orders/open").await
    }

    pub async fn position(&self) -> ClientResult<Option<Order>> {
        let response: PositionResponse = self.get("/api/v1/position").await?;
        Ok(response.position)
    }

    pub async fn ticks(&self, limit: Option<u32>) -> ClientResult<TicksResponse> {
        self.get(&format!("/api/v1/ticks{}", Self::limit_query(limit)))
            .await
    }

    pub async fn trade_records(&self, limit: Option<u32>) -> ClientResult<TradeRecordsResponse> {
        self.get(&format!("/api/v1/trade-records{}", Self::limit_query(limit)))
            .await
    }

    // ==================== 주문 ====================

    pub async fn buy(&self, pair: Pair, amount: Decimal) -> ClientResult<Order> {
        self.post("/api/v1/buy", &BuyRequest { pair, amount }).await
    }

    pub async fn sell(&self, pair: Pair) -> ClientResult<Order> {
        self.post("/api/v1/sell", &SellRequest { pair }).await
    }

    pub async fn cancel(&self) -> ClientResult<CancelResult> {
        self.post("/api/v1/cancel", &serde_json::json!({})).await
    }

    pub async fn reconcile(&self) -> ClientResult<ReconcileOutcome> {
        self.post("/api/v1/reconcile", &serde_json::json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GatewayClient::new("http://127.0.0.1:50051/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.base_url(), DEFAULT_GATEWAY_ADDR);
        assert_eq!(client.url("/health"), "http://127.0.0.1:50051/health");
    }

    #[test]
    fn test_limit_query() {
        assert_eq!(GatewayClient::limit_query(None), "");
        assert_eq!(GatewayClient::limit_query(Some(5)), "?limit=5");
    }

    #[test]
    fn test_error_code() {
        let err = ClientError::Api {
            status: 409,
            error: ApiErrorResponse::new("POSITION_CONFLICT", "already open"),
        };
        assert_eq!(err.code(), Some("POSITION_CONFLICT"));
        assert!(err.to_string().contains("HTTP 409"));
    }
}
