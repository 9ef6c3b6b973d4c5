//! Coincheck REST 클라이언트.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bitco_core::{
    AppConfig, Balance, CancelConfirmation, DealerRate, Fill, OrderBook, OrderConfirmation,
    OrderSide, Pair, PublicTrade, Quote, QuoteRequest, RemoteOrderId, Ticker,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::{debug, error};

use super::types::{
    balance_from_value, CcCancel, CcDealerRate, CcError, CcOpenOrders, CcOrderBook, CcOrderRate,
    CcOrderResponse, CcTicker, CcTrades, CcTransactions, LimitOrderBody, MarketBuyBody,
    MarketSellBody,
};
use super::CoincheckConfig;
use crate::traits::{ensure_positive, validate_limit_order, ExchangeClient, ExchangeResult};
use crate::ExchangeError;

type HmacSha256 = Hmac<Sha256>;

/// 인증 실패로 분류할 에러 메시지 키워드.
const AUTH_KEYWORDS: &[&str] = &["authentication", "signature", "api key", "access key"];

/// 동시 요청 간 nonce 역전 거부. 자격 증명 문제가 아니므로 인증 실패로 보지 않음.
const NONCE_KEYWORD: &str = "nonce";

/// Coincheck 거래소 클라이언트.
pub struct CoincheckClient {
    config: CoincheckConfig,
    client: Client,
    /// 마지막으로 사용한 nonce (마이크로초)
    last_nonce: AtomicU64,
}

impl CoincheckClient {
    /// 새 Coincheck 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: CoincheckConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e))
            })?;

        Ok(Self {
            config,
            client,
            last_nonce: AtomicU64::new(0),
        })
    }

    /// 애플리케이션 설정에서 생성.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ExchangeError> {
        Self::new(CoincheckConfig::from_app_config(config))
    }

    /// 다음 nonce 반환.
    ///
    /// 현재 시각(마이크로초)을 기준으로 하되 이전 값보다 항상 큽니다.
    fn next_nonce(&self) -> u64 {
        let now = Utc::now().timestamp_micros().max(0) as u64;
        let mut prev = self.last_nonce.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_nonce.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// HMAC-SHA256으로 `nonce + url + body` 서명.
    fn sign(&self, nonce: &str, url: &str, body: &str) -> ExchangeResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.secret_key.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::Unauthorized(format!("invalid secret key: {}", e)))?;
        mac.update(nonce.as_bytes());
        mac.update(url.as_bytes());
        mac.update(body.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: DeserializeOwned>(&self, path: &str) -> ExchangeResult<T> {
        let url = self.url(path);
        debug!("GET {}", path);

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// 서명된 GET 요청.
    async fn signed_get<T: DeserializeOwned>(&self, path: &str) -> ExchangeResult<T> {
        debug!("GET (signed) {}", path);
        self.send_signed(Method::GET, path, String::new()).await
    }

    /// 서명된 POST 요청.
    async fn signed_post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ExchangeResult<T> {
        let body = serde_json::to_string(body)?;
        debug!("POST (signed) {}", path);
        self.send_signed(Method::POST, path, body).await
    }

    /// 서명된 DELETE 요청.
    async fn signed_delete<T: DeserializeOwned>(&self, path: &str) -> ExchangeResult<T> {
        debug!("DELETE (signed) {}", path);
        self.send_signed(Method::DELETE, path, String::new()).await
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: String,
    ) -> ExchangeResult<T> {
        if self.config.access_key.is_empty() {
            return Err(ExchangeError::Unauthorized(
                "access key is not configured".to_string(),
            ));
        }

        let url = self.url(path);
        let nonce = self.next_nonce().to_string();
        let signature = self.sign(&nonce, &url, &body)?;

        let mut request = self
            .client
            .request(method, &url)
            .header("ACCESS-KEY", &self.config.access_key)
            .header("ACCESS-NONCE", &nonce)
            .header("ACCESS-SIGNATURE", signature);

        if !body.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if self.config.debug {
            debug!(status = status.as_u16(), body = %body, "Coincheck response");
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimited);
        }

        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                if status.is_success() {
                    error!("Failed to parse response: {} - Body: {}", e, body);
                    return Err(ExchangeError::ParseError(e.to_string()));
                }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    return Err(ExchangeError::Unauthorized(body));
                }
                return Err(ExchangeError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
        };

        let rejected = value.get("success").and_then(|v| v.as_bool()) == Some(false);
        if rejected || !status.is_success() {
            return Err(Self::map_error(status, &value, &body));
        }

        serde_json::from_value(value).map_err(|e| {
            error!("Failed to parse response: {} - Body: {}", e, body);
            ExchangeError::ParseError(e.to_string())
        })
    }

    /// 에러 응답을 ExchangeError로 매핑.
    fn map_error(status: StatusCode, value: &serde_json::Value, body: &str) -> ExchangeError {
        let message = serde_json::from_value::<CcError>(value.clone())
            .ok()
            .and_then(|e| e.message());

        let is_auth_status = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;

        match message {
            Some(message) => {
                let lower = message.to_lowercase();
                if lower.contains(NONCE_KEYWORD) {
                    ExchangeError::ApiError {
                        code: status.as_u16() as i32,
                        message,
                    }
                } else if is_auth_status || AUTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    ExchangeError::Unauthorized(message)
                } else {
                    ExchangeError::ApiError {
                        code: status.as_u16() as i32,
                        message,
                    }
                }
            }
            None if is_auth_status => ExchangeError::Unauthorized(body.to_string()),
            None if status.is_server_error() => ExchangeError::Http {
                status: status.as_u16(),
                body: body.to_string(),
            },
            None => ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body.to_string(),
            },
        }
    }
}

#[async_trait]
impl ExchangeClient for CoincheckClient {
    fn name(&self) -> &str {
        "coincheck"
    }

    async fn get_quote(&self, request: &QuoteRequest) -> ExchangeResult<Quote> {
        ensure_positive(request.by.as_str(), request.value)?;

        let path = format!(
            "/api/exchange/orders/rate?order_type={}&pair={}&{}={}",
            request.side.to_limit(),
            request.pair,
            request.by,
            request.value
        );
        let rate: CcOrderRate = self.public_get(&path).await?;

        Ok(Quote {
            pair: request.pair,
            rate: rate.rate,
            price: rate.price,
            amount: rate.amount,
            timestamp: Utc::now(),
        })
    }

    async fn get_ticker(&self, pair: Pair) -> ExchangeResult<Ticker> {
        let ticker: CcTicker = self.public_get(&format!("/api/ticker?pair={}", pair)).await?;
        ticker.into_ticker()
    }

    async fn get_dealer_rate(&self, pair: Pair) -> ExchangeResult<DealerRate> {
        let rate: CcDealerRate = self.public_get(&format!("/api/rate/{}", pair)).await?;
        Ok(rate.into_dealer_rate(pair))
    }

    async fn get_order_book(&self, pair: Pair) -> ExchangeResult<OrderBook> {
        let book: CcOrderBook = self
            .public_get(&format!("/api/order_books?pair={}", pair))
            .await?;
        Ok(book.into())
    }

    async fn get_recent_trades(&self, pair: Pair) -> ExchangeResult<Vec<PublicTrade>> {
        let trades: CcTrades = self.public_get(&format!("/api/trades?pair={}", pair)).await?;
        trades.data.into_iter().map(|t| t.into_trade()).collect()
    }

    async fn place_limit_order(
        &self,
        pair: Pair,
        side: OrderSide,
        rate: Decimal,
        amount: Decimal,
        stop_loss_rate: Option<Decimal>,
    ) -> ExchangeResult<OrderConfirmation> {
        validate_limit_order(side, rate, amount, stop_loss_rate)?;

        let body = LimitOrderBody {
            pair: pair.as_str(),
            order_type: side.as_str(),
            rate: rate.to_string(),
            amount: amount.to_string(),
            stop_loss_rate: stop_loss_rate.map(|r| r.to_string()),
        };
        let response: CcOrderResponse = self.signed_post("/api/exchange/orders", &body).await?;
        response.into_confirmation()
    }

    async fn place_market_order(
        &self,
        pair: Pair,
        side: OrderSide,
        amount: Decimal,
    ) -> ExchangeResult<OrderConfirmation> {
        ensure_positive("amount", amount)?;

        let side = side.to_market();
        let response: CcOrderResponse = match side {
            OrderSide::MarketBuy => {
                let body = MarketBuyBody {
                    pair: pair.as_str(),
                    order_type: side.as_str(),
                    market_buy_amount: amount.to_string(),
                };
                self.signed_post("/api/exchange/orders", &body).await?
            }
            _ => {
                let body = MarketSellBody {
                    pair: pair.as_str(),
                    order_type: side.as_str(),
                    amount: amount.to_string(),
                };
                self.signed_post("/api/exchange/orders", &body).await?
            }
        };
        response.into_confirmation()
    }

    async fn cancel_order(&self, order_id: RemoteOrderId) -> ExchangeResult<CancelConfirmation> {
        let response: CcCancel = self
            .signed_delete(&format!("/api/exchange/orders/{}", order_id))
            .await?;
        Ok(CancelConfirmation {
            order_id: response.id,
        })
    }

    async fn list_open_orders(&self) -> ExchangeResult<Vec<OrderConfirmation>> {
        let response: CcOpenOrders = self.signed_get("/api/exchange/orders/opens").await?;
        response
            .orders
            .into_iter()
            .map(|o| o.into_confirmation())
            .collect()
    }

    async fn get_balances(&self) -> ExchangeResult<Balance> {
        let value: serde_json::Value = self.signed_get("/api/accounts/balance").await?;
        balance_from_value(value)
    }

    async fn list_fills(&self) -> ExchangeResult<Vec<Fill>> {
        let response: CcTransactions = self
            .signed_get("/api/exchange/orders/transactions")
            .await?;
        response
            .transactions
            .into_iter()
            .map(|t| t.into_fill())
            .collect()
    }
}
