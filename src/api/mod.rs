/// REST 게이트웨이 래퍼
/// 모든 뷰가 공유하는 단일 HTTP 클라이언트.
/// 세션 저장소의 베어러 토큰을 모든 요청에 부착하고,
/// 서버 오류 페이로드 `{error, code}`를 분류된 오류로 변환한다.
// region:    --- Imports
use crate::bidding::model::{Auction, Bid, MaxBid};
use crate::chat::Presence;
use crate::error::ClientError;
use crate::notifications::Notification;
use crate::session::SessionStore;
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

// endregion: --- Imports

// region:    --- Responses
/// 입찰 성공 응답
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidAck {
    pub current_price: i64,
    pub bid_amount: i64,
    /// 소프트 클로즈 연장이 일어난 경우 서버가 내려주는 새 종료 시각
    #[serde(default)]
    pub new_end_time: Option<DateTime<Utc>>,
}
// endregion: --- Responses

// region:    --- Api Client
/// API 클라이언트
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl ApiClient {
    /// API 클라이언트 생성 (base_url 뒤에 /api 가 붙는다)
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            session,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// 경매 조회 + Date 헤더 기반 시계 오차(ms) 계산
    /// 헤더가 없거나 파싱 불가능하면 오차는 0
    pub async fn fetch_auction(&self, auction_id: i64) -> Result<(Auction, i64), ClientError> {
        info!("{:<12} --> 경매 조회 id: {}", "Api", auction_id);
        let resp = self
            .request(Method::GET, &format!("/auctions/{auction_id}"))
            .send()
            .await?;
        let drift_ms = drift_from_headers(resp.headers(), Utc::now());
        let auction = Self::decode(resp).await?;
        Ok((auction, drift_ms))
    }

    /// 입찰 이력 조회 (최신순)
    pub async fn fetch_bids(&self, auction_id: i64) -> Result<Vec<Bid>, ClientError> {
        info!("{:<12} --> 입찰 이력 조회 id: {}", "Api", auction_id);
        self.get_json(&format!("/bids/{auction_id}")).await
    }

    /// 입찰 제출
    pub async fn place_bid(&self, auction_id: i64, amount: i64) -> Result<BidAck, ClientError> {
        info!(
            "{:<12} --> 입찰 제출 id: {} 금액: {}",
            "Api", auction_id, amount
        );
        self.post_json(&format!("/bids/{auction_id}"), &json!({ "amount": amount }))
            .await
    }

    /// 대리 입찰 상한 조회 (미설정이면 None)
    pub async fn fetch_max_bid(&self, auction_id: i64) -> Result<Option<MaxBid>, ClientError> {
        info!("{:<12} --> 대리 입찰 상한 조회 id: {}", "Api", auction_id);
        self.get_json_optional(&format!("/bids/{auction_id}/max"))
            .await
    }

    /// 대리 입찰 상한 설정/인상
    pub async fn set_max_bid(
        &self,
        auction_id: i64,
        max_amount: i64,
    ) -> Result<MaxBid, ClientError> {
        info!(
            "{:<12} --> 대리 입찰 상한 설정 id: {} 상한: {}",
            "Api", auction_id, max_amount
        );
        self.post_json(
            &format!("/bids/{auction_id}/max"),
            &json!({ "maxAmount": max_amount }),
        )
        .await
    }

    /// 내 최근 입찰 조회 (없으면 None)
    pub async fn fetch_my_bid(&self, auction_id: i64) -> Result<Option<Bid>, ClientError> {
        info!("{:<12} --> 내 입찰 조회 id: {}", "Api", auction_id);
        self.get_json_optional(&format!("/bids/{auction_id}/me"))
            .await
    }

    /// 즉시 구매
    pub async fn buy_now(&self, auction_id: i64) -> Result<Auction, ClientError> {
        info!("{:<12} --> 즉시 구매 id: {}", "Api", auction_id);
        self.post_json(&format!("/auctions/{auction_id}/buy"), &json!({}))
            .await
    }

    /// 전역 설정 조회
    pub async fn fetch_settings(&self) -> Result<Settings, ClientError> {
        info!("{:<12} --> 전역 설정 조회", "Api");
        self.get_json("/settings").await
    }

    /// 경매 검색
    pub async fn search_auctions(&self, query: &str) -> Result<Vec<Auction>, ClientError> {
        info!("{:<12} --> 경매 검색: {:?}", "Api", query);
        let resp = self
            .request(Method::GET, "/auctions")
            .query(&[("search", query)])
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// 상대 사용자 접속 상태 조회
    pub async fn fetch_presence(&self, user_id: i64) -> Result<Presence, ClientError> {
        self.get_json(&format!("/users/{user_id}/presence")).await
    }

    /// 알림 목록 조회
    pub async fn fetch_notifications(&self) -> Result<Vec<Notification>, ClientError> {
        info!("{:<12} --> 알림 목록 조회", "Api");
        self.get_json("/notifications").await
    }

    // -- 내부 헬퍼

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}/api{}", self.base_url, path));
        if let Some(session) = self.session.current() {
            req = req.bearer_auth(session.token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        Self::decode(resp).await
    }

    /// 404를 None으로 취급하는 조회
    async fn get_json_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let resp = self.request(Method::GET, path).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(Self::decode(resp).await?))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        let resp = self.request(Method::POST, path).json(body).send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        if resp.status().is_success() {
            Ok(resp.json::<T>().await?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ClientError::from_response_body(&body))
        }
    }
}

/// Date 응답 헤더로부터 서버 시계 오차(ms) 계산
pub(crate) fn drift_from_headers(headers: &HeaderMap, local_now: DateTime<Utc>) -> i64 {
    headers
        .get(reqwest::header::DATE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
        .map(|server| (server.with_timezone(&Utc) - local_now).num_milliseconds())
        .unwrap_or(0)
}
// endregion: --- Api Client

// endregion: --- Tests
