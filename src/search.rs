/// 경매 목록 검색 컨트롤러
/// 입력마다 재발행되는 요청에 단조 증가 시퀀스 번호를 붙이고,
/// 최신 발행분이 아닌 응답은 버린다. 느린 이전 응답이
/// 더 새로운 결과를 덮어쓰는 경쟁을 막는다.
// region:    --- Imports
use crate::api::ApiClient;
use crate::bidding::model::Auction;
use crate::error::ClientError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::info;

// endregion: --- Imports

// region:    --- Search Controller
/// 키 입력 디바운스 간격
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// 확정된 검색 결과
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub seq: u64,
    pub query: String,
    pub auctions: Vec<Auction>,
}

/// 검색 컨트롤러
#[derive(Clone)]
pub struct SearchController {
    api: ApiClient,
    issued: Arc<AtomicU64>,
    results: Arc<Mutex<SearchResults>>,
}

impl SearchController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            issued: Arc::new(AtomicU64::new(0)),
            results: Arc::new(Mutex::new(SearchResults::default())),
        }
    }

    /// 검색 실행. 응답이 최신 발행분일 때만 결과에 반영하고 true를 반환,
    /// 더 새로운 요청에 추월당한 응답은 버리고 false를 반환한다.
    pub async fn run(&self, query: &str) -> Result<bool, ClientError> {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let auctions = self.api.search_auctions(query).await?;
        self.commit(ticket, query, auctions).await
    }

    /// 디바운스 검색: 대기 중 새 입력이 들어오면 요청 자체를 내지 않는다
    pub async fn run_debounced(&self, query: &str) -> Result<bool, ClientError> {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(DEBOUNCE).await;
        if ticket != self.issued.load(Ordering::SeqCst) {
            return Ok(false);
        }
        let auctions = self.api.search_auctions(query).await?;
        self.commit(ticket, query, auctions).await
    }

    /// 현재 결과 스냅샷
    pub async fn current(&self) -> SearchResults {
        self.results.lock().await.clone()
    }

    async fn commit(
        &self,
        ticket: u64,
        query: &str,
        auctions: Vec<Auction>,
    ) -> Result<bool, ClientError> {
        if ticket != self.issued.load(Ordering::SeqCst) {
            info!(
                "{:<12} --> 추월당한 응답 폐기 seq: {} query: {:?}",
                "Search", ticket, query
            );
            return Ok(false);
        }
        let mut results = self.results.lock().await;
        // 커밋 직전 재확인 (락 대기 중 새 요청이 발행되었을 수 있음)
        if ticket != self.issued.load(Ordering::SeqCst) {
            return Ok(false);
        }
        *results = SearchResults {
            seq: ticket,
            query: query.to_string(),
            auctions,
        };
        Ok(true)
    }
}
// endregion: --- Search Controller
