// region:    --- Imports
use serde::Deserialize;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Reject Code
/// 서버 거절 코드
/// 서버 오류 페이로드 `{"error": "...", "code": "..."}`의 code 필드에 대응
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    /// 입찰 금액이 현재 가격보다 낮음
    LowBid,
    /// 입찰 금액이 최소 입찰 단위 미만
    BelowIncrement,
    /// 경매가 아직 시작되지 않음
    NotStarted,
    /// 경매가 이미 종료됨
    AlreadyEnded,
    /// 점검 모드로 모든 변경 요청 차단
    Maintenance,
    /// 잘못된 경매 상태
    InvalidStatus,
    /// 알 수 없는 코드
    Unknown,
}

impl RejectCode {
    /// 서버 code 문자열 파싱
    pub fn parse(code: &str) -> Self {
        match code {
            "LOW_BID" => RejectCode::LowBid,
            "BELOW_INCREMENT" => RejectCode::BelowIncrement,
            "NOT_STARTED" => RejectCode::NotStarted,
            "ALREADY_ENDED" => RejectCode::AlreadyEnded,
            "MAINTENANCE" => RejectCode::Maintenance,
            "INVALID_STATUS" => RejectCode::InvalidStatus,
            _ => RejectCode::Unknown,
        }
    }
}

/// 서버 오류 페이로드
#[derive(Debug, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    #[serde(default)]
    pub code: Option<String>,
}
// endregion: --- Reject Code

// region:    --- Client Error
/// 클라이언트 오류 분류
#[derive(Debug, Error)]
pub enum ClientError {
    /// 네트워크 호출 전 로컬 검증 거절 (요청 미발행)
    #[error("{0}")]
    Validation(String),

    /// 서버가 거절한 요청 (오래된 가격, 입찰 단위 미만 등)
    #[error("{message}")]
    Rejected { code: RejectCode, message: String },

    /// 경매 종료 상태에서의 입찰 시도
    #[error("Auction has ended")]
    AuctionEnded,

    /// 점검 모드
    #[error("Marketplace is under maintenance")]
    Maintenance,

    /// 동일 경매에 대한 이전 요청이 아직 진행 중 (중복 제출 방지)
    #[error("A bid for this auction is already in flight")]
    Busy,

    /// 로그인하지 않은 세션
    #[error("Sign in to continue")]
    NotSignedIn,

    /// 네트워크 연결 실패 (자동 재시도 없음, 사용자가 재시도)
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    /// 실시간 채널 오류
    #[error("realtime channel error: {0}")]
    Realtime(String),

    /// 응답 본문 디코딩 실패
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// 세션 파일 입출력 오류
    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP 오류 본문을 분류된 오류로 변환
    /// 파싱 불가능한 본문은 본문 전체를 메시지로 사용
    pub fn from_response_body(body: &str) -> Self {
        match serde_json::from_str::<ErrorPayload>(body) {
            Ok(payload) => {
                let code = payload
                    .code
                    .as_deref()
                    .map(RejectCode::parse)
                    .unwrap_or(RejectCode::Unknown);
                match code {
                    RejectCode::AlreadyEnded => ClientError::AuctionEnded,
                    RejectCode::Maintenance => ClientError::Maintenance,
                    _ => ClientError::Rejected {
                        code,
                        message: payload.error,
                    },
                }
            }
            Err(_) => ClientError::Rejected {
                code: RejectCode::Unknown,
                message: body.to_string(),
            },
        }
    }
}
// endregion: --- Client Error

// endregion: --- Tests
