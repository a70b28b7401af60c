/// 서버 시각 보정
/// 경매 뷰 로드 시점에 한 번 계산한 오차(driftMs)를 로컬 시계에 더해
/// 이후의 모든 "현재 시각" 판정을 서버 기준으로 맞춘다.
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

// endregion: --- Imports

// region:    --- Local Clock
/// 로컬 시계 트레이트 (테스트에서 고정/왜곡된 시계로 대체)
pub trait LocalClock: Send + Sync {
    fn local_now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
pub struct SystemClock;

impl LocalClock for SystemClock {
    fn local_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
// endregion: --- Local Clock

// region:    --- Server Clock
/// 서버 기준 시계
/// drift_ms = 서버 Date 헤더 − 로컬 현재 시각 (밀리초, 부호 있음)
/// 헤더가 없거나 파싱 불가능하면 0으로 두고 로컬 시계를 그대로 신뢰한다.
#[derive(Clone)]
pub struct ServerClock {
    drift_ms: i64,
    local: Arc<dyn LocalClock>,
}

impl ServerClock {
    /// 시스템 시계 기반 서버 시계 생성
    pub fn new(drift_ms: i64) -> Self {
        Self::with_local(drift_ms, Arc::new(SystemClock))
    }

    /// 로컬 시계를 지정한 서버 시계 생성
    pub fn with_local(drift_ms: i64, local: Arc<dyn LocalClock>) -> Self {
        Self { drift_ms, local }
    }

    /// 보정된 현재 시각
    pub fn now(&self) -> DateTime<Utc> {
        self.local.local_now() + Duration::milliseconds(self.drift_ms)
    }

    pub fn drift_ms(&self) -> i64 {
        self.drift_ms
    }
}
// endregion: --- Server Clock

// endregion: --- Tests
