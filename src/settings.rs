// region:    --- Imports
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Settings
/// 마켓플레이스 전역 설정
/// 시작 시 한 번 조회해 모든 뷰에 읽기 전용(Arc)으로 공유
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// 점검 모드 (모든 변경 요청 차단)
    #[serde(default)]
    pub maintenance_mode: bool,
    /// 최소 입찰 단위 (없으면 1)
    #[serde(default)]
    pub bid_increment: Option<i64>,
    /// KYC 필수 여부
    #[serde(default)]
    pub kyc_required: bool,
    /// 통화 기호 (없으면 ₹)
    #[serde(default)]
    pub currency: Option<String>,
}

impl Settings {
    /// 최소 입찰 단위 (설정이 없거나 1 미만이면 1)
    pub fn min_increment(&self) -> i64 {
        self.bid_increment.unwrap_or(1).max(1)
    }

    /// 통화 기호
    pub fn currency_symbol(&self) -> &str {
        self.currency.as_deref().unwrap_or("₹")
    }

    /// 금액 표시
    pub fn format_amount(&self, amount: i64) -> String {
        format!("{}{}", self.currency_symbol(), amount)
    }
}
// endregion: --- Settings

// endregion: --- Tests
