// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Auction Model
/// 경매 상태 (서버가 소유, 클라이언트는 미러링만)
/// upcoming → active → ended (즉시 구매 시 → bought), 역전 없음
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    Upcoming,
    Active,
    Ended,
    Bought,
}

/// 경매 모델 (서버 소유 상태의 임시 사본)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub starting_price: i64,
    /// 활성 상태 동안 단조 비감소
    pub current_price: i64,
    #[serde(default)]
    pub buy_now_price: Option<i64>,
    #[serde(default)]
    pub reserve_price: Option<i64>,
    pub quantity: i64,
    pub status: AuctionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub soft_close_seconds: Option<i64>,
    pub seller: String,
}

impl Auction {
    /// 입찰 수락 가능 여부
    pub fn accepts_bids(&self) -> bool {
        self.status == AuctionStatus::Active
    }
}
// endregion: --- Auction Model

// region:    --- Bid Model
/// 입찰 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub auction_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub bid_time: DateTime<Utc>,
}

/// 대리 입찰 상한 (서버 저장 값의 표시용 사본)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxBid {
    pub auction_id: i64,
    pub max_amount: i64,
}
// endregion: --- Bid Model

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_form_is_lowercase() {
        let a: AuctionStatus = serde_json::from_str(r#""active""#).unwrap();
        assert_eq!(a, AuctionStatus::Active);
        assert_eq!(
            serde_json::to_string(&AuctionStatus::Bought).unwrap(),
            r#""bought""#
        );
    }

    #[test]
    fn auction_deserializes_without_optional_fields() {
        let raw = r#"{
            "id": 1,
            "title": "Bronze figure",
            "description": "19th century",
            "category": "sculpture",
            "startingPrice": 1000,
            "currentPrice": 1000,
            "quantity": 1,
            "status": "active",
            "startTime": "2025-06-01T10:00:00Z",
            "endTime": "2025-06-01T12:00:00Z",
            "seller": "gallery-7"
        }"#;
        let auction: Auction = serde_json::from_str(raw).unwrap();
        assert!(auction.buy_now_price.is_none());
        assert!(auction.reserve_price.is_none());
        assert!(auction.soft_close_seconds.is_none());
        assert!(auction.accepts_bids());
    }
}
// endregion: --- Tests
