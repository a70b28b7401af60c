/// 실시간 채널 와이어 프레임
/// JSON `{"event": "...", "data": {...}}` 형태, 이벤트 이름은 camelCase
// region:    --- Imports
use crate::notifications::Notification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Client Frames
/// 클라이언트가 송신하는 프레임
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Join { room: String },
    #[serde(rename_all = "camelCase")]
    Leave { room: String },
    /// 연결(및 재연결) 시 사용자 식별 등록
    #[serde(rename_all = "camelCase")]
    RegisterUser { user_id: i64, session: Uuid },
    /// 입찰 성공 후 방 구성원에게 전파 요청
    /// session은 자기 발신 에코 억제용 식별자
    #[serde(rename_all = "camelCase")]
    NewBid {
        auction_id: i64,
        user_id: i64,
        amount: i64,
        session: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: i64,
        message_id: Uuid,
        sender_id: i64,
        body: String,
        session: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    Typing { conversation_id: i64, user_id: i64 },
}
// endregion: --- Client Frames

// region:    --- Server Frames
/// 서버가 푸시하는 프레임
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerFrame {
    /// 방 구성원 누군가의 입찰 (updateBid는 구버전 별칭)
    /// 구버전 페이로드는 session과 bidTime이 없을 수 있다
    #[serde(alias = "updateBid")]
    #[serde(rename_all = "camelCase")]
    BidPlaced {
        auction_id: i64,
        user_id: i64,
        amount: i64,
        #[serde(default)]
        bid_time: Option<DateTime<Utc>>,
        #[serde(default)]
        session: Option<Uuid>,
        /// 소프트 클로즈 연장 시 서버가 내려주는 새 종료 시각
        #[serde(default)]
        new_end_time: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    AuctionEnded { auction_id: i64 },
    #[serde(rename_all = "camelCase")]
    NewMessage {
        conversation_id: i64,
        #[serde(default)]
        message_id: Option<Uuid>,
        sender_id: i64,
        body: String,
        sent_at: DateTime<Utc>,
        #[serde(default)]
        session: Option<Uuid>,
    },
    #[serde(rename_all = "camelCase")]
    Typing { conversation_id: i64, user_id: i64 },
    Notification(Notification),
}
// endregion: --- Server Frames

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_wire_names_are_camel_case() {
        let raw = serde_json::to_string(&ClientFrame::Join {
            room: "auction:3".to_string(),
        })
        .unwrap();
        assert!(raw.contains(r#""event":"join""#));

        let raw = serde_json::to_string(&ClientFrame::NewBid {
            auction_id: 3,
            user_id: 7,
            amount: 1050,
            session: Uuid::nil(),
        })
        .unwrap();
        assert!(raw.contains(r#""event":"newBid""#));
        assert!(raw.contains(r#""auctionId":3"#));
    }

    #[test]
    fn bid_placed_accepts_legacy_alias_and_sparse_payload() {
        let raw = r#"{"event": "updateBid", "data": {"auctionId": 3, "userId": 9, "amount": 1100}}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ServerFrame::BidPlaced {
                auction_id,
                user_id,
                amount,
                bid_time,
                session,
                new_end_time,
            } => {
                assert_eq!((auction_id, user_id, amount), (3, 9, 1100));
                assert!(bid_time.is_none());
                assert!(session.is_none());
                assert!(new_end_time.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn auction_ended_round_trip() {
        let raw = r#"{"event": "auctionEnded", "data": {"auctionId": 12}}"#;
        let frame: ServerFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame, ServerFrame::AuctionEnded { auction_id: 12 });
    }
}
// endregion: --- Tests
