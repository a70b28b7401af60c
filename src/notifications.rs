/// 알림 모델
/// 서버가 내려주는 kind 필드를 그대로 신뢰하고,
/// 필드가 없는 구버전 페이로드에 한해 메시지 본문 키워드로 분류한다.
// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Notification Model
/// 알림 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Bids,
    Wins,
    Messages,
    Other,
}

/// 알림
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub seen: bool,
    pub created_at: DateTime<Utc>,
    /// 서버 제공 분류 (구버전 서버는 생략)
    #[serde(default)]
    pub kind: Option<NotificationKind>,
}

impl Notification {
    /// 분류 결정: 서버 값 우선, 없으면 키워드 추론으로 폴백
    pub fn resolved_kind(&self) -> NotificationKind {
        self.kind.unwrap_or_else(|| infer_kind(&self.message))
    }
}

/// 구버전 폴백: 메시지 본문 키워드로 분류 추론
/// "won"이 "bid"와 함께 나타날 수 있으므로 낙찰 키워드를 먼저 검사
fn infer_kind(message: &str) -> NotificationKind {
    let lower = message.to_lowercase();
    if lower.contains("won") || lower.contains("winner") || lower.contains("congratulations") {
        NotificationKind::Wins
    } else if lower.contains("outbid") || lower.contains("bid") {
        NotificationKind::Bids
    } else if lower.contains("message") || lower.contains("replied") {
        NotificationKind::Messages
    } else {
        NotificationKind::Other
    }
}
// endregion: --- Notification Model

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;

    fn notification(message: &str, kind: Option<NotificationKind>) -> Notification {
        Notification {
            message: message.to_string(),
            link: None,
            seen: false,
            created_at: Utc::now(),
            kind,
        }
    }

    #[test]
    fn server_kind_is_trusted_over_text() {
        // 본문은 입찰처럼 보여도 서버 분류가 우선
        let n = notification("You were outbid", Some(NotificationKind::Other));
        assert_eq!(n.resolved_kind(), NotificationKind::Other);
    }

    #[test]
    fn legacy_fallback_infers_from_text() {
        assert_eq!(
            notification("You were outbid on Bronze figure", None).resolved_kind(),
            NotificationKind::Bids
        );
        assert_eq!(
            notification("Congratulations! You won the bid", None).resolved_kind(),
            NotificationKind::Wins
        );
        assert_eq!(
            notification("New message from seller", None).resolved_kind(),
            NotificationKind::Messages
        );
        assert_eq!(
            notification("KYC verification pending", None).resolved_kind(),
            NotificationKind::Other
        );
    }

    #[test]
    fn deserializes_legacy_payload_without_kind() {
        let raw = r#"{"message": "You were outbid", "createdAt": "2025-06-01T10:00:00Z"}"#;
        let n: Notification = serde_json::from_str(raw).unwrap();
        assert!(n.kind.is_none());
        assert_eq!(n.resolved_kind(), NotificationKind::Bids);
        assert!(!n.seen);
    }
}
// endregion: --- Tests
