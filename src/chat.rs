/// 채팅 뷰 모델
/// 1. 메시지 목록 (자기 발신 에코는 메시지 id로 중복 제거)
/// 2. 상대 타이핑 표시 (짧은 만료 시간 후 자동 해제)
/// 3. 접속 상태 폴러 (8초 주기, 드롭 시 취소, 늦게 도착한
///    다른 상대의 응답이 현재 표시를 오염시키지 않도록 보호)
// region:    --- Imports
use crate::api::ApiClient;
use crate::realtime::{ClientFrame, RealtimeManager, RoomGuard, ServerEvent, ServerFrame};
use crate::session::SessionStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Models
/// 채팅 메시지
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub sender_id: i64,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// 접속 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user_id: i64,
    pub online: bool,
}

/// 타이핑 표시 유지 시간
const TYPING_TTL_MS: i64 = 3_000;
// endregion: --- Models

// region:    --- Chat View
/// 채팅 뷰 모델
pub struct ChatView {
    realtime: RealtimeManager,
    session: SessionStore,
    _room: RoomGuard,
    conversation_id: i64,
    peer_id: i64,
    messages: Vec<ChatMessage>,
    peer_typing_until: Option<DateTime<Utc>>,
}

impl ChatView {
    /// 뷰 열기: 대화방 가입
    pub fn open(
        realtime: RealtimeManager,
        session: SessionStore,
        conversation_id: i64,
        peer_id: i64,
    ) -> Self {
        let room = realtime.join_room(&format!("chat:{conversation_id}"));
        info!(
            "{:<12} --> 채팅 열림 대화: {} 상대: {}",
            "Chat", conversation_id, peer_id
        );
        Self {
            realtime,
            session,
            _room: room,
            conversation_id,
            peer_id,
            messages: Vec::new(),
            peer_typing_until: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn peer_id(&self) -> i64 {
        self.peer_id
    }

    /// 상대가 타이핑 중인지 (만료 시간 경과 시 자동 해제)
    pub fn peer_typing(&self, now: DateTime<Utc>) -> bool {
        matches!(self.peer_typing_until, Some(until) if now < until)
    }

    /// 메시지 송신: 로컬에 먼저 추가하고 채널로 전파
    pub fn send_message(&mut self, body: impl Into<String>) -> Option<Uuid> {
        let session = match self.session.current() {
            Some(s) => s,
            None => {
                warn!("{:<12} --> 로그인 없이 메시지 송신 시도", "Chat");
                return None;
            }
        };
        let body = body.into();
        let message_id = Uuid::new_v4();
        self.messages.push(ChatMessage {
            message_id,
            sender_id: session.user_id,
            body: body.clone(),
            sent_at: Utc::now(),
        });
        self.realtime.emit(ClientFrame::SendMessage {
            conversation_id: self.conversation_id,
            message_id,
            sender_id: session.user_id,
            body,
            session: self.realtime.session_id(),
        });
        Some(message_id)
    }

    /// 내 타이핑 알림 송신
    pub fn notify_typing(&self) {
        if let Some(session) = self.session.current() {
            self.realtime.emit(ClientFrame::Typing {
                conversation_id: self.conversation_id,
                user_id: session.user_id,
            });
        }
    }

    /// 채널 이벤트 반영
    pub fn apply_event(&mut self, event: &ServerEvent) {
        let frame = match event {
            ServerEvent::Frame(frame) => frame,
            _ => return,
        };
        match frame {
            ServerFrame::NewMessage {
                conversation_id,
                message_id,
                sender_id,
                body,
                sent_at,
                session,
            } if *conversation_id == self.conversation_id => {
                // 자기 발신 에코 억제: 세션 식별자 또는 메시지 id 일치
                if *session == Some(self.realtime.session_id()) {
                    return;
                }
                if let Some(id) = message_id {
                    if self.messages.iter().any(|m| m.message_id == *id) {
                        return;
                    }
                }
                self.messages.push(ChatMessage {
                    message_id: message_id.unwrap_or_else(Uuid::new_v4),
                    sender_id: *sender_id,
                    body: body.clone(),
                    sent_at: *sent_at,
                });
            }
            ServerFrame::Typing {
                conversation_id,
                user_id,
            } if *conversation_id == self.conversation_id && *user_id == self.peer_id => {
                self.peer_typing_until = Some(Utc::now() + Duration::milliseconds(TYPING_TTL_MS));
            }
            _ => {}
        }
    }
}
// endregion: --- Chat View

// region:    --- Presence Poller
/// 접속 상태 폴러
/// 뷰가 드롭되면 태스크도 중단된다. 상대를 바꿀 때는 새 폴러를
/// 시작하고 이전 폴러를 드롭한다. 서버가 돌려준 user_id가
/// 폴링 대상과 다르면 (이전 상대의 늦은 응답) 버린다.
pub struct PresencePoller {
    rx: watch::Receiver<Option<Presence>>,
    handle: JoinHandle<()>,
}

impl PresencePoller {
    /// 폴링 주기
    pub const INTERVAL: std::time::Duration = std::time::Duration::from_secs(8);

    /// 폴링 시작
    pub fn start(api: ApiClient, user_id: i64) -> Self {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Self::INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match api.fetch_presence(user_id).await {
                    Ok(presence) if presence.user_id == user_id => {
                        if tx.send(Some(presence)).is_err() {
                            break;
                        }
                    }
                    Ok(stale) => {
                        warn!(
                            "{:<12} --> 대상이 다른 접속 상태 응답 폐기: {}",
                            "Chat", stale.user_id
                        );
                    }
                    Err(e) => {
                        warn!("{:<12} --> 접속 상태 조회 실패: {:?}", "Chat", e);
                    }
                }
            }
        });
        Self { rx, handle }
    }

    /// 접속 상태 구독
    pub fn subscribe(&self) -> watch::Receiver<Option<Presence>> {
        self.rx.clone()
    }
}

impl Drop for PresencePoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
// endregion: --- Presence Poller

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    const ME: i64 = 7;
    const PEER: i64 = 9;

    fn chat() -> ChatView {
        let session = SessionStore::in_memory();
        session
            .login(Session {
                token: "tok".to_string(),
                role: "buyer".to_string(),
                user_id: ME,
            })
            .unwrap();
        let realtime = RealtimeManager::connect("ws://127.0.0.1:9", session.clone());
        ChatView::open(realtime, session, 42, PEER)
    }

    fn incoming(message_id: Option<Uuid>, sender_id: i64, body: &str) -> ServerEvent {
        ServerEvent::Frame(ServerFrame::NewMessage {
            conversation_id: 42,
            message_id,
            sender_id,
            body: body.to_string(),
            sent_at: Utc::now(),
            session: None,
        })
    }

    #[tokio::test]
    async fn own_echo_is_deduplicated_by_message_id() {
        let mut c = chat();
        let id = c.send_message("hello").unwrap();
        assert_eq!(c.messages().len(), 1);

        c.apply_event(&incoming(Some(id), ME, "hello"));
        assert_eq!(c.messages().len(), 1);
    }

    #[tokio::test]
    async fn peer_message_appends() {
        let mut c = chat();
        c.apply_event(&incoming(Some(Uuid::new_v4()), PEER, "hi there"));
        assert_eq!(c.messages().len(), 1);
        assert_eq!(c.messages()[0].sender_id, PEER);
    }

    #[tokio::test]
    async fn other_conversations_are_ignored() {
        let mut c = chat();
        c.apply_event(&ServerEvent::Frame(ServerFrame::NewMessage {
            conversation_id: 99,
            message_id: Some(Uuid::new_v4()),
            sender_id: PEER,
            body: "wrong room".to_string(),
            sent_at: Utc::now(),
            session: None,
        }));
        assert!(c.messages().is_empty());
    }

    #[tokio::test]
    async fn typing_flag_expires() {
        let mut c = chat();
        let now = Utc::now();
        assert!(!c.peer_typing(now));

        c.apply_event(&ServerEvent::Frame(ServerFrame::Typing {
            conversation_id: 42,
            user_id: PEER,
        }));
        assert!(c.peer_typing(Utc::now()));
        assert!(!c.peer_typing(Utc::now() + Duration::seconds(5)));
    }

    #[tokio::test]
    async fn typing_from_self_is_ignored() {
        let mut c = chat();
        c.apply_event(&ServerEvent::Frame(ServerFrame::Typing {
            conversation_id: 42,
            user_id: ME,
        }));
        assert!(!c.peer_typing(Utc::now()));
    }
}
// endregion: --- Tests
