/// 실시간 채널 연결 관리자
/// 프로세스 전역 웹소켓 연결 하나를 모든 뷰가 읽기 전용으로 공유한다.
/// 뷰는 방 가드(RoomGuard)로 필요한 방을 선언하고, 관리자는
/// 참조 카운트로 join/leave를 정확히 한 번씩만 송신한다.
/// 재연결 시 registerUser와 살아있는 방 재가입을 수행하고
/// Reconnected 이벤트를 발행해 뷰가 권위 상태를 다시 조회하게 한다.
// region:    --- Imports
mod protocol;

pub use protocol::{ClientFrame, ServerFrame};

use crate::session::SessionStore;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};
use uuid::Uuid;

// endregion: --- Imports

// region:    --- Events
/// 구독자에게 전달되는 채널 이벤트
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// 최초 연결 성립
    Connected,
    /// 재연결 성립 (뷰는 놓친 이벤트 복구를 위해 전체 상태를 다시 조회)
    Reconnected,
    /// 서버 푸시 프레임
    Frame(ServerFrame),
}
// endregion: --- Events

// region:    --- Manager
type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

struct Shared {
    session_id: Uuid,
    session: SessionStore,
    events: broadcast::Sender<ServerEvent>,
    /// 방 이름 → 가드 참조 수
    rooms: Mutex<HashMap<String, usize>>,
}

/// 실시간 채널 연결 관리자
#[derive(Clone)]
pub struct RealtimeManager {
    shared: Arc<Shared>,
    out_tx: mpsc::UnboundedSender<ClientFrame>,
}

impl RealtimeManager {
    /// 연결 시작. 관리자(및 모든 가드)가 드롭되면 연결 태스크도 종료된다.
    pub fn connect(ws_url: impl Into<String>, session: SessionStore) -> Self {
        let (events, _) = broadcast::channel(256);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            session_id: Uuid::new_v4(),
            session,
            events,
            rooms: Mutex::new(HashMap::new()),
        });
        tokio::spawn(run_loop(ws_url.into(), out_rx, Arc::clone(&shared)));
        Self { shared, out_tx }
    }

    /// 자기 발신 에코 억제에 쓰이는 세션 식별자
    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    /// 채널 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.shared.events.subscribe()
    }

    /// 프레임 송신 (연결이 끊겨 있으면 큐에 남았다가 재연결 후 송신)
    pub fn emit(&self, frame: ClientFrame) {
        if self.out_tx.send(frame).is_err() {
            warn!("{:<12} --> 연결 태스크 종료 후 송신 시도", "Realtime");
        }
    }

    /// 방 가입 선언. 같은 방의 첫 가드에서만 join이 송신되고
    /// 마지막 가드가 드롭될 때 leave가 송신된다.
    pub fn join_room(&self, room: &str) -> RoomGuard {
        let mut first = false;
        if let Ok(mut rooms) = self.shared.rooms.lock() {
            let count = rooms.entry(room.to_string()).or_insert(0);
            *count += 1;
            first = *count == 1;
        }
        if first {
            info!("{:<12} --> 방 가입: {}", "Realtime", room);
            self.emit(ClientFrame::Join {
                room: room.to_string(),
            });
        }
        RoomGuard {
            shared: Arc::clone(&self.shared),
            out_tx: self.out_tx.clone(),
            room: room.to_string(),
        }
    }
}

/// 방 멤버십 가드
pub struct RoomGuard {
    shared: Arc<Shared>,
    out_tx: mpsc::UnboundedSender<ClientFrame>,
    room: String,
}

impl RoomGuard {
    pub fn room(&self) -> &str {
        &self.room
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        let mut last = false;
        if let Ok(mut rooms) = self.shared.rooms.lock() {
            if let Some(count) = rooms.get_mut(&self.room) {
                *count -= 1;
                if *count == 0 {
                    rooms.remove(&self.room);
                    last = true;
                }
            }
        }
        if last {
            info!("{:<12} --> 방 탈퇴: {}", "Realtime", self.room);
            let _ = self.out_tx.send(ClientFrame::Leave {
                room: self.room.clone(),
            });
        }
    }
}
// endregion: --- Manager

// region:    --- Connection Task
/// 연결 유지 루프: 끊기면 1초 후 재연결, 재연결 시 핸드셰이크 반복
async fn run_loop(
    url: String,
    mut out_rx: mpsc::UnboundedReceiver<ClientFrame>,
    shared: Arc<Shared>,
) {
    let mut first = true;
    loop {
        match connect_async(&url).await {
            Ok((ws, _)) => {
                info!("{:<12} --> 채널 연결 성립: {}", "Realtime", url);
                let (mut write, mut read) = ws.split();

                if handshake(&mut write, &shared).await.is_ok() {
                    let event = if first {
                        ServerEvent::Connected
                    } else {
                        ServerEvent::Reconnected
                    };
                    let _ = shared.events.send(event);

                    loop {
                        tokio::select! {
                            outgoing = out_rx.recv() => {
                                match outgoing {
                                    Some(frame) => {
                                        if send_frame(&mut write, &frame).await.is_err() {
                                            break;
                                        }
                                    }
                                    // 관리자와 모든 가드가 드롭됨
                                    None => {
                                        info!("{:<12} --> 연결 관리자 종료", "Realtime");
                                        let _ = write.close().await;
                                        return;
                                    }
                                }
                            }
                            incoming = read.next() => {
                                match incoming {
                                    Some(Ok(Message::Text(raw))) => {
                                        match serde_json::from_str::<ServerFrame>(raw.as_str()) {
                                            Ok(frame) => {
                                                let _ = shared.events.send(ServerEvent::Frame(frame));
                                            }
                                            Err(e) => warn!(
                                                "{:<12} --> 알 수 없는 프레임 무시: {:?}",
                                                "Realtime", e
                                            ),
                                        }
                                    }
                                    Some(Ok(Message::Close(_))) | None => break,
                                    Some(Ok(_)) => {} // ping/pong/binary 무시
                                    Some(Err(e)) => {
                                        warn!("{:<12} --> 수신 오류: {:?}", "Realtime", e);
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                warn!("{:<12} --> 채널 연결 끊김, 재연결 대기", "Realtime");
            }
            Err(e) => {
                warn!("{:<12} --> 채널 연결 실패: {:?}", "Realtime", e);
            }
        }
        // 관리자와 모든 가드가 드롭되면 재접속 시도도 중단
        if out_rx.is_closed() {
            info!("{:<12} --> 연결 관리자 종료", "Realtime");
            return;
        }
        first = false;
        sleep(Duration::from_secs(1)).await;
    }
}

/// 연결 직후 핸드셰이크: 사용자 등록 + 살아있는 방 재가입
async fn handshake(write: &mut WsSink, shared: &Shared) -> Result<(), ()> {
    let mut greetings: Vec<ClientFrame> = Vec::new();
    if let Some(session) = shared.session.current() {
        greetings.push(ClientFrame::RegisterUser {
            user_id: session.user_id,
            session: shared.session_id,
        });
    }
    if let Ok(rooms) = shared.rooms.lock() {
        for room in rooms.keys() {
            greetings.push(ClientFrame::Join { room: room.clone() });
        }
    }
    for frame in greetings {
        send_frame(write, &frame).await?;
    }
    Ok(())
}

async fn send_frame(write: &mut WsSink, frame: &ClientFrame) -> Result<(), ()> {
    let raw = match serde_json::to_string(frame) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("{:<12} --> 프레임 직렬화 실패: {:?}", "Realtime", e);
            return Err(());
        }
    };
    write.send(Message::text(raw)).await.map_err(|e| {
        warn!("{:<12} --> 송신 실패: {:?}", "Realtime", e);
    })
}
// endregion: --- Connection Task
