/// 인증 세션 저장소
/// 로그인 시 생성, 로그아웃 시 파기, JSON 파일로 영속화.
/// 구독자는 watch 채널로 로그인/로그아웃 변화를 관찰한다.
// region:    --- Imports
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Session Model
/// 인증 세션 (모든 뷰의 유일한 신원 출처)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub role: String,
    pub user_id: i64,
}
// endregion: --- Session Model

// region:    --- Session Store
/// 세션 저장소
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    path: Option<PathBuf>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionStore {
    /// 메모리 전용 저장소 (테스트 및 일회성 세션)
    pub fn in_memory() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner { path: None, tx }),
        }
    }

    /// 파일 기반 저장소 생성, 기존 세션 파일이 있으면 복원
    pub fn load(path: PathBuf) -> Self {
        let restored = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    info!("{:<12} --> 세션 복원: user_id {}", "Session", session.user_id);
                    Some(session)
                }
                Err(e) => {
                    warn!("{:<12} --> 세션 파일 파싱 실패, 무시: {:?}", "Session", e);
                    None
                }
            },
            Err(_) => None,
        };
        let (tx, _) = watch::channel(restored);
        Self {
            inner: Arc::new(Inner {
                path: Some(path),
                tx,
            }),
        }
    }

    /// 현재 세션
    pub fn current(&self) -> Option<Session> {
        self.inner.tx.borrow().clone()
    }

    /// 세션 변화 구독
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.tx.subscribe()
    }

    /// 로그인: 세션 영속화 및 구독자 통지
    pub fn login(&self, session: Session) -> Result<(), ClientError> {
        if let Some(path) = &self.inner.path {
            let raw = serde_json::to_string(&session)?;
            std::fs::write(path, raw)?;
        }
        info!("{:<12} --> 로그인: user_id {}", "Session", session.user_id);
        self.inner.tx.send_replace(Some(session));
        Ok(())
    }

    /// 로그아웃: 세션 파기 및 구독자 통지
    pub fn logout(&self) -> Result<(), ClientError> {
        if let Some(path) = &self.inner.path {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        info!("{:<12} --> 로그아웃", "Session");
        self.inner.tx.send_replace(None);
        Ok(())
    }
}
// endregion: --- Session Store

// endregion: --- Tests
