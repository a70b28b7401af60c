// region:    --- Imports
use auction_live_client::api::ApiClient;
use auction_live_client::bidding::AuctionView;
use auction_live_client::error::ClientError;
use auction_live_client::realtime::RealtimeManager;
use auction_live_client::session::SessionStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 대상 경매 id (첫 번째 인자)
    let auction_id: i64 = std::env::args()
        .nth(1)
        .ok_or("usage: auction-live-client <auction-id>")?
        .parse()?;

    let api_url =
        std::env::var("AUCTION_API_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let ws_url =
        std::env::var("AUCTION_WS_URL").unwrap_or_else(|_| "ws://localhost:5001/ws".to_string());
    let session_file =
        std::env::var("AUCTION_SESSION_FILE").unwrap_or_else(|_| "session.json".to_string());

    // 세션 복원 및 API 클라이언트 생성
    let session = SessionStore::load(session_file.into());
    if session.current().is_none() {
        warn!("{:<12} --> 저장된 세션 없음, 조회 전용 모드", "Main");
    }
    let api = ApiClient::new(api_url, session.clone());

    // 전역 설정은 시작 시 한 번 조회
    let settings = Arc::new(match api.fetch_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{:<12} --> 설정 조회 실패, 기본값 사용: {:?}", "Main", e);
            Default::default()
        }
    });
    if settings.maintenance_mode {
        warn!("{:<12} --> 점검 모드: 모든 변경 요청 차단됨", "Main");
    }

    // 실시간 채널 연결 및 경매 뷰 열기
    let realtime = RealtimeManager::connect(ws_url, session.clone());
    let view = Arc::new(Mutex::new(
        AuctionView::open(api.clone(), realtime.clone(), Arc::clone(&settings), auction_id).await?,
    ));

    // 카운트다운 출력 태스크
    let countdown = view.lock().await.countdown();
    let mut frames = countdown.subscribe();
    let ticker = tokio::spawn(async move {
        loop {
            let frame = frames.borrow_and_update().clone();
            info!(
                "{:<12} --> {}{}",
                "Countdown",
                frame.text,
                if frame.urgent { " (!)" } else { "" }
            );
            if frame.ended || frames.changed().await.is_err() {
                break;
            }
        }
    });

    // 채널 이벤트 반영 태스크
    let pump_view = Arc::clone(&view);
    let mut events = realtime.subscribe();
    let pump = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let mut v = pump_view.lock().await;
                    if let Err(e) = v.apply_event(&event).await {
                        warn!("{:<12} --> 이벤트 반영 실패: {:?}", "Main", e);
                    }
                    for notice in v.take_notices() {
                        info!("{:<12} --> {}", "Notice", notice);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{:<12} --> 이벤트 {}건 유실, 계속", "Main", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // 명령 루프
    info!(
        "{:<12} --> 명령: bid <amount> | max <amount> | raise | buy | alerts | quit",
        "Main"
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        match parts.as_slice() {
            ["bid", amount] => match amount.parse::<i64>() {
                Ok(amount) => report("입찰", view.lock().await.place_bid(amount).await),
                Err(_) => error!("{:<12} --> 금액이 올바르지 않습니다", "Main"),
            },
            ["max", amount] => match amount.parse::<i64>() {
                Ok(amount) => report("상한 설정", view.lock().await.set_max_bid(amount).await),
                Err(_) => error!("{:<12} --> 금액이 올바르지 않습니다", "Main"),
            },
            ["raise"] => match view.lock().await.raise_by_increment().await {
                Ok(next) => info!("{:<12} --> 인상 성공: {}", "Main", next),
                Err(e) => error!("{:<12} --> 인상 실패: {}", "Main", e),
            },
            ["buy"] => report("즉시 구매", view.lock().await.buy_now().await),
            ["alerts"] => match api.fetch_notifications().await {
                Ok(alerts) => {
                    for alert in alerts {
                        info!(
                            "{:<12} --> [{:?}] {}",
                            "Alerts",
                            alert.resolved_kind(),
                            alert.message
                        );
                    }
                }
                Err(e) => error!("{:<12} --> 알림 조회 실패: {}", "Main", e),
            },
            ["quit"] => break,
            [] => {
                let v = view.lock().await;
                info!(
                    "{:<12} --> 현재가: {} 최소 다음 입찰: {}",
                    "Main",
                    v.current_price(),
                    v.minimum_next_bid()
                );
            }
            _ => info!(
                "{:<12} --> 알 수 없는 명령. bid <amount> | max <amount> | raise | buy | alerts | quit",
                "Main"
            ),
        }
    }

    ticker.abort();
    pump.abort();
    Ok(())
}

/// 명령 결과 출력
fn report(action: &str, result: Result<(), ClientError>) {
    match result {
        Ok(()) => info!("{:<12} --> {} 성공", "Main", action),
        Err(e) => error!("{:<12} --> {} 실패: {}", "Main", action, e),
    }
}
// endregion: --- Main
