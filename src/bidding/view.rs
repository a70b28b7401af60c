/// 경매 상세 뷰 모델
/// 1. 낙관적 입찰 (Idle → Submitting → Committed | RolledBack)
/// 2. 실시간 에코와 낙관적 행의 병합/중복 제거
/// 3. 대리 입찰 상한과 추월(outbid) 감지
/// 서버가 모든 불변식을 소유하며, 실패한 낙관적 갱신은
/// 부분 패치 없이 전체 재조회로 되돌린다.
// region:    --- Imports
use crate::api::ApiClient;
use crate::bidding::model::{Auction, AuctionStatus, Bid};
use crate::clock::ServerClock;
use crate::countdown::Countdown;
use crate::error::ClientError;
use crate::realtime::{ClientFrame, RealtimeManager, RoomGuard, ServerEvent, ServerFrame};
use crate::settings::Settings;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Pending Bids
/// 에코 허용 시간 오차 (구버전 프레임의 키 기반 중복 제거용)
const ECHO_TOLERANCE_MS: i64 = 2_000;

/// 실시간 에코 확인을 기다리는 낙관적 입찰
struct PendingBid {
    user_id: i64,
    amount: i64,
    placed_at: DateTime<Utc>,
}
// endregion: --- Pending Bids

// region:    --- Auction View
/// 경매 상세 뷰 모델
pub struct AuctionView {
    api: ApiClient,
    realtime: RealtimeManager,
    settings: Arc<Settings>,
    _room: RoomGuard,
    clock: ServerClock,
    auction: Auction,
    /// 카운트다운 구독자에게 전파되는 종료 시각 (소프트 클로즈 연장 반영)
    end_tx: watch::Sender<DateTime<Utc>>,
    bids: Vec<Bid>,
    my_bid: Option<Bid>,
    max_bid: Option<i64>,
    outbid: bool,
    busy: bool,
    ended_notified: bool,
    notices: Vec<String>,
    pending: Vec<PendingBid>,
}

impl AuctionView {
    /// 뷰 열기: 경매/입찰 이력/대리 입찰 상한 조회, 시계 오차 계산, 방 가입
    pub async fn open(
        api: ApiClient,
        realtime: RealtimeManager,
        settings: Arc<Settings>,
        auction_id: i64,
    ) -> Result<Self, ClientError> {
        let (auction, drift_ms) = api.fetch_auction(auction_id).await?;
        let bids = api.fetch_bids(auction_id).await?;
        let my_bid = api.fetch_my_bid(auction_id).await?;
        let max_bid = api.fetch_max_bid(auction_id).await?.map(|m| m.max_amount);
        let room = realtime.join_room(&format!("auction:{auction_id}"));
        info!(
            "{:<12} --> 뷰 열림 id: {} 현재가: {} 오차: {}ms",
            "AuctionView", auction_id, auction.current_price, drift_ms
        );
        let (end_tx, _) = watch::channel(auction.end_time);
        Ok(Self {
            api,
            realtime,
            settings,
            _room: room,
            clock: ServerClock::new(drift_ms),
            auction,
            end_tx,
            bids,
            my_bid,
            max_bid,
            outbid: false,
            busy: false,
            ended_notified: false,
            notices: Vec::new(),
            pending: Vec::new(),
        })
    }

    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    /// 내 최근 입찰 (이력 강조 표시용)
    pub fn my_bid(&self) -> Option<&Bid> {
        self.my_bid.as_ref()
    }

    pub fn current_price(&self) -> i64 {
        self.auction.current_price
    }

    pub fn max_bid(&self) -> Option<i64> {
        self.max_bid
    }

    pub fn outbid(&self) -> bool {
        self.outbid
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// 입찰 입력 활성 여부 (종료/점검/진행 중 요청이면 비활성)
    pub fn can_bid(&self) -> bool {
        !self.settings.maintenance_mode && self.auction.accepts_bids() && !self.busy
    }

    /// 다음 입찰 최소 금액
    pub fn minimum_next_bid(&self) -> i64 {
        self.auction.current_price + self.settings.min_increment()
    }

    /// 쌓인 일회성 알림 수거 (토스트 표시용)
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// 이 경매의 카운트다운 타이머 시작
    /// 소프트 클로즈 연장으로 종료 시각이 바뀌면 실행 중인 타이머에도 반영된다
    pub fn countdown(&self) -> Countdown {
        Countdown::track(self.end_tx.subscribe(), self.clock.clone())
    }

    /// 종료 시각 변경을 실행 중인 카운트다운에 전파
    fn publish_end_time(&self) {
        let end = self.auction.end_time;
        if *self.end_tx.borrow() != end {
            self.end_tx.send_replace(end);
        }
    }

    /// 입찰 제출
    /// 로컬 검증을 통과하면 네트워크 응답 전에 가격과 이력을 먼저 갱신하고,
    /// 실패 시 전체 재조회로 되돌린다.
    pub async fn place_bid(&mut self, amount: i64) -> Result<(), ClientError> {
        let session = self
            .api
            .session()
            .current()
            .ok_or(ClientError::NotSignedIn)?;
        if self.settings.maintenance_mode {
            return Err(ClientError::Maintenance);
        }
        if !self.auction.accepts_bids() {
            return Err(ClientError::AuctionEnded);
        }
        if self.busy {
            return Err(ClientError::Busy);
        }
        let minimum = self.minimum_next_bid();
        if amount < minimum {
            // 권고성 사전 검증: 네트워크 요청을 내지 않는다
            return Err(ClientError::Validation(format!(
                "Minimum next bid is {} (increment {})",
                self.settings.format_amount(minimum),
                self.settings.format_amount(self.settings.min_increment())
            )));
        }

        // 낙관적 적용
        self.busy = true;
        let placed_at = self.clock.now();
        self.bids.insert(
            0,
            Bid {
                auction_id: self.auction.id,
                user_id: session.user_id,
                amount,
                bid_time: placed_at,
            },
        );
        self.auction.current_price = amount;
        self.pending.push(PendingBid {
            user_id: session.user_id,
            amount,
            placed_at,
        });

        match self.api.place_bid(self.auction.id, amount).await {
            Ok(ack) => {
                // 낙관적 상태 유지, 에코는 apply_event에서 중복 제거
                if let Some(new_end) = ack.new_end_time {
                    self.auction.end_time = new_end;
                    self.publish_end_time();
                }
                self.auction.current_price = self.auction.current_price.max(ack.current_price);
                self.my_bid = Some(Bid {
                    auction_id: self.auction.id,
                    user_id: session.user_id,
                    amount,
                    bid_time: placed_at,
                });
                self.realtime.emit(ClientFrame::NewBid {
                    auction_id: self.auction.id,
                    user_id: session.user_id,
                    amount,
                    session: self.realtime.session_id(),
                });
                self.busy = false;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "{:<12} --> 입찰 실패, 롤백 id: {} 금액: {}",
                    "AuctionView", self.auction.id, amount
                );
                self.pending
                    .retain(|p| !(p.user_id == session.user_id && p.amount == amount));
                if let Err(refetch_err) = self.refetch().await {
                    // 롤백 재조회 실패가 입력을 영구히 잠그면 안 된다
                    warn!(
                        "{:<12} --> 롤백 재조회 실패: {:?}",
                        "AuctionView", refetch_err
                    );
                }
                self.busy = false;
                Err(e)
            }
        }
    }

    /// 추월당한 뒤 원클릭 인상: 현재가 + 입찰 단위로 전체 제출 경로 재실행
    pub async fn raise_by_increment(&mut self) -> Result<i64, ClientError> {
        let next = self.minimum_next_bid();
        self.place_bid(next).await?;
        // 자신의 인상이 성공했을 때에만 해제
        self.outbid = false;
        Ok(next)
    }

    /// 대리 입찰 상한 설정/인상 (서버 저장, 로컬에는 표시용 값만)
    pub async fn set_max_bid(&mut self, max_amount: i64) -> Result<(), ClientError> {
        if self.api.session().current().is_none() {
            return Err(ClientError::NotSignedIn);
        }
        if max_amount <= self.auction.current_price {
            return Err(ClientError::Validation(format!(
                "Max bid must exceed the current price of {}",
                self.settings.format_amount(self.auction.current_price)
            )));
        }
        let stored = self.api.set_max_bid(self.auction.id, max_amount).await?;
        self.max_bid = Some(stored.max_amount);
        Ok(())
    }

    /// 즉시 구매
    pub async fn buy_now(&mut self) -> Result<(), ClientError> {
        if self.api.session().current().is_none() {
            return Err(ClientError::NotSignedIn);
        }
        if self.settings.maintenance_mode {
            return Err(ClientError::Maintenance);
        }
        if !self.auction.accepts_bids() {
            return Err(ClientError::AuctionEnded);
        }
        if self.busy {
            return Err(ClientError::Busy);
        }
        if self.auction.buy_now_price.is_none() {
            return Err(ClientError::Validation(
                "This auction has no buy-now price".to_string(),
            ));
        }
        self.busy = true;
        match self.api.buy_now(self.auction.id).await {
            Ok(auction) => {
                self.auction = auction;
                self.publish_end_time();
                self.busy = false;
                Ok(())
            }
            Err(e) => {
                if let Err(refetch_err) = self.refetch().await {
                    warn!(
                        "{:<12} --> 롤백 재조회 실패: {:?}",
                        "AuctionView", refetch_err
                    );
                }
                self.busy = false;
                Err(e)
            }
        }
    }

    /// 채널 이벤트 반영
    /// 재연결 시에는 놓친 이벤트 복구를 위해 권위 상태를 다시 조회한다.
    pub async fn apply_event(&mut self, event: &ServerEvent) -> Result<(), ClientError> {
        match event {
            ServerEvent::Connected => Ok(()),
            ServerEvent::Reconnected => self.refetch().await,
            ServerEvent::Frame(frame) => {
                self.apply_frame(frame);
                Ok(())
            }
        }
    }

    /// 서버 푸시 프레임 반영
    pub fn apply_frame(&mut self, frame: &ServerFrame) {
        match frame {
            ServerFrame::BidPlaced {
                auction_id,
                user_id,
                amount,
                bid_time,
                session,
                new_end_time,
            } if *auction_id == self.auction.id => {
                // 에코가 영영 오지 않은 낙관적 입찰 잔여물 정리
                let now = self.clock.now();
                self.pending
                    .retain(|p| (now - p.placed_at).num_milliseconds() <= ECHO_TOLERANCE_MS);
                // 소프트 클로즈 연장 미러링 (연장 자체는 서버 소유)
                if let Some(new_end) = new_end_time {
                    self.auction.end_time = *new_end;
                    self.publish_end_time();
                }
                // 현재가는 단조 비감소
                self.auction.current_price = self.auction.current_price.max(*amount);

                let pending_echo = self.consume_pending(*user_id, *amount, *bid_time);
                let self_echo = *session == Some(self.realtime.session_id());
                if self_echo || pending_echo {
                    // 자기 발신 에코: 행 추가 없이 낙관적 행을 권위 시각으로 확정
                    if let Some(t) = bid_time {
                        if let Some(row) = self
                            .bids
                            .iter_mut()
                            .find(|b| b.user_id == *user_id && b.amount == *amount)
                        {
                            row.bid_time = *t;
                        }
                    }
                } else if !self.is_duplicate_row(*user_id, *amount, *bid_time) {
                    let ts = bid_time.unwrap_or_else(|| self.clock.now());
                    self.bids.insert(
                        0,
                        Bid {
                            auction_id: *auction_id,
                            user_id: *user_id,
                            amount: *amount,
                            bid_time: ts,
                        },
                    );
                }

                // 추월 감지: 상한에 도달한 타인의 입찰, 플래그는 점착성
                let me = self.api.session().current().map(|s| s.user_id);
                if let (Some(me), Some(ceiling)) = (me, self.max_bid) {
                    if *user_id != me && *amount >= ceiling {
                        if !self.outbid {
                            self.notices.push("You have been outbid".to_string());
                        }
                        self.outbid = true;
                    }
                }
            }
            ServerFrame::AuctionEnded { auction_id } if *auction_id == self.auction.id => {
                // 새로고침 없이 입력 동결 + 일회성 알림
                // 종료된 경매에는 인상 유도가 남지 않도록 추월 플래그도 해제
                self.auction.status = AuctionStatus::Ended;
                self.outbid = false;
                if !self.ended_notified {
                    self.ended_notified = true;
                    self.notices.push("Auction has ended".to_string());
                }
            }
            _ => {}
        }
    }

    /// 전체 재조회 (롤백 및 재연결 복구 공용 경로)
    async fn refetch(&mut self) -> Result<(), ClientError> {
        let (auction, _) = self.api.fetch_auction(self.auction.id).await?;
        let bids = self.api.fetch_bids(self.auction.id).await?;
        let my_bid = self.api.fetch_my_bid(self.auction.id).await?;
        self.auction = auction;
        self.bids = bids;
        self.my_bid = my_bid;
        self.publish_end_time();
        Ok(())
    }

    /// 에코와 일치하는 낙관적 입찰 소비
    fn consume_pending(
        &mut self,
        user_id: i64,
        amount: i64,
        bid_time: Option<DateTime<Utc>>,
    ) -> bool {
        let found = self.pending.iter().position(|p| {
            p.user_id == user_id
                && p.amount == amount
                && match bid_time {
                    Some(t) => (t - p.placed_at).num_milliseconds().abs() <= ECHO_TOLERANCE_MS,
                    None => true,
                }
        });
        match found {
            Some(idx) => {
                self.pending.remove(idx);
                true
            }
            None => false,
        }
    }

    /// 키 기반 중복 판정 (사용자 + 금액 + 시각 오차)
    fn is_duplicate_row(&self, user_id: i64, amount: i64, bid_time: Option<DateTime<Utc>>) -> bool {
        self.bids.iter().any(|b| {
            b.user_id == user_id
                && b.amount == amount
                && match bid_time {
                    Some(t) => (t - b.bid_time).num_milliseconds().abs() <= ECHO_TOLERANCE_MS,
                    None => true,
                }
        })
    }
}
// endregion: --- Auction View

// endregion: --- Tests
