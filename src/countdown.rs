/// 카운트다운 타이머
/// 종료 시각과 보정된 서버 시계로 1초마다 표시 프레임을 만든다.
/// 남은 시간이 1시간 미만이면 MM:SS, 60초 이하면 urgent,
/// 0 이하가 되는 순간 한 번만 "Ended"를 내보내고 틱을 멈춘다.
// region:    --- Imports
use crate::clock::ServerClock;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::debug;

// endregion: --- Imports

// region:    --- Frame
/// 카운트다운 표시 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownFrame {
    /// 표시 문자열 ("2h 05m 09s", "59:30", "Ended")
    pub text: String,
    /// 남은 초 (종료 후 0)
    pub remaining_secs: i64,
    /// 남은 시간 60초 이하
    pub urgent: bool,
    /// 종료 프레임 (정확히 한 번만 발생)
    pub ended: bool,
}

/// 현재 시점의 프레임 계산
pub fn frame_at(end_time: DateTime<Utc>, clock: &ServerClock) -> CountdownFrame {
    let diff_ms = (end_time - clock.now()).num_milliseconds();
    if diff_ms <= 0 {
        return CountdownFrame {
            text: "Ended".to_string(),
            remaining_secs: 0,
            urgent: false,
            ended: true,
        };
    }
    // 0.5초 남은 상태도 1초로 표시 (올림)
    let secs = (diff_ms + 999) / 1000;
    CountdownFrame {
        text: format_remaining(secs),
        remaining_secs: secs,
        urgent: secs <= 60,
        ended: false,
    }
}

/// 남은 초를 표시 문자열로 변환
/// 1시간 이상: "Hh Mm Ss", 1시간 미만: "MM:SS"
pub fn format_remaining(secs: i64) -> String {
    debug_assert!(secs > 0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
// endregion: --- Frame

// region:    --- Countdown Task
/// 카운트다운 타이머 태스크
/// 뷰가 드롭되거나 다른 경매로 전환하면 태스크도 함께 중단된다.
pub struct Countdown {
    rx: watch::Receiver<CountdownFrame>,
    handle: JoinHandle<()>,
    /// start()로 만든 고정 종료 시각의 송신측 소유권 유지
    _end_tx: Option<watch::Sender<DateTime<Utc>>>,
}

impl Countdown {
    /// 1초 주기 타이머 시작 (고정 종료 시각)
    pub fn start(end_time: DateTime<Utc>, clock: ServerClock) -> Self {
        let (end_tx, end_rx) = watch::channel(end_time);
        let mut countdown = Self::track(end_rx, clock);
        countdown._end_tx = Some(end_tx);
        countdown
    }

    /// 종료 시각 채널을 따라가는 타이머 시작
    /// 소프트 클로즈 연장으로 종료 시각이 바뀌면 즉시 다시 계산하고,
    /// 종료 프레임 이후에도 연장이 오면 타이머가 되살아난다.
    pub fn track(mut end_times: watch::Receiver<DateTime<Utc>>, clock: ServerClock) -> Self {
        let initial = frame_at(*end_times.borrow_and_update(), &clock);
        let (tx, rx) = watch::channel(initial);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 송신측(뷰)이 사라지면 마지막 종료 시각으로 계속 진행
            let mut detached = false;
            loop {
                let end_time = *end_times.borrow_and_update();
                let frame = frame_at(end_time, &clock);
                let ended = frame.ended;
                tx.send_if_modified(|current| {
                    if *current == frame {
                        false
                    } else {
                        *current = frame;
                        true
                    }
                });
                if ended {
                    // 종료 프레임은 단발성, 연장만이 틱을 되살린다
                    debug!("{:<12} --> 카운트다운 종료", "Countdown");
                    if detached || end_times.changed().await.is_err() {
                        break;
                    }
                    continue;
                }
                if detached {
                    ticker.tick().await;
                } else {
                    tokio::select! {
                        _ = ticker.tick() => {}
                        changed = end_times.changed() => {
                            if changed.is_err() {
                                detached = true;
                            }
                        }
                    }
                }
            }
        });
        Self {
            rx,
            handle,
            _end_tx: None,
        }
    }

    /// 프레임 구독
    pub fn subscribe(&self) -> watch::Receiver<CountdownFrame> {
        self.rx.clone()
    }

    /// 현재 프레임
    pub fn current(&self) -> CountdownFrame {
        self.rx.borrow().clone()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
// endregion: --- Countdown Task

// region:    --- Tests
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LocalClock;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// 호출할 때마다 지정한 보폭만큼 전진하는 시계
    struct SteppingClock {
        base: DateTime<Utc>,
        step_ms: i64,
        ticks: AtomicI64,
    }

    impl LocalClock for SteppingClock {
        fn local_now(&self) -> DateTime<Utc> {
            let n = self.ticks.fetch_add(1, Ordering::SeqCst);
            self.base + ChronoDuration::milliseconds(n * self.step_ms)
        }
    }

    fn fixed(base: DateTime<Utc>) -> ServerClock {
        ServerClock::with_local(
            0,
            Arc::new(SteppingClock {
                base,
                step_ms: 0,
                ticks: AtomicI64::new(0),
            }),
        )
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_remaining(2 * 3600 + 5 * 60 + 9), "2h 05m 09s");
        assert_eq!(format_remaining(3600), "1h 00m 00s");
        assert_eq!(format_remaining(3599), "59:59");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(1), "00:01");
    }

    #[test]
    fn urgent_at_sixty_seconds() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = fixed(base);

        let frame = frame_at(base + ChronoDuration::seconds(61), &clock);
        assert!(!frame.urgent);

        let frame = frame_at(base + ChronoDuration::seconds(60), &clock);
        assert!(frame.urgent);
        assert!(!frame.ended);
    }

    #[test]
    fn terminal_frame_at_zero() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = fixed(base);

        let frame = frame_at(base, &clock);
        assert!(frame.ended);
        assert_eq!(frame.text, "Ended");
        assert_eq!(frame.remaining_secs, 0);

        let frame = frame_at(base - ChronoDuration::seconds(5), &clock);
        assert!(frame.ended);
    }

    #[test]
    fn remaining_is_monotonically_non_increasing() {
        // 매 조회마다 1초씩 전진하는 로컬 시계로 연속 프레임 검증
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = base + ChronoDuration::seconds(5);
        let clock = ServerClock::with_local(
            0,
            Arc::new(SteppingClock {
                base,
                step_ms: 1000,
                ticks: AtomicI64::new(0),
            }),
        );

        let mut prev = i64::MAX;
        let mut terminal_count = 0;
        for _ in 0..10 {
            let frame = frame_at(end, &clock);
            assert!(frame.remaining_secs <= prev);
            prev = frame.remaining_secs;
            if frame.ended {
                terminal_count += 1;
            }
        }
        // 종료 이후에도 프레임 계산은 안정적으로 종료 상태만 반환
        assert!(terminal_count >= 1);
        assert_eq!(prev, 0);
    }

    #[test]
    fn drift_shifts_remaining_time() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let end = base + ChronoDuration::seconds(100);

        let no_drift = fixed(base);
        let ahead = ServerClock::with_local(
            40_000,
            Arc::new(SteppingClock {
                base,
                step_ms: 0,
                ticks: AtomicI64::new(0),
            }),
        );

        assert_eq!(frame_at(end, &no_drift).remaining_secs, 100);
        assert_eq!(frame_at(end, &ahead).remaining_secs, 60);
        assert!(frame_at(end, &ahead).urgent);
    }

    #[tokio::test]
    async fn tracked_end_time_extension_is_applied() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let (end_tx, end_rx) = watch::channel(base + ChronoDuration::seconds(5));
        let countdown = Countdown::track(end_rx, fixed(base));
        assert_eq!(countdown.current().remaining_secs, 5);

        // 소프트 클로즈 연장: 다음 계산부터 새 종료 시각 기준
        end_tx.send_replace(base + ChronoDuration::seconds(3600));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let frame = countdown.current();
        assert!(!frame.ended);
        assert_eq!(frame.remaining_secs, 3600);
    }

    #[tokio::test]
    async fn tracked_extension_revives_terminal_timer() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let (end_tx, end_rx) = watch::channel(base - ChronoDuration::seconds(1));
        let countdown = Countdown::track(end_rx, fixed(base));
        assert!(countdown.current().ended);

        end_tx.send_replace(base + ChronoDuration::seconds(10));
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let frame = countdown.current();
        assert!(!frame.ended);
        assert_eq!(frame.remaining_secs, 10);
    }

    #[tokio::test]
    async fn task_emits_single_terminal_frame_and_stops() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        // 이미 종료된 경매: 첫 프레임부터 종료 상태, 태스크는 첫 틱에 중단
        let countdown = Countdown::start(base - ChronoDuration::seconds(1), fixed(base));
        let mut rx = countdown.subscribe();
        assert!(rx.borrow().ended);

        // 태스크가 스스로 끝난 뒤에는 더 이상 변경이 없다
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(!rx.has_changed().unwrap_or(false) || rx.borrow_and_update().ended);
    }
}
// endregion: --- Tests
