//! 剪贴板监听
//!
//! `clipboard-master` 在独立线程里阻塞运行，每次变化通过 tokio 无界通道通知异步侧；
//! 异步侧按最小间隔合并短时间内的连续变化，再触发一次粘贴处理。

use std::thread;
use std::time::{Duration, Instant};

use clipboard_master::{CallbackResult, ClipboardHandler, Master};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

pub const CLIPBOARD_EVENT_MIN_INTERVAL_DEFAULT_MS: u64 = 300;
const CLIPBOARD_EVENT_MIN_INTERVAL_MIN_MS: u64 = 20;
const CLIPBOARD_EVENT_MIN_INTERVAL_MAX_MS: u64 = 5_000;
const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;

/// 剪贴板发生了一次变化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardChanged;

pub fn normalize_event_min_interval_ms(value_ms: u64) -> u64 {
    value_ms.clamp(
        CLIPBOARD_EVENT_MIN_INTERVAL_MIN_MS,
        CLIPBOARD_EVENT_MIN_INTERVAL_MAX_MS,
    )
}

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

fn debounce_remaining(elapsed: Duration, min_interval: Duration) -> Option<Duration> {
    if elapsed >= min_interval {
        None
    } else {
        Some(min_interval - elapsed)
    }
}

/// 剪贴板事件处理器（内部实现）
struct Handler {
    sender: UnboundedSender<ClipboardChanged>,
}

impl ClipboardHandler for Handler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if self.sender.send(ClipboardChanged).is_err() {
            log::debug!("📋 接收端已关闭，停止监听");
            return CallbackResult::Stop;
        }
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: std::io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

/// 在后台线程启动剪贴板监听，返回变化通知的接收端。
///
/// 监听器异常退出后按指数退避重启；接收端被丢弃后线程自行结束。
pub fn start_monitoring() -> UnboundedReceiver<ClipboardChanged> {
    let (sender, receiver) = unbounded_channel();

    thread::spawn(move || {
        let mut restart_attempt: u32 = 0;
        loop {
            match Master::new(Handler {
                sender: sender.clone(),
            }) {
                Ok(mut master) => {
                    restart_attempt = 0;
                    log::info!("📋 剪贴板监听已启动");
                    let _ = master.run();
                    if sender.is_closed() {
                        log::info!("📋 剪贴板监听已停止");
                        return;
                    }
                    log::warn!("📋 剪贴板监听已退出，将尝试重启");
                }
                Err(err) => {
                    log::error!("📋 创建剪贴板监听失败: {}", err);
                }
            }

            if sender.is_closed() {
                return;
            }
            restart_attempt = restart_attempt.saturating_add(1);
            let backoff_ms = compute_restart_backoff_ms(restart_attempt);
            log::warn!("📋 剪贴板监听 {}ms 后重试（attempt={}）", backoff_ms, restart_attempt);
            thread::sleep(Duration::from_millis(backoff_ms));
        }
    });

    receiver
}

/// 合并短时间内的连续变化。
pub struct ChangeDebouncer {
    receiver: UnboundedReceiver<ClipboardChanged>,
    min_interval: Duration,
    last_emit_at: Option<Instant>,
}

impl ChangeDebouncer {
    pub fn new(receiver: UnboundedReceiver<ClipboardChanged>, min_interval_ms: u64) -> Self {
        Self {
            receiver,
            min_interval: Duration::from_millis(normalize_event_min_interval_ms(min_interval_ms)),
            last_emit_at: None,
        }
    }

    /// 等待下一次（合并后的）变化；发送端全部关闭时返回 `None`。
    pub async fn next(&mut self) -> Option<ClipboardChanged> {
        let first = self.receiver.recv().await?;

        let elapsed = self
            .last_emit_at
            .map(|last| last.elapsed())
            .unwrap_or(self.min_interval);
        if let Some(remaining) = debounce_remaining(elapsed, self.min_interval) {
            log::trace!("⏱️ 剪贴板变化事件节流：等待 {}ms", remaining.as_millis());
            tokio::time::sleep(remaining).await;
        }

        let mut coalesced = 0usize;
        while self.receiver.try_recv().is_ok() {
            coalesced += 1;
        }
        if coalesced > 0 {
            log::trace!("⏱️ 合并了 {} 次连续变化", coalesced);
        }

        self.last_emit_at = Some(Instant::now());
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_event_min_interval_clamps_bounds() {
        assert_eq!(normalize_event_min_interval_ms(5), 20);
        assert_eq!(normalize_event_min_interval_ms(80), 80);
        assert_eq!(normalize_event_min_interval_ms(6_000), 5_000);
    }

    #[test]
    fn debounce_remaining_returns_expected_values() {
        let min = Duration::from_millis(80);
        assert_eq!(debounce_remaining(Duration::from_millis(20), min), Some(Duration::from_millis(60)));
        assert_eq!(debounce_remaining(Duration::from_millis(80), min), None);
        assert_eq!(debounce_remaining(Duration::from_millis(120), min), None);
    }

    #[test]
    fn restart_backoff_grows_then_caps() {
        assert_eq!(compute_restart_backoff_ms(1), 100);
        assert_eq!(compute_restart_backoff_ms(2), 200);
        assert_eq!(compute_restart_backoff_ms(3), 400);
        assert_eq!(compute_restart_backoff_ms(7), 5_000);
        assert_eq!(compute_restart_backoff_ms(20), 5_000);
    }

    #[tokio::test]
    async fn debouncer_coalesces_bursts() {
        let (sender, receiver) = unbounded_channel();
        let mut debouncer = ChangeDebouncer::new(receiver, 20);

        for _ in 0..5 {
            sender.send(ClipboardChanged).unwrap();
        }
        assert_eq!(debouncer.next().await, Some(ClipboardChanged));

        // 突发中的其余通知已被合并
        drop(sender);
        assert_eq!(debouncer.next().await, None);
    }

    #[tokio::test]
    async fn debouncer_waits_min_interval_between_emits() {
        let (sender, receiver) = unbounded_channel();
        let mut debouncer = ChangeDebouncer::new(receiver, 50);

        sender.send(ClipboardChanged).unwrap();
        debouncer.next().await.unwrap();

        let start = Instant::now();
        sender.send(ClipboardChanged).unwrap();
        debouncer.next().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
