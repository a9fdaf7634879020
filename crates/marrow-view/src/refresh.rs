//! 跨视图防抖刷新
//!
//! 上传完成、导入完成、样本变更等事件都会触发刷新；用取消重排的
//! 定时器模式把一阵事件合并成一次请求。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use marrow_client::Session;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

/// 默认防抖间隔
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(500);

/// 可被刷新的目标
#[async_trait]
pub trait Refreshable: Send + Sync {
    async fn refresh(&self);
}

/// 订阅事件总线并防抖触发刷新
///
/// 返回监听任务的句柄，停止监听时 abort 即可；尚未到期的刷新会
/// 一并取消。
pub fn spawn_refresh_listener(
    session: &Session,
    target: Arc<dyn Refreshable>,
    delay: Duration,
) -> JoinHandle<()> {
    let mut rx = session.subscribe();
    tokio::spawn(async move {
        let mut pending: Option<JoinHandle<()>> = None;
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    debug!("refresh trigger: {:?}", envelope.event);
                    // 取消未到期的刷新，重新计时
                    if let Some(handle) = pending.take() {
                        handle.abort();
                    }
                    let target = target.clone();
                    pending = Some(tokio::spawn(async move {
                        sleep(delay).await;
                        target.refresh().await;
                    }));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("refresh listener lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_client::DataEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Refreshable for Counter {
        async fn refresh(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn event(n: usize) -> DataEvent {
        DataEvent::SampleChanged {
            sample_number: format!("S{:03}", n),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_events_collapses_into_one_refresh() {
        let session = Session::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let listener =
            spawn_refresh_listener(&session, counter.clone(), Duration::from_millis(500));

        for n in 0..5 {
            session.publish(event(n));
        }
        // 放到防抖窗口之后
        sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        listener.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_refresh_separately() {
        let session = Session::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let listener =
            spawn_refresh_listener(&session, counter.clone(), Duration::from_millis(500));

        session.publish(event(1));
        sleep(Duration::from_secs(2)).await;
        session.publish(event(2));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        listener.abort();
    }
}
