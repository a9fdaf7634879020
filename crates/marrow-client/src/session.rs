//! 会话与数据变更事件总线
//!
//! 取代页面间自定义 DOM 事件的显式应用级状态：令牌存取、401 全局
//! 回调注册、以及"别处数据已变化"的类型化发布/订阅通道。

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// 数据变更事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    /// 图像上传完成
    ImagesUploaded {
        sample_number: String,
        file_count: usize,
    },
    /// 病人信息表格导入完成
    PatientsImported { created: u64, updated: u64 },
    /// 样本数据发生变化（编辑、删除、报告确认）
    SampleChanged { sample_number: String },
    /// 医生修改了细胞分类
    CellReclassified {
        sample_number: String,
        cell_number: String,
    },
}

/// 事件信封，带全局唯一 id 与时间戳
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event: DataEvent,
}

impl EventEnvelope {
    fn new(event: DataEvent) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}

type UnauthorizedHook = Box<dyn Fn() + Send + Sync>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 应用会话
pub struct Session {
    token: RwLock<Option<String>>,
    unauthorized_hooks: RwLock<Vec<UnauthorizedHook>>,
    events: broadcast::Sender<EventEnvelope>,
}

impl Session {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            token: RwLock::new(None),
            unauthorized_hooks: RwLock::new(Vec::new()),
            events,
        }
    }

    /// 当前令牌
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: String) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    pub async fn is_logged_in(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// 注册 401 回调，任何接口收到 401 时触发
    pub async fn on_unauthorized<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.unauthorized_hooks.write().await.push(Box::new(hook));
    }

    /// 401 统一处理：清除令牌并逐个触发回调
    pub async fn handle_unauthorized(&self) {
        info!("unauthorized response, clearing session token");
        self.clear_token().await;
        for hook in self.unauthorized_hooks.read().await.iter() {
            hook();
        }
    }

    /// 订阅数据变更事件
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    /// 发布数据变更事件，没有订阅者时静默丢弃
    pub fn publish(&self, event: DataEvent) {
        debug!("publishing data event: {:?}", event);
        let _ = self.events.send(EventEnvelope::new(event));
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn token_lifecycle() {
        let session = Session::new();
        assert!(!session.is_logged_in().await);
        session.set_token("tok".to_string()).await;
        assert_eq!(session.token().await.as_deref(), Some("tok"));
        session.clear_token().await;
        assert!(session.token().await.is_none());
    }

    #[tokio::test]
    async fn unauthorized_clears_token_and_fires_hooks() {
        let session = Session::new();
        session.set_token("tok".to_string()).await;

        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        session
            .on_unauthorized(move || flag.store(true, Ordering::SeqCst))
            .await;

        session.handle_unauthorized().await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(!session.is_logged_in().await);
    }

    #[tokio::test]
    async fn events_reach_subscribers() {
        let session = Session::new();
        let mut rx = session.subscribe();
        session.publish(DataEvent::ImagesUploaded {
            sample_number: "S001".to_string(),
            file_count: 3,
        });
        let envelope = rx.recv().await.unwrap();
        assert_eq!(
            envelope.event,
            DataEvent::ImagesUploaded {
                sample_number: "S001".to_string(),
                file_count: 3,
            }
        );
        assert!(!envelope.id.is_empty());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let session = Session::new();
        session.publish(DataEvent::SampleChanged {
            sample_number: "S001".to_string(),
        });
    }
}
