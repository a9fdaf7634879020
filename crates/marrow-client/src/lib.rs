//! # Marrow Client
//!
//! 后端 REST 接口的类型化客户端：配置加载、会话与数据变更事件总线、
//! 以及按资源划分的各接口封装。所有请求走 Bearer 认证，401 统一
//! 触发全局登出。

pub mod analysis;
pub mod cells;
pub mod checklists;
pub mod config;
pub mod http;
pub mod images;
pub mod patients;
pub mod session;
pub mod smears;
pub mod users;

pub use config::ClientConfig;
pub use http::ApiClient;
pub use session::{DataEvent, EventEnvelope, Session};
