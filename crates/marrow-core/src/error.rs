//! 错误定义模块

use thiserror::Error;

/// 工作站统一错误类型
#[derive(Error, Debug)]
pub enum MarrowError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("认证失败: {0}")]
    Unauthorized(String),

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("响应格式错误: {0}")]
    MalformedResponse(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 工作站统一结果类型
pub type Result<T> = std::result::Result<T, MarrowError>;
