//! HTTP 客户端封装
//!
//! 统一认证头与响应策略：401 触发全局登出，422 把字段级校验信息
//! 展开为可读文本，404 归一为"资源未找到"。传输层错误一律转换为
//! `MarrowError::Network`，不向上层抛原始 reqwest 错误。

use std::sync::Arc;

use marrow_core::{MarrowError, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::session::Session;

/// 类型化 API 客户端
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<Session>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| MarrowError::Config(e.to_string()))?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// 构造请求，当前会话有令牌时附加 Bearer 认证头
    pub(crate) async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match self.session.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 发送请求并套用统一响应策略
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(into_network_error)?;
        self.check_response(response).await
    }

    async fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.session.handle_unauthorized().await;
            return Err(MarrowError::Unauthorized("请重新登录".to_string()));
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(MarrowError::Validation(flatten_validation_detail(&body)));
        }
        if status == StatusCode::NOT_FOUND {
            let detail = read_detail(response).await;
            return Err(MarrowError::NotFound(
                detail.unwrap_or_else(|| "资源不存在".to_string()),
            ));
        }
        if !status.is_success() {
            let detail = read_detail(response).await;
            return Err(MarrowError::Internal(
                detail.unwrap_or_else(|| format!("请求失败 ({})", status)),
            ));
        }
        Ok(response)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let builder = self.request(Method::GET, path).await;
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }
}

pub(crate) fn into_network_error(err: reqwest::Error) -> MarrowError {
    MarrowError::Network(err.to_string())
}

/// 从错误响应体里提取 detail / message 字段
async fn read_detail(response: Response) -> Option<String> {
    let body = response.text().await.ok()?;
    detail_message(&body)
}

pub(crate) fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map(str::to_string)
}

/// 展开 422 响应的 detail 数组为 `字段路径: 信息` 列表
///
/// detail 也可能是普通字符串；两种形式都解析不出来时退回原始文本。
pub(crate) fn flatten_validation_detail(body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            "请求数据不合法".to_string()
        } else {
            body.trim().to_string()
        }
    };

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return fallback(),
    };

    match value.get("detail") {
        Some(Value::Array(items)) => {
            let flattened: Vec<String> = items
                .iter()
                .map(|item| {
                    let loc = item
                        .get("loc")
                        .and_then(Value::as_array)
                        .map(|parts| {
                            parts
                                .iter()
                                .map(|p| match p {
                                    Value::String(s) => s.clone(),
                                    other => other.to_string(),
                                })
                                .collect::<Vec<_>>()
                                .join(".")
                        })
                        .unwrap_or_default();
                    let msg = item
                        .get("msg")
                        .and_then(Value::as_str)
                        .unwrap_or("invalid value");
                    if loc.is_empty() {
                        msg.to_string()
                    } else {
                        format!("{}: {}", loc, msg)
                    }
                })
                .collect();
            flattened.join(", ")
        }
        Some(Value::String(detail)) => detail.clone(),
        _ => fallback(),
    }
}
