//! 用户与登录接口

use marrow_core::{LoginOutcome, LoginRequest, MarrowError, Result, UserInfo};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{detail_message, flatten_validation_detail, into_network_error, ApiClient};

impl ApiClient {
    /// 登录并把令牌存入会话
    ///
    /// 登录接口的 401 表示凭证错误，不走全局登出流程。响应里的令牌
    /// 字段兼容 `access_token` 与 `token` 两种命名。
    pub async fn login(&self, doctor_number: &str, password: &str) -> Result<LoginOutcome> {
        let request = LoginRequest {
            doctor_number: doctor_number.to_string(),
            password: password.to_string(),
        };
        let response = self
            .request(Method::POST, "/api/users/login")
            .await
            .json(&request)
            .send()
            .await
            .map_err(into_network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNPROCESSABLE_ENTITY {
                return Err(MarrowError::Validation(flatten_validation_detail(&body)));
            }
            return Err(MarrowError::Unauthorized(
                detail_message(&body).unwrap_or_else(|| format!("登录失败 ({})", status)),
            ));
        }

        let body: Value = response.json().await.map_err(into_network_error)?;
        let token = body
            .get("access_token")
            .and_then(Value::as_str)
            .or_else(|| body.get("token").and_then(Value::as_str))
            .ok_or_else(|| MarrowError::MalformedResponse("登录响应缺少令牌".to_string()))?
            .to_string();
        let user = body
            .get("user_info")
            .or_else(|| body.get("user"))
            .and_then(|v| serde_json::from_value::<UserInfo>(v.clone()).ok());

        self.session().set_token(token.clone()).await;
        info!("doctor {} logged in", doctor_number);
        Ok(LoginOutcome { token, user })
    }

    /// 当前登录用户信息
    pub async fn current_user(&self) -> Result<UserInfo> {
        self.get_json("/api/users/me").await
    }

    /// 登出：清除本地令牌
    pub async fn logout(&self) {
        self.session().clear_token().await;
        info!("logged out");
    }

    /// 用户列表（下拉选择用）
    ///
    /// 列表不可用时退化为空，不能因为它阻塞页面。
    pub async fn list_users(&self, role: Option<&str>) -> Vec<UserInfo> {
        let mut builder = self.request(Method::GET, "/api/users").await;
        if let Some(role) = role {
            builder = builder.query(&[("role", role)]);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("user list request failed: {}", err);
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            warn!(
                "user list unavailable ({}), returning empty",
                response.status()
            );
            return Vec::new();
        }

        match response.json().await {
            Ok(users) => users,
            Err(err) => {
                warn!("user list response malformed: {}", err);
                Vec::new()
            }
        }
    }
}
