//! 样本（涂片）接口
//!
//! 后端以样本编号作为路径参数，不是数据库 id。

use marrow_core::{MarrowError, Result, Smear, SmearPage, SmearUpdate};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::http::{into_network_error, ApiClient};

/// 样本列表查询条件，未设置的字段不出现在查询串里
#[derive(Debug, Clone, Default)]
pub struct SmearFilters {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sample_number: Option<String>,
    pub patient_name: Option<String>,
    pub hospitalization_number: Option<String>,
    pub patient_age: Option<u32>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub inspection_doctor_name: Option<String>,
}

impl SmearFilters {
    /// 仅分页条件
    pub fn page(skip: u64, limit: u64) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(skip) = self.skip {
            query.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(v) = &self.sample_number {
            query.push(("sample_number", v.clone()));
        }
        // 患者姓名走后端的通用搜索参数
        if let Some(v) = &self.patient_name {
            query.push(("search", v.clone()));
        }
        if let Some(v) = &self.hospitalization_number {
            query.push(("hospitalization_number", v.clone()));
        }
        if let Some(age) = self.patient_age {
            query.push(("patient_age", age.to_string()));
        }
        if let Some(v) = &self.status {
            query.push(("status", v.clone()));
        }
        if let Some(v) = &self.start_date {
            query.push(("start_date", v.clone()));
        }
        if let Some(v) = &self.end_date {
            query.push(("end_date", v.clone()));
        }
        if let Some(v) = &self.inspection_doctor_name {
            query.push(("inspection_doctor_name", v.clone()));
        }
        query
    }
}

/// 样本创建载荷
#[derive(Debug, Clone, Serialize)]
pub struct SmearCreate {
    pub sample_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub sample_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ApiClient {
    /// 样本列表，兼容 `{items,total}` 与旧版纯数组两种响应
    pub async fn list_smears(&self, filters: &SmearFilters) -> Result<SmearPage> {
        let builder = self
            .request(Method::GET, "/api/smears")
            .await
            .query(&filters.to_query());
        let response = self.send(builder).await?;
        let body: Value = response.json().await.map_err(into_network_error)?;
        parse_smear_page(body)
    }

    pub async fn get_smear(&self, sample_number: &str) -> Result<Smear> {
        self.get_json(&smear_path(sample_number)).await
    }

    pub async fn create_smear(&self, smear: &SmearCreate) -> Result<Smear> {
        let builder = self.request(Method::POST, "/api/smears").await.json(smear);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    pub async fn update_smear(&self, sample_number: &str, update: &SmearUpdate) -> Result<Smear> {
        let builder = self
            .request(Method::PUT, &smear_path(sample_number))
            .await
            .json(update);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    pub async fn delete_smear(&self, sample_number: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &smear_path(sample_number)).await;
        self.send(builder).await?;
        Ok(())
    }
}

fn smear_path(sample_number: &str) -> String {
    format!("/api/smears/{}", urlencoding::encode(sample_number))
}

fn parse_smear_page(body: Value) -> Result<SmearPage> {
    if let Some(object) = body.as_object() {
        if object.contains_key("items") {
            let items: Vec<Smear> = object
                .get("items")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            let total = object
                .get("total")
                .and_then(Value::as_u64)
                .unwrap_or(items.len() as u64);
            return Ok(SmearPage { items, total });
        }
    }
    if body.is_array() {
        let items: Vec<Smear> = serde_json::from_value(body)?;
        let total = items.len() as u64;
        return Ok(SmearPage { items, total });
    }
    Err(MarrowError::MalformedResponse(
        "样本列表格式不正确".to_string(),
    ))
}
