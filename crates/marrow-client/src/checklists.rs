//! 检查单接口
//!
//! 检查单与样本一一对应，报告确认与导出都走这里。

use marrow_core::{Checklist, ChecklistPage, ChecklistUpdate, Result};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::http::{into_network_error, ApiClient};

/// 检查单列表查询条件
#[derive(Debug, Clone, Default)]
pub struct ChecklistFilters {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub patient_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub review_status: Option<String>,
}

impl ChecklistFilters {
    fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(skip) = self.skip {
            query.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(id) = self.patient_id {
            query.push(("patient_id", id.to_string()));
        }
        if let Some(id) = self.sample_id {
            query.push(("sample_id", id.to_string()));
        }
        if let Some(status) = &self.review_status {
            query.push(("review_status", status.clone()));
        }
        query
    }
}

/// 审核请求
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistReview {
    pub review_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
}

impl ApiClient {
    /// 检查单列表，兼容 `{items,total}` 与旧版纯数组
    pub async fn list_checklists(&self, filters: &ChecklistFilters) -> Result<ChecklistPage> {
        let builder = self
            .request(Method::GET, "/api/checklists")
            .await
            .query(&filters.to_query());
        let response = self.send(builder).await?;
        let body: Value = response.json().await.map_err(into_network_error)?;

        if body.is_array() {
            let items: Vec<Checklist> = serde_json::from_value(body)?;
            let total = items.len() as u64;
            return Ok(ChecklistPage { items, total });
        }
        serde_json::from_value(body).map_err(Into::into)
    }

    pub async fn get_checklist(&self, id: i64) -> Result<Checklist> {
        self.get_json(&format!("/api/checklists/{}", id)).await
    }

    /// 按样本编号取检查单（含 cell_counts）
    pub async fn checklist_by_sample(&self, sample_number: &str) -> Result<Checklist> {
        self.get_json(&format!(
            "/api/checklists/sample/{}",
            urlencoding::encode(sample_number)
        ))
        .await
    }

    /// 从样本生成检查单
    pub async fn create_checklist_from_sample(
        &self,
        sample_id: i64,
        reviewing_doctor_id: Option<i64>,
    ) -> Result<Checklist> {
        let mut builder = self
            .request(
                Method::POST,
                &format!("/api/checklists/from-sample/{}", sample_id),
            )
            .await;
        if let Some(doctor_id) = reviewing_doctor_id {
            builder = builder.query(&[("reviewing_doctor_id", doctor_id.to_string())]);
        }
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    pub async fn update_checklist(&self, id: i64, update: &ChecklistUpdate) -> Result<Checklist> {
        let builder = self
            .request(Method::PUT, &format!("/api/checklists/{}", id))
            .await
            .json(update);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 审核检查单
    pub async fn review_checklist(&self, id: i64, review: &ChecklistReview) -> Result<()> {
        let builder = self
            .request(Method::POST, &format!("/api/checklists/{}/review", id))
            .await
            .json(review);
        self.send(builder).await?;
        Ok(())
    }

    /// 导出报告 PDF，返回原始字节流，由调用方落盘
    pub async fn export_checklist_pdf(&self, checklist_number: &str) -> Result<Vec<u8>> {
        let builder = self
            .request(
                Method::GET,
                &format!(
                    "/api/checklists/{}/export",
                    urlencoding::encode(checklist_number)
                ),
            )
            .await;
        let response = self.send(builder).await?;
        let bytes = response.bytes().await.map_err(into_network_error)?;
        Ok(bytes.to_vec())
    }
}
