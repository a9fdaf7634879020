//! 病人接口

use marrow_core::{Patient, PatientUpdate, Result};
use reqwest::Method;
use serde::Serialize;

use crate::http::{into_network_error, ApiClient};

/// 病人创建载荷
#[derive(Debug, Clone, Serialize)]
pub struct PatientCreate {
    pub patient_number: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospitalization_number: Option<String>,
}

impl ApiClient {
    pub async fn list_patients(&self, search: Option<&str>) -> Result<Vec<Patient>> {
        let mut builder = self.request(Method::GET, "/api/patients").await;
        if let Some(search) = search {
            builder = builder.query(&[("search", search)]);
        }
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    pub async fn get_patient(&self, id: i64) -> Result<Patient> {
        self.get_json(&format!("/api/patients/{}", id)).await
    }

    pub async fn create_patient(&self, patient: &PatientCreate) -> Result<Patient> {
        let builder = self
            .request(Method::POST, "/api/patients")
            .await
            .json(patient);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 更新病人信息；空更新不发起写请求，直接读回当前数据
    pub async fn update_patient(&self, id: i64, update: &PatientUpdate) -> Result<Patient> {
        if update.is_empty() {
            return self.get_patient(id).await;
        }
        let builder = self
            .request(Method::PUT, &format!("/api/patients/{}", id))
            .await
            .json(update);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }
}
