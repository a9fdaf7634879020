//! 细胞分类接口

use marrow_core::{CellClassification, CellClassificationUpdate, CellStatistics, Result};
use reqwest::Method;

use crate::http::{into_network_error, ApiClient};

/// 单次取全样本细胞的查询上限
const CELL_LIST_LIMIT: u64 = 1000;

impl ApiClient {
    /// 细胞分类列表，可按样本 id 与模型分类过滤
    pub async fn list_cell_classifications(
        &self,
        sample_id: Option<i64>,
        model_type: Option<&str>,
    ) -> Result<Vec<CellClassification>> {
        let mut query: Vec<(&str, String)> = vec![("limit", CELL_LIST_LIMIT.to_string())];
        if let Some(sample_id) = sample_id {
            query.push(("sample_id", sample_id.to_string()));
        }
        if let Some(model_type) = model_type {
            query.push(("model_classification_type", model_type.to_string()));
        }
        let builder = self
            .request(Method::GET, "/api/cell-classifications")
            .await
            .query(&query);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 按样本编号取细胞分类
    pub async fn cell_classifications_by_sample(
        &self,
        sample_number: &str,
    ) -> Result<Vec<CellClassification>> {
        self.get_json(&format!(
            "/api/cell-classifications/sample/{}",
            urlencoding::encode(sample_number)
        ))
        .await
    }

    /// 样本细胞统计
    pub async fn cell_statistics(&self, sample_id: i64) -> Result<CellStatistics> {
        self.get_json(&format!(
            "/api/cell-classifications/statistics/sample/{}",
            sample_id
        ))
        .await
    }

    /// 按细胞编号更新分类（医生复核）
    pub async fn update_cell_classification(
        &self,
        cell_number: &str,
        update: &CellClassificationUpdate,
    ) -> Result<CellClassification> {
        let builder = self
            .request(
                Method::PUT,
                &format!(
                    "/api/cell-classifications/{}",
                    urlencoding::encode(cell_number)
                ),
            )
            .await
            .json(update);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }
}
