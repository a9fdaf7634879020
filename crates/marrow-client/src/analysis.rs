//! 智能分析接口
//!
//! 批量推理是一次长耗时的阻塞请求；进度通过独立的 SSE 通道推送。
//! 调用方负责保证同一时刻至多一条进度连接，并在不用时丢弃它
//! （丢弃即断开）。

use std::path::{Path, PathBuf};

use marrow_core::{AnalysisReport, MarrowError, PatientImportReport, Result};
use reqwest::multipart::Form;
use reqwest::{header, Method, Response};
use serde::Deserialize;
use tracing::warn;

use crate::http::{into_network_error, ApiClient};
use crate::images::file_part;

/// 一条分析进度事件
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisProgress {
    pub stage: Option<String>,
    pub percent: Option<f32>,
    pub message: Option<String>,
    #[serde(default)]
    pub finished: bool,
}

impl ApiClient {
    /// 提交智能分析：病人信息表格 + 图像文件
    pub async fn analyze(
        &self,
        sheet: Option<&Path>,
        images: &[PathBuf],
    ) -> Result<AnalysisReport> {
        if images.is_empty() {
            return Err(MarrowError::Validation("请先上传图片".to_string()));
        }

        let mut form = Form::new();
        if let Some(sheet) = sheet {
            form = form.part("excel_file", file_part(sheet).await?);
        }
        for path in images {
            form = form.part("files", file_part(path).await?);
        }

        let builder = self
            .request(Method::POST, "/api/intelligent-analysis/analyze")
            .await
            .multipart(form);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 导入病人信息表格
    pub async fn import_patients_sheet(&self, sheet: &Path) -> Result<PatientImportReport> {
        let form = Form::new().part("file", file_part(sheet).await?);
        let builder = self
            .request(Method::POST, "/api/excel/import/patients")
            .await
            .multipart(form);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 打开指定样本的分析进度流
    pub async fn open_progress_stream(&self, sample_number: &str) -> Result<ProgressStream> {
        let builder = self
            .request(
                Method::GET,
                &format!(
                    "/api/intelligent-analysis/progress/{}",
                    urlencoding::encode(sample_number)
                ),
            )
            .await
            .header(header::ACCEPT, "text/event-stream");
        let response = self.send(builder).await?;
        Ok(ProgressStream {
            response,
            buffer: String::new(),
        })
    }
}

/// SSE 进度流
pub struct ProgressStream {
    response: Response,
    buffer: String,
}

impl ProgressStream {
    /// 读取下一条进度事件，流结束返回 None
    pub async fn next_event(&mut self) -> Result<Option<AnalysisProgress>> {
        loop {
            while let Some(data) = next_data_block(&mut self.buffer) {
                match serde_json::from_str(&data) {
                    Ok(event) => return Ok(Some(event)),
                    Err(err) => warn!("skipping malformed progress event: {}", err),
                }
            }
            match self.response.chunk().await.map_err(into_network_error)? {
                Some(chunk) => self.buffer.push_str(&String::from_utf8_lossy(&chunk)),
                None => return Ok(None),
            }
        }
    }
}

/// 从缓冲区取出下一个完整事件块的 data 负载
///
/// SSE 事件以空行分隔；一个事件可以有多行 `data:`，拼接时按行连接。
fn next_data_block(buffer: &mut String) -> Option<String> {
    let end = buffer.find("\n\n")?;
    let block: String = buffer.drain(..end + 2).collect();
    let data = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        // 注释行或心跳块，继续找下一块
        return next_data_block(buffer);
    }
    Some(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_data_payload_from_event_block() {
        let mut buffer =
            "data: {\"stage\": \"推理中\", \"percent\": 40.0}\n\ndata: x".to_string();
        let data = next_data_block(&mut buffer).unwrap();
        assert_eq!(data, "{\"stage\": \"推理中\", \"percent\": 40.0}");
        // 后半截不足一个完整事件，留在缓冲区
        assert_eq!(buffer, "data: x");
        assert!(next_data_block(&mut buffer).is_none());
    }

    #[test]
    fn heartbeat_blocks_are_skipped() {
        let mut buffer = ": keep-alive\n\ndata: {\"finished\": true}\n\n".to_string();
        let data = next_data_block(&mut buffer).unwrap();
        let event: AnalysisProgress = serde_json::from_str(&data).unwrap();
        assert!(event.finished);
    }

    #[test]
    fn progress_event_deserializes_with_partial_fields() {
        let event: AnalysisProgress =
            serde_json::from_str(r#"{"message": "排队中"}"#).unwrap();
        assert_eq!(event.message.as_deref(), Some("排队中"));
        assert!(event.percent.is_none());
        assert!(!event.finished);
    }
}
