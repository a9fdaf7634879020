//! 图像管理（上传/导入/智能分析）视图模型
//!
//! 智能分析是一次长耗时的阻塞请求，状态机只报告确定可知的事实：
//! 空闲、进行中（不确定进度）、完成、失败。真实进度来自独立的
//! SSE 通道，同一时刻至多保持一条连接，用完显式断开。

use std::path::PathBuf;
use std::sync::Arc;

use marrow_client::analysis::{AnalysisProgress, ProgressStream};
use marrow_client::images::validate_upload;
use marrow_client::{ApiClient, DataEvent};
use marrow_core::{AnalysisReport, MarrowError, PatientImportReport, Result, UploadReport};
use tracing::{info, warn};

/// 分析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    /// 进行中，进度不确定
    Running,
    Done,
    Failed,
}

/// 图像管理视图模型
pub struct UploadView {
    client: Arc<ApiClient>,
    pub image_files: Vec<PathBuf>,
    pub sheet_file: Option<PathBuf>,
    pub sample_number: String,
    pub state: AnalysisState,
    progress: Option<ProgressStream>,
}

impl UploadView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            image_files: Vec::new(),
            sheet_file: None,
            sample_number: String::new(),
            state: AnalysisState::Idle,
            progress: None,
        }
    }

    pub fn select_images(&mut self, files: Vec<PathBuf>) {
        self.image_files = files;
    }

    pub fn select_sheet(&mut self, sheet: PathBuf) {
        self.sheet_file = Some(sheet);
    }

    /// 批量上传图像
    ///
    /// 本地校验不通过时直接报错，不发起网络请求。
    pub async fn upload_images(&mut self) -> Result<UploadReport> {
        validate_upload(&self.sample_number, &self.image_files)?;
        let report = self
            .client
            .upload_images(&self.sample_number, &self.image_files, "original", "high")
            .await?;
        info!(
            "uploaded {} files for sample {} ({} failed)",
            report.success_count, self.sample_number, report.error_count
        );
        self.client.session().publish(DataEvent::ImagesUploaded {
            sample_number: self.sample_number.clone(),
            file_count: self.image_files.len(),
        });
        self.image_files.clear();
        Ok(report)
    }

    /// 导入病人信息表格
    pub async fn import_patients(&mut self) -> Result<PatientImportReport> {
        let sheet = self
            .sheet_file
            .clone()
            .ok_or_else(|| MarrowError::Validation("请先选择文件".to_string()))?;
        let report = self.client.import_patients_sheet(&sheet).await?;
        info!(
            "patient import: {} created, {} updated, {} errors",
            report.created_count, report.updated_count, report.error_count
        );
        if !report.errors.is_empty() {
            warn!("patient import errors: {:?}", report.errors);
        }
        self.client.session().publish(DataEvent::PatientsImported {
            created: report.created_count,
            updated: report.updated_count,
        });
        self.sheet_file = None;
        Ok(report)
    }

    /// 运行智能分析
    pub async fn run_analysis(&mut self) -> Result<AnalysisReport> {
        if self.state == AnalysisState::Running {
            return Err(MarrowError::Validation("分析正在进行中".to_string()));
        }
        if self.image_files.is_empty() {
            return Err(MarrowError::Validation("请先上传图片".to_string()));
        }

        self.state = AnalysisState::Running;
        let outcome = self
            .client
            .analyze(self.sheet_file.as_deref(), &self.image_files)
            .await;
        self.stop_progress();
        match outcome {
            Ok(report) => {
                self.state = AnalysisState::Done;
                info!("analysis finished, {} images processed", report.total_images);
                Ok(report)
            }
            Err(err) => {
                self.state = AnalysisState::Failed;
                Err(err)
            }
        }
    }

    /// 打开进度流；已有连接先断开，保证同一时刻至多一条
    pub async fn watch_progress(&mut self) -> Result<()> {
        if self.sample_number.trim().is_empty() {
            return Err(MarrowError::Validation("请先输入样本编号".to_string()));
        }
        self.stop_progress();
        let stream = self
            .client
            .open_progress_stream(self.sample_number.trim())
            .await?;
        self.progress = Some(stream);
        Ok(())
    }

    /// 读取下一条进度事件，流结束或分析完成后自动断开
    pub async fn next_progress(&mut self) -> Result<Option<AnalysisProgress>> {
        let Some(stream) = self.progress.as_mut() else {
            return Ok(None);
        };
        match stream.next_event().await {
            Ok(Some(event)) => {
                if event.finished {
                    self.stop_progress();
                }
                Ok(Some(event))
            }
            Ok(None) => {
                self.stop_progress();
                Ok(None)
            }
            Err(err) => {
                self.stop_progress();
                Err(err)
            }
        }
    }

    /// 显式断开进度连接
    pub fn stop_progress(&mut self) {
        if self.progress.take().is_some() {
            info!("progress stream closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_client::{ClientConfig, Session};

    fn view() -> UploadView {
        let session = Arc::new(Session::new());
        let client = ApiClient::new(ClientConfig::default(), session).unwrap();
        UploadView::new(Arc::new(client))
    }

    #[tokio::test]
    async fn upload_without_sample_number_fails_before_any_request() {
        let mut view = view();
        view.select_images(vec![PathBuf::from("a.png")]);
        // 样本编号为空：必须在本地拒绝，而不是发出请求后等后端拒绝
        let err = view.upload_images().await.unwrap_err();
        match err {
            MarrowError::Validation(message) => assert_eq!(message, "请先输入样本编号"),
            other => panic!("expected validation error, got {:?}", other),
        }
        // 文件列表未被清空，用户补全编号后可以直接重试
        assert_eq!(view.image_files.len(), 1);
    }

    #[tokio::test]
    async fn upload_without_files_fails_client_side() {
        let mut view = view();
        view.sample_number = "S001".to_string();
        let err = view.upload_images().await.unwrap_err();
        assert!(matches!(err, MarrowError::Validation(_)));
    }

    #[tokio::test]
    async fn analysis_rejects_reentry_while_running() {
        let mut view = view();
        view.select_images(vec![PathBuf::from("a.png")]);
        view.state = AnalysisState::Running;
        let err = view.run_analysis().await.unwrap_err();
        assert!(matches!(err, MarrowError::Validation(_)));
        assert_eq!(view.state, AnalysisState::Running);
    }

    #[tokio::test]
    async fn analysis_requires_images() {
        let mut view = view();
        let err = view.run_analysis().await.unwrap_err();
        assert!(matches!(err, MarrowError::Validation(_)));
        assert_eq!(view.state, AnalysisState::Idle);
    }

    #[tokio::test]
    async fn import_requires_a_sheet() {
        let mut view = view();
        let err = view.import_patients().await.unwrap_err();
        assert!(matches!(err, MarrowError::Validation(_)));
    }

    #[tokio::test]
    async fn next_progress_without_stream_is_none() {
        let mut view = view();
        assert!(view.next_progress().await.unwrap().is_none());
    }
}
