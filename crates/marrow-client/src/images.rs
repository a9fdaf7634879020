//! 图像接口
//!
//! 批量上传走 multipart 表单；按存储键访问/删除时路径逐段编码。

use std::path::{Path, PathBuf};

use marrow_core::{MarrowError, Result, SampleImagesResponse, UploadReport};
use reqwest::multipart::{Form, Part};
use reqwest::Method;

use crate::http::{into_network_error, ApiClient};

/// 上传前的本地校验，必须在发起任何网络请求之前调用
pub fn validate_upload(sample_number: &str, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(MarrowError::Validation("请先选择文件".to_string()));
    }
    if sample_number.trim().is_empty() {
        return Err(MarrowError::Validation("请先输入样本编号".to_string()));
    }
    Ok(())
}

/// 把本地文件读成 multipart 分片
pub(crate) async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("file")
        .to_string();
    Ok(Part::bytes(bytes).file_name(file_name))
}

/// 存储键逐段编码，段内的 `/` 不会出现在编码结果里
pub(crate) fn encode_storage_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl ApiClient {
    /// 样本的全部图像（区域图、细胞图、标记图）
    pub async fn sample_images(&self, sample_number: &str) -> Result<SampleImagesResponse> {
        self.get_json(&format!(
            "/api/images/sample/{}",
            urlencoding::encode(sample_number)
        ))
        .await
    }

    /// 批量上传图像
    pub async fn upload_images(
        &self,
        sample_number: &str,
        files: &[PathBuf],
        image_type: &str,
        quality: &str,
    ) -> Result<UploadReport> {
        validate_upload(sample_number, files)?;

        let mut form = Form::new()
            .text("sample_number", sample_number.to_string())
            .text("image_type", image_type.to_string())
            .text("quality", quality.to_string());
        for path in files {
            form = form.part("files", file_part(path).await?);
        }

        let builder = self
            .request(Method::POST, "/api/images/upload/batch")
            .await
            .multipart(form);
        let response = self.send(builder).await?;
        response.json().await.map_err(into_network_error)
    }

    /// 按存储键删除图像
    pub async fn delete_image(&self, storage_path: &str) -> Result<()> {
        let builder = self
            .request(
                Method::DELETE,
                &format!("/api/images/view/{}", encode_storage_path(storage_path)),
            )
            .await;
        self.send(builder).await?;
        Ok(())
    }
}
