//! 核心数据模型定义
//!
//! 与后端接口约定一致的数据结构。所有列表接口统一返回 `{items, total}`
//! 结构；旧版接口直接返回数组，由客户端层兼容处理。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 审核状态（三态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    /// 未审核
    Unreviewed,
    /// 图像已审核
    ImageReviewed,
    /// 报告已审核
    ReportReviewed,
}

impl ReviewStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            ReviewStatus::Unreviewed => "未审核",
            ReviewStatus::ImageReviewed => "图像已审核",
            ReviewStatus::ReportReviewed => "报告已审核",
        }
    }

    /// 解析后端状态文本，无法识别的值一律视为未审核
    pub fn from_label(label: &str) -> Self {
        match label {
            "图像已审核" => ReviewStatus::ImageReviewed,
            "报告已审核" => ReviewStatus::ReportReviewed,
            _ => ReviewStatus::Unreviewed,
        }
    }
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub patient_number: String,            // 医院内部患者编号
    pub name: String,                      // 患者姓名
    pub age: Option<u32>,                  // 年龄
    pub gender: Option<String>,            // 性别
    pub hospitalization_number: Option<String>, // 住院号
    pub bed_number: Option<String>,        // 床号
    pub department: Option<String>,        // 科室
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 患者更新载荷，未填写的字段不会被提交
#[derive(Debug, Clone, Default, Serialize)]
pub struct PatientUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospitalization_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl PatientUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.hospitalization_number.is_none()
            && self.bed_number.is_none()
            && self.department.is_none()
    }
}

/// 样本中内嵌的患者摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub patient_number: Option<String>,
    pub hospitalization_number: Option<String>,
    pub bed_number: Option<String>,
    pub department: Option<String>,
}

/// 样本中内嵌的送检医生摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: i64,
    pub name: String,
    pub doctor_number: Option<String>,
    pub role: Option<String>,
}

/// 样本（涂片）信息
///
/// 后端以样本编号（字符串）作为对外标识，数据库自增 id 仅在部分
/// 关联接口中出现，因此保持可选。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smear {
    pub id: Option<i64>,
    pub sample_number: String,             // 样本编号，全局唯一
    pub patient_id: Option<i64>,
    #[serde(rename = "type")]
    pub sample_type: Option<String>,       // 标本类型（血涂本、骨髓等）
    pub scanner: Option<String>,           // 扫描方式
    pub status: Option<String>,            // 审核状态文本
    pub submission_time: Option<String>,   // 送检时间
    pub inspection_doctor_id: Option<i64>,
    pub inspection_doctor: Option<DoctorSummary>,
    pub patient: Option<PatientSummary>,
}

impl Smear {
    pub fn review_status(&self) -> ReviewStatus {
        self.status
            .as_deref()
            .map(ReviewStatus::from_label)
            .unwrap_or(ReviewStatus::Unreviewed)
    }
}

/// 样本更新载荷
#[derive(Debug, Clone, Default, Serialize)]
pub struct SmearUpdate {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub sample_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scanner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection_doctor_id: Option<i64>,
}

/// 样本列表响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmearPage {
    pub items: Vec<Smear>,
    pub total: u64,
}

/// 细胞分类记录
///
/// 每条记录对应一次推理检出的细胞实例。医生分类在展示与统计中
/// 优先于模型分类。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellClassification {
    pub id: Option<i64>,
    pub cell_number: String,               // 细胞编号，样本内唯一
    pub sample_id: Option<i64>,
    pub x_coordinate: Option<f64>,
    pub y_coordinate: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub model_classification_type: Option<String>,
    pub model_classification_confidence: Option<f64>,
    pub doctor_classification_category: Option<String>,
    pub storage_path: Option<String>,      // 裁剪图像的存储键
}

impl CellClassification {
    /// 生效分类：医生分类非空时优先，否则取模型分类
    pub fn effective_category(&self) -> Option<&str> {
        let doctor = self
            .doctor_classification_category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if doctor.is_some() {
            return doctor;
        }
        self.model_classification_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 细胞分类更新载荷
#[derive(Debug, Clone, Default, Serialize)]
pub struct CellClassificationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_classification_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_classification_type: Option<String>,
}

/// 样本细胞统计信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellStatistics {
    pub total_cells: u64,
    pub model_classified: u64,
    pub doctor_classified: u64,
    #[serde(default)]
    pub cell_counts: HashMap<String, u64>,
}

/// 检查单中单个大类的计数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryCount {
    pub count: u64,
    #[serde(default)]
    pub sub_categories: HashMap<String, u64>,
}

/// 检查单（报告载体），与样本一一对应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub id: i64,
    pub checklist_number: String,
    pub patient_id: Option<i64>,
    pub sample_id: Option<i64>,
    pub reviewing_doctor_id: Option<i64>,
    pub report_analysis: Option<String>,   // 诊断结论文本
    pub review_status: Option<String>,
    pub marking_status: Option<String>,
    pub report_date: Option<String>,
    #[serde(default)]
    pub cell_counts: Option<HashMap<String, CategoryCount>>,
    pub red_cell_figure: Option<String>,   // 红细胞典型图像存储键
    pub platelet_figure: Option<String>,   // 血小板典型图像存储键
}

/// 检查单更新载荷
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChecklistUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_analysis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_counts: Option<HashMap<String, CategoryCount>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub red_cell_figure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platelet_figure: Option<String>,
}

/// 检查单列表响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistPage {
    pub items: Vec<Checklist>,
    pub total: u64,
}

/// 后端返回的图像引用，path 与 url 均可能缺失
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub path: Option<String>,
    pub url: Option<String>,
}

impl ImageInfo {
    /// 原始引用串：优先 url，其次 path
    pub fn raw_reference(&self) -> &str {
        self.url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.path.as_deref())
            .unwrap_or("")
    }
}

/// 样本图像列表响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleImagesResponse {
    pub sample_number: String,
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub images: Vec<ImageInfo>,
}

/// 图像分组，按存储路径中的目录段识别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// 区域图
    Region,
    /// 细胞图
    Cell,
    /// 标记图
    Marked,
    Other,
}

impl ImageKind {
    pub fn of_path(path: &str) -> ImageKind {
        if path.contains("区域图") {
            ImageKind::Region
        } else if path.contains("细胞图") {
            ImageKind::Cell
        } else if path.contains("标记图") {
            ImageKind::Marked
        } else {
            ImageKind::Other
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            ImageKind::Region => "区域图像",
            ImageKind::Cell => "细胞图像",
            ImageKind::Marked => "标记图像",
            ImageKind::Other => "其他图像",
        }
    }
}

/// 批量上传中单个文件的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadItemResult {
    pub filename: String,
    pub success: bool,
    pub message: Option<String>,
}

/// 批量上传响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReport {
    pub message: Option<String>,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub results: Vec<UploadItemResult>,
}

/// 病人信息表格导入结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientImportReport {
    #[serde(default)]
    pub created_count: u64,
    #[serde(default)]
    pub updated_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// 智能分析响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub message: Option<String>,
    #[serde(default)]
    pub total_images: u64,
    #[serde(default)]
    pub results: Vec<UploadItemResult>,
}

/// 登录请求
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub doctor_number: String,
    pub password: String,
}

/// 用户信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub doctor_number: String,
    pub name: String,
    pub role: String,
}

/// 登录成功结果（令牌 + 用户信息）
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: Option<UserInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_category_prefers_doctor() {
        let cell = CellClassification {
            id: Some(1),
            cell_number: "C001".to_string(),
            sample_id: Some(1),
            x_coordinate: None,
            y_coordinate: None,
            width: None,
            height: None,
            model_classification_type: Some("成熟淋巴细胞".to_string()),
            model_classification_confidence: Some(0.92),
            doctor_classification_category: Some("反应性淋巴细胞".to_string()),
            storage_path: None,
        };
        assert_eq!(cell.effective_category(), Some("反应性淋巴细胞"));
    }

    #[test]
    fn effective_category_falls_back_to_model() {
        let cell = CellClassification {
            id: None,
            cell_number: "C002".to_string(),
            sample_id: None,
            x_coordinate: None,
            y_coordinate: None,
            width: None,
            height: None,
            model_classification_type: Some(" 成熟单核细胞 ".to_string()),
            model_classification_confidence: None,
            doctor_classification_category: Some("   ".to_string()),
            storage_path: None,
        };
        assert_eq!(cell.effective_category(), Some("成熟单核细胞"));
    }

    #[test]
    fn review_status_parses_known_labels() {
        assert_eq!(ReviewStatus::from_label("图像已审核"), ReviewStatus::ImageReviewed);
        assert_eq!(ReviewStatus::from_label("报告已审核"), ReviewStatus::ReportReviewed);
        assert_eq!(ReviewStatus::from_label("处理中"), ReviewStatus::Unreviewed);
    }

    #[test]
    fn image_kind_is_recognized_from_path_segment() {
        assert_eq!(
            ImageKind::of_path("users/1/S001/区域图/a.png"),
            ImageKind::Region
        );
        assert_eq!(
            ImageKind::of_path("users/1/S001/细胞图/b.png"),
            ImageKind::Cell
        );
        assert_eq!(
            ImageKind::of_path("users/1/S001/标记图/c.png"),
            ImageKind::Marked
        );
        assert_eq!(ImageKind::of_path("users/1/S001/c.png"), ImageKind::Other);
    }

    #[test]
    fn smear_deserializes_with_missing_fields() {
        let smear: Smear =
            serde_json::from_str(r#"{"sample_number": "250725114944020"}"#).unwrap();
        assert_eq!(smear.sample_number, "250725114944020");
        assert_eq!(smear.review_status(), ReviewStatus::Unreviewed);
        assert!(smear.patient.is_none());
    }
}
