//! 样本列表视图模型
//!
//! 分页与选中状态的维护规则：
//! - 每次成功拉取后，若无选中项则选中第一行；若原选中项不在新结果
//!   里，退回选中第一行；否则保持不变
//! - 修改每页条数后把页码收敛到合法区间，避免请求越界页
//! - 拉取失败时清空列表并记录错误，绝不保留过期数据

use std::sync::Arc;

use marrow_client::smears::SmearFilters;
use marrow_client::{ApiClient, DataEvent};
use marrow_core::{PatientUpdate, Result, ReviewStatus, Smear, SmearUpdate};
use tracing::{info, warn};

const DEFAULT_PAGE_SIZE: u64 = 10;

/// 列表中的一行
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub sample_number: String,
    pub sample_type: String,
    pub patient_name: String,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub status: ReviewStatus,
    pub scanner: Option<String>,
    pub department: Option<String>,
    pub hospitalization_number: Option<String>,
    pub bed_number: Option<String>,
    pub inspection_doctor: Option<String>,
    pub submission_time: Option<String>,
    pub patient_id: Option<i64>,
    pub smear_id: Option<i64>,
}

impl SampleRow {
    /// 容错转换：个别字段缺失不让整页失败
    pub fn from_smear(smear: &Smear) -> Self {
        let patient = smear.patient.as_ref();
        Self {
            sample_number: smear.sample_number.clone(),
            sample_type: smear
                .sample_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "血涂本".to_string()),
            patient_name: patient
                .map(|p| p.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "未知".to_string()),
            patient_age: patient.and_then(|p| p.age),
            patient_gender: patient.and_then(|p| p.gender.clone()),
            status: smear.review_status(),
            scanner: smear.scanner.clone(),
            department: patient.and_then(|p| p.department.clone()),
            hospitalization_number: patient.and_then(|p| p.hospitalization_number.clone()),
            bed_number: patient.and_then(|p| p.bed_number.clone()),
            inspection_doctor: smear.inspection_doctor.as_ref().map(|d| d.name.clone()),
            submission_time: smear.submission_time.clone(),
            patient_id: patient.map(|p| p.id).or(smear.patient_id),
            smear_id: smear.id,
        }
    }
}

/// 查询表单，原样保存输入，转换时去除首尾空白
#[derive(Debug, Clone, Default)]
pub struct SearchForm {
    pub sample_number: String,
    pub patient_name: String,
    pub admission_number: String,
    pub patient_age: String,
    pub review_status: String,
    pub start_date: String,
    pub end_date: String,
    pub inspection_doctor: String,
}

impl SearchForm {
    fn to_filters(&self, page: u64, page_size: u64) -> SmearFilters {
        fn nonblank(text: &str) -> Option<String> {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }

        let mut filters = SmearFilters::page(page.saturating_sub(1) * page_size, page_size);
        filters.sample_number = nonblank(&self.sample_number);
        filters.patient_name = nonblank(&self.patient_name);
        filters.hospitalization_number = nonblank(&self.admission_number);
        filters.patient_age = self.patient_age.trim().parse().ok();
        // 只有三个已知审核状态会下发给后端
        filters.status = match self.review_status.trim() {
            label @ ("未审核" | "图像已审核" | "报告已审核") => Some(label.to_string()),
            _ => None,
        };
        filters.start_date = nonblank(&self.start_date);
        filters.end_date = nonblank(&self.end_date);
        filters.inspection_doctor_name = nonblank(&self.inspection_doctor);
        filters
    }
}

/// 样本列表视图模型
pub struct SampleDirectory {
    client: Arc<ApiClient>,
    pub form: SearchForm,
    /// 当前页码，从 1 开始
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub rows: Vec<SampleRow>,
    /// 选中样本编号
    pub selected: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SampleDirectory {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            form: SearchForm::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            total: 0,
            rows: Vec::new(),
            selected: None,
            loading: false,
            error: None,
        }
    }

    pub fn total_pages(&self) -> u64 {
        (self.total.div_ceil(self.page_size)).max(1)
    }

    /// 拉取当前页并套用选中规则
    pub async fn reload(&mut self) -> Result<()> {
        self.loading = true;
        self.error = None;
        let filters = self.form.to_filters(self.page, self.page_size);
        let outcome = self.client.list_smears(&filters).await;
        self.loading = false;
        match outcome {
            Ok(page) => {
                self.rows = page.items.iter().map(SampleRow::from_smear).collect();
                self.total = page.total;
                self.apply_selection_rules();
                info!(
                    "loaded {} samples (page {}/{}, total {})",
                    self.rows.len(),
                    self.page,
                    self.total_pages(),
                    self.total
                );
                Ok(())
            }
            Err(err) => {
                self.rows.clear();
                self.total = 0;
                self.selected = None;
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn apply_selection_rules(&mut self) {
        if self.rows.is_empty() {
            self.selected = None;
            return;
        }
        let kept = self
            .selected
            .as_ref()
            .is_some_and(|sel| self.rows.iter().any(|row| &row.sample_number == sel));
        if !kept {
            self.selected = Some(self.rows[0].sample_number.clone());
        }
    }

    /// 选中某一行（只接受当前页里存在的样本）
    pub fn select(&mut self, sample_number: &str) {
        if self.rows.iter().any(|row| row.sample_number == sample_number) {
            self.selected = Some(sample_number.to_string());
        }
    }

    pub fn selected_row(&self) -> Option<&SampleRow> {
        let selected = self.selected.as_ref()?;
        self.rows.iter().find(|row| &row.sample_number == selected)
    }

    /// 修改每页条数并收敛页码
    pub fn set_page_size(&mut self, page_size: u64) {
        if page_size == 0 {
            return;
        }
        self.page_size = page_size;
        self.page = self.page.min(self.total_pages());
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page.clamp(1, self.total_pages());
    }

    /// 删除样本后刷新列表
    pub async fn delete(&mut self, sample_number: &str) -> Result<()> {
        self.client.delete_smear(sample_number).await?;
        info!("deleted sample {}", sample_number);
        self.client.session().publish(DataEvent::SampleChanged {
            sample_number: sample_number.to_string(),
        });
        self.reload().await
    }

    /// 批量删除，单条失败不阻断其余，返回成功条数
    pub async fn delete_many(&mut self, sample_numbers: &[String]) -> Result<usize> {
        let mut deleted = 0;
        for sample_number in sample_numbers {
            match self.client.delete_smear(sample_number).await {
                Ok(()) => {
                    deleted += 1;
                    self.client.session().publish(DataEvent::SampleChanged {
                        sample_number: sample_number.clone(),
                    });
                }
                Err(err) => warn!("failed to delete sample {}: {}", sample_number, err),
            }
        }
        self.reload().await?;
        Ok(deleted)
    }

    /// 编辑样本信息，必要时连带更新患者信息
    pub async fn edit(
        &mut self,
        sample_number: &str,
        smear: &SmearUpdate,
        patient: Option<(i64, PatientUpdate)>,
    ) -> Result<()> {
        self.client.update_smear(sample_number, smear).await?;
        if let Some((patient_id, update)) = patient {
            self.client.update_patient(patient_id, &update).await?;
        }
        self.client.session().publish(DataEvent::SampleChanged {
            sample_number: sample_number.to_string(),
        });
        self.reload().await
    }
}
