//! 报告分析视图模型
//!
//! 报告分区是固定参考数据；行里的数量来自细胞统计接口，百分比与
//! 参考范围指示符在本地计算。报告确认把汇总计数与结论写回检查单。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use marrow_client::checklists::ChecklistReview;
use marrow_client::smears::SmearFilters;
use marrow_client::{ApiClient, DataEvent};
use marrow_core::reference::{indicator, percent, RangeIndicator};
use marrow_core::taxonomy::aggregate;
use marrow_core::{
    CategoryCount, CellClassification, Checklist, ChecklistUpdate, MarrowError, Result,
    ReviewStatus,
};
use tracing::{info, warn};

/// 报告行定义
#[derive(Debug, Clone, Copy)]
pub struct ReportRowDef {
    pub name: &'static str,
    pub reference: &'static str,
}

/// 报告分区定义
#[derive(Debug, Clone, Copy)]
pub struct ReportSectionDef {
    pub id: &'static str,
    pub title: &'static str,
    pub rows: &'static [ReportRowDef],
}

/// 报告固定分区
pub const REPORT_SECTIONS: &[ReportSectionDef] = &[
    ReportSectionDef {
        id: "red",
        title: "红细胞系统",
        rows: &[
            ReportRowDef { name: "微生物", reference: "1~2" },
            ReportRowDef { name: "成熟红细胞", reference: "~" },
            ReportRowDef { name: "大红细胞", reference: "0~10" },
            ReportRowDef { name: "小红细胞", reference: "0~4" },
            ReportRowDef { name: "椭圆形和卵圆形红细胞", reference: "0~1" },
            ReportRowDef { name: "裂红细胞", reference: "0~1" },
            ReportRowDef { name: "有核红细胞", reference: "0~1" },
        ],
    },
    ReportSectionDef {
        id: "lymphocyte",
        title: "淋巴细胞系统",
        rows: &[
            ReportRowDef { name: "小淋巴细胞", reference: "0~40" },
            ReportRowDef { name: "大淋巴细胞", reference: "0~5" },
            ReportRowDef { name: "反应性淋巴细胞", reference: "0~5" },
            ReportRowDef { name: "浆细胞", reference: "0~5" },
        ],
    },
    ReportSectionDef {
        id: "megakaryocyte",
        title: "巨核细胞及血小板",
        rows: &[
            ReportRowDef { name: "正常血小板", reference: "1~100" },
            ReportRowDef { name: "大血小板", reference: "0~9" },
            ReportRowDef { name: "异形血小板", reference: "0~9" },
            ReportRowDef { name: "血小板聚集成簇", reference: "0~9" },
            ReportRowDef { name: "巨核细胞", reference: "0~9" },
        ],
    },
    ReportSectionDef {
        id: "granular",
        title: "粒细胞系统",
        rows: &[
            ReportRowDef { name: "早幼粒细胞", reference: "0~2" },
            ReportRowDef { name: "中幼粒细胞", reference: "0~8" },
            ReportRowDef { name: "杆状核中性粒细胞", reference: "45~65" },
            ReportRowDef { name: "分叶核中性粒细胞", reference: "0~5" },
            ReportRowDef { name: "嗜酸性粒细胞", reference: "0~5" },
            ReportRowDef { name: "嗜碱性粒细胞", reference: "0~5" },
            ReportRowDef { name: "中性粒细胞(含空泡)", reference: "0~5" },
        ],
    },
    ReportSectionDef {
        id: "primitive",
        title: "原始细胞系统",
        rows: &[ReportRowDef { name: "原始细胞", reference: "" }],
    },
    ReportSectionDef {
        id: "monocyte",
        title: "单核细胞系统",
        rows: &[ReportRowDef { name: "成熟单核细胞", reference: "0~7" }],
    },
    ReportSectionDef {
        id: "other",
        title: "其他细胞",
        rows: &[ReportRowDef { name: "其他", reference: "" }],
    },
];

/// 计算后的一行
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub name: &'static str,
    pub reference: &'static str,
    pub count: u64,
    pub percent: f64,
    pub indicator: Option<RangeIndicator>,
}

/// 计算后的分区
#[derive(Debug, Clone)]
pub struct ReportSection {
    pub id: &'static str,
    pub title: &'static str,
    pub rows: Vec<ReportRow>,
}

/// 报告分析视图模型
pub struct ReportView {
    client: Arc<ApiClient>,
    pub sample_number: Option<String>,
    pub total_cells: u64,
    /// 统计接口返回的扁平计数（类别名 → 数量）
    pub counts: HashMap<String, u64>,
    pub checklist: Option<Checklist>,
    pub diagnosis: String,
    pub conclusion: String,
    pub red_cell_figure: Option<String>,
    pub platelet_figure: Option<String>,
}

impl ReportView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            sample_number: None,
            total_cells: 0,
            counts: HashMap::new(),
            checklist: None,
            diagnosis: String::new(),
            conclusion: String::new(),
            red_cell_figure: None,
            platelet_figure: None,
        }
    }

    /// 加载选中样本的统计与检查单
    pub async fn load_sample(&mut self, sample_number: &str) -> Result<()> {
        self.sample_number = Some(sample_number.to_string());

        // 统计接口用样本的数据库 id，先查样本拿 id
        let filters = SmearFilters {
            sample_number: Some(sample_number.to_string()),
            skip: Some(0),
            limit: Some(1),
            ..SmearFilters::default()
        };
        let page = self.client.list_smears(&filters).await?;
        match page.items.first().and_then(|smear| smear.id) {
            Some(sample_id) => match self.client.cell_statistics(sample_id).await {
                Ok(stats) => {
                    self.total_cells = stats.total_cells;
                    self.counts = stats.cell_counts;
                }
                Err(err) => {
                    warn!("failed to load statistics for {}: {}", sample_number, err);
                    self.total_cells = 0;
                    self.counts.clear();
                }
            },
            None => {
                warn!("sample {} has no id, statistics unavailable", sample_number);
                self.total_cells = 0;
                self.counts.clear();
            }
        }

        // 检查单允许尚未生成，404 退化为空表单
        match self.client.checklist_by_sample(sample_number).await {
            Ok(checklist) => {
                self.diagnosis = checklist.report_analysis.clone().unwrap_or_default();
                self.red_cell_figure = checklist.red_cell_figure.clone();
                self.platelet_figure = checklist.platelet_figure.clone();
                self.checklist = Some(checklist);
            }
            Err(MarrowError::NotFound(_)) => {
                self.checklist = None;
                self.diagnosis.clear();
                self.red_cell_figure = None;
                self.platelet_figure = None;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// 依据统计数据计算各分区行
    pub fn sections(&self) -> Vec<ReportSection> {
        REPORT_SECTIONS
            .iter()
            .map(|def| ReportSection {
                id: def.id,
                title: def.title,
                rows: def
                    .rows
                    .iter()
                    .map(|row| {
                        let count = self.counts.get(row.name).copied().unwrap_or(0);
                        let pct = percent(count, self.total_cells);
                        ReportRow {
                            name: row.name,
                            reference: row.reference,
                            count,
                            percent: pct,
                            indicator: indicator(pct, row.reference),
                        }
                    })
                    .collect(),
            })
            .collect()
    }

    /// 由细胞分类构建检查单的嵌套计数结构
    pub fn nested_counts(cells: &[CellClassification]) -> HashMap<String, CategoryCount> {
        aggregate(cells)
            .branches
            .into_iter()
            .map(|branch| {
                (
                    branch.name.to_string(),
                    CategoryCount {
                        count: branch.count as u64,
                        sub_categories: branch
                            .leaves
                            .into_iter()
                            .filter(|leaf| leaf.count > 0)
                            .map(|leaf| (leaf.name.to_string(), leaf.count as u64))
                            .collect(),
                    },
                )
            })
            .collect()
    }

    /// 报告确认：写回计数与结论，状态置为报告已审核
    pub async fn confirm(&mut self) -> Result<Checklist> {
        let sample_number = self
            .sample_number
            .clone()
            .ok_or_else(|| MarrowError::Validation("请先选择样本".to_string()))?;
        let checklist_id = self
            .checklist
            .as_ref()
            .map(|c| c.id)
            .ok_or_else(|| MarrowError::NotFound("样本尚未生成检查单".to_string()))?;

        let cells = self
            .client
            .cell_classifications_by_sample(&sample_number)
            .await?;
        let report_date = Local::now().format("%Y-%m-%d").to_string();
        let update = ChecklistUpdate {
            report_analysis: Some(self.diagnosis.clone()),
            review_status: Some(ReviewStatus::ReportReviewed.as_label().to_string()),
            report_date: Some(report_date.clone()),
            cell_counts: Some(Self::nested_counts(&cells)),
            red_cell_figure: self.red_cell_figure.clone(),
            platelet_figure: self.platelet_figure.clone(),
        };
        let updated = self.client.update_checklist(checklist_id, &update).await?;
        self.client
            .review_checklist(
                checklist_id,
                &ChecklistReview {
                    review_status: ReviewStatus::ReportReviewed.as_label().to_string(),
                    report_analysis: Some(self.diagnosis.clone()),
                    report_date: Some(report_date),
                },
            )
            .await?;

        info!("report confirmed for sample {}", sample_number);
        self.client.session().publish(DataEvent::SampleChanged {
            sample_number,
        });
        self.checklist = Some(updated.clone());
        Ok(updated)
    }

    /// 导出报告 PDF 到本地文件
    pub async fn export(&self, path: &Path) -> Result<()> {
        let checklist = self
            .checklist
            .as_ref()
            .ok_or_else(|| MarrowError::NotFound("样本尚未生成检查单".to_string()))?;
        let bytes = self
            .client
            .export_checklist_pdf(&checklist.checklist_number)
            .await?;
        tokio::fs::write(path, &bytes).await?;
        info!("report exported to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_client::{ClientConfig, Session};

    fn view() -> ReportView {
        let session = Arc::new(Session::new());
        let client = ApiClient::new(ClientConfig::default(), session).unwrap();
        ReportView::new(Arc::new(client))
    }

    #[test]
    fn sections_compute_percent_and_indicator() {
        let mut view = view();
        view.total_cells = 100;
        view.counts.insert("杆状核中性粒细胞".to_string(), 70);
        view.counts.insert("小淋巴细胞".to_string(), 20);

        let sections = view.sections();
        let granular = sections.iter().find(|s| s.id == "granular").unwrap();
        let band = granular
            .rows
            .iter()
            .find(|r| r.name == "杆状核中性粒细胞")
            .unwrap();
        assert_eq!(band.count, 70);
        assert!((band.percent - 70.0).abs() < f64::EPSILON);
        assert_eq!(band.indicator, Some(RangeIndicator::Above));

        let lymph = sections.iter().find(|s| s.id == "lymphocyte").unwrap();
        let small = lymph.rows.iter().find(|r| r.name == "小淋巴细胞").unwrap();
        assert_eq!(small.indicator, None);
    }

    #[test]
    fn zero_total_yields_zero_percent_rows() {
        let view = view();
        for section in view.sections() {
            for row in section.rows {
                assert_eq!(row.count, 0);
                assert_eq!(row.percent, 0.0);
            }
        }
    }

    #[test]
    fn rows_without_reference_never_indicate() {
        let mut view = view();
        view.total_cells = 10;
        view.counts.insert("原始细胞".to_string(), 10);
        let sections = view.sections();
        let primitive = sections.iter().find(|s| s.id == "primitive").unwrap();
        assert_eq!(primitive.rows[0].indicator, None);
    }

    #[test]
    fn nested_counts_group_leaves_under_branches() {
        let cells: Vec<CellClassification> = ["成熟淋巴细胞", "成熟淋巴细胞", "原始粒细胞"]
            .iter()
            .enumerate()
            .map(|(i, category)| CellClassification {
                id: None,
                cell_number: format!("C{}", i),
                sample_id: Some(1),
                x_coordinate: None,
                y_coordinate: None,
                width: None,
                height: None,
                model_classification_type: Some(category.to_string()),
                model_classification_confidence: None,
                doctor_classification_category: None,
                storage_path: None,
            })
            .collect();

        let counts = ReportView::nested_counts(&cells);
        let lymph = counts.get("淋巴细胞系").unwrap();
        assert_eq!(lymph.count, 2);
        assert_eq!(lymph.sub_categories.get("成熟淋巴细胞"), Some(&2));
        // 零计数叶类不写入嵌套结构
        assert!(!lymph.sub_categories.contains_key("原始淋巴细胞"));

        let neutrophil = counts.get("中性粒细胞系列").unwrap();
        assert_eq!(neutrophil.count, 1);
    }
}
