//! 图像分析视图模型
//!
//! 选中样本变化或分类列表刷新时重新统计分类树；统计本身是纯函数，
//! 可以随时重算。加载失败时回退到清零的树，绝不展示示例数据。

use std::sync::Arc;

use marrow_client::{ApiClient, DataEvent};
use marrow_core::image_path::{filter_by_sample_number, resolve_image_path, ResolvedImage};
use marrow_core::taxonomy::{aggregate, gallery, LeafGallery, TaxonomySummary};
use marrow_core::{CellClassification, CellClassificationUpdate, ImageKind, Result};
use tracing::{info, warn};

/// 图像分析视图模型
pub struct ImageAnalysisView {
    client: Arc<ApiClient>,
    pub sample_number: Option<String>,
    pub cells: Vec<CellClassification>,
    pub summary: TaxonomySummary,
    /// 解析并过滤后的样本图像
    pub images: Vec<ResolvedImage>,
    /// 样本编号过滤被回退（图像列表未经过滤，需要人工留意）
    pub filter_bypassed: bool,
    pub current_index: usize,
    pub loading_cells: bool,
    pub loading_images: bool,
    pub error: Option<String>,
}

impl ImageAnalysisView {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            sample_number: None,
            cells: Vec::new(),
            summary: aggregate(&[]),
            images: Vec::new(),
            filter_bypassed: false,
            current_index: 0,
            loading_cells: false,
            loading_images: false,
            error: None,
        }
    }

    /// 切换样本：重新加载细胞分类与上传图像
    ///
    /// 两类数据互相独立，图像加载失败不影响分类统计，反之亦然。
    pub async fn load_sample(&mut self, sample_number: &str) {
        self.sample_number = Some(sample_number.to_string());
        self.load_images(sample_number).await;
        self.load_cells(sample_number).await;
    }

    async fn load_cells(&mut self, sample_number: &str) {
        self.loading_cells = true;
        self.error = None;
        match self
            .client
            .cell_classifications_by_sample(sample_number)
            .await
        {
            Ok(cells) => {
                self.summary = aggregate(&cells);
                if self.summary.unmatched > 0 {
                    warn!(
                        "sample {}: {} classified cells match no taxonomy leaf",
                        sample_number, self.summary.unmatched
                    );
                }
                info!(
                    "sample {}: {} cells, {} matched taxonomy leaves",
                    sample_number,
                    cells.len(),
                    self.summary.matched_total()
                );
                self.cells = cells;
            }
            Err(err) => {
                warn!(
                    "failed to load cell classifications for {}: {}",
                    sample_number, err
                );
                self.cells.clear();
                self.summary = aggregate(&[]);
                self.error = Some(err.to_string());
            }
        }
        self.loading_cells = false;
    }

    async fn load_images(&mut self, sample_number: &str) {
        self.loading_images = true;
        let token = self.client.session().token().await;
        match self.client.sample_images(sample_number).await {
            Ok(response) => {
                let resolved: Vec<ResolvedImage> = response
                    .images
                    .iter()
                    .map(|image| {
                        resolve_image_path(
                            image.raw_reference(),
                            self.client.base_url(),
                            token.as_deref(),
                        )
                    })
                    .filter(|resolved| !resolved.is_empty())
                    .collect();

                let outcome = filter_by_sample_number(resolved, sample_number, |image| {
                    image.storage_path.as_str()
                });
                if outcome.bypassed {
                    warn!(
                        "sample {}: no image path contains the sample number, keeping unfiltered list",
                        sample_number
                    );
                }
                self.filter_bypassed = outcome.bypassed;
                self.images = outcome.items;
                self.current_index = 0;
            }
            Err(err) => {
                warn!("failed to load images for sample {}: {}", sample_number, err);
                self.images.clear();
                self.filter_bypassed = false;
                self.current_index = 0;
            }
        }
        self.loading_images = false;
    }

    /// 指定叶类的图库内容
    pub fn gallery(&self, leaf_name: &str) -> LeafGallery<'_> {
        gallery(&self.cells, leaf_name)
    }

    pub fn current_image(&self) -> Option<&ResolvedImage> {
        self.images.get(self.current_index)
    }

    /// 某一分组（区域图/细胞图/标记图）下的图像
    pub fn images_of_kind(&self, kind: ImageKind) -> Vec<&ResolvedImage> {
        self.images
            .iter()
            .filter(|image| ImageKind::of_path(&image.storage_path) == kind)
            .collect()
    }

    pub fn go_first(&mut self) {
        self.current_index = 0;
    }

    pub fn go_previous(&mut self) {
        self.current_index = self.current_index.saturating_sub(1);
    }

    pub fn go_next(&mut self) {
        if !self.images.is_empty() {
            self.current_index = (self.current_index + 1).min(self.images.len() - 1);
        }
    }

    pub fn go_last(&mut self) {
        if !self.images.is_empty() {
            self.current_index = self.images.len() - 1;
        }
    }

    /// 医生复核：改写细胞分类并重新统计
    pub async fn reclassify(&mut self, cell_number: &str, category: &str) -> Result<()> {
        let update = CellClassificationUpdate {
            doctor_classification_category: Some(category.to_string()),
            ..CellClassificationUpdate::default()
        };
        self.client
            .update_cell_classification(cell_number, &update)
            .await?;
        info!("cell {} reclassified to {}", cell_number, category);

        if let Some(sample_number) = self.sample_number.clone() {
            self.client.session().publish(DataEvent::CellReclassified {
                sample_number: sample_number.clone(),
                cell_number: cell_number.to_string(),
            });
            self.load_cells(&sample_number).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_client::{ClientConfig, Session};
    use marrow_core::taxonomy::MAX_GALLERY_IMAGES;

    fn view() -> ImageAnalysisView {
        let session = Arc::new(Session::new());
        let client = ApiClient::new(ClientConfig::default(), session).unwrap();
        ImageAnalysisView::new(Arc::new(client))
    }

    fn cell(number: &str, category: &str) -> CellClassification {
        CellClassification {
            id: None,
            cell_number: number.to_string(),
            sample_id: Some(1),
            x_coordinate: None,
            y_coordinate: None,
            width: Some(193.0),
            height: Some(192.0),
            model_classification_type: Some(category.to_string()),
            model_classification_confidence: None,
            doctor_classification_category: None,
            storage_path: Some(format!("users/1/S001/细胞图/{}.png", number)),
        }
    }

    #[test]
    fn gallery_reflects_loaded_cells() {
        let mut view = view();
        view.cells = vec![cell("C1", "成熟淋巴细胞"), cell("C2", "原始粒细胞")];
        match view.gallery("成熟淋巴细胞") {
            LeafGallery::Images { cells, truncated } => {
                assert_eq!(cells.len(), 1);
                assert_eq!(truncated, 0);
                assert!(cells.len() <= MAX_GALLERY_IMAGES);
            }
            LeafGallery::Empty => panic!("expected images"),
        }
        assert!(matches!(view.gallery("肥大细胞"), LeafGallery::Empty));
    }

    #[test]
    fn navigation_clamps_to_image_range() {
        let mut view = view();
        view.images = vec![
            ResolvedImage {
                storage_path: "a".to_string(),
                url: "http://localhost:8000/a".to_string(),
            },
            ResolvedImage {
                storage_path: "b".to_string(),
                url: "http://localhost:8000/b".to_string(),
            },
        ];
        view.go_next();
        assert_eq!(view.current_index, 1);
        view.go_next();
        assert_eq!(view.current_index, 1);
        view.go_previous();
        assert_eq!(view.current_index, 0);
        view.go_previous();
        assert_eq!(view.current_index, 0);
        view.go_last();
        assert_eq!(view.current_index, 1);
        view.go_first();
        assert_eq!(view.current_index, 0);
    }

    #[test]
    fn images_are_grouped_by_path_segment() {
        let mut view = view();
        view.images = vec![
            ResolvedImage {
                storage_path: "users/1/S001/区域图/a.png".to_string(),
                url: String::new(),
            },
            ResolvedImage {
                storage_path: "users/1/S001/细胞图/b.png".to_string(),
                url: String::new(),
            },
            ResolvedImage {
                storage_path: "users/1/S001/细胞图/c.png".to_string(),
                url: String::new(),
            },
        ];
        assert_eq!(view.images_of_kind(ImageKind::Region).len(), 1);
        assert_eq!(view.images_of_kind(ImageKind::Cell).len(), 2);
        assert!(view.images_of_kind(ImageKind::Marked).is_empty());
    }

    #[test]
    fn navigation_on_empty_list_stays_at_zero() {
        let mut view = view();
        view.go_next();
        view.go_last();
        assert_eq!(view.current_index, 0);
        assert!(view.current_image().is_none());
    }
}
