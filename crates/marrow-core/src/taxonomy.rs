//! 细胞分类树与统计
//!
//! 分类树是固定参考数据（7 个大类、47 个叶类），不来自后端。
//! 统计对叶类名称做精确匹配：生效分类去除首尾空白后与叶类名称
//! 完全相等才计数，大小写敏感。一个细胞最多计入一个叶类。

use crate::models::CellClassification;

/// 叶类节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonomyLeaf {
    pub id: &'static str,
    pub name: &'static str,
}

/// 大类节点
#[derive(Debug, Clone, Copy)]
pub struct TaxonomyBranch {
    pub id: &'static str,
    pub name: &'static str,
    pub leaves: &'static [TaxonomyLeaf],
}

/// 单个叶类展示的图像上限
pub const MAX_GALLERY_IMAGES: usize = 72;

/// 细胞分类参考树
pub const CELL_TAXONOMY: &[TaxonomyBranch] = &[
    TaxonomyBranch {
        id: "tissue",
        name: "组织类细胞",
        leaves: &[
            TaxonomyLeaf { id: "mast-cell", name: "肥大细胞" },
            TaxonomyLeaf { id: "phagocyte", name: "吞噬细胞" },
            TaxonomyLeaf { id: "endothelial", name: "内皮细胞" },
            TaxonomyLeaf { id: "smear-cell", name: "涂抹细胞" },
            TaxonomyLeaf { id: "mitotic", name: "分裂相" },
            TaxonomyLeaf { id: "degenerate", name: "退化细胞" },
            TaxonomyLeaf { id: "normal-plasma", name: "正常浆细胞" },
            TaxonomyLeaf { id: "abnormal-plasma", name: "异常浆细胞" },
            TaxonomyLeaf { id: "metastatic-cancer", name: "转移癌细胞" },
        ],
    },
    TaxonomyBranch {
        id: "neutrophil",
        name: "中性粒细胞系列",
        leaves: &[
            TaxonomyLeaf { id: "primitive-granulocyte", name: "原始粒细胞" },
            TaxonomyLeaf { id: "promyelocyte", name: "早幼粒细胞" },
            TaxonomyLeaf { id: "myelocyte", name: "中幼粒细胞" },
            TaxonomyLeaf { id: "metamyelocyte", name: "晚幼粒细胞" },
            TaxonomyLeaf { id: "band-neutrophil", name: "杆状核粒细胞" },
            TaxonomyLeaf { id: "segmented-neutrophil", name: "分叶核粒细胞" },
            TaxonomyLeaf { id: "hypersegmented-neutrophil", name: "过分叶粒细胞" },
            TaxonomyLeaf { id: "pathological-granulocyte", name: "病态粒细胞" },
            TaxonomyLeaf { id: "abnormal-promyelocyte", name: "异常早幼粒细胞" },
        ],
    },
    TaxonomyBranch {
        id: "eosinophil-basophil",
        name: "嗜酸、嗜碱粒",
        leaves: &[
            TaxonomyLeaf { id: "eosinophilic-myelocyte", name: "嗜酸中幼粒细胞" },
            TaxonomyLeaf { id: "eosinophilic-metamyelocyte", name: "嗜酸晚幼粒细胞" },
            TaxonomyLeaf { id: "eosinophilic-band", name: "嗜酸杆状核" },
            TaxonomyLeaf { id: "eosinophilic-segmented", name: "嗜酸分叶核" },
            TaxonomyLeaf { id: "basophilic-myelocyte", name: "嗜碱中幼粒细胞" },
            TaxonomyLeaf { id: "basophilic-metamyelocyte", name: "嗜碱晚幼粒细胞" },
            TaxonomyLeaf { id: "basophilic-band", name: "嗜碱杆状核" },
            TaxonomyLeaf { id: "basophilic-segmented", name: "嗜碱分叶核" },
            TaxonomyLeaf { id: "abnormal-eosinophil", name: "异常嗜酸粒细胞" },
        ],
    },
    TaxonomyBranch {
        id: "erythroid",
        name: "幼红系列",
        leaves: &[
            TaxonomyLeaf { id: "primitive-erythrocyte", name: "原始红细胞" },
            TaxonomyLeaf { id: "early-erythrocyte", name: "早幼红细胞" },
            TaxonomyLeaf { id: "late-erythrocyte", name: "晚幼红细胞" },
            TaxonomyLeaf { id: "giant-early-erythrocyte", name: "巨早幼红" },
            TaxonomyLeaf { id: "giant-intermediate-erythrocyte", name: "巨中幼红" },
            TaxonomyLeaf { id: "giant-late-erythrocyte", name: "巨晚幼红" },
            TaxonomyLeaf { id: "other-pathological-erythrocyte", name: "其他病态幼红" },
        ],
    },
    TaxonomyBranch {
        id: "lymphocyte",
        name: "淋巴细胞系",
        leaves: &[
            TaxonomyLeaf { id: "primitive-lymphocyte", name: "原始淋巴细胞" },
            TaxonomyLeaf { id: "immature-lymphocyte", name: "幼稚淋巴细胞" },
            TaxonomyLeaf { id: "mature-lymphocyte", name: "成熟淋巴细胞" },
            TaxonomyLeaf { id: "reactive-lymphocyte", name: "反应性淋巴细胞" },
            TaxonomyLeaf { id: "lymphoma-cell", name: "淋巴瘤细胞" },
        ],
    },
    TaxonomyBranch {
        id: "monocyte",
        name: "单核细胞系",
        leaves: &[
            TaxonomyLeaf { id: "primitive-monocyte", name: "原始单核细胞" },
            TaxonomyLeaf { id: "immature-monocyte", name: "幼稚单核细胞" },
            TaxonomyLeaf { id: "mature-monocyte", name: "成熟单核细胞" },
            TaxonomyLeaf { id: "abnormal-monocyte", name: "异常单核细胞" },
        ],
    },
    TaxonomyBranch {
        id: "megakaryocyte",
        name: "巨核细胞系",
        leaves: &[
            TaxonomyLeaf { id: "primitive-megakaryocyte", name: "原始巨核细胞" },
            TaxonomyLeaf { id: "immature-megakaryocyte", name: "幼稚巨核细胞" },
            TaxonomyLeaf { id: "granular-megakaryocyte", name: "颗粒巨核细胞" },
            TaxonomyLeaf { id: "naked-nucleus-megakaryocyte", name: "裸核巨核细胞" },
        ],
    },
];

/// 叶类统计结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCount {
    pub id: &'static str,
    pub name: &'static str,
    pub count: usize,
}

/// 大类统计结果，大类计数恒等于子叶类计数之和
#[derive(Debug, Clone)]
pub struct BranchCount {
    pub id: &'static str,
    pub name: &'static str,
    pub count: usize,
    pub leaves: Vec<LeafCount>,
}

/// 一次完整的分类树统计
#[derive(Debug, Clone)]
pub struct TaxonomySummary {
    pub branches: Vec<BranchCount>,
    /// 生效分类未命中任何叶类的细胞数
    pub unmatched: usize,
}

impl TaxonomySummary {
    /// 命中叶类的细胞总数
    pub fn matched_total(&self) -> usize {
        self.branches.iter().map(|b| b.count).sum()
    }

    pub fn branch(&self, id: &str) -> Option<&BranchCount> {
        self.branches.iter().find(|b| b.id == id)
    }
}

/// 某一叶类的图库内容
#[derive(Debug, Clone)]
pub enum LeafGallery<'a> {
    /// 暂无图像：明确的空态，而不是零长度网格
    Empty,
    /// 图像列表，超出上限的部分被截断
    Images {
        cells: Vec<&'a CellClassification>,
        truncated: usize,
    },
}

/// 按叶类 id 查找
pub fn find_leaf(id: &str) -> Option<&'static TaxonomyLeaf> {
    CELL_TAXONOMY
        .iter()
        .flat_map(|branch| branch.leaves.iter())
        .find(|leaf| leaf.id == id)
}

/// 按大类 id 查找
pub fn find_branch(id: &str) -> Option<&'static TaxonomyBranch> {
    CELL_TAXONOMY.iter().find(|branch| branch.id == id)
}

/// 统计一个样本的细胞分类
///
/// 纯函数：任何时刻用同一输入重复调用得到相同结果。大类级别的
/// 名称从不直接与细胞记录匹配。
pub fn aggregate(cells: &[CellClassification]) -> TaxonomySummary {
    let branches: Vec<BranchCount> = CELL_TAXONOMY
        .iter()
        .map(|branch| {
            let leaves: Vec<LeafCount> = branch
                .leaves
                .iter()
                .map(|leaf| LeafCount {
                    id: leaf.id,
                    name: leaf.name,
                    count: cells
                        .iter()
                        .filter(|cell| cell.effective_category() == Some(leaf.name))
                        .count(),
                })
                .collect();
            BranchCount {
                id: branch.id,
                name: branch.name,
                count: leaves.iter().map(|l| l.count).sum(),
                leaves,
            }
        })
        .collect();

    let matched: usize = branches.iter().map(|b| b.count).sum();
    let classified = cells
        .iter()
        .filter(|cell| cell.effective_category().is_some())
        .count();

    TaxonomySummary {
        branches,
        unmatched: classified - matched,
    }
}

/// 取出属于指定叶类的细胞记录，用于图库渲染
pub fn gallery<'a>(cells: &'a [CellClassification], leaf_name: &str) -> LeafGallery<'a> {
    let matched: Vec<&CellClassification> = cells
        .iter()
        .filter(|cell| cell.effective_category() == Some(leaf_name))
        .collect();

    if matched.is_empty() {
        return LeafGallery::Empty;
    }

    let truncated = matched.len().saturating_sub(MAX_GALLERY_IMAGES);
    let mut cells = matched;
    cells.truncate(MAX_GALLERY_IMAGES);
    LeafGallery::Images { cells, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(number: &str, model: Option<&str>, doctor: Option<&str>) -> CellClassification {
        CellClassification {
            id: None,
            cell_number: number.to_string(),
            sample_id: Some(1),
            x_coordinate: None,
            y_coordinate: None,
            width: None,
            height: None,
            model_classification_type: model.map(str::to_string),
            model_classification_confidence: None,
            doctor_classification_category: doctor.map(str::to_string),
            storage_path: Some(format!("users/1/S001/细胞图/{}.png", number)),
        }
    }

    #[test]
    fn taxonomy_has_seven_branches() {
        assert_eq!(CELL_TAXONOMY.len(), 7);
        let leaves: usize = CELL_TAXONOMY.iter().map(|b| b.leaves.len()).sum();
        assert_eq!(leaves, 47);
    }

    #[test]
    fn leaf_counts_sum_to_cell_count_when_all_match() {
        let cells = vec![
            cell("C1", Some("成熟淋巴细胞"), None),
            cell("C2", Some("成熟淋巴细胞"), None),
            cell("C3", Some("原始粒细胞"), None),
            cell("C4", None, Some("裸核巨核细胞")),
            cell("C5", Some("嗜酸杆状核"), None),
        ];
        let summary = aggregate(&cells);
        assert_eq!(summary.matched_total(), cells.len());
        assert_eq!(summary.unmatched, 0);

        let lymph = summary.branch("lymphocyte").unwrap();
        assert_eq!(lymph.count, 2);
        let mature = lymph.leaves.iter().find(|l| l.id == "mature-lymphocyte").unwrap();
        assert_eq!(mature.count, 2);
    }

    #[test]
    fn branch_count_is_sum_of_leaves() {
        let cells = vec![
            cell("C1", Some("原始单核细胞"), None),
            cell("C2", Some("幼稚单核细胞"), None),
            cell("C3", Some("成熟单核细胞"), None),
        ];
        let summary = aggregate(&cells);
        let mono = summary.branch("monocyte").unwrap();
        assert_eq!(mono.count, mono.leaves.iter().map(|l| l.count).sum::<usize>());
        assert_eq!(mono.count, 3);
    }

    #[test]
    fn doctor_category_takes_precedence_in_counts() {
        let cells = vec![cell("C1", Some("成熟淋巴细胞"), Some("反应性淋巴细胞"))];
        let summary = aggregate(&cells);
        let lymph = summary.branch("lymphocyte").unwrap();
        let reactive = lymph.leaves.iter().find(|l| l.id == "reactive-lymphocyte").unwrap();
        let mature = lymph.leaves.iter().find(|l| l.id == "mature-lymphocyte").unwrap();
        assert_eq!(reactive.count, 1);
        assert_eq!(mature.count, 0);
    }

    // 回归测试：早期版本用 includes 做子串匹配，"淋巴细胞" 会同时
    // 命中多个叶类。现行为是精确匹配，子串不计数。
    #[test]
    fn substring_matches_are_not_counted() {
        let cells = vec![cell("C1", Some("淋巴细胞"), None)];
        let summary = aggregate(&cells);
        assert_eq!(summary.matched_total(), 0);
        assert_eq!(summary.unmatched, 1);
    }

    #[test]
    fn unmatched_categories_are_dropped_but_reported() {
        let cells = vec![
            cell("C1", Some("不存在的类别"), None),
            cell("C2", Some("成熟淋巴细胞"), None),
            cell("C3", None, None),
        ];
        let summary = aggregate(&cells);
        assert_eq!(summary.matched_total(), 1);
        // 完全未分类的细胞不计入 unmatched，只有带类别却无处可归的才算
        assert_eq!(summary.unmatched, 1);
    }

    #[test]
    fn gallery_is_explicit_empty_state_for_zero_matches() {
        let cells = vec![cell("C1", Some("成熟淋巴细胞"), None)];
        assert!(matches!(gallery(&cells, "原始红细胞"), LeafGallery::Empty));
    }

    #[test]
    fn gallery_truncates_past_display_cap() {
        let cells: Vec<CellClassification> = (0..100)
            .map(|i| cell(&format!("C{}", i), Some("分叶核粒细胞"), None))
            .collect();
        match gallery(&cells, "分叶核粒细胞") {
            LeafGallery::Images { cells, truncated } => {
                assert_eq!(cells.len(), MAX_GALLERY_IMAGES);
                assert_eq!(truncated, 100 - MAX_GALLERY_IMAGES);
            }
            LeafGallery::Empty => panic!("expected images"),
        }
    }
}
