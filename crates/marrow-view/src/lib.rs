//! # Marrow View
//!
//! 各界面的视图模型层：样本列表、图像分析、图像管理、报告分析，
//! 以及跨视图的防抖刷新。每个视图独立持有并加载自己的状态，
//! 通过会话事件总线感知别处的数据变化。

pub mod analysis;
pub mod directory;
pub mod refresh;
pub mod report;
pub mod upload;

pub use analysis::ImageAnalysisView;
pub use directory::{SampleDirectory, SampleRow, SearchForm};
pub use refresh::{spawn_refresh_listener, Refreshable, REFRESH_DEBOUNCE};
pub use report::{ReportView, REPORT_SECTIONS};
pub use upload::{AnalysisState, UploadView};
