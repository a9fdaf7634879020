//! # Marrow Core
//!
//! 骨髓血细胞分析工作站的核心模块，提供基础数据结构、错误定义、
//! 细胞分类树统计、图像路径解析与参考范围计算。

pub mod error;
pub mod image_path;
pub mod models;
pub mod reference;
pub mod taxonomy;

pub use error::{MarrowError, Result};
pub use models::*;
