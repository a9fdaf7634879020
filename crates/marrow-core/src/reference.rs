//! 报告参考范围计算
//!
//! 参考值字符串的文法：`"min~max"`、`"~max"`、`"min~"`、`"~"` 或空。
//! 非法字符串不产生指示符，也不报错。

/// 解析后的参考范围，min/max 均可缺省
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ReferenceRange {
    /// 解析参考值字符串，非法输入返回 None
    pub fn parse(reference: &str) -> Option<ReferenceRange> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        let (min, max) = reference.split_once('~')?;
        let min = parse_bound(min)?;
        let max = parse_bound(max)?;
        Some(ReferenceRange { min, max })
    }
}

/// 空段视为无界，非空段必须是合法数字
fn parse_bound(text: &str) -> Option<Option<f64>> {
    let text = text.trim();
    if text.is_empty() {
        return Some(None);
    }
    text.parse::<f64>().ok().map(Some)
}

/// 超出参考范围的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeIndicator {
    /// 偏高
    Above,
    /// 偏低
    Below,
}

impl RangeIndicator {
    pub fn as_label(&self) -> &'static str {
        match self {
            RangeIndicator::Above => "偏高",
            RangeIndicator::Below => "偏低",
        }
    }
}

/// 百分比：总数为 0 时返回 0
pub fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * count as f64 / total as f64
}

/// 计算指示符：高于上限为偏高，低于下限为偏低，否则无指示
pub fn indicator(percent: f64, reference: &str) -> Option<RangeIndicator> {
    let range = ReferenceRange::parse(reference)?;
    if let Some(max) = range.max {
        if percent > max {
            return Some(RangeIndicator::Above);
        }
    }
    if let Some(min) = range.min {
        if percent < min {
            return Some(RangeIndicator::Below);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_range() {
        assert_eq!(
            ReferenceRange::parse("45~65"),
            Some(ReferenceRange { min: Some(45.0), max: Some(65.0) })
        );
    }

    #[test]
    fn parses_open_ended_ranges() {
        assert_eq!(
            ReferenceRange::parse("~10"),
            Some(ReferenceRange { min: None, max: Some(10.0) })
        );
        assert_eq!(
            ReferenceRange::parse("3~"),
            Some(ReferenceRange { min: Some(3.0), max: None })
        );
        assert_eq!(
            ReferenceRange::parse("~"),
            Some(ReferenceRange { min: None, max: None })
        );
    }

    #[test]
    fn malformed_references_yield_none() {
        assert_eq!(ReferenceRange::parse(""), None);
        assert_eq!(ReferenceRange::parse("abc"), None);
        assert_eq!(ReferenceRange::parse("1-2"), None);
        assert_eq!(ReferenceRange::parse("a~b"), None);
    }

    #[test]
    fn indicator_matches_contract() {
        assert_eq!(indicator(70.0, "45~65"), Some(RangeIndicator::Above));
        assert_eq!(indicator(50.0, "45~65"), None);
        assert_eq!(indicator(40.0, "45~65"), Some(RangeIndicator::Below));
    }

    #[test]
    fn open_bounds_only_trigger_on_defined_side() {
        assert_eq!(indicator(99.0, "45~"), None);
        assert_eq!(indicator(1.0, "45~"), Some(RangeIndicator::Below));
        assert_eq!(indicator(99.0, "~65"), Some(RangeIndicator::Above));
        assert_eq!(indicator(1.0, "~65"), None);
    }

    #[test]
    fn malformed_reference_never_indicates() {
        assert_eq!(indicator(100.0, "参考值"), None);
        assert_eq!(indicator(100.0, ""), None);
    }

    #[test]
    fn percent_of_zero_total_is_zero() {
        assert_eq!(percent(10, 0), 0.0);
        assert!((percent(45, 90) - 50.0).abs() < f64::EPSILON);
    }
}
