//! 图像路径解析
//!
//! 后端不同接口返回的图像引用格式并不统一：完整 URL、带接口前缀的
//! 相对路径、其他服务器相对路径、以及含中文/空格段的原始存储键都有。
//! 本模块把任意一种统一成 (存储键, 可访问 URL)。解析过程不会失败：
//! 解码异常只记录日志，调用方总能拿到尽力而为的结果。

use std::borrow::Cow;

use tracing::warn;

/// 图像查看接口前缀
pub const IMAGE_VIEW_PREFIX: &str = "/api/images/view/";

/// 解析结果
///
/// `storage_path` 是规范化的存储键，用于相等比较、过滤与删除；
/// `url` 是浏览器/HTTP 客户端可直接访问的地址，可能携带 token 查询参数
/// （`<img>` 标签无法携带请求头，只能走查询参数）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub storage_path: String,
    pub url: String,
}

impl ResolvedImage {
    pub fn is_empty(&self) -> bool {
        self.storage_path.is_empty() && self.url.is_empty()
    }
}

/// 两段式过滤结果
#[derive(Debug, Clone)]
pub struct FilterOutcome<T> {
    pub items: Vec<T>,
    /// 过滤会清空非空列表时回退为不过滤，置位此标志供调用方告警
    pub bypassed: bool,
}

/// 解析一条图像引用
pub fn resolve_image_path(raw: &str, base_url: &str, token: Option<&str>) -> ResolvedImage {
    if raw.is_empty() {
        return ResolvedImage {
            storage_path: String::new(),
            url: String::new(),
        };
    }

    let base = base_url.trim_end_matches('/');

    let (storage_path, url) = if raw.starts_with("http://") || raw.starts_with("https://") {
        // 完整 URL 原样使用；能识别出本服务的查看前缀时反推存储键
        let full_prefix = format!("{}{}", base, IMAGE_VIEW_PREFIX);
        let storage = raw
            .strip_prefix(&full_prefix)
            .unwrap_or(raw)
            .to_string();
        (storage, raw.to_string())
    } else if let Some(rest) = raw.strip_prefix(IMAGE_VIEW_PREFIX) {
        (rest.to_string(), format!("{}{}", base, raw))
    } else if raw.starts_with('/') {
        (raw.to_string(), format!("{}{}", base, raw))
    } else {
        // 原始存储键：逐段编码，段内的中文、空格等都会被转义，
        // 段分隔符 `/` 保持原样
        let encoded = raw
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        (
            raw.to_string(),
            format!("{}{}{}", base, IMAGE_VIEW_PREFIX, encoded),
        )
    };

    let storage_path = decode_storage_path(&storage_path);
    let url = attach_token(url, base, token);

    ResolvedImage { storage_path, url }
}

/// 存储键尽力解码回可读形式，并去掉前导 `/`
fn decode_storage_path(path: &str) -> String {
    let decoded: Cow<'_, str> = match urlencoding::decode(path) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!("failed to decode storage path {:?}: {}", path, err);
            Cow::Borrowed(path)
        }
    };
    decoded.trim_start_matches('/').to_string()
}

/// 同源 URL 追加 token 查询参数
fn attach_token(url: String, base: &str, token: Option<&str>) -> String {
    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return url,
    };
    if origin_of(&url) != origin_of(base) {
        return url;
    }
    if has_token_param(&url) {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", url, separator, urlencoding::encode(token))
}

/// 提取 `scheme://host[:port]` 部分
fn origin_of(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")?;
    let authority = &url[scheme_end + 3..];
    let end = authority
        .find(['/', '?', '#'])
        .map(|i| scheme_end + 3 + i)
        .unwrap_or(url.len());
    Some(&url[..end])
}

fn has_token_param(url: &str) -> bool {
    url.split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .any(|pair| pair.strip_prefix("token=").is_some())
        })
        .unwrap_or(false)
}

/// 按样本编号过滤图像，防止后端串样
///
/// 第一遍保留存储键包含样本编号的条目；若过滤结果为空而原列表非空，
/// 回退为保留全部条目并置 `bypassed`，由调用方决定告警方式。
pub fn filter_by_sample_number<T, F>(
    items: Vec<T>,
    sample_number: &str,
    path_of: F,
) -> FilterOutcome<T>
where
    F: Fn(&T) -> &str,
{
    if sample_number.is_empty() || items.is_empty() {
        return FilterOutcome {
            items,
            bypassed: false,
        };
    }

    let matched: Vec<bool> = items
        .iter()
        .map(|item| path_of(item).contains(sample_number))
        .collect();

    if matched.iter().any(|m| *m) {
        let items = items
            .into_iter()
            .zip(matched)
            .filter_map(|(item, keep)| keep.then_some(item))
            .collect();
        FilterOutcome {
            items,
            bypassed: false,
        }
    } else {
        FilterOutcome {
            items,
            bypassed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8000";

    #[test]
    fn empty_input_yields_empty_result() {
        let resolved = resolve_image_path("", BASE, Some("tok"));
        assert!(resolved.is_empty());
    }

    #[test]
    fn raw_ascii_key_gets_view_prefix() {
        let resolved = resolve_image_path("users/1/S001/cell_001.png", BASE, None);
        assert!(resolved
            .url
            .starts_with("http://localhost:8000/api/images/view/"));
        assert_eq!(resolved.storage_path, "users/1/S001/cell_001.png");
        assert_eq!(
            resolved.url,
            "http://localhost:8000/api/images/view/users/1/S001/cell_001.png"
        );
    }

    #[test]
    fn non_ascii_segments_are_encoded_per_segment() {
        let resolved =
            resolve_image_path("users/1/S2510250025/区域图/标本 01.png", BASE, None);
        assert_eq!(
            resolved.url,
            "http://localhost:8000/api/images/view/users/1/S2510250025/%E5%8C%BA%E5%9F%9F%E5%9B%BE/%E6%A0%87%E6%9C%AC%2001.png"
        );
        // 存储键保持可读
        assert_eq!(resolved.storage_path, "users/1/S2510250025/区域图/标本 01.png");
    }

    #[test]
    fn segment_encoding_round_trips() {
        for segment in ["区域图", "标本 01.png", "细胞图", "plain.png"] {
            let encoded = urlencoding::encode(segment);
            assert_eq!(urlencoding::decode(&encoded).unwrap(), segment);
            // 编码后的段内不会再出现 /
            assert!(!encoded.contains('/'));
        }
    }

    #[test]
    fn absolute_url_is_used_verbatim() {
        let raw = "https://cdn.example.com/a/b.png";
        let resolved = resolve_image_path(raw, BASE, Some("tok"));
        // 异源地址不追加 token
        assert_eq!(resolved.url, raw);
        assert_eq!(resolved.storage_path, "https://cdn.example.com/a/b.png");
    }

    #[test]
    fn absolute_same_origin_url_recovers_storage_key() {
        let raw = "http://localhost:8000/api/images/view/users/1/S001/%E7%BB%86%E8%83%9E%E5%9B%BE/c.png";
        let resolved = resolve_image_path(raw, BASE, None);
        assert_eq!(resolved.storage_path, "users/1/S001/细胞图/c.png");
        assert_eq!(resolved.url, raw);
    }

    #[test]
    fn view_prefixed_path_gets_base_prepended() {
        let resolved = resolve_image_path("/api/images/view/users/1/S001/c.png", BASE, None);
        assert_eq!(
            resolved.url,
            "http://localhost:8000/api/images/view/users/1/S001/c.png"
        );
        assert_eq!(resolved.storage_path, "users/1/S001/c.png");
    }

    #[test]
    fn other_relative_path_gets_base_prepended() {
        let resolved = resolve_image_path("/static/logo.png", BASE, None);
        assert_eq!(resolved.url, "http://localhost:8000/static/logo.png");
        assert_eq!(resolved.storage_path, "static/logo.png");
    }

    #[test]
    fn token_is_attached_for_same_origin_urls() {
        let resolved = resolve_image_path("users/1/S001/c.png", BASE, Some("secret"));
        assert!(resolved.url.ends_with("?token=secret"));
    }

    #[test]
    fn token_is_not_attached_twice() {
        let raw = "http://localhost:8000/api/images/view/a.png?token=already";
        let resolved = resolve_image_path(raw, BASE, Some("secret"));
        assert_eq!(resolved.url, raw);
    }

    #[test]
    fn filter_keeps_matching_paths() {
        let items = vec![
            "users/1/S001/a.png".to_string(),
            "users/1/S002/b.png".to_string(),
        ];
        let outcome = filter_by_sample_number(items, "S001", |p| p.as_str());
        assert!(!outcome.bypassed);
        assert_eq!(outcome.items, vec!["users/1/S001/a.png".to_string()]);
    }

    #[test]
    fn filter_bypasses_when_it_would_empty_the_list() {
        let items = vec!["users/1/S002/b.png".to_string()];
        let outcome = filter_by_sample_number(items.clone(), "S001", |p| p.as_str());
        assert!(outcome.bypassed);
        assert_eq!(outcome.items, items);
    }

    #[test]
    fn filter_of_empty_list_is_not_a_bypass() {
        let outcome = filter_by_sample_number(Vec::<String>::new(), "S001", |p| p.as_str());
        assert!(!outcome.bypassed);
        assert!(outcome.items.is_empty());
    }
}
