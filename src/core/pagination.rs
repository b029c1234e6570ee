//! Pagination metadata and navigation links

use serde::Serialize;

/// Pagination metadata attached to list documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PaginationMeta {
    /// Total number of pages (after filters)
    pub total_pages: u64,

    /// Number of records in this response
    pub records_on_this_page: usize,

    /// Requested page size
    pub page_size: u64,
}

/// Navigation links of a paginated list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationLinks {
    pub first: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,

    #[serde(rename = "self")]
    pub self_link: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,
}

/// Ceiling division; zero rows means zero pages
pub fn total_pages(total_rows: u64, page_size: u64) -> u64 {
    if total_rows == 0 || page_size == 0 {
        0
    } else {
        total_rows.div_ceil(page_size)
    }
}

/// Where pagination links point to
///
/// `query` holds the request's other query parameters in order; any
/// existing `page[...]` parameters are dropped and rewritten per link.
#[derive(Debug, Clone, Default)]
pub struct LinkBase {
    pub base_url: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl LinkBase {
    pub fn new(base_url: &str, path: &str, query: Vec<(String, String)>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            path: path.to_string(),
            query: query
                .into_iter()
                .filter(|(k, _)| !k.starts_with("page["))
                .collect(),
        }
    }

    /// Full URL of one page
    pub fn page_url(&self, number: u64, size: u64) -> String {
        let mut params: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_key(k), urlencoding::encode(v)))
            .collect();
        params.push(format!("page[number]={}", number));
        params.push(format!("page[size]={}", size));

        format!("{}{}?{}", self.base_url, self.path, params.join("&"))
    }
}

/// Percent-encode a query key but keep JSON:API brackets readable
fn encode_key(key: &str) -> String {
    urlencoding::encode(key)
        .replace("%5B", "[")
        .replace("%5D", "]")
}

/// Compute the pagination meta and links of one list response
///
/// A page number of 0 is treated as the first page.
pub fn paginate(
    total_rows: u64,
    page_size: u64,
    current_page: u64,
    returned: usize,
    base: &LinkBase,
) -> (PaginationMeta, PaginationLinks) {
    let pages = total_pages(total_rows, page_size);
    let current = current_page.max(1);

    let meta = PaginationMeta {
        total_pages: pages,
        records_on_this_page: returned,
        page_size,
    };

    let links = PaginationLinks {
        first: base.page_url(1, page_size),
        prev: (current > 1).then(|| base.page_url(current - 1, page_size)),
        self_link: base.page_url(current, page_size),
        next: (current < pages).then(|| base.page_url(current + 1, page_size)),
        last: (pages > 0).then(|| base.page_url(pages, page_size)),
    };

    (meta, links)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> LinkBase {
        LinkBase::new(
            "http://crm.local/",
            "/V8/module/Accounts",
            vec![
                ("sort".to_string(), "-name".to_string()),
                ("page[size]".to_string(), "10".to_string()),
                ("filter[name][like]".to_string(), "Acme %".to_string()),
            ],
        )
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(25, 10), 3);
        for rows in 0..50u64 {
            for size in 1..12u64 {
                let expected = (rows as f64 / size as f64).ceil() as u64;
                assert_eq!(total_pages(rows, size), expected);
            }
        }
    }

    #[test]
    fn test_middle_page_has_prev_and_next() {
        let (meta, links) = paginate(25, 10, 2, 10, &base());
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.records_on_this_page, 10);
        assert!(links.prev.as_deref().unwrap().contains("page[number]=1"));
        assert!(links.self_link.contains("page[number]=2"));
        assert!(links.next.as_deref().unwrap().contains("page[number]=3"));
        assert!(links.last.as_deref().unwrap().contains("page[number]=3"));
        assert!(links.first.contains("page[number]=1"));
    }

    #[test]
    fn test_boundaries_omit_prev_and_next() {
        let (_, first) = paginate(25, 10, 1, 10, &base());
        assert!(first.prev.is_none());
        assert!(first.next.is_some());

        let (_, last) = paginate(25, 10, 3, 5, &base());
        assert!(last.prev.is_some());
        assert!(last.next.is_none());
    }

    #[test]
    fn test_empty_result_has_no_last() {
        let (meta, links) = paginate(0, 10, 1, 0, &base());
        assert_eq!(meta.total_pages, 0);
        assert!(links.last.is_none());
        assert!(links.next.is_none());
    }

    #[test]
    fn test_page_url_keeps_other_params() {
        let url = base().page_url(2, 10);
        assert_eq!(
            url,
            "http://crm.local/V8/module/Accounts?sort=-name&filter[name][like]=Acme%20%25&page[number]=2&page[size]=10"
        );
    }

    #[test]
    fn test_meta_serializes_kebab_case() {
        let (meta, _) = paginate(25, 10, 1, 10, &base());
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["total-pages"], 3);
        assert_eq!(json["records-on-this-page"], 10);
    }
}
