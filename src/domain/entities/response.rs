use serde::Serialize;

use crate::constants;

/// `{success: true, data}` envelope shared by every successful response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse { success: true, data }
    }
}

impl ApiResponse<serde_json::Value> {
    /// `data: {}`, used by deletions.
    pub fn empty() -> Self {
        ApiResponse::ok(serde_json::json!({}))
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub total: i64,
    pub data: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>, total: i64) -> Self {
        ListResponse {
            success: true,
            count: data.len(),
            total,
            data,
        }
    }
}

/// 1-based pagination shared by the listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub const MAX_PER_PAGE: u32 = constants::MAX_PER_PAGE;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Page {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(constants::DEFAULT_PER_PAGE).clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * (self.per_page as i64)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_counts_its_data() {
        let body = serde_json::to_value(ListResponse::new(vec![1, 2, 3], 10)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 3);
        assert_eq!(body["total"], 10);
    }

    #[test]
    fn empty_envelope_has_an_empty_object() {
        let body = serde_json::to_value(ApiResponse::empty()).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": {}}));
    }

    #[test]
    fn pages_are_clamped() {
        let page = Page::new(Some(0), Some(1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Page::MAX_PER_PAGE);
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }
}
