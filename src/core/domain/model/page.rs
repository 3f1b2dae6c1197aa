//! Pagination primitives for list queries.

use crate::core::domain::model::instance::InstanceStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 100;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of rows matching the filter across all pages.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
}

impl<T> Page<T> {
    /// Cuts `page` (1-based) out of an already filtered and ordered list.
    pub fn paginate(rows: Vec<T>, page: Option<usize>, per_page: Option<usize>) -> Self {
        let page = page.unwrap_or(1).max(1);
        let per_page = per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let total = rows.len();
        let items = rows
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Self {
            items,
            total,
            page,
            per_page,
        }
    }

    /// Number of pages needed to show `total` rows.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page)
    }
}

/// Filter options accepted by instance listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceFilter {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub project_id: Option<Uuid>,
    pub node_id: Option<Uuid>,
    pub status: Option<InstanceStatus>,
}
