//! Occurrence search filters and paging.

use serde::{Deserialize, Serialize};

use crate::model::{Occurrence, RoomId, UserId};

/// Which occurrences a search returns. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    pub room_id: Option<RoomId>,
    /// Matches occurrences the user created or attends.
    pub user_id: Option<UserId>,
}

impl SearchFilter {
    pub fn matches(&self, occurrence: &Occurrence) -> bool {
        let title_ok = self.title.as_deref().map_or(true, |needle| {
            occurrence
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase())
        });
        let room_ok = self.room_id.map_or(true, |room| occurrence.room_id == room);
        let user_ok = self.user_id.map_or(true, |user| occurrence.involves(user));
        title_ok && room_ok && user_ok
    }
}

/// A 1-based page request. A `page_size` of 0 selects the configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub page_no: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_no: 1,
            page_size: 0,
        }
    }
}

/// One page of results plus paging metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_no: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<T> {
    /// Cut one page out of the full, already ordered result list.
    ///
    /// `page_no` and `page_size` below 1 are treated as 1.
    /// A page past the end comes back empty with correct totals.
    pub fn slice(all: Vec<T>, page_no: usize, page_size: usize) -> Self {
        let page_no = page_no.max(1);
        let page_size = page_size.max(1);
        let total_items = all.len();
        let total_pages = total_items.div_ceil(page_size);
        let items = all
            .into_iter()
            .skip((page_no - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Self {
            items,
            page_no,
            page_size,
            total_pages,
            total_items,
        }
    }
}
