//! Page windows over a target's post count.
use std::ops::RangeInclusive;

pub const ITEMS_PER_PAGE: u32 = 5;

/// Number of pages needed for `total_count` items (`ceil(total / per_page)`).
pub fn total_pages(total_count: u64, items_per_page: u32) -> u32 {
    if items_per_page == 0 {
        return 0;
    }
    let per = items_per_page as u64;
    u32::try_from(total_count.div_ceil(per)).unwrap_or(u32::MAX)
}

/// Clamp a requested page into `[1, total_pages]`.
pub fn clamp_page(page: i64, total_pages: u32) -> u32 {
    page.clamp(1, total_pages.max(1) as i64) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    /// One-based absolute item numbers selectable on this page.
    pub indices: RangeInclusive<u64>,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Selectable item numbers plus prev/next flags for `current_page`.
pub fn window(total_count: u64, items_per_page: u32, current_page: u32) -> PageWindow {
    let pages = total_pages(total_count, items_per_page);
    let page = clamp_page(current_page as i64, pages) as u64;
    let per = items_per_page as u64;
    let start = (page - 1) * per + 1;
    let end = (page * per).min(total_count);
    PageWindow {
        indices: start..=end,
        has_prev: page > 1,
        has_next: page < pages as u64,
    }
}
