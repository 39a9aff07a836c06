//! Cursor arithmetic for paginated fetches.
//!
//! Everything here is pure: the controller that owns the cursor lives in the
//! store crate and only calls [`next_page`] and [`Pagination::window`].

use serde::{Deserialize, Serialize};

/// How the fetch window grows as the page index changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaginationMode {
    /// Every page holds exactly `fetch_limit` records.
    #[default]
    FixedPageCount,
    /// Page `k` holds the first `fetch_limit * k` records.
    VariablePageCount,
}

/// Direction signal sent to a pagination controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CursorDirection {
    Backward,
    Remain,
    Forward,
}

/// Page-size policy of a paginated stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub fetch_limit: usize,
    pub fetch_offset: usize,
    pub mode: PaginationMode,
}

/// Half-open range `[offset, offset + limit)` of the sorted fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub offset: usize,
    pub limit: usize,
}

impl FetchWindow {
    #[must_use]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

/// First page index. Pages are 1-based.
pub const FIRST_PAGE: u32 = 1;

/// Computes the page after applying `direction` to `current`, never below 1.
#[must_use]
pub fn next_page(current: u32, direction: CursorDirection) -> u32 {
    let next = match direction {
        CursorDirection::Forward => current.saturating_add(1),
        CursorDirection::Backward => current.saturating_sub(1),
        CursorDirection::Remain => current,
    };
    next.max(FIRST_PAGE)
}

impl Pagination {
    #[must_use]
    pub fn new(fetch_limit: usize, fetch_offset: usize, mode: PaginationMode) -> Self {
        Self {
            fetch_limit,
            fetch_offset,
            mode,
        }
    }

    /// Window to fetch for `page` (clamped to at least 1).
    #[must_use]
    pub fn window(&self, page: u32) -> FetchWindow {
        let page = usize::try_from(page.max(FIRST_PAGE)).unwrap_or(usize::MAX);
        match self.mode {
            PaginationMode::FixedPageCount => FetchWindow {
                offset: self
                    .fetch_offset
                    .saturating_add((page - 1).saturating_mul(self.fetch_limit)),
                limit: self.fetch_limit,
            },
            PaginationMode::VariablePageCount => FetchWindow {
                offset: 0,
                limit: self.fetch_limit.saturating_mul(page),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn next_page_moves_and_clamps() {
        assert_eq!(next_page(1, CursorDirection::Forward), 2);
        assert_eq!(next_page(3, CursorDirection::Backward), 2);
        assert_eq!(next_page(1, CursorDirection::Backward), 1);
        assert_eq!(next_page(0, CursorDirection::Remain), 1);
        assert_eq!(next_page(5, CursorDirection::Remain), 5);
    }

    #[test]
    fn fixed_mode_page_three_of_fifty() {
        let p = Pagination::new(50, 0, PaginationMode::FixedPageCount);
        assert_eq!(p.window(3), FetchWindow { offset: 100, limit: 50 });
        assert_eq!(p.window(3).end(), 150);
    }

    #[test]
    fn fixed_mode_honours_base_offset() {
        let p = Pagination::new(10, 5, PaginationMode::FixedPageCount);
        assert_eq!(p.window(1), FetchWindow { offset: 5, limit: 10 });
        assert_eq!(p.window(2), FetchWindow { offset: 15, limit: 10 });
    }

    #[test]
    fn variable_mode_grows_from_zero() {
        let p = Pagination::new(10, 7, PaginationMode::VariablePageCount);
        assert_eq!(p.window(1), FetchWindow { offset: 0, limit: 10 });
        assert_eq!(p.window(4), FetchWindow { offset: 0, limit: 40 });
    }

    #[test]
    fn page_zero_is_treated_as_first_page() {
        let p = Pagination::new(10, 0, PaginationMode::FixedPageCount);
        assert_eq!(p.window(0), p.window(1));
    }

    proptest! {
        #[test]
        fn variable_window_is_superset_of_previous(limit in 1_usize..500, page in 2_u32..200) {
            let p = Pagination::new(limit, 0, PaginationMode::VariablePageCount);
            let prev = p.window(page - 1);
            let cur = p.window(page);
            prop_assert_eq!(cur.offset, prev.offset);
            prop_assert!(cur.end() > prev.end());
            prop_assert_eq!(cur.limit, limit * page as usize);
        }

        #[test]
        fn fixed_windows_are_adjacent(limit in 1_usize..500, offset in 0_usize..1000, page in 1_u32..200) {
            let p = Pagination::new(limit, offset, PaginationMode::FixedPageCount);
            prop_assert_eq!(p.window(page).end(), p.window(page + 1).offset);
            prop_assert_eq!(p.window(page).limit, limit);
        }

        #[test]
        fn next_page_is_never_below_one(current in 0_u32..10, forward in any::<bool>()) {
            let dir = if forward { CursorDirection::Forward } else { CursorDirection::Backward };
            prop_assert!(next_page(current, dir) >= 1);
        }
    }
}
