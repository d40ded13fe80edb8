//! Windowed page list with ellipsis markers
//!
//! Maps `(total_items, page_size, current_page, sibling_count)` to the page
//! numbers a pager should render. The first and last page are always shown,
//! the current page is surrounded by `sibling_count` neighbours on each side,
//! and gaps are collapsed into [`PageItem::Ellipsis`] markers.
//!
//! ```
//! use dataharvest::pagination::{paginate, PageItem};
//!
//! let window = paginate(100, 10, 5, 1);
//! assert_eq!(window.total_pages, 10);
//! assert_eq!(window.items.first(), Some(&PageItem::Page(1)));
//! assert_eq!(window.items.last(), Some(&PageItem::Page(10)));
//! ```

use serde::Serialize;

pub const DEFAULT_SIBLING_COUNT: usize = 1;

/// One slot of the rendered pager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "page", rename_all = "snake_case")]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

impl PageItem {
    pub fn page(&self) -> Option<usize> {
        match self {
            PageItem::Page(n) => Some(*n),
            PageItem::Ellipsis => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub items: Vec<PageItem>,
    pub total_pages: usize,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

/// Number of pages needed for `total_items` at `page_size` per page.
///
/// A zero page size is treated as one item per page.
pub fn total_pages(total_items: usize, page_size: usize) -> usize {
    total_items.div_ceil(page_size.max(1))
}

/// Compute the pagination window.
pub fn paginate(
    total_items: usize,
    page_size: usize,
    current_page: usize,
    sibling_count: usize,
) -> Pagination {
    let total = total_pages(total_items, page_size);

    Pagination {
        items: window(total, current_page, sibling_count),
        total_pages: total,
        has_next_page: current_page < total,
        has_previous_page: current_page > 1,
    }
}

fn window(total: usize, current: usize, siblings: usize) -> Vec<PageItem> {
    // first + last + current + two ellipses
    let slots = siblings + 5;
    // pages rendered on the side that has no ellipsis
    let edge_count = 3 + 2 * siblings;

    // An ellipsis must hide at least one page
    if slots.max(edge_count + 1) >= total {
        return (1..=total).map(PageItem::Page).collect();
    }

    let left_sibling = current.saturating_sub(siblings).max(1);
    let right_sibling = (current + siblings).min(total);

    // A single hidden page is shown rather than collapsed
    let show_left = left_sibling > 2;
    let show_right = right_sibling < total - 1;

    match (show_left, show_right) {
        (false, true) => {
            let mut items: Vec<PageItem> = (1..=edge_count).map(PageItem::Page).collect();
            items.push(PageItem::Ellipsis);
            items.push(PageItem::Page(total));
            items
        }
        (true, false) => {
            let mut items = vec![PageItem::Page(1), PageItem::Ellipsis];
            items.extend((total - edge_count + 1..=total).map(PageItem::Page));
            items
        }
        (true, true) => {
            let mut items = vec![PageItem::Page(1), PageItem::Ellipsis];
            items.extend((left_sibling..=right_sibling).map(PageItem::Page));
            items.push(PageItem::Ellipsis);
            items.push(PageItem::Page(total));
            items
        }
        (false, false) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(p: &Pagination) -> Vec<usize> {
        p.items.iter().filter_map(PageItem::page).collect()
    }

    #[test]
    fn test_empty_collection() {
        let p = paginate(0, 10, 1, 1);
        assert_eq!(p.total_pages, 0);
        assert!(p.items.is_empty());
        assert!(!p.has_next_page);
        assert!(!p.has_previous_page);
    }

    #[test]
    fn test_few_pages_render_everything() {
        let p = paginate(23, 10, 1, 1);
        assert_eq!(p.total_pages, 3);
        assert_eq!(
            p.items,
            vec![PageItem::Page(1), PageItem::Page(2), PageItem::Page(3)]
        );
    }

    #[test]
    fn test_page_past_end_has_no_next() {
        let p = paginate(23, 10, 3, 1);
        assert!(!p.has_next_page);
        assert!(p.has_previous_page);

        let p = paginate(23, 10, 4, 1);
        assert_eq!(p.total_pages, 3);
        assert!(!p.has_next_page);
    }

    #[test]
    fn test_right_ellipsis_only() {
        let p = paginate(100, 10, 1, 1);
        assert_eq!(
            p.items,
            vec![
                PageItem::Page(1),
                PageItem::Page(2),
                PageItem::Page(3),
                PageItem::Page(4),
                PageItem::Page(5),
                PageItem::Ellipsis,
                PageItem::Page(10),
            ]
        );
    }

    #[test]
    fn test_left_ellipsis_only() {
        let p = paginate(100, 10, 10, 1);
        assert_eq!(
            p.items,
            vec![
                PageItem::Page(1),
                PageItem::Ellipsis,
                PageItem::Page(6),
                PageItem::Page(7),
                PageItem::Page(8),
                PageItem::Page(9),
                PageItem::Page(10),
            ]
        );
    }

    #[test]
    fn test_both_ellipses() {
        let p = paginate(100, 10, 5, 1);
        assert_eq!(
            p.items,
            vec![
                PageItem::Page(1),
                PageItem::Ellipsis,
                PageItem::Page(4),
                PageItem::Page(5),
                PageItem::Page(6),
                PageItem::Ellipsis,
                PageItem::Page(10),
            ]
        );
    }

    #[test]
    fn test_zero_page_size_is_one_per_page() {
        assert_eq!(total_pages(4, 0), 4);
    }

    #[test]
    fn test_window_bounds_hold_for_all_inputs() {
        for total_items in 0..=120 {
            for page_size in 1..=12 {
                let total = total_pages(total_items, page_size);
                for siblings in 0..=3 {
                    for current in 1..=total.max(1) {
                        let p = paginate(total_items, page_size, current, siblings);
                        let shown = pages(&p);

                        assert_eq!(p.total_pages, total);
                        assert!(shown.iter().all(|n| (1..=total).contains(n)));
                        assert_eq!(p.has_previous_page, current > 1);
                        assert_eq!(p.has_next_page, current < total);

                        if total > 0 {
                            assert!(shown.contains(&1));
                            assert!(shown.contains(&total));
                            assert_eq!(shown.iter().filter(|n| **n == current).count(), 1);
                        }

                        // strictly increasing: no duplicates
                        assert!(shown.windows(2).all(|w| w[0] < w[1]));
                        // never two ellipses in a row
                        assert!(!p.items.windows(2).any(|w| w[0] == PageItem::Ellipsis
                            && w[1] == PageItem::Ellipsis));
                    }
                }
            }
        }
    }

    #[test]
    fn test_same_inputs_same_window() {
        for current in 1..=20 {
            assert_eq!(paginate(200, 10, current, 2), paginate(200, 10, current, 2));
        }
    }
}
