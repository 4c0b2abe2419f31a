use std::ops::Range;

/// 1-based page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    per_page: usize,
}

impl Pager {
    pub fn new(per_page: usize) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Row offset of the first item on the current page.
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.per_page
    }

    pub fn total_pages(&self, total_items: usize) -> usize {
        total_items.div_ceil(self.per_page)
    }

    /// Moves to `page`, clamped to the pages that exist. An empty list still
    /// has page 1.
    pub fn go_to(&mut self, page: usize, total_items: usize) {
        let last = self.total_pages(total_items).max(1);
        self.page = page.clamp(1, last);
    }

    pub fn next(&mut self, total_items: usize) {
        self.go_to(self.page + 1, total_items);
    }

    pub fn prev(&mut self, total_items: usize) {
        self.go_to(self.page.saturating_sub(1), total_items);
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Index range of the current page within a list of `total_items`.
    pub fn window(&self, total_items: usize) -> Range<usize> {
        let start = self.offset().min(total_items);
        let end = (start + self.per_page).min(total_items);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.window(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_partial_last_page() {
        let pager = Pager::new(10);
        assert_eq!(pager.total_pages(0), 0);
        assert_eq!(pager.total_pages(10), 1);
        assert_eq!(pager.total_pages(23), 3);
    }

    #[test]
    fn slices_current_page() {
        let items: Vec<u32> = (0..23).collect();
        let mut pager = Pager::new(10);
        pager.go_to(3, items.len());
        assert_eq!(pager.slice(&items), &[20, 21, 22]);
        assert_eq!(pager.offset(), 20);
    }

    #[test]
    fn clamps_out_of_range_pages() {
        let mut pager = Pager::new(12);
        pager.go_to(9, 30);
        assert_eq!(pager.page(), 3);
        pager.go_to(0, 30);
        assert_eq!(pager.page(), 1);
        pager.go_to(4, 0);
        assert_eq!(pager.page(), 1);
    }

    #[test]
    fn next_and_prev_stay_in_bounds() {
        let mut pager = Pager::new(10);
        pager.prev(15);
        assert_eq!(pager.page(), 1);
        pager.next(15);
        pager.next(15);
        assert_eq!(pager.page(), 2);
    }
}
