/// Page position derived from the latest list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl PageCursor {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
            total,
        }
    }

    /// At least one page, even for an empty list.
    pub fn total_pages(&self) -> u32 {
        let size = u64::from(self.page_size.max(1));
        let pages = self.total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Pulls the page back inside `1..=total_pages`. Returns true if it moved.
    pub fn clamp(&mut self) -> bool {
        let last = self.total_pages();
        let clamped = self.page.clamp(1, last);
        let moved = clamped != self.page;
        self.page = clamped;
        moved
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Page reached by moving `delta` pages, if it is in bounds.
    pub fn step(&self, delta: i64) -> Option<u32> {
        let target = i64::from(self.page) + delta;
        if target >= 1 && target <= i64::from(self.total_pages()) {
            u32::try_from(target).ok()
        } else {
            None
        }
    }

    /// Rows of a locally cached list that belong to the current page.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let size = self.page_size as usize;
        let start = (self.page.saturating_sub(1) as usize).saturating_mul(size);
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(size).min(items.len());
        &items[start..end]
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new(1, crate::DEFAULT_PAGE_SIZE, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::PageCursor;

    #[test]
    fn clamps_past_the_last_page() {
        let mut cursor = PageCursor::new(5, 20, 45);
        assert_eq!(cursor.total_pages(), 3);
        assert!(cursor.clamp());
        assert_eq!(cursor.page, 3);
        assert!(!cursor.clamp());
    }

    #[test]
    fn empty_list_has_one_page() {
        let mut cursor = PageCursor::new(4, 20, 0);
        assert_eq!(cursor.total_pages(), 1);
        cursor.clamp();
        assert_eq!(cursor.page, 1);
        assert!(!cursor.has_prev());
        assert!(!cursor.has_next());
    }

    #[test]
    fn step_respects_bounds() {
        let cursor = PageCursor::new(2, 10, 25);
        assert_eq!(cursor.step(1), Some(3));
        assert_eq!(cursor.step(-1), Some(1));
        assert_eq!(cursor.step(2), None);
        assert_eq!(cursor.step(-2), None);
    }

    #[test]
    fn slice_takes_current_page_rows() {
        let items: Vec<u32> = (0..25).collect();
        let cursor = PageCursor::new(3, 10, 25);
        assert_eq!(cursor.slice(&items), &[20, 21, 22, 23, 24]);
        let past = PageCursor::new(9, 10, 25);
        assert!(past.slice(&items).is_empty());
    }
}
