/// Offset paging for list views. The API has no total count, so a short
/// page means there is nothing after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: i64,
    page_size: i64,
    last_len: Option<usize>,
}

impl Pager {
    pub const PAGE_SIZE: i64 = 20;

    pub fn new(page_size: i64) -> Self {
        Self {
            page: 0,
            page_size,
            last_len: None,
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn skip(&self) -> i64 {
        self.page * self.page_size
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn record(&mut self, rows: usize) {
        self.last_len = Some(rows);
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        matches!(self.last_len, Some(len) if len as i64 >= self.page_size)
    }

    pub fn prev(&mut self) {
        if self.has_prev() {
            self.page -= 1;
            self.last_len = None;
        }
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.page += 1;
            self.last_len = None;
        }
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.last_len = None;
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(Self::PAGE_SIZE)
    }
}
