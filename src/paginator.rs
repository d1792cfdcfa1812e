pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Splits `count` items into pages of `per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    count: u64,
    per_page: u32,
}

impl Paginator {
    pub fn new(count: u64, per_page: u32) -> Self {
        Self {
            count,
            per_page: per_page.max(1),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u32 {
        if self.count == 0 {
            return 1;
        }
        self.count.div_ceil(u64::from(self.per_page)) as u32
    }

    /// Resolves a raw `?page=` value leniently: missing or non-numeric gives
    /// the first page, any out of range number gives the last one.
    pub fn page_number(&self, raw: Option<&str>) -> u32 {
        let last = self.num_pages();
        match raw.map(|raw| raw.trim().parse::<i64>()) {
            Some(Ok(n)) if n >= 1 && n <= i64::from(last) => n as u32,
            Some(Ok(_)) => last,
            _ => 1,
        }
    }

    pub fn offset(&self, number: u32) -> u64 {
        u64::from(number.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn page<T>(&self, number: u32, items: Vec<T>) -> Page<T> {
        Page {
            items,
            number,
            num_pages: self.num_pages(),
            count: self.count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub num_pages: u32,
    pub count: u64,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}
