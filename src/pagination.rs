use std::fmt;

use crate::error::{DroverError, Result};
use crate::models::Account;

pub const PAGE_SIZE_OPTIONS: &[usize] = &[10, 25, 50, 100, 500];

const MAX_VISIBLE_PAGES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Named(String),
}

impl CategoryFilter {
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg.map(str::trim) {
            None | Some("") => Self::All,
            Some(name) if name.eq_ignore_ascii_case("all") => Self::All,
            Some(name) => Self::Named(name.to_string()),
        }
    }

    pub fn matches(&self, account: &Account) -> bool {
        match self {
            Self::All => true,
            Self::Named(name) => account.category.as_deref() == Some(name.as_str()),
        }
    }
}

pub fn filter_accounts<'a>(accounts: &'a [Account], filter: &CategoryFilter) -> Vec<&'a Account> {
    accounts.iter().filter(|a| filter.matches(a)).collect()
}

pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Half-open slice `[start, end)` of the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn new(total_items: usize, page: usize, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(DroverError::Other("Page size must be at least 1".into()));
        }
        let total_pages = page_count(total_items, page_size).max(1);
        if page == 0 || page > total_pages {
            return Err(DroverError::Other(format!(
                "Page {page} out of range (1-{total_pages})"
            )));
        }
        let start = ((page - 1) * page_size).min(total_items);
        let end = (page * page_size).min(total_items);
        Ok(Self {
            page,
            page_size,
            total_items,
            total_pages,
            start,
            end,
        })
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.start.min(items.len())..self.end.min(items.len())]
    }

    pub fn label(&self) -> String {
        if self.total_items == 0 {
            return "Showing 0 of 0".to_string();
        }
        format!(
            "Showing {}-{} of {}",
            self.start + 1,
            self.end,
            self.total_items
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "{n}"),
            Self::Ellipsis => f.write_str("..."),
        }
    }
}

/// Page strip with at most five numbered slots plus ellipses.
pub fn page_numbers(current: usize, total: usize) -> Vec<PageItem> {
    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(PageItem::Page).collect();
    }

    let mut start = current.saturating_sub(1).max(2);
    let mut end = (current + 1).min(total - 1);
    if current <= 2 {
        end = 4;
    } else if current >= total - 1 {
        start = total - 3;
    }

    let mut pages = vec![PageItem::Page(1)];
    if start > 2 {
        pages.push(PageItem::Ellipsis);
    }
    pages.extend((start..=end).map(PageItem::Page));
    if end < total - 1 {
        pages.push(PageItem::Ellipsis);
    }
    pages.push(PageItem::Page(total));
    pages
}

pub fn render_page_numbers(current: usize, total: usize) -> String {
    page_numbers(current, total)
        .iter()
        .map(|item| match item {
            PageItem::Page(n) if *n == current => format!("[{n}]"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
