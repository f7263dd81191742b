//! Offset pagination over the source's list endpoints.
//!
//! Every listing walk in the harvest engine goes through
//! [`fetch_all_pages`] so the termination rules live in one place: a short
//! or empty page means the listing is exhausted, and an item cap truncates
//! the result. A mid-walk failure never discards pages already fetched;
//! the caller gets everything collected so far plus the error.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::source::SourceError;

/// Default page size for all list endpoints.
pub const PAGE_SIZE: u32 = 50;

/// The outcome of a full pagination walk.
///
/// `error` being set does not mean `items` is empty: a failure on page
/// four still yields three pages of items.
#[derive(Debug)]
pub struct PageSet<T> {
    /// Items accumulated across all fetched pages, cap applied.
    pub items: Vec<T>,
    /// Number of page requests issued.
    pub requests: u32,
    /// True when the item cap cut the walk short.
    pub truncated: bool,
    /// The error that ended the walk early, if any.
    pub error: Option<SourceError>,
}

impl<T> PageSet<T> {
    /// True when the walk saw every available item.
    pub fn is_complete(&self) -> bool {
        !self.truncated && self.error.is_none()
    }
}

/// Walk a paginated listing to exhaustion, the item cap, or the first error.
///
/// `fetch` is called with the item offset of each page and must return at
/// most `page_size` items; a short page terminates the walk. `delay` is
/// applied between pages, never after the last one.
pub async fn fetch_all_pages<'a, T, F>(
    mut fetch: F,
    page_size: u32,
    max_items: usize,
    delay: Duration,
) -> PageSet<T>
where
    F: FnMut(u32) -> BoxFuture<'a, Result<Vec<T>, SourceError>>,
{
    let mut set = PageSet {
        items: Vec::new(),
        requests: 0,
        truncated: false,
        error: None,
    };
    let mut offset = 0u32;

    loop {
        let page = match fetch(offset).await {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!("pagination stopped at offset {offset}: {e}");
                set.error = Some(e);
                return set;
            }
        };
        set.requests += 1;

        let short_page = (page.len() as u32) < page_size;
        set.items.extend(page);

        if set.items.len() >= max_items {
            // reaching the cap on a final short page is not a truncation
            let overflow = set.items.len() > max_items;
            set.items.truncate(max_items);
            set.truncated = overflow || !short_page;
            return set;
        }
        if short_page {
            return set;
        }

        offset += page_size;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
