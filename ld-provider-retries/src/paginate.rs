//! Draining offset/limit list endpoints.

use crate::error::ExecError;
use std::future::Future;
use tracing::debug;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total size of the collection as reported by the server.
    pub total_count: usize,
}

impl<T> Page<T> {
    /// Create a page.
    pub fn new(items: Vec<T>, total_count: usize) -> Self {
        Self { items, total_count }
    }
}

/// Position of a list-all call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageCursor {
    offset: usize,
    /// Latest server-reported total, known after the first page.
    total_count: Option<usize>,
    page_size: usize,
}

impl PageCursor {
    fn start(page_size: usize) -> Self {
        Self {
            offset: 0,
            total_count: None,
            page_size,
        }
    }

    fn is_complete(&self, collected: usize) -> bool {
        self.total_count.is_some_and(|total| collected >= total)
    }
}

/// Fetches every page of a collection.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: usize,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE_SIZE)
    }
}

impl Paginator {
    /// Page size used when none is configured.
    pub const DEFAULT_PAGE_SIZE: usize = 20;

    /// Create a paginator. A page size of zero is raised to one.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Requested page size.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Call `fetch_page(offset, limit)` until the reported total is collected.
    ///
    /// The offset advances by the number of items actually returned, so short
    /// pages are followed by another request. The first error ends the call and
    /// discards what was collected. An empty page before the total is reached
    /// fails with [`ExecError::PageStalled`].
    pub async fn drain_all<T, E, F, Fut>(&self, mut fetch_page: F) -> Result<Vec<T>, E>
    where
        F: FnMut(usize, usize) -> Fut,
        Fut: Future<Output = Result<Page<T>, E>>,
        E: From<ExecError>,
    {
        let mut cursor = PageCursor::start(self.page_size);
        let mut items = Vec::new();

        loop {
            let page = fetch_page(cursor.offset, cursor.page_size).await?;
            let fetched = page.items.len();
            cursor.total_count = Some(page.total_count);
            items.extend(page.items);

            debug!(
                offset = cursor.offset,
                fetched,
                collected = items.len(),
                total = page.total_count,
                "Fetched page"
            );

            if cursor.is_complete(items.len()) {
                return Ok(items);
            }
            if fetched == 0 {
                return Err(ExecError::PageStalled {
                    offset: cursor.offset,
                    total: page.total_count,
                }
                .into());
            }
            cursor.offset += fetched;
        }
    }
}
