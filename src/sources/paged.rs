//! Cursor-paginated source, the shape of most REST API clients.
//!
//! The fetch function receives the cursor of the page to load (`None` for the
//! first page) and returns the page's items plus the next cursor. Each page
//! becomes one chunk; cancellation is checked between pages.
//!
//! ```
//! use rowstream::sources::paged::{Page, PagedSource};
//! use rowstream::ChunkedSource;
//!
//! let api = PagedSource::new(|cursor: Option<&str>| {
//!     let page = cursor.map_or(0, |c| c.parse::<u32>().unwrap());
//!     Ok(Page {
//!         items: vec![page * 10, page * 10 + 1],
//!         next: (page < 2).then(|| (page + 1).to_string()),
//!     })
//! });
//! let rows = ChunkedSource::new("pages", api).collect_rows().unwrap();
//! assert_eq!(rows, vec![0, 1, 10, 11, 20, 21]);
//! ```

use crate::cancel::CancellationToken;
use crate::producer::{ChunkSink, CollectChunks, CollectError};
use anyhow::Context;
use tracing::trace;

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor of the following page; `None` on the last page.
    pub next: Option<String>,
}

/// Producer that walks a paginated API until it runs out of pages.
pub struct PagedSource<F> {
    fetch: F,
    max_pages: Option<usize>,
}

impl<F> PagedSource<F> {
    pub fn new<T>(fetch: F) -> Self
    where
        F: Fn(Option<&str>) -> anyhow::Result<Page<T>>,
    {
        Self {
            fetch,
            max_pages: None,
        }
    }

    /// Stop after `max_pages` pages even if the API reports more.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = Some(max_pages);
        self
    }
}

impl<T, F> CollectChunks<T> for PagedSource<F>
where
    T: Send + 'static,
    F: Fn(Option<&str>) -> anyhow::Result<Page<T>> + Send + Sync + 'static,
{
    fn collect_chunks(
        &self,
        sink: &ChunkSink<T>,
        cancel: &CancellationToken,
    ) -> Result<(), CollectError> {
        let mut cursor: Option<String> = None;
        let mut fetched = 0usize;
        loop {
            if self.max_pages.is_some_and(|max| fetched >= max) {
                return Ok(());
            }
            cancel.check()?;
            let page = (self.fetch)(cursor.as_deref())
                .with_context(|| format!("fetch page {}", fetched + 1))?;
            fetched += 1;
            trace!(page = fetched, items = page.items.len(), "fetched page");
            if !page.items.is_empty() {
                sink.put_rows(page.items)?;
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(()),
            }
        }
    }
}
