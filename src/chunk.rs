//! [`Chunk`]: the unit of hand-off between a producer and its consumer.

/// An ordered, finite batch of rows.
///
/// Chunks move by value: once a chunk has been put on the
/// [`HandoffQueue`](crate::HandoffQueue) the producer no longer holds it.
///
/// An empty chunk is a legal value and never yields a row. The producer task
/// uses one as the completion sentinel to wake a waiting consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<R> {
    rows: Vec<R>,
}

impl<R> Chunk<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// The zero-length chunk pushed when a producer finishes.
    #[must_use]
    pub fn sentinel() -> Self {
        Self { rows: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }
}

impl<R> From<Vec<R>> for Chunk<R> {
    fn from(rows: Vec<R>) -> Self {
        Self::new(rows)
    }
}

impl<R> FromIterator<R> for Chunk<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<R> IntoIterator for Chunk<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
