//! Ready-made producers.
//!
//! - [`paged::PagedSource`] - cursor-paginated APIs, one chunk per page
//! - [`jsonl::JsonlSource`] - JSON Lines files (feature `io-jsonl`)
//! - [`fanout::FanOutSource`] - concurrent partition fetches (feature `parallel-io`)

pub mod paged;

#[cfg_attr(docsrs, doc(cfg(feature = "io-jsonl")))]
#[cfg(feature = "io-jsonl")]
pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "parallel-io")))]
#[cfg(feature = "parallel-io")]
pub mod fanout;
