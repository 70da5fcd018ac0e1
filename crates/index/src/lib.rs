//! # Vector retrieval
//!
//! This crate holds everything between a query embedding and a list of text snippets:
//!
//! - [`VectorStore`]: the contract for a key -> (vector, metadata) store with
//!   `query`, `fetch`, `upsert` and `describe`. Two implementations ship here:
//!   [`InMemoryVectorStore`] (exact cosine, used by tests and offline runs) and
//!   [`PineconeStore`] (hosted index over REST).
//! - [`MetadataFilter`]: Pinecone-style `$eq` / `$ne` / `$in` / `$contains` filters that are
//!   sent to remote stores verbatim and evaluated locally by the in-memory store.
//! - [`VectorSearchClient`]: applies the minimum-score threshold, turns matches into
//!   [`RetrievedDocument`]s, and runs the direct-lookup rescue for known entities.
//!
//! ## Example
//!
//! ```
//! use index::{InMemoryVectorStore, Record, SearchConfig, VectorSearchClient, VectorStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(InMemoryVectorStore::new());
//! store
//!     .upsert(
//!         vec![Record::new("trash-1", vec![1.0, 0.0])
//!             .with_metadata("text", "Trash is collected on Mondays.")
//!             .with_metadata("source_title", "Public Works")],
//!         None,
//!     )
//!     .await
//!     .unwrap();
//!
//! let client = VectorSearchClient::new(store, SearchConfig::default());
//! let docs = client.search(&[1.0, 0.0], 5, None).await;
//! assert_eq!(docs[0].source, "Public Works");
//! # }
//! ```

mod error;
mod filter;
mod memory;
mod pinecone;
mod search;
mod store;

pub use error::IndexError;
pub use filter::{Condition, MetadataFilter};
pub use memory::InMemoryVectorStore;
pub use pinecone::{PineconeConfig, PineconeStore};
pub use search::{DirectLookup, RetrievedDocument, SearchConfig, VectorSearchClient, UNKNOWN_SOURCE};
pub use store::{IndexStats, Match, QueryRequest, Record, VectorStore};
