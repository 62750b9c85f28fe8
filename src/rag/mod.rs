//! Policy retrieval.
//!
//! - `Retriever`: the search seam, with ranking rules shared by every backend
//! - `DatabricksVectorSearch` / `DiscoveryEngineSearch`: REST backends
//! - `BackendRouter`: per-tenant backend selection
//! - `RagContextBuilder`: formats snippets for the answer prompt

mod context_builder;
mod databricks;
mod discovery_engine;
mod retriever;
mod router;

pub use context_builder::RagContextBuilder;
pub use databricks::DatabricksVectorSearch;
pub use discovery_engine::DiscoveryEngineSearch;
pub use retriever::{rank_snippets, Retriever, SearchRequest, Snippet};
pub use router::BackendRouter;
