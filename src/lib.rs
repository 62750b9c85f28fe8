//! SOP policy assistant: a three-stage retrieval-augmented answering
//! pipeline (query formulation, retrieval, answer synthesis) with
//! per-tenant configuration and checkpointed conversations.

pub mod core;
pub mod history;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod server;
pub mod state;
