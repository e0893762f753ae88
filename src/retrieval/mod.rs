//! Retrieval core: chunking strategies, the retriever, and score interpretation.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::Chunker;
pub use service::Retriever;
pub use types::{
    ChunkingError, RetrievalError, RetrievedChunks, ScoreBand, interpret_score,
};
