mod embedder;
mod scorer;

pub use embedder::{EmbeddingProvider, OllamaClient, DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_HOST};
pub use scorer::{RelevanceScorer, ScoringReport};
