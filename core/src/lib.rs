//! # lodestone-core
//!
//! Trait abstractions shared across the lodestone workspace.
//!
//! The retrieval engine in `lodestone-rag` and the model backends plug
//! into each other through the traits defined here:
//!
//! | Concern | Trait | Description |
//! |---------|-------|-------------|
//! | **Embeddings** | [`EmbeddingModel`] | Convert text to dense vectors for similarity search |
//! | **Token budgets** | [`TokenEstimator`] | Estimate token counts for context-window accounting |
//!
//! The [`chat`] module carries the conversation types ([`Turn`], [`Role`])
//! that the context-window manager operates on.
//!
//! ```rust
//! use lodestone_core::EmbeddingModel;
//!
//! async fn example<M: EmbeddingModel>(model: &M) -> lodestone_core::Result<()> {
//!     let embedding = model.embed("Hello, world!").await?;
//!     assert_eq!(embedding.len(), model.dim());
//!     Ok(())
//! }
//! ```

/// Conversation turns and roles.
pub mod chat;
/// Text embeddings.
pub mod embedding;
/// Token counting for context budgets.
pub mod tokens;

#[doc(inline)]
pub use chat::{Role, Turn};
#[doc(inline)]
pub use embedding::{Embedding, EmbeddingModel};
#[doc(inline)]
pub use tokens::{CharEstimator, TokenEstimator};

/// Result type used throughout the workspace.
pub type Result<T> = anyhow::Result<T>;

pub use anyhow::Error;
