//! Profile view and embedding persistence for the matching engine.
//!
//! Profiles belong to the external record store and are only read here,
//! through [`ProfileSource`]. Embedding state is owned by the engine and
//! persisted through [`EmbeddingStore`] on any [`StoreBackend`]: an
//! ordered in-memory map, or a redb file with the `backend-redb` feature.
//!
//! ```
//! use store::{EmbeddingRecord, EmbeddingStore, OwnerType, Profile};
//!
//! let store = EmbeddingStore::in_memory();
//! let profile = Profile::new("job-1", OwnerType::Job, "Rust Engineer").with_skills(["Rust"]);
//! assert!(store.is_stale(&profile, Some(2)).unwrap());
//!
//! let text = profile.embedding_text();
//! let record = EmbeddingRecord::new("job-1", OwnerType::Job, text, vec![1.0, 0.0], "stub");
//! store.put(&record).unwrap();
//! assert!(!store.is_stale(&profile, Some(2)).unwrap());
//! // A provider with a different output size needs a fresh vector.
//! assert!(store.is_stale(&profile, Some(384)).unwrap());
//! ```

mod backend;
mod embeddings;
mod error;
mod profile;
mod profiles;
mod record;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, StoreBackend};
pub use embeddings::EmbeddingStore;
pub use error::StoreError;
pub use profile::{OwnerType, Profile, SalaryBand};
pub use profiles::{InMemoryProfiles, ProfileSource};
pub use record::EmbeddingRecord;
