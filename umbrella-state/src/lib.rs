//! Umbrella State Management
//!
//! The state file is the only record of which remote objects this tool
//! owns. It maps each resource address to the remote identifier and the
//! attributes last read from the API.
//!
//! - **StateFile**: all managed resources plus serial and lineage
//! - **StateBackend**: storage with locking for concurrent access control
//! - **LockInfo**: who holds the lock, for which operation, until when
//!
//! # Example
//!
//! ```ignore
//! let backend = create_backend(parsed.backend.as_ref(), None)?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//!
//! // ... apply effects, upsert resources ...
//!
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
