pub mod context;
pub mod memory;

pub use context::AppContext;
pub use memory::{MemoryStore, StoreError, Transaction};
