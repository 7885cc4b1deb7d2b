//! Store backends behind the `Store`/`Model` traits.

pub mod memory;
pub mod postgres;
pub mod sql;

pub use memory::{MemoryModel, MemorySession, MemoryStore};
pub use postgres::{PgModel, PgStore};
