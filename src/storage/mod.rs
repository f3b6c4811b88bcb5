//! Store session implementations

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemorySession, InMemoryTransaction};
pub use postgres::{PgSession, PgTransaction};
