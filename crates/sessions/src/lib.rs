//! Remote coding session storage for Paperstack.

pub mod reaper;
pub mod store;

pub use reaper::SessionReaper;
pub use store::InMemorySessionStore;
