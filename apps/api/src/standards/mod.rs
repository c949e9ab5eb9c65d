// Administrator-configured targets, whitelisted properties and standards.
// Persisted as a single JSON file; see store.rs.

pub mod defaults;
pub mod handlers;
pub mod models;
pub mod store;
pub mod validation;
