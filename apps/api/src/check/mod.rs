// Compliance checking: matching elements to targets, extracting whitelisted
// properties and comparing them with the configured standards.

pub mod engine;
pub mod extract;
pub mod handlers;
pub mod matcher;
pub mod report;
