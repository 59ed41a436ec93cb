//! Transfer lifecycle: records, the registry, and the polling loop.

pub mod poller;
pub mod record;
pub mod registry;
