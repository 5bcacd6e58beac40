pub mod api;
pub mod client;
pub mod config;
pub mod flags;
pub mod health;
pub mod metrics_consts;
pub mod metrics_utils;
pub mod remote;
pub mod rollback;
pub mod router;
pub mod server;
pub mod sync;

// Compiled into the library so integration tests under tests/ can use it.
pub mod test_utils;
