pub mod defaults;
pub mod environment;
pub mod flag_models;
pub mod flag_store;
pub mod hashing;
pub mod overrides;
pub mod targeting;
