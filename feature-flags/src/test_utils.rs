use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde_json::Value;

use crate::remote::RemoteRecord;

pub fn random_string(prefix: &str, length: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}

/// A fresh, non-emergency record carrying `flags` as-is.
pub fn remote_record(flags: Value) -> RemoteRecord {
    RemoteRecord {
        flags,
        updated_at: Utc::now(),
        emergency_rollback: false,
    }
}
