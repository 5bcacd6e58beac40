pub const SYNC_COUNTER: &str = "flags_sync_total";
pub const ROLLBACK_COUNTER: &str = "flags_rollback_total";
pub const REMOTE_FLAG_WRITES_COUNTER: &str = "flags_remote_writes_total";
pub const OVERRIDE_WRITES_COUNTER: &str = "flags_override_writes_total";
pub const EVALUATIONS_COUNTER: &str = "flags_evaluations_total";
