//! Default value functions for `#[serde(default = "...")]` fields.

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_metrics_port() -> u16 {
    9090
}

pub fn default_turn_ttl_secs() -> u64 {
    600
}

pub fn default_pair_ban_ms() -> u64 {
    5_000
}

pub fn default_ring_timeout_ms() -> u64 {
    20_000
}

pub fn default_socket_lock_ttl_ms() -> u64 {
    30_000
}

pub fn default_next_debounce_ms() -> u64 {
    500
}

pub fn default_janitor_interval_secs() -> u64 {
    60
}

pub fn default_max_queue_wait_ms() -> u64 {
    120_000
}

pub fn default_small_cohort_threshold() -> usize {
    2
}
