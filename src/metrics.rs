//! Prometheus metrics collection for roulette-signal.
//!
//! Provides production-ready observability via Prometheus metrics exposed on
//! an HTTP endpoint. Tracks connection counts, matchmaking throughput, call
//! outcomes, and per-event latency.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // Counters (monotonic increasing)
    // ========================================================================

    /// Total sockets ever connected.
    pub static ref CONNECTIONS_TOTAL: IntCounter = IntCounter::new(
        "signal_connections_total",
        "Total socket connections accepted"
    ).unwrap();

    /// Total random matches made by the matchmaking engine.
    pub static ref MATCHES_MADE: IntCounter = IntCounter::new(
        "signal_matches_made_total",
        "Total random matches made"
    ).unwrap();

    /// Total direct calls initiated, accepted, declined, or timed out.
    pub static ref CALLS_INITIATED: IntCounter = IntCounter::new(
        "signal_calls_initiated_total",
        "Total direct calls initiated"
    ).unwrap();
    pub static ref CALLS_ACCEPTED: IntCounter = IntCounter::new(
        "signal_calls_accepted_total",
        "Total direct calls accepted"
    ).unwrap();
    pub static ref CALLS_DECLINED: IntCounter = IntCounter::new(
        "signal_calls_declined_total",
        "Total direct calls declined"
    ).unwrap();
    pub static ref CALLS_TIMED_OUT: IntCounter = IntCounter::new(
        "signal_calls_timed_out_total",
        "Total direct calls that rang out unanswered"
    ).unwrap();

    /// Total fallbacks from the remote queue store to the in-process one.
    pub static ref QUEUE_STORE_FALLBACKS: IntCounter = IntCounter::new(
        "signal_queue_store_fallbacks_total",
        "Total times the queue store fell back to the in-process implementation"
    ).unwrap();

    /// Per-event handler errors, labeled by error code.
    pub static ref HANDLER_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("signal_handler_errors_total", "Handler errors by code"),
        &["event", "code"],
    ).unwrap();

    // ========================================================================
    // Gauges (can increase/decrease)
    // ========================================================================

    /// Currently connected sockets.
    pub static ref CONNECTED_SOCKETS: IntGauge = IntGauge::new(
        "signal_connected_sockets",
        "Currently connected sockets"
    ).unwrap();

    /// Sockets currently waiting in the matchmaking queue.
    pub static ref QUEUE_SIZE: IntGauge = IntGauge::new(
        "signal_queue_size",
        "Sockets currently waiting for a random match"
    ).unwrap();

    /// Users currently marked busy (in a random match or direct call).
    pub static ref BUSY_USERS: IntGauge = IntGauge::new(
        "signal_busy_users",
        "Users currently marked busy"
    ).unwrap();

    /// Calls currently ringing.
    pub static ref ACTIVE_CALLS: IntGauge = IntGauge::new(
        "signal_active_calls",
        "Direct calls currently ringing or connected"
    ).unwrap();

    /// Signaling rooms currently open.
    pub static ref ACTIVE_ROOMS: IntGauge = IntGauge::new(
        "signal_active_rooms",
        "Signaling rooms currently open"
    ).unwrap();

    // ========================================================================
    // Histograms
    // ========================================================================

    /// Event handler latency, labeled by event name.
    pub static ref COMMAND_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("signal_event_duration_seconds", "Event handler latency"),
        &["event"],
    ).unwrap();

    /// Fan-out size per broadcast (room/friend-list emits).
    pub static ref FANOUT_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("signal_fanout_size", "Recipients per broadcast")
    ).unwrap();
}

/// Initialize the Prometheus metrics registry. Must be called once at
/// server startup before any metrics are recorded.
pub fn init() {
    REGISTRY.register(Box::new(CONNECTIONS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(MATCHES_MADE.clone())).unwrap();
    REGISTRY.register(Box::new(CALLS_INITIATED.clone())).unwrap();
    REGISTRY.register(Box::new(CALLS_ACCEPTED.clone())).unwrap();
    REGISTRY.register(Box::new(CALLS_DECLINED.clone())).unwrap();
    REGISTRY.register(Box::new(CALLS_TIMED_OUT.clone())).unwrap();
    REGISTRY.register(Box::new(QUEUE_STORE_FALLBACKS.clone())).unwrap();
    REGISTRY.register(Box::new(HANDLER_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(CONNECTED_SOCKETS.clone())).unwrap();
    REGISTRY.register(Box::new(QUEUE_SIZE.clone())).unwrap();
    REGISTRY.register(Box::new(BUSY_USERS.clone())).unwrap();
    REGISTRY.register(Box::new(ACTIVE_CALLS.clone())).unwrap();
    REGISTRY.register(Box::new(ACTIVE_ROOMS.clone())).unwrap();
    REGISTRY.register(Box::new(COMMAND_DURATION.clone())).unwrap();
    REGISTRY.register(Box::new(FANOUT_SIZE.clone())).unwrap();
}

/// Record a handler's execution duration.
pub fn record_command(event: &str, duration_secs: f64) {
    COMMAND_DURATION.with_label_values(&[event]).observe(duration_secs);
}

/// Record a handler error by event name and error code.
pub fn record_command_error(event: &str, code: &str) {
    HANDLER_ERRORS.with_label_values(&[event, code]).inc();
}

/// Record the recipient count of a broadcast.
pub fn record_fanout(recipients: usize) {
    FANOUT_SIZE.observe(recipients as f64);
}

/// Gather all metrics and encode them in Prometheus text format.
///
/// Returns a string suitable for HTTP response on the `/metrics` endpoint.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
