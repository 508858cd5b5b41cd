// Metrics module for lock observability
// Counters for the attempt protocol and a gauge for leases currently held

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn init_metrics() {
    describe_counter!(
        "candado_lock_attempts_total",
        "Total number of do_in_try_lock attempts"
    );
    describe_counter!(
        "candado_lock_local_rejections_total",
        "Attempts rejected at the process-local lock without a store round trip"
    );
    describe_counter!(
        "candado_lock_cluster_rejections_total",
        "Attempts rejected because the cluster lease was already held"
    );
    describe_counter!(
        "candado_lock_executions_total",
        "Critical sections that actually executed"
    );
    describe_counter!(
        "candado_lock_interruptions_total",
        "Critical sections interrupted because the lease was given up"
    );
    describe_counter!(
        "candado_lease_renewals_total",
        "Lease heartbeat renewals issued by monitors"
    );
    describe_gauge!(
        "candado_active_leases",
        "Cluster leases currently held by this process"
    );
    describe_histogram!(
        "candado_lock_hold_duration_seconds",
        "Time critical sections held their lease"
    );

    tracing::info!("Lock metrics initialized");
}

pub(crate) fn record_attempt(mutex_name: &str) {
    counter!("candado_lock_attempts_total", "mutex" => mutex_name.to_string()).increment(1);
}

pub(crate) fn record_local_rejection(mutex_name: &str) {
    counter!("candado_lock_local_rejections_total", "mutex" => mutex_name.to_string()).increment(1);
}

pub(crate) fn record_cluster_rejection(mutex_name: &str) {
    counter!("candado_lock_cluster_rejections_total", "mutex" => mutex_name.to_string())
        .increment(1);
}

pub(crate) fn record_execution(mutex_name: &str, hold_duration_secs: f64) {
    counter!("candado_lock_executions_total", "mutex" => mutex_name.to_string()).increment(1);
    histogram!("candado_lock_hold_duration_seconds", "mutex" => mutex_name.to_string())
        .record(hold_duration_secs);
}

pub(crate) fn record_interruption(mutex_name: &str) {
    counter!("candado_lock_interruptions_total", "mutex" => mutex_name.to_string()).increment(1);
}

pub(crate) fn record_renewal(mutex_name: &str) {
    counter!("candado_lease_renewals_total", "mutex" => mutex_name.to_string()).increment(1);
}

pub(crate) fn record_lease_acquired() {
    gauge!("candado_active_leases").increment(1.0);
}

pub(crate) fn record_lease_released() {
    gauge!("candado_active_leases").decrement(1.0);
}
