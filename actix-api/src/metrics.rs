/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Centralized Prometheus metrics for the signaling server.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Currently registered WebSocket connections
    pub static ref ACTIVE_CONNECTIONS: IntGauge = register_int_gauge!(
        "tutorhall_active_connections",
        "Currently registered WebSocket connections"
    )
    .expect("Failed to create active_connections metric");

    /// Meetings currently held in the registry
    pub static ref ACTIVE_MEETINGS: IntGauge = register_int_gauge!(
        "tutorhall_active_meetings",
        "Meetings currently held in the registry"
    )
    .expect("Failed to create active_meetings metric");

    /// Client events processed, by event type
    pub static ref EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tutorhall_events_total",
        "Client events processed, by event type",
        &["event"]
    )
    .expect("Failed to create events_total metric");

    /// Negotiation envelopes relayed to their target
    pub static ref SIGNALS_RELAYED_TOTAL: IntCounter = register_int_counter!(
        "tutorhall_signals_relayed_total",
        "Negotiation envelopes relayed to their target"
    )
    .expect("Failed to create signals_relayed_total metric");

    /// Negotiation envelopes dropped because the target was gone
    pub static ref SIGNALS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "tutorhall_signals_dropped_total",
        "Negotiation envelopes dropped because the target was gone"
    )
    .expect("Failed to create signals_dropped_total metric");

    /// Meetings destroyed, by reason
    pub static ref MEETINGS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tutorhall_meetings_closed_total",
        "Meetings destroyed, by reason",
        &["reason"]
    )
    .expect("Failed to create meetings_closed_total metric");
}

/// Render every registered metric in the Prometheus text exposition format.
pub fn render() -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}
