//! Metrics definitions for the gateway.

use shared::metrics_defs::{MetricDef, MetricType};

pub const UPSTREAM_REQUEST_DURATION: MetricDef = MetricDef {
    name: "upstream.request.duration",
    metric_type: MetricType::Histogram,
    description: "Upstream call duration in seconds. Tagged with path, outcome.",
};

pub const UPSTREAM_FALLBACK: MetricDef = MetricDef {
    name: "upstream.fallback",
    metric_type: MetricType::Counter,
    description: "Number of calls retried with the secondary strategy after the primary failed",
};

pub const ROUTE_DEGRADED: MetricDef = MetricDef {
    name: "route.degraded",
    metric_type: MetricType::Counter,
    description: "Upstream failures answered per the route's degrade policy. Tagged with route, policy.",
};

pub const ROUTE_REJECTED: MetricDef = MetricDef {
    name: "route.rejected",
    metric_type: MetricType::Counter,
    description: "Requests rejected for invalid client input. Tagged with route.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    UPSTREAM_REQUEST_DURATION,
    UPSTREAM_FALLBACK,
    ROUTE_DEGRADED,
    ROUTE_REJECTED,
];
