use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, handler.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const PARTNER_CHECKS: MetricDef = MetricDef {
    name: "partner.check",
    metric_type: MetricType::Counter,
    description: "Partner status checks. Tagged with partner, outcome.",
};

pub const RELAY_DELIVERIES: MetricDef = MetricDef {
    name: "relay.delivery",
    metric_type: MetricType::Counter,
    description: "Webhook relay attempts. Tagged with relay, outcome.",
};

pub const PROJECT_CONNECTIONS: MetricDef = MetricDef {
    name: "project.connection",
    metric_type: MetricType::Counter,
    description: "Projects linked to a partner. Tagged with action.",
};

pub const SECONDARY_WRITE_FAILURES: MetricDef = MetricDef {
    name: "secondary_write.failure",
    metric_type: MetricType::Counter,
    description: "Best-effort writes that failed and were dropped. Tagged with write.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    PARTNER_CHECKS,
    RELAY_DELIVERIES,
    PROJECT_CONNECTIONS,
    SECONDARY_WRITE_FAILURES,
];
