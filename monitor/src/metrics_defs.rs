use shared::metrics_defs::{MetricDef, MetricType};

pub const PROBE_CHECKS: MetricDef = MetricDef {
    name: "probe.check",
    metric_type: MetricType::Counter,
    description: "Status probe checks. Tagged with outcome.",
};

pub const PROBE_CONNECTED: MetricDef = MetricDef {
    name: "probe.connected",
    metric_type: MetricType::Gauge,
    description: "1 when the last probe saw the integration connected, 0 otherwise",
};

pub const ALL_METRICS: &[MetricDef] = &[PROBE_CHECKS, PROBE_CONNECTED];
