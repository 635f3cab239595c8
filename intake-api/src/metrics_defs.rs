use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: &str = "intake.requests";
pub const REQUEST_DURATION: &str = "intake.request.duration";
pub const UPLOAD_BYTES: &str = "intake.upload.bytes";

pub const ALL_METRICS: &[MetricDef] = &[
    MetricDef {
        name: REQUESTS,
        metric_type: MetricType::Counter,
        description: "Handled requests, tagged by route and status",
    },
    MetricDef {
        name: REQUEST_DURATION,
        metric_type: MetricType::Histogram,
        description: "Wall time per handled request in seconds",
    },
    MetricDef {
        name: UPLOAD_BYTES,
        metric_type: MetricType::Histogram,
        description: "Decoded size of uploaded files in bytes",
    },
];
