use {
    prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, TextEncoder},
    tracing::error,
};

const FAST_OPS_BUCKETS: &[f64] = &[
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Builds a counter and registers it in the default registry. A name clash is
/// logged and the counter is returned unregistered.
pub fn counter(name: &str, help: &str) -> Counter {
    let counter = Counter::with_opts(Opts::new(name, help))
        .unwrap_or_else(|e| panic!("invalid counter options for {name}: {e}"));

    if let Err(e) = prometheus::register(Box::new(counter.clone())) {
        error!("Failed to register counter {}: {}", name, e);
    }

    counter
}

pub fn histogram_fast_ops(name: &str, help: &str) -> Histogram {
    let opts = HistogramOpts::new(name, help).buckets(FAST_OPS_BUCKETS.to_vec());
    let histogram = Histogram::with_opts(opts)
        .unwrap_or_else(|e| panic!("invalid histogram options for {name}: {e}"));

    if let Err(e) = prometheus::register(Box::new(histogram.clone())) {
        error!("Failed to register histogram {}: {}", name, e);
    }

    histogram
}

/// Renders every metric of the default registry in the text exposition format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_default()
}
