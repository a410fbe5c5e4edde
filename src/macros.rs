/// Runs a block and records its wall time, in seconds, on a histogram.
#[macro_export]
macro_rules! measure {
    ($histogram:expr, $code:block) => {{
        let start = std::time::Instant::now();
        let result = $code;

        $histogram.observe(start.elapsed().as_secs_f64());
        result
    }};
}
