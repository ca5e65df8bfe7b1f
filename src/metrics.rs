use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("homepage_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("homepage_rate_limited_total", "Requests denied by the rate limiter").unwrap();
    pub static ref RATE_LIMIT_BUCKETS: Gauge =
        register_gauge!("homepage_rate_limit_buckets", "Visitors currently tracked by the rate limiter").unwrap();
    pub static ref CHANGELOG_PARSE_LATENCY: Histogram = register_histogram!(
        "homepage_changelog_parse_seconds",
        "Time spent reading and parsing the changelog"
    )
    .unwrap();
}
