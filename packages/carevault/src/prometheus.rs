use crate::error::{ConfigError, Error};
use crate::log::DEVELOPMENT;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::debug;

// See https://prometheus.io/docs/practices/naming/
pub const OPERATIONS_TOTAL: &str = "carevault_operations_total";
pub const AUTHZ_DENIALS_TOTAL: &str = "carevault_authz_denials_total";

pub const AUDIT_ENTRIES_TOTAL: &str = "carevault_audit_entries_total";
pub const AUDIT_WRITE_FAILURES_TOTAL: &str = "carevault_audit_write_failures_total";

pub const ACCESS_REQUESTS_TOTAL: &str = "carevault_access_requests_total";
pub const ACCESS_REVIEWS_TOTAL: &str = "carevault_access_reviews_total";

pub fn start(host: String, port: u16) -> Result<(), Error> {
    let address = format!("{}:{}", host, port);
    let socket_address: SocketAddr =
        address
            .parse()
            .map_err(|_| ConfigError::InvalidParameter {
                name: "prometheus".to_string(),
                value: address.clone(),
            })?;

    debug!(target: DEVELOPMENT, msg = "Starting Prometheus exporter", port);

    PrometheusBuilder::new()
        .with_http_listener(socket_address)
        .install()
        .map_err(|err| ConfigError::MetricsExporter {
            reason: err.to_string(),
        })?;

    describe_counter!(OPERATIONS_TOTAL, "Number of authorized operations");
    describe_counter!(AUTHZ_DENIALS_TOTAL, "Number of authorization denials");
    describe_counter!(AUDIT_ENTRIES_TOTAL, "Number of audit entries written");
    describe_counter!(
        AUDIT_WRITE_FAILURES_TOTAL,
        "Number of audit entries that could not be written"
    );
    describe_counter!(ACCESS_REQUESTS_TOTAL, "Number of access requests created");
    describe_counter!(ACCESS_REVIEWS_TOTAL, "Number of access request reviews");

    Ok(())
}
