use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use super::register_sink_metrics;

/// Installs the global metrics recorder and serves `[::]:{port}/metrics` for scraping.
///
/// Without this call the metric macros are no-ops, which is what library users and
/// tests get by default.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        .install()?;

    register_sink_metrics();

    Ok(())
}
