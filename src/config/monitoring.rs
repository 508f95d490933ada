use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Serve a Prometheus `/metrics` endpoint for the harness process
    /// Default: false
    #[serde(default = "default_enable_metrics_server")]
    pub enable_metrics_server: bool,

    /// Port for the metrics endpoint
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics_server: default_enable_metrics_server(),
            prometheus_port: default_prometheus_port(),
        }
    }
}

fn default_enable_metrics_server() -> bool {
    false
}
fn default_prometheus_port() -> u16 {
    9464
}
