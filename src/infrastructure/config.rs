use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct PlotterConfig {
    pub grafana: GrafanaSettings,
    #[serde(default)]
    pub prometheus: PrometheusSettings,
    #[serde(default)]
    pub plots: PlotSettings,
    #[serde(default)]
    pub dashboards: Vec<DashboardPlotConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrafanaSettings {
    /// Base url of the Grafana instance including scheme and port.
    pub base_url: String,
    /// Admin level api key; requesting datasources needs one.
    pub api_key: String,
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,
    /// Length of the plotted time slice in seconds when no explicit
    /// from/to is given on the command line.
    #[serde(default = "default_time_range")]
    pub default_time_range: u64,
    /// Abort the whole batch on the first failed dashboard instead of
    /// continuing with the remaining ones.
    #[serde(default)]
    pub abort_on_api_error: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PrometheusSettings {
    /// Name of the scrape job running the prometheus node exporter,
    /// substituted for `$job` in node exporter metric expressions.
    #[serde(default = "default_node_exporter_job")]
    pub node_exporter_job_name: String,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            node_exporter_job_name: default_node_exporter_job(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlotSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PlotSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardPlotConfig {
    pub uid: String,
    /// Names of the variables to iterate when plotting (query names, not
    /// display names). Variables not listed here keep the default set in
    /// the Grafana UI.
    #[serde(default)]
    pub variables: Vec<String>,
    /// Values matching this pattern are dropped after resolution.
    #[serde(default)]
    pub ignore: Option<String>,
    /// Also render panels living inside collapsed rows.
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub graph: GraphSize,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct GraphSize {
    #[serde(default = "default_graph_width")]
    pub width: u32,
    #[serde(default = "default_graph_height")]
    pub height: u32,
}

impl Default for GraphSize {
    fn default() -> Self {
        Self {
            width: default_graph_width(),
            height: default_graph_height(),
        }
    }
}

fn default_tls_verify() -> bool {
    true
}

fn default_time_range() -> u64 {
    3600
}

fn default_node_exporter_job() -> String {
    "node".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("plots")
}

fn default_graph_width() -> u32 {
    1200
}

fn default_graph_height() -> u32 {
    500
}

pub fn load_config(path: &str) -> anyhow::Result<PlotterConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
grafana:
  base_url: https://grafana.example.com:3000
  api_key: secret
  tls_verify: false
  default_time_range: 7200
  abort_on_api_error: true
prometheus:
  node_exporter_job_name: node-exporter
plots:
  output_dir: out
dashboards:
  - uid: abc123
    variables: [job, instance]
    ignore: "dev-.*"
    collapsed: true
    graph:
      width: 1600
      height: 600
  - uid: def456
"#;
        let settings = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap();
        let parsed: PlotterConfig = settings.try_deserialize().unwrap();

        assert!(!parsed.grafana.tls_verify);
        assert!(parsed.grafana.abort_on_api_error);
        assert_eq!(parsed.grafana.default_time_range, 7200);
        assert_eq!(parsed.prometheus.node_exporter_job_name, "node-exporter");
        assert_eq!(parsed.plots.output_dir, PathBuf::from("out"));
        assert_eq!(parsed.dashboards.len(), 2);
        assert_eq!(parsed.dashboards[0].variables, vec!["job", "instance"]);
        assert_eq!(parsed.dashboards[0].graph.width, 1600);

        // The second dashboard relies entirely on defaults.
        let bare = &parsed.dashboards[1];
        assert!(bare.variables.is_empty());
        assert!(bare.ignore.is_none());
        assert!(!bare.collapsed);
        assert_eq!((bare.graph.width, bare.graph.height), (1200, 500));
    }
}
