// Grafana API client implementing the repository port
use crate::application::grafana_repository::GrafanaRepository;
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::error::ExporterError;
use crate::domain::plot::RenderRequest;
use crate::domain::query::{parse_label_values, LabelValuesQuery};
use crate::infrastructure::config::{GrafanaSettings, PrometheusSettings};
use crate::infrastructure::dashboard_mapper::{map_dashboard, DashboardResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

/// Datasource kinds we know how to query.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DataSourceKind {
    Prometheus,
    Loki,
    Other(String),
}

impl DataSourceKind {
    fn from_type_tag(tag: &str) -> Self {
        match tag {
            "prometheus" => Self::Prometheus,
            "loki" => Self::Loki,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
struct DataSourceEntry {
    id: i64,
    name: String,
    #[serde(default)]
    uid: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct LabelValuesResponse {
    data: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    data: Vec<HashMap<String, String>>,
}

/// Client for one Grafana instance.
///
/// The from/to window is fixed for the client's lifetime: every variable
/// query and every render happens within the same time slice. One client
/// is constructed per dashboard worker; the datasource catalogue is
/// fetched once at construction and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from_ms: i64,
    to_ms: i64,
    node_exporter_job_name: String,
    datasources: Vec<DataSourceEntry>,
}

impl GrafanaClient {
    pub async fn connect(
        grafana: &GrafanaSettings,
        prometheus: &PrometheusSettings,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Self, ExporterError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!grafana.tls_verify)
            .build()
            .map_err(|e| ExporterError::api(grafana.base_url.as_str(), e.to_string()))?;

        let mut client = Self {
            http,
            base_url: grafana.base_url.trim_end_matches('/').to_string(),
            api_key: grafana.api_key.clone(),
            from_ms,
            to_ms,
            node_exporter_job_name: prometheus.node_exporter_job_name.clone(),
            datasources: Vec::new(),
        };
        client.datasources = client.get_json("/api/datasources", &[]).await?;
        tracing::debug!(
            datasources = client.datasources.len(),
            "connected to {}",
            client.base_url
        );

        Ok(client)
    }

    async fn get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response, ExporterError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| ExporterError::api(url.clone(), e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExporterError::api(
                url,
                format!("status {}", response.status()),
            ));
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, ExporterError> {
        let response = self.get(path, params).await?;
        let url = response.url().to_string();
        response
            .json::<T>()
            .await
            .map_err(|e| ExporterError::api(url, format!("invalid response body: {e}")))
    }

    fn datasource(&self, key: &str) -> Result<&DataSourceEntry, ExporterError> {
        // Old entries carry no uid and deserialize it to an empty
        // string, so an empty key must never match on uid.
        self.datasources
            .iter()
            .find(|ds| ds.name == key || (!key.is_empty() && ds.uid == key))
            .ok_or_else(|| {
                ExporterError::DataSource(format!("datasource `{key}` is not available"))
            })
    }

    /// Enumerate label values through the Grafana datasource proxy.
    async fn prometheus_label_values(
        &self,
        parsed: LabelValuesQuery,
        datasource_id: i64,
    ) -> Result<Vec<String>, ExporterError> {
        let label = parsed.label;
        match parsed.metric {
            None => {
                // No metric expression, the label is directly reachable.
                let path = format!(
                    "/api/datasources/proxy/{}/api/v1/label/{}/values",
                    datasource_id,
                    urlencoding::encode(&label)
                );
                let response: LabelValuesResponse = self.get_json(&path, &[]).await?;
                Ok(response.data)
            }
            Some(metric) => {
                let metric = substitute_node_job(metric, &self.node_exporter_job_name);
                let path = format!("/api/datasources/proxy/{datasource_id}/api/v1/series");
                // Prometheus expects unix seconds, the window is held in
                // milliseconds.
                let params = vec![
                    ("match[]".to_string(), metric),
                    ("start".to_string(), (self.from_ms / 1000).to_string()),
                    ("end".to_string(), (self.to_ms / 1000).to_string()),
                ];
                let response: SeriesResponse = self.get_json(&path, &params).await?;
                Ok(response
                    .data
                    .into_iter()
                    .filter_map(|mut series| series.remove(&label))
                    .collect())
            }
        }
    }
}

/// Node exporter expressions commonly pin the scrape job; substitute
/// the configured job name for the `$job` placeholder. Only metric
/// expressions mentioning `node` are touched, other expressions keep
/// their own `$job` reference.
fn substitute_node_job(metric: String, job: &str) -> String {
    if metric.contains("node") {
        metric.replace("$job", job)
    } else {
        metric
    }
}

#[async_trait]
impl GrafanaRepository for GrafanaClient {
    async fn fetch_dashboard(&self, uid: &str) -> Result<DashboardDefinition, ExporterError> {
        let path = format!("/api/dashboards/uid/{}", urlencoding::encode(uid));
        let response: DashboardResponse = self.get_json(&path, &[]).await?;
        Ok(map_dashboard(uid, response))
    }

    async fn execute_variable_query(
        &self,
        query: &str,
        datasource: &str,
    ) -> Result<Vec<String>, ExporterError> {
        let ds = self.datasource(datasource)?;
        match DataSourceKind::from_type_tag(&ds.kind) {
            DataSourceKind::Prometheus => match parse_label_values(query) {
                Some(parsed) => self.prometheus_label_values(parsed, ds.id).await,
                // Other query grammars are unsupported and yield no
                // values rather than failing the dashboard.
                None => Ok(Vec::new()),
            },
            DataSourceKind::Loki => Err(ExporterError::DataSource(
                "loki queries are not implemented yet".to_string(),
            )),
            DataSourceKind::Other(kind) => Err(ExporterError::DataSource(format!(
                "unsupported datasource type `{kind}`"
            ))),
        }
    }

    async fn render_panel(&self, request: &RenderRequest) -> Result<Vec<u8>, ExporterError> {
        let path = format!(
            "/render/d-solo/{}/{}",
            urlencoding::encode(&request.dashboard_uid),
            urlencoding::encode(&request.dashboard_slug)
        );

        let mut params = vec![
            ("theme".to_string(), "light".to_string()),
            ("orgId".to_string(), "1".to_string()),
            ("panelId".to_string(), request.panel_id.to_string()),
            ("from".to_string(), self.from_ms.to_string()),
            ("to".to_string(), self.to_ms.to_string()),
        ];
        if let Some((width, height)) = request.size {
            params.push(("width".to_string(), width.to_string()));
            params.push(("height".to_string(), height.to_string()));
        }
        params.extend(request.params.iter().cloned());

        let response = self.get(&path, &params).await?;
        let url = response.url().to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExporterError::api(url, e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_kind_tags() {
        assert_eq!(
            DataSourceKind::from_type_tag("prometheus"),
            DataSourceKind::Prometheus
        );
        assert_eq!(DataSourceKind::from_type_tag("loki"), DataSourceKind::Loki);
        assert_eq!(
            DataSourceKind::from_type_tag("influxdb"),
            DataSourceKind::Other("influxdb".to_string())
        );
    }

    #[test]
    fn test_node_job_substitution() {
        assert_eq!(
            substitute_node_job("node_uname_info{job=\"$job\"}".to_string(), "node-exporter"),
            "node_uname_info{job=\"node-exporter\"}"
        );
        // Expressions not mentioning `node` are left untouched.
        assert_eq!(
            substitute_node_job("up{job=\"$job\"}".to_string(), "node-exporter"),
            "up{job=\"$job\"}"
        );
    }

    #[test]
    fn test_datasource_lookup_matches_name_or_uid_but_not_empty_uid() {
        let client = GrafanaClient {
            http: reqwest::Client::new(),
            base_url: "http://localhost:3000".to_string(),
            api_key: "key".to_string(),
            from_ms: 0,
            to_ms: 0,
            node_exporter_job_name: "node".to_string(),
            datasources: vec![
                DataSourceEntry {
                    id: 1,
                    name: "Prometheus".to_string(),
                    uid: String::new(),
                    kind: "prometheus".to_string(),
                },
                DataSourceEntry {
                    id: 2,
                    name: "Loki".to_string(),
                    uid: "loki-1".to_string(),
                    kind: "loki".to_string(),
                },
            ],
        };

        assert_eq!(client.datasource("Prometheus").unwrap().id, 1);
        assert_eq!(client.datasource("loki-1").unwrap().id, 2);
        // An empty reference key must not match the uid-less entry.
        assert!(client.datasource("").is_err());
    }

    #[test]
    fn test_series_response_label_extraction() {
        let json = r#"{
            "status": "success",
            "data": [
                { "__name__": "node_uname_info", "instance": "n1:9100", "job": "node" },
                { "__name__": "node_uname_info", "instance": "n2:9100", "job": "node" },
                { "__name__": "node_uname_info", "job": "node" }
            ]
        }"#;
        let response: SeriesResponse = serde_json::from_str(json).unwrap();
        let values: Vec<_> = response
            .data
            .into_iter()
            .filter_map(|mut series| series.remove("instance"))
            .collect();
        // Series without the label contribute nothing.
        assert_eq!(values, vec!["n1:9100", "n2:9100"]);
    }
}
