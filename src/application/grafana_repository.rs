// Repository trait for Grafana access
use crate::domain::dashboard::DashboardDefinition;
use crate::domain::error::ExporterError;
use crate::domain::plot::RenderRequest;
use async_trait::async_trait;

/// Port to the Grafana instance.
///
/// One implementation handle is owned per dashboard worker, so
/// implementations are free to cache immutable state (the datasource
/// catalogue) but must not share mutable state across handles.
#[async_trait]
pub trait GrafanaRepository: Send + Sync {
    /// Fetch a dashboard's definition by uid.
    async fn fetch_dashboard(&self, uid: &str) -> Result<DashboardDefinition, ExporterError>;

    /// Execute a templating variable query against the named datasource
    /// and return the raw value list, in backend order.
    ///
    /// Fails with a datasource error when the datasource is unknown or of
    /// a kind without query support. A query in an unsupported grammar is
    /// not an error and yields an empty list.
    async fn execute_variable_query(
        &self,
        query: &str,
        datasource: &str,
    ) -> Result<Vec<String>, ExporterError>;

    /// Render one panel and return the PNG bytes.
    async fn render_panel(&self, request: &RenderRequest) -> Result<Vec<u8>, ExporterError>;
}
