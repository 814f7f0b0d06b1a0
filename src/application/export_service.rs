// Export service - Use case for plotting one dashboard's panels
use crate::application::grafana_repository::GrafanaRepository;
use crate::application::variable_service::{
    ignore_value_filter, select_variables, variable_name_filter, VariableService,
};
use crate::domain::dashboard::{slugify, DashboardDefinition, Panel, PanelKind, Variable};
use crate::domain::error::ExporterError;
use crate::domain::plot::RenderRequest;
use crate::infrastructure::config::DashboardPlotConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One planned plot of a panel: the destination file and the variable
/// bindings it will be rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotPlan {
    pub path: PathBuf,
    pub bindings: Vec<(String, String)>,
}

/// Enumerate the plots for one panel across every combination of values
/// of the variables the panel references.
///
/// Walks the variable list in declaration order. A referenced variable
/// contributes one directory level per value (so the first referenced
/// variable becomes the outermost folder); a variable none of the
/// panel's queries mention contributes neither a directory level nor a
/// binding. With no referenced variables at all, exactly one plot is
/// planned directly under `base_dir`.
pub fn plan_panel_plots(panel: &Panel, variables: &[Variable], base_dir: &Path) -> Vec<PlotPlan> {
    let mut plans = Vec::new();
    let mut bindings = Vec::new();
    expand_combinations(
        panel,
        variables,
        0,
        base_dir.to_path_buf(),
        &mut bindings,
        &mut plans,
    );
    plans
}

fn expand_combinations(
    panel: &Panel,
    variables: &[Variable],
    index: usize,
    dir: PathBuf,
    bindings: &mut Vec<(String, String)>,
    plans: &mut Vec<PlotPlan>,
) {
    if index == variables.len() {
        plans.push(PlotPlan {
            path: dir.join(format!("{}.png", slugify(&panel.title))),
            bindings: bindings.clone(),
        });
        return;
    }

    let variable = &variables[index];
    if panel.references_variable(&variable.name) {
        for value in &variable.values {
            // Sibling values share the parent directory, each getting its
            // own child directory named after the value.
            let child = dir.join(slugify(value));
            bindings.push((format!("var-{}", variable.name), value.clone()));
            expand_combinations(panel, variables, index + 1, child, bindings, plans);
            bindings.pop();
        }
    } else {
        expand_combinations(panel, variables, index + 1, dir, bindings, plans);
    }
}

/// Summary of a successfully exported dashboard.
#[derive(Debug, Clone)]
pub struct DashboardOutcome {
    pub uid: String,
    pub slug: String,
    pub plots: usize,
}

/// Processes one dashboard end to end: fetch, resolve the configured
/// variables, walk the panels and write one PNG per combination.
#[derive(Clone)]
pub struct ExportService {
    repository: Arc<dyn GrafanaRepository>,
    variables: VariableService,
    output_dir: PathBuf,
}

impl ExportService {
    pub fn new(repository: Arc<dyn GrafanaRepository>, output_dir: PathBuf) -> Self {
        let variables = VariableService::new(repository.clone());
        Self {
            repository,
            variables,
            output_dir,
        }
    }

    /// Export every panel of the configured dashboard.
    ///
    /// Any failure is returned to the caller as this dashboard's outcome
    /// and must not affect other dashboards in the batch.
    pub async fn export_dashboard(
        &self,
        config: &DashboardPlotConfig,
    ) -> Result<DashboardOutcome, ExporterError> {
        let dashboard = self.repository.fetch_dashboard(&config.uid).await?;
        tracing::debug!(uid = %config.uid, slug = %dashboard.slug, "fetched dashboard");

        let name_filter = variable_name_filter(&config.variables)?;
        let ignore = config.ignore.as_deref().map(ignore_value_filter).transpose()?;

        let mut variables = Vec::new();
        for decl in select_variables(&dashboard.variables, &name_filter) {
            let variable = self.variables.resolve(&decl, ignore.as_ref()).await?;
            tracing::debug!(
                uid = %config.uid,
                variable = %variable.name,
                values = variable.values.len(),
                "resolved variable"
            );
            variables.push(variable);
        }

        let base_dir = self.output_dir.join(&dashboard.slug);
        fs::create_dir_all(&base_dir)?;

        let mut plots = 0;
        for panel in &dashboard.panels {
            if panel.kind != PanelKind::Row {
                plots += self
                    .export_panel(&dashboard, panel, &variables, &base_dir, config)
                    .await?;
            } else if config.collapsed && panel.collapsed {
                // Rows are structural and never rendered themselves;
                // their children plot into the dashboard base directory.
                for child in &panel.panels {
                    plots += self
                        .export_panel(&dashboard, child, &variables, &base_dir, config)
                        .await?;
                }
            }
        }

        Ok(DashboardOutcome {
            uid: config.uid.clone(),
            slug: dashboard.slug,
            plots,
        })
    }

    async fn export_panel(
        &self,
        dashboard: &DashboardDefinition,
        panel: &Panel,
        variables: &[Variable],
        base_dir: &Path,
        config: &DashboardPlotConfig,
    ) -> Result<usize, ExporterError> {
        let plans = plan_panel_plots(panel, variables, base_dir);

        for plan in &plans {
            if let Some(parent) = plan.path.parent() {
                fs::create_dir_all(parent)?;
            }

            let request = RenderRequest {
                dashboard_uid: dashboard.uid.clone(),
                dashboard_slug: dashboard.slug.clone(),
                panel_id: panel.id,
                params: plan.bindings.clone(),
                size: panel
                    .kind
                    .needs_explicit_size()
                    .then(|| (config.graph.width, config.graph.height)),
            };

            tracing::info!("creating {}", plan.path.display());
            let image = self.repository.render_panel(&request).await?;
            fs::write(&plan.path, image)?;
        }

        Ok(plans.len())
    }
}
