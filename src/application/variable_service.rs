// Variable resolution - Use case for resolving templating variables
use crate::application::grafana_repository::GrafanaRepository;
use crate::domain::dashboard::{Variable, VariableDecl, VariableKind};
use crate::domain::error::ExporterError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Multi-value sentinel injected by Grafana's "All" option.
const ALL_VALUES_SENTINEL: &str = "$__all";
/// Placeholder for the automatically computed interval step.
const AUTO_INTERVAL_SENTINEL: &str = "$__auto_interval_interval";

/// Build the full-match filter selecting which declared variables to
/// expand. An empty name list yields a filter that selects nothing, so a
/// dashboard configured without variables renders with its own defaults.
pub fn variable_name_filter(names: &[String]) -> Result<Regex, ExporterError> {
    compile_filter(&format!("^(?:{})$", names.join("|")))
}

/// Build the value ignore filter. Matching is anchored at the start of
/// the value but not the end, so `dev` drops `dev-01` but not `old-dev`.
pub fn ignore_value_filter(pattern: &str) -> Result<Regex, ExporterError> {
    compile_filter(&format!("^(?:{})", pattern))
}

/// Compile a configured filter, reporting the anchored pattern that was
/// actually handed to the regex engine when it is rejected.
fn compile_filter(pattern: &str) -> Result<Regex, ExporterError> {
    Regex::new(pattern).map_err(|e| ExporterError::Pattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Pick the declared variables whose name matches the configured filter,
/// preserving declaration order.
pub fn select_variables(decls: &[VariableDecl], filter: &Regex) -> Vec<VariableDecl> {
    decls
        .iter()
        .filter(|decl| filter.is_match(&decl.name))
        .cloned()
        .collect()
}

#[derive(Clone)]
pub struct VariableService {
    repository: Arc<dyn GrafanaRepository>,
}

impl VariableService {
    pub fn new(repository: Arc<dyn GrafanaRepository>) -> Self {
        Self { repository }
    }

    /// Resolve one declared variable into its concrete value list.
    ///
    /// Values keep the order the source produced them in; sentinels and
    /// empty strings are dropped, duplicates are removed keeping the
    /// first occurrence, and values matching the ignore filter are
    /// discarded last.
    pub async fn resolve(
        &self,
        decl: &VariableDecl,
        ignore: Option<&Regex>,
    ) -> Result<Variable, ExporterError> {
        let raw = match &decl.kind {
            VariableKind::Custom => decl.option_values.clone(),
            VariableKind::Interval => decl
                .option_values
                .iter()
                .filter(|v| v.as_str() != AUTO_INTERVAL_SENTINEL)
                .cloned()
                .collect(),
            VariableKind::Query => {
                let query = decl.query.as_deref().unwrap_or_default();
                let datasource = decl.datasource.as_deref().ok_or_else(|| {
                    ExporterError::DataSource(format!(
                        "variable `{}` declares no datasource",
                        decl.name
                    ))
                })?;
                self.repository
                    .execute_variable_query(query, datasource)
                    .await?
            }
            VariableKind::Other(kind) => {
                return Err(ExporterError::VariableResolution {
                    name: decl.name.clone(),
                    kind: kind.clone(),
                });
            }
        };

        let mut seen = HashSet::new();
        let values = raw
            .into_iter()
            .filter(|v| !v.is_empty() && v != ALL_VALUES_SENTINEL)
            .filter(|v| seen.insert(v.clone()))
            .filter(|v| ignore.map_or(true, |re| !re.is_match(v)))
            .collect();

        Ok(Variable::new(decl.name.clone(), values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::DashboardDefinition;
    use crate::domain::plot::RenderRequest;
    use async_trait::async_trait;

    struct StaticQueryRepo {
        values: Vec<String>,
    }

    #[async_trait]
    impl GrafanaRepository for StaticQueryRepo {
        async fn fetch_dashboard(
            &self,
            _uid: &str,
        ) -> Result<DashboardDefinition, ExporterError> {
            unimplemented!("not used by variable resolution tests")
        }

        async fn execute_variable_query(
            &self,
            _query: &str,
            _datasource: &str,
        ) -> Result<Vec<String>, ExporterError> {
            Ok(self.values.clone())
        }

        async fn render_panel(
            &self,
            _request: &RenderRequest,
        ) -> Result<Vec<u8>, ExporterError> {
            unimplemented!("not used by variable resolution tests")
        }
    }

    fn service_with(values: &[&str]) -> VariableService {
        VariableService::new(Arc::new(StaticQueryRepo {
            values: values.iter().map(|v| v.to_string()).collect(),
        }))
    }

    fn decl(name: &str, kind: VariableKind, options: &[&str]) -> VariableDecl {
        VariableDecl {
            name: name.to_string(),
            kind,
            option_values: options.iter().map(|v| v.to_string()).collect(),
            query: Some("label_values(up, job)".to_string()),
            datasource: Some("Prometheus".to_string()),
        }
    }

    #[tokio::test]
    async fn test_custom_variable_drops_all_sentinel() {
        let service = service_with(&[]);
        let decl = decl("env", VariableKind::Custom, &["$__all", "prod", "staging"]);
        let variable = service.resolve(&decl, None).await.unwrap();
        assert_eq!(variable.values, vec!["prod", "staging"]);
    }

    #[tokio::test]
    async fn test_interval_variable_drops_auto_sentinel() {
        let service = service_with(&[]);
        let decl = decl(
            "interval",
            VariableKind::Interval,
            &["$__auto_interval_interval", "1m", "5m", "1m"],
        );
        let variable = service.resolve(&decl, None).await.unwrap();
        assert_eq!(variable.values, vec!["1m", "5m"]);
    }

    #[tokio::test]
    async fn test_query_variable_filters_and_keeps_order() {
        let service = service_with(&["n1", "n2", "$__all", "", "n1"]);
        let decl = decl("node", VariableKind::Query, &[]);
        let variable = service.resolve(&decl, None).await.unwrap();
        assert_eq!(variable.values, vec!["n1", "n2"]);
    }

    #[tokio::test]
    async fn test_ignore_filter_is_start_anchored() {
        let service = service_with(&["n1", "n2", "xn1"]);
        let decl = decl("node", VariableKind::Query, &[]);
        let ignore = ignore_value_filter("n1").unwrap();
        let variable = service.resolve(&decl, Some(&ignore)).await.unwrap();
        // `n1` is dropped, `xn1` survives because the match anchors at
        // the start of the value.
        assert_eq!(variable.values, vec!["n2", "xn1"]);
    }

    #[tokio::test]
    async fn test_unsupported_kind_fails() {
        let service = service_with(&[]);
        let decl = decl("ds", VariableKind::Other("datasource".into()), &[]);
        let err = service.resolve(&decl, None).await.unwrap_err();
        assert!(matches!(
            err,
            ExporterError::VariableResolution { ref kind, .. } if kind == "datasource"
        ));
    }

    #[test]
    fn test_variable_name_filter_full_match() {
        let decls = vec![
            decl("job", VariableKind::Custom, &[]),
            decl("jobs_extended", VariableKind::Custom, &[]),
            decl("instance", VariableKind::Custom, &[]),
        ];
        let filter = variable_name_filter(&["job".to_string(), "instance".to_string()]).unwrap();
        let selected = select_variables(&decls, &filter);
        let names: Vec<_> = selected.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["job", "instance"]);
    }

    #[test]
    fn test_empty_name_list_selects_nothing() {
        let decls = vec![decl("job", VariableKind::Custom, &[])];
        let filter = variable_name_filter(&[]).unwrap();
        assert!(select_variables(&decls, &filter).is_empty());
    }

    #[test]
    fn test_invalid_filter_reports_compiled_pattern() {
        let err = variable_name_filter(&["(".to_string()]).unwrap_err();
        match err {
            ExporterError::Pattern { pattern, .. } => assert_eq!(pattern, "^(?:()$"),
            other => panic!("unexpected error: {other}"),
        }

        let err = ignore_value_filter("[").unwrap_err();
        match err {
            ExporterError::Pattern { pattern, .. } => assert_eq!(pattern, "^(?:["),
            other => panic!("unexpected error: {other}"),
        }
    }
}
