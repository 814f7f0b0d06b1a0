// Dashboard domain model

/// A resolved dashboard variable.
///
/// `name` is the identifier used inside queries (not the display label);
/// `values` holds every concrete value the variable can take, in source
/// order, deduplicated and with multi-value sentinels such as `$__all`
/// already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<String>,
}

impl Variable {
    pub fn new(name: String, values: Vec<String>) -> Self {
        Self { name, values }
    }
}

/// The declared type of a templating variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Custom,
    Interval,
    Query,
    Other(String),
}

impl VariableKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "custom" => Self::Custom,
            "interval" => Self::Interval,
            "query" => Self::Query,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A variable declaration as found in the dashboard JSON, before any
/// value resolution has happened.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: String,
    pub kind: VariableKind,
    /// Static option values for `custom` and `interval` variables.
    pub option_values: Vec<String>,
    /// The raw query text for `query` variables.
    pub query: Option<String>,
    /// The datasource name the query runs against.
    pub datasource: Option<String>,
}

/// The declared type of a panel.
///
/// `Row` panels are structural containers and are never rendered
/// themselves; `Graph` and `Timeseries` panels are rendered with explicit
/// pixel dimensions so all legend entries fit into the plot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelKind {
    Row,
    Graph,
    Timeseries,
    Other(String),
}

impl PanelKind {
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "row" => Self::Row,
            "graph" => Self::Graph,
            "timeseries" => Self::Timeseries,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn needs_explicit_size(&self) -> bool {
        matches!(self, Self::Graph | Self::Timeseries)
    }
}

/// One panel of a dashboard.
#[derive(Debug, Clone)]
pub struct Panel {
    pub id: i64,
    pub title: String,
    pub kind: PanelKind,
    /// Raw query expressions of the panel's targets, used to decide which
    /// variables the panel actually references.
    pub targets: Vec<String>,
    /// Child panels, present only for rows.
    pub panels: Vec<Panel>,
    /// Whether a row is collapsed (children live inside the row JSON).
    pub collapsed: bool,
}

impl Panel {
    /// Whether any of this panel's queries reference the named variable.
    ///
    /// Substring containment on the raw query text: a variable named
    /// `env` also counts as referenced by a query containing
    /// `environment`. This mirrors how the dashboards themselves behave
    /// and deliberately stays looser than token-boundary matching.
    pub fn references_variable(&self, name: &str) -> bool {
        self.targets.iter().any(|expr| expr.contains(name))
    }
}

/// A fetched dashboard: identity plus the top-level panel tree and the
/// declared templating variables, both in declaration order.
#[derive(Debug, Clone)]
pub struct DashboardDefinition {
    pub uid: String,
    pub slug: String,
    pub panels: Vec<Panel>,
    pub variables: Vec<VariableDecl>,
}

/// Turn a human-readable title or variable value into a lowercase
/// filesystem-safe slug: alphanumerics kept, everything else collapsed
/// into single dashes, no leading or trailing dash.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("CPU Usage (per core)"), "cpu-usage-per-core");
        assert_eq!(slugify("node-exporter:9100"), "node-exporter-9100");
        assert_eq!(slugify("  Disk I/O  "), "disk-i-o");
        assert_eq!(slugify("1m"), "1m");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_panel_kind_tags() {
        assert_eq!(PanelKind::from_type_tag("row"), PanelKind::Row);
        assert_eq!(
            PanelKind::from_type_tag("timeseries"),
            PanelKind::Timeseries
        );
        assert!(PanelKind::from_type_tag("graph").needs_explicit_size());
        assert!(!PanelKind::from_type_tag("stat").needs_explicit_size());
    }

    #[test]
    fn test_references_variable_is_substring_based() {
        let panel = Panel {
            id: 1,
            title: "Requests".into(),
            kind: PanelKind::Timeseries,
            targets: vec!["sum(rate(http_requests_total{env=\"$environment\"}[5m]))".into()],
            panels: Vec::new(),
            collapsed: false,
        };
        assert!(panel.references_variable("environment"));
        // Substring semantics: `env` matches inside `environment` too.
        assert!(panel.references_variable("env"));
        assert!(!panel.references_variable("instance"));
    }
}
