// Mapping between the Grafana dashboard JSON schema and domain types
use crate::domain::dashboard::{
    DashboardDefinition, Panel, PanelKind, VariableDecl, VariableKind,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DashboardResponse {
    pub meta: DashboardMeta,
    pub dashboard: DashboardBody,
}

#[derive(Debug, Deserialize)]
pub struct DashboardMeta {
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct DashboardBody {
    #[serde(default)]
    pub panels: Vec<PanelDto>,
    #[serde(default)]
    pub templating: TemplatingDto,
}

#[derive(Debug, Deserialize, Default)]
pub struct TemplatingDto {
    #[serde(default)]
    pub list: Vec<VariableDto>,
}

#[derive(Debug, Deserialize)]
pub struct VariableDto {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Vec<OptionDto>,
    #[serde(default)]
    pub query: Option<QueryField>,
    #[serde(default)]
    pub datasource: Option<DataSourceField>,
}

#[derive(Debug, Deserialize)]
pub struct OptionDto {
    // Multi-value options carry arrays here; only plain strings are
    // usable as concrete variable values.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// The query of a templating variable: older schema versions store the
/// raw string, newer ones wrap it in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueryField {
    Text(String),
    Object {
        #[serde(default)]
        query: String,
    },
}

impl QueryField {
    pub fn text(&self) -> &str {
        match self {
            Self::Text(query) => query,
            Self::Object { query } => query,
        }
    }
}

/// The datasource of a templating variable: a plain name in older
/// dashboards, a `{type, uid}` reference in newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DataSourceField {
    Name(String),
    Reference {
        #[serde(default)]
        uid: Option<String>,
    },
}

impl DataSourceField {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Reference { uid } => uid.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PanelDto {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub targets: Vec<TargetDto>,
    #[serde(default)]
    pub panels: Vec<PanelDto>,
}

#[derive(Debug, Deserialize)]
pub struct TargetDto {
    #[serde(default)]
    pub expr: String,
}

pub fn map_dashboard(uid: &str, response: DashboardResponse) -> DashboardDefinition {
    DashboardDefinition {
        uid: uid.to_string(),
        slug: response.meta.slug,
        panels: response.dashboard.panels.into_iter().map(map_panel).collect(),
        variables: response
            .dashboard
            .templating
            .list
            .into_iter()
            .map(map_variable)
            .collect(),
    }
}

fn map_panel(dto: PanelDto) -> Panel {
    Panel {
        id: dto.id,
        title: dto.title,
        kind: PanelKind::from_type_tag(&dto.kind),
        targets: dto.targets.into_iter().map(|t| t.expr).collect(),
        panels: dto.panels.into_iter().map(map_panel).collect(),
        collapsed: dto.collapsed,
    }
}

fn map_variable(dto: VariableDto) -> VariableDecl {
    VariableDecl {
        name: dto.name,
        kind: VariableKind::from_type_tag(&dto.kind),
        option_values: dto
            .options
            .into_iter()
            .filter_map(|o| o.value.as_str().map(str::to_string))
            .collect(),
        query: dto.query.as_ref().map(|q| q.text().to_string()),
        datasource: dto
            .datasource
            .as_ref()
            .and_then(|ds| ds.key())
            .map(str::to_string),
    }
}
