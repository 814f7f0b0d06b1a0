// Parsing of the Grafana `label_values` variable query grammar
use regex::Regex;
use std::sync::OnceLock;

/// A parsed `label_values(<metric expr>, <label>)` query.
///
/// `metric` is absent for the single-argument form `label_values(label)`,
/// which enumerates the label directly instead of matching series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelValuesQuery {
    pub metric: Option<String>,
    pub label: String,
}

/// Parse a variable query string against the `label_values` grammar.
///
/// The match is anchored to the whole string, so queries that merely
/// contain the `label_values` token somewhere inside do not match.
/// Returns `None` for any other query grammar; other grammars are not
/// errors, they simply produce no values.
pub fn parse_label_values(query: &str) -> Option<LabelValuesQuery> {
    static LABEL_VALUES_RE: OnceLock<Regex> = OnceLock::new();
    let re = LABEL_VALUES_RE.get_or_init(|| {
        Regex::new(r"^label_values\((?:(.+),\s*)?([a-zA-Z_][a-zA-Z0-9_]*)\)\s*$")
            .expect("label_values regex should compile")
    });

    let captures = re.captures(query.trim_start())?;
    let metric = captures
        .get(1)
        .map(|m| m.as_str().trim().to_string())
        .filter(|m| !m.is_empty());
    let label = captures.get(2)?.as_str().to_string();

    Some(LabelValuesQuery { metric, label })
}
