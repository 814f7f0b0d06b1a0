// Render request value object

/// Everything the render endpoint needs to produce one panel image.
///
/// Built fresh for each leaf of the variable combination tree and handed
/// straight to the backend; `params` carries one `var-<name>` binding per
/// variable that is relevant to the panel, in variable declaration order.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub dashboard_uid: String,
    pub dashboard_slug: String,
    pub panel_id: i64,
    pub params: Vec<(String, String)>,
    /// Explicit pixel dimensions, present only for panel kinds that need
    /// them (graph and timeseries).
    pub size: Option<(u32, u32)>,
}
