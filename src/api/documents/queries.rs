use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct ListDocumentsQuery {
    #[serde(default)]
    pub(super) skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    pub(super) limit: i64,
    #[serde(default)]
    pub(super) title: Option<String>,
}
