use serde::Deserialize;

use crate::users::repo_types::SearchVisibility;

/// `GET /users/search` query string.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrivacyRequest {
    pub search_visibility: SearchVisibility,
}
