use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::directory::Directory;
use crate::pagination::{Page, PageOutOfRange, PageWindow};
use crate::users::filter::{compose, VisibilityFilter};
use crate::users::repo_types::UserSummary;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("search query must be at least {0} characters long")]
    QueryTooShort(usize),
    #[error("invalid page")]
    PageOutOfRange(#[from] PageOutOfRange),
    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Identity a search runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub is_staff: bool,
}

impl Requester {
    pub fn user(id: Uuid) -> Self {
        Self { id, is_staff: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub page: u32,
    pub page_size: u32,
    pub min_query_length: usize,
    /// Staff requesters skip the visibility filter entirely.
    pub staff_bypass: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(cfg: &SearchConfig) -> Self {
        Self {
            page: 1,
            page_size: cfg.page_size,
            min_query_length: cfg.min_query_length,
            staff_bypass: cfg.staff_bypass,
        }
    }
}

/// Trims the query and enforces the minimum length (in characters).
pub fn validate_query(raw: &str, min_len: usize) -> Result<&str, SearchError> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    if query.chars().count() < min_len {
        return Err(SearchError::QueryTooShort(min_len));
    }
    Ok(query)
}

/// Per-field display privacy for listed users. Currently passes everything through.
pub fn present(summary: UserSummary, _viewer: Option<Uuid>) -> UserSummary {
    summary
}

/// Privacy-aware user search: validate, match, filter, paginate.
#[instrument(skip(dir, raw_query, requester), fields(requester = ?requester.map(|r| r.id)))]
pub async fn search_users(
    dir: &dyn Directory,
    raw_query: &str,
    requester: Option<Requester>,
    opts: SearchOptions,
) -> Result<Page<UserSummary>, SearchError> {
    let query = validate_query(raw_query, opts.min_query_length)?;

    let filter = match requester {
        Some(r) if opts.staff_bypass && r.is_staff => VisibilityFilter::Unrestricted,
        _ => compose(requester.map(|r| r.id)),
    };

    let count = dir.count_matches(query, &filter).await?;
    let window = PageWindow::resolve(count, opts.page, opts.page_size)?;
    let rows = dir
        .fetch_matches(query, &filter, window.page_size, window.offset())
        .await?;
    debug!(count, page = window.page, returned = rows.len(), "user search");

    let viewer = requester.map(|r| r.id);
    Ok(Page::new(window, rows).map(|s| present(s, viewer)))
}
