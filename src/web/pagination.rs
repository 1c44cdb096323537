//! Page-number pagination: `?page=&limit=` in, `count/next/previous/results` out.

use axum::http::Uri;
use serde::Serialize;

use crate::db::services::PageRequest;
use crate::server::config::ServerConfig;
use crate::web::error::AppError;

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

fn invalid_page() -> AppError {
    AppError::NotFound("Invalid page.".to_string())
}

/// Turns the raw query parameters into a bounded page request.
/// A missing or zero `limit` falls back to the configured page size; a page
/// whose row offset does not fit a signed 64-bit SQL offset is a 404.
pub fn page_request(
    config: &ServerConfig,
    page: Option<u64>,
    limit: Option<u64>,
) -> Result<PageRequest, AppError> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(invalid_page());
    }
    let limit = match limit {
        Some(limit) if limit > 0 => limit.min(config.max_page_size),
        _ => config.page_size,
    };
    let offset = (page - 1).checked_mul(limit);
    if !offset.is_some_and(|offset| i64::try_from(offset).is_ok()) {
        return Err(invalid_page());
    }
    Ok(PageRequest { page, limit })
}

impl<T> Page<T> {
    /// Wraps one page of results. Asking for a page past the last one is a 404;
    /// page 1 of an empty result is always valid.
    pub fn new(uri: &Uri, request: PageRequest, total: u64, results: Vec<T>) -> Result<Self, AppError> {
        let last_page = total.div_ceil(request.limit).max(1);
        if request.page > last_page {
            return Err(invalid_page());
        }
        Ok(Self {
            count: total,
            next: (request.page < last_page).then(|| page_link(uri, request.page + 1)),
            previous: (request.page > 1).then(|| page_link(uri, request.page - 1)),
            results,
        })
    }
}

/// The request's own path and query with `page` replaced. Page 1 drops the parameter.
fn page_link(uri: &Uri, page: u64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && pair.split('=').next() != Some("page"))
        .map(str::to_string)
        .collect();
    if page > 1 {
        pairs.push(format!("page={page}"));
    }
    if pairs.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), pairs.join("&"))
    }
}
