//! Resolves the query parameters shared by every endpoint: the pagination window and the
//! output serialization. Everything here runs before the upstream is contacted.

use crate::errors::{CatalogueError, Result};
use crate::formats::OutputFormat;
use std::collections::HashMap;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGESIZE: u64 = 50;

/// A 1-based page of `pagesize` items.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Paging {
    pub page: u64,
    pub pagesize: u64,
}

impl Default for Paging {
    fn default() -> Self {
        Paging {
            page: DEFAULT_PAGE,
            pagesize: DEFAULT_PAGESIZE,
        }
    }
}

impl Paging {
    pub fn new(page: u64, pagesize: u64) -> Result<Self> {
        if page == 0 {
            return Err(CatalogueError::Validation("page must be at least 1".into()));
        }
        if pagesize == 0 {
            return Err(CatalogueError::Validation(
                "pagesize must be at least 1".into(),
            ));
        }
        Ok(Paging { page, pagesize })
    }

    pub fn offset(&self) -> usize {
        usize::try_from((self.page - 1).saturating_mul(self.pagesize)).unwrap_or(usize::MAX)
    }

    pub fn limit(&self) -> usize {
        usize::try_from(self.pagesize).unwrap_or(usize::MAX)
    }

    /// The `[start, end)` item range of this page. Both the counted total and the selected
    /// members must be cut with this range.
    pub fn window(&self) -> std::ops::Range<usize> {
        let start = self.offset();
        start..start.saturating_add(self.limit())
    }

    /// Applies the window to an already ordered sequence.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.window();
        let start = range.start.min(items.len());
        let end = range.end.min(items.len());
        &items[start..end]
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RequestParams {
    pub paging: Paging,
    pub output: OutputFormat,
    /// Media type asked of the upstream when data is passed through.
    pub upstream_format: &'static str,
}

fn parse_positive(name: &str, value: Option<&String>, default: u64) -> Result<u64> {
    let Some(raw) = value else {
        return Ok(default);
    };
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CatalogueError::Validation(format!(
            "{name} must be a positive integer, got '{raw}'"
        )));
    }
    let parsed: u64 = raw.parse().map_err(|_| {
        CatalogueError::Validation(format!("{name} is out of range: '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(CatalogueError::Validation(format!(
            "{name} must be at least 1"
        )));
    }
    Ok(parsed)
}

/// Resolves `page`, `pagesize` and `format` from a request's query parameters.
pub fn resolve_params(
    query: &HashMap<String, String>,
    default_pagesize: u64,
) -> Result<RequestParams> {
    let output = match query.get("format") {
        None => OutputFormat::default(),
        Some(value) => OutputFormat::from_param(value).ok_or_else(|| {
            CatalogueError::UnsupportedFormat(format!(
                "'{value}' is not one of jsonld, ttl, rdfxml"
            ))
        })?,
    };
    let page = parse_positive("page", query.get("page"), DEFAULT_PAGE)?;
    let pagesize = parse_positive("pagesize", query.get("pagesize"), default_pagesize)?;
    Ok(RequestParams {
        paging: Paging::new(page, pagesize)?,
        output,
        upstream_format: output.upstream_media_type(),
    })
}
