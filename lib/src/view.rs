//! Describes a paginated result as a Hydra collection with a partial collection view.

use crate::consts::{
    FIRST, HYDRA_COLLECTION, HYDRA_MEMBER, ITEMS_PER_PAGE, LAST, NEXT, PARTIAL_COLLECTION_VIEW,
    PREVIOUS, TOTAL_ITEMS, TYPE, VIEW,
};
use crate::errors::{CatalogueError, Result};
use crate::negotiate::Paging;
use crate::query::sorted_subjects;
use anyhow::anyhow;
use oxigraph::model::vocab::xsd;
use oxigraph::model::{Graph, Literal, NamedNode, NamedNodeRef, TripleRef};

/// Page numbers of the navigation links of one view.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageLinks {
    pub first: u64,
    pub last: u64,
    pub next: u64,
    pub previous: u64,
}

/// `ceil(total / pagesize)`, never below 1 so an empty collection still has a page.
pub fn last_page(total: usize, pagesize: u64) -> Result<u64> {
    if pagesize == 0 {
        return Err(CatalogueError::Validation(
            "pagesize must be at least 1".into(),
        ));
    }
    let total = total as u64;
    Ok(total.div_ceil(pagesize).max(1))
}

pub fn page_links(total: usize, paging: Paging) -> Result<PageLinks> {
    let last = last_page(total, paging.pagesize)?;
    Ok(PageLinks {
        first: 1,
        last,
        next: paging.page.saturating_add(1).min(last),
        previous: paging.page.saturating_sub(1).max(1),
    })
}

/// URL of page `page` of the collection at `collection_url`.
pub fn page_url(collection_url: &str, page: u64, pagesize: u64) -> String {
    let sep = if collection_url.contains('?') { '&' } else { '?' };
    format!("{collection_url}{sep}page={page}&pagesize={pagesize}")
}

fn named(iri: String) -> Result<NamedNode> {
    NamedNode::new(iri.as_str())
        .map_err(|e| CatalogueError::Internal(anyhow!("invalid collection IRI {iri}: {e}")))
}

fn integer(value: u64) -> Literal {
    Literal::new_typed_literal(value.to_string(), xsd::INTEGER)
}

/// Adds the collection node at `collection_url`, one `hydra:member` edge per subject of
/// `graph` (only instances of `type_filter` when given) and the view node with
/// first/last/next/previous links for `paging`. Members are enumerated before anything is
/// added, so the view's own nodes never become members.
pub fn add_collection_view(
    graph: &mut Graph,
    collection_url: &str,
    type_filter: Option<NamedNodeRef<'_>>,
    total: usize,
    paging: Paging,
) -> Result<()> {
    let links = page_links(total, paging)?;
    let members = sorted_subjects(graph, type_filter);
    let collection = named(collection_url.to_string())?;
    for member in &members {
        graph.insert(TripleRef::new(&collection, HYDRA_MEMBER, member.as_ref()));
    }
    graph.insert(TripleRef::new(&collection, TYPE, HYDRA_COLLECTION));
    graph.insert(TripleRef::new(
        &collection,
        ITEMS_PER_PAGE,
        &integer(paging.pagesize),
    ));
    graph.insert(TripleRef::new(&collection, TOTAL_ITEMS, &integer(total as u64)));

    let pagesize = paging.pagesize;
    let view = named(page_url(collection_url, paging.page, pagesize))?;
    graph.insert(TripleRef::new(&collection, VIEW, &view));
    graph.insert(TripleRef::new(&view, TYPE, PARTIAL_COLLECTION_VIEW));
    for (predicate, page) in [
        (FIRST, links.first),
        (LAST, links.last),
        (NEXT, links.next),
        (PREVIOUS, links.previous),
    ] {
        let target = named(page_url(collection_url, page, pagesize))?;
        graph.insert(TripleRef::new(&view, predicate, &target));
    }
    Ok(())
}
