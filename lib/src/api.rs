//! Defines the main `Catalogue` struct and one method per catalogue endpoint.
//! Each method queries the upstream vocabulary service, re-shapes the answer into an RDF
//! graph and, for collections, adds the Hydra view of the requested page.

use crate::builder::{
    artefact_triples, catalogue_triples, distribution_triples, group_triples, record_triples,
    scheme_triples, search_hit_triples, type_triples, Links,
};
use crate::config::Config;
use crate::consts::{
    CATALOG_RECORD, CLASS, COLLECTION, CONCEPT, CONCEPT_SCHEME, DISTRIBUTION, NAMED_INDIVIDUAL,
    PROPERTY, SEMANTIC_ARTEFACT, XL_LABEL,
};
use crate::errors::{CatalogueError, Result};
use crate::fetch::{Fetched, UpstreamClient, VocabularySource};
use crate::formats::{distribution_format, DistributionFormat, DISTRIBUTION_FORMATS};
use crate::negotiate::Paging;
use crate::query::{
    count_by_type, count_subjects, describe_all, describe_by_type, merge, parse_turtle,
};
use crate::view::add_collection_view;
use futures::future::try_join_all;
use log::{debug, info};
use oxigraph::model::{Graph, NamedNodeRef};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Initializes logging for the modcat library.
///
/// If `MODCAT_LOG` is set, `RUST_LOG` is set to its value so it takes precedence.
/// The logger itself (e.g. `env_logger::init()`) must be initialized after this call.
pub fn init_logging() {
    if let Ok(log_level) = std::env::var("MODCAT_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}

/// The typed sub-collections of an artefact's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Classes,
    Concepts,
    Properties,
    Individuals,
    Schemes,
    Collections,
    Labels,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Classes,
        ResourceKind::Concepts,
        ResourceKind::Properties,
        ResourceKind::Individuals,
        ResourceKind::Schemes,
        ResourceKind::Collections,
        ResourceKind::Labels,
    ];

    /// Path segment under `/artefacts/{id}/resources/`.
    pub fn segment(&self) -> &'static str {
        match self {
            ResourceKind::Classes => "classes",
            ResourceKind::Concepts => "concepts",
            ResourceKind::Properties => "properties",
            ResourceKind::Individuals => "individuals",
            ResourceKind::Schemes => "schemes",
            ResourceKind::Collections => "collections",
            ResourceKind::Labels => "labels",
        }
    }

    /// Accepts every [`segment`](Self::segment) plus the singular `collection`.
    pub fn from_segment(segment: &str) -> Option<Self> {
        if segment == "collection" {
            return Some(ResourceKind::Collections);
        }
        Self::ALL.into_iter().find(|kind| kind.segment() == segment)
    }

    pub fn rdf_type(&self) -> NamedNodeRef<'static> {
        match self {
            ResourceKind::Classes => CLASS,
            ResourceKind::Concepts => CONCEPT,
            ResourceKind::Properties => PROPERTY,
            ResourceKind::Individuals => NAMED_INDIVIDUAL,
            ResourceKind::Schemes => CONCEPT_SCHEME,
            ResourceKind::Collections => COLLECTION,
            ResourceKind::Labels => XL_LABEL,
        }
    }
}

/// One entry of the upstream vocabulary list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyEntry {
    pub id: String,
    pub title: Option<String>,
}

impl VocabularyEntry {
    fn matches(&self, needle: &str) -> bool {
        self.id.to_lowercase().contains(needle)
            || self
                .title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains(needle))
    }
}

/// The array under `key`; its absence means the upstream answered something unexpected.
fn json_array<'a>(json: &'a Value, key: &str) -> Result<&'a [Value]> {
    json.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| CatalogueError::UpstreamData(format!("response has no '{key}' array")))
}

fn trimmed(json: &Value, key: &str) -> Option<String> {
    json.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Artefact ids become upstream path segments, so anything that could leave the
/// vocabulary's own namespace cannot name an artefact.
fn checked_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '?', '#', '\\']) {
        return Err(CatalogueError::UpstreamNotFound(format!(
            "no artefact with id '{id}'"
        )));
    }
    Ok(id)
}

fn detail_path(id: &str) -> String {
    format!("{id}/")
}

fn data_path(id: &str) -> String {
    format!("{id}/data")
}

/// A distribution the upstream confirmed, with its fixed 1-based index.
struct Available {
    index: usize,
    format: &'static DistributionFormat,
    download_url: String,
}

pub struct Catalogue {
    config: Config,
    source: Arc<dyn VocabularySource>,
}

impl Catalogue {
    pub fn new(config: Config, source: Arc<dyn VocabularySource>) -> Self {
        Self { config, source }
    }

    /// A catalogue backed by the upstream HTTP API named in `config`.
    pub fn from_config(config: Config) -> Result<Self> {
        let client = UpstreamClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// IRI minting for a request whose public base URL is `base`.
    pub fn links(&self, base: Url) -> Links {
        Links::new(base, self.config.landing.clone(), self.config.lang.clone())
    }

    /// The upstream vocabulary list, sorted by id with duplicates removed.
    pub async fn vocabularies(&self) -> Result<Vec<VocabularyEntry>> {
        let json = self.source.fetch_json("vocabularies", &[]).await?;
        let mut entries: Vec<VocabularyEntry> = json_array(&json, "vocabularies")?
            .iter()
            .filter_map(|v| {
                Some(VocabularyEntry {
                    id: trimmed(v, "id")?,
                    title: trimmed(v, "title"),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.dedup_by(|a, b| a.id == b.id);
        debug!("Upstream lists {} vocabularies", entries.len());
        Ok(entries)
    }

    async fn detail(&self, id: &str) -> Result<Value> {
        self.source.fetch_json(&detail_path(id), &[]).await
    }

    /// Descriptions of `entries`, fetched concurrently and merged into one graph.
    async fn describe_artefacts(
        &self,
        links: &Links,
        entries: &[VocabularyEntry],
    ) -> Result<Graph> {
        let details = try_join_all(entries.iter().map(|e| self.detail(&e.id))).await?;
        let mut graph = Graph::new();
        for (entry, json) in entries.iter().zip(details.iter()) {
            merge(&mut graph, &artefact_triples(links, &entry.id, json)?);
        }
        Ok(graph)
    }

    /// The Turtle dump of artefact `id`.
    async fn dump(&self, id: &str) -> Result<Graph> {
        let fetched = self
            .source
            .fetch_text(&data_path(id), &[("format", "text/turtle")], "text/turtle")
            .await?;
        parse_turtle(&fetched.body)
    }

    /// Probes every known format and keeps those the upstream can serve, in index order.
    async fn available_distributions(&self, id: &str) -> Result<Vec<Available>> {
        let path = data_path(id);
        let queries: Vec<[(&str, &str); 1]> = DISTRIBUTION_FORMATS
            .iter()
            .map(|format| [("format", format.media_type)])
            .collect();
        let probes =
            try_join_all(queries.iter().map(|query| self.source.probe(&path, query))).await?;
        Ok(DISTRIBUTION_FORMATS
            .iter()
            .zip(probes)
            .enumerate()
            .filter_map(|(i, (format, probe))| {
                probe.location().map(|url| Available {
                    index: i + 1,
                    format,
                    download_url: url.to_string(),
                })
            })
            .collect())
    }

    /// `GET /`
    pub async fn catalogue(&self, links: &Links) -> Result<Graph> {
        info!("Describing the catalogue");
        let ids: Vec<String> = self
            .vocabularies()
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect();
        let title = match self.config.landing.host_str() {
            Some(host) => format!("Semantic artefacts of {host}"),
            None => "Semantic artefacts".to_string(),
        };
        catalogue_triples(links, &title, &ids)
    }

    /// `GET /artefacts`
    pub async fn artefacts(&self, links: &Links, paging: Paging) -> Result<Graph> {
        info!(
            "Listing artefacts (page {}, pagesize {})",
            paging.page, paging.pagesize
        );
        let entries = self.vocabularies().await?;
        let mut graph = self.describe_artefacts(links, paging.slice(&entries)).await?;
        add_collection_view(
            &mut graph,
            &links.artefacts(),
            Some(SEMANTIC_ARTEFACT),
            entries.len(),
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /artefacts/{id}`
    pub async fn artefact(&self, links: &Links, id: &str) -> Result<Graph> {
        let id = checked_id(id)?;
        info!("Describing artefact {id}");
        let json = self.detail(id).await?;
        artefact_triples(links, id, &json)
    }

    /// `GET /artefacts/{id}/distributions`
    ///
    /// Members keep their fixed index even when formats before them are unavailable.
    pub async fn distributions(&self, links: &Links, id: &str, paging: Paging) -> Result<Graph> {
        let id = checked_id(id)?;
        info!("Listing distributions of {id}");
        let (_, available) =
            futures::try_join!(self.detail(id), self.available_distributions(id))?;
        let mut graph = Graph::new();
        for dist in paging.slice(&available) {
            let triples =
                distribution_triples(links, id, dist.format, &dist.download_url, dist.index)?;
            merge(&mut graph, &triples);
        }
        add_collection_view(
            &mut graph,
            &links.distributions(id),
            Some(DISTRIBUTION),
            available.len(),
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /artefacts/{id}/distributions/{index}`
    pub async fn distribution(&self, links: &Links, id: &str, index: usize) -> Result<Graph> {
        let id = checked_id(id)?;
        let format = distribution_format(index).ok_or_else(|| {
            CatalogueError::UpstreamNotFound(format!("artefact {id} has no distribution {index}"))
        })?;
        info!("Describing distribution {index} ({}) of {id}", format.media_type);
        let probe = self
            .source
            .probe(&data_path(id), &[("format", format.media_type)])
            .await?;
        let download_url = probe.location().ok_or_else(|| {
            CatalogueError::UpstreamNotFound(format!(
                "artefact {id} is not available as {}",
                format.media_type
            ))
        })?;
        distribution_triples(links, id, format, download_url, index)
    }

    /// `GET /artefacts/{id}/resources`: every subject of the dump.
    pub async fn resources(&self, links: &Links, id: &str, paging: Paging) -> Result<Graph> {
        let id = checked_id(id)?;
        info!("Listing resources of {id}");
        let dump = self.dump(id).await?;
        let total = count_subjects(&dump);
        let mut graph = describe_all(&dump, paging.limit(), paging.offset());
        add_collection_view(&mut graph, &links.resources(id, None), None, total, paging)?;
        Ok(graph)
    }

    /// The graph the instances of `kind` are selected from.
    async fn kind_source(&self, id: &str, kind: ResourceKind) -> Result<Graph> {
        let lang = self.config.lang.as_str();
        let mut graph = Graph::new();
        match kind {
            ResourceKind::Classes => {
                let json = self.source.fetch_json(&format!("{id}/types"), &[]).await?;
                for item in json_array(&json, "types")? {
                    merge(&mut graph, &type_triples(item, lang));
                }
            }
            ResourceKind::Schemes => {
                let json = self.detail(id).await?;
                let schemes = json.get("conceptschemes").and_then(Value::as_array);
                for item in schemes.into_iter().flatten() {
                    merge(&mut graph, &scheme_triples(item, lang));
                }
            }
            ResourceKind::Collections => {
                let json = self.source.fetch_json(&format!("{id}/groups"), &[]).await?;
                for item in json_array(&json, "groups")? {
                    merge(&mut graph, &group_triples(item, lang));
                }
            }
            ResourceKind::Concepts
            | ResourceKind::Properties
            | ResourceKind::Individuals
            | ResourceKind::Labels => graph = self.dump(id).await?,
        }
        Ok(graph)
    }

    /// `GET /artefacts/{id}/resources/{kind}`
    pub async fn typed_resources(
        &self,
        links: &Links,
        id: &str,
        kind: ResourceKind,
        paging: Paging,
    ) -> Result<Graph> {
        let id = checked_id(id)?;
        info!("Listing {} of {id}", kind.segment());
        let source = self.kind_source(id, kind).await?;
        let rdf_type = kind.rdf_type();
        let total = count_by_type(&source, rdf_type);
        let mut graph = describe_by_type(&source, rdf_type, paging.limit(), paging.offset());
        add_collection_view(
            &mut graph,
            &links.resources(id, Some(kind.segment())),
            Some(rdf_type),
            total,
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /artefacts/{id}/resources/{uri}`: the upstream's own description of one
    /// resource, in `media_type`, passed through untouched.
    pub async fn resource(&self, id: &str, uri: &str, media_type: &str) -> Result<Fetched> {
        let id = checked_id(id)?;
        Url::parse(uri)
            .map_err(|e| CatalogueError::Validation(format!("'{uri}' is not an IRI: {e}")))?;
        info!("Fetching {uri} from {id} as {media_type}");
        self.source
            .fetch_text(
                &data_path(id),
                &[("uri", uri), ("format", media_type)],
                media_type,
            )
            .await
    }

    /// `GET /search/content?q=`: free-text search over every vocabulary, windowed here.
    pub async fn search_content(
        &self,
        links: &Links,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<Graph> {
        let query = required_query(query)?;
        info!("Searching content for '{query}'");
        let json = self.source.fetch_json("search", &[("query", query)]).await?;
        let mut hits: Vec<&Value> = json_array(&json, "results")?
            .iter()
            .filter(|hit| trimmed(hit, "uri").is_some())
            .collect();
        hits.sort_by_cached_key(|hit| trimmed(hit, "uri"));
        hits.dedup_by_key(|hit| trimmed(hit, "uri"));
        let mut graph = Graph::new();
        for hit in paging.slice(&hits) {
            merge(&mut graph, &search_hit_triples(links, hit));
        }
        add_collection_view(
            &mut graph,
            &links.search("content", query),
            None,
            hits.len(),
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /search/metadata?q=`: artefacts whose id or title contains `q`, ignoring case.
    pub async fn search_metadata(
        &self,
        links: &Links,
        query: Option<&str>,
        paging: Paging,
    ) -> Result<Graph> {
        let query = required_query(query)?;
        info!("Searching metadata for '{query}'");
        let needle = query.to_lowercase();
        let matching: Vec<VocabularyEntry> = self
            .vocabularies()
            .await?
            .into_iter()
            .filter(|e| e.matches(&needle))
            .collect();
        let mut graph = self.describe_artefacts(links, paging.slice(&matching)).await?;
        add_collection_view(
            &mut graph,
            &links.search("metadata", query),
            Some(SEMANTIC_ARTEFACT),
            matching.len(),
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /records`
    pub async fn records(&self, links: &Links, paging: Paging) -> Result<Graph> {
        info!("Listing records");
        let entries = self.vocabularies().await?;
        let mut graph = Graph::new();
        for entry in paging.slice(&entries) {
            merge(
                &mut graph,
                &record_triples(links, &entry.id, entry.title.as_deref())?,
            );
        }
        add_collection_view(
            &mut graph,
            &links.records(),
            Some(CATALOG_RECORD),
            entries.len(),
            paging,
        )?;
        Ok(graph)
    }

    /// `GET /records/{id}` and `GET /artefacts/{id}/record`
    pub async fn record(&self, links: &Links, id: &str) -> Result<Graph> {
        let id = checked_id(id)?;
        info!("Describing the record of {id}");
        let json = self.detail(id).await?;
        let title = trimmed(&json, "title");
        record_triples(links, id, title.as_deref())
    }
}

fn required_query(query: Option<&str>) -> Result<&str> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| CatalogueError::Validation("the 'q' parameter is required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Probe;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned JSON keyed by path and records every call.
    #[derive(Default)]
    struct Canned {
        json: HashMap<String, Value>,
        probes: HashMap<String, Probe>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl VocabularySource for Canned {
        async fn fetch_json(&self, path: &str, _query: &[(&str, &str)]) -> Result<Value> {
            self.calls.lock().unwrap().push(path.to_string());
            self.json
                .get(path)
                .cloned()
                .ok_or_else(|| CatalogueError::UpstreamNotFound(path.to_string()))
        }

        async fn fetch_text(
            &self,
            path: &str,
            _query: &[(&str, &str)],
            _accept: &str,
        ) -> Result<Fetched> {
            Err(CatalogueError::UpstreamNotFound(path.to_string()))
        }

        async fn probe(&self, _path: &str, query: &[(&str, &str)]) -> Result<Probe> {
            let format = query.iter().find(|(k, _)| *k == "format").map(|(_, v)| *v);
            Ok(format
                .and_then(|f| self.probes.get(f).cloned())
                .unwrap_or(Probe::NotFound))
        }
    }

    fn links() -> Links {
        Links::new(
            Url::parse("http://localhost:5000/").unwrap(),
            Url::parse("https://finto.fi/").unwrap(),
            "en",
        )
    }

    fn catalogue(source: Canned) -> Catalogue {
        Catalogue::new(Config::default(), Arc::new(source))
    }

    #[test]
    fn test_resource_kind_segments() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_segment(kind.segment()), Some(kind));
        }
        assert_eq!(
            ResourceKind::from_segment("collection"),
            Some(ResourceKind::Collections)
        );
        assert_eq!(ResourceKind::from_segment("http%3A%2F%2Fex.org%2Fa"), None);
    }

    #[test]
    fn test_checked_id() {
        assert_eq!(checked_id("yso").unwrap(), "yso");
        for bad in ["", "..", "a/b", "a?b", "a#b"] {
            assert!(matches!(
                checked_id(bad),
                Err(CatalogueError::UpstreamNotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_vocabularies_sorted_and_deduplicated() {
        let mut source = Canned::default();
        source.json.insert(
            "vocabularies".into(),
            json!({"vocabularies": [
                {"id": "b", "title": "Bee"},
                {"id": "a"},
                {"id": "b"},
                {"title": "no id"},
            ]}),
        );
        let entries = catalogue(source).vocabularies().await.unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_vocabulary_list_without_array_is_bad_data() {
        let mut source = Canned::default();
        source
            .json
            .insert("vocabularies".into(), json!({"unexpected": true}));
        let err = catalogue(source).vocabularies().await.unwrap_err();
        assert!(matches!(err, CatalogueError::UpstreamData(_)));
    }

    #[tokio::test]
    async fn test_distribution_out_of_range_skips_upstream() {
        let source = Canned::default();
        let cat = catalogue(source);
        for index in [0, 5, 99] {
            let err = cat.distribution(&links(), "yso", index).await.unwrap_err();
            assert!(matches!(err, CatalogueError::UpstreamNotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_distributions_keep_fixed_indices() {
        let mut source = Canned::default();
        source.json.insert("yso/".into(), json!({"id": "yso"}));
        source.probes.insert(
            "application/rdf+xml".into(),
            Probe::Redirect("https://dl.example.org/yso.rdf".into()),
        );
        source.probes.insert(
            "application/ld+json".into(),
            Probe::Found("https://api.example.org/yso/data".into()),
        );
        let graph = catalogue(source)
            .distributions(&links(), "yso", Paging::new(2, 1).unwrap())
            .await
            .unwrap();
        let members: Vec<_> = graph
            .subjects_for_predicate_object(crate::consts::TYPE, DISTRIBUTION)
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            members,
            vec!["<http://localhost:5000/artefacts/yso/distributions/4>"]
        );
    }

    #[tokio::test]
    async fn test_search_requires_query() {
        let source = Canned::default();
        let cat = catalogue(source);
        for q in [None, Some(""), Some("   ")] {
            let err = cat
                .search_content(&links(), q, Paging::default())
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogueError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_search_metadata_matches_id_and_title() {
        let mut source = Canned::default();
        source.json.insert(
            "vocabularies".into(),
            json!({"vocabularies": [
                {"id": "yso", "title": "General Finnish ontology"},
                {"id": "koko", "title": "KOKO"},
                {"id": "mesh", "title": "Medical Subject Headings"},
            ]}),
        );
        source.json.insert("yso/".into(), json!({"id": "yso"}));
        source.json.insert("mesh/".into(), json!({"id": "mesh"}));
        let graph = catalogue(source)
            .search_metadata(&links(), Some("ONTO"), Paging::default())
            .await
            .unwrap();
        assert_eq!(count_by_type(&graph, SEMANTIC_ARTEFACT), 1);
    }

    #[tokio::test]
    async fn test_schemes_come_from_the_detail() {
        let mut source = Canned::default();
        source.json.insert(
            "yso/".into(),
            json!({
                "id": "yso",
                "conceptschemes": [
                    {"uri": "http://www.yso.fi/onto/yso/", "label": "YSO"},
                    {"label": "no uri"},
                ],
            }),
        );
        let source = Arc::new(source);
        let cat = Catalogue::new(Config::default(), source.clone());
        let graph = cat
            .typed_resources(&links(), "yso", ResourceKind::Schemes, Paging::default())
            .await
            .unwrap();
        assert_eq!(count_by_type(&graph, CONCEPT_SCHEME), 1);
        // schemes never need the dump
        assert_eq!(*source.calls.lock().unwrap(), vec!["yso/".to_string()]);
    }
}
