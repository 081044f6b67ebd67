//! Maps upstream JSON objects onto triples using MOD, DCAT, DCTERMS, SKOS and RDFS terms.
//!
//! Every function here is pure: the request's base URL arrives through [`Links`] and nothing
//! is read from ambient state. Fields missing from the upstream JSON (or empty strings) never
//! produce a triple.

use crate::consts::*;
use crate::errors::{CatalogueError, Result};
use crate::formats::DistributionFormat;
use oxigraph::model::{Graph, Literal, NamedNode, NamedNodeRef, TripleRef};
use serde_json::Value;
use url::Url;

/// Mints the IRIs of catalogue resources from the base URL of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Links {
    base: Url,
    landing: Url,
    lang: String,
}

impl Links {
    pub fn new(base: Url, landing: Url, lang: impl Into<String>) -> Self {
        Links {
            base,
            landing,
            lang: lang.into(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    /// `base` followed by the percent-encoded `segments`.
    fn at(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    pub fn catalogue(&self) -> String {
        self.base.to_string()
    }

    pub fn artefacts(&self) -> String {
        self.at(&["artefacts"])
    }

    pub fn artefact(&self, id: &str) -> String {
        self.at(&["artefacts", id])
    }

    pub fn distributions(&self, id: &str) -> String {
        self.at(&["artefacts", id, "distributions"])
    }

    pub fn distribution(&self, id: &str, index: usize) -> String {
        self.at(&["artefacts", id, "distributions", &index.to_string()])
    }

    /// `/artefacts/{id}/resources` or one of its typed sub-collections.
    pub fn resources(&self, id: &str, kind: Option<&str>) -> String {
        match kind {
            Some(kind) => self.at(&["artefacts", id, "resources", kind]),
            None => self.at(&["artefacts", id, "resources"]),
        }
    }

    pub fn records(&self) -> String {
        self.at(&["records"])
    }

    pub fn record(&self, id: &str) -> String {
        self.at(&["records", id])
    }

    /// `/search/{kind}?q={query}`
    pub fn search(&self, kind: &str, query: &str) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["search", kind]);
        }
        url.query_pairs_mut().append_pair("q", query);
        url.to_string()
    }

    /// Human-facing page of an artefact on the upstream site.
    pub fn landing(&self, id: &str) -> String {
        let mut url = self.landing.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend([id, self.lang.as_str(), ""]);
        }
        url.to_string()
    }
}

fn node(iri: &str) -> Result<NamedNode> {
    NamedNode::new(iri)
        .map_err(|e| CatalogueError::UpstreamData(format!("invalid IRI {iri}: {e}")))
}

/// A language-tagged literal, or a plain one when `lang` is not a valid tag.
fn text(value: &str, lang: &str) -> Literal {
    Literal::new_language_tagged_literal(value, lang)
        .unwrap_or_else(|_| Literal::new_simple_literal(value))
}

/// Non-empty string field of a JSON object.
fn str_field<'a>(json: &'a Value, key: &str) -> Option<&'a str> {
    json.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Non-empty strings of a JSON array field; a bare string counts as a one-element array.
fn str_list<'a>(json: &'a Value, key: &str) -> Vec<&'a str> {
    match json.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim()],
        _ => vec![],
    }
}

/// The IRI of an upstream object, if it has a valid one.
fn uri_of(json: &Value) -> Option<NamedNode> {
    str_field(json, "uri").and_then(|uri| NamedNode::new(uri).ok())
}

fn add_text(
    graph: &mut Graph,
    subject: &NamedNode,
    predicate: NamedNodeRef<'_>,
    value: Option<&str>,
    lang: &str,
) {
    if let Some(value) = value {
        graph.insert(TripleRef::new(subject, predicate, &text(value, lang)));
    }
}

/// Triples of one `mod:SemanticArtefact`, from the upstream vocabulary description.
pub fn artefact_triples(links: &Links, id: &str, json: &Value) -> Result<Graph> {
    let mut graph = Graph::new();
    let artefact = node(&links.artefact(id))?;
    let lang = links.lang();
    graph.insert(TripleRef::new(&artefact, TYPE, SEMANTIC_ARTEFACT));
    add_text(&mut graph, &artefact, TITLE, str_field(json, "title"), lang);
    if let Some(identifier) = str_field(json, "id") {
        graph.insert(TripleRef::new(
            &artefact,
            IDENTIFIER,
            &Literal::new_simple_literal(identifier),
        ));
    }
    graph.insert(TripleRef::new(
        &artefact,
        ACCESS_RIGHTS,
        &text("public", lang),
    ));
    let landing = node(&links.landing(id))?;
    graph.insert(TripleRef::new(&artefact, LANDING_PAGE, &landing));
    for language in str_list(json, "languages") {
        graph.insert(TripleRef::new(
            &artefact,
            LANGUAGE,
            &Literal::new_simple_literal(language),
        ));
    }
    Ok(graph)
}

/// Triples of distribution `index` of artefact `id`, available at `download_url`.
pub fn distribution_triples(
    links: &Links,
    id: &str,
    format: &DistributionFormat,
    download_url: &str,
    index: usize,
) -> Result<Graph> {
    let mut graph = Graph::new();
    let artefact = node(&links.artefact(id))?;
    let distribution = node(&links.distribution(id, index))?;
    graph.insert(TripleRef::new(&artefact, HAS_DISTRIBUTION, &distribution));
    graph.insert(TripleRef::new(&distribution, TYPE, DISTRIBUTION));
    graph.insert(TripleRef::new(
        &distribution,
        DOWNLOAD_URL,
        &node(download_url)?,
    ));
    graph.insert(TripleRef::new(
        &distribution,
        ACCESS_URL,
        &node(&links.landing(id))?,
    ));
    graph.insert(TripleRef::new(&distribution, HAS_SYNTAX, format.syntax));
    graph.insert(TripleRef::new(
        &distribution,
        MEDIA_TYPE,
        &Literal::new_simple_literal(format.media_type),
    ));
    Ok(graph)
}

/// Triples of a `skos:ConceptScheme` listed in a vocabulary description.
pub fn scheme_triples(json: &Value, lang: &str) -> Graph {
    let mut graph = Graph::new();
    let Some(scheme) = uri_of(json) else {
        return graph;
    };
    graph.insert(TripleRef::new(&scheme, TYPE, CONCEPT_SCHEME));
    add_text(&mut graph, &scheme, LABEL, str_field(json, "label"), lang);
    add_text(&mut graph, &scheme, TITLE, str_field(json, "title"), lang);
    graph
}

/// Triples of a concept group, exposed as a `skos:Collection`.
pub fn group_triples(json: &Value, lang: &str) -> Graph {
    let mut graph = Graph::new();
    let Some(group) = uri_of(json) else {
        return graph;
    };
    graph.insert(TripleRef::new(&group, TYPE, COLLECTION));
    add_text(&mut graph, &group, PREF_LABEL, str_field(json, "prefLabel"), lang);
    for child in str_list(json, "childGroups") {
        if let Ok(child) = NamedNode::new(child) {
            graph.insert(TripleRef::new(&group, MEMBER, &child));
        }
    }
    graph
}

/// Triples of a vocabulary type, exposed as an `rdfs:Class`.
pub fn type_triples(json: &Value, lang: &str) -> Graph {
    let mut graph = Graph::new();
    let Some(class) = uri_of(json) else {
        return graph;
    };
    graph.insert(TripleRef::new(&class, TYPE, CLASS));
    add_text(&mut graph, &class, LABEL, str_field(json, "label"), lang);
    if let Some(superclass) = str_field(json, "superclass").and_then(|s| NamedNode::new(s).ok()) {
        graph.insert(TripleRef::new(&class, SUB_CLASS_OF, &superclass));
    }
    graph
}

/// Triples of one free-text search result.
pub fn search_hit_triples(links: &Links, json: &Value) -> Graph {
    let mut graph = Graph::new();
    let Some(hit) = uri_of(json) else {
        return graph;
    };
    for curie in str_list(json, "type") {
        if let Some(class) = expand_curie(curie).and_then(|iri| NamedNode::new(iri).ok()) {
            graph.insert(TripleRef::new(&hit, TYPE, &class));
        }
    }
    let lang = str_field(json, "lang").unwrap_or(links.lang());
    add_text(&mut graph, &hit, PREF_LABEL, str_field(json, "prefLabel"), lang);
    if let Some(vocab) = str_field(json, "vocab") {
        if let Ok(artefact) = NamedNode::new(links.artefact(vocab)) {
            graph.insert(TripleRef::new(&hit, IS_DEFINED_BY, &artefact));
        }
    }
    graph
}

/// Triples of the catalogue root listing the artefacts `ids` and their records.
pub fn catalogue_triples(links: &Links, title: &str, ids: &[String]) -> Result<Graph> {
    let mut graph = Graph::new();
    let catalogue = node(&links.catalogue())?;
    graph.insert(TripleRef::new(&catalogue, TYPE, SEMANTIC_ARTEFACT_CATALOG));
    graph.insert(TripleRef::new(&catalogue, TYPE, CATALOG));
    graph.insert(TripleRef::new(&catalogue, TITLE, &text(title, links.lang())));
    for id in ids {
        graph.insert(TripleRef::new(&catalogue, DATASET, &node(&links.artefact(id))?));
        graph.insert(TripleRef::new(&catalogue, RECORD, &node(&links.record(id))?));
    }
    Ok(graph)
}

/// Triples of the catalogue record describing artefact `id`.
pub fn record_triples(links: &Links, id: &str, title: Option<&str>) -> Result<Graph> {
    let mut graph = Graph::new();
    let record = node(&links.record(id))?;
    graph.insert(TripleRef::new(&record, TYPE, CATALOG_RECORD));
    graph.insert(TripleRef::new(&record, TYPE, SEMANTIC_ARTEFACT_CATALOG_RECORD));
    graph.insert(TripleRef::new(
        &record,
        PRIMARY_TOPIC,
        &node(&links.artefact(id))?,
    ));
    let title = title.map(str::trim).filter(|t| !t.is_empty());
    add_text(&mut graph, &record, TITLE, title, links.lang());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::DISTRIBUTION_FORMATS;
    use oxigraph::model::TermRef;
    use serde_json::json;

    fn links() -> Links {
        Links::new(
            Url::parse("http://localhost:5000/").unwrap(),
            Url::parse("https://finto.fi/").unwrap(),
            "en",
        )
    }

    fn objects<'a>(graph: &'a Graph, s: &'a str, p: NamedNodeRef<'a>) -> Vec<TermRef<'a>> {
        graph
            .objects_for_subject_predicate(NamedNodeRef::new_unchecked(s), p)
            .collect()
    }

    #[test]
    fn test_links() {
        let l = links();
        assert_eq!(l.catalogue(), "http://localhost:5000/");
        assert_eq!(l.artefacts(), "http://localhost:5000/artefacts");
        assert_eq!(l.artefact("yso"), "http://localhost:5000/artefacts/yso");
        assert_eq!(
            l.distribution("yso", 2),
            "http://localhost:5000/artefacts/yso/distributions/2"
        );
        assert_eq!(
            l.resources("yso", Some("concepts")),
            "http://localhost:5000/artefacts/yso/resources/concepts"
        );
        assert_eq!(l.landing("yso"), "https://finto.fi/yso/en/");
        assert_eq!(
            l.search("content", "cat dog"),
            "http://localhost:5000/search/content?q=cat+dog"
        );
    }

    #[test]
    fn test_links_under_prefix() {
        let l = Links::new(
            Url::parse("https://example.org/api/").unwrap(),
            Url::parse("https://finto.fi/").unwrap(),
            "fi",
        );
        assert_eq!(l.artefact("a b"), "https://example.org/api/artefacts/a%20b");
        assert_eq!(l.landing("yso"), "https://finto.fi/yso/fi/");
    }

    #[test]
    fn test_artefact_triples() {
        let json = json!({
            "id": "yso",
            "title": "General Finnish ontology",
            "languages": ["fi", "sv", "en"],
        });
        let graph = artefact_triples(&links(), "yso", &json).unwrap();
        let s = "http://localhost:5000/artefacts/yso";
        assert_eq!(objects(&graph, s, TYPE), vec![TermRef::from(SEMANTIC_ARTEFACT)]);
        assert_eq!(
            objects(&graph, s, TITLE),
            vec![TermRef::from(&text("General Finnish ontology", "en"))]
        );
        assert_eq!(objects(&graph, s, IDENTIFIER).len(), 1);
        assert_eq!(objects(&graph, s, ACCESS_RIGHTS).len(), 1);
        assert_eq!(objects(&graph, s, LANGUAGE).len(), 3);
        assert_eq!(
            objects(&graph, s, LANDING_PAGE),
            vec![TermRef::from(NamedNodeRef::new_unchecked("https://finto.fi/yso/en/"))]
        );
        assert_eq!(graph.len(), 8);
    }

    #[test]
    fn test_artefact_without_optional_fields() {
        let graph = artefact_triples(&links(), "x", &json!({"title": ""})).unwrap();
        let s = "http://localhost:5000/artefacts/x";
        assert!(objects(&graph, s, TITLE).is_empty());
        assert!(objects(&graph, s, IDENTIFIER).is_empty());
        assert!(objects(&graph, s, LANGUAGE).is_empty());
        // type, access rights and landing page are constant
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_distribution_triples() {
        let format = &DISTRIBUTION_FORMATS[0];
        let graph = distribution_triples(
            &links(),
            "yso",
            format,
            "https://finto.fi/rest/v1/yso/data?format=text/turtle",
            1,
        )
        .unwrap();
        let d = "http://localhost:5000/artefacts/yso/distributions/1";
        assert_eq!(objects(&graph, d, TYPE), vec![TermRef::from(DISTRIBUTION)]);
        assert_eq!(objects(&graph, d, HAS_SYNTAX), vec![TermRef::from(format.syntax)]);
        assert_eq!(objects(&graph, d, DOWNLOAD_URL).len(), 1);
        assert_eq!(objects(&graph, d, ACCESS_URL).len(), 1);
        assert_eq!(
            objects(&graph, "http://localhost:5000/artefacts/yso", HAS_DISTRIBUTION),
            vec![TermRef::from(NamedNodeRef::new_unchecked(d))]
        );
    }

    #[test]
    fn test_distribution_with_bad_download_url() {
        let format = &DISTRIBUTION_FORMATS[1];
        let result = distribution_triples(&links(), "yso", format, "not a url", 2);
        assert!(matches!(result, Err(CatalogueError::UpstreamData(_))));
    }

    #[test]
    fn test_scheme_group_type_triples() {
        let scheme = scheme_triples(
            &json!({"uri": "http://www.yso.fi/onto/yso/", "label": "YSO"}),
            "en",
        );
        assert_eq!(scheme.len(), 2);
        let group = group_triples(
            &json!({
                "uri": "http://ex.org/g1",
                "prefLabel": "Group",
                "childGroups": ["http://ex.org/g2", "http://ex.org/g3"],
            }),
            "en",
        );
        assert_eq!(objects(&group, "http://ex.org/g1", MEMBER).len(), 2);
        assert_eq!(group.len(), 4);
        let class = type_triples(
            &json!({
                "uri": "http://ex.org/T",
                "label": "Thing type",
                "superclass": "http://www.w3.org/2004/02/skos/core#Concept",
            }),
            "en",
        );
        assert_eq!(class.len(), 3);
        assert!(type_triples(&json!({"label": "no uri"}), "en").is_empty());
        assert!(group_triples(&json!({"uri": ""}), "en").is_empty());
    }

    #[test]
    fn test_search_hit_triples() {
        let hit = search_hit_triples(
            &links(),
            &json!({
                "uri": "http://www.yso.fi/onto/yso/p864",
                "type": ["skos:Concept", "madeup:Thing"],
                "prefLabel": "kissa",
                "lang": "fi",
                "vocab": "yso",
            }),
        );
        let s = "http://www.yso.fi/onto/yso/p864";
        assert_eq!(objects(&hit, s, TYPE), vec![TermRef::from(CONCEPT)]);
        assert_eq!(
            objects(&hit, s, PREF_LABEL),
            vec![TermRef::from(&text("kissa", "fi"))]
        );
        assert_eq!(
            objects(&hit, s, IS_DEFINED_BY),
            vec![TermRef::from(NamedNodeRef::new_unchecked(
                "http://localhost:5000/artefacts/yso"
            ))]
        );
    }

    #[test]
    fn test_catalogue_and_record_triples() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let catalogue = catalogue_triples(&links(), "Catalogue", &ids).unwrap();
        assert_eq!(objects(&catalogue, "http://localhost:5000/", DATASET).len(), 2);
        assert_eq!(objects(&catalogue, "http://localhost:5000/", RECORD).len(), 2);
        let record = record_triples(&links(), "a", Some("A vocabulary")).unwrap();
        let r = "http://localhost:5000/records/a";
        assert_eq!(objects(&record, r, TYPE).len(), 2);
        assert_eq!(objects(&record, r, PRIMARY_TOPIC).len(), 1);
        assert_eq!(objects(&record, r, TITLE).len(), 1);
        let untitled = record_triples(&links(), "a", None).unwrap();
        assert!(objects(&untitled, r, TITLE).is_empty());
    }
}
