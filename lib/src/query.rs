//! A small graph-pattern evaluator over per-request in-memory graphs.
//!
//! Only the patterns the catalogue needs are supported: DESCRIBE of the subjects carrying a
//! given `rdf:type` (or of every subject), ordered by [`subject_order`] and cut with an
//! `[offset, offset + limit)` window, COUNT of the same subject sets, and graph union.
//! Ordering depends only on graph content, so identical inputs always page identically.

use crate::consts::TYPE;
use crate::errors::Result;
use log::debug;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{
    Graph, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, TermRef, Triple,
};
use std::collections::BTreeMap;

/// Parses a Turtle document. Malformed input is an upstream data error, never an empty graph.
pub fn parse_turtle(text: &str) -> Result<Graph> {
    let mut graph = Graph::new();
    let parser = RdfParser::from_format(RdfFormat::Turtle).for_reader(text.as_bytes());
    for quad in parser {
        let quad = quad?;
        let triple = Triple::new(quad.subject, quad.predicate, quad.object);
        graph.insert(&triple);
    }
    debug!("Parsed {} triples of turtle", graph.len());
    Ok(graph)
}

/// String form subjects are ordered by: the IRI itself, or `_:id` for blank nodes.
pub fn subject_key(subject: NamedOrBlankNodeRef<'_>) -> String {
    match subject {
        NamedOrBlankNodeRef::NamedNode(node) => node.as_str().to_string(),
        NamedOrBlankNodeRef::BlankNode(node) => format!("_:{}", node.as_str()),
    }
}

/// Sort key of a subject. IRIs order by their string form. Blank-node labels are fresh on
/// every parse, so a blank node orders by its sorted outgoing triples (nested blank objects
/// written as `[]`) and its label only breaks ties between identical descriptions.
pub fn subject_order(graph: &Graph, subject: NamedOrBlankNodeRef<'_>) -> (String, String) {
    match subject {
        NamedOrBlankNodeRef::NamedNode(node) => (node.as_str().to_string(), String::new()),
        NamedOrBlankNodeRef::BlankNode(node) => {
            let mut statements: Vec<String> = graph
                .triples_for_subject(subject)
                .map(|t| match t.object {
                    TermRef::BlankNode(_) => format!("{} []", t.predicate),
                    object => format!("{} {}", t.predicate, object),
                })
                .collect();
            statements.sort();
            (
                format!("_:{}", statements.join(" ; ")),
                node.as_str().to_string(),
            )
        }
    }
}

/// Distinct subjects of `graph`, restricted to instances of `type_filter` when given,
/// sorted by [`subject_order`].
pub fn sorted_subjects(
    graph: &Graph,
    type_filter: Option<NamedNodeRef<'_>>,
) -> Vec<NamedOrBlankNode> {
    let mut subjects: BTreeMap<(String, String), NamedOrBlankNode> = BTreeMap::new();
    let mut add = |subject: NamedOrBlankNodeRef<'_>| {
        subjects
            .entry(subject_order(graph, subject))
            .or_insert_with(|| subject.into_owned());
    };
    match type_filter {
        Some(type_iri) => graph
            .subjects_for_predicate_object(TYPE, type_iri)
            .for_each(&mut add),
        None => graph.iter().for_each(|triple| add(triple.subject)),
    }
    subjects.into_values().collect()
}

/// Copies every triple of `graph` whose subject is one of `subjects`.
pub fn describe<'a>(
    graph: &Graph,
    subjects: impl IntoIterator<Item = &'a NamedOrBlankNode>,
) -> Graph {
    let mut out = Graph::new();
    for subject in subjects {
        for triple in graph.triples_for_subject(subject.as_ref()) {
            out.insert(triple);
        }
    }
    out
}

/// DESCRIBE ?s WHERE { ?s a <type_iri> } ORDER BY STR(?s) LIMIT `limit` OFFSET `offset`
pub fn describe_by_type(
    graph: &Graph,
    type_iri: NamedNodeRef<'_>,
    limit: usize,
    offset: usize,
) -> Graph {
    let subjects = sorted_subjects(graph, Some(type_iri));
    describe(graph, subjects.iter().skip(offset).take(limit))
}

/// DESCRIBE ?s WHERE { ?s ?p ?o } ORDER BY STR(?s) LIMIT `limit` OFFSET `offset`
pub fn describe_all(graph: &Graph, limit: usize, offset: usize) -> Graph {
    let subjects = sorted_subjects(graph, None);
    describe(graph, subjects.iter().skip(offset).take(limit))
}

/// SELECT (COUNT(DISTINCT ?s) AS ?n) WHERE { ?s a <type_iri> }
pub fn count_by_type(graph: &Graph, type_iri: NamedNodeRef<'_>) -> usize {
    sorted_subjects(graph, Some(type_iri)).len()
}

/// SELECT (COUNT(DISTINCT ?s) AS ?n) WHERE { ?s ?p ?o }
pub fn count_subjects(graph: &Graph) -> usize {
    sorted_subjects(graph, None).len()
}

/// Adds every triple of `from` to `into`.
pub fn merge(into: &mut Graph, from: &Graph) {
    for triple in from.iter() {
        into.insert(triple);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{CONCEPT, PREF_LABEL, PROPERTY};
    use oxigraph::model::{BlankNode, Literal, NamedNode, TripleRef};
    use std::collections::BTreeSet;

    const DUMP: &str = r#"
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
<http://ex.org/c3> a skos:Concept ; skos:prefLabel "three"@en .
<http://ex.org/c1> a skos:Concept ; skos:prefLabel "one"@en .
<http://ex.org/c2> a skos:Concept ; skos:prefLabel "two"@en ; skos:broader <http://ex.org/c1> .
<http://ex.org/p1> a rdf:Property .
<http://ex.org/s> a skos:ConceptScheme .
"#;

    fn iris(graph: &Graph) -> BTreeSet<String> {
        graph.iter().map(|t| subject_key(t.subject)).collect()
    }

    #[test]
    fn test_parse_turtle() {
        let graph = parse_turtle(DUMP).unwrap();
        assert_eq!(graph.len(), 9);
    }

    #[test]
    fn test_parse_malformed_turtle_fails() {
        let err = parse_turtle("<http://ex.org/a> <http://ex.org/b> .").unwrap_err();
        assert!(matches!(err, crate::errors::CatalogueError::UpstreamData(_)));
    }

    #[test]
    fn test_describe_by_type_orders_and_windows() {
        let graph = parse_turtle(DUMP).unwrap();
        let first = describe_by_type(&graph, CONCEPT, 2, 0);
        assert_eq!(
            iris(&first),
            BTreeSet::from(["http://ex.org/c1".to_string(), "http://ex.org/c2".to_string()])
        );
        // every triple of a described subject comes along
        assert_eq!(first.len(), 5);
        let second = describe_by_type(&graph, CONCEPT, 2, 2);
        assert_eq!(iris(&second), BTreeSet::from(["http://ex.org/c3".to_string()]));
        assert!(describe_by_type(&graph, CONCEPT, 2, 4).is_empty());
    }

    #[test]
    fn test_windows_partition_typed_subjects() {
        let mut graph = Graph::new();
        for i in 0..17 {
            let s = NamedNode::new(format!("http://ex.org/item/{i}")).unwrap();
            graph.insert(TripleRef::new(&s, TYPE, CONCEPT));
            let label = Literal::new_language_tagged_literal_unchecked(format!("item {i}"), "en");
            graph.insert(TripleRef::new(&s, PREF_LABEL, &label));
        }
        let total = count_by_type(&graph, CONCEPT);
        assert_eq!(total, 17);
        for limit in 1..=18 {
            let mut seen: Vec<String> = Vec::new();
            let mut offset = 0;
            while offset < total {
                let page = describe_by_type(&graph, CONCEPT, limit, offset);
                let page_subjects = iris(&page);
                for s in &page_subjects {
                    assert!(!seen.contains(s), "{s} appeared twice with limit {limit}");
                }
                seen.extend(page_subjects);
                offset += limit;
            }
            let expected: Vec<String> = sorted_subjects(&graph, Some(CONCEPT))
                .iter()
                .map(|s| subject_key(s.as_ref()))
                .collect();
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn test_empty_match() {
        let graph = parse_turtle(DUMP).unwrap();
        let missing = NamedNodeRef::new_unchecked("http://ex.org/Nothing");
        assert!(describe_by_type(&graph, missing, 10, 0).is_empty());
        assert_eq!(count_by_type(&graph, missing), 0);
        assert_eq!(count_subjects(&Graph::new()), 0);
    }

    #[test]
    fn test_counts() {
        let graph = parse_turtle(DUMP).unwrap();
        assert_eq!(count_by_type(&graph, CONCEPT), 3);
        assert_eq!(count_by_type(&graph, PROPERTY), 1);
        assert_eq!(count_subjects(&graph), 5);
    }

    #[test]
    fn test_describe_all_includes_blank_nodes() {
        let mut graph = parse_turtle(DUMP).unwrap();
        let b = BlankNode::new_unchecked("zz");
        graph.insert(TripleRef::new(&b, PREF_LABEL, &Literal::new_simple_literal("anon")));
        let all = describe_all(&graph, 100, 0);
        assert_eq!(all.len(), graph.len());
        // `_:` sorts before `http`
        let first = describe_all(&graph, 1, 0);
        assert_eq!(iris(&first), BTreeSet::from(["_:zz".to_string()]));
    }

    #[test]
    fn test_anonymous_subjects_page_the_same_on_every_parse() {
        let dump = r#"
@prefix ex: <http://ex.org/> .
[] ex:p "3" .
[] ex:p "1" .
[] ex:p "4" ; ex:q [ ex:p "nested" ] .
[] ex:p "2" .
"#;
        let p = NamedNodeRef::new_unchecked("http://ex.org/p");
        let values = |page: &Graph| -> BTreeSet<String> {
            page.triples_for_predicate(p)
                .map(|t| t.object.to_string())
                .collect()
        };
        let reference = parse_turtle(dump).unwrap();
        let first = values(&describe_all(&reference, 2, 0));
        let second = values(&describe_all(&reference, 2, 2));
        let third = values(&describe_all(&reference, 2, 4));
        assert_eq!(first.len() + second.len() + third.len(), 5);
        assert!(first.is_disjoint(&second) && second.is_disjoint(&third));
        for _ in 0..20 {
            let graph = parse_turtle(dump).unwrap();
            assert_eq!(values(&describe_all(&graph, 2, 0)), first);
            assert_eq!(values(&describe_all(&graph, 2, 2)), second);
            assert_eq!(values(&describe_all(&graph, 2, 4)), third);
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let graph = parse_turtle(DUMP).unwrap();
        let mut merged = Graph::new();
        merge(&mut merged, &graph);
        merge(&mut merged, &graph);
        assert_eq!(merged.len(), graph.len());
    }
}
