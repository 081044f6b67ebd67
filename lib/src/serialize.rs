//! Writes response graphs in the negotiated serialization.

use crate::errors::{CatalogueError, Result};
use crate::formats::OutputFormat;
use crate::query::subject_key;
use log::debug;
use oxigraph::io::RdfSerializer;
use oxigraph::model::{Graph, TripleRef};

/// Serializes `graph` as `format`, declaring each `(prefix, namespace)` of `prefixes`.
/// Triples are written grouped by subject in subject order so output is reproducible.
pub fn serialize_graph(
    graph: &Graph,
    format: OutputFormat,
    prefixes: &[(&str, &str)],
) -> Result<Vec<u8>> {
    let mut serializer = RdfSerializer::from_format(format.rdf_format());
    for (prefix, namespace) in prefixes {
        serializer = serializer
            .with_prefix(*prefix, *namespace)
            .map_err(|e| CatalogueError::Serialization(format!("prefix {prefix}: {e}")))?;
    }

    let mut triples: Vec<TripleRef<'_>> = graph.iter().collect();
    triples.sort_by_cached_key(|t| {
        (
            subject_key(t.subject),
            t.predicate.as_str().to_string(),
            t.object.to_string(),
        )
    });

    let mut writer = serializer.for_writer(Vec::new());
    for triple in triples {
        writer
            .serialize_triple(triple)
            .map_err(|e| CatalogueError::Serialization(e.to_string()))?;
    }
    let bytes = writer
        .finish()
        .map_err(|e| CatalogueError::Serialization(e.to_string()))?;
    debug!(
        "Serialized {} triples as {} ({} bytes)",
        graph.len(),
        format.param(),
        bytes.len()
    );
    Ok(bytes)
}
