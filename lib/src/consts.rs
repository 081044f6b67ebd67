//! Defines constant NamedNodeRefs for the ontology terms the catalogue emits,
//! primarily from MOD, DCAT, DCTERMS, Hydra, SKOS, SKOS-XL, RDFS and OWL, and the
//! prefix map handed to the serializers.

use oxigraph::model::NamedNodeRef;

pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const SKOS: &str = "http://www.w3.org/2004/02/skos/core#";
pub const SKOSXL: &str = "http://www.w3.org/2008/05/skos-xl#";
pub const DCTERMS: &str = "http://purl.org/dc/terms/";
pub const DCAT: &str = "http://www.w3.org/ns/dcat#";
pub const FOAF: &str = "http://xmlns.com/foaf/0.1/";
pub const MOD: &str = "https://w3id.org/mod#";
pub const HYDRA: &str = "http://www.w3.org/ns/hydra/core#";
pub const ISOTHES: &str = "http://purl.org/iso25964/skos-thes#";

/// Prefixes declared on every serialized response, in declaration order.
pub const PREFIXES: [(&str, &str); 12] = [
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("xsd", XSD),
    ("owl", OWL),
    ("skos", SKOS),
    ("skosxl", SKOSXL),
    ("dcterms", DCTERMS),
    ("dcat", DCAT),
    ("foaf", FOAF),
    ("mod", MOD),
    ("hydra", HYDRA),
    ("isothes", ISOTHES),
];

// rdf
pub const TYPE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
pub const PROPERTY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#Property");
// rdfs
pub const CLASS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#Class");
pub const LABEL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#label");
pub const SUB_CLASS_OF: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#subClassOf");
pub const IS_DEFINED_BY: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2000/01/rdf-schema#isDefinedBy");
// owl
pub const NAMED_INDIVIDUAL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#NamedIndividual");
// skos
pub const CONCEPT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#Concept");
pub const CONCEPT_SCHEME: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#ConceptScheme");
pub const COLLECTION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#Collection");
pub const PREF_LABEL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#prefLabel");
pub const MEMBER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#member");
// skos-xl
pub const XL_LABEL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2008/05/skos-xl#Label");
// dcterms
pub const TITLE: NamedNodeRef<'_> = NamedNodeRef::new_unchecked("http://purl.org/dc/terms/title");
pub const IDENTIFIER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/identifier");
pub const ACCESS_RIGHTS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/accessRights");
pub const LANGUAGE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://purl.org/dc/terms/language");
// dcat
pub const CATALOG: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#Catalog");
pub const CATALOG_RECORD: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#CatalogRecord");
pub const DISTRIBUTION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#Distribution");
pub const HAS_DISTRIBUTION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#distribution");
pub const DATASET: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#dataset");
pub const RECORD: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#record");
pub const LANDING_PAGE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#landingPage");
pub const DOWNLOAD_URL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#downloadURL");
pub const ACCESS_URL: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#accessURL");
pub const MEDIA_TYPE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/dcat#mediaType");
// foaf
pub const PRIMARY_TOPIC: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://xmlns.com/foaf/0.1/primaryTopic");
// mod
pub const SEMANTIC_ARTEFACT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("https://w3id.org/mod#SemanticArtefact");
pub const SEMANTIC_ARTEFACT_CATALOG: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("https://w3id.org/mod#SemanticArtefactCatalog");
pub const SEMANTIC_ARTEFACT_CATALOG_RECORD: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("https://w3id.org/mod#SemanticArtefactCatalogRecord");
pub const HAS_SYNTAX: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("https://w3id.org/mod#hasSyntax");
// hydra
pub const HYDRA_COLLECTION: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#Collection");
pub const PARTIAL_COLLECTION_VIEW: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#PartialCollectionView");
pub const HYDRA_MEMBER: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#member");
pub const ITEMS_PER_PAGE: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#itemsPerPage");
pub const TOTAL_ITEMS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#totalItems");
pub const VIEW: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#view");
pub const FIRST: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#first");
pub const LAST: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#last");
pub const NEXT: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#next");
pub const PREVIOUS: NamedNodeRef<'_> =
    NamedNodeRef::new_unchecked("http://www.w3.org/ns/hydra/core#previous");

/// Expands a compact IRI such as `skos:Concept` using [`PREFIXES`]. Absolute IRIs are
/// returned unchanged; unknown prefixes yield `None`.
pub fn expand_curie(curie: &str) -> Option<String> {
    if curie.starts_with("http://") || curie.starts_with("https://") {
        return Some(curie.to_string());
    }
    let (prefix, local) = curie.split_once(':')?;
    PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, ns)| format!("{ns}{local}"))
}
