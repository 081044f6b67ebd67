//! The serializations the catalogue can answer with, and the fixed, order-significant list
//! of upstream formats exposed as distributions.

use oxigraph::io::{JsonLdProfileSet, RdfFormat};
use oxigraph::model::NamedNodeRef;

/// Serialization of a catalogue response, selected with the `format` query parameter.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    JsonLd,
    Turtle,
    RdfXml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [
        OutputFormat::JsonLd,
        OutputFormat::Turtle,
        OutputFormat::RdfXml,
    ];

    /// Parses the value of the `format` query parameter.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "jsonld" => Some(OutputFormat::JsonLd),
            "ttl" => Some(OutputFormat::Turtle),
            "rdfxml" => Some(OutputFormat::RdfXml),
            _ => None,
        }
    }

    pub fn param(self) -> &'static str {
        match self {
            OutputFormat::JsonLd => "jsonld",
            OutputFormat::Turtle => "ttl",
            OutputFormat::RdfXml => "rdfxml",
        }
    }

    /// `Content-Type` of responses in this format.
    pub fn content_type(self) -> &'static str {
        match self {
            OutputFormat::JsonLd => "application/json",
            OutputFormat::Turtle => "text/turtle",
            OutputFormat::RdfXml => "application/rdf+xml",
        }
    }

    /// Media type requested from the upstream when passing data through.
    pub fn upstream_media_type(self) -> &'static str {
        match self {
            OutputFormat::JsonLd => "application/ld+json",
            OutputFormat::Turtle => "text/turtle",
            OutputFormat::RdfXml => "application/rdf+xml",
        }
    }

    pub fn rdf_format(self) -> RdfFormat {
        match self {
            OutputFormat::JsonLd => RdfFormat::JsonLd {
                profile: JsonLdProfileSet::default(),
            },
            OutputFormat::Turtle => RdfFormat::Turtle,
            OutputFormat::RdfXml => RdfFormat::RdfXml,
        }
    }
}

/// One entry of the distribution catalogue.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DistributionFormat {
    pub media_type: &'static str,
    pub syntax: NamedNodeRef<'static>,
}

/// Upstream formats in their public order: distribution `n` is entry `n - 1`.
pub static DISTRIBUTION_FORMATS: [DistributionFormat; 4] = [
    DistributionFormat {
        media_type: "text/turtle",
        syntax: NamedNodeRef::new_unchecked("http://www.w3.org/ns/formats/Turtle"),
    },
    DistributionFormat {
        media_type: "application/rdf+xml",
        syntax: NamedNodeRef::new_unchecked("http://www.w3.org/ns/formats/RDF_XML"),
    },
    DistributionFormat {
        media_type: "application/marcxml+xml",
        syntax: NamedNodeRef::new_unchecked("http://www.loc.gov/standards/marcxml/"),
    },
    DistributionFormat {
        media_type: "application/ld+json",
        syntax: NamedNodeRef::new_unchecked("http://www.w3.org/ns/formats/JSON-LD"),
    },
];

/// Looks up a distribution by its 1-based index.
pub fn distribution_format(index: usize) -> Option<&'static DistributionFormat> {
    index
        .checked_sub(1)
        .and_then(|i| DISTRIBUTION_FORMATS.get(i))
}
