use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Namespaces every document may use without declaring them.
pub const WELL_KNOWN_NAMESPACES: [(&str, &str); 11] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("dcterms", "http://purl.org/dc/terms/"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("schema", "http://schema.org/"),
    ("sh", "http://www.w3.org/ns/shacl#"),
    ("prov", "http://www.w3.org/ns/prov#"),
];

/// Prefix label → namespace IRI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamespaceMap(BTreeMap<String, String>);

impl NamespaceMap {
    pub fn with_defaults() -> NamespaceMap {
        NamespaceMap(
            WELL_KNOWN_NAMESPACES
                .iter()
                .map(|(prefix, iri)| (prefix.to_string(), iri.to_string()))
                .collect(),
        )
    }

    pub fn is_well_known(prefix: &str) -> bool {
        WELL_KNOWN_NAMESPACES.iter().any(|(known, _)| *known == prefix)
    }

    pub fn well_known_iri(prefix: &str) -> Option<&'static str> {
        WELL_KNOWN_NAMESPACES
            .iter()
            .find(|(known, _)| *known == prefix)
            .map(|(_, iri)| *iri)
    }

    pub fn insert(&mut self, prefix: &str, iri: &str) {
        self.0.insert(prefix.to_string(), iri.to_string());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.0.get(prefix).map(String::as_str)
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.0.contains_key(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `prefix:local` → full IRI.
    pub fn expand(&self, prefixed_name: &str) -> Option<String> {
        let (prefix, local) = prefixed_name.split_once(':')?;
        self.get(prefix).map(|ns| format!("{ns}{local}"))
    }

    /// Full IRI → `prefix:local`, using the longest matching namespace.
    /// Returns `None` when the remainder is not a valid local name.
    pub fn abbreviate(&self, iri: &str) -> Option<String> {
        static LOCAL_NAME: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[\p{L}\p{N}_][\p{L}\p{N}_\-.]*$").unwrap());

        self.0
            .iter()
            .filter(|(_, ns)| !ns.is_empty() && iri.starts_with(ns.as_str()))
            .filter(|(_, ns)| {
                let local = &iri[ns.len()..];
                LOCAL_NAME.is_match(local) && !local.ends_with('.')
            })
            .max_by_key(|(prefix, ns)| (ns.len(), std::cmp::Reverse(prefix.as_str())))
            .map(|(prefix, ns)| format!("{}:{}", prefix, &iri[ns.len()..]))
    }
}
