use std::collections::{BTreeMap, HashMap};

use super::{Object, VocabularyData};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

const CLASS_TYPES: [&str; 2] = [
    "http://www.w3.org/2000/01/rdf-schema#Class",
    "http://www.w3.org/2002/07/owl#Class",
];

const DESCRIPTION_PREDICATES: [&str; 4] = [
    "http://www.w3.org/2000/01/rdf-schema#comment",
    "http://purl.org/dc/terms/description",
    "http://purl.org/dc/elements/1.1/description",
    "http://www.w3.org/2004/02/skos/core#definition",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    Class,
    Property,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub kind: TermKind,
    pub label: Option<String>,
    /// Descriptions and comments, concatenated in source order
    pub documentation: Option<String>,
}

/// The known terms of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    pub key: String,
    pub namespace: String,
    /// Local name → term
    pub terms: BTreeMap<String, Term>,
}

impl Vocabulary {
    /// Groups every triple whose subject lives in the namespace by local name.
    /// A term is a class when typed `rdfs:Class` or `owl:Class`, otherwise a
    /// property.
    pub fn from_data(key: &str, data: &VocabularyData) -> Vocabulary {
        #[derive(Default)]
        struct Builder {
            is_class: bool,
            label: Option<String>,
            descriptions: Vec<String>,
        }

        let mut builders: HashMap<&str, Builder> = HashMap::new();

        for triple in &data.triples {
            let Some(local) = triple
                .subject
                .strip_prefix(data.namespace.as_str())
                .filter(|local| !local.is_empty() && !local.contains(['/', '#']))
            else {
                continue;
            };

            let builder = builders.entry(local).or_default();
            match (triple.predicate.as_str(), &triple.object) {
                (RDF_TYPE, Object::Iri(class)) if CLASS_TYPES.contains(&class.as_str()) => {
                    builder.is_class = true;
                }
                (RDFS_LABEL, Object::Literal(label)) if builder.label.is_none() => {
                    builder.label = Some(label.clone());
                }
                (predicate, Object::Literal(text)) if DESCRIPTION_PREDICATES.contains(&predicate) => {
                    builder.descriptions.push(text.trim().to_string());
                }
                _ => {}
            }
        }

        let terms = builders
            .into_iter()
            .map(|(local, builder)| {
                let term = Term {
                    kind: if builder.is_class {
                        TermKind::Class
                    } else {
                        TermKind::Property
                    },
                    label: builder.label,
                    documentation: (!builder.descriptions.is_empty())
                        .then(|| builder.descriptions.join("\n\n")),
                };
                (local.to_string(), term)
            })
            .collect();

        Vocabulary {
            key: key.to_string(),
            namespace: data.namespace.clone(),
            terms,
        }
    }

    pub fn term(&self, local: &str) -> Option<&Term> {
        self.terms.get(local)
    }

    pub fn contains(&self, local: &str) -> bool {
        self.terms.contains_key(local)
    }

    /// Whether this vocabulary describes the namespace a document bound.
    pub fn serves(&self, namespace: &str) -> bool {
        self.namespace == namespace
    }
}
