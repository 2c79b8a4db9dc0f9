//! Declarative field extraction over a parsed listing row or detail page.
//!
//! A [`FieldSpec`] lists the ways a field may be found in a document. The
//! first [`Query`] that yields a value wins; misses fall back to the field's
//! default and are never an error.

use crate::record::{join_tokens, Field, GameRecord};
use lazy_regex::regex;
use scraper::{ElementRef, Selector};

const E: &str = "Invalid selector";

/// Where the value of a matched element comes from.
#[derive(Debug, Clone, Copy)]
pub enum Source {
    Text,
    /// Only the element's direct text children, skipping nested badges.
    OwnText,
    Attr(&'static str),
}

#[derive(Debug)]
pub struct Query {
    selector: Selector,
    source: Source,
}

impl Query {
    /// Panics on an invalid selector; field tables are built from literals.
    pub fn new(selector: &str, source: Source) -> Query {
        Query {
            selector: Selector::parse(selector).expect(E),
            source,
        }
    }

    pub fn text(selector: &str) -> Query {
        Query::new(selector, Source::Text)
    }

    pub fn own_text(selector: &str) -> Query {
        Query::new(selector, Source::OwnText)
    }

    pub fn attr(selector: &str, attr: &'static str) -> Query {
        Query::new(selector, Source::Attr(attr))
    }

    fn values(&self, fragment: ElementRef) -> Vec<String> {
        fragment
            .select(&self.selector)
            .filter_map(|el| match self.source {
                Source::Text => Some(el.text().collect::<String>()),
                Source::OwnText => Some(
                    el.children()
                        .filter_map(|child| child.value().as_text().map(|t| &**t))
                        .collect::<String>(),
                ),
                Source::Attr(name) => el.value().attr(name).map(ToString::to_string),
            })
            .map(|v| regex!(r"\s+").replace_all(&v, " ").trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    List,
}

#[derive(Debug, Clone, Copy)]
pub enum Normalize {
    Trim,
    StripSuffix(&'static str),
    /// Keeps only labels from the list, compared ignoring case, spaces and hyphens.
    AllowList(&'static [&'static str]),
}

impl Normalize {
    pub fn apply(&self, value: &str) -> String {
        let value = value.trim();
        match self {
            Normalize::Trim => value.to_string(),
            Normalize::StripSuffix(suffix) => value
                .strip_suffix(*suffix)
                .unwrap_or(value)
                .trim()
                .to_string(),
            Normalize::AllowList(labels) => {
                let key = compact(value);
                labels
                    .iter()
                    .find(|label| compact(label) == key)
                    .map(|label| label.to_string())
                    .unwrap_or_default()
            }
        }
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug)]
pub struct FieldSpec {
    pub field: Field,
    pub queries: Vec<Query>,
    pub shape: Shape,
    pub normalize: Normalize,
    pub default: &'static str,
}

impl FieldSpec {
    pub fn scalar(field: Field, queries: Vec<Query>) -> FieldSpec {
        FieldSpec {
            field,
            queries,
            shape: Shape::Scalar,
            normalize: Normalize::Trim,
            default: "",
        }
    }

    pub fn list(field: Field, queries: Vec<Query>) -> FieldSpec {
        FieldSpec {
            shape: Shape::List,
            ..FieldSpec::scalar(field, queries)
        }
    }

    pub fn normalize(self, normalize: Normalize) -> FieldSpec {
        FieldSpec { normalize, ..self }
    }

    pub fn or_default(self, default: &'static str) -> FieldSpec {
        FieldSpec { default, ..self }
    }
}

pub fn extract(fragment: ElementRef, spec: &FieldSpec) -> String {
    for query in &spec.queries {
        let values = query.values(fragment);
        let value = match spec.shape {
            Shape::Scalar => values
                .first()
                .map(|v| spec.normalize.apply(v))
                .unwrap_or_default(),
            Shape::List => {
                let normalized = values
                    .iter()
                    .map(|v| spec.normalize.apply(v))
                    .collect::<Vec<_>>();
                join_tokens(normalized.iter().map(String::as_str))
            }
        };
        if !value.is_empty() {
            return value;
        }
    }
    spec.default.to_string()
}

/// Runs every spec of a table against `fragment`.
pub fn extract_record(fragment: ElementRef, specs: &[FieldSpec]) -> GameRecord {
    let mut record = GameRecord::default();
    for spec in specs {
        record.set(spec.field, extract(fragment, spec));
    }
    record
}
