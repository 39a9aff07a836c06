//! Fetch predicates and sort descriptors evaluated against [`Record`]s.
//!
//! A [`Predicate`] is a recursive filter tree over record attributes. Before
//! it is applied to many records it is compiled into a [`Matcher`], which
//! builds every `Like`/`Regex` pattern once.

use std::cmp::Ordering;
use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{Record, Value};

/// A recursive filter over record attributes.
///
/// Attributes resolve through [`Record::attribute`], so `$key` and `$version`
/// address the primary key and version. A missing attribute never matches a
/// comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Predicate {
    /// Matches every record.
    #[default]
    All,
    Eq { attribute: String, value: Value },
    Neq { attribute: String, value: Value },
    Gt { attribute: String, value: Value },
    Gte { attribute: String, value: Value },
    Lt { attribute: String, value: Value },
    Lte { attribute: String, value: Value },
    /// Attribute equals any of `values`.
    In { attribute: String, values: Vec<Value> },
    /// Wildcard match: `*` matches any run of characters, `?` exactly one.
    Like { attribute: String, pattern: String },
    Regex { attribute: String, pattern: String },
    And { children: Vec<Predicate> },
    Or { children: Vec<Predicate> },
    Not { child: Box<Predicate> },
}

impl Predicate {
    #[must_use]
    pub fn eq(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn gte(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Gte {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn lt(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Lt {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Matches records whose primary key is one of `keys`.
    #[must_use]
    pub fn key_in<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::In {
            attribute: Record::KEY_ATTRIBUTE.to_string(),
            values: keys.into_iter().map(|k| Value::String(k.into())).collect(),
        }
    }

    #[must_use]
    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::And { children }
    }

    #[must_use]
    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Or { children }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Predicate::Not {
            child: Box::new(child),
        }
    }

    /// Compiles the tree into a reusable [`Matcher`].
    ///
    /// # Errors
    ///
    /// Returns an error if a `Like` or `Regex` pattern is not a valid expression.
    pub fn matcher(&self) -> Result<Matcher, regex::Error> {
        Ok(Matcher {
            root: Node::compile(self)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Cmp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug)]
enum Node {
    All,
    Compare(Cmp, String, Value),
    In(String, Vec<Value>),
    /// `In` over string values only, hashed.
    InStrings(String, HashSet<String>),
    Pattern(String, Regex),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
}

impl Node {
    fn compile(predicate: &Predicate) -> Result<Self, regex::Error> {
        let node = match predicate {
            Predicate::All => Node::All,
            Predicate::Eq { attribute, value } => {
                Node::Compare(Cmp::Eq, attribute.clone(), value.clone())
            }
            Predicate::Neq { attribute, value } => {
                Node::Compare(Cmp::Neq, attribute.clone(), value.clone())
            }
            Predicate::Gt { attribute, value } => {
                Node::Compare(Cmp::Gt, attribute.clone(), value.clone())
            }
            Predicate::Gte { attribute, value } => {
                Node::Compare(Cmp::Gte, attribute.clone(), value.clone())
            }
            Predicate::Lt { attribute, value } => {
                Node::Compare(Cmp::Lt, attribute.clone(), value.clone())
            }
            Predicate::Lte { attribute, value } => {
                Node::Compare(Cmp::Lte, attribute.clone(), value.clone())
            }
            Predicate::In { attribute, values } => {
                let strings: Option<HashSet<String>> = values
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect();
                match strings {
                    Some(set) => Node::InStrings(attribute.clone(), set),
                    None => Node::In(attribute.clone(), values.clone()),
                }
            }
            Predicate::Like { attribute, pattern } => {
                Node::Pattern(attribute.clone(), Regex::new(&like_to_regex(pattern))?)
            }
            Predicate::Regex { attribute, pattern } => {
                Node::Pattern(attribute.clone(), Regex::new(pattern)?)
            }
            Predicate::And { children } => {
                Node::And(children.iter().map(Node::compile).collect::<Result<_, _>>()?)
            }
            Predicate::Or { children } => {
                Node::Or(children.iter().map(Node::compile).collect::<Result<_, _>>()?)
            }
            Predicate::Not { child } => Node::Not(Box::new(Node::compile(child)?)),
        };
        Ok(node)
    }

    fn matches(&self, record: &Record) -> bool {
        match self {
            Node::All => true,
            Node::Compare(cmp, attribute, expected) => {
                let Some(actual) = record.attribute(attribute) else {
                    return false;
                };
                let ord = actual.compare(expected);
                match cmp {
                    Cmp::Eq => ord == Ordering::Equal,
                    Cmp::Neq => ord != Ordering::Equal,
                    Cmp::Gt => ord == Ordering::Greater,
                    Cmp::Gte => ord != Ordering::Less,
                    Cmp::Lt => ord == Ordering::Less,
                    Cmp::Lte => ord != Ordering::Greater,
                }
            }
            Node::In(attribute, values) => record
                .attribute(attribute)
                .is_some_and(|actual| {
                    values.iter().any(|v| actual.compare(v) == Ordering::Equal)
                }),
            Node::InStrings(attribute, set) => record
                .attribute(attribute)
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| set.contains(s)),
            Node::Pattern(attribute, regex) => record
                .attribute(attribute)
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Node::And(children) => children.iter().all(|c| c.matches(record)),
            Node::Or(children) => children.iter().any(|c| c.matches(record)),
            Node::Not(child) => !child.matches(record),
        }
    }
}

/// Translates a `*`/`?` wildcard pattern into an anchored regular expression.
fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// A compiled [`Predicate`], ready to test many records.
#[derive(Debug)]
pub struct Matcher {
    root: Node,
}

impl Matcher {
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.root.matches(record)
    }
}

// ---------------------------------------------------------------------------
// SortDescriptor
// ---------------------------------------------------------------------------

/// One sort key of a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    pub attribute: String,
    pub ascending: bool,
}

impl SortDescriptor {
    #[must_use]
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: true,
        }
    }

    #[must_use]
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: false,
        }
    }
}

/// Sorts records by `descriptors`, breaking ties by primary key so that the
/// order is deterministic. Missing attributes sort as `Null`.
pub fn sort_records(records: &mut [Record], descriptors: &[SortDescriptor]) {
    records.sort_by(|a, b| {
        for descriptor in descriptors {
            let left = a.attribute(&descriptor.attribute).unwrap_or(Value::Null);
            let right = b.attribute(&descriptor.attribute).unwrap_or(Value::Null);
            let ord = left.compare(&right);
            let ord = if descriptor.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.key.cmp(&b.key)
    });
}
