//! The single-operation primitive: construction, classification,
//! measurement, and splitting.

use core::fmt::{self, Debug, Display};
use std::collections::BTreeMap;

use serde::{
    Deserialize, Serialize,
    de::{self, Deserializer},
    ser::{SerializeMap, Serializer},
};
use serde_json::Value;

use crate::{
    attributes::{self, Attributes},
    grapheme,
};

/// The action tag of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Insert,
    Retain,
    Delete,
}

/// The kind of value an operation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
    Embed,
}

/// Non-text content embedded in a document: a single-key map whose key
/// names the embed type and whose value is opaque to the algebra. Embeds
/// are always unit length regardless of their internal content.
#[derive(Clone, PartialEq)]
pub struct Embed {
    embed_type: String,
    value: Value,
}

impl Embed {
    pub fn new(embed_type: impl Into<String>, value: Value) -> Self {
        Self {
            embed_type: embed_type.into(),
            value,
        }
    }

    pub fn embed_type(&self) -> &str {
        &self.embed_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Debug for Embed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: {}}}", self.embed_type, self.value)
    }
}

impl Serialize for Embed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.embed_type, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Embed {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut entries = BTreeMap::<String, Value>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(de::Error::custom(format!(
                "an embed must be a single-key map, found {} keys",
                entries.len()
            )));
        }
        let (embed_type, value) = entries.pop_first().ok_or_else(|| {
            de::Error::custom("an embed must be a single-key map, found none")
        })?;
        Ok(Embed { embed_type, value })
    }
}

/// The value of an insert: either text or an embed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertValue {
    Text(String),
    Embed(Embed),
}

impl From<&str> for InsertValue {
    fn from(text: &str) -> Self {
        InsertValue::Text(text.to_owned())
    }
}

impl From<String> for InsertValue {
    fn from(text: String) -> Self {
        InsertValue::Text(text)
    }
}

impl From<Embed> for InsertValue {
    fn from(embed: Embed) -> Self {
        InsertValue::Embed(embed)
    }
}

/// The value of a retain: either a length or an embed to descend into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RetainValue {
    Length(usize),
    Embed(Embed),
}

impl From<usize> for RetainValue {
    fn from(length: usize) -> Self {
        RetainValue::Length(length)
    }
}

impl From<Embed> for RetainValue {
    fn from(embed: Embed) -> Self {
        RetainValue::Embed(embed)
    }
}

/// A single operation: insert, retain, or delete, with optional
/// formatting attributes. Constructors drop empty attribute maps, so an
/// operation's attributes are either absent or non-empty.
#[derive(Clone, PartialEq)]
pub enum Op {
    Insert {
        value: InsertValue,
        attributes: Option<Attributes>,
    },
    Retain {
        value: RetainValue,
        attributes: Option<Attributes>,
    },
    Delete {
        length: usize,
        attributes: Option<Attributes>,
    },
}

impl Op {
    pub fn insert(value: impl Into<InsertValue>, attributes: Option<Attributes>) -> Self {
        Op::Insert {
            value: value.into(),
            attributes: attributes::normalize(attributes),
        }
    }

    pub fn retain(length: usize, attributes: Option<Attributes>) -> Self {
        Op::Retain {
            value: RetainValue::Length(length),
            attributes: attributes::normalize(attributes),
        }
    }

    pub fn retain_embed(embed: Embed, attributes: Option<Attributes>) -> Self {
        Op::Retain {
            value: RetainValue::Embed(embed),
            attributes: attributes::normalize(attributes),
        }
    }

    pub fn delete(length: usize) -> Self {
        Op::Delete {
            length,
            attributes: None,
        }
    }

    pub fn delete_with_attributes(length: usize, attributes: Option<Attributes>) -> Self {
        Op::Delete {
            length,
            attributes: attributes::normalize(attributes),
        }
    }

    /// The operation's extent in the document: grapheme count for text
    /// inserts, the integer for retains and deletes, and 1 for embeds.
    pub fn len(&self) -> usize {
        match self {
            Op::Insert {
                value: InsertValue::Text(text),
                ..
            } => grapheme::count(text),
            Op::Insert {
                value: InsertValue::Embed(_),
                ..
            } => 1,
            Op::Retain {
                value: RetainValue::Length(length),
                ..
            } => *length,
            Op::Retain {
                value: RetainValue::Embed(_),
                ..
            } => 1,
            Op::Delete { length, .. } => *length,
        }
    }

    /// True for the zero-length operations the canonicalizer discards.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn action(&self) -> Action {
        match self {
            Op::Insert { .. } => Action::Insert,
            Op::Retain { .. } => Action::Retain,
            Op::Delete { .. } => Action::Delete,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Op::Insert {
                value: InsertValue::Text(_),
                ..
            } => ValueKind::Text,
            Op::Insert {
                value: InsertValue::Embed(_),
                ..
            }
            | Op::Retain {
                value: RetainValue::Embed(_),
                ..
            } => ValueKind::Embed,
            Op::Retain {
                value: RetainValue::Length(_),
                ..
            }
            | Op::Delete { .. } => ValueKind::Integer,
        }
    }

    /// Classify against an action and, optionally, a value kind.
    pub fn is(&self, action: Action, kind: Option<ValueKind>) -> bool {
        self.action() == action && kind.is_none_or(|kind| self.kind() == kind)
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Op::Insert { .. })
    }

    pub fn is_retain(&self) -> bool {
        matches!(self, Op::Retain { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Op::Delete { .. })
    }

    pub fn has_attributes(&self) -> bool {
        self.attributes().is_some()
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            Op::Insert { attributes, .. }
            | Op::Retain { attributes, .. }
            | Op::Delete { attributes, .. } => attributes.as_ref(),
        }
    }

    /// Trim `n` length units off the front, returning the trimmed head
    /// and the remainder. Text inserts split at a grapheme boundary;
    /// integer retains and deletes split arithmetically; embeds are
    /// indivisible, so the whole operation comes back with no remainder.
    /// Attributes are duplicated onto both halves.
    ///
    /// # Panics
    ///
    /// Panics when `n` exceeds the operation's length; callers are
    /// expected to clamp to `self.len()` first.
    pub fn take(&self, n: usize) -> (Op, Option<Op>) {
        let len = self.len();
        assert!(
            n <= len,
            "cannot take {n} units from an operation of length {len}"
        );

        if n == 0 {
            return (self.empty_of_same_action(), Some(self.clone()));
        }
        if n == len {
            return (self.clone(), None);
        }

        match self {
            Op::Insert {
                value: InsertValue::Text(text),
                attributes,
            } => {
                let (left, rest) = grapheme::split_at(text, n);
                (
                    Op::Insert {
                        value: InsertValue::Text(left.to_owned()),
                        attributes: attributes.clone(),
                    },
                    Some(Op::Insert {
                        value: InsertValue::Text(rest.to_owned()),
                        attributes: attributes.clone(),
                    }),
                )
            }
            Op::Retain {
                value: RetainValue::Length(length),
                attributes,
            } => (
                Op::Retain {
                    value: RetainValue::Length(n),
                    attributes: attributes.clone(),
                },
                Some(Op::Retain {
                    value: RetainValue::Length(length - n),
                    attributes: attributes.clone(),
                }),
            ),
            Op::Delete { length, attributes } => (
                Op::Delete {
                    length: n,
                    attributes: attributes.clone(),
                },
                Some(Op::Delete {
                    length: length - n,
                    attributes: attributes.clone(),
                }),
            ),
            // Embeds are unit length, so 0 < n < len cannot be reached.
            Op::Insert {
                value: InsertValue::Embed(_),
                ..
            }
            | Op::Retain {
                value: RetainValue::Embed(_),
                ..
            } => unreachable!("embeds are indivisible"),
        }
    }

    /// Like [`take`](Op::take), but a text insert is trimmed to the
    /// smallest prefix of at least `n` graphemes, extending past a
    /// boundary that would tear a cluster rather than stopping short.
    pub fn take_max(&self, n: usize) -> (Op, Option<Op>) {
        match self {
            Op::Insert {
                value: InsertValue::Text(text),
                attributes,
            } => {
                let left = grapheme::take_at_least(text, n);
                if left.len() == text.len() {
                    return (self.clone(), None);
                }
                let rest = &text[left.len()..];
                (
                    Op::Insert {
                        value: InsertValue::Text(left.to_owned()),
                        attributes: attributes.clone(),
                    },
                    Some(Op::Insert {
                        value: InsertValue::Text(rest.to_owned()),
                        attributes: attributes.clone(),
                    }),
                )
            }
            _ => self.take(n.min(self.len())),
        }
    }

    /// Transform a cursor through this operation during an op-by-op walk
    /// at `offset`. Inserts at the walking offset shift the cursor when
    /// it sits strictly past the offset or when the cursor side yields
    /// priority; deletes pull the cursor back without advancing the walk.
    pub fn transform_position(
        &self,
        offset: usize,
        index: usize,
        priority: bool,
    ) -> (usize, usize) {
        let len = self.len();
        match self {
            Op::Delete { .. } => (offset, index - len.min(index - offset)),
            Op::Insert { .. } if offset < index || !priority => (offset + len, index + len),
            Op::Insert { .. } => (offset + len, index),
            Op::Retain { .. } => (offset + len, index),
        }
    }

    fn empty_of_same_action(&self) -> Op {
        match self {
            Op::Insert { attributes, .. } => Op::Insert {
                value: InsertValue::Text(String::new()),
                attributes: attributes.clone(),
            },
            Op::Retain { attributes, .. } => Op::Retain {
                value: RetainValue::Length(0),
                attributes: attributes.clone(),
            },
            Op::Delete { attributes, .. } => Op::Delete {
                length: 0,
                attributes: attributes.clone(),
            },
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Insert { value, .. } => match value {
                InsertValue::Text(text) => {
                    write!(f, "insert('{}')", text.replace('\n', "\\n"))?;
                }
                InsertValue::Embed(embed) => write!(f, "insert({embed:?})")?,
            },
            Op::Retain { value, .. } => match value {
                RetainValue::Length(length) => write!(f, "retain({length})")?,
                RetainValue::Embed(embed) => write!(f, "retain({embed:?})")?,
            },
            Op::Delete { length, .. } => write!(f, "delete({length})")?,
        }
        if let Some(attributes) = self.attributes() {
            let formatted = attributes
                .iter()
                .map(|(key, value)| format!("{key}: {value}"))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " {{{formatted}}}")?;
        }
        Ok(())
    }
}

impl Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl Serialize for Op {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let entries = 1 + usize::from(self.has_attributes());
        let mut map = serializer.serialize_map(Some(entries))?;
        match self {
            Op::Insert { value, .. } => map.serialize_entry("insert", value)?,
            Op::Retain { value, .. } => map.serialize_entry("retain", value)?,
            Op::Delete { length, .. } => map.serialize_entry("delete", length)?,
        }
        if let Some(attributes) = self.attributes() {
            map.serialize_entry("attributes", attributes)?;
        }
        map.end()
    }
}

/// Wire shape of an operation: exactly one discriminant key plus an
/// optional attribute map, matching the Quill Delta format.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOp {
    insert: Option<InsertValue>,
    retain: Option<RetainValue>,
    delete: Option<usize>,
    attributes: Option<Attributes>,
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawOp::deserialize(deserializer)?;
        let discriminants = usize::from(raw.insert.is_some())
            + usize::from(raw.retain.is_some())
            + usize::from(raw.delete.is_some());
        if discriminants != 1 {
            return Err(de::Error::custom(format!(
                "an operation must carry exactly one of `insert`, `retain`, `delete`, \
                 found {discriminants}"
            )));
        }

        let attributes = attributes::normalize(raw.attributes);
        if let Some(value) = raw.insert {
            Ok(Op::Insert { value, attributes })
        } else if let Some(value) = raw.retain {
            Ok(Op::Retain { value, attributes })
        } else {
            Ok(Op::Delete {
                length: raw.delete.unwrap_or_default(),
                attributes,
            })
        }
    }
}
