//! The sequence engine: canonical operation sequences and the pairwise
//! stepper that composition and transformation run on.
//!
//! A [`Delta`] represents either a document (inserts only) or a change
//! (any mix of inserts, retains, and deletes). Sequences are kept
//! canonical incrementally by [`Delta::push`]: zero-length operations are
//! discarded, mergeable neighbours are merged, and an insert landing
//! after a delete is placed before it so that inserts precede deletes at
//! the same anchor.

use core::fmt::{self, Debug};

use log::trace;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    DeltaError, Result, attributes, embed,
    operation::{InsertValue, Op, RetainValue},
};

/// An ordered sequence of operations over a rich-text document.
///
/// All algebra methods are pure: they borrow their inputs and return
/// fresh sequences.
#[derive(Clone, Default, PartialEq)]
pub struct Delta {
    ops: Vec<Op>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a canonical sequence from arbitrary operations.
    pub fn from_ops(ops: impl IntoIterator<Item = Op>) -> Self {
        let mut delta = Self::default();
        for op in ops {
            delta.push(op);
        }
        delta
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Total extent of the sequence, in length units.
    pub fn length(&self) -> usize {
        self.ops.iter().map(Op::len).sum()
    }

    //
    // Builder operations, all funnelled through the canonicalizing push.
    //

    #[must_use]
    pub fn insert(
        mut self,
        value: impl Into<InsertValue>,
        attributes: Option<attributes::Attributes>,
    ) -> Self {
        self.push(Op::insert(value, attributes));
        self
    }

    #[must_use]
    pub fn retain(mut self, length: usize, attributes: Option<attributes::Attributes>) -> Self {
        self.push(Op::retain(length, attributes));
        self
    }

    #[must_use]
    pub fn retain_embed(
        mut self,
        embed: crate::Embed,
        attributes: Option<attributes::Attributes>,
    ) -> Self {
        self.push(Op::retain_embed(embed, attributes));
        self
    }

    #[must_use]
    pub fn delete(mut self, length: usize) -> Self {
        self.push(Op::delete(length));
        self
    }

    /// Append an operation, maintaining canonical form: zero-length
    /// operations are dropped, an insert arriving after a delete is
    /// placed before it, and the operation is merged into the resulting
    /// neighbour when both carry the same action and equal attributes.
    pub fn push(&mut self, op: Op) -> &mut Self {
        if op.is_empty() {
            return self;
        }

        let mut index = self.ops.len();
        if let Some(last) = self.ops.last() {
            if last.is_delete() && op.is_insert() {
                index -= 1;
            }
        }

        if index > 0 {
            if let Some(merged) = merge(&self.ops[index - 1], &op) {
                self.ops[index - 1] = merged;
                return self;
            }
        }

        self.ops.insert(index, op);
        self
    }

    /// Reapply the canonicalizing push to every operation.
    #[must_use]
    pub fn compact(&self) -> Delta {
        let mut compacted = Delta::default();
        for op in &self.ops {
            compacted.push(op.clone());
        }
        compacted
    }

    /// A trailing bare retain carries no information; drop it.
    fn chop(mut self) -> Delta {
        if let Some(Op::Retain {
            value: RetainValue::Length(_),
            attributes: None,
        }) = self.ops.last()
        {
            self.ops.pop();
        }
        self
    }

    /// Fold `other` over `self`, producing the single change equivalent
    /// to applying `self` and then `other`.
    pub fn compose(&self, other: &Delta) -> Result<Delta> {
        trace!(
            "composing {} op(s) with {} op(s)",
            self.ops.len(),
            other.ops.len()
        );

        let mut iter_a = self.ops.clone().into_iter();
        let mut iter_b = other.ops.clone().into_iter();
        let mut head_a = iter_a.next();
        let mut head_b = iter_b.next();
        let mut composed = Delta::default();

        // Inserts of `self` that fit entirely inside a bare leading
        // retain of `other` pass through untouched.
        let leading_retain = match head_b.as_ref() {
            Some(Op::Retain {
                value: RetainValue::Length(n),
                attributes: None,
            }) => Some(*n),
            _ => None,
        };
        if let Some(first) = leading_retain {
            let mut remaining = first;
            while matches!(head_a.as_ref(), Some(op) if op.is_insert() && op.len() <= remaining) {
                if let Some(op) = head_a.take() {
                    remaining -= op.len();
                    composed.push(op);
                }
                head_a = iter_a.next();
            }
            let consumed = first - remaining;
            if consumed > 0 {
                if let Some(op) = head_b.take() {
                    let (_, rest) = op.take(consumed);
                    head_b = rest.or_else(|| iter_b.next());
                }
            }
        }

        loop {
            match (head_a, head_b) {
                (None, None) => break,
                // New material from `other` enters ahead of whatever
                // `self` holds at this position.
                (a_op, Some(y)) if y.is_insert() => {
                    composed.push(y);
                    head_a = a_op;
                    head_b = iter_b.next();
                }
                // Deletes of `self` act on content `other` never saw.
                (Some(x), b_op) if x.is_delete() => {
                    composed.push(x);
                    head_a = iter_a.next();
                    head_b = b_op;
                }
                // `other` exhausted: inserts and retains of `self` survive.
                (Some(x), None) => {
                    composed.push(x);
                    head_a = iter_a.next();
                    head_b = None;
                }
                // `self` exhausted: the rest of `other` applies past the
                // end; bare trailing retains fall to the final chop.
                (None, Some(y)) => {
                    composed.push(y);
                    head_a = None;
                    head_b = iter_b.next();
                }
                (Some(x), Some(y)) => {
                    let n = x.len().min(y.len());
                    let (x_slice, x_rest) = x.take(n);
                    let (y_slice, y_rest) = y.take(n);
                    head_b = y_rest.or_else(|| iter_b.next());

                    if let Some(op) = compose_slices(&x_slice, &y_slice)? {
                        let tail = op.clone();
                        composed.push(op);
                        // `other` exhausted and the op passed through
                        // unchanged: nothing can affect the remainder of
                        // `self`, copy it over intact.
                        if head_b.is_none() && composed.ops.last() == Some(&tail) {
                            for op in x_rest.into_iter().chain(iter_a) {
                                composed.push(op);
                            }
                            return Ok(composed.chop());
                        }
                    }
                    head_a = x_rest.or_else(|| iter_a.next());
                }
            }
        }

        Ok(composed.chop())
    }

    /// Rebase `other` against `self`, so that the result applies to a
    /// document that `self` has already changed. With `priority`, `self`
    /// wins position ties on concurrent inserts and keeps conflicting
    /// attributes.
    pub fn transform(&self, other: &Delta, priority: bool) -> Result<Delta> {
        trace!(
            "transforming {} op(s) against {} op(s), priority: {priority}",
            other.ops.len(),
            self.ops.len()
        );

        let mut iter_a = self.ops.clone().into_iter();
        let mut iter_b = other.ops.clone().into_iter();
        let mut head_a = iter_a.next();
        let mut head_b = iter_b.next();
        let mut transformed = Delta::default();

        loop {
            match (head_a, head_b) {
                // `other` exhausted: whatever `self` still holds is
                // irrelevant to the rebase.
                (_, None) => break,
                // An insert of `self` shifts `other` rightward. It goes
                // first unless `other` also inserts here and has its turn.
                (Some(x), Some(y)) if x.is_insert() && (priority || !y.is_insert()) => {
                    transformed.push(Op::retain(x.len(), None));
                    head_a = iter_a.next();
                    head_b = Some(y);
                }
                (a_op, Some(y)) if y.is_insert() => {
                    transformed.push(y);
                    head_a = a_op;
                    head_b = iter_b.next();
                }
                // `self` exhausted: the rest of `other` applies past its
                // end unchanged.
                (None, Some(y)) => {
                    transformed.push(y);
                    head_a = None;
                    head_b = iter_b.next();
                }
                (Some(x), Some(y)) => {
                    let n = x.len().min(y.len());
                    let (x_slice, x_rest) = x.take(n);
                    let (y_slice, y_rest) = y.take(n);
                    head_a = x_rest.or_else(|| iter_a.next());
                    head_b = y_rest.or_else(|| iter_b.next());

                    if let Some(op) = transform_slices(&x_slice, &y_slice, priority)? {
                        transformed.push(op);
                    }
                }
            }
        }

        Ok(transformed.chop())
    }

    /// Map a cursor index through this change. With `priority`, inserts
    /// exactly at the cursor do not push it rightward.
    pub fn transform_position(&self, index: usize, priority: bool) -> usize {
        let mut offset = 0;
        let mut index = index;
        for op in &self.ops {
            if offset > index {
                break;
            }
            (offset, index) = op.transform_position(offset, index, priority);
        }
        index
    }

    /// The canonical subsequence covering `[start, start + length)`.
    /// Splits respect grapheme boundaries.
    #[must_use]
    pub fn slice(&self, start: usize, length: usize) -> Delta {
        self.slice_inner(start, length, false)
    }

    /// Like [`slice`](Delta::slice), except an insert straddling the
    /// right edge is extended to the next grapheme boundary instead of
    /// being cut short.
    #[must_use]
    pub fn slice_max(&self, start: usize, length: usize) -> Delta {
        self.slice_inner(start, length, true)
    }

    fn slice_inner(&self, start: usize, length: usize, extend: bool) -> Delta {
        let end = start.saturating_add(length);
        let mut iter = self.ops.iter().cloned();
        let mut head = iter.next();
        let mut index = 0;
        let mut sliced = Delta::default();

        while index < end {
            let Some(op) = head.take() else { break };
            let len = op.len();

            if index + len <= start {
                // entirely before the window
                index += len;
                head = iter.next();
            } else if index < start {
                let (skipped, rest) = op.take(start - index);
                index += skipped.len();
                head = rest.or_else(|| iter.next());
            } else {
                let n = (end - index).min(len);
                let (taken, rest) = if extend && n < len {
                    op.take_max(n)
                } else {
                    op.take(n)
                };
                index += taken.len();
                sliced.push(taken);
                head = rest.or_else(|| iter.next());
            }
        }

        sliced
    }

    /// Cleave the sequence at the first point the predicate names.
    ///
    /// The predicate sees each operation together with the offset at
    /// which it starts and returns `None` to continue past it, or a
    /// split point relative to the operation's start. A point strictly
    /// inside the operation splits it with `take`.
    pub fn split<F>(&self, mut predicate: F) -> (Delta, Delta)
    where
        F: FnMut(&Op, usize) -> Option<usize>,
    {
        let mut left = Delta::default();
        let mut index = 0;
        let mut iter = self.ops.iter().cloned();

        while let Some(op) = iter.next() {
            match predicate(&op, index) {
                None => {
                    index += op.len();
                    left.push(op);
                }
                Some(point) => {
                    let (head, rest) = op.take(point);
                    left.push(head);
                    let mut right = Delta::default();
                    if let Some(rest) = rest {
                        right.push(rest);
                    }
                    for op in iter {
                        right.push(op);
                    }
                    return (left, right);
                }
            }
        }

        (left, Delta::default())
    }

    /// The change that undoes `self` when applied after it, given the
    /// document `self` applied to. Inserts invert to deletes, deletes
    /// re-insert the base content, attributed retains restore the base
    /// formatting, and embed retains recurse through the embed handler.
    pub fn invert(&self, base: &Delta) -> Result<Delta> {
        let mut inverted = Delta::default();
        let mut base_index = 0;

        for op in &self.ops {
            match op {
                Op::Insert { .. } => {
                    inverted.push(Op::delete(op.len()));
                }
                Op::Retain {
                    value: RetainValue::Length(n),
                    attributes: None,
                } => {
                    inverted.push(Op::retain(*n, None));
                    base_index += n;
                }
                Op::Retain {
                    value: RetainValue::Length(n),
                    attributes,
                } => {
                    for base_op in base.slice(base_index, *n).ops {
                        inverted.push(Op::retain(
                            base_op.len(),
                            attributes::invert(attributes.as_ref(), base_op.attributes()),
                        ));
                    }
                    base_index += n;
                }
                Op::Retain {
                    value: RetainValue::Embed(embedded),
                    attributes,
                } => {
                    let base_slice = base.slice(base_index, 1);
                    base_index += 1;
                    let Some(Op::Insert {
                        value: InsertValue::Embed(base_embed),
                        attributes: base_attributes,
                    }) = base_slice.ops.first()
                    else {
                        return Err(DeltaError::ExpectedEmbed {
                            embed_type: embedded.embed_type().to_owned(),
                            found: describe(base_slice.ops.first()),
                        });
                    };
                    inverted.push(Op::retain_embed(
                        embed::invert_embeds(embedded, base_embed)?,
                        attributes::invert(attributes.as_ref(), base_attributes.as_ref()),
                    ));
                }
                Op::Delete { length, .. } => {
                    for base_op in base.slice(base_index, *length).ops {
                        inverted.push(base_op);
                    }
                    base_index += length;
                }
            }
        }

        Ok(inverted.chop())
    }
}

/// One canonicalizing merge step: the combined operation when `last` and
/// `op` share an action and equal attributes and both are mergeable
/// values. Embed values never merge.
fn merge(last: &Op, op: &Op) -> Option<Op> {
    if !attributes::equal(last.attributes(), op.attributes()) {
        return None;
    }

    match (last, op) {
        (
            Op::Insert {
                value: InsertValue::Text(a),
                attributes,
            },
            Op::Insert {
                value: InsertValue::Text(b),
                ..
            },
        ) => Some(Op::Insert {
            value: InsertValue::Text(format!("{a}{b}")),
            attributes: attributes.clone(),
        }),
        (
            Op::Retain {
                value: RetainValue::Length(a),
                attributes,
            },
            Op::Retain {
                value: RetainValue::Length(b),
                ..
            },
        ) => Some(Op::Retain {
            value: RetainValue::Length(a + b),
            attributes: attributes.clone(),
        }),
        (Op::Delete { length: a, attributes }, Op::Delete { length: b, .. }) => Some(Op::Delete {
            length: a + b,
            attributes: attributes.clone(),
        }),
        _ => None,
    }
}

/// Compose one synchronized slice pair. `x` is an insert or retain and
/// `y` a retain or delete of equal length; the stepper peels off inserts
/// of `y` and deletes of `x` before pairing.
fn compose_slices(x: &Op, y: &Op) -> Result<Option<Op>> {
    match (x, y) {
        // `y` removes an insert `x` just made: both annihilate. Removing
        // retained content must still be recorded.
        (Op::Insert { .. }, Op::Delete { .. }) => Ok(None),
        (Op::Retain { .. }, Op::Delete { length, attributes }) => Ok(Some(Op::Delete {
            length: *length,
            attributes: attributes.clone(),
        })),

        (
            Op::Insert {
                value,
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Length(_),
                attributes: y_attrs,
            },
        ) => Ok(Some(Op::Insert {
            value: value.clone(),
            attributes: attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), false),
        })),

        (
            Op::Insert {
                value,
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Embed(y_embed),
                attributes: y_attrs,
            },
        ) => {
            let InsertValue::Embed(x_embed) = value else {
                return Err(DeltaError::ExpectedEmbed {
                    embed_type: y_embed.embed_type().to_owned(),
                    found: describe(Some(x)),
                });
            };
            Ok(Some(Op::Insert {
                value: InsertValue::Embed(embed::compose_embeds(x_embed, y_embed, false)?),
                attributes: attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), false),
            }))
        }

        (
            Op::Retain {
                value: RetainValue::Length(_),
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Length(n),
                attributes: y_attrs,
            },
        ) => Ok(Some(Op::retain(
            *n,
            attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), true),
        ))),

        (
            Op::Retain {
                value: RetainValue::Length(_),
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Embed(y_embed),
                attributes: y_attrs,
            },
        ) => Ok(Some(Op::retain_embed(
            y_embed.clone(),
            attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), true),
        ))),

        (
            Op::Retain {
                value: RetainValue::Embed(x_embed),
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Length(_),
                attributes: y_attrs,
            },
        ) => Ok(Some(Op::retain_embed(
            x_embed.clone(),
            attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), false),
        ))),

        (
            Op::Retain {
                value: RetainValue::Embed(x_embed),
                attributes: x_attrs,
            },
            Op::Retain {
                value: RetainValue::Embed(y_embed),
                attributes: y_attrs,
            },
        ) => Ok(Some(Op::retain_embed(
            embed::compose_embeds(x_embed, y_embed, true)?,
            attributes::compose(x_attrs.as_ref(), y_attrs.as_ref(), false),
        ))),

        (Op::Delete { .. }, _) | (_, Op::Insert { .. }) => {
            unreachable!("stepper pairs only insert/retain with retain/delete")
        }
    }
}

/// Transform one synchronized slice pair: `x` and `y` are retains or
/// deletes of equal length (inserts are handled by the stepper).
fn transform_slices(x: &Op, y: &Op, priority: bool) -> Result<Option<Op>> {
    // Territory `x` removed no longer exists for `y` to act on.
    if x.is_delete() {
        return Ok(None);
    }
    if y.is_delete() {
        return Ok(Some(y.clone()));
    }

    let attributes = attributes::transform(x.attributes(), y.attributes(), priority);
    let op = match (x, y) {
        (
            Op::Retain {
                value: RetainValue::Embed(x_embed),
                ..
            },
            Op::Retain {
                value: RetainValue::Embed(y_embed),
                ..
            },
        ) => Op::retain_embed(embed::transform_embeds(x_embed, y_embed, priority)?, attributes),
        (
            _,
            Op::Retain {
                value: RetainValue::Embed(y_embed),
                ..
            },
        ) => Op::retain_embed(y_embed.clone(), attributes),
        _ => Op::retain(x.len(), attributes),
    };
    Ok(Some(op))
}

fn describe(op: Option<&Op>) -> String {
    match op {
        None => "nothing".to_owned(),
        Some(Op::Insert {
            value: InsertValue::Text(_),
            ..
        }) => "a text insert".to_owned(),
        Some(Op::Insert {
            value: InsertValue::Embed(embed),
            ..
        }) => format!("an `{}` embed insert", embed.embed_type()),
        Some(Op::Retain { .. }) => "a retain".to_owned(),
        Some(Op::Delete { .. }) => "a delete".to_owned(),
    }
}

impl Debug for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ops).finish()
    }
}

impl Serialize for Delta {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.ops.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Delta {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ops = Vec::<Op>::deserialize(deserializer)?;
        Ok(Delta::from_ops(ops))
    }
}

impl FromIterator<Op> for Delta {
    fn from_iter<I: IntoIterator<Item = Op>>(ops: I) -> Self {
        Delta::from_ops(ops)
    }
}
