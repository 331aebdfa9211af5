//! The embed handler protocol: the contract through which typed embedded
//! content participates in the algebra, and the process-wide registry
//! that resolves a handler from an embed's type key.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, RwLock},
};

use log::debug;
use serde_json::Value;

use crate::{Delta, DeltaError, Result, operation::Embed};

/// Capability set a typed embed brings to the algebra. Handlers are pure
/// functions over the embed's payload; the algebra calls them whenever
/// two embeds of the handler's type are paired.
pub trait EmbedHandler: Send + Sync {
    /// Fold `right` over `left`. `is_retain` distinguishes a
    /// retain-over-retain composition, which must preserve explicit
    /// attribute removals inside the payload, from an insert-over-retain
    /// composition, which realizes them.
    fn compose(&self, left: &Value, right: &Value, is_retain: bool) -> Result<Value>;

    /// Rebase `right` against the concurrent `left`.
    fn transform(&self, left: &Value, right: &Value, priority: bool) -> Result<Value>;

    /// The payload that undoes `change` when composed after it, given
    /// the `base` payload it applied to.
    fn invert(&self, change: &Value, base: &Value) -> Result<Value>;
}

type HandlerMap = HashMap<String, Arc<dyn EmbedHandler>>;

static HANDLERS: LazyLock<RwLock<Arc<HandlerMap>>> = LazyLock::new(|| {
    let mut handlers: HandlerMap = HashMap::new();
    handlers.insert("delta".to_owned(), Arc::new(NestedDeltaHandler));
    RwLock::new(Arc::new(handlers))
});

/// Register the handler resolved for embeds whose single key equals
/// `embed_type`. Registration replaces the whole snapshot, so algebra
/// calls already holding the previous snapshot keep a consistent
/// handler set.
pub fn register_embed_handler(embed_type: impl Into<String>, handler: Arc<dyn EmbedHandler>) {
    let embed_type = embed_type.into();
    debug!("registering embed handler for type `{embed_type}`");

    let mut guard = HANDLERS
        .write()
        .expect("embed handler registry lock poisoned");
    let mut handlers = HandlerMap::clone(&guard);
    handlers.insert(embed_type, handler);
    *guard = Arc::new(handlers);
}

fn handler_for(embed_type: &str) -> Result<Arc<dyn EmbedHandler>> {
    let snapshot = Arc::clone(
        &HANDLERS
            .read()
            .expect("embed handler registry lock poisoned"),
    );
    snapshot
        .get(embed_type)
        .cloned()
        .ok_or_else(|| DeltaError::UnknownEmbedType {
            embed_type: embed_type.to_owned(),
        })
}

fn matched_type<'a>(left: &'a Embed, right: &Embed) -> Result<&'a str> {
    if left.embed_type() != right.embed_type() {
        return Err(DeltaError::EmbedTypeMismatch {
            left: left.embed_type().to_owned(),
            right: right.embed_type().to_owned(),
        });
    }
    Ok(left.embed_type())
}

pub(crate) fn compose_embeds(left: &Embed, right: &Embed, is_retain: bool) -> Result<Embed> {
    let embed_type = matched_type(left, right)?;
    let handler = handler_for(embed_type)?;
    let value = handler.compose(left.value(), right.value(), is_retain)?;
    Ok(Embed::new(embed_type, value))
}

pub(crate) fn transform_embeds(left: &Embed, right: &Embed, priority: bool) -> Result<Embed> {
    let embed_type = matched_type(left, right)?;
    let handler = handler_for(embed_type)?;
    let value = handler.transform(left.value(), right.value(), priority)?;
    Ok(Embed::new(embed_type, value))
}

pub(crate) fn invert_embeds(change: &Embed, base: &Embed) -> Result<Embed> {
    let embed_type = matched_type(change, base)?;
    let handler = handler_for(embed_type)?;
    let value = handler.invert(change.value(), base.value())?;
    Ok(Embed::new(embed_type, value))
}

/// The built-in handler for `"delta"` embeds: a nested document
/// composes, transforms, and inverts by re-entering the sequence engine
/// on its own contents.
struct NestedDeltaHandler;

impl NestedDeltaHandler {
    fn decode(value: &Value) -> Result<Delta> {
        serde_json::from_value(value.clone()).map_err(|error| DeltaError::InvalidEmbedPayload {
            embed_type: "delta".to_owned(),
            reason: error.to_string(),
        })
    }

    fn encode(delta: &Delta) -> Result<Value> {
        serde_json::to_value(delta).map_err(|error| DeltaError::InvalidEmbedPayload {
            embed_type: "delta".to_owned(),
            reason: error.to_string(),
        })
    }
}

impl EmbedHandler for NestedDeltaHandler {
    fn compose(&self, left: &Value, right: &Value, _is_retain: bool) -> Result<Value> {
        let composed = Self::decode(left)?.compose(&Self::decode(right)?)?;
        Self::encode(&composed)
    }

    fn transform(&self, left: &Value, right: &Value, priority: bool) -> Result<Value> {
        let transformed = Self::decode(left)?.transform(&Self::decode(right)?, priority)?;
        Self::encode(&transformed)
    }

    fn invert(&self, change: &Value, base: &Value) -> Result<Value> {
        let inverted = Self::decode(change)?.invert(&Self::decode(base)?)?;
        Self::encode(&inverted)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::operation::Op;

    fn delta_embed(ops: Value) -> Embed {
        Embed::new("delta", ops)
    }

    #[test]
    fn test_unknown_embed_type_is_an_error() {
        let a = Delta::new().retain_embed(Embed::new("spreadsheet", json!({})), None);
        let b = Delta::new().retain_embed(Embed::new("spreadsheet", json!({})), None);

        assert_eq!(
            a.compose(&b),
            Err(DeltaError::UnknownEmbedType {
                embed_type: "spreadsheet".to_owned()
            })
        );
    }

    #[test]
    fn test_mismatched_embed_types_are_an_error() {
        let a = Delta::new().retain_embed(delta_embed(json!([])), None);
        let b = Delta::new().retain_embed(Embed::new("image", json!("i.png")), None);

        assert_eq!(
            a.compose(&b),
            Err(DeltaError::EmbedTypeMismatch {
                left: "delta".to_owned(),
                right: "image".to_owned(),
            })
        );
    }

    #[test]
    fn test_text_insert_under_embed_retain_is_an_error() {
        let a = Delta::new().insert("a", None);
        let b = Delta::new().retain_embed(delta_embed(json!([])), None);

        assert_eq!(
            a.compose(&b),
            Err(DeltaError::ExpectedEmbed {
                embed_type: "delta".to_owned(),
                found: "a text insert".to_owned(),
            })
        );
    }

    #[test]
    fn test_invalid_delta_payload_is_an_error() {
        let a = Delta::new().retain_embed(delta_embed(json!("not ops")), None);
        let b = Delta::new().retain_embed(delta_embed(json!([])), None);

        assert!(matches!(
            a.compose(&b),
            Err(DeltaError::InvalidEmbedPayload { .. })
        ));
    }

    #[test]
    fn test_nested_delta_compose() {
        let doc = Delta::new().insert(delta_embed(json!([{"insert": "ab"}])), None);
        let change = Delta::new().retain_embed(
            delta_embed(json!([{"retain": 1}, {"insert": "X"}])),
            None,
        );

        assert_eq!(
            doc.compose(&change).unwrap(),
            Delta::new().insert(delta_embed(json!([{"insert": "aXb"}])), None)
        );
    }

    #[test]
    fn test_nested_delta_compose_under_retain() {
        let a = Delta::new().retain(10, Some([("bold".to_owned(), json!(true))].into()));
        let b = Delta::new().retain_embed(delta_embed(json!([{"insert": "b"}])), None);

        let expected = Delta::from_ops([
            Op::retain_embed(
                delta_embed(json!([{"insert": "b"}])),
                Some([("bold".to_owned(), json!(true))].into()),
            ),
            Op::retain(9, Some([("bold".to_owned(), json!(true))].into())),
        ]);
        assert_eq!(a.compose(&b).unwrap(), expected);
    }

    #[test]
    fn test_nested_delta_transform() {
        let a = Delta::new().retain_embed(delta_embed(json!([{"insert": "A"}])), None);
        let b = Delta::new().retain_embed(delta_embed(json!([{"insert": "B"}])), None);

        assert_eq!(
            a.transform(&b, true).unwrap(),
            Delta::new().retain_embed(
                delta_embed(json!([{"retain": 1}, {"insert": "B"}])),
                None,
            )
        );
    }

    #[test]
    fn test_nested_delta_invert_round_trip() {
        let base = Delta::new().insert(delta_embed(json!([{"insert": "ab"}])), None);
        let change = Delta::new().retain_embed(
            delta_embed(json!([{"retain": 2}, {"insert": "c"}])),
            None,
        );

        let inverted = change.invert(&base).unwrap();
        let changed = base.compose(&change).unwrap();
        assert_eq!(changed.compose(&inverted).unwrap(), base);
    }

    #[test]
    fn test_custom_handler_registration() {
        // A counter embed whose payload is a number; composition adds,
        // transformation keeps the right-hand side, inversion negates.
        struct CounterHandler;

        impl EmbedHandler for CounterHandler {
            fn compose(&self, left: &Value, right: &Value, _is_retain: bool) -> Result<Value> {
                Ok(json!(
                    left.as_i64().unwrap_or_default() + right.as_i64().unwrap_or_default()
                ))
            }

            fn transform(&self, _left: &Value, right: &Value, _priority: bool) -> Result<Value> {
                Ok(right.clone())
            }

            fn invert(&self, change: &Value, _base: &Value) -> Result<Value> {
                Ok(json!(-change.as_i64().unwrap_or_default()))
            }
        }

        register_embed_handler("counter", Arc::new(CounterHandler));

        let a = Delta::new().retain_embed(Embed::new("counter", json!(2)), None);
        let b = Delta::new().retain_embed(Embed::new("counter", json!(3)), None);

        assert_eq!(
            a.compose(&b).unwrap(),
            Delta::new().retain_embed(Embed::new("counter", json!(5)), None)
        );
    }
}
