//! The attribute algebra: compose, transform, diff, and invert over the
//! optional formatting maps attached to operations.
//!
//! An attribute value of JSON `null` is the removal sentinel: it means
//! "remove this key when the format is realized". A key mapped to `null`
//! and an absent key behave differently under composition, which is what
//! the `keep_null` flag distinguishes.

use std::collections::BTreeMap;

use serde_json::Value;

/// Formatting attached to an operation. Never carries order; absent and
/// empty are interchangeable.
pub type Attributes = BTreeMap<String, Value>;

/// Drop the map entirely when it has no entries.
pub(crate) fn normalize(attributes: Option<Attributes>) -> Option<Attributes> {
    attributes.filter(|map| !map.is_empty())
}

/// Fold `b` over `a`: every key of either map is present, with `b`
/// winning on conflicts. With `keep_null` false, keys whose final value
/// is the removal sentinel are dropped; with `keep_null` true they are
/// retained so a later consumer can still apply the removal.
pub fn compose(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    keep_null: bool,
) -> Option<Attributes> {
    let mut composed = a.cloned().unwrap_or_default();
    if let Some(b) = b {
        composed.extend(b.iter().map(|(key, value)| (key.clone(), value.clone())));
    }

    if !keep_null {
        composed.retain(|_, value| !value.is_null());
    }

    normalize(Some(composed))
}

/// Rebase `b` against concurrent `a`. With `priority` (a wins), keys `a`
/// already set are discarded from `b`; without it `b` passes through
/// unchanged.
pub fn transform(
    a: Option<&Attributes>,
    b: Option<&Attributes>,
    priority: bool,
) -> Option<Attributes> {
    let Some(a) = a else {
        return normalize(b.cloned());
    };
    let Some(b) = b else {
        return None;
    };

    if !priority {
        return normalize(Some(b.clone()));
    }

    let transformed = b
        .iter()
        .filter(|(key, _)| !a.contains_key(*key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    normalize(Some(transformed))
}

/// The change that takes `a`'s formatting to `b`'s: for every differing
/// key, `b`'s value, with the removal sentinel standing in where `b`
/// lacks a key `a` has.
pub fn diff(a: Option<&Attributes>, b: Option<&Attributes>) -> Option<Attributes> {
    static EMPTY: Attributes = Attributes::new();
    let a = a.unwrap_or(&EMPTY);
    let b = b.unwrap_or(&EMPTY);

    let mut diffed = Attributes::new();
    for key in a.keys().chain(b.keys()) {
        if a.get(key) != b.get(key) {
            diffed.insert(
                key.clone(),
                b.get(key).cloned().unwrap_or(Value::Null),
            );
        }
    }
    normalize(Some(diffed))
}

/// The inverse of applying `attr` on top of `base`: restores the base
/// value for every key `attr` touched, using the removal sentinel for
/// keys the base never had.
pub fn invert(attr: Option<&Attributes>, base: Option<&Attributes>) -> Option<Attributes> {
    static EMPTY: Attributes = Attributes::new();
    let attr = attr.unwrap_or(&EMPTY);
    let base = base.unwrap_or(&EMPTY);

    let mut inverted: Attributes = base
        .iter()
        .filter(|(key, value)| attr.contains_key(*key) && attr.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    for key in attr.keys() {
        if !base.contains_key(key) {
            inverted.insert(key.clone(), Value::Null);
        }
    }
    normalize(Some(inverted))
}

/// Deep equality, treating absent and empty as the same map.
pub fn equal(a: Option<&Attributes>, b: Option<&Attributes>) -> bool {
    static EMPTY: Attributes = Attributes::new();
    a.unwrap_or(&EMPTY) == b.unwrap_or(&EMPTY)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> Attributes {
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value))
            .collect()
    }

    #[test]
    fn test_compose_b_wins() {
        let a = attrs([("bold", json!(true)), ("color", json!("red"))]);
        let b = attrs([("color", json!("blue")), ("italic", json!(true))]);

        assert_eq!(
            compose(Some(&a), Some(&b), false),
            Some(attrs([
                ("bold", json!(true)),
                ("color", json!("blue")),
                ("italic", json!(true)),
            ]))
        );
    }

    #[test]
    fn test_compose_null_realized() {
        let a = attrs([("bold", json!(true))]);
        let b = attrs([("bold", Value::Null)]);

        assert_eq!(compose(Some(&a), Some(&b), false), None);
        assert_eq!(
            compose(Some(&a), Some(&b), true),
            Some(attrs([("bold", Value::Null)]))
        );
    }

    #[test]
    fn test_compose_absent_sides() {
        let a = attrs([("bold", json!(true))]);

        assert_eq!(compose(Some(&a), None, false), Some(a.clone()));
        assert_eq!(compose(None, Some(&a), false), Some(a));
        assert_eq!(compose(None, None, true), None);
    }

    #[test]
    fn test_transform_priority() {
        let a = attrs([("bold", json!(true)), ("color", json!("red"))]);
        let b = attrs([("color", json!("blue")), ("italic", json!(true))]);

        assert_eq!(
            transform(Some(&a), Some(&b), true),
            Some(attrs([("italic", json!(true))]))
        );
        assert_eq!(transform(Some(&a), Some(&b), false), Some(b));
    }

    #[test]
    fn test_transform_absent_sides() {
        let b = attrs([("bold", json!(true))]);

        assert_eq!(transform(None, Some(&b), true), Some(b.clone()));
        assert_eq!(transform(Some(&b), None, true), None);
    }

    #[test]
    fn test_diff() {
        let a = attrs([("bold", json!(true)), ("color", json!("red"))]);
        let b = attrs([("color", json!("blue"))]);

        assert_eq!(
            diff(Some(&a), Some(&b)),
            Some(attrs([("bold", Value::Null), ("color", json!("blue"))]))
        );
        assert_eq!(diff(Some(&a), Some(&a)), None);
    }

    #[test]
    fn test_invert() {
        let base = attrs([("color", json!("red"))]);
        let attr = attrs([("color", json!("blue")), ("bold", json!(true))]);

        assert_eq!(
            invert(Some(&attr), Some(&base)),
            Some(attrs([("color", json!("red")), ("bold", Value::Null)]))
        );
    }

    #[test]
    fn test_invert_composes_back() {
        let base = attrs([("color", json!("red")), ("size", json!(12))]);
        let attr = attrs([("color", json!("blue")), ("bold", json!(true))]);

        let inverse = invert(Some(&attr), Some(&base));
        let applied = compose(Some(&base), Some(&attr), false);
        assert_eq!(
            compose(applied.as_ref(), inverse.as_ref(), false),
            Some(base)
        );
    }

    #[test]
    fn test_equal_treats_absent_as_empty() {
        assert!(equal(None, Some(&Attributes::new())));
        assert!(!equal(None, Some(&attrs([("bold", json!(true))]))));
    }
}
