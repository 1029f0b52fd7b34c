// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link legality between a producer type and a consumer type.
//!
//! The check works on raw type strings so it can run on every pointer move
//! without re-parsing. It is pure and total: an unrecognized pair is simply
//! incompatible.

use crate::text::{split_call, split_top_level};

/// The universal type marker
pub const ANY_TYPE: &str = "Any";

/// Legacy spellings treated as the same type.
const SYNONYMS: &[(&str, &str)] = &[("index", "int"), ("str", "string")];

/// Check if a value of type `producer` may feed an input of type `consumer`
pub fn compatible(producer: &str, consumer: &str) -> bool {
    let producer = producer.trim();
    let consumer = consumer.trim();

    if producer == consumer {
        return true;
    }

    if producer == ANY_TYPE || consumer == ANY_TYPE {
        return true;
    }

    if let Some(inner) = optional_inner(consumer) {
        if compatible(producer, inner) {
            return true;
        }
    }

    if let Some(variants) = union_variants(consumer) {
        if variants.iter().any(|v| compatible(producer, v)) {
            return true;
        }
    }

    // `Schema.Model` and `Model` name the same thing on either side
    if let Some(tail) = namespace_tail(producer) {
        if compatible(tail, consumer) {
            return true;
        }
    }
    if let Some(tail) = namespace_tail(consumer) {
        if compatible(producer, tail) {
            return true;
        }
    }

    SYNONYMS
        .iter()
        .any(|&(a, b)| (producer == a && consumer == b) || (producer == b && consumer == a))
}

fn optional_inner(ty: &str) -> Option<&str> {
    match split_call(ty, '[') {
        Some(("Optional", inner)) => Some(inner.trim()),
        _ => None,
    }
}

fn union_variants(ty: &str) -> Option<Vec<&str>> {
    let pipes = split_top_level(ty, '|');
    if pipes.len() > 1 {
        return Some(pipes);
    }
    match split_call(ty, '[') {
        Some(("Union", inner)) => Some(split_top_level(inner, ',')),
        _ => None,
    }
}

fn namespace_tail(ty: &str) -> Option<&str> {
    if ty.contains(['[', '|', ',']) {
        return None;
    }
    let (_, tail) = ty.rsplit_once('.')?;
    (!tail.is_empty()).then_some(tail)
}
