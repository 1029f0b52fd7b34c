// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured type expressions.
//!
//! A raw type string such as `Optional[Dict[str, List[int]]]` is parsed into
//! a [`TypeExpr`] tree. Parsing is total: anything not recognized becomes
//! [`TypeExpr::Basic`] holding the whole (trimmed) input.

use crate::text::{split_call, split_top_level};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The name used for the absent value inside unions.
pub const NONE_TYPE: &str = "None";

/// A parsed type expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// A plain (possibly namespaced) type name
    Basic(String),
    /// `Optional[T]`
    Optional(Box<TypeExpr>),
    /// `Union[A, B, ...]` or `A | B | ...`
    Union(Vec<TypeExpr>),
    /// `List[T]`
    List(Box<TypeExpr>),
    /// `Dict[K, V]`, keeping the raw value type
    Dict(String),
    /// `Message[T]`, a labeled wrapper type
    Message(Box<TypeExpr>),
}

impl TypeExpr {
    /// Parse a raw type string.
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();

        let pipes = split_top_level(s, '|');
        if pipes.len() > 1 {
            return Self::from_variants(pipes.into_iter().map(Self::parse).collect());
        }

        let Some((head, inner)) = split_call(s, '[') else {
            return Self::Basic(s.to_string());
        };

        match head.rsplit('.').next().unwrap_or(head) {
            "Optional" => Self::Optional(Box::new(Self::parse(inner))),
            "Union" => {
                Self::from_variants(split_top_level(inner, ',').into_iter().map(Self::parse).collect())
            }
            "List" | "list" | "Sequence" | "Set" | "set" | "Tuple" | "tuple" => {
                let first = split_top_level(inner, ',').into_iter().next().unwrap_or("Any");
                Self::List(Box::new(Self::parse(first)))
            }
            "Dict" | "dict" | "Mapping" => {
                let args = split_top_level(inner, ',');
                let value = args.get(1).copied().unwrap_or("Any");
                Self::Dict(value.to_string())
            }
            "Message" => Self::Message(Box::new(Self::parse(inner))),
            "Annotated" => {
                let first = split_top_level(inner, ',').into_iter().next().unwrap_or("Any");
                Self::parse(first)
            }
            _ => Self::Basic(s.to_string()),
        }
    }

    /// Collapse a `T | None` pair into `Optional[T]`; keep anything else a union.
    fn from_variants(mut variants: Vec<TypeExpr>) -> Self {
        let has_none = variants.iter().any(Self::is_none);
        if has_none && variants.len() == 2 {
            variants.retain(|v| !v.is_none());
            if let Some(inner) = variants.pop() {
                return Self::Optional(Box::new(inner));
            }
        }
        Self::Union(variants)
    }

    fn is_none(&self) -> bool {
        matches!(self, Self::Basic(name) if name == NONE_TYPE)
    }

    /// Whether a value of this type may be absent.
    pub fn is_optional(&self) -> bool {
        match self {
            Self::Optional(_) => true,
            Self::Union(variants) => variants.iter().any(|v| v.is_none() || v.is_optional()),
            Self::Basic(name) => name == NONE_TYPE,
            _ => false,
        }
    }

    /// The type with one optional wrapper removed.
    pub fn without_optional(&self) -> &TypeExpr {
        match self {
            Self::Optional(inner) => inner,
            other => other,
        }
    }

    /// The name of a basic type, if this is one.
    pub fn basic_name(&self) -> Option<&str> {
        match self {
            Self::Basic(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(name) => write!(f, "{name}"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Union(variants) => {
                write!(f, "Union[")?;
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::List(inner) => write!(f, "List[{inner}]"),
            Self::Dict(value) => write!(f, "Dict[str, {value}]"),
            Self::Message(inner) => write!(f, "Message[{inner}]"),
        }
    }
}

impl Default for TypeExpr {
    fn default() -> Self {
        Self::Basic("Any".to_string())
    }
}
