//! Route patterns and typed path parameters.
//!
//! A pattern is a `/`-separated list of segments. A segment is either a
//! literal or a placeholder:
//!
//! | Placeholder | Parsed as |
//! |---|---|
//! | `<int:name>` | `i64` |
//! | `<float:name>`, `<double:name>` | `f64` |
//! | `<bool:name>` | `true`/`false`/`1`/`0` (case-insensitive) |
//! | `<uuid:name>` | [`Uuid`] |
//! | `<string:name>`, `<name>` | any single segment |
//!
//! Empty segments are ignored, so `/status` and `/status/` are the same pattern.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::error::{ClientError, RegistrationError};

static PLACEHOLDER: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^<(?:([A-Za-z]+):)?([A-Za-z_][A-Za-z0-9_]*)>$"));

/// Declared type of a path placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Signed 64-bit integer.
    Int,
    /// `float` tag.
    Float,
    /// `double` tag; parsed identically to `float`.
    Double,
    /// Boolean.
    Bool,
    /// UUID in any format accepted by [`Uuid::parse_str`].
    Uuid,
    /// Unconstrained text.
    String,
}

impl ParamType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            "bool" => Some(Self::Bool),
            "uuid" => Some(Self::Uuid),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    const fn canonical(self) -> Self {
        match self {
            Self::Double => Self::Float,
            other => other,
        }
    }

    /// Parses a decoded segment as this type.
    #[must_use]
    pub fn parse(self, raw: &str) -> Option<ParamValue> {
        match self {
            Self::Int => raw.parse().ok().map(ParamValue::Int),
            Self::Float | Self::Double => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ParamValue::Float),
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(ParamValue::Bool(true)),
                "false" | "0" => Some(ParamValue::Bool(false)),
                _ => None,
            },
            Self::Uuid => Uuid::parse_str(raw).ok().map(ParamValue::Uuid),
            Self::String => (!raw.is_empty()).then(|| ParamValue::Str(raw.to_string())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Uuid => "uuid",
            Self::String => "string",
        };
        f.write_str(tag)
    }
}

/// A parsed path parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// From `<int:..>`.
    Int(i64),
    /// From `<float:..>` or `<double:..>`.
    Float(f64),
    /// From `<bool:..>`.
    Bool(bool),
    /// From `<uuid:..>`.
    Uuid(Uuid),
    /// From `<string:..>` or `<..>`.
    Str(String),
}

/// Parameters extracted from a matched path, in pattern order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    values: Vec<(String, ParamValue)>,
}

impl PathParams {
    /// Returns the value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Returns an integer parameter.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a float parameter.
    #[must_use]
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a boolean parameter.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a UUID parameter.
    #[must_use]
    pub fn uuid(&self, name: &str) -> Option<Uuid> {
        match self.get(name)? {
            ParamValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a string parameter.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the route has no placeholders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, ty: ParamType },
}

/// Outcome of matching a path against a pattern.
#[derive(Debug, PartialEq)]
pub enum PathMatch {
    /// Every segment matched.
    Matched(PathParams),
    /// The shape matched but a typed segment did not parse.
    Rejected(ClientError),
    /// Different shape or literal.
    Miss,
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parses a pattern such as `/doors/<int:door_id>/`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] for unknown type tags,
    /// malformed placeholders or duplicate parameter names.
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason: String| RegistrationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason,
        };
        let placeholder = PLACEHOLDER
            .as_ref()
            .map_err(|e| invalid(e.to_string()))?;

        let mut segments = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            if !raw.contains('<') && !raw.contains('>') {
                segments.push(Segment::Literal(raw.to_string()));
                continue;
            }

            let caps = placeholder
                .captures(raw)
                .ok_or_else(|| invalid(format!("malformed placeholder '{raw}'")))?;
            let ty = match caps.get(1) {
                Some(tag) => ParamType::from_tag(tag.as_str())
                    .ok_or_else(|| invalid(format!("unknown parameter type '{}'", tag.as_str())))?,
                None => ParamType::String,
            };
            let name = caps[2].to_string();

            let duplicate = segments
                .iter()
                .any(|s| matches!(s, Segment::Param { name: n, .. } if *n == name));
            if duplicate {
                return Err(invalid(format!("parameter '{name}' appears twice")));
            }
            segments.push(Segment::Param { name, ty });
        }

        Ok(Self { segments })
    }

    /// Returns `true` when both patterns accept exactly the same paths.
    ///
    /// Parameter names are ignored and `float`/`double` count as one type.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param { ty: a, .. }, Segment::Param { ty: b, .. }) => {
                        a.canonical() == b.canonical()
                    }
                    _ => false,
                })
    }

    /// Matches a request path (still percent-encoded) against this pattern.
    ///
    /// Segments are checked left to right; the first typed segment that fails
    /// to parse rejects the whole match.
    #[must_use]
    pub fn matches(&self, path: &str) -> PathMatch {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return PathMatch::Miss;
        }

        // Literals first so a typed segment only rejects paths of the right shape.
        let literals_match = self.segments.iter().zip(&parts).all(|(seg, part)| match seg {
            Segment::Literal(lit) => decode(part) == *lit,
            Segment::Param { .. } => true,
        });
        if !literals_match {
            return PathMatch::Miss;
        }

        let mut params = PathParams::default();
        for (seg, part) in self.segments.iter().zip(&parts) {
            let Segment::Param { name, ty } = seg else {
                continue;
            };
            let raw = decode(part);
            match ty.parse(&raw) {
                Some(value) => params.values.push((name.clone(), value)),
                None => {
                    return PathMatch::Rejected(ClientError::InvalidParameter {
                        name: name.clone(),
                        expected: *ty,
                        value: raw,
                    })
                }
            }
        }
        PathMatch::Matched(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for seg in &self.segments {
            match seg {
                Segment::Literal(lit) => write!(f, "/{lit}")?,
                Segment::Param { name, ty } => write!(f, "/<{ty}:{name}>")?,
            }
        }
        f.write_str("/")
    }
}

fn decode(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}
