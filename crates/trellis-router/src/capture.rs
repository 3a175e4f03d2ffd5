//! Dynamic path segments.
//!
//! A [`Capture`] turns one raw path segment into a named value, or reports
//! that the segment does not match. A failed capture is never an error: the
//! matcher simply moves on to the next candidate endpoint.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Result, RouterError};
use crate::request::{Method, Params};

/// Built-in coercions for captured segments and query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Keep the raw string.
    #[default]
    String,
    /// Integer or finite float.
    Number,
    /// `true`/`1` or `false`/`0`, case-insensitive.
    Boolean,
}

impl ParamType {
    /// Coerces a raw string, returning `None` when it does not fit the type.
    #[must_use]
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            Self::Number => {
                let raw = raw.trim();
                if let Ok(n) = raw.parse::<i64>() {
                    return Some(Value::from(n));
                }
                raw.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            }
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

/// What a capture evaluator sees.
#[derive(Debug, Clone, Copy)]
pub struct CaptureContext<'a> {
    /// The decoded path segment under test.
    pub value: &'a str,
    /// Request method.
    pub method: Method,
    /// Full decoded request path.
    pub path: &'a str,
    /// Normalized request content type.
    pub content_type: Option<&'a str>,
    /// Values captured by earlier segments of the same candidate route.
    pub params: &'a Params,
}

/// A user-supplied capture function. `None` or `Value::Null` means no match.
pub type CaptureFn = Arc<dyn Fn(&CaptureContext<'_>) -> Option<Value> + Send + Sync>;

/// How a capture derives its value.
#[derive(Clone)]
pub enum Evaluator {
    /// Coerce the raw segment.
    Coerce(ParamType),
    /// Match a regular expression; named groups become an object.
    Pattern(Regex),
    /// Call a function with the full capture context.
    Function(CaptureFn),
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::Coerce(ParamType::String)
    }
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coerce(t) => f.debug_tuple("Coerce").field(t).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl From<ParamType> for Evaluator {
    fn from(t: ParamType) -> Self {
        Self::Coerce(t)
    }
}

impl From<Regex> for Evaluator {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

/// Fields that can be replaced by [`Capture::clone_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureOverrides {
    /// Replace the optional flag.
    pub optional: Option<bool>,
    /// Replace the coercion type (coercing captures only).
    pub param_type: Option<ParamType>,
}

/// A named dynamic path segment.
#[derive(Debug, Clone)]
pub struct Capture {
    name: String,
    optional: bool,
    evaluator: Evaluator,
}

impl Capture {
    /// Creates a required string capture.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_evaluator(name, Evaluator::default())
    }

    /// Creates a capture with an explicit evaluator.
    pub fn with_evaluator(name: impl Into<String>, evaluator: impl Into<Evaluator>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            evaluator: evaluator.into(),
        }
    }

    /// Creates a required capture coerced to `param_type`.
    pub fn typed(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::with_evaluator(name, param_type)
    }

    /// Creates a capture from a regular expression source.
    pub fn pattern(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern).map_err(|source| RouterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::with_evaluator(name, re))
    }

    /// Creates a capture backed by a function.
    pub fn function<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&CaptureContext<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        Self::with_evaluator(name, Evaluator::Function(Arc::new(f)))
    }

    /// Marks the capture optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Returns a copy with the given fields replaced.
    #[must_use]
    pub fn clone_with(&self, overrides: CaptureOverrides) -> Self {
        let mut capture = self.clone();
        if let Some(optional) = overrides.optional {
            capture.optional = optional;
        }
        if let (Some(t), Evaluator::Coerce(_)) = (overrides.param_type, &capture.evaluator) {
            capture.evaluator = Evaluator::Coerce(t);
        }
        capture
    }

    /// The parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the capture may consume zero segments.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// The evaluator.
    #[must_use]
    pub const fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Evaluates the capture against one segment.
    #[must_use]
    pub fn matches(&self, ctx: &CaptureContext<'_>) -> Option<Value> {
        match &self.evaluator {
            Evaluator::Function(f) => f(ctx).filter(|v| !v.is_null()),
            Evaluator::Pattern(re) => {
                let caps = re.captures(ctx.value)?;
                let mut named = re.capture_names().flatten().peekable();
                if named.peek().is_none() {
                    return caps.get(0).map(|m| Value::String(m.as_str().to_string()));
                }
                let record = named
                    .map(|group| {
                        let value = caps
                            .name(group)
                            .map_or(Value::Null, |m| Value::String(m.as_str().to_string()));
                        (group.to_string(), value)
                    })
                    .collect::<Map<_, _>>();
                Some(Value::Object(record))
            }
            Evaluator::Coerce(t) => {
                if ctx.value.is_empty() && !self.optional {
                    return None;
                }
                t.coerce(ctx.value)
            }
        }
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.name)?;
        if self.optional {
            f.write_str("?")?;
        }
        Ok(())
    }
}
