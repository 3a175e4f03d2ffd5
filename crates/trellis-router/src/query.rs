//! Query parameter validation and coercion.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::capture::ParamType;
use crate::error::{HttpError, Result, RouterError};
use crate::request::Params;

/// A custom validator for a raw query value.
#[derive(Clone)]
pub enum Validate {
    /// The value must contain a match of the expression.
    Pattern(Regex),
    /// The value is valid when the function returns true.
    Function(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Validate {
    /// Creates a validator from a regular expression source.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|source| RouterError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    /// Creates a function validator.
    pub fn function(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    fn check(&self, value: &str) -> bool {
        match self {
            Self::Pattern(re) => re.is_match(value),
            Self::Function(f) => f(value),
        }
    }
}

impl fmt::Debug for Validate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Declaration of one query parameter.
#[derive(Debug, Clone, Default)]
pub struct QueryParam {
    /// Reject requests without the parameter.
    pub required: bool,
    /// Value injected when the parameter is absent.
    pub default: Option<Value>,
    /// Coercion applied to present, valid values.
    pub param_type: Option<ParamType>,
    /// Custom validation of the raw value.
    pub validate: Option<Validate>,
}

impl QueryParam {
    /// An optional, unvalidated string parameter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the parameter required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the coercion type.
    #[must_use]
    pub const fn of_type(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    /// Sets the validator.
    #[must_use]
    pub fn validate(mut self, validate: Validate) -> Self {
        self.validate = Some(validate);
        self
    }
}

/// Validates and coerces raw query values against their declarations.
///
/// Undeclared parameters pass through as strings.
pub fn compile_query_params(
    spec: &BTreeMap<String, QueryParam>,
    raw: &HashMap<String, String>,
) -> std::result::Result<Params, HttpError> {
    let mut params = raw
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect::<Params>();

    for (name, param) in spec {
        let Some(value) = raw.get(name) else {
            if param.required {
                return Err(HttpError::bad_request(format!(
                    "Missing required query parameter: {name}"
                )));
            }
            if let Some(default) = &param.default {
                params.insert(name.clone(), default.clone());
            }
            continue;
        };

        if let Some(validate) = &param.validate {
            if !validate.check(value) {
                return Err(HttpError::bad_request(format!(
                    "Invalid value for query parameter {name}: {value}"
                )));
            }
        }

        if let Some(param_type) = param.param_type {
            let coerced = param_type.coerce(value).ok_or_else(|| {
                HttpError::bad_request(format!(
                    "Query parameter {name} must be a {param_type:?}, got: {value}"
                ))
            })?;
            params.insert(name.clone(), coerced);
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HttpErrorKind;

    fn spec(entries: Vec<(&str, QueryParam)>) -> BTreeMap<String, QueryParam> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn raw(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_missing_required() {
        let spec = spec(vec![("q", QueryParam::new().required())]);
        let err = compile_query_params(&spec, &raw(&[])).unwrap_err();
        assert_eq!(err.kind, HttpErrorKind::BadRequest);
        assert!(err.message.contains('q'));
    }

    #[test]
    fn test_default_injected() {
        let spec = spec(vec![("page", QueryParam::new().default_value(1))]);
        let params = compile_query_params(&spec, &raw(&[])).unwrap();
        assert_eq!(params.get("page"), Some(&Value::from(1)));
    }

    #[test]
    fn test_validate_pattern() {
        let spec = spec(vec![(
            "sort",
            QueryParam::new().validate(Validate::pattern("^(asc|desc)$").unwrap()),
        )]);
        assert!(compile_query_params(&spec, &raw(&[("sort", "asc")])).is_ok());
        let err = compile_query_params(&spec, &raw(&[("sort", "up")])).unwrap_err();
        assert_eq!(err.kind, HttpErrorKind::BadRequest);
    }

    #[test]
    fn test_validate_function() {
        let spec = spec(vec![(
            "limit",
            QueryParam::new()
                .validate(Validate::function(|v| v.len() <= 3))
                .of_type(ParamType::Number),
        )]);
        let params = compile_query_params(&spec, &raw(&[("limit", "50")])).unwrap();
        assert_eq!(params.get("limit"), Some(&Value::from(50)));
        assert!(compile_query_params(&spec, &raw(&[("limit", "5000")])).is_err());
    }

    #[test]
    fn test_coercion_failure_is_bad_request() {
        let spec = spec(vec![("flag", QueryParam::new().of_type(ParamType::Boolean))]);
        let params = compile_query_params(&spec, &raw(&[("flag", "true")])).unwrap();
        assert_eq!(params.get("flag"), Some(&Value::Bool(true)));
        assert!(compile_query_params(&spec, &raw(&[("flag", "perhaps")])).is_err());
    }

    #[test]
    fn test_undeclared_pass_through() {
        let params = compile_query_params(&BTreeMap::new(), &raw(&[("x", "1")])).unwrap();
        assert_eq!(params.get_str("x"), Some("1"));
    }
}
