//! Coarse runtime parameter schemas
//!
//! Contract authors describe action parameters with five coarse classes.
//! Validation happens at invocation time against untyped JSON bags and
//! collects every violation instead of failing on the first one, so a
//! single failure result can name all offending fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ContractError;

/// Coarse runtime parameter classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Any JSON string
    String,
    /// Any JSON number
    Number,
    /// JSON true/false
    Boolean,
    /// String holding a hyphenated UUID
    Uuid,
    /// String holding an RFC 3339 datetime
    DateTime,
}

impl ParamType {
    /// Type name as contract authors write it
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Uuid => "uuid",
            ParamType::DateTime => "datetime",
        }
    }

    /// Check a JSON value against this class
    #[must_use]
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Uuid => value
                .as_str()
                .is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
            ParamType::DateTime => value
                .as_str()
                .is_some_and(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok()),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamType {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(ParamType::String),
            "number" => Ok(ParamType::Number),
            "boolean" => Ok(ParamType::Boolean),
            "uuid" => Ok(ParamType::Uuid),
            "datetime" => Ok(ParamType::DateTime),
            other => Err(ContractError::UnknownParamType(other.to_string())),
        }
    }
}

/// Type and requiredness of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Coarse runtime class
    pub param_type: ParamType,
    /// Whether the parameter may be omitted
    pub optional: bool,
}

impl ParamSpec {
    /// Required parameter of the given class
    #[inline]
    #[must_use]
    pub fn required(param_type: ParamType) -> Self {
        Self {
            param_type,
            optional: false,
        }
    }

    /// Optional parameter of the given class
    #[inline]
    #[must_use]
    pub fn optional(param_type: ParamType) -> Self {
        Self {
            param_type,
            optional: true,
        }
    }

    /// Parse the author notation: a type name with a trailing `?`
    /// marking the parameter optional (`"datetime?"`)
    pub fn parse(notation: &str) -> Result<Self, ContractError> {
        match notation.strip_suffix('?') {
            Some(base) => Ok(Self::optional(base.parse()?)),
            None => Ok(Self::required(notation.parse()?)),
        }
    }
}

/// A single validation violation against a parameter bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamViolation {
    /// Required parameter absent from the bag
    MissingRequired {
        /// Parameter name
        name: String,
    },
    /// Present but the wrong coarse class
    WrongType {
        /// Parameter name
        name: String,
        /// Expected class
        expected: ParamType,
    },
    /// Bag itself is not a JSON object
    NotAnObject,
}

impl std::fmt::Display for ParamViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamViolation::MissingRequired { name } => {
                write!(f, "missing required param '{}'", name)
            }
            ParamViolation::WrongType { name, expected } => {
                write!(f, "param '{}' is not a valid {}", name, expected)
            }
            ParamViolation::NotAnObject => f.write_str("params must be an object"),
        }
    }
}

/// Render violations as the single comma-joined failure message
#[must_use]
pub fn join_violations(violations: &[ParamViolation]) -> String {
    let parts: Vec<String> = violations.iter().map(ToString::to_string).collect();
    format!("Validation failed: {}", parts.join(", "))
}

/// Ordered parameter schema for one action or event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSchema {
    params: IndexMap<String, ParamSpec>,
}

impl ParamSchema {
    /// Empty schema (accepts any bag that is an object)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required parameter
    #[inline]
    #[must_use]
    pub fn required(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params
            .insert(name.into(), ParamSpec::required(param_type));
        self
    }

    /// Add an optional parameter
    #[inline]
    #[must_use]
    pub fn optional(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.params
            .insert(name.into(), ParamSpec::optional(param_type));
        self
    }

    /// Build from author notation pairs
    ///
    /// ```
    /// use opal_contract::ParamSchema;
    ///
    /// let schema = ParamSchema::parse([
    ///     ("title", "string"),
    ///     ("starts_at", "datetime?"),
    /// ]).unwrap();
    /// assert_eq!(schema.len(), 2);
    /// ```
    pub fn parse<'a, I>(pairs: I) -> Result<Self, ContractError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut schema = Self::new();
        for (name, notation) in pairs {
            schema
                .params
                .insert(name.to_string(), ParamSpec::parse(notation)?);
        }
        Ok(schema)
    }

    /// Number of declared parameters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the schema declares no parameters
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Look up a declared parameter
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    /// Iterate declared parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamSpec)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Validate an untyped parameter bag, collecting every violation
    ///
    /// Undeclared keys in the bag are ignored; `null` counts as absent.
    ///
    /// # Errors
    /// Returns the full violation list when the bag is not an object,
    /// a required parameter is missing, or a value has the wrong class.
    pub fn validate(&self, bag: &serde_json::Value) -> Result<(), Vec<ParamViolation>> {
        let Some(obj) = bag.as_object() else {
            return Err(vec![ParamViolation::NotAnObject]);
        };

        let mut violations = Vec::new();
        for (name, spec) in &self.params {
            match obj.get(name) {
                None | Some(serde_json::Value::Null) => {
                    if !spec.optional {
                        violations.push(ParamViolation::MissingRequired { name: name.clone() });
                    }
                }
                Some(value) => {
                    if !spec.param_type.matches(value) {
                        violations.push(ParamViolation::WrongType {
                            name: name.clone(),
                            expected: spec.param_type,
                        });
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
