//! Parameter schemas and the live value map for a single effect.
//!
//! Types:
//! - `ParamSpec`: numeric range or boolean schema for one parameter.
//! - `ParamDef`: a named, labelled `ParamSpec` with optional choice names.
//! - `ParamValue`: the current value of one parameter.
//! - `ParameterValues`: every value of the currently selected effect.
//! - `ParamError`: lookup and kind failures.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::{EffectDescriptor, EffectId};

/// Schema of one effect parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParamSpec {
    Number {
        min: f32,
        max: f32,
        step: f32,
        default: f32,
        decimals: u8,
    },
    Boolean {
        default: bool,
    },
}

impl ParamSpec {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamSpec::Number { .. } => ParamKind::Number,
            ParamSpec::Boolean { .. } => ParamKind::Boolean,
        }
    }

    pub fn default_value(&self) -> ParamValue {
        match *self {
            ParamSpec::Number { default, .. } => ParamValue::Number(default),
            ParamSpec::Boolean { default } => ParamValue::Boolean(default),
        }
    }

    /// Renders a value with the declared number of decimals.
    pub fn format(&self, value: ParamValue) -> String {
        match (self, value) {
            (ParamSpec::Number { decimals, .. }, ParamValue::Number(v)) => {
                format!("{:.*}", usize::from(*decimals), v)
            }
            (_, ParamValue::Boolean(b)) => if b { "on" } else { "off" }.to_string(),
            (ParamSpec::Boolean { .. }, ParamValue::Number(v)) => format!("{v}"),
        }
    }

    /// Parses textual input (CLI, preference overrides) against this schema.
    pub fn parse(&self, key: &str, text: &str) -> Result<ParamValue, ParamError> {
        let trimmed = text.trim();
        match self {
            ParamSpec::Number { .. } => trimmed
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(ParamValue::Number)
                .ok_or_else(|| ParamError::InvalidValue {
                    key: key.to_string(),
                    value: trimmed.to_string(),
                }),
            ParamSpec::Boolean { .. } => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(ParamValue::Boolean(true)),
                "false" | "off" | "no" | "0" => Ok(ParamValue::Boolean(false)),
                _ => Err(ParamError::InvalidValue {
                    key: key.to_string(),
                    value: trimmed.to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Boolean,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Number => f.write_str("number"),
            ParamKind::Boolean => f.write_str("boolean"),
        }
    }
}

/// One entry in an effect's ordered parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDef {
    pub key: &'static str,
    pub label: &'static str,
    pub spec: ParamSpec,
    /// Names for each integral value of an enumerated numeric parameter.
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
}

impl ParamDef {
    pub const fn number(
        key: &'static str,
        label: &'static str,
        min: f32,
        max: f32,
        step: f32,
        default: f32,
        decimals: u8,
    ) -> Self {
        Self {
            key,
            label,
            spec: ParamSpec::Number {
                min,
                max,
                step,
                default,
                decimals,
            },
            choices: &[],
        }
    }

    pub const fn boolean(key: &'static str, label: &'static str, default: bool) -> Self {
        Self {
            key,
            label,
            spec: ParamSpec::Boolean { default },
            choices: &[],
        }
    }

    pub const fn with_choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    /// Returns the choice name for `value`, if this parameter is enumerated.
    pub fn choice_label(&self, value: ParamValue) -> Option<&'static str> {
        let ParamValue::Number(v) = value else {
            return None;
        };
        if v < 0.0 {
            return None;
        }
        self.choices.get(v.round() as usize).copied()
    }

    /// Formats the value, appending the choice name when there is one.
    pub fn describe(&self, value: ParamValue) -> String {
        let formatted = self.spec.format(value);
        match self.choice_label(value) {
            Some(choice) => format!("{formatted} ({choice})"),
            None => formatted,
        }
    }
}

fn no_choices(choices: &&'static [&'static str]) -> bool {
    choices.is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f32),
    Boolean(bool),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Number(_) => ParamKind::Number,
            ParamValue::Boolean(_) => ParamKind::Boolean,
        }
    }

    /// Uniform encoding: numbers as-is, booleans as 1.0 / 0.0.
    pub fn as_f32(&self) -> f32 {
        match *self {
            ParamValue::Number(v) => v,
            ParamValue::Boolean(true) => 1.0,
            ParamValue::Boolean(false) => 0.0,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParamError {
    #[error("unknown effect `{0}`")]
    UnknownEffect(String),
    #[error("effect `{effect}` has no parameter `{key}`")]
    UnknownParameter { effect: EffectId, key: String },
    #[error("parameter `{key}` expects a {expected} value, got a {found} value")]
    KindMismatch {
        key: String,
        expected: ParamKind,
        found: ParamKind,
    },
    #[error("`{value}` is not a valid value for parameter `{key}`")]
    InvalidValue { key: String, value: String },
}

/// Current values for the parameters of one effect.
///
/// Replaced wholesale when the effect changes; individual entries change on
/// edits. Every declared parameter always has a value.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValues {
    effect: EffectId,
    values: BTreeMap<String, ParamValue>,
}

impl ParameterValues {
    pub fn defaults_for(descriptor: &EffectDescriptor) -> Self {
        let values = descriptor
            .params
            .iter()
            .map(|def| (def.key.to_string(), def.spec.default_value()))
            .collect();
        Self {
            effect: descriptor.id,
            values,
        }
    }

    pub fn effect(&self) -> EffectId {
        self.effect
    }

    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.values.get(key).copied()
    }

    /// Sets a value, clamping numbers into the declared range.
    ///
    /// Returns the value actually stored.
    pub fn set(&mut self, key: &str, value: ParamValue) -> Result<ParamValue, ParamError> {
        let def = self.definition(key)?;
        let stored = match (def.spec, value) {
            (ParamSpec::Number { min, max, .. }, ParamValue::Number(v)) => {
                if !v.is_finite() {
                    return Err(ParamError::InvalidValue {
                        key: key.to_string(),
                        value: v.to_string(),
                    });
                }
                ParamValue::Number(v.clamp(min, max))
            }
            (ParamSpec::Boolean { .. }, ParamValue::Boolean(b)) => ParamValue::Boolean(b),
            (spec, value) => {
                return Err(ParamError::KindMismatch {
                    key: key.to_string(),
                    expected: spec.kind(),
                    found: value.kind(),
                })
            }
        };
        self.values.insert(def.key.to_string(), stored);
        Ok(stored)
    }

    /// Parses `text` against the parameter's schema and stores it.
    pub fn set_from_str(&mut self, key: &str, text: &str) -> Result<ParamValue, ParamError> {
        let def = self.definition(key)?;
        let value = def.spec.parse(key, text)?;
        self.set(key, value)
    }

    /// Nudges a numeric value by `direction` steps, or toggles a boolean.
    pub fn step(&mut self, key: &str, direction: i32) -> Result<ParamValue, ParamError> {
        let def = self.definition(key)?;
        let current = self.get(key).unwrap_or_else(|| def.spec.default_value());
        let next = match (def.spec, current) {
            (ParamSpec::Number { step, .. }, ParamValue::Number(v)) => {
                ParamValue::Number(v + step * direction as f32)
            }
            (_, ParamValue::Boolean(b)) if direction != 0 => ParamValue::Boolean(!b),
            (_, other) => other,
        };
        self.set(key, next)
    }

    /// Values in the effect's declared parameter order.
    pub fn ordered(&self) -> impl Iterator<Item = (&'static ParamDef, ParamValue)> + '_ {
        self.effect.descriptor().params.iter().map(move |def| {
            let value = self
                .values
                .get(def.key)
                .copied()
                .unwrap_or_else(|| def.spec.default_value());
            (def, value)
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn definition(&self, key: &str) -> Result<&'static ParamDef, ParamError> {
        self.effect
            .descriptor()
            .param(key)
            .ok_or_else(|| ParamError::UnknownParameter {
                effect: self.effect,
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halftone() -> ParameterValues {
        ParameterValues::defaults_for(EffectId::Halftone.descriptor())
    }

    #[test]
    fn defaults_cover_every_declared_parameter() {
        let values = halftone();
        assert_eq!(values.effect(), EffectId::Halftone);
        assert_eq!(values.len(), 4);
        assert_eq!(values.get("dotRadius"), Some(ParamValue::Number(10.0)));
        assert_eq!(values.get("colorMode"), Some(ParamValue::Boolean(true)));
    }

    #[test]
    fn set_clamps_numbers_into_range() {
        let mut values = halftone();
        assert_eq!(
            values.set("angle", ParamValue::Number(400.0)),
            Ok(ParamValue::Number(90.0))
        );
        assert_eq!(
            values.set("dotRadius", ParamValue::Number(-3.0)),
            Ok(ParamValue::Number(1.0))
        );
    }

    #[test]
    fn set_rejects_unknown_keys_and_kind_mismatches() {
        let mut values = halftone();
        assert!(matches!(
            values.set("pixelSize", 4.0.into()),
            Err(ParamError::UnknownParameter { .. })
        ));
        assert!(matches!(
            values.set("colorMode", 1.0.into()),
            Err(ParamError::KindMismatch {
                expected: ParamKind::Boolean,
                found: ParamKind::Number,
                ..
            })
        ));
        assert!(matches!(
            values.set("angle", f32::NAN.into()),
            Err(ParamError::InvalidValue { .. })
        ));
        assert_eq!(values, halftone());
    }

    #[test]
    fn step_moves_by_declared_step_and_toggles_booleans() {
        let mut values = halftone();
        assert_eq!(values.step("dotRadius", 1), Ok(ParamValue::Number(10.5)));
        assert_eq!(values.step("dotRadius", -2), Ok(ParamValue::Number(9.5)));
        assert_eq!(values.step("colorMode", 1), Ok(ParamValue::Boolean(false)));
        assert_eq!(values.step("shapeType", -1), Ok(ParamValue::Number(0.0)));
    }

    #[test]
    fn set_from_str_parses_against_schema() {
        let mut values = halftone();
        assert_eq!(
            values.set_from_str("colorMode", "off"),
            Ok(ParamValue::Boolean(false))
        );
        assert_eq!(
            values.set_from_str("angle", " 30 "),
            Ok(ParamValue::Number(30.0))
        );
        assert!(values.set_from_str("angle", "steep").is_err());
    }

    #[test]
    fn ordered_follows_declaration_not_key_order() {
        let values = halftone();
        let keys: Vec<_> = values.ordered().map(|(def, _)| def.key).collect();
        assert_eq!(keys, ["dotRadius", "angle", "colorMode", "shapeType"]);
    }

    #[test]
    fn describe_uses_decimals_and_choices() {
        let descriptor = EffectId::Halftone.descriptor();
        let radius = descriptor.param("dotRadius").unwrap();
        assert_eq!(radius.describe(ParamValue::Number(7.26)), "7.3");
        let shape = descriptor.param("shapeType").unwrap();
        assert_eq!(shape.describe(ParamValue::Number(2.0)), "2 (Triangle)");
        let color = descriptor.param("colorMode").unwrap();
        assert_eq!(color.describe(ParamValue::Boolean(true)), "on");
    }
}
