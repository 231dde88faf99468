//! The comparison DSL evaluated against captured node content.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConditionDefinition;
use crate::error::{Result, StakeoutError};

/// Which capture of a node a condition evaluates: its text or its inner HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InspectContext {
    #[default]
    #[serde(alias = "text")]
    Text,
    #[serde(alias = "html")]
    Html,
}

/// Comparison operators understood by node conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Substring containment.
    Inc,
}

impl ComparisonOperator {
    fn compare_f64(self, left: f64, right: f64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            // Containment over numbers compares their decimal string forms.
            Self::Inc => left.to_string().contains(&right.to_string()),
        }
    }

    fn compare_str(self, left: &str, right: &str) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Inc => left.contains(right),
        }
    }
}

/// A condition operand: a number or a string, as written in the watch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Number(f64),
    Text(String),
}

/// A compiled regular-expression rule with its original pattern and flags.
///
/// Flags follow the watch-file convention: `i`, `m`, and `s` map to the
/// corresponding inline flags, `g`/`u`/`y` are accepted no-ops (a rule is
/// tested once per capture), anything else is a configuration error.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
    pattern: String,
    flags: String,
}

impl MatchRule {
    pub fn compile(pattern: &str, flags: &str) -> Result<Self> {
        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'i' | 'm' | 's' => inline.push(flag),
                'g' | 'u' | 'y' => {}
                other => {
                    return Err(StakeoutError::Config(format!(
                        "unsupported flag '{other}' in match /{pattern}/{flags}"
                    )));
                }
            }
        }
        let full = if inline.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{inline}){pattern}")
        };
        let regex = Regex::new(&full).map_err(|e| {
            StakeoutError::Config(format!("invalid match pattern /{pattern}/{flags}: {e}"))
        })?;
        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            flags: flags.to_string(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl std::fmt::Display for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

/// One node condition: an operator comparison, a regex match, a change
/// trigger, or bare selector presence, optionally negated.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub operator: Option<ComparisonOperator>,
    pub operand: Option<Operand>,
    pub negated: bool,
    pub match_rule: Option<MatchRule>,
    pub any_change: bool,
    pub case_sensitive: bool,
}

impl Condition {
    /// Compile a condition from its watch-file definition.
    pub fn from_definition(def: &ConditionDefinition) -> Result<Self> {
        let match_rule = match &def.match_pattern {
            Some(parts) => match parts.as_slice() {
                [pattern] => Some(MatchRule::compile(pattern, "")?),
                [pattern, flags] => Some(MatchRule::compile(pattern, flags)?),
                _ => {
                    return Err(StakeoutError::Config(
                        "match must be [pattern] or [pattern, flags]".to_string(),
                    ));
                }
            },
            None => None,
        };
        Ok(Self {
            operator: def.operator,
            operand: def.operand.clone(),
            negated: def.negated,
            match_rule,
            any_change: def.any_change,
            case_sensitive: def.case_sensitive,
        })
    }

    /// Evaluate the non-change part of the condition against a captured
    /// evaluatee, negation applied. The operator path runs only when both
    /// operator and operand are configured; otherwise the match rule is
    /// consulted; otherwise bare presence decides.
    pub fn verdict(&self, evaluatee: &str) -> bool {
        self.negated != self.raw_verdict(evaluatee)
    }

    fn raw_verdict(&self, evaluatee: &str) -> bool {
        if let (Some(operator), Some(operand)) = (self.operator, &self.operand) {
            return match operand {
                Operand::Number(number) => operator.compare_f64(coerce_numeric(evaluatee), *number),
                Operand::Text(text) => {
                    if self.case_sensitive {
                        operator.compare_str(evaluatee, text)
                    } else {
                        operator.compare_str(&evaluatee.to_lowercase(), &text.to_lowercase())
                    }
                }
            };
        }
        if let Some(rule) = &self.match_rule {
            return rule.is_match(evaluatee);
        }
        true
    }
}

/// Permissive numeric extraction: strip every character that is not a digit
/// or `.`, then parse the remainder as `f64`.
///
/// `"$123,456.789"` coerces to `123456.789`. An empty remainder coerces to
/// zero. An unparseable remainder (for example `"1.2.3"`) coerces to NaN,
/// which fails `eq` and every ordered comparison and passes `ne`.
pub fn coerce_numeric(text: &str) -> f64 {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if digits.is_empty() {
        0.0
    } else {
        digits.parse().unwrap_or(f64::NAN)
    }
}
