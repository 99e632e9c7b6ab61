// src/evaluator/structure.rs — Regex, shape and length checks

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use super::{EvalContext, EvalResult, Evaluator};
use crate::infra::errors::ProbeError;

/// Passes when `pattern` matches anywhere in the output (search, not anchored).
#[derive(Debug, Clone)]
pub struct RegexMatch {
    pattern: Regex,
}

impl RegexMatch {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn check(&self, output: &str) -> EvalResult {
        let pattern = self.pattern.as_str();
        if self.pattern.is_match(output) {
            EvalResult::pass(format!("regex pattern {pattern} found in output"))
        } else {
            EvalResult::fail(format!("regex pattern {pattern} not found in output"))
        }
    }
}

#[async_trait]
impl Evaluator for RegexMatch {
    fn name(&self) -> &str {
        "regex"
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        Ok(self.check(output))
    }
}

/// Fixed-pattern structural checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    IsJson,
    ContainsJson,
    IsEmail,
    ContainsEmail,
    IsPhoneNumber,
    ContainsPhoneNumber,
    ContainsCreditCardNumber,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::IsJson => "is_json",
            Shape::ContainsJson => "contains_json",
            Shape::IsEmail => "is_email",
            Shape::ContainsEmail => "contains_email",
            Shape::IsPhoneNumber => "is_phone_number",
            Shape::ContainsPhoneNumber => "contains_phone_number",
            Shape::ContainsCreditCardNumber => "contains_credit_card_number",
        }
    }
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

static_regex!(email_exact, r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$");
static_regex!(email_anywhere, r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+");
static_regex!(phone_exact, r"^\+?1?\d{9,15}$");
static_regex!(
    phone_anywhere,
    r"\+?\d{1,3}[-\s]?\(?\d{3}\)?[-\s]?\d{3}[-\s]?\d{2,4}|\(\d{3}\)\s?\d{3}[-\s]?\d{4}"
);
static_regex!(credit_card, r"\b(?:\d[ -]*?){13,16}\b");
static_regex!(json_block, r"(?s)^\{.*\}$|^\[.*\]$");

#[derive(Debug, Clone, Copy)]
pub struct ShapeCheck(pub Shape);

impl ShapeCheck {
    pub fn check(&self, output: &str) -> EvalResult {
        let (passed, yes, no) = match self.0 {
            Shape::IsJson => (
                serde_json::from_str::<serde_json::Value>(output).is_ok(),
                "output is valid json",
                "output is not valid json",
            ),
            Shape::ContainsJson => (
                json_block().is_match(output.trim()),
                "Output contains JSON",
                "Output does not contain JSON",
            ),
            Shape::IsEmail => (
                email_exact().is_match(output),
                "output is an email address",
                "output is not an email address",
            ),
            Shape::ContainsEmail => (
                email_anywhere().is_match(output),
                "email address found in output",
                "no email address found in output",
            ),
            Shape::IsPhoneNumber => (
                phone_exact().is_match(output),
                "output is a phone number",
                "output is not a phone number",
            ),
            Shape::ContainsPhoneNumber => (
                phone_anywhere().is_match(output),
                "phone number found in output",
                "no phone number found in output",
            ),
            Shape::ContainsCreditCardNumber => (
                credit_card().is_match(output),
                "credit card number found in output",
                "no credit card number found in output",
            ),
        };
        EvalResult::from_verdict(passed, if passed { yes } else { no })
    }
}

#[async_trait]
impl Evaluator for ShapeCheck {
    fn name(&self) -> &str {
        self.0.name()
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        Ok(self.check(output))
    }
}

/// Strict bound on the output's length in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthBound {
    LessThan(usize),
    GreaterThan(usize),
}

impl LengthBound {
    pub fn check(&self, output: &str) -> EvalResult {
        let len = output.chars().count();
        match *self {
            LengthBound::LessThan(max) if len < max => {
                EvalResult::pass(format!("output length is less than {max} characters"))
            }
            LengthBound::LessThan(max) => EvalResult::fail(format!(
                "output length is {len}, not less than {max} characters"
            )),
            LengthBound::GreaterThan(min) if len > min => {
                EvalResult::pass(format!("output length is greater than {min} characters"))
            }
            LengthBound::GreaterThan(min) => EvalResult::fail(format!(
                "output length is {len}, not greater than {min} characters"
            )),
        }
    }
}

#[async_trait]
impl Evaluator for LengthBound {
    fn name(&self) -> &str {
        match self {
            LengthBound::LessThan(_) => "length_less_than",
            LengthBound::GreaterThan(_) => "length_greater_than",
        }
    }

    async fn evaluate(&self, output: &str, _ctx: &EvalContext) -> Result<EvalResult, ProbeError> {
        Ok(self.check(output))
    }
}
