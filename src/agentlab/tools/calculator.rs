//! # Calculator Tool
//!
//! Evaluates plain arithmetic for LLM agents.
//!
//! Input is restricted to digits, `+ - * / . ( )` and spaces.  Anything else is rejected
//! before evaluation, so no identifiers, function calls or variables can ever reach the
//! evaluator.  The accepted characters are tokenized, parsed with standard precedence and
//! re-emitted as a fully parenthesized `evalexpr` expression:
//!
//! - `**` is right-associative exponentiation and binds tighter than unary minus on its left
//!   (`-2 ** 2 == -4`).  It is evaluated by a context function so that integer powers stay
//!   exact; `//` is rejected.
//! - An expression with no `/` and no decimal literal is evaluated in integer arithmetic and
//!   reports type `"int"`.
//! - Any `/` or decimal literal promotes every literal to floating point (`"float"`).
//!
//! ```rust
//! use agentlab::tools::calculator::{Calculator, Number};
//!
//! let calc = Calculator::new();
//! assert_eq!(calc.evaluate("2 + 3 * 4").unwrap(), Number::Int(14));
//! assert_eq!(calc.evaluate("7 / 2").unwrap(), Number::Float(3.5));
//! assert_eq!(calc.evaluate("2 ** 3 ** 2").unwrap(), Number::Int(512));
//! assert!(calc.evaluate("import os").is_err());
//! ```

use crate::agentlab::tool_protocol::{
    parse_params, ToolError, ToolMetadata, ToolParameter, ToolParameterType,
};
use evalexpr::{ContextWithMutableFunctions, EvalexprError, Function, HashMapContext, Value};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::error::Error;
use std::fmt;

pub const TOOL_NAME: &str = "calculator";

const ALLOWED_CHARS: &str = "0123456789+-*/.() ";

/// Error type for calculator operations
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorError {
    message: String,
}

impl CalculatorError {
    pub fn new(message: impl Into<String>) -> Self {
        CalculatorError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CalculatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Calculator error: {}", self.message)
    }
}

impl Error for CalculatorError {}

impl From<CalculatorError> for ToolError {
    fn from(err: CalculatorError) -> Self {
        ToolError::ExecutionFailed(err.to_string())
    }
}

/// A calculator result together with its numeric kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn type_name(&self) -> &'static str {
        match self {
            Number::Int(_) => "int",
            Number::Float(_) => "float",
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Number::Int(i) => json!(i),
            Number::Float(f) => json!(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(String),
    Float(String),
    Op(&'static str),
    Open,
    Close,
}

/// Split a whitelisted expression into tokens.
fn tokenize(expression: &str) -> Result<Vec<Token>, CalculatorError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(number_token(&literal)?);
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Op("**"));
                i += 2;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                return Err(CalculatorError::new(
                    "floor division '//' is not supported",
                ));
            }
            '+' => {
                tokens.push(Token::Op("+"));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Op("-"));
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op("*"));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op("/"));
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            _ => {
                return Err(CalculatorError::new(
                    "expression contains disallowed characters",
                ))
            }
        }
    }
    Ok(tokens)
}

fn number_token(literal: &str) -> Result<Token, CalculatorError> {
    match literal.matches('.').count() {
        0 => Ok(Token::Int(literal.to_string())),
        1 if literal != "." => {
            let mut normalized = String::with_capacity(literal.len() + 2);
            if literal.starts_with('.') {
                normalized.push('0');
            }
            normalized.push_str(literal);
            if literal.ends_with('.') {
                normalized.push('0');
            }
            Ok(Token::Float(normalized))
        }
        _ => Err(CalculatorError::new(format!(
            "invalid number literal '{}'",
            literal
        ))),
    }
}

/// Recursive-descent parser that re-emits tokens as an `evalexpr` expression.
///
/// ```text
/// expression := term (("+" | "-") term)*
/// term       := unary (("*" | "/") unary)*
/// unary      := ("-" | "+") unary | power
/// power      := primary ("**" unary)?
/// primary    := number | "(" expression ")"
/// ```
struct Renderer<'a> {
    tokens: &'a [Token],
    pos: usize,
    float_mode: bool,
}

impl<'a> Renderer<'a> {
    fn render(tokens: &'a [Token], float_mode: bool) -> Result<String, CalculatorError> {
        let mut renderer = Renderer {
            tokens,
            pos: 0,
            float_mode,
        };
        let rendered = renderer.expression()?;
        if renderer.pos < tokens.len() {
            return Err(CalculatorError::new("unexpected token in expression"));
        }
        Ok(rendered)
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn expression(&mut self) -> Result<String, CalculatorError> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.term()?;
            lhs = format!("({} {} {})", lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<String, CalculatorError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.unary()?;
            lhs = format!("({} {} {})", lhs, op, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<String, CalculatorError> {
        match self.eat_op(&["-", "+"]) {
            Some("-") => Ok(format!("(-{})", self.unary()?)),
            Some(_) => self.unary(),
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<String, CalculatorError> {
        let base = self.primary()?;
        if self.eat_op(&["**"]).is_some() {
            let exponent = self.unary()?;
            return Ok(format!("(pow({}, {}))", base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<String, CalculatorError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| CalculatorError::new("unexpected end of expression"))?;
        self.pos += 1;
        match token {
            Token::Int(digits) if self.float_mode => Ok(format!("{}.0", digits)),
            Token::Int(digits) | Token::Float(digits) => Ok(digits.clone()),
            Token::Open => {
                let inner = self.expression()?;
                match self.tokens.get(self.pos) {
                    Some(Token::Close) => {
                        self.pos += 1;
                        Ok(format!("({})", inner))
                    }
                    _ => Err(CalculatorError::new("unbalanced parentheses")),
                }
            }
            Token::Close | Token::Op(_) => {
                Err(CalculatorError::new("unexpected token in expression"))
            }
        }
    }
}

/// `pow(base, exponent)`: exact for integers, `powf` once either side is a float.
///
/// A negative integer exponent yields a float.
fn checked_power(argument: &Value) -> Result<Value, EvalexprError> {
    let arguments = argument.as_fixed_len_tuple(2)?;
    match (&arguments[0], &arguments[1]) {
        (Value::Int(base), Value::Int(exponent)) if *exponent >= 0 => {
            let exponent = u32::try_from(*exponent)
                .map_err(|_| EvalexprError::CustomMessage("exponent is too large".into()))?;
            base.checked_pow(exponent).map(Value::Int).ok_or_else(|| {
                EvalexprError::CustomMessage(format!(
                    "integer overflow in {} ** {}",
                    base, exponent
                ))
            })
        }
        (base, exponent) => Ok(Value::Float(base.as_number()?.powf(exponent.as_number()?))),
    }
}

/// Stateless arithmetic evaluator.
#[derive(Debug, Clone, Default)]
pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Calculator
    }

    /// Evaluate `expression` with standard operator precedence.
    pub fn evaluate(&self, expression: &str) -> Result<Number, CalculatorError> {
        if !expression.chars().all(|c| ALLOWED_CHARS.contains(c)) {
            return Err(CalculatorError::new(
                "expression contains disallowed characters",
            ));
        }
        if expression.trim().is_empty() {
            return Err(CalculatorError::new("expression is empty"));
        }

        let tokens = tokenize(expression)?;
        let float_mode = tokens
            .iter()
            .any(|t| matches!(t, Token::Float(_) | Token::Op("/")));
        let prepared = Renderer::render(&tokens, float_mode)?;

        let mut context: HashMapContext = HashMapContext::new();
        context
            .set_function("pow".to_string(), Function::new(checked_power))
            .map_err(|e| CalculatorError::new(format!("Evaluation error: {}", e)))?;

        let value = evalexpr::eval_with_context(&prepared, &context)
            .map_err(|e| CalculatorError::new(format!("Evaluation error: {}", e)))?;

        let number = match value {
            Value::Int(i) if float_mode => Number::Float(i as f64),
            Value::Int(i) => Number::Int(i),
            Value::Float(f) => Number::Float(f),
            _ => return Err(CalculatorError::new("Result is not a number")),
        };

        if let Number::Float(f) = number {
            if !f.is_finite() {
                return Err(CalculatorError::new("result is not a finite number"));
            }
        }
        Ok(number)
    }
}

pub fn metadata() -> ToolMetadata {
    ToolMetadata::new(TOOL_NAME, "Evaluate a basic arithmetic expression").with_parameter(
        ToolParameter::new("expression", ToolParameterType::String)
            .with_description("Arithmetic expression, e.g. '2 + 3 * 4'")
            .required(),
    )
}

#[derive(Deserialize)]
struct CalculatorParams {
    expression: String,
}

/// Tool body: `{expression}` → `{expression, result, type}`.
pub fn calculator(parameters: JsonValue) -> Result<JsonValue, ToolError> {
    let params: CalculatorParams = parse_params(parameters)?;
    let number = Calculator::new().evaluate(&params.expression)?;
    Ok(json!({
        "expression": params.expression,
        "result": number.to_json(),
        "type": number.type_name(),
    }))
}
