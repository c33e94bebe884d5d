//! Calculator tool: evaluates arithmetic expressions.
//!
//! Operators `+ - * / % ^` with the usual precedence (`^` binds tightest and
//! associates right, so `-2^2` is `-4`), parentheses, the constants `pi` and
//! `e`, and single-argument functions such as `sqrt(2)`.

use agentloop_core::error::ToolError;
use agentloop_core::tool::Tool;
use async_trait::async_trait;

use crate::required_str;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Useful for getting the result of a math expression. The input to this tool should be \
         a valid mathematical expression that could be executed by a simple calculator."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["input"]
        })
    }

    async fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let expr = required_str(&arguments, "input")?;
        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;
        Ok(format_number(value))
    }
}

/// Drop the fractional part when the value is a whole number.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr(0)?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected {tok:?} at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == '_' {
                        if d != '_' {
                            literal.push(d);
                        }
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Num(n));
            }
            c if c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() {
                        name.push(d.to_ascii_lowercase());
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }

    Ok(tokens)
}

const PREFIX_BP: u8 = 5;

/// Deepest nesting of parentheses, prefix signs, calls and `^` chains.
const MAX_DEPTH: usize = 64;

/// Left and right binding power of an infix operator.
fn infix_bp(op: char) -> (u8, u8) {
    match op {
        '+' | '-' => (1, 2),
        '*' | '/' | '%' => (3, 4),
        // right-associative
        _ => (7, 6),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect_rparen(&mut self) -> Result<(), String> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => Err("Missing closing parenthesis".into()),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let value = self.expr_bp(min_bp);
        self.depth -= 1;
        value
    }

    fn expr_bp(&mut self, min_bp: u8) -> Result<f64, String> {
        let mut lhs = match self.next() {
            Some(Token::Num(n)) => n,
            Some(Token::Op('-')) => -self.expr(PREFIX_BP)?,
            Some(Token::Op('+')) => self.expr(PREFIX_BP)?,
            Some(Token::LParen) => {
                let inner = self.expr(0)?;
                self.expect_rparen()?;
                inner
            }
            Some(Token::Ident(name)) => self.ident(&name)?,
            Some(tok) => return Err(format!("Unexpected {tok:?}")),
            None => return Err("Unexpected end of expression".into()),
        };

        loop {
            let op = match self.tokens.get(self.pos) {
                Some(Token::Op(op)) => *op,
                Some(Token::RParen) | None => break,
                Some(tok) => return Err(format!("Expected an operator, found {tok:?}")),
            };
            let (l_bp, r_bp) = infix_bp(op);
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(r_bp)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }

    fn ident(&mut self, name: &str) -> Result<f64, String> {
        match name {
            "pi" => return Ok(std::f64::consts::PI),
            "e" => return Ok(std::f64::consts::E),
            _ => {}
        }

        let func: fn(f64) -> f64 = match name {
            "sqrt" => f64::sqrt,
            "abs" => f64::abs,
            "ln" => f64::ln,
            "log" => f64::log10,
            "exp" => f64::exp,
            "sin" => f64::sin,
            "cos" => f64::cos,
            "tan" => f64::tan,
            "round" => f64::round,
            "floor" => f64::floor,
            "ceil" => f64::ceil,
            _ => return Err(format!("Unknown name: {name}")),
        };

        if self.next() != Some(Token::LParen) {
            return Err(format!("Expected '(' after {name}"));
        }
        let arg = self.expr(0)?;
        self.expect_rparen()?;
        Ok(func(arg))
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' | '%' if rhs == 0.0 => Err("Division by zero".into()),
        '/' => Ok(lhs / rhs),
        '%' => Ok(lhs % rhs),
        '^' => Ok(lhs.powf(rhs)),
        other => Err(format!("Unknown operator: {other}")),
    }
}
