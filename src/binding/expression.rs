//! Binding expressions.
//!
//! Expressions are property paths over the binding context:
//!
//! ```text
//! expr    := primary ( '.' ident | '[' expr ']' )*
//! primary := ident | number | 'string' | "string"
//!          | true | false | null | undefined | '(' expr ')'
//! ```
//!
//! Identifiers resolve against the context names first (`$data`, `$parent`,
//! `$parents`, `$root`, `$rawData`, `$context`), then against properties of
//! `$data`. Member access reads through observables (tracked), so a region
//! watching `$parent.item` re-evaluates when the parent's observable changes.
//!
//! The final value is NOT unwrapped: `with: item` hands the observable itself
//! to the region, which needs it for `$rawData`.

use std::fmt;

use super::context::BindingContext;
use crate::engine::BindError;
use crate::types::Value;

// =============================================================================
// AST
// =============================================================================

#[derive(Clone, Debug)]
enum Node {
    Literal(Value),
    Identifier(String),
    Member(Box<Node>, String),
    Index(Box<Node>, Box<Node>),
}

/// A parsed binding expression.
#[derive(Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse `source`.
    pub fn parse(source: &str) -> Result<Self, BindError> {
        let mut parser = Parser {
            source,
            chars: source.char_indices().peekable(),
        };
        parser.skip_whitespace();
        let root = parser.expression()?;
        parser.skip_whitespace();
        if let Some((at, c)) = parser.chars.next() {
            return Err(parser.error(format!("unexpected `{c}` at offset {at}")));
        }
        Ok(Self {
            source: source.trim().to_string(),
            root,
        })
    }

    /// The source text, trimmed.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `context`.
    pub fn evaluate(&self, context: &BindingContext) -> Result<Value, BindError> {
        self.eval(&self.root, context)
    }

    /// Write through the expression. An observable result is set; otherwise
    /// the last property of the path is assigned on its object. Returns
    /// false if the expression names nothing writable.
    pub fn assign(&self, context: &BindingContext, value: Value) -> Result<bool, BindError> {
        if let Value::Observable(target) = self.evaluate(context)? {
            target.set(value);
            return Ok(true);
        }
        match &self.root {
            Node::Identifier(name) if context.lookup(name).is_none() => Ok(context.data().read().set(name.as_str(), value)),
            Node::Member(object, property) => Ok(self.eval(object, context)?.read().set(property.as_str(), value)),
            Node::Index(object, index) => {
                let key = self.eval(index, context)?.read().to_text();
                Ok(self.eval(object, context)?.read().set(key, value))
            }
            _ => Ok(false),
        }
    }

    fn eval(&self, node: &Node, context: &BindingContext) -> Result<Value, BindError> {
        match node {
            Node::Literal(value) => Ok(value.clone()),
            Node::Identifier(name) => Ok(resolve_identifier(name, context)),
            Node::Member(object, property) => {
                let object = self.eval(object, context)?;
                self.member(&object, property)
            }
            Node::Index(object, index) => {
                let object = self.eval(object, context)?;
                let index = self.eval(index, context)?.read();
                match index {
                    Value::Number(n) => self.element(&object, n),
                    other => self.member(&object, &other.to_text()),
                }
            }
        }
    }

    fn member(&self, object: &Value, property: &str) -> Result<Value, BindError> {
        match object.read() {
            Value::Undefined | Value::Null => Err(self.null_access(object, property)),
            Value::Object(map) => Ok(map.borrow().get(property).cloned().unwrap_or_default()),
            Value::Array(items) if property == "length" => Ok(Value::Number(items.borrow().len() as f64)),
            Value::String(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
            Value::Array(items) => match property.parse::<usize>() {
                Ok(i) => Ok(items.borrow().get(i).cloned().unwrap_or_default()),
                Err(_) => Ok(Value::Undefined),
            },
            _ => Ok(Value::Undefined),
        }
    }

    fn element(&self, object: &Value, index: f64) -> Result<Value, BindError> {
        match object.read() {
            Value::Undefined | Value::Null => Err(self.null_access(object, &Value::Number(index).to_text())),
            Value::Array(items) if index >= 0.0 && index.fract() == 0.0 => {
                Ok(items.borrow().get(index as usize).cloned().unwrap_or_default())
            }
            other => self.member(&other, &Value::Number(index).to_text()),
        }
    }

    fn null_access(&self, object: &Value, property: &str) -> BindError {
        let kind = if object.read().is_undefined() { "undefined" } else { "null" };
        BindError::Expression {
            expression: self.source.clone(),
            message: format!("cannot read properties of {kind} (reading '{property}')"),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expression({:?})", self.source)
    }
}

fn resolve_identifier(name: &str, context: &BindingContext) -> Value {
    if let Some(value) = context.lookup(name) {
        return value;
    }
    match context.data().read() {
        Value::Object(map) => map.borrow().get(name).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn error(&self, message: String) -> BindError {
        BindError::Syntax {
            source_text: self.source.to_string(),
            message,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn expression(&mut self) -> Result<Node, BindError> {
        let mut node = self.primary()?;
        loop {
            self.skip_whitespace();
            match self.chars.peek().map(|(_, c)| *c) {
                Some('.') => {
                    self.chars.next();
                    self.skip_whitespace();
                    let name = self.identifier()?;
                    node = Node::Member(Box::new(node), name);
                }
                Some('[') => {
                    self.chars.next();
                    self.skip_whitespace();
                    let index = self.expression()?;
                    self.skip_whitespace();
                    self.expect(']')?;
                    node = Node::Index(Box::new(node), Box::new(index));
                }
                _ => return Ok(node),
            }
        }
    }

    fn primary(&mut self) -> Result<Node, BindError> {
        match self.chars.peek().map(|(_, c)| *c) {
            None => Err(self.error("unexpected end of expression".to_string())),
            Some('(') => {
                self.chars.next();
                self.skip_whitespace();
                let inner = self.expression()?;
                self.skip_whitespace();
                self.expect(')')?;
                Ok(inner)
            }
            Some(quote @ ('\'' | '"')) => {
                self.chars.next();
                self.string(quote).map(|s| Node::Literal(Value::from(s)))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if is_identifier_start(c) => {
                let name = self.identifier()?;
                Ok(match name.as_str() {
                    "true" => Node::Literal(Value::Bool(true)),
                    "false" => Node::Literal(Value::Bool(false)),
                    "null" => Node::Literal(Value::Null),
                    "undefined" => Node::Literal(Value::Undefined),
                    _ => Node::Identifier(name),
                })
            }
            Some(c) => Err(self.error(format!("unexpected `{c}`"))),
        }
    }

    fn identifier(&mut self) -> Result<String, BindError> {
        let mut name = String::new();
        match self.chars.next_if(|(_, c)| is_identifier_start(*c)) {
            Some((_, c)) => name.push(c),
            None => return Err(self.error("expected an identifier".to_string())),
        }
        while let Some((_, c)) = self.chars.next_if(|(_, c)| is_identifier_part(*c)) {
            name.push(c);
        }
        Ok(name)
    }

    fn number(&mut self) -> Result<Node, BindError> {
        let mut text = String::new();
        if let Some((_, '-')) = self.chars.next_if(|(_, c)| *c == '-') {
            text.push('-');
        }
        while let Some((_, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.') {
            text.push(c);
        }
        text.parse::<f64>()
            .map(|n| Node::Literal(Value::Number(n)))
            .map_err(|_| self.error(format!("invalid number `{text}`")))
    }

    fn string(&mut self, quote: char) -> Result<String, BindError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(self.error("unterminated string".to_string())),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, c)) => out.push(c),
                    None => return Err(self.error("unterminated string".to_string())),
                },
                Some((_, c)) if c == quote => return Ok(out),
                Some((_, c)) => out.push(c),
            }
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), BindError> {
        match self.chars.next() {
            Some((_, c)) if c == expected => Ok(()),
            Some((at, c)) => Err(self.error(format!("expected `{expected}`, found `{c}` at offset {at}"))),
            None => Err(self.error(format!("expected `{expected}`"))),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

// =============================================================================
// Tests
// =============================================================================
