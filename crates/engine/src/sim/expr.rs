// WDB - Watch-display Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Expression language of the simulated debuggee.
//!
//! Supports integer literals (decimal or `0x` hex), identifiers, address-of
//! (`&ident`), unary minus, binary `+`, `-`, `*` and parentheses. Identifiers
//! stay unresolved until an expression is bound against a frame.

use std::{fmt, iter::Peekable, str::CharIndices, str::FromStr};

use eyre::{bail, eyre, Result};

/// How an identifier resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Not bound yet: looked up as a local first, then as a global
    Unresolved,
    /// A variable local to the function the expression was bound in
    Local,
    /// A global variable
    Global,
}

/// A named variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    /// Variable name
    pub name: String,
    /// Resolution of the name
    pub binding: Binding,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul => 2,
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> Result<i64> {
        let result = match self {
            Self::Add => lhs.checked_add(rhs),
            Self::Sub => lhs.checked_sub(rhs),
            Self::Mul => lhs.checked_mul(rhs),
        };
        result.ok_or_else(|| eyre!("Integer overflow in {lhs} {} {rhs}", self.symbol()))
    }
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimExpr {
    /// Integer literal
    Literal(i64),
    /// Variable value
    Variable(VarRef),
    /// Address of a variable
    AddressOf(VarRef),
    /// Unary minus
    Negate(Box<SimExpr>),
    /// Binary arithmetic
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<SimExpr>,
        /// Right operand
        rhs: Box<SimExpr>,
    },
}

/// Variable storage an expression is evaluated against.
pub trait VariableScope {
    /// Current value of `var`
    fn read(&self, var: &VarRef) -> Result<i64>;

    /// Address of `var`
    fn address_of(&self, var: &VarRef) -> Result<u64>;
}

const UNARY_PRECEDENCE: u8 = 3;
/// Deepest expression tree the parser builds; evaluation, rendering and drop recurse over it
const MAX_NESTING: usize = 256;
const ATOM_PRECEDENCE: u8 = 4;

impl SimExpr {
    /// Copy of the expression with every identifier bound.
    ///
    /// Names for which `is_local` holds become [`Binding::Local`], all others
    /// [`Binding::Global`]. The flag tells whether any local was bound.
    pub fn bind(&self, is_local: &dyn Fn(&str) -> bool) -> (Self, bool) {
        let bind_var = |var: &VarRef| {
            let local = match var.binding {
                Binding::Unresolved => is_local(&var.name),
                Binding::Local => true,
                Binding::Global => false,
            };
            let binding = if local { Binding::Local } else { Binding::Global };
            (VarRef { name: var.name.clone(), binding }, local)
        };

        match self {
            Self::Literal(value) => (Self::Literal(*value), false),
            Self::Variable(var) => {
                let (var, local) = bind_var(var);
                (Self::Variable(var), local)
            }
            Self::AddressOf(var) => {
                let (var, local) = bind_var(var);
                (Self::AddressOf(var), local)
            }
            Self::Negate(inner) => {
                let (inner, local) = inner.bind(is_local);
                (Self::Negate(Box::new(inner)), local)
            }
            Self::Binary { op, lhs, rhs } => {
                let (lhs, lhs_local) = lhs.bind(is_local);
                let (rhs, rhs_local) = rhs.bind(is_local);
                (Self::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, lhs_local || rhs_local)
            }
        }
    }

    /// Evaluate against `scope`
    pub fn eval(&self, scope: &dyn VariableScope) -> Result<i64> {
        match self {
            Self::Literal(value) => Ok(*value),
            Self::Variable(var) => scope.read(var),
            Self::AddressOf(var) => {
                let address = scope.address_of(var)?;
                i64::try_from(address).map_err(|_| eyre!("Address {address:#x} does not fit a value"))
            }
            Self::Negate(inner) => {
                let value = inner.eval(scope)?;
                value.checked_neg().ok_or_else(|| eyre!("Integer overflow in -{value}"))
            }
            Self::Binary { op, lhs, rhs } => op.apply(lhs.eval(scope)?, rhs.eval(scope)?),
        }
    }

    /// Every variable referenced by the expression, left to right
    pub fn variables(&self) -> Vec<&VarRef> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables<'a>(&'a self, vars: &mut Vec<&'a VarRef>) {
        match self {
            Self::Literal(_) => {}
            Self::Variable(var) | Self::AddressOf(var) => vars.push(var),
            Self::Negate(inner) => inner.collect_variables(vars),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Literal(_) | Self::Variable(_) | Self::AddressOf(_) => ATOM_PRECEDENCE,
            Self::Negate(_) => UNARY_PRECEDENCE,
            Self::Binary { op, .. } => op.precedence(),
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parenthesize: bool) -> fmt::Result {
        if parenthesize {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for SimExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(var) => write!(f, "{}", var.name),
            Self::AddressOf(var) => write!(f, "&{}", var.name),
            Self::Negate(inner) => {
                write!(f, "-")?;
                inner.fmt_operand(f, inner.precedence() < UNARY_PRECEDENCE)
            }
            Self::Binary { op, lhs, rhs } => {
                lhs.fmt_operand(f, lhs.precedence() < op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, rhs.precedence() <= op.precedence())
            }
        }
    }
}

impl FromStr for SimExpr {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        parse_expression(s)
    }
}

/// Parse `text` into an unbound expression
pub fn parse_expression(text: &str) -> Result<SimExpr> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        bail!("Empty expression");
    }

    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.sum()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected token '{token}' in expression");
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Amp,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Ident(name) => write!(f, "{name}"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Amp => write!(f, "&"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '&' => Token::Amp,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() => {
                let end = scan_while(&mut chars, text.len(), |c| c.is_ascii_alphanumeric());
                tokens.push(Token::Int(parse_integer(&text[start..end])?));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = scan_while(&mut chars, text.len(), |c| c.is_ascii_alphanumeric() || c == '_');
                tokens.push(Token::Ident(text[start..end].to_string()));
                continue;
            }
            other => bail!("Unexpected character '{other}' in expression"),
        };
        chars.next();
        tokens.push(token);
    }
    Ok(tokens)
}

/// Consume characters matching `pred`; returns the end offset of the run
fn scan_while(chars: &mut Peekable<CharIndices<'_>>, len: usize, pred: impl Fn(char) -> bool) -> usize {
    while let Some(&(offset, c)) = chars.peek() {
        if !pred(c) {
            return offset;
        }
        chars.next();
    }
    len
}

fn parse_integer(literal: &str) -> Result<i64> {
    let parsed = match literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => literal.parse::<i64>(),
    };
    parsed.map_err(|e| eyre!("Invalid integer literal '{literal}': {e}"))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Depth of the subtree being built, counting nesting and operator chains
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            bail!("Expression nested too deeply (more than {MAX_NESTING} levels)");
        }
        Ok(())
    }

    fn sum(&mut self) -> Result<SimExpr> {
        let saved = self.depth;
        let mut lhs = self.product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.enter()?;
            self.pos += 1;
            let rhs = self.product()?;
            lhs = SimExpr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn product(&mut self) -> Result<SimExpr> {
        let saved = self.depth;
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::Star) {
            self.enter()?;
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = SimExpr::Binary { op: BinaryOp::Mul, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<SimExpr> {
        self.enter()?;
        let expr = self.operand()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn operand(&mut self) -> Result<SimExpr> {
        match self.advance() {
            Some(Token::Minus) => Ok(SimExpr::Negate(Box::new(self.unary()?))),
            Some(Token::Amp) => match self.advance() {
                Some(Token::Ident(name)) => {
                    Ok(SimExpr::AddressOf(VarRef { name, binding: Binding::Unresolved }))
                }
                Some(token) => bail!("Cannot take the address of '{token}'"),
                None => bail!("Expected a variable after '&'"),
            },
            Some(Token::Int(value)) => Ok(SimExpr::Literal(value)),
            Some(Token::Ident(name)) => {
                Ok(SimExpr::Variable(VarRef { name, binding: Binding::Unresolved }))
            }
            Some(Token::LParen) => {
                let inner = self.sum()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => bail!("Expected ')' but found '{token}'"),
                    None => bail!("Missing ')' in expression"),
                }
            }
            Some(token) => bail!("Unexpected token '{token}' in expression"),
            None => bail!("Unexpected end of expression"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapScope {
        locals: HashMap<&'static str, i64>,
        globals: HashMap<&'static str, (u64, i64)>,
    }

    impl VariableScope for MapScope {
        fn read(&self, var: &VarRef) -> Result<i64> {
            let local = self.locals.get(var.name.as_str()).copied();
            let global = self.globals.get(var.name.as_str()).map(|(_, value)| *value);
            match var.binding {
                Binding::Local => local,
                Binding::Global => global,
                Binding::Unresolved => local.or(global),
            }
            .ok_or_else(|| eyre!("No symbol \"{}\" in current context", var.name))
        }

        fn address_of(&self, var: &VarRef) -> Result<u64> {
            self.globals
                .get(var.name.as_str())
                .map(|(address, _)| *address)
                .ok_or_else(|| eyre!("No address for {}", var.name))
        }
    }

    fn scope() -> MapScope {
        MapScope {
            locals: HashMap::from([("x", 10), ("y", -3)]),
            globals: HashMap::from([("counter", (0x404000, 7)), ("x", (0x404008, 99))]),
        }
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 7);

        let expr = parse_expression("(1 + 2) * 3").unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 9);

        let expr = parse_expression("10 - 4 - 3").unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 3);
    }

    #[test]
    fn test_parse_hex_and_unary() {
        let expr = parse_expression("-0x10 + --2").unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), -14);
    }

    #[test]
    fn test_render_minimal_parentheses() {
        let cases = [
            ("a+b*c", "a + b * c"),
            ("(a+b)*c", "(a + b) * c"),
            ("a-(b-c)", "a - (b - c)"),
            ("(a-b)-c", "a - b - c"),
            ("-(a+1)", "-(a + 1)"),
            ("&counter", "&counter"),
            ("0x20", "32"),
        ];
        for (input, rendered) in cases {
            assert_eq!(parse_expression(input).unwrap().to_string(), rendered);
        }
    }

    #[test]
    fn test_parse_errors() {
        for input in ["", "1 +", "(1 + 2", "1 2", "&3", "a $ b", "99999999999999999999"] {
            assert!(parse_expression(input).is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn test_bind_marks_locals() {
        let expr = parse_expression("x + counter").unwrap();
        let (bound, has_local) = expr.bind(&|name| name == "x");
        assert!(has_local);

        let SimExpr::Binary { lhs, rhs, .. } = &bound else { panic!("expected binary") };
        assert_eq!(**lhs, SimExpr::Variable(VarRef { name: "x".into(), binding: Binding::Local }));
        assert_eq!(**rhs, SimExpr::Variable(VarRef { name: "counter".into(), binding: Binding::Global }));

        // Binding is sticky once resolved
        let (rebound, has_local) = bound.bind(&|_| false);
        assert!(has_local);
        assert_eq!(rebound, bound);
    }

    #[test]
    fn test_bound_global_ignores_shadowing_local() {
        let expr = parse_expression("x").unwrap();
        let (bound, has_local) = expr.bind(&|_| false);
        assert!(!has_local);
        assert_eq!(bound.eval(&scope()).unwrap(), 99);
    }

    #[test]
    fn test_eval_address_of_and_missing() {
        let expr = parse_expression("&counter + 8").unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 0x404008);

        let err = parse_expression("missing").unwrap().eval(&scope()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_variables_in_order() {
        let expr = parse_expression("a * (&b - a) + 3").unwrap();
        let names: Vec<&str> = expr.variables().iter().map(|var| var.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "a"]);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 100_000;
        let inputs = [
            format!("{}1", "-".repeat(depth)),
            format!("{}1{}", "(".repeat(depth), ")".repeat(depth)),
            vec!["1"; depth].join(" + "),
            vec!["2"; depth].join(" * "),
        ];
        for input in &inputs {
            let err = parse_expression(input).unwrap_err();
            assert!(err.to_string().contains("nested too deeply"));
        }
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let expr = parse_expression(&format!("{}7{}", "(".repeat(60), ")".repeat(60))).unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 7);

        let expr = parse_expression(&vec!["1"; 100].join(" + ")).unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 100);

        let expr = parse_expression(&format!("{}5", "--".repeat(50))).unwrap();
        assert_eq!(expr.eval(&scope()).unwrap(), 5);
    }

    #[test]
    fn test_eval_overflow_is_error() {
        let expr = parse_expression("0x7fffffffffffffff + 1").unwrap();
        assert!(expr.eval(&scope()).is_err());
    }
}
