//! Count expressions.
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr       := comparison ( "?" expr ":" expr )?
//! comparison := additive ( ("<" | "<=" | ">" | ">=" | "==" | "!=") additive )?
//! additive   := term ( ("+" | "-") term )*
//! term       := unary ( ("*" | "/") unary )*
//! unary      := "-" unary | primary
//! primary    := integer | "{" field "}" | "$size" | "(" expr ")"
//! ```
//!
//! Arithmetic is on `i64` with checked operations; comparisons yield `1` or
//! `0` and only the selected branch of a conditional is evaluated.

use crate::error::ParseError;
use std::fmt;

const MAX_NESTING: usize = 32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("field `{0}` has not been decoded")]
    UnknownField(String),
    #[error("field `{0}` is not a single integer")]
    NotNumeric(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Lit(i64),
    Field(String),
    Size,
    Neg(Box<Node>),
    Bin(BinOp, Box<Node>, Box<Node>),
    Cond(Box<Node>, Box<Node>, Box<Node>),
}

/// A parsed count expression.
#[derive(Clone, PartialEq)]
pub struct CountExpr {
    source: String,
    root: Node,
}

impl fmt::Debug for CountExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CountExpr({:?})", self.source)
    }
}

impl fmt::Display for CountExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl CountExpr {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let tokens = tokenize(source).map_err(|reason| ParseError::InvalidExpression {
            expr: source.to_string(),
            reason,
        })?;
        let mut p = ExprParser {
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let root = p
            .expr()
            .and_then(|root| match p.peek() {
                None => Ok(root),
                Some(t) => Err(format!("unexpected `{}`", t)),
            })
            .map_err(|reason| ParseError::InvalidExpression {
                expr: source.to_string(),
                reason,
            })?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn literal(n: i64) -> Self {
        Self {
            source: n.to_string(),
            root: Node::Lit(n),
        }
    }

    /// `{name}`
    pub fn field(name: &str) -> Self {
        Self {
            source: format!("{{{}}}", name),
            root: Node::Field(name.to_string()),
        }
    }

    /// `$size`
    pub fn size() -> Self {
        Self {
            source: "$size".to_string(),
            root: Node::Size,
        }
    }

    /// `self - n`
    pub fn minus(self, n: i64) -> Self {
        Self {
            source: format!("{} - {}", self.source, n),
            root: Node::Bin(BinOp::Sub, Box::new(self.root), Box::new(Node::Lit(n))),
        }
    }

    /// `(self) / n`
    pub fn div(self, n: i64) -> Self {
        Self {
            source: format!("({}) / {}", self.source, n),
            root: Node::Bin(BinOp::Div, Box::new(self.root), Box::new(Node::Lit(n))),
        }
    }

    /// `self == 0 ? then : otherwise`
    pub fn if_zero(self, then: CountExpr, otherwise: CountExpr) -> Self {
        let cond = Node::Bin(BinOp::Eq, Box::new(self.root), Box::new(Node::Lit(0)));
        Self {
            source: format!("{} == 0 ? {} : {}", self.source, then.source, otherwise.source),
            root: Node::Cond(Box::new(cond), Box::new(then.root), Box::new(otherwise.root)),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the sibling fields this expression refers to.
    pub fn field_refs(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Field(name) => out.push(name.as_str()),
                Node::Lit(_) | Node::Size => {}
                Node::Neg(a) => stack.push(a),
                Node::Bin(_, a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                Node::Cond(c, a, b) => {
                    stack.push(b);
                    stack.push(a);
                    stack.push(c);
                }
            }
        }
        out
    }

    pub fn eval<F>(&self, lookup: F, size: i64) -> Result<i64, EvalError>
    where
        F: Fn(&str) -> Result<i64, EvalError>,
    {
        eval_node(&self.root, &lookup, size)
    }
}

fn eval_node<F>(node: &Node, lookup: &F, size: i64) -> Result<i64, EvalError>
where
    F: Fn(&str) -> Result<i64, EvalError>,
{
    match node {
        Node::Lit(n) => Ok(*n),
        Node::Field(name) => lookup(name),
        Node::Size => Ok(size),
        Node::Neg(a) => eval_node(a, lookup, size)?
            .checked_neg()
            .ok_or(EvalError::Overflow),
        Node::Cond(c, a, b) => {
            if eval_node(c, lookup, size)? != 0 {
                eval_node(a, lookup, size)
            } else {
                eval_node(b, lookup, size)
            }
        }
        Node::Bin(op, a, b) => {
            let l = eval_node(a, lookup, size)?;
            let r = eval_node(b, lookup, size)?;
            match op {
                BinOp::Add => l.checked_add(r).ok_or(EvalError::Overflow),
                BinOp::Sub => l.checked_sub(r).ok_or(EvalError::Overflow),
                BinOp::Mul => l.checked_mul(r).ok_or(EvalError::Overflow),
                BinOp::Div => {
                    if r == 0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        l.checked_div(r).ok_or(EvalError::Overflow)
                    }
                }
                BinOp::Lt => Ok((l < r) as i64),
                BinOp::Le => Ok((l <= r) as i64),
                BinOp::Gt => Ok((l > r) as i64),
                BinOp::Ge => Ok((l >= r) as i64),
                BinOp::Eq => Ok((l == r) as i64),
                BinOp::Ne => Ok((l != r) as i64),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(i64),
    Field(String),
    Size,
    Op(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Field(name) => write!(f, "{{{}}}", name),
            Token::Size => f.write_str("$size"),
            Token::Op(op) => f.write_str(op),
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let begin = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[begin..i].iter().collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| format!("integer `{}` out of range", text))?;
            out.push(Token::Num(n));
            continue;
        }
        if c == '{' {
            let close = chars[i + 1..]
                .iter()
                .position(|&c| c == '}')
                .ok_or("unterminated `{`")?;
            let name: String = chars[i + 1..i + 1 + close].iter().collect();
            let name = name.trim();
            if name.is_empty() {
                return Err("empty field reference".into());
            }
            out.push(Token::Field(name.to_string()));
            i += close + 2;
            continue;
        }
        if c == '$' {
            let rest: String = chars[i + 1..].iter().take(4).collect();
            if rest == "size" {
                out.push(Token::Size);
                i += 5;
                continue;
            }
            return Err("unknown `$` constant".into());
        }
        let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
        let op = match two.as_str() {
            "<=" => Some("<="),
            ">=" => Some(">="),
            "==" => Some("=="),
            "!=" => Some("!="),
            _ => None,
        };
        if let Some(op) = op {
            out.push(Token::Op(op));
            i += 2;
            continue;
        }
        let op = match c {
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '<' => "<",
            '>' => ">",
            '?' => "?",
            ':' => ":",
            '(' => "(",
            ')' => ")",
            other => return Err(format!("unexpected character `{}`", other)),
        };
        out.push(Token::Op(op));
        i += 1;
    }
    if out.is_empty() {
        return Err("empty expression".into());
    }
    Ok(out)
}

struct ExprParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, op: &str) -> Result<(), String> {
        if self.eat(op) {
            Ok(())
        } else {
            match self.peek() {
                Some(t) => Err(format!("expected `{}`, found `{}`", op, t)),
                None => Err(format!("expected `{}` at end of input", op)),
            }
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err("expression nested too deeply".into());
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Node, String> {
        self.enter()?;
        let cond = self.comparison()?;
        let node = if self.eat("?") {
            let a = self.expr()?;
            self.expect(":")?;
            let b = self.expr()?;
            Node::Cond(Box::new(cond), Box::new(a), Box::new(b))
        } else {
            cond
        };
        self.depth -= 1;
        Ok(node)
    }

    fn comparison(&mut self) -> Result<Node, String> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op("<")) => BinOp::Lt,
            Some(Token::Op("<=")) => BinOp::Le,
            Some(Token::Op(">")) => BinOp::Gt,
            Some(Token::Op(">=")) => BinOp::Ge,
            Some(Token::Op("==")) => BinOp::Eq,
            Some(Token::Op("!=")) => BinOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(Node::Bin(op, Box::new(lhs), Box::new(rhs)))
    }

    fn additive(&mut self) -> Result<Node, String> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat("+") {
                BinOp::Add
            } else if self.eat("-") {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            let rhs = self.term()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn term(&mut self) -> Result<Node, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat("*") {
                BinOp::Mul
            } else if self.eat("/") {
                BinOp::Div
            } else {
                return Ok(lhs);
            };
            let rhs = self.unary()?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node, String> {
        if self.eat("-") {
            self.enter()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Node::Neg(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node, String> {
        let tok = self.peek().cloned();
        match tok {
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(Node::Lit(n))
            }
            Some(Token::Field(name)) => {
                self.pos += 1;
                Ok(Node::Field(name))
            }
            Some(Token::Size) => {
                self.pos += 1;
                Ok(Node::Size)
            }
            Some(Token::Op("(")) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(t) => Err(format!("unexpected `{}`", t)),
            None => Err("unexpected end of input".into()),
        }
    }
}
