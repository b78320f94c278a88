//! Nunjucks template engine (subset)
//!
//! Output blocks `{{ expr }}`, `{% if %}`/`{% elif %}`/`{% else %}`,
//! `{% for %}` (with `loop.*` and an `{% else %}` branch), `{% set %}`,
//! comments and `-` whitespace control. Expressions support literals,
//! attribute/index access, comparison and boolean operators, `in`, `~`
//! concatenation, arithmetic and a set of common filters.

use crate::errors::RenderError;
use crate::template::path::{escape_html, get_segment, stringify};
use serde_json::{json, Map, Number, Value};

const ENGINE: &str = "nunjucks";

// ---------------------------------------------------------------------------
// Template segments

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Output(String),
    Tag(String),
}

fn split_segments(template: &str) -> Result<Vec<Segment>, String> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut rest = template;
    let mut trim_next = false;

    loop {
        let next_open = ["{{", "{%", "{#"]
            .iter()
            .filter_map(|open| rest.find(open).map(|idx| (idx, *open)))
            .min_by_key(|(idx, _)| *idx);

        let Some((start, open)) = next_open else {
            let text = if trim_next { rest.trim_start() } else { rest };
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }
            break;
        };

        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }

        let close = match open {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let body_start = start + 2;
        let end = rest[body_start..]
            .find(close)
            .map(|idx| idx + body_start)
            .ok_or_else(|| format!("unclosed '{}'", open))?;

        let mut body = &rest[body_start..end];
        let trim_before = body.starts_with('-');
        if trim_before {
            body = &body[1..];
            text = text.trim_end();
        }
        trim_next = body.ends_with('-');
        if trim_next {
            body = &body[..body.len() - 1];
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        match open {
            "{{" => segments.push(Segment::Output(body.trim().to_string())),
            "{%" => segments.push(Segment::Tag(body.trim().to_string())),
            _ => {}
        }

        rest = &rest[end + 2..];
    }

    Ok(segments)
}

// ---------------------------------------------------------------------------
// Expression lexer

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Op(&'static str),
    Dot,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn lex(src: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '.' => {
                tokens.push(Tok::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Tok::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Tok::Pipe);
                i += 1;
            }
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Tok::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Tok::RBracket);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => {
                            if let Some(next) = chars.get(i + 1) {
                                value.push(match next {
                                    'n' => '\n',
                                    't' => '\t',
                                    other => *other,
                                });
                            }
                            i += 2;
                        }
                        Some(ch) if *ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            value.push(*ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Tok::Str(value));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    // `items.0.name` style access is handled by the parser, so
                    // only treat a dot as decimal when a digit follows
                    if chars[i] == '.' && !chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                        break;
                    }
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Tok::Num(number));
            }
            c if c.is_alphabetic() || c == '_' || c == '@' || c == '$' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Tok::Op(op));
                    i += 2;
                    continue;
                }
                let op = match c {
                    '<' => "<",
                    '>' => ">",
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    '%' => "%",
                    '~' => "~",
                    '=' => "=",
                    other => return Err(format!("unexpected character '{}'", other)),
                };
                tokens.push(Tok::Op(op));
                i += 1;
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Expression parser

#[derive(Debug, Clone, PartialEq)]
enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Var(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Filter {
        name: String,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, String> {
        Ok(Self {
            tokens: lex(src)?,
            pos: 0,
        })
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Tok) -> Result<(), String> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", expected, self.peek()))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            other => Err(format!("expected identifier, found {:?}", other)),
        }
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(format!("unexpected token {:?}", token)),
        }
    }

    fn expression(&mut self) -> Result<Expr, String> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Binary(BinOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::Binary(BinOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let left = self.concat()?;
        let op = match self.peek() {
            Some(Tok::Op("==")) => BinOp::Eq,
            Some(Tok::Op("!=")) => BinOp::Ne,
            Some(Tok::Op("<")) => BinOp::Lt,
            Some(Tok::Op("<=")) => BinOp::Le,
            Some(Tok::Op(">")) => BinOp::Gt,
            Some(Tok::Op(">=")) => BinOp::Ge,
            Some(Tok::Ident(name)) if name == "in" => BinOp::In,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.concat()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn concat(&mut self) -> Result<Expr, String> {
        let mut left = self.additive()?;
        while self.eat(&Tok::Op("~")) {
            let right = self.additive()?;
            left = Expr::Binary(BinOp::Concat, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op("+")) => BinOp::Add,
                Some(Tok::Op("-")) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Op("*")) => BinOp::Mul,
                Some(Tok::Op("/")) => BinOp::Div,
                Some(Tok::Op("%")) => BinOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Tok::Op("-")) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.filtered()
    }

    fn filtered(&mut self) -> Result<Expr, String> {
        let mut target = self.postfix()?;
        while self.eat(&Tok::Pipe) {
            let name = self.ident()?;
            let mut args = Vec::new();
            if self.eat(&Tok::LParen) {
                if !self.eat(&Tok::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Tok::RParen) {
                            break;
                        }
                        self.expect(Tok::Comma)?;
                    }
                }
            }
            target = Expr::Filter {
                name,
                target: Box::new(target),
                args,
            };
        }
        Ok(target)
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                let segment = match self.next() {
                    Some(Tok::Ident(name)) => name,
                    Some(Tok::Num(n)) => format_number(n),
                    other => return Err(format!("expected attribute, found {:?}", other)),
                };
                expr = Expr::Attr(Box::new(expr), segment);
            } else if self.eat(&Tok::LBracket) {
                let index = self.expression()?;
                self.expect(Tok::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Ident(name)) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(Value::Bool(true)),
                "false" | "False" => Expr::Literal(Value::Bool(false)),
                "none" | "None" | "null" => Expr::Literal(Value::Null),
                _ => Expr::Var(name),
            }),
            Some(Tok::LParen) => {
                let expr = self.expression()?;
                self.expect(Tok::RParen)?;
                Ok(expr)
            }
            Some(Tok::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if self.eat(&Tok::RBracket) {
                            break;
                        }
                        self.expect(Tok::Comma)?;
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

fn parse_expression(src: &str) -> Result<Expr, String> {
    let mut parser = Parser::new(src)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Template tree

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Output(Expr),
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    For {
        vars: Vec<String>,
        iterable: Expr,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    Set {
        name: String,
        value: Expr,
    },
}

fn tag_keyword(tag: &str) -> (&str, &str) {
    match tag.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (tag, ""),
    }
}

/// Parse nodes until one of `terminators` is reached; returns the terminating tag
fn parse_block(
    segments: &[Segment],
    pos: &mut usize,
    terminators: &[&str],
) -> Result<(Vec<Node>, Option<String>), String> {
    let mut nodes = Vec::new();

    while let Some(segment) = segments.get(*pos) {
        *pos += 1;
        match segment {
            Segment::Text(text) => nodes.push(Node::Text(text.clone())),
            Segment::Output(src) => nodes.push(Node::Output(parse_expression(src)?)),
            Segment::Tag(tag) => {
                let (keyword, rest) = tag_keyword(tag);
                if terminators.contains(&keyword) {
                    return Ok((nodes, Some(tag.clone())));
                }
                match keyword {
                    "if" => nodes.push(parse_if(segments, pos, rest)?),
                    "for" => nodes.push(parse_for(segments, pos, rest)?),
                    "set" => {
                        let (name, value) = rest
                            .split_once('=')
                            .ok_or_else(|| format!("malformed set tag '{}'", tag))?;
                        nodes.push(Node::Set {
                            name: name.trim().to_string(),
                            value: parse_expression(value)?,
                        });
                    }
                    other => return Err(format!("unknown tag '{}'", other)),
                }
            }
        }
    }

    Ok((nodes, None))
}

fn parse_if(segments: &[Segment], pos: &mut usize, condition: &str) -> Result<Node, String> {
    let mut branches = Vec::new();
    let mut condition = parse_expression(condition)?;
    let mut otherwise = Vec::new();

    loop {
        let (body, end) = parse_block(segments, pos, &["elif", "elseif", "else", "endif"])?;
        branches.push((condition, body));
        let end = end.ok_or_else(|| "unclosed 'if' tag".to_string())?;
        let (keyword, rest) = tag_keyword(&end);
        match keyword {
            "elif" | "elseif" => condition = parse_expression(rest)?,
            "else" => {
                let (body, end) = parse_block(segments, pos, &["endif"])?;
                end.ok_or_else(|| "unclosed 'if' tag".to_string())?;
                otherwise = body;
                break;
            }
            _ => break,
        }
    }

    Ok(Node::If { branches, otherwise })
}

fn parse_for(segments: &[Segment], pos: &mut usize, header: &str) -> Result<Node, String> {
    let (vars, iterable) = header
        .split_once(" in ")
        .ok_or_else(|| format!("malformed for tag '{}'", header))?;
    let vars: Vec<String> = vars.split(',').map(|v| v.trim().to_string()).collect();
    if vars.is_empty() || vars.len() > 2 || vars.iter().any(String::is_empty) {
        return Err(format!("malformed for tag '{}'", header));
    }
    let iterable = parse_expression(iterable)?;

    let (body, end) = parse_block(segments, pos, &["else", "endfor"])?;
    let end = end.ok_or_else(|| "unclosed 'for' tag".to_string())?;
    let otherwise = if tag_keyword(&end).0 == "else" {
        let (otherwise, end) = parse_block(segments, pos, &["endfor"])?;
        end.ok_or_else(|| "unclosed 'for' tag".to_string())?;
        otherwise
    } else {
        Vec::new()
    };

    Ok(Node::For {
        vars,
        iterable,
        body,
        otherwise,
    })
}

// ---------------------------------------------------------------------------
// Evaluation

struct Scope<'a> {
    root: &'a Value,
    frames: Vec<Map<String, Value>>,
    strict: bool,
}

impl Scope<'_> {
    fn lookup(&self, name: &str) -> Result<Value, String> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        match self.root.get(name) {
            Some(value) => Ok(value.clone()),
            None if self.strict => Err(format!("{} is undefined", name)),
            None => Ok(Value::Null),
        }
    }

    fn set(&mut self, name: String, value: Value) {
        if self.frames.is_empty() {
            self.frames.push(Map::new());
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// JavaScript truthiness
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            as_number(left).is_some() && as_number(left) == as_number(right)
        }
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => as_number(left)?.partial_cmp(&as_number(right)?),
    }
}

fn eval(expr: &Expr, scope: &Scope<'_>) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => scope.lookup(name),
        Expr::Attr(target, name) => {
            let target = eval(target, scope)?;
            Ok(get_segment(&target, name).cloned().unwrap_or(Value::Null))
        }
        Expr::Index(target, index) => {
            let target = eval(target, scope)?;
            let key = stringify(&eval(index, scope)?);
            Ok(get_segment(&target, &key).cloned().unwrap_or(Value::Null))
        }
        Expr::List(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| eval(item, scope))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, scope)?))),
        Expr::Neg(inner) => {
            let value = eval(inner, scope)?;
            Ok(as_number(&value).map(|n| number_value(-n)).unwrap_or(Value::Null))
        }
        Expr::Binary(op, left, right) => eval_binary(op, left, right, scope),
        Expr::Filter { name, target, args } => {
            let target = eval(target, scope)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            apply_filter(name, target, &args)
        }
    }
}

fn eval_binary(op: &BinOp, left: &Expr, right: &Expr, scope: &Scope<'_>) -> Result<Value, String> {
    let lhs = eval(left, scope)?;
    match op {
        BinOp::And => {
            return if truthy(&lhs) { eval(right, scope) } else { Ok(lhs) };
        }
        BinOp::Or => {
            return if truthy(&lhs) { Ok(lhs) } else { eval(right, scope) };
        }
        _ => {}
    }

    let rhs = eval(right, scope)?;
    let value = match op {
        BinOp::Eq => Value::Bool(loose_eq(&lhs, &rhs)),
        BinOp::Ne => Value::Bool(!loose_eq(&lhs, &rhs)),
        BinOp::Lt => Value::Bool(compare(&lhs, &rhs) == Some(std::cmp::Ordering::Less)),
        BinOp::Le => Value::Bool(matches!(
            compare(&lhs, &rhs),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )),
        BinOp::Gt => Value::Bool(compare(&lhs, &rhs) == Some(std::cmp::Ordering::Greater)),
        BinOp::Ge => Value::Bool(matches!(
            compare(&lhs, &rhs),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )),
        BinOp::In => Value::Bool(match &rhs {
            Value::Array(items) => items.iter().any(|item| loose_eq(item, &lhs)),
            Value::Object(map) => map.contains_key(&stringify(&lhs)),
            Value::String(s) => s.contains(&stringify(&lhs)),
            _ => false,
        }),
        BinOp::Concat => Value::String(format!("{}{}", stringify(&lhs), stringify(&rhs))),
        BinOp::Add => match (&lhs, &rhs) {
            (Value::Number(_), Value::Number(_)) => {
                number_value(as_number(&lhs).unwrap_or(0.0) + as_number(&rhs).unwrap_or(0.0))
            }
            _ => Value::String(format!("{}{}", stringify(&lhs), stringify(&rhs))),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            match (as_number(&lhs), as_number(&rhs)) {
                (Some(a), Some(b)) => {
                    let result = match op {
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Div => a / b,
                        _ => a % b,
                    };
                    number_value(result)
                }
                _ => Value::Null,
            }
        }
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    };
    Ok(value)
}

fn apply_filter(name: &str, target: Value, args: &[Value]) -> Result<Value, String> {
    let value = match name {
        "default" | "d" => {
            let fallback = args.first().cloned().unwrap_or(Value::Null);
            let falsy_too = args.get(1).is_some_and(truthy);
            if target.is_null() || (falsy_too && !truthy(&target)) {
                fallback
            } else {
                target
            }
        }
        "upper" => Value::String(stringify(&target).to_uppercase()),
        "lower" => Value::String(stringify(&target).to_lowercase()),
        "trim" => Value::String(stringify(&target).trim().to_string()),
        "capitalize" => {
            let text = stringify(&target).to_lowercase();
            let mut chars = text.chars();
            Value::String(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            })
        }
        "length" | "count" => json!(match &target {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }),
        "join" => {
            let separator = args.first().map(stringify).unwrap_or_default();
            match &target {
                Value::Array(items) => Value::String(
                    items.iter().map(stringify).collect::<Vec<_>>().join(&separator),
                ),
                other => Value::String(stringify(other)),
            }
        }
        "first" => match &target {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            Value::String(s) => s.chars().next().map(|c| json!(c.to_string())).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "last" => match &target {
            Value::Array(items) => items.last().cloned().unwrap_or(Value::Null),
            Value::String(s) => s.chars().last().map(|c| json!(c.to_string())).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        "dump" | "tojson" => Value::String(target.to_string()),
        "safe" => target,
        "escape" | "e" => Value::String(escape_html(&stringify(&target))),
        "int" => json!(as_number(&target).map(|n| n.trunc() as i64).unwrap_or(0)),
        "float" => as_number(&target).map(number_value).unwrap_or(json!(0)),
        "string" => Value::String(stringify(&target)),
        "replace" => {
            let from = args.first().map(stringify).unwrap_or_default();
            let to = args.get(1).map(stringify).unwrap_or_default();
            if from.is_empty() {
                Value::String(stringify(&target))
            } else {
                Value::String(stringify(&target).replace(&from, &to))
            }
        }
        other => return Err(format!("unknown filter '{}'", other)),
    };
    Ok(value)
}

fn render_nodes(nodes: &[Node], scope: &mut Scope<'_>, autoescape: bool, out: &mut String) -> Result<(), String> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expr) => {
                let value = eval(expr, scope)?;
                let is_safe = matches!(expr, Expr::Filter { name, .. } if name == "safe");
                let rendered = stringify(&value);
                if autoescape && !is_safe {
                    out.push_str(&escape_html(&rendered));
                } else {
                    out.push_str(&rendered);
                }
            }
            Node::If { branches, otherwise } => {
                let mut taken = false;
                for (condition, body) in branches {
                    if truthy(&eval(condition, scope)?) {
                        render_nodes(body, scope, autoescape, out)?;
                        taken = true;
                        break;
                    }
                }
                if !taken {
                    render_nodes(otherwise, scope, autoescape, out)?;
                }
            }
            Node::For {
                vars,
                iterable,
                body,
                otherwise,
            } => {
                let entries: Vec<(Value, Value)> = match eval(iterable, scope)? {
                    Value::Array(items) => items.into_iter().map(|v| (Value::Null, v)).collect(),
                    Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
                    _ => Vec::new(),
                };

                if entries.is_empty() {
                    render_nodes(otherwise, scope, autoescape, out)?;
                    continue;
                }

                let length = entries.len();
                for (index, (key, item)) in entries.into_iter().enumerate() {
                    let mut frame = Map::new();
                    if vars.len() == 2 {
                        frame.insert(vars[0].clone(), key);
                        frame.insert(vars[1].clone(), item);
                    } else {
                        frame.insert(vars[0].clone(), item);
                    }
                    frame.insert(
                        "loop".to_string(),
                        json!({
                            "index": index + 1,
                            "index0": index,
                            "first": index == 0,
                            "last": index + 1 == length,
                            "length": length,
                        }),
                    );
                    scope.frames.push(frame);
                    let result = render_nodes(body, scope, autoescape, out);
                    scope.frames.pop();
                    result?;
                }
            }
            Node::Set { name, value } => {
                let value = eval(value, scope)?;
                scope.set(name.clone(), value);
            }
        }
    }
    Ok(())
}

/// Render a nunjucks template against a context object
pub fn render(template: &str, ctxt: &Value, autoescape: bool, strict: bool) -> Result<String, RenderError> {
    let to_error = |message: String| RenderError::new(ENGINE, template, message);

    let segments = split_segments(template).map_err(to_error)?;
    let mut pos = 0;
    let (nodes, dangling) = parse_block(&segments, &mut pos, &[]).map_err(to_error)?;
    if let Some(tag) = dangling {
        return Err(to_error(format!("unexpected tag '{}'", tag)));
    }

    let mut scope = Scope {
        root: ctxt,
        frames: Vec::new(),
        strict,
    };
    let mut out = String::with_capacity(template.len());
    render_nodes(&nodes, &mut scope, autoescape, &mut out).map_err(to_error)?;
    Ok(out)
}
