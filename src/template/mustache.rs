//! Mustache template engine
//!
//! Supports variables (`{{name}}`, `{{{name}}}`, `{{& name}}`), sections,
//! inverted sections, comments, dotted names and the implicit iterator `.`.
//! Partials and delimiter changes are not supported.

use crate::errors::RenderError;
use crate::template::path::{escape_html, get_segment, parse_path, stringify};
use serde_json::Value;

const ENGINE: &str = "mustache";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable { name: String, escape: bool },
    Section { name: String, inverted: bool, children: Vec<Node> },
}

#[derive(Debug)]
enum Token {
    Text(String),
    Variable { name: String, escape: bool },
    Open { name: String, inverted: bool },
    Close(String),
}

fn tokenize(template: &str) -> Result<Vec<Token>, RenderError> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            tokens.push(Token::Text(rest[..start].to_string()));
        }
        let after_open = &rest[start + 2..];

        let (tag, consumed) = if let Some(inner) = after_open.strip_prefix('{') {
            let end = inner
                .find("}}}")
                .ok_or_else(|| RenderError::new(ENGINE, template, "unclosed '{{{' tag"))?;
            (format!("&{}", &inner[..end]), 1 + end + 3)
        } else {
            let end = after_open
                .find("}}")
                .ok_or_else(|| RenderError::new(ENGINE, template, "unclosed '{{' tag"))?;
            (after_open[..end].to_string(), end + 2)
        };

        let tag = tag.trim();
        let (sigil, name) = match tag.chars().next() {
            Some(c @ ('#' | '^' | '/' | '&' | '!')) => (Some(c), tag[1..].trim().to_string()),
            _ => (None, tag.to_string()),
        };

        if name.is_empty() && sigil != Some('!') {
            return Err(RenderError::new(ENGINE, template, "empty tag"));
        }

        match sigil {
            Some('#') => tokens.push(Token::Open { name, inverted: false }),
            Some('^') => tokens.push(Token::Open { name, inverted: true }),
            Some('/') => tokens.push(Token::Close(name)),
            Some('&') => tokens.push(Token::Variable { name, escape: false }),
            Some('!') => {}
            _ => tokens.push(Token::Variable { name, escape: true }),
        }

        rest = &after_open[consumed..];
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }

    Ok(tokens)
}

fn build_tree(template: &str, tokens: Vec<Token>) -> Result<Vec<Node>, RenderError> {
    // Stack of (section name, inverted, children collected so far)
    let mut stack: Vec<(String, bool, Vec<Node>)> = vec![(String::new(), false, Vec::new())];

    for token in tokens {
        match token {
            Token::Text(text) => push_node(&mut stack, Node::Text(text)),
            Token::Variable { name, escape } => push_node(&mut stack, Node::Variable { name, escape }),
            Token::Open { name, inverted } => stack.push((name, inverted, Vec::new())),
            Token::Close(name) => {
                if stack.len() < 2 {
                    return Err(RenderError::new(
                        ENGINE,
                        template,
                        format!("unopened section '{}'", name),
                    ));
                }
                let (open_name, inverted, children) = stack.pop().unwrap_or_default();
                if open_name != name {
                    return Err(RenderError::new(
                        ENGINE,
                        template,
                        format!("unclosed section '{}' (found close of '{}')", open_name, name),
                    ));
                }
                push_node(
                    &mut stack,
                    Node::Section {
                        name,
                        inverted,
                        children,
                    },
                );
            }
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|(name, _, _)| name.clone()).unwrap_or_default();
        return Err(RenderError::new(
            ENGINE,
            template,
            format!("unclosed section '{}'", open),
        ));
    }

    Ok(stack.pop().map(|(_, _, nodes)| nodes).unwrap_or_default())
}

fn push_node(stack: &mut [(String, bool, Vec<Node>)], node: Node) {
    if let Some((_, _, children)) = stack.last_mut() {
        children.push(node);
    }
}

/// Look a name up through the context stack, innermost first
fn lookup<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    if name == "." {
        return stack.last().copied();
    }

    let segments = parse_path(name);
    let (first, rest) = segments.split_first()?;

    let head = stack
        .iter()
        .rev()
        .find_map(|frame| frame.as_object().and_then(|object| object.get(first)))?;

    rest.iter()
        .try_fold(head, |current, segment| get_segment(current, segment))
}

fn is_falsy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(_)) => false,
        Some(Value::Bool(true)) => false,
    }
}

fn render_nodes<'a>(nodes: &[Node], stack: &mut Vec<&'a Value>, autoescape: bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                if let Some(value) = lookup(stack, name) {
                    let rendered = stringify(value);
                    if *escape && autoescape {
                        out.push_str(&escape_html(&rendered));
                    } else {
                        out.push_str(&rendered);
                    }
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                if *inverted {
                    if is_falsy(value) {
                        render_nodes(children, stack, autoescape, out);
                    }
                    continue;
                }
                if is_falsy(value) {
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, autoescape, out);
                            stack.pop();
                        }
                    }
                    Some(value) => {
                        stack.push(value);
                        render_nodes(children, stack, autoescape, out);
                        stack.pop();
                    }
                    None => {}
                }
            }
        }
    }
}

/// Render a mustache template against a context object
pub fn render(template: &str, ctxt: &Value, autoescape: bool) -> Result<String, RenderError> {
    let nodes = build_tree(template, tokenize(template)?)?;
    let mut out = String::with_capacity(template.len());
    let mut stack = vec![ctxt];
    render_nodes(&nodes, &mut stack, autoescape, &mut out);
    Ok(out)
}
