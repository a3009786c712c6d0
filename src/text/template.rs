//! Logic-less template expansion (a mustache subset) over a JSON environment.
//!
//! Supported tags:
//!
//! - `{{name}}`, `{{a.b}}`, `{{list.length}}`, `{{.}}` - variable output
//! - `{{{name}}}`, `{{&name}}` - same as `{{name}}` (chat text is never HTML-escaped)
//! - `{{#name}}...{{/name}}` - section: arrays iterate, objects push scope, other truthy values render once
//! - `{{^name}}...{{/name}}` - inverted section, rendered when the value is falsy or missing
//! - `{{! comment}}`
//!
//! While iterating an array every element scope also answers `first`, `last` and
//! `index` (unless the element defines them itself). That is what lets a text say
//! `{{#cards}}{{name}}{{^last}}, {{/last}}{{/cards}}` without a loop construct.
//!
//! Rendering never fails: missing variables are empty, malformed or unbalanced
//! tags are emitted literally.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Var(String),
    Section {
        path: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    nodes: Vec<Node>,
}

struct OpenSection {
    path: String,
    inverted: bool,
    raw_tag: String,
    children: Vec<Node>,
}

impl Template {
    pub fn parse(src: &str) -> Template {
        let mut root: Vec<Node> = Vec::new();
        let mut stack: Vec<OpenSection> = Vec::new();
        let mut rest = src;

        fn push(root: &mut Vec<Node>, stack: &mut [OpenSection], node: Node) {
            let target = match stack.last_mut() {
                Some(open) => &mut open.children,
                None => root,
            };
            if let (Node::Text(t), Some(Node::Text(prev))) = (&node, target.last_mut()) {
                prev.push_str(t);
                return;
            }
            target.push(node);
        }

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                push(&mut root, &mut stack, Node::Text(rest[..start].to_string()));
            }
            let after = &rest[start..];
            let (close, inner_start) = if after.starts_with("{{{") {
                ("}}}", 3)
            } else {
                ("}}", 2)
            };
            let Some(close_at) = after[inner_start..].find(close) else {
                push(&mut root, &mut stack, Node::Text(after.to_string()));
                rest = "";
                break;
            };
            let raw_tag = &after[..inner_start + close_at + close.len()];
            let inner = after[inner_start..inner_start + close_at].trim();
            rest = &after[raw_tag.len()..];

            if inner_start == 3 {
                push(&mut root, &mut stack, Node::Var(inner.to_string()));
                continue;
            }

            let mut chars = inner.chars();
            let sigil = chars.next();
            let name = chars.as_str().trim();
            match sigil {
                Some('!') => {}
                Some('#') | Some('^') if !name.is_empty() => stack.push(OpenSection {
                    path: name.to_string(),
                    inverted: sigil == Some('^'),
                    raw_tag: raw_tag.to_string(),
                    children: Vec::new(),
                }),
                Some('/') if stack.last().map(|s| s.path == name).unwrap_or(false) => {
                    if let Some(open) = stack.pop() {
                        let section = Node::Section {
                            path: open.path,
                            inverted: open.inverted,
                            children: open.children,
                        };
                        push(&mut root, &mut stack, section);
                    }
                }
                Some('&') if !name.is_empty() => push(&mut root, &mut stack, Node::Var(name.to_string())),
                Some(c) if c != '#' && c != '^' && c != '/' && c != '&' => {
                    push(&mut root, &mut stack, Node::Var(inner.to_string()))
                }
                _ => push(&mut root, &mut stack, Node::Text(raw_tag.to_string())),
            }
        }
        if !rest.is_empty() {
            push(&mut root, &mut stack, Node::Text(rest.to_string()));
        }

        // Unclosed sections fall back to literal text.
        while let Some(open) = stack.pop() {
            push(&mut root, &mut stack, Node::Text(open.raw_tag));
            for child in open.children {
                push(&mut root, &mut stack, child);
            }
        }

        Template { nodes: root }
    }

    pub fn render(&self, env: &Value) -> String {
        let mut out = String::new();
        let mut scopes: Vec<Value> = vec![env.clone()];
        render_nodes(&self.nodes, &mut scopes, &mut out);
        out
    }
}

/// Parse and render in one go.
pub fn render(src: &str, env: &Value) -> String {
    Template::parse(src).render(env)
}

fn render_nodes(nodes: &[Node], scopes: &mut Vec<Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Var(path) => {
                if let Some(v) = lookup(scopes, path) {
                    out.push_str(&format_value(&v));
                }
            }
            Node::Section {
                path,
                inverted,
                children,
            } => {
                let value = lookup(scopes, path);
                let truthy = value.as_ref().map(is_truthy).unwrap_or(false);
                if *inverted {
                    if !truthy {
                        render_nodes(children, scopes, out);
                    }
                    continue;
                }
                if !truthy {
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        let len = items.len();
                        for (index, item) in items.into_iter().enumerate() {
                            let pushed = push_element(scopes, item, index, len);
                            render_nodes(children, scopes, out);
                            scopes.truncate(scopes.len() - pushed);
                        }
                    }
                    Some(v) => {
                        scopes.push(v);
                        render_nodes(children, scopes, out);
                        scopes.pop();
                    }
                    None => {}
                }
            }
        }
    }
}

/// Push the scope frames for one array element; returns how many were pushed.
fn push_element(scopes: &mut Vec<Value>, item: Value, index: usize, len: usize) -> usize {
    let flags = |map: &mut Map<String, Value>| {
        map.entry("first").or_insert(Value::Bool(index == 0));
        map.entry("last").or_insert(Value::Bool(index + 1 == len));
        map.entry("index").or_insert(Value::from(index));
    };
    match item {
        Value::Object(mut map) => {
            flags(&mut map);
            scopes.push(Value::Object(map));
            1
        }
        other => {
            let mut meta = Map::new();
            flags(&mut meta);
            scopes.push(Value::Object(meta));
            scopes.push(other);
            2
        }
    }
}

fn lookup(scopes: &[Value], path: &str) -> Option<Value> {
    if path == "." {
        return scopes.last().cloned();
    }
    let mut segments = path.split('.');
    let head = segments.next()?;
    let mut current = scopes
        .iter()
        .rev()
        .find_map(|scope| scope.as_object().and_then(|m| m.get(head)))?
        .clone();
    for seg in segments {
        current = match current {
            Value::Object(mut m) => m.remove(seg)?,
            Value::Array(items) if seg == "length" => Value::from(items.len()),
            Value::Array(mut items) => {
                let idx: usize = seg.parse().ok()?;
                if idx >= items.len() {
                    return None;
                }
                items.swap_remove(idx)
            }
            _ => return None,
        };
    }
    Some(current)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

fn format_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn variables_and_missing_values() {
        let env = json!({"name": "Alice", "hp": 12, "card": {"name": "Bob"}});
        assert_eq!(render("{{name}} has {{hp}} HP", &env), "Alice has 12 HP");
        assert_eq!(render("[{{nope}}]", &env), "[]");
        assert_eq!(render("{{card.name}}/{{card.nope}}", &env), "Bob/");
        assert_eq!(render("{{{name}}} {{& name}}", &env), "Alice Alice");
    }

    #[test]
    fn list_with_last_flag() {
        let env = json!({"cards": [{"name": "A"}, {"name": "B"}, {"name": "C"}]});
        assert_eq!(
            render("{{#cards}}{{name}}{{^last}}, {{/last}}{{/cards}}", &env),
            "A, B, C"
        );
        assert_eq!(render("{{cards.length}}", &env), "3");
    }

    #[test]
    fn explicit_last_flag_wins() {
        let env = json!({"xs": [{"n": 1, "last": true}, {"n": 2, "last": false}]});
        assert_eq!(render("{{#xs}}{{n}}{{#last}}!{{/last}}{{/xs}}", &env), "1!2");
    }

    #[test]
    fn scalar_arrays_and_dot() {
        let env = json!({"xs": ["a", "b"]});
        assert_eq!(render("{{#xs}}{{.}}{{^last}}+{{/last}}{{/xs}}", &env), "a+b");
    }

    #[test]
    fn inverted_and_falsy() {
        let env = json!({"empty": [], "zero": 0, "blank": "", "yes": true});
        assert_eq!(render("{{^empty}}none{{/empty}}", &env), "none");
        assert_eq!(render("{{#zero}}x{{/zero}}{{^zero}}0{{/zero}}", &env), "0");
        assert_eq!(render("{{#blank}}x{{/blank}}{{^missing}}m{{/missing}}", &env), "m");
        assert_eq!(render("{{#yes}}y{{/yes}}", &env), "y");
    }

    #[test]
    fn outer_scope_is_visible_inside_sections() {
        let env = json!({"who": "Eve", "xs": [{"n": 1}]});
        assert_eq!(render("{{#xs}}{{who}}:{{n}}{{/xs}}", &env), "Eve:1");
    }

    #[test]
    fn malformed_tags_render_literally() {
        let env = json!({"a": 1});
        assert_eq!(render("{{#a}}open", &env), "{{#a}}open");
        assert_eq!(render("x {{/a}} y", &env), "x {{/a}} y");
        assert_eq!(render("dangling {{a", &env), "dangling {{a");
        assert_eq!(render("{{! note}}ok", &env), "ok");
    }

    #[test]
    fn floats_render_cleanly() {
        let env = json!({"a": 3.0, "b": 2.5});
        assert_eq!(render("{{a}} {{b}}", &env), "3 2.5");
    }
}
