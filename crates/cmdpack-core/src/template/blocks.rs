//! `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}` structure.
//!
//! Parsing produces a context-independent [`Skeleton`]; expansion evaluates
//! the branch conditions against a context and emits the chosen text.
//! Blocks are resolved innermost-first, one nesting level per pass. Tags
//! still unmatched when the pass bound is reached stay as literal text.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: String,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    pub nodes: Vec<Node>,
    /// Control tags left as literal text because they never matched.
    pub unresolved_tags: usize,
}

impl Skeleton {
    pub fn parse(template: &str, max_passes: usize) -> Arc<Skeleton> {
        Arc::new(parse(template, max_passes))
    }

    /// Expand against `cond`, which decides each branch condition in order.
    pub fn expand(&self, cond: &mut dyn FnMut(&str) -> bool) -> String {
        let mut out = String::new();
        expand_nodes(&self.nodes, cond, &mut out);
        out
    }
}

fn expand_nodes(nodes: &[Node], cond: &mut dyn FnMut(&str) -> bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::If {
                branches,
                otherwise,
            } => {
                match branches.iter().find(|b| cond(&b.condition)) {
                    Some(branch) => expand_nodes(&branch.body, cond, out),
                    None => {
                        if let Some(body) = otherwise {
                            expand_nodes(body, cond, out);
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tag scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TagKind {
    If(String),
    Elif(String),
    Else,
    Endif,
}

#[derive(Debug, Clone)]
enum Item {
    Text(String),
    Tag { kind: TagKind, raw: String },
    Block(Node),
}

fn classify(inner: &str) -> Option<TagKind> {
    let inner = inner.trim();
    let (word, rest) = match inner.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (inner, ""),
    };
    match word {
        "if" if !rest.is_empty() => Some(TagKind::If(rest.to_string())),
        "elif" | "elseif" if !rest.is_empty() => Some(TagKind::Elif(rest.to_string())),
        "else" if rest.is_empty() => Some(TagKind::Else),
        "else" => rest
            .strip_prefix("if")
            .filter(|c| c.starts_with(char::is_whitespace))
            .map(|c| TagKind::Elif(c.trim().to_string())),
        "endif" if rest.is_empty() => Some(TagKind::Endif),
        _ => None,
    }
}

fn scan(template: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut text = String::new();
    let mut rest = template;
    while let Some(start) = rest.find("{%") {
        let Some(len) = rest[start + 2..].find("%}") else {
            break;
        };
        let end = start + 2 + len + 2;
        text.push_str(&rest[..start]);
        let raw = &rest[start..end];
        match classify(&raw[2..raw.len() - 2]) {
            Some(kind) => {
                if !text.is_empty() {
                    items.push(Item::Text(std::mem::take(&mut text)));
                }
                items.push(Item::Tag {
                    kind,
                    raw: raw.to_string(),
                });
            }
            None => {
                tracing::warn!(tag = raw, "unknown template tag left as text");
                text.push_str(raw);
            }
        }
        rest = &rest[end..];
    }
    text.push_str(rest);
    if !text.is_empty() {
        items.push(Item::Text(text));
    }
    items
}

// ---------------------------------------------------------------------------
// Innermost-first resolution
// ---------------------------------------------------------------------------

fn parse(template: &str, max_passes: usize) -> Skeleton {
    let mut items = scan(template);
    let mut passes = 0;
    while passes < max_passes && has_open_tags(&items) {
        let (next, changed) = resolve_innermost(items);
        items = next;
        passes += 1;
        if !changed {
            break;
        }
    }

    let mut unresolved_tags = 0;
    let mut nodes: Vec<Node> = Vec::with_capacity(items.len());
    for item in items {
        let node = match item {
            Item::Text(t) => Node::Text(t),
            Item::Block(node) => node,
            Item::Tag { raw, .. } => {
                unresolved_tags += 1;
                Node::Text(raw)
            }
        };
        push_node(&mut nodes, node);
    }
    if unresolved_tags > 0 {
        tracing::warn!(
            unresolved_tags,
            passes,
            "unterminated control block left as literal text"
        );
    }
    Skeleton {
        nodes,
        unresolved_tags,
    }
}

fn has_open_tags(items: &[Item]) -> bool {
    items.iter().any(|i| matches!(i, Item::Tag { .. }))
}

/// One pass: collapse every `if ... endif` run that contains no other `if`.
fn resolve_innermost(items: Vec<Item>) -> (Vec<Item>, bool) {
    let mut out: Vec<Item> = Vec::with_capacity(items.len());
    let mut open: Option<usize> = None;
    let mut changed = false;
    for item in items {
        match &item {
            Item::Tag {
                kind: TagKind::If(_),
                ..
            } => {
                open = Some(out.len());
                out.push(item);
            }
            Item::Tag {
                kind: TagKind::Endif,
                ..
            } => match open.take() {
                Some(start) => {
                    let run: Vec<Item> = out.drain(start..).collect();
                    out.push(Item::Block(build_block(run)));
                    changed = true;
                }
                None => out.push(item),
            },
            _ => out.push(item),
        }
    }
    (out, changed)
}

/// `run` starts with the `if` tag; the closing `endif` is already consumed.
fn build_block(run: Vec<Item>) -> Node {
    let mut iter = run.into_iter();
    let first_condition = match iter.next() {
        Some(Item::Tag {
            kind: TagKind::If(c),
            ..
        }) => c,
        _ => String::new(),
    };

    let mut branches = vec![Branch {
        condition: first_condition,
        body: Vec::new(),
    }];
    let mut otherwise: Option<Vec<Node>> = None;

    for item in iter {
        let node = match item {
            Item::Tag {
                kind: TagKind::Elif(c),
                raw,
            } => {
                if otherwise.is_some() {
                    tracing::warn!(tag = %raw, "elif after else left as text");
                    Node::Text(raw)
                } else {
                    branches.push(Branch {
                        condition: c,
                        body: Vec::new(),
                    });
                    continue;
                }
            }
            Item::Tag {
                kind: TagKind::Else,
                raw,
            } => {
                if otherwise.is_some() {
                    tracing::warn!(tag = %raw, "duplicate else left as text");
                    Node::Text(raw)
                } else {
                    otherwise = Some(Vec::new());
                    continue;
                }
            }
            Item::Tag { raw, .. } => Node::Text(raw),
            Item::Text(t) => Node::Text(t),
            Item::Block(node) => node,
        };
        let body = match otherwise.as_mut() {
            Some(body) => body,
            None => match branches.last_mut() {
                Some(branch) => &mut branch.body,
                None => continue,
            },
        };
        push_node(body, node);
    }

    Node::If {
        branches,
        otherwise,
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let (Some(Node::Text(prev)), Node::Text(next)) = (nodes.last_mut(), &node) {
        prev.push_str(next);
        return;
    }
    nodes.push(node);
}
