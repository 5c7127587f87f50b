//! Indentation-based markup compiler.
//!
//! Compiles a compact, whitespace-significant markup dialect to HTML:
//!
//! ```text
//! doctype html
//! div#login.panel(ng-controller="LoginCtrl", hidden)
//!   //- not rendered
//!   h1.title Sign in
//!   p.
//!     Multi-line text block,
//!     kept verbatim.
//!   ul: li: a(href="#") Link
//!   | piped text
//!   <span>literal html</span>
//!   img(src="/logo.png")
//! ```
//!
//! Nesting is expressed by indentation. Attribute values must be quoted
//! literals, numbers, or the bare `true`/`false` flags.

use super::CompileError;
use std::path::{Path, PathBuf};

/// Elements rendered without a closing tag and without content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Doctype(String),
    Comment(String),
    Text(Vec<String>),
    Literal { html: String, children: Vec<Node> },
    Element(Element),
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
    self_closing: bool,
    children: Vec<Node>,
    line: usize,
}

impl Element {
    fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }
}

/// What follows the tag, id, classes and attributes on an element line.
#[derive(Debug, PartialEq)]
enum Tail {
    Nothing,
    Text(String),
    TextBlock,
    SelfClose,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    indent: usize,
    raw: &'a str,
    content: &'a str,
}

impl Line<'_> {
    fn is_blank(&self) -> bool {
        self.content.is_empty()
    }
}

/// Character cursor over one line of content, tracking columns.
struct Cursor<'a> {
    s: &'a str,
    pos: usize,
    col_base: usize,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str, col_base: usize) -> Self {
        Self { s, pos: 0, col_base }
    }

    fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.s[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn column(&self) -> usize {
        self.col_base + self.s[..self.pos].chars().count()
    }

    fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.bump();
        }
        &self.s[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(|c| c == ' ' || c == '\t');
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

struct Parser<'a> {
    file: PathBuf,
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(file: &Path, text: &'a str) -> Result<Self, CompileError> {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let mut lines = Vec::new();
        for (i, raw) in text.lines().enumerate() {
            let indent_str: &str = {
                let end = raw.len() - raw.trim_start_matches([' ', '\t']).len();
                &raw[..end]
            };
            let content = raw[indent_str.len()..].trim_end();
            if !content.is_empty() && indent_str.contains(' ') && indent_str.contains('\t') {
                return Err(CompileError::with_location(
                    file,
                    i + 1,
                    1,
                    "mixed tabs and spaces in indentation",
                ));
            }
            lines.push(Line { number: i + 1, indent: indent_str.len(), raw, content });
        }
        Ok(Self { file: file.to_path_buf(), lines, pos: 0 })
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> CompileError {
        CompileError::with_location(&self.file, line, column, message)
    }

    fn skip_blank(&mut self) {
        while self.lines.get(self.pos).is_some_and(|l| l.is_blank()) {
            self.pos += 1;
        }
    }

    fn next_content_line(&self) -> Option<Line<'a>> {
        self.lines[self.pos..].iter().find(|l| !l.is_blank()).copied()
    }

    /// Parse sibling nodes indented deeper than `parent_indent`.
    fn parse_children(&mut self, parent_indent: Option<usize>) -> Result<Vec<Node>, CompileError> {
        let mut nodes = Vec::new();
        let mut level: Option<usize> = None;

        loop {
            self.skip_blank();
            let Some(line) = self.lines.get(self.pos).copied() else { break };
            if parent_indent.is_some_and(|p| line.indent <= p) {
                break;
            }
            match level {
                None => level = Some(line.indent),
                Some(l) if line.indent > l => {
                    return Err(self.error(line.number, 1, "unexpected indentation"));
                }
                Some(l) if line.indent < l => {
                    return Err(self.error(line.number, 1, "inconsistent indentation"));
                }
                Some(_) => {}
            }
            if let Some(node) = self.parse_line()? {
                nodes.push(node);
            }
        }

        Ok(nodes)
    }

    /// Consume the lines nested under a line at `indent`, with the common
    /// indentation removed. Trailing blank lines are dropped.
    fn take_block(&mut self, indent: usize) -> Vec<String> {
        let start = self.pos;
        while self.lines.get(self.pos).is_some_and(|l| l.is_blank() || l.indent > indent) {
            self.pos += 1;
        }
        let block = &self.lines[start..self.pos];
        let min_indent =
            block.iter().filter(|l| !l.is_blank()).map(|l| l.indent).min().unwrap_or(0);

        let mut out: Vec<String> = block
            .iter()
            .map(|l| if l.is_blank() { String::new() } else { l.raw[min_indent..].trim_end().to_string() })
            .collect();
        while out.last().is_some_and(|l| l.is_empty()) {
            out.pop();
        }
        out
    }

    fn reject_children(&self, line: Line<'_>, what: &str) -> Result<(), CompileError> {
        match self.next_content_line() {
            Some(next) if next.indent > line.indent => {
                Err(self.error(next.number, 1, format!("{} cannot have nested content", what)))
            }
            _ => Ok(()),
        }
    }

    fn parse_line(&mut self) -> Result<Option<Node>, CompileError> {
        let line = self.lines[self.pos];
        self.pos += 1;
        let content = line.content;

        if content.starts_with("//-") {
            self.take_block(line.indent);
            return Ok(None);
        }

        if let Some(rest) = content.strip_prefix("//") {
            let body = self.take_block(line.indent);
            let text = if body.is_empty() {
                rest.to_string()
            } else {
                let mut text = format!("{}\n", rest.trim_end());
                for l in body {
                    text.push_str(&l);
                    text.push('\n');
                }
                text
            };
            return Ok(Some(Node::Comment(text)));
        }

        if content == "doctype" || content.starts_with("doctype ") {
            self.reject_children(line, "doctype")?;
            let value = content["doctype".len()..].trim();
            let value = if value.is_empty() { "html" } else { value };
            return Ok(Some(Node::Doctype(value.to_string())));
        }

        if let Some(rest) = content.strip_prefix('|') {
            self.reject_children(line, "piped text")?;
            let text = rest.strip_prefix(' ').unwrap_or(rest);
            return Ok(Some(Node::Text(vec![text.to_string()])));
        }

        if content.starts_with('<') {
            let children = self.parse_children(Some(line.indent))?;
            return Ok(Some(Node::Literal { html: content.to_string(), children }));
        }

        self.parse_element(line).map(Some)
    }

    fn parse_element(&mut self, line: Line<'a>) -> Result<Node, CompileError> {
        let mut cursor = Cursor::new(line.content, line.indent + 1);
        let mut chain = Vec::new();

        let tail = loop {
            let (element, expands) = self.parse_head(&mut cursor, line.number)?;
            chain.push(element);
            if !expands {
                break self.parse_tail(&mut cursor, line.number)?;
            }
        };

        if let Some(last) = chain.last_mut() {
            match tail {
                Tail::Nothing => {
                    last.children = self.parse_children(Some(line.indent))?;
                }
                Tail::Text(text) => {
                    last.children.push(Node::Text(vec![text]));
                    last.children.extend(self.parse_children(Some(line.indent))?);
                }
                Tail::TextBlock => {
                    let block = self.take_block(line.indent);
                    if !block.is_empty() {
                        last.children.push(Node::Text(block));
                    }
                }
                Tail::SelfClose => {
                    last.self_closing = true;
                    self.reject_children(line, "self-closing element")?;
                }
            }
        }

        let mut node = chain.pop().ok_or_else(|| self.error(line.number, 1, "expected tag"))?;
        self.check_void(&node)?;
        while let Some(mut parent) = chain.pop() {
            parent.children.push(Node::Element(node));
            self.check_void(&parent)?;
            node = parent;
        }
        Ok(Node::Element(node))
    }

    fn check_void(&self, element: &Element) -> Result<(), CompileError> {
        if element.is_void() && !element.children.is_empty() {
            return Err(self.error(
                element.line,
                1,
                format!("void element <{}> cannot have content", element.tag),
            ));
        }
        Ok(())
    }

    /// Parse `tag#id.class(attrs)`. Returns the element and whether a
    /// `: child` block expansion follows.
    fn parse_head(
        &self,
        cursor: &mut Cursor<'_>,
        line: usize,
    ) -> Result<(Element, bool), CompileError> {
        let start_col = cursor.column();
        let mut tag = String::new();
        if cursor.peek().is_some_and(|c| c.is_alphabetic()) {
            loop {
                match cursor.peek() {
                    Some(c) if is_ident_char(c) => {
                        tag.push(c);
                        cursor.bump();
                    }
                    Some(':') if cursor.peek_second().is_some_and(|c| c.is_alphanumeric()) => {
                        tag.push(':');
                        cursor.bump();
                    }
                    _ => break,
                }
            }
        }

        let mut element = Element {
            tag,
            id: None,
            classes: Vec::new(),
            attrs: Vec::new(),
            self_closing: false,
            children: Vec::new(),
            line,
        };
        let mut has_shorthand = false;

        loop {
            match cursor.peek() {
                Some('#') => {
                    let col = cursor.column();
                    cursor.bump();
                    let id = cursor.take_while(is_ident_char);
                    if id.is_empty() {
                        return Err(self.error(line, col, "expected id after '#'"));
                    }
                    element.id = Some(id.to_string());
                    has_shorthand = true;
                }
                Some('.') if cursor.peek_second().is_some_and(is_ident_char) => {
                    cursor.bump();
                    element.classes.push(cursor.take_while(is_ident_char).to_string());
                    has_shorthand = true;
                }
                Some('(') => {
                    element.attrs.extend(self.parse_attrs(cursor, line)?);
                    has_shorthand = true;
                }
                _ => break,
            }
        }

        if element.tag.is_empty() {
            if !has_shorthand {
                let found = cursor.peek().map(|c| format!("'{}'", c)).unwrap_or_default();
                return Err(self.error(line, start_col, format!("expected tag name, found {}", found)));
            }
            element.tag = "div".to_string();
        }

        if cursor.peek() == Some(':') {
            cursor.bump();
            cursor.skip_whitespace();
            if cursor.peek().is_none() {
                return Err(self.error(line, cursor.column(), "expected element after ':'"));
            }
            return Ok((element, true));
        }

        Ok((element, false))
    }

    fn parse_tail(&self, cursor: &mut Cursor<'_>, line: usize) -> Result<Tail, CompileError> {
        match cursor.peek() {
            None => Ok(Tail::Nothing),
            Some('.') if cursor.rest() == "." => Ok(Tail::TextBlock),
            Some('/') => {
                let col = cursor.column();
                cursor.bump();
                if cursor.rest().trim().is_empty() {
                    Ok(Tail::SelfClose)
                } else {
                    Err(self.error(line, col, "unexpected content after '/'"))
                }
            }
            Some(' ') | Some('\t') => {
                cursor.bump();
                Ok(Tail::Text(cursor.rest().to_string()))
            }
            Some('=') | Some('!') => Err(self.error(
                line,
                cursor.column(),
                "buffered code is not supported; use plain text",
            )),
            Some(c) => Err(self.error(line, cursor.column(), format!("unexpected character '{}'", c))),
        }
    }

    fn parse_attrs(
        &self,
        cursor: &mut Cursor<'_>,
        line: usize,
    ) -> Result<Vec<(String, Option<String>)>, CompileError> {
        let open_col = cursor.column();
        cursor.bump();
        let mut attrs = Vec::new();

        loop {
            cursor.take_while(|c| c == ' ' || c == '\t' || c == ',');
            match cursor.peek() {
                None => return Err(self.error(line, open_col, "unterminated attribute list")),
                Some(')') => {
                    cursor.bump();
                    return Ok(attrs);
                }
                Some(_) => {}
            }

            let name_col = cursor.column();
            let name = cursor
                .take_while(|c| !matches!(c, '=' | ',' | ')' | ' ' | '\t' | '"' | '\''));
            if name.is_empty() {
                let c = cursor.peek().unwrap_or(' ');
                return Err(self.error(line, name_col, format!("unexpected character '{}'", c)));
            }

            cursor.skip_whitespace();
            if cursor.peek() != Some('=') {
                attrs.push((name.to_string(), None));
                continue;
            }
            cursor.bump();
            cursor.skip_whitespace();

            let value_col = cursor.column();
            match cursor.peek() {
                Some(quote @ ('"' | '\'')) => {
                    cursor.bump();
                    let mut value = String::new();
                    loop {
                        match cursor.bump() {
                            Some('\\') => {
                                if let Some(escaped) = cursor.bump() {
                                    value.push(escaped);
                                }
                            }
                            Some(c) if c == quote => break,
                            Some(c) => value.push(c),
                            None => {
                                return Err(self.error(line, value_col, "unterminated attribute value"));
                            }
                        }
                    }
                    attrs.push((name.to_string(), Some(value)));
                }
                _ => {
                    let bare = cursor.take_while(|c| !matches!(c, ',' | ')' | ' ' | '\t'));
                    match bare {
                        "true" => attrs.push((name.to_string(), None)),
                        "false" => {}
                        _ if !bare.is_empty() && bare.parse::<f64>().is_ok() => {
                            attrs.push((name.to_string(), Some(bare.to_string())));
                        }
                        _ => {
                            return Err(self.error(
                                line,
                                value_col,
                                format!(
                                    "unsupported attribute value '{}' for '{}'; quote literal values",
                                    bare, name
                                ),
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_attrs(element: &Element) -> String {
    let mut out = String::new();

    let id = element
        .attrs
        .iter()
        .find(|(name, _)| name == "id")
        .and_then(|(_, v)| v.clone())
        .or_else(|| element.id.clone());
    if let Some(id) = id {
        out.push_str(&format!(" id=\"{}\"", escape_attr(&id)));
    }

    let mut classes = element.classes.clone();
    for (name, value) in &element.attrs {
        if name == "class" {
            if let Some(value) = value {
                classes.extend(value.split_whitespace().map(str::to_string));
            }
        }
    }
    if !classes.is_empty() {
        out.push_str(&format!(" class=\"{}\"", escape_attr(&classes.join(" "))));
    }

    for (name, value) in &element.attrs {
        if name == "id" || name == "class" {
            continue;
        }
        match value {
            Some(value) => out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value))),
            None => out.push_str(&format!(" {}", name)),
        }
    }
    out
}

fn render_nodes(nodes: &[Node], depth: usize, pretty: bool, out: &mut String) {
    for node in nodes {
        render_node(node, depth, pretty, out);
    }
}

fn render_node(node: &Node, depth: usize, pretty: bool, out: &mut String) {
    let indent = if pretty { "  ".repeat(depth) } else { String::new() };
    let nl = if pretty { "\n" } else { "" };

    match node {
        Node::Doctype(value) => {
            out.push_str(&format!("{}<!DOCTYPE {}>{}", indent, value, nl));
        }
        Node::Comment(text) => {
            out.push_str(&format!("{}<!--{}-->{}", indent, text, nl));
        }
        Node::Text(lines) => {
            if pretty {
                for line in lines {
                    out.push_str(&indent);
                    out.push_str(line);
                    out.push('\n');
                }
            } else {
                out.push_str(&lines.join("\n"));
            }
        }
        Node::Literal { html, children } => {
            out.push_str(&format!("{}{}{}", indent, html, nl));
            render_nodes(children, depth + 1, pretty, out);
        }
        Node::Element(element) => {
            let open = format!("<{}{}", element.tag, render_attrs(element));
            if element.is_void() {
                out.push_str(&format!("{}{}>{}", indent, open, nl));
            } else if element.self_closing {
                out.push_str(&format!("{}{}/>{}", indent, open, nl));
            } else {
                match element.children.as_slice() {
                    [] => out.push_str(&format!("{}{}></{}>{}", indent, open, element.tag, nl)),
                    [Node::Text(lines)] if lines.len() == 1 => out.push_str(&format!(
                        "{}{}>{}</{}>{}",
                        indent, open, lines[0], element.tag, nl
                    )),
                    children => {
                        out.push_str(&format!("{}{}>{}", indent, open, nl));
                        render_nodes(children, depth + 1, pretty, out);
                        out.push_str(&format!("{}</{}>{}", indent, element.tag, nl));
                    }
                }
            }
        }
    }
}

/// Compiles markup templates to HTML.
#[derive(Debug, Clone)]
pub struct TemplateCompiler {
    pretty: bool,
}

impl TemplateCompiler {
    /// Create a compiler; `pretty` indents nested elements on separate lines.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Compile template `text` read from `file` to HTML.
    pub fn compile_str(&self, file: &Path, text: &str) -> Result<String, CompileError> {
        let mut parser = Parser::new(file, text)?;
        let nodes = parser.parse_children(None)?;

        let mut out = String::new();
        render_nodes(&nodes, 0, self.pretty, &mut out);
        if self.pretty {
            while out.ends_with('\n') {
                out.pop();
            }
        }
        Ok(out)
    }
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new(true)
    }
}
