//! DSL compiler
//!
//! Turns rule text into path scopes of [`RuleNode`]s. Compilation never
//! fails: fragments that cannot be understood are skipped and reported as
//! [`Diagnostic`]s, and everything else is kept.
//!
//! ```text
//! page-type: vod-detail
//! path: /vod/** {
//!     section: episodes .playlist {
//!         text: h3 [transform: trim]
//!         items: li {
//!             text: a
//!             link: a
//!         } [limit: 20]
//!     } [img-ratio: 16/9]
//! }
//! ```

use std::ops::Range;

use serde::Serialize;

use super::node::{Field, RuleNode, RuleNodeBuilder};
use super::options::{OptionSet, OptionValue, VALUE};
use super::path::{select_rules, PathScope};
use super::scanner::{self, Block, Malformed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    UnmatchedBrace,
    UnterminatedComment,
    MissingSelector,
    InvalidName,
    InvalidPathPattern,
    DuplicatePath,
    InvalidOptionValue,
    ReservedOption,
    UnknownLine,
    NestedItems,
    DuplicateItems,
    StrayContent,
}

/// A skipped or ignored DSL fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// 1-based line in the rule text
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compilation {
    /// First `page-type:` declaration, if any
    pub page_type: Option<String>,
    /// Path scopes in declaration order
    pub scopes: Vec<PathScope>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// Rules for a request path; see [`select_rules`].
    pub fn select(&self, path: &str) -> &[RuleNode] {
        select_rules(&self.scopes, path)
    }

    pub fn scope(&self, pattern: &str) -> Option<&PathScope> {
        self.scopes.iter().find(|s| s.pattern() == pattern)
    }
}

/// Compile rule text. Each call is independent and returns a fresh result.
pub fn compile(dsl: &str) -> Compilation {
    let (text, unterminated) = scanner::normalize(dsl);
    let mut compiler = Compiler {
        text: &text,
        diagnostics: Vec::new(),
    };
    if let Some(line) = unterminated {
        compiler.push(
            DiagnosticKind::UnterminatedComment,
            line,
            "comment is never closed; the rest of the text is ignored".to_string(),
        );
    }
    compiler.run()
}

struct Compiler<'a> {
    text: &'a str,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Compiler<'a> {
    fn run(mut self) -> Compilation {
        let page_type = self.page_type();
        let whole = 0..self.text.len();

        let paths = scanner::scan_blocks(self.text, whole.clone(), "path");
        self.report_malformed(&paths.malformed, "path");

        let scopes = if paths.blocks.is_empty() {
            vec![PathScope::catch_all(self.sections(whole))]
        } else {
            let stray = scanner::scan_blocks(self.text, whole, "section");
            for block in &stray.blocks {
                self.at(
                    DiagnosticKind::StrayContent,
                    block.start,
                    "section outside any path block is ignored".to_string(),
                );
            }
            self.path_scopes(&paths.blocks)
        };

        tracing::debug!(
            scopes = scopes.len(),
            diagnostics = self.diagnostics.len(),
            "compiled rules"
        );

        Compilation {
            page_type,
            scopes,
            diagnostics: self.diagnostics,
        }
    }

    fn page_type(&self) -> Option<String> {
        self.text.lines().find_map(|line| {
            let line = line.trim();
            let head = line.get(..9)?;
            if !head.eq_ignore_ascii_case("page-type") {
                return None;
            }
            let value = line[9..].trim_start().strip_prefix(':')?;
            value.split_whitespace().next().map(String::from)
        })
    }

    fn path_scopes(&mut self, blocks: &[Block]) -> Vec<PathScope> {
        let mut scopes: Vec<PathScope> = Vec::new();
        for block in blocks {
            let pattern = self.text[block.header.clone()].trim().to_string();
            if pattern.is_empty() {
                self.at(
                    DiagnosticKind::InvalidPathPattern,
                    block.start,
                    "path block without a pattern".to_string(),
                );
                continue;
            }
            if scopes.iter().any(|s| s.pattern() == pattern) {
                self.at(
                    DiagnosticKind::DuplicatePath,
                    block.start,
                    format!("path `{}` is already defined; later block ignored", pattern),
                );
                continue;
            }

            let rules = self.sections(block.body.clone());
            if rules.is_empty() {
                tracing::debug!(pattern = %pattern, "path block has no sections; skipped");
                continue;
            }
            match PathScope::new(pattern.clone(), rules) {
                Ok(scope) => scopes.push(scope),
                Err(err) => self.at(
                    DiagnosticKind::InvalidPathPattern,
                    block.start,
                    format!("invalid path pattern `{}`: {}", pattern, err),
                ),
            }
        }
        scopes
    }

    fn sections(&mut self, range: Range<usize>) -> Vec<RuleNode> {
        let scan = scanner::scan_blocks(self.text, range, "section");
        self.report_malformed(&scan.malformed, "section");

        let mut nodes = Vec::new();
        for block in &scan.blocks {
            if let Some(node) = self.section(block) {
                tracing::debug!(section = node.name(), selector = node.selector(), "compiled section");
                nodes.push(node);
            }
        }
        nodes
    }

    fn section(&mut self, block: &Block) -> Option<RuleNode> {
        let header = self.text[block.header.clone()].trim().to_string();
        let (name, selector) = match header.split_once(char::is_whitespace) {
            Some((name, selector)) => (name, selector.trim()),
            None => (header.as_str(), ""),
        };

        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            self.at(
                DiagnosticKind::InvalidName,
                block.start,
                format!("invalid section name `{}`", name),
            );
            return None;
        }
        if selector.is_empty() {
            self.at(
                DiagnosticKind::MissingSelector,
                block.start,
                format!("section `{}` has no selector", name),
            );
            return None;
        }

        let mut builder = RuleNode::builder(name, selector);
        let trailer = self.trailer_options(block);
        builder.section_options(trailer);
        self.section_body(&mut builder, block.body.clone());
        Some(builder.build())
    }

    fn section_body(&mut self, builder: &mut RuleNodeBuilder, body: Range<usize>) {
        let scan = scanner::scan_blocks(self.text, body.clone(), "items");
        self.report_malformed(&scan.malformed, "items");

        let mut holes: Vec<Range<usize>> = scan.blocks.iter().map(|b| b.start..b.end).collect();
        holes.extend(scan.malformed.iter().map(|m| m.start..self.line_end(m.start)));

        for block in &scan.blocks {
            if builder.has_item_template() {
                self.at(
                    DiagnosticKind::DuplicateItems,
                    block.start,
                    "only the first items block of a section is used".to_string(),
                );
                continue;
            }
            if let Some(template) = self.item_template(block) {
                builder.item_template(template);
            }
        }

        let lines = scanner::lines_excluding(self.text, body, &holes);
        self.field_lines(builder, &lines);
    }

    fn item_template(&mut self, block: &Block) -> Option<RuleNode> {
        let selector = self.text[block.header.clone()].trim().to_string();
        if selector.is_empty() {
            self.at(
                DiagnosticKind::MissingSelector,
                block.start,
                "items block has no selector".to_string(),
            );
            return None;
        }

        let mut builder = RuleNode::builder("items", selector);
        let trailer = self.trailer_options(block);
        builder.section_options(trailer);

        let nested = scanner::scan_blocks(self.text, block.body.clone(), "items");
        for inner in &nested.blocks {
            self.at(
                DiagnosticKind::NestedItems,
                inner.start,
                "items blocks cannot be nested; inner block ignored".to_string(),
            );
        }
        let holes: Vec<Range<usize>> = nested.blocks.iter().map(|b| b.start..b.end).collect();
        let lines = scanner::lines_excluding(self.text, block.body.clone(), &holes);
        self.field_lines(&mut builder, &lines);

        Some(builder.build())
    }

    fn field_lines(&mut self, builder: &mut RuleNodeBuilder, lines: &[(usize, &'a str)]) {
        for &(offset, line) in lines {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let field = line
                .split_once(':')
                .and_then(|(key, rhs)| Field::parse(key.trim()).map(|f| (f, rhs)));
            let Some((field, rhs)) = field else {
                self.at(
                    DiagnosticKind::UnknownLine,
                    offset,
                    format!("unrecognized line `{}`", line),
                );
                continue;
            };

            let (selector, groups) = scanner::split_field_rhs(rhs);
            let options = self.options(&groups, offset);

            if selector == "null" {
                // explicit "no value" for this field
            } else if selector.is_empty() {
                self.at(
                    DiagnosticKind::MissingSelector,
                    offset,
                    format!("field `{}` has no selector", field),
                );
            } else if !builder.field_selector(field, selector) {
                tracing::debug!(%field, selector, "duplicate field selector ignored");
            }
            builder.field_options(field, options);
        }
    }

    fn trailer_options(&mut self, block: &Block) -> OptionSet {
        let text = self.text;
        let groups = scanner::option_groups(&text[block.trailer.clone()]);
        self.options(&groups, block.start)
    }

    fn options(&mut self, groups: &[&str], offset: usize) -> OptionSet {
        let mut options = OptionSet::new();
        for group in groups {
            for part in group.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let (key, raw) = match part.split_once(':') {
                    Some((key, raw)) => (key.trim().to_ascii_lowercase(), Some(raw)),
                    None => (part.to_ascii_lowercase(), None),
                };
                if key.is_empty() {
                    continue;
                }
                if key == VALUE {
                    self.at(
                        DiagnosticKind::ReservedOption,
                        offset,
                        format!("option key `{}` is reserved", VALUE),
                    );
                    continue;
                }
                let value = match raw {
                    None => OptionValue::Bool(true),
                    Some(raw) => match OptionValue::parse(&key, raw) {
                        Ok(value) => value,
                        Err(message) => {
                            self.at(DiagnosticKind::InvalidOptionValue, offset, message);
                            continue;
                        }
                    },
                };
                options.insert(key, value);
            }
        }
        options
    }

    fn report_malformed(&mut self, malformed: &[Malformed], keyword: &str) {
        for m in malformed {
            self.at(
                DiagnosticKind::UnmatchedBrace,
                m.start,
                format!("{} block skipped: {}", keyword, m.reason),
            );
        }
    }

    fn line_end(&self, offset: usize) -> usize {
        self.text[offset..]
            .find('\n')
            .map_or(self.text.len(), |i| offset + i)
    }

    fn at(&mut self, kind: DiagnosticKind, offset: usize, message: String) {
        let line = scanner::line_of(self.text, offset);
        self.push(kind, line, message);
    }

    fn push(&mut self, kind: DiagnosticKind, line: usize, message: String) {
        tracing::warn!(?kind, line, "{}", message);
        self.diagnostics.push(Diagnostic {
            kind,
            line,
            message,
        });
    }
}
