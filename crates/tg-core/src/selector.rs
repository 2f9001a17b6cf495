//! CSS-subset Selector Parser and Matcher
//!
//! Catalog rules are plain CSS so browser hosts can hand them straight to
//! `querySelectorAll`. Hosts without a native selector engine (the in-memory
//! DOM used by tests and the CLI) evaluate the compiled form instead.
//!
//! Supported syntax: type selectors, `*`, `.class`, `#id`, `[attr]`,
//! `[attr=v]`, `[attr^=v]`, `[attr*=v]`, `[attr$=v]`, descendant and child
//! combinators, selector lists, and `:has(<selector list>)`.

/// Error type for selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("Unterminated attribute selector")]
    UnterminatedAttribute,
    #[error("Unterminated string")]
    UnterminatedString,
    #[error("Unsupported pseudo-class: {0}")]
    UnsupportedPseudo(String),
}

/// Read-only tree access needed to evaluate a selector.
pub trait SelectorTree {
    type Node: Clone;

    fn tag_name(&self, node: &Self::Node) -> Option<&str>;
    fn attr(&self, node: &Self::Node, name: &str) -> Option<&str>;
    fn parent_node(&self, node: &Self::Node) -> Option<Self::Node>;
    fn child_nodes(&self, node: &Self::Node) -> Vec<Self::Node>;
}

// =============================================================================
// Compiled Form
// =============================================================================

/// A compiled selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
    has: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Contains,
    Suffix,
}

impl Selector {
    /// Parse a CSS selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut parser = Parser::new(source);
        let alternatives = parser.parse_list(false)?;
        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// Compile an ordered rule list into one selector list.
    pub fn from_rules<S: AsRef<str>>(rules: &[S]) -> Result<Self, SelectorError> {
        let joined = rules
            .iter()
            .map(|rule| rule.as_ref().trim())
            .filter(|rule| !rule.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        Self::parse(&joined)
    }

    /// `.class` without going through the parser.
    pub fn for_class(class: &str) -> Self {
        Self::single(
            format!(".{class}"),
            Compound {
                classes: vec![class.to_string()],
                ..Compound::default()
            },
        )
    }

    /// `[name]` without going through the parser.
    pub fn for_attribute(name: &str) -> Self {
        Self::single(
            format!("[{name}]"),
            Compound {
                attrs: vec![AttrMatch {
                    name: name.to_string(),
                    op: AttrOp::Exists,
                    value: String::new(),
                }],
                ..Compound::default()
            },
        )
    }

    fn single(source: String, compound: Compound) -> Self {
        Self {
            source,
            alternatives: vec![Complex {
                compounds: vec![compound],
                combinators: Vec::new(),
            }],
        }
    }

    /// CSS text of this selector, suitable for `querySelectorAll`.
    pub fn css(&self) -> &str {
        &self.source
    }

    /// Number of comma-separated alternatives.
    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    /// Does `node` match any alternative?
    pub fn matches<T: SelectorTree>(&self, tree: &T, node: &T::Node) -> bool {
        self.alternatives.iter().any(|complex| complex.matches(tree, node))
    }
}

impl Complex {
    fn matches<T: SelectorTree>(&self, tree: &T, node: &T::Node) -> bool {
        match self.compounds.len() {
            0 => false,
            n => self.matches_at(tree, node, n - 1),
        }
    }

    fn matches_at<T: SelectorTree>(&self, tree: &T, node: &T::Node, index: usize) -> bool {
        if !self.compounds[index].matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => tree
                .parent_node(node)
                .is_some_and(|parent| self.matches_at(tree, &parent, index - 1)),
            Combinator::Descendant => {
                let mut current = tree.parent_node(node);
                while let Some(ancestor) = current {
                    if self.matches_at(tree, &ancestor, index - 1) {
                        return true;
                    }
                    current = tree.parent_node(&ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches<T: SelectorTree>(&self, tree: &T, node: &T::Node) -> bool {
        if let Some(tag) = &self.tag {
            match tree.tag_name(node) {
                Some(name) if name.eq_ignore_ascii_case(tag) => {}
                _ => return false,
            }
        }

        if let Some(id) = &self.id {
            if tree.attr(node, "id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let class_attr = tree.attr(node, "class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|c| c == class));
            if !has_all {
                return false;
            }
        }

        for attr in &self.attrs {
            let Some(value) = tree.attr(node, &attr.name) else {
                return false;
            };
            let ok = match attr.op {
                AttrOp::Exists => true,
                AttrOp::Equals => value == attr.value,
                AttrOp::Prefix => !attr.value.is_empty() && value.starts_with(&attr.value),
                AttrOp::Contains => !attr.value.is_empty() && value.contains(&attr.value),
                AttrOp::Suffix => !attr.value.is_empty() && value.ends_with(&attr.value),
            };
            if !ok {
                return false;
            }
        }

        self.has
            .iter()
            .all(|inner| has_matching_descendant(tree, node, inner))
    }
}

fn has_matching_descendant<T: SelectorTree>(tree: &T, node: &T::Node, inner: &Selector) -> bool {
    let mut stack = tree.child_nodes(node);
    while let Some(current) = stack.pop() {
        if inner.matches(tree, &current) {
            return true;
        }
        stack.extend(tree.child_nodes(&current));
    }
    false
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self) -> SelectorError {
        match self.src[self.pos..].chars().next() {
            Some(ch) => SelectorError::UnexpectedChar { ch, pos: self.pos },
            None => SelectorError::Empty,
        }
    }

    /// Skip whitespace; returns true if any was skipped.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self, nested: bool) -> Result<Vec<Complex>, SelectorError> {
        let mut alternatives = Vec::new();
        loop {
            self.skip_ws();
            alternatives.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') if nested => break,
                None if !nested => break,
                _ => return Err(self.unexpected()),
            }
        }
        Ok(alternatives)
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    self.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(b',') | Some(b')') | None => break,
                Some(_) if had_ws => combinators.push(Combinator::Descendant),
                Some(_) => return Err(self.unexpected()),
            }
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();

        if self.peek() == Some(b'*') {
            self.pos += 1;
        } else if self.peek().is_some_and(is_ident_byte) {
            compound.tag = Some(self.parse_ident().to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some(b'.') => {
                    self.pos += 1;
                    let class = self.parse_required_ident()?;
                    compound.classes.push(class.to_string());
                }
                Some(b'#') => {
                    self.pos += 1;
                    let id = self.parse_required_ident()?;
                    compound.id = Some(id.to_string());
                }
                Some(b'[') => {
                    self.pos += 1;
                    let attr = self.parse_attribute()?;
                    compound.attrs.push(attr);
                }
                Some(b':') => {
                    self.pos += 1;
                    let name = self.parse_required_ident()?;
                    if name != "has" {
                        return Err(SelectorError::UnsupportedPseudo(name.to_string()));
                    }
                    if self.peek() != Some(b'(') {
                        return Err(self.unexpected());
                    }
                    self.pos += 1;
                    let inner_start = self.pos;
                    let alternatives = self.parse_list(true)?;
                    let source = self.src[inner_start..self.pos].trim().to_string();
                    // parse_list(true) only returns when sitting on ')'
                    self.pos += 1;
                    compound.has.push(Selector {
                        source,
                        alternatives,
                    });
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_byte) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn parse_required_ident(&mut self) -> Result<&'a str, SelectorError> {
        let ident = self.parse_ident();
        if ident.is_empty() {
            return Err(self.unexpected());
        }
        Ok(ident)
    }

    fn parse_attribute(&mut self) -> Result<AttrMatch, SelectorError> {
        self.skip_ws();
        let name = self.parse_ident();
        if name.is_empty() {
            return Err(SelectorError::UnterminatedAttribute);
        }
        self.skip_ws();

        let op = match self.peek() {
            Some(b']') => {
                self.pos += 1;
                return Ok(AttrMatch {
                    name: name.to_string(),
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some(b'=') => {
                self.pos += 1;
                AttrOp::Equals
            }
            Some(prefix @ (b'^' | b'*' | b'$')) if self.bytes.get(self.pos + 1) == Some(&b'=') => {
                self.pos += 2;
                match prefix {
                    b'^' => AttrOp::Prefix,
                    b'*' => AttrOp::Contains,
                    _ => AttrOp::Suffix,
                }
            }
            None => return Err(SelectorError::UnterminatedAttribute),
            Some(_) => return Err(self.unexpected()),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|b| b != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::UnterminatedString);
                }
                let value = &self.src[start..self.pos];
                self.pos += 1;
                value
            }
            _ => self.parse_ident(),
        };

        self.skip_ws();
        if self.peek() != Some(b']') {
            return Err(SelectorError::UnterminatedAttribute);
        }
        self.pos += 1;

        Ok(AttrMatch {
            name: name.to_string(),
            op,
            value: value.to_string(),
        })
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::MemoryDom;

    fn sample_page() -> (MemoryDom, Vec<crate::dom::memory::NodeId>) {
        let mut dom = MemoryDom::new("/");
        let body = dom.body_id();
        let browse = dom.append(body, "ytd-browse", &[("page-subtype", "home")]);
        let row = dom.append(browse, "ytd-rich-grid-row", &[]);
        let link = dom.append(row, "a", &[("href", "/shorts/abc"), ("title", "Shorts")]);
        let img = dom.append(link, "img", &[("class", "thumb yt-img")]);
        (dom, vec![browse, row, link, img])
    }

    #[test]
    fn test_parse_supported_forms() {
        for source in [
            "ytd-thumbnail img",
            "ytd-rich-section-renderer[is-shorts-shelf]",
            "ytd-guide-entry-renderer a[title=\"Shorts\"]",
            "a[href^='/watch'] img",
            "ytd-rich-grid-row:has(a[href*=\"/shorts/\"])",
            ".ytp-videowall-still-image img",
            "div > span#main.active, video",
            "*[data-x$=end]",
        ] {
            assert!(Selector::parse(source).is_ok(), "failed to parse {source}");
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Selector::parse("   "), Err(SelectorError::Empty));
        assert_eq!(Selector::parse("a[href"), Err(SelectorError::UnterminatedAttribute));
        assert_eq!(Selector::parse("a[href=\"x]"), Err(SelectorError::UnterminatedString));
        assert_eq!(
            Selector::parse("a:hover"),
            Err(SelectorError::UnsupportedPseudo("hover".to_string()))
        );
        assert!(matches!(
            Selector::parse("a,,b"),
            Err(SelectorError::UnexpectedChar { ch: ',', .. })
        ));
    }

    #[test]
    fn test_from_rules_keeps_source_order() {
        let selector = Selector::from_rules(&["video", "  ", "ytd-thumbnail img"]).unwrap();
        assert_eq!(selector.css(), "video, ytd-thumbnail img");
        assert_eq!(selector.len(), 2);
    }

    #[test]
    fn test_descendant_and_child_matching() {
        let (dom, nodes) = sample_page();
        let img = &nodes[3];

        assert!(Selector::parse("ytd-browse img").unwrap().matches(&dom, img));
        assert!(Selector::parse("a > img").unwrap().matches(&dom, img));
        assert!(!Selector::parse("ytd-rich-grid-row > img").unwrap().matches(&dom, img));
        assert!(Selector::parse("img.thumb.yt-img").unwrap().matches(&dom, img));
        assert!(!Selector::parse("img.missing").unwrap().matches(&dom, img));
    }

    #[test]
    fn test_attribute_operators() {
        let (dom, nodes) = sample_page();
        let link = &nodes[2];

        assert!(Selector::parse("a[href]").unwrap().matches(&dom, link));
        assert!(Selector::parse("a[href^=\"/shorts\"]").unwrap().matches(&dom, link));
        assert!(Selector::parse("a[href*='orts/a']").unwrap().matches(&dom, link));
        assert!(Selector::parse("a[href$=abc]").unwrap().matches(&dom, link));
        assert!(Selector::parse("a[title=\"Shorts\"]").unwrap().matches(&dom, link));
        assert!(!Selector::parse("a[href^=\"/watch\"]").unwrap().matches(&dom, link));
    }

    #[test]
    fn test_has_matches_descendants_only() {
        let (dom, nodes) = sample_page();
        let selector = Selector::parse("ytd-rich-grid-row:has(a[href*=\"/shorts/\"])").unwrap();
        assert!(selector.matches(&dom, &nodes[1]));
        assert!(!selector.matches(&dom, &nodes[2]));

        let scoped = Selector::parse("ytd-browse[page-subtype=\"home\"] ytd-rich-grid-row").unwrap();
        assert!(scoped.matches(&dom, &nodes[1]));
    }

    #[test]
    fn test_shortcut_constructors() {
        let (mut dom, nodes) = sample_page();
        dom.set_attr(nodes[1], "data-tg-hover-bound", "");
        assert!(Selector::for_attribute("data-tg-hover-bound").matches(&dom, &nodes[1]));
        assert!(Selector::for_class("thumb").matches(&dom, &nodes[3]));
        assert_eq!(Selector::for_class("thumb").css(), ".thumb");
    }
}
