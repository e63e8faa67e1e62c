//! Path expression building blocks.

use std::fmt;

/// Selector string that lists every attribute-like leaf of a node.
pub const ATTRIBUTE_WILDCARD: &str = "@*";

/// Selector string that lists every child of a node.
pub const CHILD_WILDCARD: &str = "*";

/// One `/`-delimited step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Registered top-level source: `$albums`
    Source(String),
    /// Named child: `title`
    Child(String),
    /// Attribute-like leaf: `@width`
    Attribute(String),
    /// Positional child: `[3]`
    Position(usize),
    /// All children: `*`
    AllChildren,
    /// All attributes: `@*`
    AllAttributes,
    /// The node itself: `.`
    Current,
}

impl Segment {
    /// Whether this segment selects several nodes at once.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::AllChildren | Segment::AllAttributes)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Source(name) => write!(f, "${}", name),
            Segment::Child(name) => f.write_str(name),
            Segment::Attribute(name) => write!(f, "@{}", name),
            Segment::Position(index) => write!(f, "[{}]", index),
            Segment::AllChildren => f.write_str(CHILD_WILDCARD),
            Segment::AllAttributes => f.write_str(ATTRIBUTE_WILDCARD),
            Segment::Current => f.write_str("."),
        }
    }
}

/// Trailing function that turns a path into a derived scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathFunction {
    /// `name()`: data name of the target node.
    Name,
    /// `count()`: size of the node list selected by the prefix.
    Count,
    /// `position()`: zero-based position of the target among its siblings.
    Position,
}

impl PathFunction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(PathFunction::Name),
            "count" => Some(PathFunction::Count),
            "position" => Some(PathFunction::Position),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PathFunction::Name => "name",
            PathFunction::Count => "count",
            PathFunction::Position => "position",
        }
    }
}

impl fmt::Display for PathFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.as_str())
    }
}

/// Output of [`crate::PathParser::parse`], before interning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    pub segments: Vec<Segment>,
    pub function: Option<PathFunction>,
    pub optional: bool,
}

impl ParsedPath {
    /// Canonical text for this path, the form used as the intern key for
    /// derived expressions.
    pub fn to_text(&self) -> String {
        format_path(&self.segments, self.function, self.optional)
    }
}

/// Join segments (plus optional function and `?` marker) back into path text.
pub fn format_path(segments: &[Segment], function: Option<PathFunction>, optional: bool) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&segment.to_string());
    }
    if let Some(function) = function {
        if !segments.is_empty() {
            out.push('/');
        }
        out.push_str(&function.to_string());
    }
    if optional {
        out.push('?');
    }
    out
}
