use serde::Serialize;

/// Source location of a node.
///
/// `lo`/`hi` are byte offsets into the original text; `line`/`col` are the
/// 1-based position of `lo`. Synthesized nodes carry [`Span::DUMMY`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
    pub line: u32,
    pub col: u32,
}

impl Span {
    pub const DUMMY: Span = Span {
        lo: 0,
        hi: 0,
        line: 0,
        col: 0,
    };

    pub fn new(lo: u32, hi: u32, line: u32, col: u32) -> Self {
        Self { lo, hi, line, col }
    }

    pub fn is_dummy(&self) -> bool {
        self.line == 0
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_dummy() {
            write!(f, "<generated>")
        } else {
            write!(f, "{}:{}", self.line, self.col)
        }
    }
}
