//! Names and temporary identifier tokens.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde::Serialize;

/// Interned-ish string used for identifiers, property names and literals.
pub type Atom = Rc<str>;

/// A compiler-generated identifier whose final text is not known yet.
///
/// The `id` is unique across one compilation and is the token's identity;
/// `stem` is the readable name the renamer tries first.
#[derive(Debug, Clone, Serialize)]
pub struct TempToken {
    id: u32,
    stem: Atom,
}

impl TempToken {
    pub fn new(id: u32, stem: impl Into<Atom>) -> Self {
        Self {
            id,
            stem: stem.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }
}

impl PartialEq for TempToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TempToken {}

impl Hash for TempToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The name carried by an identifier node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Name {
    /// A name written in the source, or a fixed name chosen by a pass.
    Ident(Atom),
    /// A temporary awaiting its final text.
    Temp(TempToken),
}

impl Name {
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Name::Ident(name) => Some(name),
            Name::Temp(_) => None,
        }
    }

    pub fn as_temp(&self) -> Option<&TempToken> {
        match self {
            Name::Temp(token) => Some(token),
            Name::Ident(_) => None,
        }
    }

    pub fn is(&self, text: &str) -> bool {
        self.as_ident() == Some(text)
    }

    /// Text used when printing. Unresolved temporaries print as `$__<id>`.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Name::Ident(name) => Cow::Borrowed(name),
            Name::Temp(token) => Cow::Owned(format!("$__{}", token.id)),
        }
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Name::Ident(name.into())
    }
}

impl From<TempToken> for Name {
    fn from(token: TempToken) -> Self {
        Name::Temp(token)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_identity_ignores_stem() {
        let a = TempToken::new(3, "_ref");
        let b = TempToken::new(3, "other");
        let c = TempToken::new(4, "_ref");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn unresolved_temp_text() {
        let name = Name::from(TempToken::new(7, "x"));
        assert_eq!(name.text(), "$__7");
        assert!(name.as_ident().is_none());
        assert!(Name::from("x").is("x"));
    }
}
