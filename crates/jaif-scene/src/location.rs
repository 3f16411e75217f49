//! Value types identifying *where* inside a type, class or method body an
//! annotation attaches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path from the outermost type to a nested array component or type argument.
///
/// Each step is the index of the type argument (or `0` for an array
/// component) to descend into. The empty path denotes the type itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct InnerTypeLocation(Vec<u32>);

impl InnerTypeLocation {
    pub fn new(steps: Vec<u32>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u32>> for InnerTypeLocation {
    fn from(steps: Vec<u32>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for InnerTypeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, step) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// A bound of a type parameter: `param_index & bound_index`.
///
/// Bound index `0` is the class bound when one exists; interface bounds follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundLocation {
    pub param_index: u32,
    pub bound_index: u32,
}

impl BoundLocation {
    pub fn new(param_index: u32, bound_index: u32) -> Self {
        Self {
            param_index,
            bound_index,
        }
    }
}

impl fmt::Display for BoundLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}&{}", self.param_index, self.bound_index)
    }
}

/// A local variable: its slot plus the bytecode range over which it is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalLocation {
    pub index: u32,
    pub scope_start: u32,
    pub scope_length: u32,
}

impl LocalLocation {
    pub fn new(index: u32, scope_start: u32, scope_length: u32) -> Self {
        Self {
            index,
            scope_start,
            scope_length,
        }
    }
}

impl fmt::Display for LocalLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{}+{}",
            self.index, self.scope_start, self.scope_length
        )
    }
}

/// Position of a cast, `instanceof` or object creation inside a code block.
///
/// Bytecode-derived locations carry the instruction offset; source-derived
/// ones carry the ordinal of the expression among its kind in source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelativeLocation {
    Offset(u32),
    Index(u32),
}

impl RelativeLocation {
    pub fn offset(offset: u32) -> Self {
        RelativeLocation::Offset(offset)
    }

    pub fn index(index: u32) -> Self {
        RelativeLocation::Index(index)
    }

    pub fn is_bytecode_offset(&self) -> bool {
        matches!(self, RelativeLocation::Offset(_))
    }
}

impl fmt::Display for RelativeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeLocation::Offset(offset) => write!(f, "#{offset}"),
            RelativeLocation::Index(index) => write!(f, "*{index}"),
        }
    }
}

/// A supertype slot of a class: `-1` is the superclass, `n >= 0` the n-th
/// implemented interface. Other negative values name no slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIndexLocation(pub i32);

impl TypeIndexLocation {
    pub const EXTENDS: TypeIndexLocation = TypeIndexLocation(-1);

    /// The slot of the `index`-th implemented interface, if it fits.
    pub fn implements(index: u32) -> Option<Self> {
        i32::try_from(index).ok().map(TypeIndexLocation)
    }

    pub fn is_extends(&self) -> bool {
        *self == Self::EXTENDS
    }

    pub fn interface_index(&self) -> Option<u32> {
        u32::try_from(self.0).ok()
    }
}

/// One step of an [`AstPath`], e.g. `Block.statement 2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AstPathEntry {
    pub kind: String,
    pub child_selector: String,
    pub argument: Option<u32>,
}

impl AstPathEntry {
    pub fn new(kind: impl Into<String>, child_selector: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            child_selector: child_selector.into(),
            argument: None,
        }
    }

    pub fn with_argument(mut self, argument: u32) -> Self {
        self.argument = Some(argument);
        self
    }
}

impl fmt::Display for AstPathEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.child_selector)?;
        if let Some(arg) = self.argument {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Location of a source-tree node, as a walk from a declaration down to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AstPath(Vec<AstPathEntry>);

impl AstPath {
    pub fn new(entries: Vec<AstPathEntry>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[AstPathEntry] {
        &self.0
    }

    pub fn push(&mut self, entry: AstPathEntry) {
        self.0.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AstPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
