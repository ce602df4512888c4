use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stable identifier of a symbol across translation units (e.g. a USR hash).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl SymbolLocation {
    pub fn new(file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Class,
    Struct,
    Enum,
    Function,
    Method,
    Field,
    Variable,
    Macro,
    TypeAlias,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Canonical declaration; owns the symbol for sharding purposes.
    pub declaration: Option<SymbolLocation>,
    pub definition: Option<SymbolLocation>,
}

impl Symbol {
    /// Files this symbol belongs to: its declaration file and, when different,
    /// its definition file.
    pub fn owning_files(&self) -> impl Iterator<Item = &Path> {
        let decl = self.declaration.as_ref().map(|loc| loc.file.as_path());
        let def = self
            .definition
            .as_ref()
            .map(|loc| loc.file.as_path())
            .filter(|def| Some(*def) != decl);
        decl.into_iter().chain(def)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Declaration,
    Definition,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ref {
    pub symbol: SymbolId,
    pub kind: RefKind,
    pub location: SymbolLocation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    BaseOf,
    OverriddenBy,
}

/// `subject --kind--> object`, e.g. `Base --BaseOf--> Derived`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub subject: SymbolId,
    pub kind: RelationKind,
    pub object: SymbolId,
}
