use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nova_core::{Ref, RefKind, Relation, RelationKind, Symbol, SymbolId};
use parking_lot::Mutex;

use crate::LiveIndex;

/// Default [`LiveIndex`]: the latest slabs for each file, merged on demand.
#[derive(Debug, Default)]
pub struct FileSymbols {
    files: Mutex<BTreeMap<PathBuf, FileSlabs>>,
}

#[derive(Clone, Debug, Default)]
struct FileSlabs {
    symbols: Arc<Vec<Symbol>>,
    refs: Arc<Vec<Ref>>,
    relations: Arc<Vec<Relation>>,
    count_references: bool,
}

impl FileSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files with a contribution.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Symbols currently contributed by `path`.
    pub fn symbols_in(&self, path: &Path) -> Vec<Symbol> {
        self.files
            .lock()
            .get(path)
            .map(|slabs| slabs.symbols.to_vec())
            .unwrap_or_default()
    }

    pub fn refs_in(&self, path: &Path) -> Vec<Ref> {
        self.files
            .lock()
            .get(path)
            .map(|slabs| slabs.refs.to_vec())
            .unwrap_or_default()
    }
}

impl LiveIndex for FileSymbols {
    fn merge(
        &self,
        path: &Path,
        symbols: Option<Vec<Symbol>>,
        refs: Option<Vec<Ref>>,
        relations: Option<Vec<Relation>>,
        is_main_file: bool,
    ) {
        let mut files = self.files.lock();
        let slabs = files.entry(path.to_path_buf()).or_default();
        if let Some(symbols) = symbols {
            slabs.symbols = Arc::new(symbols);
        }
        if let Some(refs) = refs {
            slabs.refs = Arc::new(refs);
        }
        if let Some(relations) = relations {
            slabs.relations = Arc::new(relations);
        }
        slabs.count_references = is_main_file;
    }

    fn build_snapshot(&self) -> IndexSnapshot {
        // Only the slab handles are copied under the lock.
        let files: Vec<FileSlabs> = self.files.lock().values().cloned().collect();

        let mut snapshot = IndexSnapshot {
            file_count: files.len(),
            ..IndexSnapshot::default()
        };
        let mut relations = BTreeSet::new();
        for slabs in &files {
            for symbol in slabs.symbols.iter() {
                match snapshot.symbols.get_mut(&symbol.id) {
                    Some(existing) => merge_symbol(existing, symbol),
                    None => {
                        snapshot.symbols.insert(symbol.id, symbol.clone());
                    }
                }
            }
            for r in slabs.refs.iter() {
                snapshot.refs.entry(r.symbol).or_default().push(r.clone());
                if slabs.count_references && r.kind == RefKind::Reference {
                    *snapshot.reference_counts.entry(r.symbol).or_default() += 1;
                }
            }
            relations.extend(slabs.relations.iter().copied());
        }

        for refs in snapshot.refs.values_mut() {
            refs.sort();
            refs.dedup();
        }
        for relation in relations {
            snapshot
                .relations
                .entry((relation.subject, relation.kind))
                .or_default()
                .push(relation.object);
        }
        for symbol in snapshot.symbols.values() {
            snapshot
                .by_name
                .entry(symbol.name.clone())
                .or_default()
                .push(symbol.id);
        }
        for ids in snapshot.by_name.values_mut() {
            ids.sort();
        }

        snapshot
    }
}

/// Combine two views of the same symbol from different files, preferring the
/// one that knows the definition.
fn merge_symbol(existing: &mut Symbol, other: &Symbol) {
    if existing.definition.is_none() && other.definition.is_some() {
        let declaration = existing.declaration.take();
        *existing = other.clone();
        if existing.declaration.is_none() {
            existing.declaration = declaration;
        }
    } else if existing.declaration.is_none() {
        existing.declaration = other.declaration.clone();
    }
}

/// Consolidated, immutable view over every file's contribution.
#[derive(Clone, Debug, Default)]
pub struct IndexSnapshot {
    symbols: HashMap<SymbolId, Symbol>,
    by_name: BTreeMap<String, Vec<SymbolId>>,
    refs: HashMap<SymbolId, Vec<Ref>>,
    relations: HashMap<(SymbolId, RelationKind), Vec<SymbolId>>,
    reference_counts: HashMap<SymbolId, u32>,
    file_count: usize,
}

impl IndexSnapshot {
    pub fn symbol(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    /// Symbols with exactly this name, ordered by id.
    pub fn lookup_name<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|id| self.symbols.get(id))
    }

    /// Every known occurrence of `id`, sorted by location.
    pub fn refs(&self, id: SymbolId) -> &[Ref] {
        self.refs.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Objects related to `subject` by `kind`, e.g. the subclasses of a base.
    pub fn related(&self, subject: SymbolId, kind: RelationKind) -> &[SymbolId] {
        self.relations
            .get(&(subject, kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// References to `id` from main files.
    pub fn reference_count(&self, id: SymbolId) -> u32 {
        self.reference_counts.get(&id).copied().unwrap_or(0)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.refs.is_empty()
    }
}
