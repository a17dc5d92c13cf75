//! A minimal, concrete [`AppModel`] backed directly by an ELF shared
//! library, grounded on the original tool's `ElfHelper`/`DartApp`-family
//! sources (`examples/original_source/blutter`).
//!
//! This is deliberately thin: parsing a real Dart AOT snapshot's internal
//! object layout (the class table, the object pool's tagged-object
//! encoding) is its own multi-thousand-line reverse-engineering effort and
//! is out of scope here (see `SPEC_FULL.md` §1). What this module *does* do
//! is read the ELF's own symbol table to recover function/stub entry points
//! and sizes, which is enough to drive [`crate::driver::run`] end-to-end
//! against a real `libapp.so`; the class/field/pool tables are supplied by
//! the caller via [`ElfSnapshot::with_pool_entry`] / [`ElfSnapshot::with_class`]
//! once a real snapshot parser exists.

use std::path::Path;

use goblin::elf::Elf;
use rustc_hash::FxHashMap;

use crate::app_model::{AppModel, ClassId, DartClass, DartFunction, DartLibrary, FunctionKind, PoolEntry, TypeHandle};
use crate::config::VersionConfig;
use crate::error::SnapshotError;

pub struct ElfSnapshot {
    config: VersionConfig,
    libraries: Vec<DartLibrary>,
    classes: FxHashMap<u32, DartClass>,
    /// Sorted by entry address, to support the covering-range lookup
    /// `function_at` needs.
    functions: Vec<DartFunction>,
    pool: FxHashMap<u32, PoolEntry>,
    types: FxHashMap<u64, String>,
}

impl ElfSnapshot {
    /// Parse `path` as an ELF shared library and recover its function
    /// symbol table. The object pool and class database start empty.
    pub fn load(path: &Path, config: VersionConfig) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        let elf = Elf::parse(&bytes)?;

        let mut functions = Vec::new();
        for sym in elf.syms.iter() {
            if sym.st_value == 0 || sym.st_size == 0 {
                continue;
            }
            let name = elf
                .strtab
                .get_at(sym.st_name)
                .map(str::to_string)
                .unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            let kind = if name.starts_with("Stub_") || name.starts_with("_Stub") {
                FunctionKind::Stub
            } else {
                FunctionKind::User
            };
            functions.push(DartFunction {
                name,
                entry: sym.st_value,
                size: sym.st_size,
                kind,
            });
        }
        functions.sort_by_key(|f| f.entry);

        Ok(ElfSnapshot {
            config,
            libraries: Vec::new(),
            classes: FxHashMap::default(),
            functions,
            pool: FxHashMap::default(),
            types: FxHashMap::default(),
        })
    }

    pub fn with_library(mut self, library: DartLibrary) -> Self {
        self.libraries.push(library);
        self
    }

    pub fn with_class(mut self, class: DartClass) -> Self {
        self.classes.insert(class.id.0, class);
        self
    }

    pub fn with_pool_entry(mut self, offset: u32, entry: PoolEntry) -> Self {
        self.pool.insert(offset, entry);
        self
    }

    pub fn with_type(mut self, handle: TypeHandle, name: impl Into<String>) -> Self {
        self.types.insert(handle.0, name.into());
        self
    }
}

impl AppModel for ElfSnapshot {
    fn version_config(&self) -> &VersionConfig {
        &self.config
    }

    fn pool_entry(&self, offset: u32) -> Option<&PoolEntry> {
        self.pool.get(&offset)
    }

    fn class(&self, id: ClassId) -> Option<&DartClass> {
        self.classes.get(&id.0)
    }

    fn function_at(&self, addr: u64) -> Option<&DartFunction> {
        // Last function whose entry is <= addr and whose range covers it.
        let idx = self.functions.partition_point(|f| f.entry <= addr);
        if idx == 0 {
            return None;
        }
        let candidate = &self.functions[idx - 1];
        if addr < candidate.entry + candidate.size {
            Some(candidate)
        } else {
            None
        }
    }

    fn libraries(&self) -> &[DartLibrary] {
        &self.libraries
    }

    fn classes_in(&self, library: &str) -> Vec<&DartClass> {
        self.classes.values().filter(|c| c.library == library).collect()
    }

    fn functions_in(&self, class: &DartClass) -> Vec<&DartFunction> {
        // Without a real class->function index, fall back to functions
        // named "ClassName.*", matching the demangled convention AOT
        // snapshots use for method symbols.
        let prefix = format!("{}.", class.name);
        self.functions.iter().filter(|f| f.name.starts_with(&prefix)).collect()
    }

    fn type_name(&self, handle: TypeHandle) -> Option<&str> {
        self.types.get(&handle.0).map(|s| s.as_str())
    }
}
