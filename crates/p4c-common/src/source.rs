//! Table of input sources.
//!
//! Per-file behavior (for example: never delete declarations that belong to
//! an architecture model file) is looked up through the [`SourceId`] stored
//! in each node's [`SourceInfo`].

use crate::span::{SourceId, SourceInfo};

/// One input source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name as shown in diagnostics, e.g. `"v1model.p4"`.
    pub name: String,
    pub text: String,
    /// Library sources declare the target architecture (externs, packages,
    /// standard types) rather than user code.
    pub is_library: bool,
}

/// All input sources of one compilation, indexed by [`SourceId`].
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user source file.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        self.push(name.into(), text.into(), false)
    }

    /// Register a library (architecture model) source file.
    pub fn add_library(&mut self, name: impl Into<String>, text: impl Into<String>) -> SourceId {
        self.push(name.into(), text.into(), true)
    }

    fn push(&mut self, name: String, text: String, is_library: bool) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(SourceFile {
            name,
            text,
            is_library,
        });
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    /// Whether the node at `info` was declared in a library source.
    /// Nodes without a position are user code.
    pub fn is_library(&self, info: Option<&SourceInfo>) -> bool {
        info.and_then(|i| self.get(i.source))
            .is_some_and(|file| file.is_library)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_lookup() {
        let mut map = SourceMap::new();
        let arch = map.add_library("v1model.p4", "extern counter {}");
        let user = map.add("prog.p4", "control c() {}");

        assert!(map.is_library(Some(&SourceInfo::new(arch, 0, 6))));
        assert!(!map.is_library(Some(&SourceInfo::new(user, 0, 7))));
        assert!(!map.is_library(None));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn unknown_source_is_user_code() {
        let map = SourceMap::new();
        assert!(!map.is_library(Some(&SourceInfo::new(SourceId(7), 0, 1))));
    }
}
