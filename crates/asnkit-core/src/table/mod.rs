//! Module table.
//!
//! Maps module names to their parsed definitions and answers cross-module
//! symbol lookups through import chains. Import cycles are legal in ASN.1
//! and surface as warnings only; the resolver breaks them lazily.

use crate::ast::{Definition, Exports, Module};
use crate::lexer::{Diagnostic, Severity, Span};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

/// A module-name keyed view over a compilation's modules.
#[derive(Debug, Default)]
pub struct ModuleTable {
    /// Modules in submission order.
    modules: Vec<Module>,
    /// Name → index into `modules`.
    by_name: BTreeMap<String, usize>,
    /// Modules whose name collided with an earlier module.
    duplicates: Vec<(String, Span)>,
    /// Import-cycle warnings.
    diagnostics: Vec<Diagnostic>,
}

impl ModuleTable {
    /// Build a table from parsed modules.
    ///
    /// Later duplicates of a module name are recorded and ignored for
    /// lookup; the resolver turns them into an error.
    #[must_use]
    pub fn build(modules: Vec<Module>) -> Self {
        let mut table = Self::default();
        for module in modules {
            let name = module.name.name.clone();
            if table.by_name.contains_key(&name) {
                table.duplicates.push((name, module.name.span));
                continue;
            }
            table.by_name.insert(name, table.modules.len());
            table.modules.push(module);
        }
        table.detect_import_cycles();
        table
    }

    /// Duplicate module names found while building.
    #[must_use]
    pub fn duplicates(&self) -> &[(String, Span)] {
        &self.duplicates
    }

    /// Table-level diagnostics (import cycles).
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.by_name.get(name).map(|&idx| &self.modules[idx])
    }

    /// Iterate modules in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Find the definition of `symbol` as seen from `module`: first the
    /// module's own body, then its imports, following re-export chains.
    ///
    /// Returns the defining module's name alongside the definition.
    #[must_use]
    pub fn lookup(&self, module: &str, symbol: &str) -> Option<(&Module, &Definition)> {
        let mut visited = BTreeSet::new();
        self.lookup_inner(module, symbol, &mut visited)
    }

    fn lookup_inner<'t>(
        &'t self,
        module: &str,
        symbol: &str,
        visited: &mut BTreeSet<String>,
    ) -> Option<(&'t Module, &'t Definition)> {
        if !visited.insert(String::from(module)) {
            return None;
        }
        let m = self.get(module)?;
        if let Some(def) = m.body.iter().find(|d| d.name().name == symbol) {
            return Some((m, def));
        }
        for clause in &m.imports {
            if clause.symbols.iter().any(|s| s.name == symbol) {
                return self.lookup_inner(&clause.from_module.name, symbol, visited);
            }
        }
        None
    }

    /// Check whether `module` exports `symbol`. `EXPORTS` clauses are
    /// honored informationally; lookup itself stays lenient.
    #[must_use]
    pub fn exports(&self, module: &str, symbol: &str) -> bool {
        match self.get(module).map(|m| &m.exports) {
            None => false,
            Some(Exports::All) => true,
            Some(Exports::Symbols(symbols)) => symbols.iter().any(|s| s.name == symbol),
        }
    }

    /// Warn on cycles in the import graph.
    fn detect_import_cycles(&mut self) {
        let mut warned = BTreeSet::new();
        for start in 0..self.modules.len() {
            let mut stack = Vec::new();
            self.walk_imports(start, &mut stack, &mut warned);
        }
        for name in warned {
            let span = self
                .get(&name)
                .map_or(Span::point(0), |m| m.name.span);
            self.diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                span,
                message: alloc::format!("module {name} participates in an import cycle"),
            });
        }
    }

    fn walk_imports(
        &self,
        idx: usize,
        stack: &mut Vec<usize>,
        warned: &mut BTreeSet<String>,
    ) {
        if let Some(pos) = stack.iter().position(|&i| i == idx) {
            for &i in &stack[pos..] {
                warned.insert(self.modules[i].name.name.clone());
            }
            return;
        }
        stack.push(idx);
        let imports: Vec<usize> = self.modules[idx]
            .imports
            .iter()
            .filter_map(|c| self.by_name.get(&c.from_module.name).copied())
            .collect();
        for target in imports {
            self.walk_imports(target, stack, warned);
        }
        stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn modules_of(source: &str) -> Vec<Module> {
        let result = Parser::new(source.as_bytes()).parse();
        assert!(result.first_error().is_none(), "{:?}", result.diagnostics);
        result.modules
    }

    #[test]
    fn test_build_and_get() {
        let table = ModuleTable::build(modules_of(
            "A DEFINITIONS ::= BEGIN T ::= INTEGER END \
             B DEFINITIONS ::= BEGIN U ::= BOOLEAN END",
        ));
        assert_eq!(table.len(), 2);
        assert!(table.get("A").is_some());
        assert!(table.get("C").is_none());
        assert!(table.duplicates().is_empty());
    }

    #[test]
    fn test_duplicate_module_recorded() {
        let table = ModuleTable::build(modules_of(
            "A DEFINITIONS ::= BEGIN END  A DEFINITIONS ::= BEGIN END",
        ));
        assert_eq!(table.len(), 1);
        assert_eq!(table.duplicates().len(), 1);
    }

    #[test]
    fn test_cross_module_lookup() {
        let table = ModuleTable::build(modules_of(
            "A DEFINITIONS ::= BEGIN \
             IMPORTS U FROM B; \
             T ::= SEQUENCE { u U } \
             END \
             B DEFINITIONS ::= BEGIN U ::= BOOLEAN END",
        ));
        let (owner, def) = table.lookup("A", "U").expect("U resolves through import");
        assert_eq!(owner.name.name, "B");
        assert_eq!(def.name().name, "U");
        // Directly defined symbols resolve to their own module.
        let (owner, _) = table.lookup("A", "T").unwrap();
        assert_eq!(owner.name.name, "A");
    }

    #[test]
    fn test_import_cycle_is_warning() {
        let table = ModuleTable::build(modules_of(
            "A DEFINITIONS ::= BEGIN IMPORTS U FROM B; T ::= INTEGER END \
             B DEFINITIONS ::= BEGIN IMPORTS T FROM A; U ::= BOOLEAN END",
        ));
        assert!(table
            .diagnostics()
            .iter()
            .all(|d| d.severity == Severity::Warning));
        assert!(!table.diagnostics().is_empty());
        // Lookups still work across the cycle.
        assert!(table.lookup("A", "U").is_some());
    }

    #[test]
    fn test_exports() {
        let table = ModuleTable::build(modules_of(
            "A DEFINITIONS ::= BEGIN EXPORTS T; T ::= INTEGER U ::= BOOLEAN END",
        ));
        assert!(table.exports("A", "T"));
        assert!(!table.exports("A", "U"));
    }
}
