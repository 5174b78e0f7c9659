//! Chooses between a direct property call and the invoker trampoline for
//! virtual and interface call sites.

use std::ops::ControlFlow;

use rustc_hash::FxHashSet;

use crate::cache::{CacheError, ResolvedMethod};
use crate::codegen::emit::{js_string, property, JsWriter};
use crate::config::LinkMode;
use crate::export::ExportedSymbols;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// `receiver.method(args)`
    Direct,
    /// `invoker.method(receiver)(args)`, looked up on the receiver at call time.
    Invoker,
}

/// Which classes are compiled into the current output.
#[derive(Clone, Debug, Default)]
pub struct ModuleScope {
    mode: LinkMode,
    internal: FxHashSet<String>,
}

impl ModuleScope {
    pub fn new(mode: LinkMode, internal: impl IntoIterator<Item = String>) -> Self {
        ModuleScope {
            mode,
            internal: internal.into_iter().collect(),
        }
    }

    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    /// Classes of the host program: their layout is opaque to the code
    /// generated here. Standalone output has no such classes.
    pub fn is_external(&self, class: &str) -> bool {
        match self.mode {
            LinkMode::Standalone => false,
            LinkMode::Extension => !self.internal.contains(class),
        }
    }
}

pub struct DispatchResolver<'a, 'c, 'r> {
    exports: &'a ExportedSymbols<'c, 'r>,
    scope: &'a ModuleScope,
}

impl<'a, 'c, 'r> DispatchResolver<'a, 'c, 'r> {
    pub fn new(exports: &'a ExportedSymbols<'c, 'r>, scope: &'a ModuleScope) -> Self {
        DispatchResolver { exports, scope }
    }

    /// Decides how to call `name descriptor` on a receiver statically typed
    /// as `class`.
    pub fn resolve(&self, class: &str, name: &str, descriptor: &str) -> Result<Dispatch, CacheError> {
        let cache = self.exports.cache();
        let Some(found) = cache.find_method(class, name, descriptor)? else {
            return Ok(Dispatch::Invoker);
        };
        if self.scope.is_external(found.class.name()) {
            return Ok(Dispatch::Invoker);
        }
        let method = found.method();
        if method.is_final() || method.is_private() || found.class.is_final() {
            return Ok(Dispatch::Direct);
        }
        if let Some(referenced) = cache.find_class(class)? {
            if referenced.is_final() {
                return Ok(Dispatch::Direct);
            }
        }
        if self.is_hierarchy_exported(&found)? {
            Ok(Dispatch::Invoker)
        } else {
            Ok(Dispatch::Direct)
        }
    }

    /// True when the method, or a method it overrides, is visible to code
    /// outside the program, which may then supply further overrides.
    pub fn is_hierarchy_exported(&self, found: &ResolvedMethod) -> Result<bool, CacheError> {
        let method = found.method();
        if self.exports.is_exported_method(&found.class, method)? {
            return Ok(true);
        }
        if method.is_private() || method.is_static() {
            return Ok(false);
        }
        let mut exported = false;
        let mut failure = None;
        self.exports.cache().find_methods(
            found.class.name(),
            method.name(),
            method.descriptor(),
            |m| match self.exports.is_exported_method(&m.class, m.method()) {
                Ok(false) => ControlFlow::Continue(()),
                Ok(true) => {
                    exported = true;
                    ControlFlow::Break(())
                }
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            },
        )?;
        match failure {
            Some(e) => Err(e),
            None => Ok(exported),
        }
    }
}

/// Distinct method names that need the trampoline, in first-use order.
#[derive(Clone, Debug, Default)]
pub struct InvokerTable {
    order: Vec<String>,
    seen: FxHashSet<String>,
}

impl InvokerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the name was already registered.
    pub fn require(&mut self, mangled: &str) -> bool {
        if !self.seen.insert(mangled.to_string()) {
            return false;
        }
        self.order.push(mangled.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Shared trampoline function; must precede any call through it.
    pub fn emit_trampoline(out: &mut JsWriter) {
        out.open("var invoker = function Invoker() {");
        out.line("return Invoker.target[Invoker.method].apply(Invoker.target, arguments);");
        out.close("};");
    }

    /// One selector per registered name.
    pub fn emit(&self, out: &mut JsWriter) {
        for name in &self.order {
            out.open(format!("{} = function(target) {{", property("invoker", name)));
            out.line("invoker.target = target;");
            out.line(format!("invoker.method = {};", js_string(name)));
            out.line("return invoker;");
            out.close("};");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoker_table_deduplicates() {
        let mut table = InvokerTable::new();
        assert!(table.require("m__I"));
        assert!(!table.require("m__I"));
        assert!(table.require("n__V"));
        assert_eq!(table.names(), ["m__I".to_string(), "n__V".to_string()]);

        let mut out = JsWriter::new();
        table.emit(&mut out);
        assert_eq!(out.as_str().matches("invoker.m__I = function(target) {").count(), 1);
        assert!(out.as_str().contains("invoker.method = 'n__V';"));
    }

    #[test]
    fn extension_scope_treats_unknown_classes_as_external() {
        let scope = ModuleScope::new(LinkMode::Extension, vec!["a/B".to_string()]);
        assert!(!scope.is_external("a/B"));
        assert!(scope.is_external("java/lang/Object"));
        let standalone = ModuleScope::new(LinkMode::Standalone, Vec::new());
        assert!(!standalone.is_external("java/lang/Object"));
    }
}
