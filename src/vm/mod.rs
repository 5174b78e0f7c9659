//! One translation run: discovers classes from the roots, generates them in
//! discovery order and writes the complete program.

mod references;

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustc_hash::FxHashSet;

use crate::cache::ClassDataCache;
use crate::codegen::emit::{bracket, js_string, property, JsWriter};
use crate::codegen::{ClassGenerator, Linker};
use crate::config::{LinkMode, TranslateOptions};
use crate::descriptor::mangle_class_name;
use crate::dispatch::{InvokerTable, ModuleScope};
use crate::error::TranslateError;
use crate::export::{ExportedSymbols, SymbolExporter};
use crate::resources::Resources;

pub use self::references::{ReferenceSet, ReferenceState};

const RUNTIME: &str = include_str!("runtime.js");

/// What a successful run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Translation {
    /// Classes generated into the output, in discovery order.
    pub compiled: Vec<String>,
    /// Missing classes replaced by lazy-load stubs.
    pub stubbed: Vec<String>,
    /// Classes linked from the host program.
    pub external: Vec<String>,
    /// Method names dispatched through the invoker trampoline.
    pub invokers: Vec<String>,
    /// Names a minifier must keep; filled at the externs level.
    pub externs: Vec<String>,
    /// Number of exported symbols.
    pub exported: usize,
}

/// Everything the generator may ask for while a class is compiled.
#[derive(Default)]
struct Linkage {
    references: ReferenceSet,
    invokers: InvokerTable,
    scripts: Vec<String>,
}

impl Linker for Linkage {
    fn require_reference(&mut self, class: &str) {
        if self.references.add(class) {
            tracing::trace!("referenced {class}");
        }
    }

    fn require_invoker(&mut self, mangled: &str) {
        self.invokers.require(mangled);
    }

    fn require_script(&mut self, resource: &str) {
        if !self.scripts.iter().any(|s| s == resource) {
            self.scripts.push(resource.to_string());
        }
    }
}

fn base_indent(mode: LinkMode) -> usize {
    match mode {
        LinkMode::Standalone => 2,
        LinkMode::Extension => 1,
    }
}

/// Translates `options.roots` and everything they reach into one program
/// written to `out`.
pub fn translate(
    out: &mut dyn fmt::Write,
    resources: &dyn Resources,
    options: &TranslateOptions,
) -> Result<Translation, TranslateError> {
    let cache = ClassDataCache::new(resources);
    let exports = ExportedSymbols::new(&cache, &options.exported);
    let scope = ModuleScope::new(options.mode, options.roots.iter().cloned());
    let generator = ClassGenerator::new(&exports, &scope);
    let mut exporter = SymbolExporter::new(options.obfuscation);
    let mut linkage = Linkage::default();
    let mut report = Translation::default();
    let indent = base_indent(options.mode);

    tracing::debug!(roots = ?options.roots, mode = ?options.mode, "translating");
    write_prologue(out, options.mode)?;

    if options.mode == LinkMode::Standalone {
        for name in &options.fixed_dependencies {
            linkage.references.add(name);
        }
    }
    for root in &options.roots {
        linkage.references.add(root);
    }
    let roots: FxHashSet<&str> = options.roots.iter().map(String::as_str).collect();

    while let Some(name) = linkage.references.next_pending() {
        let mut buf = JsWriter::with_indent(indent);
        if scope.is_external(&name) {
            write_link_stub(&mut buf, &name);
            linkage.references.mark_skipped(&name);
            out.write_str(buf.as_str())?;
            report.external.push(name);
            continue;
        }
        let Some(class) = cache.find_class(&name)? else {
            if roots.contains(name.as_str()) {
                return Err(TranslateError::ClassNotFound(name));
            }
            tracing::warn!("class {name} not found, loading it lazily at run time");
            write_lazy_stub(&mut buf, &name);
            linkage.references.mark_skipped(&name);
            out.write_str(buf.as_str())?;
            report.stubbed.push(name);
            continue;
        };
        match generator.compile(&class, &mut linkage, &mut exporter, &mut buf) {
            Ok(init) => {
                out.write_str(buf.as_str())?;
                linkage.references.mark_processed(&name, init);
                report.compiled.push(name);
            }
            Err(source) => {
                return Err(TranslateError::Generation {
                    tail: buf.tail().to_string(),
                    class: name,
                    source,
                });
            }
        }
    }

    let mut tail = JsWriter::with_indent(indent);
    if !linkage.invokers.is_empty() {
        InvokerTable::emit_trampoline(&mut tail);
        linkage.invokers.emit(&mut tail);
    }
    for script in &linkage.scripts {
        let bytes = fetch(resources, script)?;
        let text = strip_block_comments(&String::from_utf8_lossy(&bytes));
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            tail.line(line);
        }
    }
    for resource in &options.resources {
        let bytes = fetch(resources, resource)?;
        tail.line(format!(
            "rt.resource({}, {});",
            js_string(resource),
            js_string(&STANDARD.encode(bytes))
        ));
    }
    for init in linkage
        .references
        .flush_initializers(|name| initializer_parents(&cache, name))
    {
        tail.line(init);
    }
    out.write_str(tail.as_str())?;
    write_epilogue(out, options.mode, &report.compiled)?;

    if options.library && exporter.exported() == 0 {
        return Err(TranslateError::NoExports);
    }
    report.invokers = linkage.invokers.names().to_vec();
    report.exported = exporter.exported();
    report.externs = exporter.into_externs();
    tracing::info!(
        compiled = report.compiled.len(),
        stubbed = report.stubbed.len(),
        external = report.external.len(),
        invokers = report.invokers.len(),
        "translation finished"
    );
    Ok(report)
}

/// Convenience wrapper returning the program as a string.
pub fn translate_to_string(
    resources: &dyn Resources,
    options: &TranslateOptions,
) -> Result<(String, Translation), TranslateError> {
    let mut out = String::new();
    let report = translate(&mut out, resources, options)?;
    Ok((out, report))
}

/// Classes whose initializers must run before `name`'s.
fn initializer_parents(cache: &ClassDataCache, name: &str) -> Vec<String> {
    match cache.find_class(name) {
        Ok(Some(class)) => class
            .super_name()
            .into_iter()
            .map(str::to_string)
            .chain(class.interfaces().iter().cloned())
            .collect(),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!("cannot order the initializer of {name}: {e}");
            Vec::new()
        }
    }
}

fn fetch(resources: &dyn Resources, name: &str) -> Result<Vec<u8>, TranslateError> {
    resources
        .get(name)
        .map_err(|source| TranslateError::Io {
            resource: name.to_string(),
            source,
        })?
        .ok_or_else(|| TranslateError::ResourceNotFound(name.to_string()))
}

fn write_prologue(out: &mut dyn fmt::Write, mode: LinkMode) -> fmt::Result {
    match mode {
        LinkMode::Standalone => {
            out.write_str("(function jvm2jsVM(global) {\n")?;
            out.write_str("  var fillInVMSkeleton = function(vm) {\n")?;
            out.write_str("    var rt = vm.rt = ")?;
            out.write_str(RUNTIME.trim_end())?;
            out.write_str("(vm);\n")
        }
        LinkMode::Extension => {
            let mut w = JsWriter::new();
            w.open("jvm2js.registerExtension(function(exports) {");
            w.line("var vm = {};");
            w.line("var rt = exports.rt;");
            w.open("function link(name, prop, args) {");
            w.open("if (typeof exports[prop] !== 'function' && exports.$loader) {");
            w.line("exports.$loader(name.replace(/\\//g, '.'));");
            w.close("}");
            w.open("if (typeof exports[prop] !== 'function') {");
            w.line("throw new Error('java.lang.NoClassDefFoundError: ' + name);");
            w.close("}");
            w.line("vm[prop] = exports[prop];");
            w.line("return vm[prop].apply(null, args);");
            w.close("}");
            out.write_str(w.as_str())
        }
    }
}

fn write_epilogue(out: &mut dyn fmt::Write, mode: LinkMode, compiled: &[String]) -> fmt::Result {
    let mut w = JsWriter::new();
    match mode {
        LinkMode::Standalone => {
            w.enter();
            w.enter();
            w.line("return vm;");
            w.close("};");
            w.line("var vm = fillInVMSkeleton({});");
            w.line("var rt = vm.rt;");
            w.line("var extensions = [];");
            w.open("var jvm2js = global.jvm2js = {");
            w.line("vm: vm,");
            w.line("rt: rt,");
            w.line("extensions: extensions,");
            w.line("loader: null,");
            w.open("loadClass: function(name) {");
            w.line("var fn = vm[rt.mangleClass(name.replace(/\\./g, '/'))];");
            w.open("if (typeof fn !== 'function') {");
            w.line("throw new Error('java.lang.ClassNotFoundException: ' + name);");
            w.close("}");
            w.line("return fn(false).constructor.$class;");
            w.close("},");
            w.line("loadBytes: function(name) { return rt.resourceBytes(name); },");
            w.line("loadResource: function(name) { return rt.resourceText(name); },");
            w.open("registerExtension: function(init) {");
            w.line("extensions.push(init);");
            w.line("init(vm);");
            w.close("}");
            w.close("};");
            w.open("vm.$loader = function(name) {");
            w.open("if (typeof jvm2js.loader === 'function') {");
            w.line("jvm2js.loader(name);");
            w.close("}");
            w.close("};");
            w.close("}(this));");
        }
        LinkMode::Extension => {
            w.enter();
            for class in compiled {
                let prop = mangle_class_name(class);
                w.line(format!("{} = {};", bracket("exports", &prop), property("vm", &prop)));
            }
            w.close("});");
        }
    }
    out.write_str(w.as_str())
}

/// Defers to the host program, which defines the class.
fn write_link_stub(out: &mut JsWriter, class: &str) {
    let prop = mangle_class_name(class);
    out.line(format!(
        "{} = function() {{ return link({}, {}, arguments); }};",
        property("vm", &prop),
        js_string(class),
        js_string(&prop)
    ));
}

/// Resolves the class through the loader hook on first use.
fn write_lazy_stub(out: &mut JsWriter, class: &str) {
    let prop = mangle_class_name(class);
    out.line(format!(
        "{} = function() {{ return rt.lazy(vm, {}, {}, arguments); }};",
        property("vm", &prop),
        js_string(class),
        js_string(&prop)
    ));
}

/// Removes `/* ... */` comments outside string literals.
fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c == '/' && chars.peek() == Some(&'*') => {
                chars.next();
                let mut last = '\0';
                for inner in chars.by_ref() {
                    if last == '*' && inner == '/' {
                        break;
                    }
                    last = inner;
                }
            }
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_but_not_strings() {
        let text = "var a = 1; /* gone\n still gone */var b = '/* kept */';\n/**/var c;";
        assert_eq!(strip_block_comments(text), "var a = 1; var b = '/* kept */';\nvar c;");
    }

    #[test]
    fn stubs_name_the_class_twice() {
        let mut out = JsWriter::new();
        write_lazy_stub(&mut out, "a/B_c");
        assert_eq!(
            out.as_str(),
            "vm.a_B_1c = function() { return rt.lazy(vm, 'a/B_c', 'a_B_1c', arguments); };\n"
        );
        let mut out = JsWriter::new();
        write_link_stub(&mut out, "a/B");
        assert!(out.as_str().contains("return link('a/B', 'a_B', arguments);"));
    }

    #[test]
    fn extension_epilogue_registers_compiled_classes() {
        let mut out = String::new();
        write_epilogue(&mut out, LinkMode::Extension, &["a/B".to_string()]).unwrap();
        assert_eq!(out, "  exports['a_B'] = vm.a_B;\n});\n");
    }

    #[test]
    fn unreadable_classes_have_no_initializer_parents() {
        let res = crate::MemoryResources::new().with("demo/Broken.class", b"\xca\xfe\xba\xbe".to_vec());
        let cache = ClassDataCache::new(&res);
        assert!(initializer_parents(&cache, "demo/Broken").is_empty());
        assert!(initializer_parents(&cache, "demo/Missing").is_empty());
    }
}
