//! Which generated symbols stay visible to code outside the program, and
//! how that visibility is expressed in the output.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::attribute_info::Annotation;
use crate::cache::{CacheError, ClassDataCache};
use crate::class_data::{ClassData, FieldData, MethodData};
use crate::codegen::emit::{bracket, property, JsWriter};
use crate::config::{markers, ObfuscationLevel};
use crate::descriptor::package_name;
use crate::field_info::FieldAccessFlags;
use crate::method_info::MethodAccessFlags;

/// Names the runtime skeleton relies on; a minifier must never rename them.
pub const INITIAL_EXTERNS: &[&str] = &[
    "jvm2js", "$class", "anno", "access", "cls", "vm", "rt", "loadClass", "loadBytes",
    "loadResource", "registerExtension", "jvmName", "primitive", "superclass", "interfaces",
    "cnstr", "hi", "lo", "add32", "sub32", "mul32", "div32", "mod32", "neg32", "toInt8",
    "toInt16", "toChar", "add64", "sub64", "mul64", "div64", "mod64", "neg64", "and64", "or64",
    "xor64", "shl64", "shr64", "ushr64", "compare64", "i2l", "l2i", "l2d", "d2i", "d2l", "long",
    "fcmp", "newArray", "multiArray", "at", "put", "checkCast", "isInstance", "implement",
    "lazy", "resource", "resourceText", "resourceBytes", "throwable", "mangleClass", "classFor",
    "annotation", "$loader", "getClass__Ljava_lang_Class_2",
    "clone__Ljava_lang_Object_2",
];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum SymbolKey {
    Class(String),
    Package(String),
    Field(String, String),
    Method(String, String, String),
}

/// Memoized exported/not-exported decisions for one run.
pub struct ExportedSymbols<'c, 'r> {
    cache: &'c ClassDataCache<'r>,
    explicit_classes: FxHashSet<String>,
    explicit_packages: FxHashSet<String>,
    memo: RefCell<FxHashMap<SymbolKey, bool>>,
}

fn marked(annotations: &[Annotation]) -> bool {
    annotations.iter().any(|a| a.type_name() == markers::EXPORTED)
}

impl<'c, 'r> ExportedSymbols<'c, 'r> {
    /// `explicit` entries are class names, or package names ending in `/`.
    pub fn new(cache: &'c ClassDataCache<'r>, explicit: &[String]) -> Self {
        let mut explicit_classes = FxHashSet::default();
        let mut explicit_packages = FxHashSet::default();
        for name in explicit {
            match name.strip_suffix('/') {
                Some(package) => explicit_packages.insert(package.to_string()),
                None => explicit_classes.insert(name.clone()),
            };
        }
        ExportedSymbols {
            cache,
            explicit_classes,
            explicit_packages,
            memo: RefCell::new(FxHashMap::default()),
        }
    }

    fn memoized<F>(&self, key: SymbolKey, compute: F) -> Result<bool, CacheError>
    where
        F: FnOnce() -> Result<bool, CacheError>,
    {
        if let Some(&known) = self.memo.borrow().get(&key) {
            return Ok(known);
        }
        let value = compute()?;
        self.memo.borrow_mut().insert(key, value);
        Ok(value)
    }

    /// A package is exported when listed explicitly or when its
    /// `package-info` carries the export marker.
    pub fn is_exported_package(&self, package: &str) -> Result<bool, CacheError> {
        self.memoized(SymbolKey::Package(package.to_string()), || {
            if self.explicit_packages.contains(package) {
                return Ok(true);
            }
            let info = if package.is_empty() {
                "package-info".to_string()
            } else {
                format!("{package}/package-info")
            };
            Ok(self
                .cache
                .find_class(&info)?
                .map(|cd| marked(cd.annotations()))
                .unwrap_or(false))
        })
    }

    pub fn is_exported_class(&self, class: &ClassData) -> Result<bool, CacheError> {
        self.memoized(SymbolKey::Class(class.name().to_string()), || {
            if self.explicit_classes.contains(class.name()) || marked(class.annotations()) {
                return Ok(true);
            }
            if !class.is_public() {
                return Ok(false);
            }
            self.is_exported_package(package_name(class.name()).unwrap_or(""))
        })
    }

    pub fn is_exported_field(&self, class: &ClassData, field: &FieldData) -> Result<bool, CacheError> {
        let key = SymbolKey::Field(class.name().to_string(), field.name().to_string());
        self.memoized(key, || {
            if marked(field.annotations()) {
                return Ok(true);
            }
            let visible = field
                .access()
                .intersects(FieldAccessFlags::PUBLIC | FieldAccessFlags::PROTECTED);
            Ok(visible && self.is_exported_class(class)?)
        })
    }

    pub fn is_exported_method(&self, class: &ClassData, method: &MethodData) -> Result<bool, CacheError> {
        let key = SymbolKey::Method(
            class.name().to_string(),
            method.name().to_string(),
            method.descriptor().to_string(),
        );
        self.memoized(key, || {
            if marked(method.annotations()) {
                return Ok(true);
            }
            let visible = method
                .access()
                .intersects(MethodAccessFlags::PUBLIC | MethodAccessFlags::PROTECTED);
            Ok(visible && self.is_exported_class(class)?)
        })
    }

    pub fn cache(&self) -> &'c ClassDataCache<'r> {
        self.cache
    }
}

/// Turns export decisions into output according to the obfuscation level.
#[derive(Debug)]
pub struct SymbolExporter {
    level: ObfuscationLevel,
    externs: Vec<String>,
    seen: FxHashSet<String>,
    exported: usize,
}

impl SymbolExporter {
    pub fn new(level: ObfuscationLevel) -> Self {
        let mut exporter = SymbolExporter {
            level,
            externs: Vec::new(),
            seen: FxHashSet::default(),
            exported: 0,
        };
        if level == ObfuscationLevel::Externs {
            for name in INITIAL_EXTERNS {
                exporter.add_extern(name);
            }
        }
        exporter
    }

    fn add_extern(&mut self, name: &str) {
        if self.seen.insert(name.to_string()) {
            self.externs.push(name.to_string());
        }
    }

    /// Publishes `dest.name` under a name a minifier keeps.
    pub fn export(&mut self, out: &mut JsWriter, dest: &str, name: &str) {
        self.exported += 1;
        match self.level {
            ObfuscationLevel::None => {}
            ObfuscationLevel::Externs => self.add_extern(name),
            ObfuscationLevel::Full => {
                out.line(format!("{} = {};", bracket(dest, name), property(dest, name)));
            }
        }
    }

    /// Number of symbols exported so far.
    pub fn exported(&self) -> usize {
        self.exported
    }

    pub fn level(&self) -> ObfuscationLevel {
        self.level
    }

    pub fn into_externs(self) -> Vec<String> {
        self.externs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_level_republishes_under_quoted_name() {
        let mut exporter = SymbolExporter::new(ObfuscationLevel::Full);
        let mut out = JsWriter::new();
        exporter.export(&mut out, "vm", "a_B");
        assert_eq!(out.as_str(), "vm['a_B'] = vm.a_B;\n");
        assert_eq!(exporter.exported(), 1);
    }

    #[test]
    fn externs_level_starts_from_runtime_names_and_dedups() {
        let mut exporter = SymbolExporter::new(ObfuscationLevel::Externs);
        let mut out = JsWriter::new();
        exporter.export(&mut out, "c", "run__V");
        exporter.export(&mut out, "c", "run__V");
        exporter.export(&mut out, "c", "add32");
        assert!(out.is_empty());
        assert_eq!(exporter.exported(), 3);
        let externs = exporter.into_externs();
        assert_eq!(externs[0], "jvm2js");
        assert_eq!(externs.iter().filter(|n| *n == "run__V").count(), 1);
        assert_eq!(externs.len(), INITIAL_EXTERNS.len() + 1);
    }

    #[test]
    fn none_level_only_counts() {
        let mut exporter = SymbolExporter::new(ObfuscationLevel::None);
        let mut out = JsWriter::new();
        exporter.export(&mut out, "vm", "a_B");
        assert!(out.is_empty());
        assert_eq!(exporter.exported(), 1);
        assert!(exporter.into_externs().is_empty());
    }
}
