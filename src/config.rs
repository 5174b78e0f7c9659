use crate::descriptor::to_internal_name;

/// Marker annotations understood by the translator.
pub mod markers {
    /// On a class, member or `package-info`: keep the symbol reachable
    /// from outside the generated program.
    pub const EXPORTED: &str = "jvm2js/core/Exported";
    /// On a native method: `args` (parameter names) and `body` (code).
    pub const JAVASCRIPT_BODY: &str = "jvm2js/core/JavaScriptBody";
    /// On a class: `value` names a script resource to include.
    pub const JAVASCRIPT_RESOURCE: &str = "jvm2js/core/JavaScriptResource";
}

/// Runtime support classes referenced by the runtime skeleton itself.
pub const DEFAULT_FIXED_DEPENDENCIES: &[&str] = &[
    "java/lang/Class",
    "java/lang/ArithmeticException",
    "java/lang/ArrayIndexOutOfBoundsException",
    "java/lang/ClassCastException",
    "java/lang/NegativeArraySizeException",
    "java/lang/NullPointerException",
];

/// How much the output cares about a later minification pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObfuscationLevel {
    /// Symbols keep their names; nothing extra is emitted.
    #[default]
    None,
    /// Exported names are collected for an externs file.
    Externs,
    /// Every exported symbol is re-published under a quoted name.
    Full,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkMode {
    /// A complete program with its own runtime.
    #[default]
    Standalone,
    /// Registers itself with an already running program; only the roots
    /// are compiled, everything else is linked from the host.
    Extension,
}

#[derive(Clone, Debug)]
pub struct TranslateOptions {
    /// Internal names of the classes to translate.
    pub roots: Vec<String>,
    pub mode: LinkMode,
    /// Extra exported classes; a trailing `/` exports a whole package.
    pub exported: Vec<String>,
    /// Extra resources embedded as base64 data.
    pub resources: Vec<String>,
    pub obfuscation: ObfuscationLevel,
    /// A library must export at least one symbol.
    pub library: bool,
    /// Pulled in before the roots in standalone mode.
    pub fixed_dependencies: Vec<String>,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        TranslateOptions {
            roots: Vec::new(),
            mode: LinkMode::Standalone,
            exported: Vec::new(),
            resources: Vec::new(),
            obfuscation: ObfuscationLevel::None,
            library: false,
            fixed_dependencies: DEFAULT_FIXED_DEPENDENCIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TranslateOptions {
    /// Options for the given roots; names may be dotted or slashed.
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TranslateOptions {
            roots: roots.into_iter().map(|r| to_internal_name(r.as_ref())).collect(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: LinkMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_exported(mut self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        if name.ends_with('/') || name.ends_with('.') {
            let package = name.trim_end_matches(['/', '.']).replace('.', "/");
            self.exported.push(format!("{package}/"));
        } else {
            self.exported.push(to_internal_name(name));
        }
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>) -> Self {
        self.resources.push(name.into());
        self
    }

    pub fn with_obfuscation(mut self, level: ObfuscationLevel) -> Self {
        self.obfuscation = level;
        self
    }

    pub fn as_library(mut self, library: bool) -> Self {
        self.library = library;
        self
    }

    pub fn with_fixed_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.fixed_dependencies = names.into_iter().map(|r| to_internal_name(r.as_ref())).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_names() {
        let opts = TranslateOptions::new(["a.b.Main"])
            .with_exported("a.b.Api")
            .with_exported("a.c.");
        assert_eq!(opts.roots, vec!["a/b/Main"]);
        assert_eq!(opts.exported, vec!["a/b/Api", "a/c/"]);
        assert_eq!(opts.fixed_dependencies[0], "java/lang/Class");
    }
}
