//! Translation of one class into the JavaScript function that defines it.

mod annotation;
pub mod emit;
mod method;
pub mod numeric;
mod stack;
mod switch;

use thiserror::Error;

use crate::cache::{CacheError, ClassDataCache};
use crate::class_data::{ClassData, ConstantValue, FieldData, ParseError};
use crate::code_attribute::DecodeError;
use crate::config::markers;
use crate::constant_info::ConstantPoolError;
use crate::descriptor::{instance_of_flag, mangle_class_name, mangle_field_name, mangle_method_name, JvmType};
use crate::dispatch::{DispatchResolver, ModuleScope};
use crate::export::{ExportedSymbols, SymbolExporter};

use self::annotation::render_annotations;
use self::emit::{bracket, js_string, property, JsWriter};
use self::stack::Literal;

pub use self::switch::{lower as lower_switch, SwitchLowering};

/// What the generator asks of the surrounding link step.
pub trait Linker {
    /// `class` must be defined before the generated code runs.
    fn require_reference(&mut self, class: &str);
    /// A virtual call through the invoker trampoline uses `mangled`.
    fn require_invoker(&mut self, mangled: &str);
    /// The script resource `resource` must be included in the output.
    fn require_script(&mut self, resource: &str);
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{at}: {source}")]
    Decode {
        at: String,
        #[source]
        source: DecodeError,
    },
    #[error("{at}: {source}")]
    ConstantPool {
        at: String,
        #[source]
        source: ConstantPoolError,
    },
    #[error("{at}: {name} is not supported")]
    Unsupported { at: String, name: &'static str },
    #[error("{at}: operand stack underflow")]
    StackUnderflow { at: String },
    #[error("{at}: {source}")]
    Resolve {
        at: String,
        #[source]
        source: CacheError,
    },
    #[error("{at}: {source}")]
    Descriptor {
        at: String,
        #[source]
        source: ParseError,
    },
    #[error("{at}: {message}")]
    Invalid { at: String, message: String },
}

/// Generates class definitions for one translation run.
pub struct ClassGenerator<'a, 'c, 'r> {
    exports: &'a ExportedSymbols<'c, 'r>,
    scope: &'a ModuleScope,
}

impl<'a, 'c, 'r> ClassGenerator<'a, 'c, 'r> {
    pub fn new(exports: &'a ExportedSymbols<'c, 'r>, scope: &'a ModuleScope) -> Self {
        ClassGenerator { exports, scope }
    }

    fn cache(&self) -> &'c ClassDataCache<'r> {
        self.exports.cache()
    }

    fn resolver(&self) -> DispatchResolver<'a, 'c, 'r> {
        DispatchResolver::new(self.exports, self.scope)
    }

    /// `vm.a_B`
    fn vm_class(&self, class: &str) -> String {
        property("vm", &mangle_class_name(class))
    }

    /// Members of classes compiled elsewhere, or of unknown classes, are
    /// accessed by quoted name so that minifying this output cannot break
    /// the link.
    fn member(&self, object: &str, declaring: Option<&str>, name: &str) -> String {
        match declaring {
            Some(class) if !self.scope.is_external(class) => property(object, name),
            _ => bracket(object, name),
        }
    }

    fn declaring_field(&self, class: &str, name: &str, descriptor: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .cache()
            .find_field(class, name, descriptor)?
            .map(|f| f.class.name().to_string()))
    }

    fn declaring_method(&self, class: &str, name: &str, descriptor: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .cache()
            .find_method(class, name, descriptor)?
            .map(|m| m.class.name().to_string()))
    }

    /// Writes the definition of `class` and returns the statement that
    /// runs its static initializer, if it has one.
    pub fn compile(
        &self,
        class: &ClassData,
        linker: &mut dyn Linker,
        exporter: &mut SymbolExporter,
        out: &mut JsWriter,
    ) -> Result<Option<String>, GenerationError> {
        let name = class.name();
        let mangled = mangle_class_name(name);
        let at = || name.to_string();
        let resolve = |source: CacheError| GenerationError::Resolve { at: at(), source };
        tracing::debug!("generating {name}");

        if let Some(script) = class
            .annotation(markers::JAVASCRIPT_RESOURCE)
            .and_then(|a| a.element("value"))
            .and_then(|v| v.as_str())
        {
            linker.require_script(script);
        }

        out.open(format!("{} = function {mangled}(arg0) {{", self.vm_class(name)));
        out.line(format!("var CLS = {mangled};"));
        out.open("if (!CLS.$class) {");
        out.line("CLS.$class = 'temp';");
        match class.super_name() {
            Some(sup) => {
                linker.require_reference(sup);
                out.line(format!("var pp = {}(true);", self.vm_class(sup)));
                out.line("var p = CLS.prototype = pp;");
                out.line("var sprcls = pp.constructor.$class;");
            }
            None => {
                out.line("var p = CLS.prototype;");
                out.line("var sprcls = null;");
            }
        }
        out.line("var c = p;");
        out.line("p.constructor = CLS;");

        for field in class.fields().iter().filter(|f| f.is_static()) {
            let fname = mangle_field_name(name, field.name());
            out.line(format!("{} = {};", property("c", &fname), self.initial_value(field)?));
            if self.exports.is_exported_field(class, field).map_err(&resolve)? {
                exporter.export(out, "c", &fname);
            }
        }

        let mut has_clinit = false;
        for method in class.methods() {
            if method.is_abstract() && method.annotation(markers::JAVASCRIPT_BODY).is_none() {
                continue;
            }
            has_clinit |= method.name() == "<clinit>";
            method::translate(self, &mut *linker, class, method, out)?;
            if self.exports.is_exported_method(class, method).map_err(&resolve)? {
                exporter.export(out, "c", &mangle_method_name(method.name(), method.descriptor()));
            }
        }

        linker.require_reference("java/lang/Class");
        out.line(format!("CLS.$class = {}(true);", self.vm_class("java/lang/Class")));
        out.line(format!("CLS.$class.jvmName = {};", js_string(name)));
        out.line("CLS.$class.superclass = sprcls;");
        if !class.interfaces().is_empty() {
            let list: Vec<String> = class
                .interfaces()
                .iter()
                .map(|i| format!("{}(false).constructor.$class", self.vm_class(i)))
                .collect();
            out.line(format!("CLS.$class.interfaces = function() {{ return [{}]; }};", list.join(", ")));
        }
        out.line(format!("CLS.$class.access = {};", class.access().bits()));
        out.line("CLS.$class.cnstr = CLS;");
        if let Some(anno) = render_annotations(class.annotations(), &mut *linker) {
            out.line(format!("CLS.$class.anno = {anno};"));
        }
        out.line(format!("{} = true;", property("c", &instance_of_flag(name))));
        for iface in class.interfaces() {
            linker.require_reference(iface);
            out.line(format!("rt.implement(c, {}(false));", self.vm_class(iface)));
        }
        out.close("}");

        out.open("if (arguments.length === 0) {");
        out.open("if (!(this instanceof CLS)) {");
        out.line("return new CLS();");
        out.close("}");
        if let Some(sup) = class.super_name() {
            out.line(format!("{}(false).constructor.call(this);", self.vm_class(sup)));
        }
        for field in class.fields().iter().filter(|f| !f.is_static()) {
            let fname = mangle_field_name(name, field.name());
            out.line(format!("{} = {};", property("this", &fname), self.initial_value(field)?));
            if self.exports.is_exported_field(class, field).map_err(&resolve)? {
                exporter.export(out, "this", &fname);
            }
        }
        out.line("return this;");
        out.close("}");
        out.line("return arg0 ? new CLS() : CLS.prototype;");
        out.close("};");

        if self.exports.is_exported_class(class).map_err(&resolve)? {
            exporter.export(out, "vm", &mangled);
        }

        Ok(has_clinit.then(|| format!("{}(false).{}();", self.vm_class(name), mangle_method_name("<clinit>", "()V"))))
    }

    fn initial_value(&self, field: &FieldData) -> Result<String, GenerationError> {
        if field.is_static() {
            if let Some(value) = field.constant_value() {
                let literal = match value {
                    ConstantValue::Int(v) => Literal::Int(*v),
                    ConstantValue::Long(v) => Literal::Long(*v),
                    ConstantValue::Float(v) => Literal::Float(*v),
                    ConstantValue::Double(v) => Literal::Double(*v),
                    ConstantValue::String(s) => Literal::Str(s.clone()),
                };
                return Ok(literal.render());
            }
        }
        let ty = field.field_type().map_err(|source| GenerationError::Descriptor {
            at: format!("{}.{}", field.owner(), field.name()),
            source,
        })?;
        Ok(match ty {
            JvmType::Long => Literal::Long(0).render(),
            JvmType::Reference(_) | JvmType::Array(_) => "null".into(),
            _ => "0".into(),
        })
    }
}
