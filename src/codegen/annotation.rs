//! Runtime-visible annotations as data. Each element becomes a tagged
//! descriptor `[tag, ...]`; `rt.annotation` turns a map of descriptors into
//! an object with one accessor per element.

use crate::attribute_info::{Annotation, ElementValue};
use crate::codegen::emit::{js_double, js_float, js_string};
use crate::codegen::stack::Literal;
use crate::codegen::Linker;
use crate::descriptor::{mangle_class_name, mangle_field_name};

fn class_of(descriptor: &str) -> Option<&str> {
    descriptor.strip_prefix('L').and_then(|d| d.strip_suffix(';'))
}

/// Enum types and object class literals are required from `linker`, since
/// `rt.annotation` resolves them through `vm`.
fn element(value: &ElementValue, linker: &mut dyn Linker) -> String {
    match value {
        ElementValue::Int { tag, value } => format!("['{tag}', {value}]"),
        ElementValue::Long(v) => format!("['J', {}]", Literal::Long(*v).render()),
        ElementValue::Float(v) => format!("['F', {}]", js_float(*v)),
        ElementValue::Double(v) => format!("['D', {}]", js_double(*v)),
        ElementValue::String(s) => format!("['s', {}]", js_string(s)),
        ElementValue::Enum { type_descriptor, name } => {
            let class = class_of(type_descriptor).unwrap_or(type_descriptor);
            linker.require_reference(class);
            format!(
                "['e', {}, {}]",
                js_string(&mangle_class_name(class)),
                js_string(&mangle_field_name(class, name))
            )
        }
        ElementValue::Class(descriptor) => match class_of(descriptor) {
            Some(class) => {
                linker.require_reference(class);
                format!("['c', {}, {}]", js_string(descriptor), js_string(&mangle_class_name(class)))
            }
            None => format!("['c', {}]", js_string(descriptor)),
        },
        ElementValue::Annotation(nested) => {
            format!("['@', {}, {}]", js_string(&nested.type_descriptor), elements(nested, linker))
        }
        ElementValue::Array(values) => {
            let items: Vec<String> = values.iter().map(|v| element(v, linker)).collect();
            format!("['[', [{}]]", items.join(", "))
        }
    }
}

fn elements(annotation: &Annotation, linker: &mut dyn Linker) -> String {
    let props: Vec<String> = annotation
        .elements
        .iter()
        .map(|(name, value)| format!("{}: {}", js_string(name), element(value, linker)))
        .collect();
    format!("{{{}}}", props.join(", "))
}

/// Object literal keyed by annotation type descriptor, or `None` when no
/// annotation is retained at run time.
pub fn render_annotations(annotations: &[Annotation], linker: &mut dyn Linker) -> Option<String> {
    let visible: Vec<String> = annotations
        .iter()
        .filter(|a| a.visible)
        .map(|a| format!("{}: rt.annotation({})", js_string(&a.type_descriptor), elements(a, linker)))
        .collect();
    if visible.is_empty() {
        None
    } else {
        Some(format!("{{{}}}", visible.join(", ")))
    }
}
