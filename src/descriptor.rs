//! Type descriptors and the mangling of JVM names into JavaScript
//! identifiers.

use crate::code_attribute::Kind;

/// A JVM field type, or `Void` in return position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<JvmType>),
}

impl JvmType {
    /// Stack kind of a value of this type; `None` for `void`.
    pub fn kind(&self) -> Option<Kind> {
        match self {
            JvmType::Long => Some(Kind::Long),
            JvmType::Float => Some(Kind::Float),
            JvmType::Double => Some(Kind::Double),
            JvmType::Reference(_) | JvmType::Array(_) => Some(Kind::Ref),
            JvmType::Void => None,
            _ => Some(Kind::Int),
        }
    }

    /// Number of local variable slots a value of this type occupies.
    pub fn slots(&self) -> u16 {
        match self {
            JvmType::Long | JvmType::Double => 2,
            JvmType::Void => 0,
            _ => 1,
        }
    }

    pub fn to_descriptor(&self) -> String {
        match self {
            JvmType::Int => "I".into(),
            JvmType::Long => "J".into(),
            JvmType::Float => "F".into(),
            JvmType::Double => "D".into(),
            JvmType::Byte => "B".into(),
            JvmType::Char => "C".into(),
            JvmType::Short => "S".into(),
            JvmType::Boolean => "Z".into(),
            JvmType::Void => "V".into(),
            JvmType::Reference(name) => format!("L{};", name),
            JvmType::Array(inner) => format!("[{}", inner.to_descriptor()),
        }
    }
}

/// Parsed method descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSignature {
    pub params: Vec<JvmType>,
    pub ret: JvmType,
}

impl MethodSignature {
    /// Local slots taken by the parameters, not counting `this`.
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(JvmType::slots).sum()
    }
}

/// Parse a single type descriptor starting at `pos`.
/// Returns the type and the position just after it.
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(JvmType, usize)> {
    let bytes = desc.as_bytes();
    match *bytes.get(pos)? {
        b'B' => Some((JvmType::Byte, pos + 1)),
        b'C' => Some((JvmType::Char, pos + 1)),
        b'D' => Some((JvmType::Double, pos + 1)),
        b'F' => Some((JvmType::Float, pos + 1)),
        b'I' => Some((JvmType::Int, pos + 1)),
        b'J' => Some((JvmType::Long, pos + 1)),
        b'S' => Some((JvmType::Short, pos + 1)),
        b'Z' => Some((JvmType::Boolean, pos + 1)),
        b'V' => Some((JvmType::Void, pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            if class_name.is_empty() {
                return None;
            }
            Some((JvmType::Reference(class_name.to_string()), pos + semi + 2))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            if inner == JvmType::Void {
                return None;
            }
            Some((JvmType::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a complete field descriptor; trailing text is rejected.
pub fn parse_field_descriptor(desc: &str) -> Option<JvmType> {
    match parse_type_at(desc, 0)? {
        (JvmType::Void, _) => None,
        (ty, end) if end == desc.len() => Some(ty),
        _ => None,
    }
}

/// Parse a method descriptor, e.g. `(II)V`.
pub fn parse_method_descriptor(desc: &str) -> Option<MethodSignature> {
    let rest = desc.strip_prefix('(')?;
    let close = rest.find(')')? + 1;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        if ty == JvmType::Void {
            return None;
        }
        params.push(ty);
        pos = next;
    }
    if pos != close {
        return None;
    }
    let (ret, end) = parse_type_at(desc, close + 1)?;
    if end != desc.len() {
        return None;
    }
    Some(MethodSignature { params, ret })
}

/// Package part of an internal class name.
pub fn package_name(name: &str) -> Option<&str> {
    name.rfind('/').map(|pos| &name[..pos])
}

/// Accepts `a.b.C` or `a/b/C` and returns the internal form.
pub fn to_internal_name(name: &str) -> String {
    name.trim_end_matches(".class").replace('.', "/")
}

// ---------------------------------------------------------------------------
// Mangling
// ---------------------------------------------------------------------------

/// Escapes text so it can sit inside a JavaScript identifier. Letters,
/// digits and `$` stay, `/` separates, everything else is escaped.
fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '$' => out.push(c),
            '/' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            other => {
                let mut units = [0u16; 2];
                for unit in other.encode_utf16(&mut units) {
                    out.push_str(&format!("_0{:04x}", unit));
                }
            }
        }
    }
}

/// JavaScript name of the function that defines a class: `a/b/C` → `a_b_C`.
pub fn mangle_class_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    escape_into(&mut out, name);
    out
}

/// Property name of a method: `name__` followed by the escaped return type
/// and parameter types. Constructors become `cons`, static initializers
/// `class`.
pub fn mangle_method_name(name: &str, descriptor: &str) -> String {
    let mut out = String::with_capacity(name.len() + descriptor.len() + 2);
    match name {
        "<init>" => out.push_str("cons"),
        "<clinit>" => out.push_str("class"),
        _ => {
            for c in name.chars() {
                match c {
                    'a'..='z' | 'A'..='Z' | '0'..='9' | '$' | '_' => out.push(c),
                    other => escape_into(&mut out, other.encode_utf8(&mut [0u8; 4])),
                }
            }
        }
    }
    out.push_str("__");
    let (params, ret) = match descriptor.strip_prefix('(').and_then(|d| d.split_once(')')) {
        Some(parts) => parts,
        None => ("", descriptor),
    };
    escape_into(&mut out, ret);
    escape_into(&mut out, params);
    out
}

/// Property name of a field, qualified by its declaring class so that
/// hidden fields of a superclass keep their own slot.
pub fn mangle_field_name(owner: &str, name: &str) -> String {
    let mut out = String::from("fld_");
    escape_into(&mut out, owner);
    out.push('_');
    escape_into(&mut out, name);
    out
}

/// Property flag set on prototypes of classes assignable to `class`.
pub fn instance_of_flag(class: &str) -> String {
    format!("$instOf_{}", mangle_class_name(class))
}
