use std::io::Cursor;

use binrw::{BinRead, BinResult, Endian};

use crate::constant_info::{ConstantEntry, ConstantPool, ConstantPoolError};

use super::types::*;

/// Decodes the payload of a known attribute.
pub fn decode_attribute<T>(attr: &AttributeInfo) -> BinResult<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_options(&mut Cursor::new(&attr.info), Endian::Big, ())
}

/// Finds the first attribute named `name`.
pub fn find_attribute<'a>(
    attributes: &'a [AttributeInfo],
    pool: &ConstantPool,
    name: &str,
) -> Option<&'a AttributeInfo> {
    attributes
        .iter()
        .find(|a| pool.utf8(a.attribute_name_index).map(|n| n == name).unwrap_or(false))
}

/// Collects visible and invisible annotations from an attribute list.
pub fn read_annotations(
    attributes: &[AttributeInfo],
    pool: &ConstantPool,
) -> Result<Vec<Annotation>, AnnotationError> {
    let mut out = Vec::new();
    for attr in attributes {
        let visible = match pool.utf8(attr.attribute_name_index)? {
            "RuntimeVisibleAnnotations" => true,
            "RuntimeInvisibleAnnotations" => false,
            _ => continue,
        };
        let raw: RuntimeAnnotationsAttribute = decode_attribute(attr)?;
        for annotation in &raw.annotations {
            out.push(resolve_annotation(annotation, pool, visible)?);
        }
    }
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error(transparent)]
    Binary(#[from] binrw::Error),
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolError),
}

fn resolve_annotation(
    raw: &RuntimeAnnotation,
    pool: &ConstantPool,
    visible: bool,
) -> Result<Annotation, ConstantPoolError> {
    let type_descriptor = pool.utf8(raw.type_index)?.to_string();
    let elements = raw
        .element_value_pairs
        .iter()
        .map(|pair| {
            let name = pool.utf8(pair.element_name_index)?.to_string();
            Ok((name, resolve_value(&pair.value, pool, visible)?))
        })
        .collect::<Result<Vec<_>, ConstantPoolError>>()?;
    Ok(Annotation {
        type_descriptor,
        visible,
        elements,
    })
}

fn resolve_value(
    raw: &RawElementValue,
    pool: &ConstantPool,
    visible: bool,
) -> Result<ElementValue, ConstantPoolError> {
    let int = |tag: char, index: u16| -> Result<ElementValue, ConstantPoolError> {
        match pool.get(index)? {
            ConstantEntry::Integer(value) => Ok(ElementValue::Int { tag, value: *value }),
            _ => Err(ConstantPoolError::WrongKind {
                index,
                expected: "Integer",
                found: "other constant",
            }),
        }
    };
    let value = match raw {
        RawElementValue::Byte(i) => int('B', *i)?,
        RawElementValue::Char(i) => int('C', *i)?,
        RawElementValue::Int(i) => int('I', *i)?,
        RawElementValue::Short(i) => int('S', *i)?,
        RawElementValue::Boolean(i) => int('Z', *i)?,
        RawElementValue::Long(i) => match pool.get(*i)? {
            ConstantEntry::Long(v) => ElementValue::Long(*v),
            _ => return Err(mismatch(*i, "Long")),
        },
        RawElementValue::Float(i) => match pool.get(*i)? {
            ConstantEntry::Float(v) => ElementValue::Float(*v),
            _ => return Err(mismatch(*i, "Float")),
        },
        RawElementValue::Double(i) => match pool.get(*i)? {
            ConstantEntry::Double(v) => ElementValue::Double(*v),
            _ => return Err(mismatch(*i, "Double")),
        },
        RawElementValue::String(i) => ElementValue::String(pool.utf8(*i)?.to_string()),
        RawElementValue::EnumConst {
            type_name_index,
            const_name_index,
        } => ElementValue::Enum {
            type_descriptor: pool.utf8(*type_name_index)?.to_string(),
            name: pool.utf8(*const_name_index)?.to_string(),
        },
        RawElementValue::ClassInfo(i) => ElementValue::Class(pool.utf8(*i)?.to_string()),
        RawElementValue::Annotation(nested) => {
            ElementValue::Annotation(resolve_annotation(nested, pool, visible)?)
        }
        RawElementValue::Array { values } => ElementValue::Array(
            values
                .iter()
                .map(|v| resolve_value(v, pool, visible))
                .collect::<Result<_, _>>()?,
        ),
    };
    Ok(value)
}

fn mismatch(index: u16, expected: &'static str) -> ConstantPoolError {
    ConstantPoolError::WrongKind {
        index,
        expected,
        found: "other constant",
    }
}
