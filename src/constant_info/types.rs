use std::io::{Read, Seek};

use binrw::{binread, BinRead, BinResult};
use thiserror::Error;

/// One tagged constant pool entry.
#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub enum ConstantEntry {
    #[br(magic = 1u8)]
    Utf8(#[br(parse_with = modified_utf8)] String),
    #[br(magic = 3u8)]
    Integer(i32),
    #[br(magic = 4u8)]
    Float(f32),
    #[br(magic = 5u8)]
    Long(i64),
    #[br(magic = 6u8)]
    Double(f64),
    #[br(magic = 7u8)]
    Class { name_index: u16 },
    #[br(magic = 8u8)]
    String { string_index: u16 },
    #[br(magic = 9u8)]
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    #[br(magic = 10u8)]
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    #[br(magic = 11u8)]
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    #[br(magic = 12u8)]
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    #[br(magic = 15u8)]
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    #[br(magic = 16u8)]
    MethodType { descriptor_index: u16 },
    #[br(magic = 17u8)]
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    #[br(magic = 18u8)]
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    #[br(magic = 19u8)]
    Module { name_index: u16 },
    #[br(magic = 20u8)]
    Package { name_index: u16 },
}

impl ConstantEntry {
    /// Long and double entries take two pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, ConstantEntry::Long(_) | ConstantEntry::Double(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            ConstantEntry::Utf8(_) => "Utf8",
            ConstantEntry::Integer(_) => "Integer",
            ConstantEntry::Float(_) => "Float",
            ConstantEntry::Long(_) => "Long",
            ConstantEntry::Double(_) => "Double",
            ConstantEntry::Class { .. } => "Class",
            ConstantEntry::String { .. } => "String",
            ConstantEntry::FieldRef { .. } => "Fieldref",
            ConstantEntry::MethodRef { .. } => "Methodref",
            ConstantEntry::InterfaceMethodRef { .. } => "InterfaceMethodref",
            ConstantEntry::NameAndType { .. } => "NameAndType",
            ConstantEntry::MethodHandle { .. } => "MethodHandle",
            ConstantEntry::MethodType { .. } => "MethodType",
            ConstantEntry::Dynamic { .. } => "Dynamic",
            ConstantEntry::InvokeDynamic { .. } => "InvokeDynamic",
            ConstantEntry::Module { .. } => "Module",
            ConstantEntry::Package { .. } => "Package",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConstantPoolError {
    #[error("constant pool index {0} is out of range")]
    OutOfRange(u16),
    #[error("constant pool index {0} refers to an unusable slot")]
    Unusable(u16),
    #[error("constant pool index {index} is {found}, expected {expected}")]
    WrongKind {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
}

/// A field or method reference with every index resolved to text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// A loadable constant as seen by `ldc`.
#[derive(Clone, Debug, PartialEq)]
pub enum Loadable<'a> {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(&'a str),
    Class(&'a str),
}

/// The constant pool, indexed from 1 the way bytecode operands address it.
/// Slot 0 and the upper half of long/double entries stay empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantPool {
    slots: Vec<Option<ConstantEntry>>,
}

impl ConstantPool {
    pub fn from_entries(entries: Vec<ConstantEntry>) -> Self {
        let mut slots = vec![None];
        for entry in entries {
            let wide = entry.is_wide();
            slots.push(Some(entry));
            if wide {
                slots.push(None);
            }
        }
        ConstantPool { slots }
    }

    /// Number of slots, including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() <= 1
    }

    pub fn get(&self, index: u16) -> Result<&ConstantEntry, ConstantPoolError> {
        match self.slots.get(index as usize) {
            None => Err(ConstantPoolError::OutOfRange(index)),
            Some(None) => Err(ConstantPoolError::Unusable(index)),
            Some(Some(entry)) => Ok(entry),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &ConstantEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i as u16, e)))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ConstantPoolError> {
        match self.get(index)? {
            ConstantEntry::Utf8(s) => Ok(s),
            other => Err(wrong_kind(index, "Utf8", other)),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str, ConstantPoolError> {
        match self.get(index)? {
            ConstantEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(wrong_kind(index, "Class", other)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ConstantPoolError> {
        match self.get(index)? {
            ConstantEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(wrong_kind(index, "NameAndType", other)),
        }
    }

    /// Resolves a Fieldref, Methodref or InterfaceMethodref.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, ConstantPoolError> {
        match self.get(index)? {
            ConstantEntry::FieldRef {
                class_index,
                name_and_type_index,
            }
            | ConstantEntry::MethodRef {
                class_index,
                name_and_type_index,
            }
            | ConstantEntry::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let class = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok(MemberRef {
                    class,
                    name,
                    descriptor,
                })
            }
            other => Err(wrong_kind(index, "member reference", other)),
        }
    }

    pub fn loadable(&self, index: u16) -> Result<Loadable<'_>, ConstantPoolError> {
        match self.get(index)? {
            ConstantEntry::Integer(v) => Ok(Loadable::Int(*v)),
            ConstantEntry::Float(v) => Ok(Loadable::Float(*v)),
            ConstantEntry::Long(v) => Ok(Loadable::Long(*v)),
            ConstantEntry::Double(v) => Ok(Loadable::Double(*v)),
            ConstantEntry::String { string_index } => Ok(Loadable::String(self.utf8(*string_index)?)),
            ConstantEntry::Class { name_index } => Ok(Loadable::Class(self.utf8(*name_index)?)),
            other => Err(wrong_kind(index, "loadable constant", other)),
        }
    }
}

fn wrong_kind(index: u16, expected: &'static str, found: &ConstantEntry) -> ConstantPoolError {
    ConstantPoolError::WrongKind {
        index,
        expected,
        found: found.kind(),
    }
}

/// Reads `count - 1` entries; `count` is the pool size field of the class file.
#[binrw::parser(reader, endian)]
pub fn constant_pool(count: u16) -> BinResult<ConstantPool> {
    let mut slots: Vec<Option<ConstantEntry>> = Vec::with_capacity(count as usize);
    slots.push(None);
    while slots.len() < count as usize {
        let entry = ConstantEntry::read_options(reader, endian, ())?;
        let wide = entry.is_wide();
        slots.push(Some(entry));
        if wide {
            slots.push(None);
        }
    }
    if slots.len() > count as usize {
        return Err(binrw::Error::AssertFail {
            pos: reader.stream_position()?,
            message: "wide constant overruns the constant pool".to_string(),
        });
    }
    Ok(ConstantPool { slots })
}

#[binrw::parser(reader, endian)]
fn modified_utf8() -> BinResult<String> {
    let start = reader.stream_position()?;
    let len = u16::read_options(reader, endian, ())?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    decode_modified_utf8(&bytes).ok_or_else(|| binrw::Error::AssertFail {
        pos: start,
        message: "malformed modified UTF-8 string".to_string(),
    })
}

/// Decodes the class file flavour of UTF-8: NUL is two bytes and
/// supplementary characters arrive as surrogate pairs.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return None;
            }
            units.push(b as u16);
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xc0 != 0x80 {
                return None;
            }
            units.push((((b & 0x1f) as u16) << 6) | (b2 & 0x3f) as u16);
            i += 2;
        } else if b & 0xf0 == 0xe0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xc0 != 0x80 || b3 & 0xc0 != 0x80 {
                return None;
            }
            units.push((((b & 0x0f) as u16) << 12) | (((b2 & 0x3f) as u16) << 6) | (b3 & 0x3f) as u16);
            i += 3;
        } else {
            return None;
        }
    }
    // Unpaired surrogates are legal in class files; keep them as U+FFFD.
    Some(
        char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_two_byte_nul() {
        assert_eq!(decode_modified_utf8(&[0x61, 0xc0, 0x80, 0x62]).as_deref(), Some("a\u{0}b"));
    }

    #[test]
    fn decodes_surrogate_pairs() {
        // U+1F600 as two three-byte surrogates
        let bytes = [0xed, 0xa0, 0xbd, 0xed, 0xb8, 0x80];
        assert_eq!(decode_modified_utf8(&bytes).as_deref(), Some("\u{1F600}"));
    }

    #[test]
    fn rejects_raw_nul_and_four_byte_forms() {
        assert_eq!(decode_modified_utf8(&[0x00]), None);
        assert_eq!(decode_modified_utf8(&[0xf0, 0x9f, 0x98, 0x80]), None);
        assert_eq!(decode_modified_utf8(&[0xc3]), None);
    }

    #[test]
    fn wide_entries_leave_a_hole() {
        let pool = ConstantPool::from_entries(vec![
            ConstantEntry::Long(7),
            ConstantEntry::Utf8("x".into()),
        ]);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.get(1), Ok(&ConstantEntry::Long(7)));
        assert_eq!(pool.get(2), Err(ConstantPoolError::Unusable(2)));
        assert_eq!(pool.utf8(3), Ok("x"));
        assert_eq!(pool.get(9), Err(ConstantPoolError::OutOfRange(9)));
    }

    #[test]
    fn member_ref_resolves_all_indices() {
        let pool = ConstantPool::from_entries(vec![
            ConstantEntry::Utf8("a/B".into()),
            ConstantEntry::Class { name_index: 1 },
            ConstantEntry::Utf8("m".into()),
            ConstantEntry::Utf8("()I".into()),
            ConstantEntry::NameAndType {
                name_index: 3,
                descriptor_index: 4,
            },
            ConstantEntry::MethodRef {
                class_index: 2,
                name_and_type_index: 5,
            },
        ]);
        let r = pool.member_ref(6).unwrap();
        assert_eq!((r.class, r.name, r.descriptor), ("a/B", "m", "()I"));
        assert!(matches!(
            pool.member_ref(1),
            Err(ConstantPoolError::WrongKind { index: 1, .. })
        ));
    }
}
