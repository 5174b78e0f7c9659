//! Resolved, immutable model of one class file.

use std::io::Cursor;

use binrw::BinRead;
use once_cell::unsync::OnceCell;
use thiserror::Error;

use crate::attribute_info::{
    decode_attribute, find_attribute, read_annotations, Annotation, AnnotationError,
    AttributeInfo, CodeAttribute, ConstantValueAttribute, ExceptionEntry, ExceptionsAttribute,
    SourceFileAttribute,
};
use crate::constant_info::{ConstantEntry, ConstantPool, ConstantPoolError};
use crate::descriptor::{parse_field_descriptor, parse_method_descriptor, JvmType, MethodSignature};
use crate::field_info::{FieldAccessFlags, FieldInfo};
use crate::method_info::{MethodAccessFlags, MethodInfo};
use crate::types::{ClassAccessFlags, ClassFile};

const MIN_MAJOR_VERSION: u16 = 45;
const MAX_MAJOR_VERSION: u16 = 69;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed class file: {0}")]
    Binary(#[from] binrw::Error),
    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolError),
    #[error("malformed {attribute} attribute: {source}")]
    Attribute {
        attribute: &'static str,
        #[source]
        source: binrw::Error,
    },
    #[error("invalid descriptor {descriptor:?} for {member}")]
    BadDescriptor { member: String, descriptor: String },
    #[error("method {0} has no Code attribute")]
    MissingCode(String),
}

impl From<AnnotationError> for ParseError {
    fn from(e: AnnotationError) -> Self {
        match e {
            AnnotationError::Binary(source) => ParseError::Attribute {
                attribute: "annotations",
                source,
            },
            AnnotationError::ConstantPool(e) => ParseError::ConstantPool(e),
        }
    }
}

/// Value of a `ConstantValue` attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug)]
pub struct ClassData {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access: ClassAccessFlags,
    pool: ConstantPool,
    fields: Vec<FieldData>,
    methods: Vec<MethodData>,
    annotations: Vec<Annotation>,
    source_file: Option<String>,
    major_version: u16,
}

#[derive(Debug)]
pub struct FieldData {
    owner: String,
    name: String,
    descriptor: String,
    access: FieldAccessFlags,
    constant_value: Option<ConstantValue>,
    annotations: Vec<Annotation>,
    field_type: OnceCell<JvmType>,
}

#[derive(Debug)]
pub struct MethodData {
    owner: String,
    name: String,
    descriptor: String,
    access: MethodAccessFlags,
    code: Option<CodeAttribute>,
    exceptions: Vec<String>,
    annotations: Vec<Annotation>,
    signature: OnceCell<MethodSignature>,
}

impl ClassData {
    /// Parses a complete class file.
    pub fn parse(bytes: &[u8]) -> Result<ClassData, ParseError> {
        let mut cursor = Cursor::new(bytes);
        let raw = ClassFile::read(&mut cursor)?;
        if (cursor.position() as usize) < bytes.len() {
            tracing::warn!(
                "{} trailing bytes after class file",
                bytes.len() - cursor.position() as usize
            );
        }
        ClassData::from_class_file(raw)
    }

    pub fn from_class_file(raw: ClassFile) -> Result<ClassData, ParseError> {
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&raw.major_version) {
            return Err(ParseError::UnsupportedVersion {
                major: raw.major_version,
                minor: raw.minor_version,
            });
        }
        let pool = raw.const_pool;
        let name = pool.class_name(raw.this_class)?.to_string();
        let super_name = match raw.super_class {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };
        let interfaces = raw
            .interfaces
            .iter()
            .map(|&i| pool.class_name(i).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let fields = raw
            .fields
            .iter()
            .map(|f| FieldData::resolve(&name, f, &pool))
            .collect::<Result<Vec<_>, _>>()?;
        let methods = raw
            .methods
            .iter()
            .map(|m| MethodData::resolve(&name, m, &pool))
            .collect::<Result<Vec<_>, _>>()?;
        let annotations = read_annotations(&raw.attributes, &pool)?;
        let source_file = match find_attribute(&raw.attributes, &pool, "SourceFile") {
            Some(attr) => {
                let sf: SourceFileAttribute = decode(attr, "SourceFile")?;
                Some(pool.utf8(sf.sourcefile_index)?.to_string())
            }
            None => None,
        };

        Ok(ClassData {
            name,
            super_name,
            interfaces,
            access: raw.access_flags,
            pool,
            fields,
            methods,
            annotations,
            source_file,
            major_version: raw.major_version,
        })
    }

    /// Internal name, e.g. `java/lang/String`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` only for `java/lang/Object`.
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn access(&self) -> ClassAccessFlags {
        self.access
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_final(&self) -> bool {
        self.access.contains(ClassAccessFlags::FINAL)
    }

    pub fn is_public(&self) -> bool {
        self.access.contains(ClassAccessFlags::PUBLIC)
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn fields(&self) -> &[FieldData] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodData] {
        &self.methods
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name() == type_name)
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    /// Method declared directly in this class.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<(usize, &MethodData)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name && m.descriptor == descriptor)
    }

    /// Field declared directly in this class.
    pub fn field(&self, name: &str, descriptor: &str) -> Option<(usize, &FieldData)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name && f.descriptor == descriptor)
    }
}

impl FieldData {
    fn resolve(owner: &str, info: &FieldInfo, pool: &ConstantPool) -> Result<FieldData, ParseError> {
        let name = pool.utf8(info.name_index)?.to_string();
        let descriptor = pool.utf8(info.descriptor_index)?.to_string();
        let constant_value = match find_attribute(&info.attributes, pool, "ConstantValue") {
            Some(attr) => {
                let cv: ConstantValueAttribute = decode(attr, "ConstantValue")?;
                Some(match pool.get(cv.constant_value_index)? {
                    ConstantEntry::Integer(v) => ConstantValue::Int(*v),
                    ConstantEntry::Long(v) => ConstantValue::Long(*v),
                    ConstantEntry::Float(v) => ConstantValue::Float(*v),
                    ConstantEntry::Double(v) => ConstantValue::Double(*v),
                    ConstantEntry::String { string_index } => {
                        ConstantValue::String(pool.utf8(*string_index)?.to_string())
                    }
                    _ => {
                        return Err(ConstantPoolError::WrongKind {
                            index: cv.constant_value_index,
                            expected: "constant value",
                            found: "other constant",
                        }
                        .into())
                    }
                })
            }
            None => None,
        };
        Ok(FieldData {
            owner: owner.to_string(),
            annotations: read_annotations(&info.attributes, pool)?,
            name,
            descriptor,
            access: info.access_flags,
            constant_value,
            field_type: OnceCell::new(),
        })
    }

    /// Name of the class declaring this field.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn access(&self) -> FieldAccessFlags {
        self.access
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(FieldAccessFlags::STATIC)
    }

    pub fn constant_value(&self) -> Option<&ConstantValue> {
        self.constant_value.as_ref()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Parsed type, computed on first use.
    pub fn field_type(&self) -> Result<&JvmType, ParseError> {
        self.field_type.get_or_try_init(|| {
            parse_field_descriptor(&self.descriptor).ok_or_else(|| ParseError::BadDescriptor {
                member: format!("{}.{}", self.owner, self.name),
                descriptor: self.descriptor.clone(),
            })
        })
    }
}

impl MethodData {
    fn resolve(owner: &str, info: &MethodInfo, pool: &ConstantPool) -> Result<MethodData, ParseError> {
        let name = pool.utf8(info.name_index)?.to_string();
        let descriptor = pool.utf8(info.descriptor_index)?.to_string();
        let code = match find_attribute(&info.attributes, pool, "Code") {
            Some(attr) => Some(decode::<CodeAttribute>(attr, "Code")?),
            None => None,
        };
        let concrete = !info
            .access_flags
            .intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE);
        if concrete && code.is_none() {
            return Err(ParseError::MissingCode(format!("{owner}.{name}{descriptor}")));
        }
        let exceptions = match find_attribute(&info.attributes, pool, "Exceptions") {
            Some(attr) => {
                let ex: ExceptionsAttribute = decode(attr, "Exceptions")?;
                ex.exception_table
                    .iter()
                    .map(|&i| pool.class_name(i).map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => Vec::new(),
        };
        Ok(MethodData {
            owner: owner.to_string(),
            annotations: read_annotations(&info.attributes, pool)?,
            name,
            descriptor,
            access: info.access_flags,
            code,
            exceptions,
            signature: OnceCell::new(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn access(&self) -> MethodAccessFlags {
        self.access
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_final(&self) -> bool {
        self.access.contains(MethodAccessFlags::FINAL)
    }

    pub fn is_private(&self) -> bool {
        self.access.contains(MethodAccessFlags::PRIVATE)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_native(&self) -> bool {
        self.access.contains(MethodAccessFlags::NATIVE)
    }

    pub fn code(&self) -> Option<&CodeAttribute> {
        self.code.as_ref()
    }

    /// Raw bytecode; empty for abstract and native methods.
    pub fn bytecode(&self) -> &[u8] {
        self.code.as_ref().map(|c| c.code.as_slice()).unwrap_or(&[])
    }

    pub fn exception_table(&self) -> &[ExceptionEntry] {
        self.code
            .as_ref()
            .map(|c| c.exception_table.as_slice())
            .unwrap_or(&[])
    }

    /// Checked exceptions from the `Exceptions` attribute.
    pub fn declared_exceptions(&self) -> &[String] {
        &self.exceptions
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn annotation(&self, type_name: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.type_name() == type_name)
    }

    /// Parsed descriptor, computed on first use.
    pub fn signature(&self) -> Result<&MethodSignature, ParseError> {
        self.signature.get_or_try_init(|| {
            parse_method_descriptor(&self.descriptor).ok_or_else(|| ParseError::BadDescriptor {
                member: format!("{}.{}", self.owner, self.name),
                descriptor: self.descriptor.clone(),
            })
        })
    }
}

fn decode<T>(attr: &AttributeInfo, attribute: &'static str) -> Result<T, ParseError>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    decode_attribute(attr).map_err(|source| ParseError::Attribute { attribute, source })
}
