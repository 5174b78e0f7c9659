use crate::attribute_info::AttributeInfo;
use crate::constant_info::{constant_pool, ConstantPool};
use crate::field_info::FieldInfo;
use crate::method_info::MethodInfo;

use binrw::binread;

/// Raw class file layout as it sits on disk. Names are still constant pool
/// indices; [`crate::ClassData`] is the resolved model built on top of it.
#[binread]
#[derive(Clone, Debug)]
#[br(big, magic = b"\xca\xfe\xba\xbe")]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    #[br(temp)]
    const_pool_size: u16,
    #[br(parse_with = constant_pool, args(const_pool_size))]
    pub const_pool: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    #[br(temp)]
    interfaces_count: u16,
    #[br(count = interfaces_count as usize)]
    pub interfaces: Vec<u16>,
    #[br(temp)]
    fields_count: u16,
    #[br(count = fields_count as usize)]
    pub fields: Vec<FieldInfo>,
    #[br(temp)]
    methods_count: u16,
    #[br(count = methods_count as usize)]
    pub methods: Vec<MethodInfo>,
    #[br(temp)]
    attributes_count: u16,
    #[br(count = attributes_count as usize)]
    pub attributes: Vec<AttributeInfo>,
}

#[binread]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct ClassAccessFlags(u16);

bitflags::bitflags! {
    impl ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}
