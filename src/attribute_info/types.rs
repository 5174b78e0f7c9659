use binrw::binread;

/// Generic attribute as stored in the class file. Known attributes are
/// decoded on demand from `info`.
#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct AttributeInfo {
    pub attribute_name_index: u16,
    #[br(temp)]
    attribute_length: u32,
    #[br(count = attribute_length as usize)]
    pub info: Vec<u8>,
}

#[binread]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[br(big)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// Zero catches everything.
    pub catch_type: u16,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    #[br(temp)]
    code_length: u32,
    #[br(count = code_length as usize)]
    pub code: Vec<u8>,
    #[br(temp)]
    exception_table_length: u16,
    #[br(count = exception_table_length as usize)]
    pub exception_table: Vec<ExceptionEntry>,
    #[br(temp)]
    attributes_count: u16,
    #[br(count = attributes_count as usize)]
    pub attributes: Vec<AttributeInfo>,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct ConstantValueAttribute {
    pub constant_value_index: u16,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct ExceptionsAttribute {
    #[br(temp)]
    exception_table_length: u16,
    #[br(count = exception_table_length as usize)]
    pub exception_table: Vec<u16>,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct SourceFileAttribute {
    pub sourcefile_index: u16,
}

// ---------------------------------------------------------------------------
// Annotations, raw form
// ---------------------------------------------------------------------------

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct RuntimeAnnotationsAttribute {
    #[br(temp)]
    num_annotations: u16,
    #[br(count = num_annotations as usize)]
    pub annotations: Vec<RuntimeAnnotation>,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct RuntimeAnnotation {
    pub type_index: u16,
    #[br(temp)]
    num_element_value_pairs: u16,
    #[br(count = num_element_value_pairs as usize)]
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub struct ElementValuePair {
    pub element_name_index: u16,
    pub value: RawElementValue,
}

#[binread]
#[derive(Clone, Debug, PartialEq)]
#[br(big)]
pub enum RawElementValue {
    #[br(magic = b'B')]
    Byte(u16),
    #[br(magic = b'C')]
    Char(u16),
    #[br(magic = b'I')]
    Int(u16),
    #[br(magic = b'S')]
    Short(u16),
    #[br(magic = b'Z')]
    Boolean(u16),
    #[br(magic = b'J')]
    Long(u16),
    #[br(magic = b'F')]
    Float(u16),
    #[br(magic = b'D')]
    Double(u16),
    #[br(magic = b's')]
    String(u16),
    #[br(magic = b'e')]
    EnumConst {
        type_name_index: u16,
        const_name_index: u16,
    },
    #[br(magic = b'c')]
    ClassInfo(u16),
    #[br(magic = b'@')]
    Annotation(RuntimeAnnotation),
    #[br(magic = b'[')]
    Array {
        #[br(temp)]
        num_values: u16,
        #[br(count = num_values as usize)]
        values: Vec<RawElementValue>,
    },
}

// ---------------------------------------------------------------------------
// Annotations, resolved form
// ---------------------------------------------------------------------------

/// An annotation with every constant pool index replaced by its value.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation type, e.g. `Ljvm2js/core/Exported;`.
    pub type_descriptor: String,
    /// Retained at run time (`RuntimeVisibleAnnotations`).
    pub visible: bool,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    /// Internal class name of the annotation type.
    pub fn type_name(&self) -> &str {
        self.type_descriptor
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .unwrap_or(&self.type_descriptor)
    }

    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementValue {
    /// `B`, `C`, `I`, `S` and `Z` values; `tag` keeps the original kind.
    Int { tag: char, value: i32 },
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Enum { type_descriptor: String, name: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// A string array, or a single string promoted to a one element array.
    pub fn as_strings(&self) -> Option<Vec<&str>> {
        match self {
            ElementValue::String(s) => Some(vec![s.as_str()]),
            ElementValue::Array(values) => values.iter().map(ElementValue::as_str).collect(),
            _ => None,
        }
    }
}
