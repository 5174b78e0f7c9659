//! Assembles class files byte by byte so tests need no `javac`.

#![allow(dead_code)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

pub mod op {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const ICONST_2: u8 = 0x05;
    pub const ICONST_5: u8 = 0x08;
    pub const LCONST_1: u8 = 0x0a;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const ILOAD_0: u8 = 0x1a;
    pub const ILOAD_1: u8 = 0x1b;
    pub const ALOAD_0: u8 = 0x2a;
    pub const ALOAD_1: u8 = 0x2b;
    pub const ISTORE_1: u8 = 0x3c;
    pub const ASTORE_1: u8 = 0x4c;
    pub const POP: u8 = 0x57;
    pub const DUP: u8 = 0x59;
    pub const IADD: u8 = 0x60;
    pub const LADD: u8 = 0x61;
    pub const IMUL: u8 = 0x68;
    pub const IINC: u8 = 0x84;
    pub const IFEQ: u8 = 0x99;
    pub const IF_ICMPGE: u8 = 0xa2;
    pub const GOTO: u8 = 0xa7;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const GETFIELD: u8 = 0xb4;
    pub const PUTFIELD: u8 = 0xb5;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ARRAYLENGTH: u8 = 0xbe;
    pub const ATHROW: u8 = 0xbf;
    pub const JSR: u8 = 0xa8;
}

/// Constant pool under construction; identical entries are shared.
#[derive(Default)]
pub struct Pool {
    bytes: Vec<u8>,
    next: u16,
    known: HashMap<Vec<u8>, u16>,
}

impl Pool {
    fn new() -> Self {
        Pool {
            next: 1,
            ..Default::default()
        }
    }

    fn add(&mut self, entry: Vec<u8>, wide: bool) -> u16 {
        if let Some(&index) = self.known.get(&entry) {
            return index;
        }
        let index = self.next;
        self.next += if wide { 2 } else { 1 };
        self.bytes.extend_from_slice(&entry);
        self.known.insert(entry, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
        entry.extend_from_slice(text.as_bytes());
        self.add(entry, false)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name.to_be_bytes());
        self.add(entry, false)
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let text = self.utf8(text);
        let mut entry = vec![8];
        entry.extend_from_slice(&text.to_be_bytes());
        self.add(entry, false)
    }

    pub fn int(&mut self, value: i32) -> u16 {
        let mut entry = vec![3];
        entry.extend_from_slice(&value.to_be_bytes());
        self.add(entry, false)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let mut entry = vec![5];
        entry.extend_from_slice(&value.to_be_bytes());
        self.add(entry, true)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut entry = vec![12];
        entry.extend_from_slice(&name.to_be_bytes());
        entry.extend_from_slice(&descriptor.to_be_bytes());
        self.add(entry, false)
    }

    fn member(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        let mut entry = vec![tag];
        entry.extend_from_slice(&class.to_be_bytes());
        entry.extend_from_slice(&nat.to_be_bytes());
        self.add(entry, false)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(9, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(10, class, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(11, class, name, descriptor)
    }
}

/// Element value of an annotation.
pub enum Element {
    Bool(bool),
    Int(i32),
    Str(String),
    Enum(String, String),
    Class(String),
    Array(Vec<Element>),
}

pub struct Annotation {
    pub descriptor: String,
    pub elements: Vec<(String, Element)>,
}

impl Annotation {
    /// `name` is an internal class name such as `jvm2js/core/Exported`.
    pub fn new(name: &str) -> Self {
        Annotation {
            descriptor: format!("L{name};"),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: Element) -> Self {
        self.elements.push((name.to_string(), value));
        self
    }
}

/// Bytecode of one method, written instruction by instruction.
#[derive(Default)]
pub struct Code {
    pub bytes: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
    handlers: Vec<(u16, u16, u16, u16)>,
}

impl Code {
    pub fn new(max_stack: u16, max_locals: u16) -> Self {
        Code {
            max_stack,
            max_locals,
            ..Default::default()
        }
    }

    pub fn pc(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn op(mut self, opcode: u8) -> Self {
        self.bytes.push(opcode);
        self
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn i16(self, value: i16) -> Self {
        self.u16(value as u16)
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Zero bytes up to the next multiple of four, as switch operands need.
    pub fn align(mut self) -> Self {
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        self
    }

    /// `catch_type` 0 catches everything.
    pub fn handler(mut self, start: u16, end: u16, handler: u16, catch_type: u16) -> Self {
        self.handlers.push((start, end, handler, catch_type));
        self
    }
}

struct Member {
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<Vec<u8>>,
}

/// A class file under construction.
pub struct ClassBuilder {
    pub pool: Pool,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    attributes: Vec<Vec<u8>>,
}

impl ClassBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut pool = Pool::new();
        let this_class = pool.class(name);
        let super_class = super_name.map(|s| pool.class(s)).unwrap_or(0);
        ClassBuilder {
            pool,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Subclass of `java/lang/Object`.
    pub fn object(name: &str) -> Self {
        Self::new(name, Some("java/lang/Object"))
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        let index = self.pool.class(interface);
        self.interfaces.push(index);
        self
    }

    fn attribute(pool: &mut Pool, name: &str, body: &[u8]) -> Vec<u8> {
        let mut out = pool.utf8(name).to_be_bytes().to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn element(pool: &mut Pool, value: &Element, out: &mut Vec<u8>) {
        match value {
            Element::Bool(b) => {
                out.push(b'Z');
                out.extend_from_slice(&pool.int(*b as i32).to_be_bytes());
            }
            Element::Int(v) => {
                out.push(b'I');
                out.extend_from_slice(&pool.int(*v).to_be_bytes());
            }
            Element::Str(s) => {
                out.push(b's');
                out.extend_from_slice(&pool.utf8(s).to_be_bytes());
            }
            Element::Enum(ty, constant) => {
                out.push(b'e');
                out.extend_from_slice(&pool.utf8(ty).to_be_bytes());
                out.extend_from_slice(&pool.utf8(constant).to_be_bytes());
            }
            Element::Class(desc) => {
                out.push(b'c');
                out.extend_from_slice(&pool.utf8(desc).to_be_bytes());
            }
            Element::Array(items) => {
                out.push(b'[');
                out.extend_from_slice(&(items.len() as u16).to_be_bytes());
                for item in items {
                    Self::element(pool, item, out);
                }
            }
        }
    }

    fn annotations(pool: &mut Pool, annotations: &[Annotation]) -> Vec<u8> {
        let mut body = (annotations.len() as u16).to_be_bytes().to_vec();
        for a in annotations {
            body.extend_from_slice(&pool.utf8(&a.descriptor).to_be_bytes());
            body.extend_from_slice(&(a.elements.len() as u16).to_be_bytes());
            for (name, value) in &a.elements {
                body.extend_from_slice(&pool.utf8(name).to_be_bytes());
                Self::element(pool, value, &mut body);
            }
        }
        Self::attribute(pool, "RuntimeVisibleAnnotations", &body)
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        let attr = Self::annotations(&mut self.pool, &[annotation]);
        self.attributes.push(attr);
        self
    }

    pub fn field(self, access: u16, name: &str, descriptor: &str) -> Self {
        self.field_with(access, name, descriptor, None, Vec::new())
    }

    /// `constant` is a constant pool index for a `ConstantValue` attribute.
    pub fn field_with(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        constant: Option<u16>,
        annotations: Vec<Annotation>,
    ) -> Self {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        let mut attributes = Vec::new();
        if let Some(index) = constant {
            attributes.push(Self::attribute(&mut self.pool, "ConstantValue", &index.to_be_bytes()));
        }
        if !annotations.is_empty() {
            attributes.push(Self::annotations(&mut self.pool, &annotations));
        }
        self.fields.push(Member {
            access,
            name,
            descriptor,
            attributes,
        });
        self
    }

    pub fn method(self, access: u16, name: &str, descriptor: &str, code: Option<Code>) -> Self {
        self.method_with(access, name, descriptor, code, Vec::new())
    }

    pub fn method_with(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        code: Option<Code>,
        annotations: Vec<Annotation>,
    ) -> Self {
        let name = self.pool.utf8(name);
        let descriptor = self.pool.utf8(descriptor);
        let mut attributes = Vec::new();
        if let Some(code) = code {
            let mut body = Vec::new();
            body.extend_from_slice(&code.max_stack.to_be_bytes());
            body.extend_from_slice(&code.max_locals.to_be_bytes());
            body.extend_from_slice(&(code.bytes.len() as u32).to_be_bytes());
            body.extend_from_slice(&code.bytes);
            body.extend_from_slice(&(code.handlers.len() as u16).to_be_bytes());
            for (start, end, handler, catch_type) in &code.handlers {
                for v in [start, end, handler, catch_type] {
                    body.extend_from_slice(&v.to_be_bytes());
                }
            }
            body.extend_from_slice(&0u16.to_be_bytes());
            attributes.push(Self::attribute(&mut self.pool, "Code", &body));
        }
        if !annotations.is_empty() {
            attributes.push(Self::annotations(&mut self.pool, &annotations));
        }
        self.methods.push(Member {
            access,
            name,
            descriptor,
            attributes,
        });
        self
    }

    /// Default constructor calling the superclass constructor.
    pub fn default_constructor(mut self, super_name: &str) -> Self {
        let init = self.pool.method_ref(super_name, "<init>", "()V");
        let code = Code::new(1, 1)
            .op(op::ALOAD_0)
            .op(op::INVOKESPECIAL)
            .u16(init)
            .op(op::RETURN);
        self.method(ACC_PUBLIC, "<init>", "()V", Some(code))
    }

    fn write_members(out: &mut Vec<u8>, members: &[Member]) {
        out.extend_from_slice(&(members.len() as u16).to_be_bytes());
        for m in members {
            out.extend_from_slice(&m.access.to_be_bytes());
            out.extend_from_slice(&m.name.to_be_bytes());
            out.extend_from_slice(&m.descriptor.to_be_bytes());
            out.extend_from_slice(&(m.attributes.len() as u16).to_be_bytes());
            for a in &m.attributes {
                out.extend_from_slice(a);
            }
        }
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = vec![0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52];
        out.extend_from_slice(&self.pool.next.to_be_bytes());
        out.extend_from_slice(&self.pool.bytes);
        out.extend_from_slice(&self.access.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend_from_slice(&i.to_be_bytes());
        }
        Self::write_members(&mut out, &self.fields);
        Self::write_members(&mut out, &self.methods);
        out.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for a in &self.attributes {
            out.extend_from_slice(a);
        }
        out
    }
}

/// Minimal `java/lang/Object` with a constructor and nothing else.
pub fn object_class() -> Vec<u8> {
    ClassBuilder::new("java/lang/Object", None)
        .method(ACC_PUBLIC, "<init>", "()V", Some(Code::new(0, 1).op(op::RETURN)))
        .build()
}

/// Minimal `java/lang/Class`.
pub fn class_class() -> Vec<u8> {
    ClassBuilder::object("java/lang/Class")
        .access(ACC_PUBLIC | ACC_FINAL | ACC_SUPER)
        .default_constructor("java/lang/Object")
        .build()
}
