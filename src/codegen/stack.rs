//! Symbolic operand stack. Every stack position maps to a typed variable
//! (`stI0`, `stA1`, ...); constants stay symbolic until something forces
//! them into their variable.

use std::collections::BTreeSet;

use crate::code_attribute::Kind;
use crate::codegen::emit::{js_double, js_float, js_int, js_string, JsWriter};
use crate::codegen::numeric::split64;

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl Literal {
    pub fn kind(&self) -> Kind {
        match self {
            Literal::Null | Literal::Str(_) => Kind::Ref,
            Literal::Int(_) => Kind::Int,
            Literal::Long(_) => Kind::Long,
            Literal::Float(_) => Kind::Float,
            Literal::Double(_) => Kind::Double,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Literal::Null => "null".into(),
            Literal::Int(v) => js_int(*v),
            Literal::Long(v) => {
                let (hi, lo) = split64(*v);
                format!("rt.long({hi}, {lo})")
            }
            Literal::Float(v) => js_float(*v),
            Literal::Double(v) => js_double(*v),
            Literal::Str(s) => js_string(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Operand {
    /// The value lives in the variable of its stack position.
    Slot,
    Const(Literal),
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    kind: Kind,
    operand: Operand,
}

/// A popped value: an expression that stays valid until its stack position
/// is written again.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub kind: Kind,
    pub expr: String,
    pub literal: Option<Literal>,
}

impl Value {
    pub fn int(&self) -> Option<i32> {
        match self.literal {
            Some(Literal::Int(v)) => Some(v),
            _ => None,
        }
    }

    pub fn long(&self) -> Option<i64> {
        match self.literal {
            Some(Literal::Long(v)) => Some(v),
            _ => None,
        }
    }

    pub fn double(&self) -> Option<f64> {
        match self.literal {
            Some(Literal::Float(v)) => Some(v as f64),
            Some(Literal::Double(v)) => Some(v),
            _ => None,
        }
    }
}

pub fn slot_name(kind: Kind, depth: usize) -> String {
    format!("st{}{}", kind.letter(), depth)
}

#[derive(Debug, Default)]
pub struct StackMapper {
    entries: Vec<Entry>,
    used: BTreeSet<String>,
}

impl StackMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Pushes a value to be computed into its variable; returns the
    /// variable name to assign.
    pub fn push_slot(&mut self, kind: Kind) -> String {
        let name = slot_name(kind, self.entries.len());
        self.used.insert(name.clone());
        self.entries.push(Entry {
            kind,
            operand: Operand::Slot,
        });
        name
    }

    pub fn push_const(&mut self, literal: Literal) {
        self.entries.push(Entry {
            kind: literal.kind(),
            operand: Operand::Const(literal),
        });
    }

    pub fn pop(&mut self) -> Option<Value> {
        let depth = self.entries.len().checked_sub(1)?;
        let entry = self.entries.pop()?;
        Some(Self::value(entry, depth))
    }

    /// Pops `n` values, deepest first.
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<Value>> {
        if n > self.entries.len() {
            return None;
        }
        let mut values: Vec<Value> = (0..n).filter_map(|_| self.pop()).collect();
        values.reverse();
        Some(values)
    }

    /// Kind of the value `n` positions below the top.
    pub fn peek_kind(&self, n: usize) -> Option<Kind> {
        let len = self.entries.len();
        len.checked_sub(n + 1).map(|i| self.entries[i].kind)
    }

    /// Expression for the top value without popping it.
    pub fn peek(&self) -> Option<Value> {
        let depth = self.entries.len().checked_sub(1)?;
        Some(Self::value(self.entries[depth].clone(), depth))
    }

    fn value(entry: Entry, depth: usize) -> Value {
        match entry.operand {
            Operand::Slot => Value {
                kind: entry.kind,
                expr: slot_name(entry.kind, depth),
                literal: None,
            },
            Operand::Const(literal) => Value {
                kind: entry.kind,
                expr: literal.render(),
                literal: Some(literal),
            },
        }
    }

    /// Stores pending constants into their variables, so that every
    /// position holds its value in the variable named after it.
    pub fn flush(&mut self, out: &mut JsWriter) {
        for (depth, entry) in self.entries.iter_mut().enumerate() {
            if let Operand::Const(literal) = &entry.operand {
                let name = slot_name(entry.kind, depth);
                out.line(format!("{name} = {};", literal.render()));
                self.used.insert(name);
                entry.operand = Operand::Slot;
            }
        }
    }

    /// Kinds on the stack, bottom first.
    pub fn layout(&self) -> Vec<Kind> {
        self.entries.iter().map(|e| e.kind).collect()
    }

    /// Replaces the stack with variables of the given kinds, as found at a
    /// jump target.
    pub fn reset(&mut self, layout: &[Kind]) {
        self.entries.clear();
        for &kind in layout {
            self.push_slot(kind);
        }
    }

    /// Every variable assigned so far.
    pub fn used(&self) -> &BTreeSet<String> {
        &self.used
    }
}
