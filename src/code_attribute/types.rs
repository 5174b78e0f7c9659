/// Computational kind of a value on the operand stack or in a local slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Int,
    Long,
    Float,
    Double,
    Ref,
}

impl Kind {
    /// Long and double take two local slots and count as category 2 on
    /// the operand stack.
    pub fn is_wide(self) -> bool {
        matches!(self, Kind::Long | Kind::Double)
    }

    /// Letter used in generated variable names.
    pub fn letter(self) -> char {
        match self {
            Kind::Int => 'I',
            Kind::Long => 'L',
            Kind::Float => 'F',
            Kind::Double => 'D',
            Kind::Ref => 'A',
        }
    }

    pub(crate) fn from_index(i: u8) -> Kind {
        match i {
            0 => Kind::Int,
            1 => Kind::Long,
            2 => Kind::Float,
            3 => Kind::Double,
            _ => Kind::Ref,
        }
    }
}

/// Element type of an array instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Ref,
    Byte,
    Boolean,
    Char,
    Short,
}

impl ArrayKind {
    pub fn kind(self) -> Kind {
        match self {
            ArrayKind::Long => Kind::Long,
            ArrayKind::Float => Kind::Float,
            ArrayKind::Double => Kind::Double,
            ArrayKind::Ref => Kind::Ref,
            _ => Kind::Int,
        }
    }

    /// Descriptor of a one dimensional array of this element type.
    pub fn array_descriptor(self) -> &'static str {
        match self {
            ArrayKind::Int => "[I",
            ArrayKind::Long => "[J",
            ArrayKind::Float => "[F",
            ArrayKind::Double => "[D",
            ArrayKind::Ref => "[Ljava/lang/Object;",
            ArrayKind::Byte => "[B",
            ArrayKind::Boolean => "[Z",
            ArrayKind::Char => "[C",
            ArrayKind::Short => "[S",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShiftOp {
    Shl,
    Shr,
    Ushr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
    Xor,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Cond {
    pub fn operator(self) -> &'static str {
        match self {
            Cond::Eq => "===",
            Cond::Ne => "!==",
            Cond::Lt => "<",
            Cond::Ge => ">=",
            Cond::Gt => ">",
            Cond::Le => "<=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conversion {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl Conversion {
    pub fn source(self) -> Kind {
        match self {
            Conversion::I2L | Conversion::I2F | Conversion::I2D => Kind::Int,
            Conversion::I2B | Conversion::I2C | Conversion::I2S => Kind::Int,
            Conversion::L2I | Conversion::L2F | Conversion::L2D => Kind::Long,
            Conversion::F2I | Conversion::F2L | Conversion::F2D => Kind::Float,
            Conversion::D2I | Conversion::D2L | Conversion::D2F => Kind::Double,
        }
    }

    pub fn target(self) -> Kind {
        match self {
            Conversion::I2L | Conversion::F2L | Conversion::D2L => Kind::Long,
            Conversion::I2F | Conversion::L2F | Conversion::D2F => Kind::Float,
            Conversion::I2D | Conversion::L2D | Conversion::F2D => Kind::Double,
            _ => Kind::Int,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// Constant pushed by the short constant instructions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Push {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// A decoded instruction. Opcode families sharing one behaviour are folded
/// into a single variant and every branch carries an absolute target pc.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    Push(Push),
    Ldc(u16),
    Load(Kind, u16),
    Store(Kind, u16),
    ArrayLoad(ArrayKind),
    ArrayStore(ArrayKind),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Arith(ArithOp, Kind),
    Neg(Kind),
    Shift(ShiftOp, Kind),
    Logic(LogicOp, Kind),
    Iinc { index: u16, delta: i16 },
    Convert(Conversion),
    Lcmp,
    /// `fcmpl`/`fcmpg` and `dcmpl`/`dcmpg`; `nan_greater` is the `g` form.
    Cmp { kind: Kind, nan_greater: bool },
    /// Compare an int against zero.
    If { cond: Cond, target: u32 },
    IfIcmp { cond: Cond, target: u32 },
    IfAcmp { equal: bool, target: u32 },
    IfNull { null: bool, target: u32 },
    Goto(u32),
    Jsr(u32),
    Ret(u16),
    TableSwitch { default: u32, low: i32, targets: Vec<u32> },
    LookupSwitch { default: u32, pairs: Vec<(i32, u32)> },
    Return(Option<Kind>),
    GetStatic(u16),
    PutStatic(u16),
    GetField(u16),
    PutField(u16),
    Invoke(InvokeKind, u16),
    InvokeDynamic(u16),
    New(u16),
    NewArray(ArrayKind),
    ANewArray(u16),
    ArrayLength,
    Athrow,
    CheckCast(u16),
    InstanceOf(u16),
    MonitorEnter,
    MonitorExit,
    MultiANewArray { index: u16, dimensions: u8 },
}

impl Instruction {
    /// Every pc this instruction may jump to, excluding fall-through.
    pub fn branch_targets(&self) -> Vec<u32> {
        match self {
            Instruction::If { target, .. }
            | Instruction::IfIcmp { target, .. }
            | Instruction::IfAcmp { target, .. }
            | Instruction::IfNull { target, .. }
            | Instruction::Goto(target)
            | Instruction::Jsr(target) => vec![*target],
            Instruction::TableSwitch { default, targets, .. } => {
                let mut all = targets.clone();
                all.push(*default);
                all
            }
            Instruction::LookupSwitch { default, pairs } => {
                let mut all: Vec<u32> = pairs.iter().map(|(_, t)| *t).collect();
                all.push(*default);
                all
            }
            _ => Vec::new(),
        }
    }

    /// True when control never falls through to the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            Instruction::Goto(_)
                | Instruction::Ret(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::Return(_)
                | Instruction::Athrow
        )
    }
}

/// An instruction together with its offset in the code array.
#[derive(Clone, Debug, PartialEq)]
pub struct AddressedInstruction {
    pub address: u32,
    pub instruction: Instruction,
}
