//! Bytecode of one method to the body of a JavaScript function.
//!
//! Straight-line code becomes a plain statement list. Code with jumps or
//! exception handlers runs in a `for (;;) switch (gt)` loop, one `case`
//! per jump target, with a `try` around the switch when handlers exist.

use std::collections::{BTreeMap, BTreeSet};

use crate::attribute_info::Annotation;
use crate::cache::CacheError;
use crate::class_data::{ClassData, MethodData};
use crate::code_attribute::{
    decode_code, ArithOp, ArrayKind, Conversion, InvokeKind, Instruction, Kind, LogicOp, Push, ShiftOp,
};
use crate::codegen::emit::{call, js_string, property, JsWriter};
use crate::codegen::numeric::{self, Converted};
use crate::codegen::stack::{slot_name, Literal, StackMapper, Value};
use crate::codegen::{switch, ClassGenerator, GenerationError, Linker};
use crate::config::markers;
use crate::constant_info::{ConstantPoolError, Loadable, MemberRef};
use crate::descriptor::{
    instance_of_flag, mangle_field_name, mangle_method_name, parse_field_descriptor, parse_method_descriptor,
};
use crate::dispatch::Dispatch;

/// Writes `c.name__desc = function(...) { ... };` for `method`.
pub(super) fn translate(
    gen: &ClassGenerator<'_, '_, '_>,
    linker: &mut dyn Linker,
    class: &ClassData,
    method: &MethodData,
    out: &mut JsWriter,
) -> Result<(), GenerationError> {
    let target = property("c", &mangle_method_name(method.name(), method.descriptor()));
    let mut translator = MethodTranslator {
        gen,
        linker,
        class,
        method,
        stack: StackMapper::new(),
        locals: BTreeSet::new(),
        params: BTreeSet::new(),
        temps: 0,
        label_stacks: BTreeMap::new(),
        looped: false,
        handlers: false,
        pc: None,
    };
    if let Some(anno) = method.annotation(markers::JAVASCRIPT_BODY) {
        return translator.script_body(&target, anno, out);
    }
    if method.is_native() {
        out.open(format!("{target} = function() {{"));
        let text = format!("native method {}.{}{} is not available", class.name(), method.name(), method.descriptor());
        out.line(format!("throw new Error({});", js_string(&text)));
        out.close("};");
        return Ok(());
    }
    translator.bytecode_body(&target, out)
}

struct MethodTranslator<'g, 'a, 'c, 'r> {
    gen: &'g ClassGenerator<'a, 'c, 'r>,
    linker: &'g mut dyn Linker,
    class: &'g ClassData,
    method: &'g MethodData,
    stack: StackMapper,
    locals: BTreeSet<String>,
    params: BTreeSet<String>,
    temps: usize,
    /// Stack layout at each jump target, recorded by the first jump seen.
    label_stacks: BTreeMap<u32, Vec<Kind>>,
    looped: bool,
    handlers: bool,
    pc: Option<u32>,
}

impl<'g, 'a, 'c, 'r> MethodTranslator<'g, 'a, 'c, 'r> {
    fn at(&self) -> String {
        let m = self.method;
        match self.pc {
            Some(pc) => format!("{}.{}{} at pc {pc}", self.class.name(), m.name(), m.descriptor()),
            None => format!("{}.{}{}", self.class.name(), m.name(), m.descriptor()),
        }
    }

    fn invalid(&self, message: impl Into<String>) -> GenerationError {
        GenerationError::Invalid {
            at: self.at(),
            message: message.into(),
        }
    }

    fn pool_error(&self, source: ConstantPoolError) -> GenerationError {
        GenerationError::ConstantPool { at: self.at(), source }
    }

    fn script_body(
        &mut self,
        target: &str,
        anno: &Annotation,
        out: &mut JsWriter,
    ) -> Result<(), GenerationError> {
        let args = anno
            .element("args")
            .map(|v| v.as_strings().ok_or_else(|| self.invalid("JavaScriptBody args must be strings")))
            .transpose()?
            .unwrap_or_default();
        let body = anno
            .element("body")
            .and_then(|v| v.as_str())
            .ok_or_else(|| self.invalid("JavaScriptBody has no body"))?;
        let signature = self
            .method
            .signature()
            .map_err(|source| GenerationError::Descriptor { at: self.at(), source })?;
        if args.len() != signature.params.len() {
            return Err(self.invalid(format!(
                "JavaScriptBody names {} parameters, the method takes {}",
                args.len(),
                signature.params.len()
            )));
        }
        out.open(format!("{target} = function({}) {{", args.join(", ")));
        for line in body.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            out.line(line);
        }
        out.close("};");
        Ok(())
    }

    fn bytecode_body(&mut self, target: &str, out: &mut JsWriter) -> Result<(), GenerationError> {
        let signature = self
            .method
            .signature()
            .map_err(|source| GenerationError::Descriptor { at: self.at(), source })?;

        let mut header = JsWriter::with_indent(out.indent() + 1);
        let mut args = Vec::new();
        let mut slot = 0u16;
        if !self.method.is_static() {
            let this = format!("lcA{slot}");
            header.line(format!("var {this} = this;"));
            self.params.insert(this);
            slot += 1;
        }
        for (i, param) in signature.params.iter().enumerate() {
            let Some(kind) = param.kind() else {
                return Err(self.invalid("void parameter"));
            };
            let arg = format!("arg{i}");
            let local = format!("lc{}{slot}", kind.letter());
            header.line(format!("var {local} = {arg};"));
            self.params.insert(local);
            args.push(arg);
            slot += param.slots();
        }

        let mut body = JsWriter::with_indent(out.indent() + 1);
        self.instructions(&mut body)?;

        let declared: BTreeSet<&str> = self
            .stack
            .used()
            .iter()
            .chain(&self.locals)
            .map(String::as_str)
            .filter(|n| !self.params.contains(*n))
            .collect();
        if !declared.is_empty() {
            let names: Vec<&str> = declared.into_iter().collect();
            header.line(format!("var {};", names.join(", ")));
        }

        out.open(format!("{target} = function({}) {{", args.join(", ")));
        out.raw(header.as_str());
        out.raw(body.as_str());
        out.close("};");
        Ok(())
    }

    fn instructions(&mut self, out: &mut JsWriter) -> Result<(), GenerationError> {
        let code = decode_code(self.method.bytecode())
            .map_err(|source| GenerationError::Decode { at: self.at(), source })?;
        let code_len = self.method.bytecode().len() as u32;
        let boundaries: BTreeSet<u32> = code.iter().map(|i| i.address).collect();
        let table = self.method.exception_table();

        let mut labels: BTreeSet<u32> = code.iter().flat_map(|i| i.instruction.branch_targets()).collect();
        if let Some(bad) = labels.iter().find(|pc| !boundaries.contains(pc)) {
            return Err(self.invalid(format!("branch target pc {bad} is not an instruction")));
        }
        for entry in table {
            let end = ((entry.end_pc as u32) < code_len).then_some(entry.end_pc as u32);
            let pcs = [Some(entry.start_pc as u32), Some(entry.handler_pc as u32), end];
            if let Some(bad) = pcs.into_iter().flatten().find(|pc| !boundaries.contains(pc)) {
                return Err(self.invalid(format!("exception table refers to pc {bad}, not an instruction")));
            }
            labels.extend(pcs.into_iter().flatten());
            self.label_stacks.insert(entry.handler_pc as u32, vec![Kind::Ref]);
        }
        self.looped = !labels.is_empty();
        self.handlers = !table.is_empty();

        if self.looped {
            labels.insert(0);
            out.line("var gt = 0;");
            out.open("for (;;) {");
            if self.handlers {
                out.open("try {");
            }
            out.open("switch (gt) {");
            out.enter();
        }

        let mut reachable = true;
        for insn in &code {
            let pc = insn.address;
            if self.looped && labels.contains(&pc) {
                if reachable {
                    self.stack.flush(out);
                    self.record(pc);
                } else {
                    let layout = self.label_stacks.get(&pc).cloned().unwrap_or_default();
                    self.stack.reset(&layout);
                }
                out.label(format!("case {pc}:"));
                if self.handlers {
                    out.line(format!("gt = {pc};"));
                }
            } else if !reachable {
                continue;
            }
            self.pc = Some(pc);
            self.instruction(&insn.instruction, out)?;
            reachable = !insn.instruction.ends_flow();
        }

        if self.looped {
            out.leave();
            out.close("}");
            if self.handlers {
                self.catch_block(out)?;
            }
            out.close("}");
        }
        Ok(())
    }

    fn catch_block(&mut self, out: &mut JsWriter) -> Result<(), GenerationError> {
        self.locals.insert(slot_name(Kind::Ref, 0));
        out.label("} catch (e) {");
        out.line("e = rt.throwable(e);");
        for entry in self.method.exception_table() {
            let range = format!("gt >= {} && gt < {}", entry.start_pc, entry.end_pc);
            let test = if entry.catch_type == 0 {
                range
            } else {
                let name = self.class_ref(entry.catch_type)?;
                self.linker.require_reference(name);
                if name == "java/lang/Throwable" {
                    // also matches values thrown by plain JavaScript
                    range
                } else {
                    format!("{range} && {}", property("e", &instance_of_flag(name)))
                }
            };
            out.line(format!("if ({test}) {{ stA0 = e; gt = {}; continue; }}", entry.handler_pc));
        }
        out.line("throw e;");
        out.close("}");
        Ok(())
    }

    fn record(&mut self, target: u32) {
        if !self.label_stacks.contains_key(&target) {
            let layout = self.stack.layout();
            self.label_stacks.insert(target, layout);
        }
    }

    fn local(&mut self, kind: Kind, index: u16) -> String {
        let name = format!("lc{}{index}", kind.letter());
        self.locals.insert(name.clone());
        name
    }

    fn temp(&mut self) -> String {
        let name = format!("tm{}", self.temps);
        self.temps += 1;
        self.locals.insert(name.clone());
        name
    }

    fn pop(&mut self) -> Result<Value, GenerationError> {
        self.stack
            .pop()
            .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })
    }

    fn pop_values<const N: usize>(&mut self) -> Result<[Value; N], GenerationError> {
        self.stack
            .pop_n(N)
            .and_then(|values| values.try_into().ok())
            .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })
    }

    fn assign(&mut self, out: &mut JsWriter, kind: Kind, expr: impl AsRef<str>) {
        let name = self.stack.push_slot(kind);
        out.line(format!("{name} = {};", expr.as_ref()));
    }

    fn is_wide(&self, below_top: usize) -> bool {
        self.stack.peek_kind(below_top).map(Kind::is_wide).unwrap_or(false)
    }

    /// Writes out pending constants and remembers the layout at `target`.
    fn before_jump(&mut self, out: &mut JsWriter, targets: &[u32]) {
        self.stack.flush(out);
        for &target in targets {
            self.record(target);
        }
    }

    fn branch(&mut self, out: &mut JsWriter, condition: String, target: u32) {
        self.before_jump(out, &[target]);
        out.line(format!("if ({condition}) {{ gt = {target}; continue; }}"));
    }

    fn instruction(&mut self, insn: &Instruction, out: &mut JsWriter) -> Result<(), GenerationError> {
        use Instruction as I;
        match insn {
            I::Nop => {}
            I::Push(p) => self.stack.push_const(match *p {
                Push::Null => Literal::Null,
                Push::Int(v) => Literal::Int(v),
                Push::Long(v) => Literal::Long(v),
                Push::Float(v) => Literal::Float(v),
                Push::Double(v) => Literal::Double(v),
            }),
            I::Ldc(index) => self.ldc(*index, out)?,
            I::Load(kind, index) => {
                let local = self.local(*kind, *index);
                self.assign(out, *kind, local);
            }
            I::Store(kind, index) => {
                let value = self.pop()?;
                let local = self.local(*kind, *index);
                out.line(format!("{local} = {};", value.expr));
            }
            I::Iinc { index, delta } => {
                let local = self.local(Kind::Int, *index);
                out.line(format!("{local} = ({local} + {delta}) | 0;"));
            }
            I::ArrayLoad(kind) => {
                let [array, index] = self.pop_values()?;
                self.assign(out, kind.kind(), format!("rt.at({}, {})", array.expr, index.expr));
            }
            I::ArrayStore(kind) => {
                let [array, index, value] = self.pop_values()?;
                let value = narrow(*kind, &value);
                out.line(format!("rt.put({}, {}, {value});", array.expr, index.expr));
            }
            I::Pop | I::MonitorEnter | I::MonitorExit => {
                self.pop()?;
            }
            I::Pop2 => {
                if self.is_wide(0) {
                    self.pop()?;
                } else {
                    self.pop_values::<2>()?;
                }
            }
            I::Dup => self.shuffle(out, 1, &[0, 0])?,
            I::DupX1 => self.shuffle(out, 2, &[1, 0, 1])?,
            I::DupX2 => {
                if self.is_wide(1) {
                    self.shuffle(out, 2, &[1, 0, 1])?
                } else {
                    self.shuffle(out, 3, &[2, 0, 1, 2])?
                }
            }
            I::Dup2 => {
                if self.is_wide(0) {
                    self.shuffle(out, 1, &[0, 0])?
                } else {
                    self.shuffle(out, 2, &[0, 1, 0, 1])?
                }
            }
            I::Dup2X1 => {
                if self.is_wide(0) {
                    self.shuffle(out, 2, &[1, 0, 1])?
                } else {
                    self.shuffle(out, 3, &[1, 2, 0, 1, 2])?
                }
            }
            I::Dup2X2 => match (self.is_wide(0), self.is_wide(1), self.is_wide(2)) {
                (true, true, _) => self.shuffle(out, 2, &[1, 0, 1])?,
                (true, false, _) => self.shuffle(out, 3, &[2, 0, 1, 2])?,
                (false, _, true) => self.shuffle(out, 3, &[1, 2, 0, 1, 2])?,
                _ => self.shuffle(out, 4, &[2, 3, 0, 1, 2, 3])?,
            },
            I::Swap => self.shuffle(out, 2, &[1, 0])?,
            I::Arith(op, kind) => {
                let [a, b] = self.pop_values()?;
                self.arith(out, *op, *kind, a, b)?;
            }
            I::Neg(kind) => {
                let a = self.pop()?;
                match kind {
                    Kind::Int => match a.int() {
                        Some(v) => self.stack.push_const(Literal::Int(v.wrapping_neg())),
                        None => self.assign(out, Kind::Int, format!("rt.neg32({})", a.expr)),
                    },
                    Kind::Long => match a.long() {
                        Some(v) => self.stack.push_const(Literal::Long(v.wrapping_neg())),
                        None => self.assign(out, Kind::Long, format!("rt.neg64({})", a.expr)),
                    },
                    Kind::Float | Kind::Double => self.assign(out, *kind, format!("-({})", a.expr)),
                    Kind::Ref => return Err(self.invalid("negation of a reference")),
                }
            }
            I::Shift(op, kind) => {
                let [a, b] = self.pop_values()?;
                self.shift(out, *op, *kind, a, b)?;
            }
            I::Logic(op, kind) => {
                let [a, b] = self.pop_values()?;
                self.logic(out, *op, *kind, a, b)?;
            }
            I::Convert(conv) => {
                let a = self.pop()?;
                self.convert(out, *conv, a);
            }
            I::Lcmp => {
                let [a, b] = self.pop_values()?;
                match (a.long(), b.long()) {
                    (Some(x), Some(y)) => self.stack.push_const(Literal::Int(numeric::compare64(x, y))),
                    _ => self.assign(out, Kind::Int, format!("rt.compare64({}, {})", a.expr, b.expr)),
                }
            }
            I::Cmp { nan_greater, .. } => {
                let [a, b] = self.pop_values()?;
                let nan = if *nan_greater { 1 } else { -1 };
                self.assign(out, Kind::Int, format!("rt.fcmp({}, {}, {nan})", a.expr, b.expr));
            }
            I::If { cond, target } => {
                let a = self.pop()?;
                self.branch(out, format!("{} {} 0", a.expr, cond.operator()), *target);
            }
            I::IfIcmp { cond, target } => {
                let [a, b] = self.pop_values()?;
                self.branch(out, format!("{} {} {}", a.expr, cond.operator(), b.expr), *target);
            }
            I::IfAcmp { equal, target } => {
                let [a, b] = self.pop_values()?;
                let op = if *equal { "===" } else { "!==" };
                self.branch(out, format!("{} {op} {}", a.expr, b.expr), *target);
            }
            I::IfNull { null, target } => {
                let a = self.pop()?;
                let op = if *null { "===" } else { "!==" };
                self.branch(out, format!("{} {op} null", a.expr), *target);
            }
            I::Goto(target) => {
                self.before_jump(out, &[*target]);
                out.line(format!("gt = {target}; continue;"));
            }
            I::Jsr(_) => {
                return Err(GenerationError::Unsupported { at: self.at(), name: "jsr" });
            }
            I::Ret(_) => {
                return Err(GenerationError::Unsupported { at: self.at(), name: "ret" });
            }
            I::TableSwitch { default, low, targets } => {
                let pairs: Vec<(i32, u32)> = targets
                    .iter()
                    .enumerate()
                    .map(|(i, t)| (low.wrapping_add(i as i32), *t))
                    .collect();
                self.switch(out, &pairs, *default)?;
            }
            I::LookupSwitch { default, pairs } => self.switch(out, pairs, *default)?,
            I::Return(None) => out.line("return;"),
            I::Return(Some(_)) => {
                let value = self.pop()?;
                out.line(format!("return {};", value.expr));
            }
            I::GetStatic(index) => {
                let (target, kind) = self.static_field(*index)?;
                self.assign(out, kind, target);
            }
            I::PutStatic(index) => {
                let (target, _) = self.static_field(*index)?;
                let value = self.pop()?;
                out.line(format!("{target} = {};", value.expr));
            }
            I::GetField(index) => {
                let object = self.pop()?;
                let (target, kind) = self.instance_field(*index, &object.expr)?;
                self.assign(out, kind, target);
            }
            I::PutField(index) => {
                let [object, value] = self.pop_values()?;
                let (target, _) = self.instance_field(*index, &object.expr)?;
                out.line(format!("{target} = {};", value.expr));
            }
            I::Invoke(kind, index) => self.invoke(out, *kind, *index)?,
            I::InvokeDynamic(_) => {
                return Err(GenerationError::Unsupported {
                    at: self.at(),
                    name: "invokedynamic",
                });
            }
            I::New(index) => {
                let class = self.class_ref(*index)?;
                self.linker.require_reference(class);
                let expr = format!("{}(true)", self.gen.vm_class(class));
                self.assign(out, Kind::Ref, expr);
            }
            I::NewArray(kind) => {
                let count = self.pop()?;
                self.assign(
                    out,
                    Kind::Ref,
                    format!("rt.newArray({}, {})", js_string(kind.array_descriptor()), count.expr),
                );
            }
            I::ANewArray(index) => {
                let element = self.class_ref(*index)?;
                let descriptor = if element.starts_with('[') {
                    format!("[{element}")
                } else {
                    format!("[L{element};")
                };
                let count = self.pop()?;
                self.assign(out, Kind::Ref, format!("rt.newArray({}, {})", js_string(&descriptor), count.expr));
            }
            I::MultiANewArray { index, dimensions } => {
                let descriptor = self.class_ref(*index)?;
                let counts = self
                    .stack
                    .pop_n(*dimensions as usize)
                    .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })?;
                let counts: Vec<String> = counts.into_iter().map(|v| v.expr).collect();
                let expr = format!("rt.multiArray({}, [{}])", js_string(descriptor), counts.join(", "));
                self.assign(out, Kind::Ref, expr);
            }
            I::ArrayLength => {
                let array = self.pop()?;
                self.assign(out, Kind::Int, format!("{}.length", array.expr));
            }
            I::Athrow => {
                let value = self.pop()?;
                out.line(format!("throw {};", value.expr));
            }
            I::CheckCast(index) => {
                let class = self.class_ref(*index)?;
                if class != "java/lang/Object" {
                    let value = self
                        .stack
                        .peek()
                        .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })?;
                    out.line(format!("rt.checkCast({}, {});", value.expr, type_test(class)));
                }
            }
            I::InstanceOf(index) => {
                let class = self.class_ref(*index)?;
                let value = self.pop()?;
                self.assign(out, Kind::Int, format!("rt.isInstance({}, {})", value.expr, type_test(class)));
            }
        }
        Ok(())
    }

    fn class_ref(&self, index: u16) -> Result<&'g str, GenerationError> {
        self.class.constant_pool().class_name(index).map_err(|e| self.pool_error(e))
    }

    fn member_ref(&self, index: u16) -> Result<MemberRef<'g>, GenerationError> {
        self.class.constant_pool().member_ref(index).map_err(|e| self.pool_error(e))
    }

    fn resolve_error(&self, source: CacheError) -> GenerationError {
        GenerationError::Resolve { at: self.at(), source }
    }

    fn field_kind(&self, descriptor: &str) -> Result<Kind, GenerationError> {
        parse_field_descriptor(descriptor)
            .and_then(|t| t.kind())
            .ok_or_else(|| self.invalid(format!("bad field descriptor {descriptor}")))
    }

    fn static_field(&mut self, index: u16) -> Result<(String, Kind), GenerationError> {
        let r = self.member_ref(index)?;
        let kind = self.field_kind(r.descriptor)?;
        let declaring = self
            .gen
            .declaring_field(r.class, r.name, r.descriptor)
            .map_err(|e| self.resolve_error(e))?;
        let owner = declaring.as_deref().unwrap_or(r.class);
        self.linker.require_reference(r.class);
        self.linker.require_reference(owner);
        let object = format!("{}(false)", self.gen.vm_class(owner));
        let target = self
            .gen
            .member(&object, declaring.as_deref(), &mangle_field_name(owner, r.name));
        Ok((target, kind))
    }

    fn instance_field(&mut self, index: u16, object: &str) -> Result<(String, Kind), GenerationError> {
        let r = self.member_ref(index)?;
        let kind = self.field_kind(r.descriptor)?;
        let declaring = self
            .gen
            .declaring_field(r.class, r.name, r.descriptor)
            .map_err(|e| self.resolve_error(e))?;
        let owner = declaring.as_deref().unwrap_or(r.class);
        let target = self
            .gen
            .member(object, declaring.as_deref(), &mangle_field_name(owner, r.name));
        Ok((target, kind))
    }

    fn invoke(&mut self, out: &mut JsWriter, kind: InvokeKind, index: u16) -> Result<(), GenerationError> {
        let r = self.member_ref(index)?;
        let signature = parse_method_descriptor(r.descriptor)
            .ok_or_else(|| self.invalid(format!("bad method descriptor {}", r.descriptor)))?;
        let mangled = mangle_method_name(r.name, r.descriptor);
        let args: Vec<String> = self
            .stack
            .pop_n(signature.params.len())
            .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })?
            .into_iter()
            .map(|v| v.expr)
            .collect();

        let expr = match kind {
            InvokeKind::Static => {
                self.linker.require_reference(r.class);
                let declaring = self
                    .gen
                    .declaring_method(r.class, r.name, r.descriptor)
                    .map_err(|e| self.resolve_error(e))?;
                let object = format!("{}(false)", self.gen.vm_class(r.class));
                call(&self.gen.member(&object, declaring.as_deref(), &mangled), &args)
            }
            InvokeKind::Special => {
                let receiver = self.pop()?;
                self.linker.require_reference(r.class);
                let declaring = self
                    .gen
                    .declaring_method(r.class, r.name, r.descriptor)
                    .map_err(|e| self.resolve_error(e))?;
                let object = format!("{}(false)", self.gen.vm_class(r.class));
                let callee = format!("{}.call", self.gen.member(&object, declaring.as_deref(), &mangled));
                let mut all = vec![receiver.expr];
                all.extend(args);
                call(&callee, &all)
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                let receiver = self.pop()?;
                let dispatch = self
                    .gen
                    .resolver()
                    .resolve(r.class, r.name, r.descriptor)
                    .map_err(|e| self.resolve_error(e))?;
                match dispatch {
                    Dispatch::Direct => {
                        let declaring = self
                            .gen
                            .declaring_method(r.class, r.name, r.descriptor)
                            .map_err(|e| self.resolve_error(e))?;
                        call(&self.gen.member(&receiver.expr, declaring.as_deref(), &mangled), &args)
                    }
                    Dispatch::Invoker => {
                        self.linker.require_invoker(&mangled);
                        let select = call(&property("invoker", &mangled), &[receiver.expr]);
                        call(&select, &args)
                    }
                }
            }
        };

        match signature.ret.kind() {
            Some(kind) => self.assign(out, kind, expr),
            None => out.line(format!("{expr};")),
        }
        Ok(())
    }

    fn ldc(&mut self, index: u16, out: &mut JsWriter) -> Result<(), GenerationError> {
        let constant = self
            .class
            .constant_pool()
            .loadable(index)
            .map_err(|e| self.pool_error(e))?;
        match constant {
            Loadable::Int(v) => self.stack.push_const(Literal::Int(v)),
            Loadable::Float(v) => self.stack.push_const(Literal::Float(v)),
            Loadable::Long(v) => self.stack.push_const(Literal::Long(v)),
            Loadable::Double(v) => self.stack.push_const(Literal::Double(v)),
            Loadable::String(s) => self.stack.push_const(Literal::Str(s.to_string())),
            Loadable::Class(name) if name.starts_with('[') => {
                self.assign(out, Kind::Ref, format!("rt.classFor(vm, {})", js_string(name)));
            }
            Loadable::Class(name) => {
                self.linker.require_reference(name);
                let expr = format!("{}(false).constructor.$class", self.gen.vm_class(name));
                self.assign(out, Kind::Ref, expr);
            }
        }
        Ok(())
    }

    /// Replaces the top `take` values with `pattern` (indices into those
    /// values, deepest first). Sources that a move would overwrite are
    /// copied to temporaries first.
    fn shuffle(&mut self, out: &mut JsWriter, take: usize, pattern: &[usize]) -> Result<(), GenerationError> {
        let base = self
            .stack
            .depth()
            .checked_sub(take)
            .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })?;
        let values = self
            .stack
            .pop_n(take)
            .ok_or_else(|| GenerationError::StackUnderflow { at: self.at() })?;

        let clobbered: BTreeSet<String> = pattern
            .iter()
            .enumerate()
            .filter(|(_, &src)| values[src].literal.is_none())
            .map(|(offset, &src)| (slot_name(values[src].kind, base + offset), &values[src].expr))
            .filter(|(dest, src)| dest != *src)
            .map(|(dest, _)| dest)
            .collect();

        let mut sources: BTreeMap<usize, String> = BTreeMap::new();
        for (i, value) in values.iter().enumerate() {
            if value.literal.is_none() && clobbered.contains(&value.expr) && pattern.contains(&i) {
                let temp = self.temp();
                out.line(format!("{temp} = {};", value.expr));
                sources.insert(i, temp);
            }
        }

        for &src in pattern {
            let value = &values[src];
            match &value.literal {
                Some(literal) => self.stack.push_const(literal.clone()),
                None => {
                    let source = sources.get(&src).cloned().unwrap_or_else(|| value.expr.clone());
                    let dest = self.stack.push_slot(value.kind);
                    if dest != source {
                        out.line(format!("{dest} = {source};"));
                    }
                }
            }
        }
        Ok(())
    }

    fn arith(&mut self, out: &mut JsWriter, op: ArithOp, kind: Kind, a: Value, b: Value) -> Result<(), GenerationError> {
        let name = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Rem => "mod",
        };
        let symbol = match op {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        };
        match kind {
            Kind::Int => {
                if let Some(v) = a.int().zip(b.int()).and_then(|(x, y)| numeric::arith32(op, x, y)) {
                    self.stack.push_const(Literal::Int(v));
                } else {
                    self.assign(out, kind, format!("rt.{name}32({}, {})", a.expr, b.expr));
                }
            }
            Kind::Long => {
                if let Some(v) = a.long().zip(b.long()).and_then(|(x, y)| numeric::arith64(op, x, y)) {
                    self.stack.push_const(Literal::Long(v));
                } else {
                    self.assign(out, kind, format!("rt.{name}64({}, {})", a.expr, b.expr));
                }
            }
            Kind::Float => self.assign(out, kind, format!("Math.fround({} {symbol} {})", a.expr, b.expr)),
            Kind::Double => self.assign(out, kind, format!("{} {symbol} {}", a.expr, b.expr)),
            Kind::Ref => return Err(self.invalid("arithmetic on a reference")),
        }
        Ok(())
    }

    fn shift(&mut self, out: &mut JsWriter, op: ShiftOp, kind: Kind, a: Value, b: Value) -> Result<(), GenerationError> {
        match kind {
            Kind::Int => match a.int().zip(b.int()) {
                Some((x, y)) => self.stack.push_const(Literal::Int(numeric::shift32(op, x, y))),
                None => {
                    let expr = match op {
                        ShiftOp::Shl => format!("{} << {}", a.expr, b.expr),
                        ShiftOp::Shr => format!("{} >> {}", a.expr, b.expr),
                        ShiftOp::Ushr => format!("({} >>> {}) | 0", a.expr, b.expr),
                    };
                    self.assign(out, kind, expr);
                }
            },
            Kind::Long => match a.long().zip(b.int()) {
                Some((x, y)) => self.stack.push_const(Literal::Long(numeric::shift64(op, x, y))),
                None => {
                    let name = match op {
                        ShiftOp::Shl => "shl64",
                        ShiftOp::Shr => "shr64",
                        ShiftOp::Ushr => "ushr64",
                    };
                    self.assign(out, kind, format!("rt.{name}({}, {})", a.expr, b.expr));
                }
            },
            _ => return Err(self.invalid("shift of a non-integral value")),
        }
        Ok(())
    }

    fn logic(&mut self, out: &mut JsWriter, op: LogicOp, kind: Kind, a: Value, b: Value) -> Result<(), GenerationError> {
        match kind {
            Kind::Int => match a.int().zip(b.int()) {
                Some((x, y)) => self.stack.push_const(Literal::Int(numeric::logic32(op, x, y))),
                None => {
                    let symbol = match op {
                        LogicOp::And => "&",
                        LogicOp::Or => "|",
                        LogicOp::Xor => "^",
                    };
                    self.assign(out, kind, format!("{} {symbol} {}", a.expr, b.expr));
                }
            },
            Kind::Long => match a.long().zip(b.long()) {
                Some((x, y)) => self.stack.push_const(Literal::Long(numeric::logic64(op, x, y))),
                None => {
                    let name = match op {
                        LogicOp::And => "and64",
                        LogicOp::Or => "or64",
                        LogicOp::Xor => "xor64",
                    };
                    self.assign(out, kind, format!("rt.{name}({}, {})", a.expr, b.expr));
                }
            },
            _ => return Err(self.invalid("bitwise operation on a non-integral value")),
        }
        Ok(())
    }

    fn convert(&mut self, out: &mut JsWriter, conv: Conversion, a: Value) {
        let folded = match conv.source() {
            Kind::Int => a.int().and_then(|v| numeric::convert_int(conv, v)),
            Kind::Long => a.long().and_then(|v| numeric::convert_long(conv, v)),
            _ => a.double().and_then(|v| numeric::convert_double(conv, v)),
        };
        if let Some(value) = folded {
            self.stack.push_const(match value {
                Converted::Int(v) => Literal::Int(v),
                Converted::Long(v) => Literal::Long(v),
                Converted::Float(v) => Literal::Float(v),
                Converted::Double(v) => Literal::Double(v),
            });
            return;
        }
        let v = &a.expr;
        let expr = match conv {
            Conversion::I2L => format!("rt.i2l({v})"),
            Conversion::I2F | Conversion::D2F => format!("Math.fround({v})"),
            Conversion::I2D | Conversion::F2D => v.clone(),
            Conversion::L2I => format!("rt.l2i({v})"),
            Conversion::L2F => format!("Math.fround(rt.l2d({v}))"),
            Conversion::L2D => format!("rt.l2d({v})"),
            Conversion::F2I | Conversion::D2I => format!("rt.d2i({v})"),
            Conversion::F2L | Conversion::D2L => format!("rt.d2l({v})"),
            Conversion::I2B => format!("rt.toInt8({v})"),
            Conversion::I2C => format!("rt.toChar({v})"),
            Conversion::I2S => format!("rt.toInt16({v})"),
        };
        self.assign(out, conv.target(), expr);
    }

    fn switch(&mut self, out: &mut JsWriter, pairs: &[(i32, u32)], default: u32) -> Result<(), GenerationError> {
        let key = self.pop()?;
        let mut targets: Vec<u32> = pairs.iter().map(|(_, t)| *t).collect();
        targets.push(default);
        self.before_jump(out, &targets);
        let lowering = switch::lower(pairs, default);
        switch::emit(out, &key.expr, &lowering, default);
        Ok(())
    }
}

/// Second argument list of `rt.checkCast` and `rt.isInstance`.
fn type_test(class: &str) -> String {
    if class.starts_with('[') {
        format!("{}, null", js_string(class))
    } else {
        format!("{}, {}", js_string(class), js_string(&instance_of_flag(class)))
    }
}

/// Truncation applied when storing into a narrow array.
fn narrow(kind: ArrayKind, value: &Value) -> String {
    let conv = match kind {
        ArrayKind::Byte | ArrayKind::Boolean => Conversion::I2B,
        ArrayKind::Char => Conversion::I2C,
        ArrayKind::Short => Conversion::I2S,
        _ => return value.expr.clone(),
    };
    if let Some(Converted::Int(v)) = value.int().and_then(|v| numeric::convert_int(conv, v)) {
        return v.to_string();
    }
    match conv {
        Conversion::I2B => format!("rt.toInt8({})", value.expr),
        Conversion::I2C => format!("rt.toChar({})", value.expr),
        _ => format!("rt.toInt16({})", value.expr),
    }
}
