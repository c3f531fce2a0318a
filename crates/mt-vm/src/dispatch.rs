//! dispatch.rs — the bytecode interpreter loop and the opcode bodies
//! too small to deserve their own module. Mirrors the structure (if
//! not the byte-threading) of the original host's `run()`: one big
//! `match` over the current instruction, mutating the value stack and
//! advancing (or jumping) the top frame's `ip`.

use std::cell::RefCell;
use std::rc::Rc;

use mt_core::{Class, Closure, IteratorObj, ListObj, MtString, Op, UpvalueDesc, Value};

use crate::context::VmContext;
use crate::error::RuntimeError;
use crate::frame::CallFrame;

/// What [`VmContext::interpret`] produced.
#[derive(Debug)]
pub enum InterpretResult {
    Ok,
    CompileError(mt_core::Diagnostics),
    RuntimeError(RuntimeError),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum NumOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl NumOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            NumOp::Add => a + b,
            NumOp::Sub => a - b,
            NumOp::Mul => a * b,
            NumOp::Div => a / b,
            NumOp::Pow => a.powf(b),
        }
    }
}

impl VmContext {
    /// Compiles `source` and runs it to completion, starting from a
    /// clean stack. Spec §5/§8's three-way `interpret()` result.
    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let function = match mt_core::compile(source) {
            Ok(f) => f,
            Err(diags) => return InterpretResult::CompileError(diags),
        };
        self.reset_stack();
        let closure = Rc::new(Closure { function, upvalues: Vec::new() });
        if let Err(e) = self.push(Value::Closure(closure.clone())) {
            return InterpretResult::RuntimeError(e);
        }
        if let Err(e) = self.call(closure, 0) {
            self.reset_stack();
            return InterpretResult::RuntimeError(e);
        }
        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(e) => {
                self.reset_stack();
                InterpretResult::RuntimeError(e)
            }
        }
    }

    fn read_string_const(&self, frame: &CallFrame, idx: u8) -> Rc<MtString> {
        match frame.closure.function.chunk.consts.get(idx) {
            Some(Value::String(s)) => s.clone(),
            other => unreachable!("constant {idx} is not a name string: {other:?}"),
        }
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let frame_idx = self.frames.len() - 1;
            let op = {
                let frame = &mut self.frames[frame_idx];
                let op = frame.closure.function.chunk.code[frame.ip].clone();
                frame.ip += 1;
                op
            };

            if self.config.trace_exec {
                tracing::trace!(op = %op, "exec");
            }

            match op {
                Op::Constant(idx) => {
                    let value = self.frames[frame_idx]
                        .closure
                        .function
                        .chunk
                        .consts
                        .get(idx)
                        .cloned()
                        .unwrap_or(Value::Nil);
                    self.push(value)?;
                }
                Op::Nil => self.push(Value::Nil)?,
                Op::True => self.push(Value::Bool(true))?,
                Op::False => self.push(Value::Bool(false))?,
                Op::Pop => {
                    self.pop();
                }
                Op::Copy => {
                    let top = self.peek(0).clone();
                    self.push(top)?;
                }

                Op::GetLocal(slot) => {
                    let base = self.frames[frame_idx].base;
                    let value = self.stack[base + slot as usize].clone();
                    self.push(value)?;
                }
                Op::SetLocal(slot) => {
                    let base = self.frames[frame_idx].base;
                    let value = self.peek(0).clone();
                    self.stack[base + slot as usize] = value;
                }
                Op::GetGlobal(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    let value = self.globals.get(name.chars.as_str()).cloned().ok_or_else(|| {
                        self.runtime_error(format!("Undefined variable '{}'.", name.chars))
                    })?;
                    self.push(value)?;
                }
                Op::DefineGlobal(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    let value = self.pop();
                    self.globals.insert(name.chars.clone(), value);
                }
                Op::SetGlobal(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    if !self.globals.contains_key(name.chars.as_str()) {
                        return Err(
                            self.runtime_error(format!("Undefined variable '{}'.", name.chars))
                        );
                    }
                    let value = self.peek(0).clone();
                    self.globals.insert(name.chars.clone(), value);
                }
                Op::GetUpvalue(slot) => {
                    let upvalue = self.frames[frame_idx].closure.upvalues[slot as usize].clone();
                    let value = self.read_upvalue(&upvalue);
                    self.push(value)?;
                }
                Op::SetUpvalue(slot) => {
                    let upvalue = self.frames[frame_idx].closure.upvalues[slot as usize].clone();
                    let value = self.peek(0).clone();
                    self.write_upvalue(&upvalue, value);
                }
                Op::GetProperty(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    self.get_property(&name.chars)?;
                }
                Op::SetProperty(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    self.set_property(&name.chars)?;
                }
                Op::GetSuper(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    let superclass = self.pop();
                    let this = self.pop();
                    let class = match superclass {
                        Value::Class(c) => c,
                        other => {
                            return Err(self.runtime_error(format!(
                                "Superclass must be a class, got {}.",
                                other.type_name()
                            )))
                        }
                    };
                    let bound = self.bind_method(&class, this, &name.chars)?;
                    self.push(bound)?;
                }

                Op::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                Op::Greater => self.compare(|a, b| a > b)?,
                Op::Less => self.compare(|a, b| a < b)?,
                Op::Add => self.numeric_op(NumOp::Add)?,
                Op::Subtract => self.numeric_op(NumOp::Sub)?,
                Op::Multiply => self.numeric_op(NumOp::Mul)?,
                Op::Divide => self.numeric_op(NumOp::Div)?,
                Op::Pow => self.numeric_op(NumOp::Pow)?,
                Op::Mod => self.modulo()?,
                Op::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(!v.is_truthy()))?;
                }
                Op::Negate => {
                    let v = self.pop();
                    match v {
                        Value::Number(n) => self.push(Value::Number(-n))?,
                        other => {
                            return Err(self
                                .runtime_error(format!("Operand must be a number, got {}.", other.type_name())))
                        }
                    }
                }
                Op::Incr => {
                    let v = self.pop();
                    match v {
                        Value::Number(n) => self.push(Value::Number(n + 1.0))?,
                        other => {
                            return Err(self
                                .runtime_error(format!("Operand must be a number, got {}.", other.type_name())))
                        }
                    }
                }

                Op::Print => {
                    let v = self.pop();
                    println!("{v}");
                }
                Op::Use => { /* resolved by the preprocessor before compilation */ }

                Op::Jump(offset) => {
                    self.frames[frame_idx].ip = (self.frames[frame_idx].ip as i32 + offset) as usize;
                }
                Op::JumpIfFalse(offset) => {
                    if !self.peek(0).is_truthy() {
                        self.frames[frame_idx].ip =
                            (self.frames[frame_idx].ip as i32 + offset) as usize;
                    }
                }
                Op::Loop(offset) => {
                    self.frames[frame_idx].ip = (self.frames[frame_idx].ip as i32 - offset) as usize;
                }

                Op::Call(argc) => {
                    self.call_value(argc)?;
                }
                Op::Invoke(idx, argc) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    self.invoke(&name.chars, argc)?;
                }
                Op::SuperInvoke(idx, argc) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    self.super_invoke(&name.chars, argc)?;
                }

                Op::Closure(idx, upvalue_descs) => {
                    let function = match self.frames[frame_idx].closure.function.chunk.consts.get(idx)
                    {
                        Some(Value::Function(f)) => f.clone(),
                        other => unreachable!("constant {idx} is not a function: {other:?}"),
                    };
                    let upvalues = self.bind_upvalues(frame_idx, &upvalue_descs);
                    let closure = Rc::new(Closure { function, upvalues });
                    self.push(Value::Closure(closure))?;
                }
                Op::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                Op::Return => {
                    let result = self.pop();
                    let base = self.frames[frame_idx].base;
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result)?;
                }

                Op::Class(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    self.push(Value::Class(Rc::new(RefCell::new(Class::new(name)))))?;
                }
                Op::Inherit => {
                    let superclass_val = self.peek(1).clone();
                    let subclass_val = self.peek(0).clone();
                    let superclass = match superclass_val {
                        Value::Class(c) => c,
                        other => {
                            return Err(self
                                .runtime_error(format!("Superclass must be a class, got {}.", other.type_name())))
                        }
                    };
                    if let Value::Class(subclass) = subclass_val {
                        let inherited = superclass.borrow().methods.clone();
                        subclass.borrow_mut().methods.extend(inherited);
                    }
                    self.pop();
                }
                Op::Method(idx) => {
                    let name = self.read_string_const(&self.frames[frame_idx], idx);
                    let method = self.pop();
                    let closure = match method {
                        Value::Closure(c) => c,
                        other => unreachable!("method body is not a closure: {other:?}"),
                    };
                    match self.peek(0) {
                        Value::Class(class) => {
                            class.borrow_mut().methods.insert(name.chars.clone(), closure);
                        }
                        other => unreachable!("OP_METHOD with no class beneath it: {other:?}"),
                    }
                }

                Op::BuildList(count) => self.build_list(count)?,
                Op::BuildTuple(count) => self.build_tuple(count)?,
                Op::GenerateList => self.generate_list()?,
                Op::IndexGet => self.index_get()?,
                Op::IndexSet => self.index_set()?,
                Op::MakeIterator => self.make_iterator()?,
                Op::ForIterator(offset) => self.for_iterator(frame_idx, offset)?,

                Op::Defer => {
                    return Err(self.runtime_error("defer is not yet executable"));
                }
            }
        }
    }

    fn read_upvalue(&self, upvalue: &Rc<mt_core::Upvalue>) -> Value {
        match &*upvalue.state.borrow() {
            mt_core::UpvalueState::Open(slot) => self.stack[*slot].clone(),
            mt_core::UpvalueState::Closed(v) => v.clone(),
        }
    }

    fn write_upvalue(&mut self, upvalue: &Rc<mt_core::Upvalue>, value: Value) {
        let slot = match &*upvalue.state.borrow() {
            mt_core::UpvalueState::Open(slot) => Some(*slot),
            mt_core::UpvalueState::Closed(_) => None,
        };
        match slot {
            Some(slot) => self.stack[slot] = value,
            None => *upvalue.state.borrow_mut() = mt_core::UpvalueState::Closed(value),
        }
    }

    fn bind_upvalues(
        &mut self,
        frame_idx: usize,
        descs: &[UpvalueDesc],
    ) -> Vec<Rc<mt_core::Upvalue>> {
        let base = self.frames[frame_idx].base;
        descs
            .iter()
            .map(|d| {
                if d.is_local {
                    self.capture_upvalue(base + d.index as usize)
                } else {
                    self.frames[frame_idx].closure.upvalues[d.index as usize].clone()
                }
            })
            .collect()
    }

    fn compare(&mut self, op: fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Bool(op(*x, *y))),
            _ => Err(self.runtime_error(format!(
                "Operands must be numbers, got {} and {}.",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn numeric_op(&mut self, op: NumOp) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(op.apply(x, y))),
            (Value::String(x), Value::String(y)) if op == NumOp::Add => {
                let joined = format!("{}{}", x.chars, y.chars);
                let interned = self.intern(&joined);
                self.push(Value::String(interned))
            }
            (Value::List(list), Value::Number(n)) => {
                Self::map_list_numeric(&list, |x| op.apply(x, n));
                self.push(Value::List(list))
            }
            (Value::Number(n), Value::List(list)) => {
                Self::map_list_numeric(&list, |x| op.apply(x, n));
                self.push(Value::List(list))
            }
            (a, b) => {
                let allow_strings = if op == NumOp::Add { " or two strings" } else { "" };
                Err(self.runtime_error(format!(
                    "Operands must be two numbers{allow_strings}, got {} and {}.",
                    a.type_name(),
                    b.type_name()
                )))
            }
        }
    }

    fn modulo(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let (xi, yi) = (x.trunc() as i64, y.trunc() as i64);
                if yi == 0 {
                    return Err(self.runtime_error("division by zero in modulo"));
                }
                self.push(Value::Number((xi % yi) as f64))
            }
            (a, b) => Err(self.runtime_error(format!(
                "Operands must be numbers, got {} and {}.",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    fn map_list_numeric(list: &Rc<RefCell<ListObj>>, f: impl Fn(f64) -> f64) {
        for item in list.borrow_mut().items.iter_mut() {
            if let Value::Number(x) = item {
                *item = Value::Number(f(*x));
            }
        }
    }

    fn get_property(&mut self, name: &str) -> Result<(), RuntimeError> {
        let receiver = self.pop();
        match receiver {
            Value::Instance(instance) => {
                if let Some(v) = instance.borrow().fields.get(name).cloned() {
                    return self.push(v);
                }
                let class = instance.borrow().class.clone();
                let bound = self.bind_method(&class, Value::Instance(instance), name)?;
                self.push(bound)
            }
            Value::NativeClass(native_class) => {
                let f = native_class
                    .methods
                    .get(name)
                    .cloned()
                    .ok_or_else(|| self.runtime_error(format!("Undefined property '{name}'.")))?;
                let interned = self.intern(name);
                self.push(Value::Native(Rc::new(mt_core::Native { name: interned, function: f })))
            }
            other => Err(self.runtime_error(format!(
                "Only instances have properties, got {}.",
                other.type_name()
            ))),
        }
    }

    fn set_property(&mut self, name: &str) -> Result<(), RuntimeError> {
        let value = self.pop();
        let receiver = self.pop();
        match receiver {
            Value::Instance(instance) => {
                instance.borrow_mut().fields.insert(name.to_string(), value.clone());
                self.push(value)
            }
            other => {
                Err(self.runtime_error(format!("Only instances have fields, got {}.", other.type_name())))
            }
        }
    }

    fn expect_index(&self, v: &Value) -> Result<usize, RuntimeError> {
        match v {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
            Value::Number(_) => Err(self.runtime_error("list index is not a non-negative integer")),
            other => Err(self.runtime_error(format!("index must be a number, got {}.", other.type_name()))),
        }
    }

    fn index_get(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop();
        let receiver = self.pop();
        let idx = self.expect_index(&index)?;
        match receiver {
            Value::List(list) => {
                let len = list.borrow().items.len();
                let value = list.borrow().items.get(idx).cloned().ok_or_else(|| {
                    self.runtime_error(format!("list index {idx} out of range (len {len})."))
                })?;
                self.push(value)
            }
            Value::Tuple(items) => {
                let len = items.len();
                let value = items
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| self.runtime_error(format!("tuple index {idx} out of range (len {len}).")))?;
                self.push(value)
            }
            Value::String(s) => {
                let count = s.chars.chars().count();
                let ch = s
                    .chars
                    .chars()
                    .nth(idx)
                    .ok_or_else(|| self.runtime_error(format!("string index {idx} out of range (len {count}).")))?;
                let interned = self.intern(&ch.to_string());
                self.push(Value::String(interned))
            }
            other => Err(self.runtime_error(format!("{} is not indexable.", other.type_name()))),
        }
    }

    fn index_set(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let index = self.pop();
        let receiver = self.pop();
        let idx = self.expect_index(&index)?;
        match receiver {
            Value::List(list) => {
                let len = list.borrow().items.len();
                if idx >= len {
                    return Err(self.runtime_error(format!("list index {idx} out of range (len {len}).")));
                }
                list.borrow_mut().items[idx] = value.clone();
                self.push(value)
            }
            other => Err(self.runtime_error(format!("cannot assign into a {}.", other.type_name()))),
        }
    }

    fn build_list(&mut self, count: u8) -> Result<(), RuntimeError> {
        let n = count as usize;
        let start = self.stack.len() - n;
        let items: Vec<Value> = self.stack[start..].to_vec();
        self.stack.truncate(start);
        self.push(Value::List(Rc::new(RefCell::new(ListObj { items }))))
    }

    fn build_tuple(&mut self, count: u8) -> Result<(), RuntimeError> {
        let n = count as usize;
        let start = self.stack.len() - n;
        let items: Vec<Value> = self.stack[start..].to_vec();
        self.stack.truncate(start);
        self.push(Value::Tuple(Rc::new(items)))
    }

    /// `start..end`: builds `List(end-1, end-2, ..., 0)` from the
    /// runtime-evaluated right operand (the compiler already discards
    /// `start` before this opcode runs — see
    /// `mt_core::compiler::Parser::range_list`). The countdown order
    /// matches the original's `OP_GENERATE_LIST`, which appends from
    /// `bound - 1` down to `0`; only the original's hardcoded
    /// `bound = 10` (a stub) is not replicated — the bound here is the
    /// actual evaluated operand.
    fn generate_list(&mut self) -> Result<(), RuntimeError> {
        let bound = self.pop();
        let n = match bound {
            Value::Number(n) if n >= 0.0 => n as usize,
            Value::Number(_) => return Err(self.runtime_error("range bound must not be negative")),
            other => {
                return Err(self
                    .runtime_error(format!("range bound must be a number, got {}.", other.type_name())))
            }
        };
        let items = (0..n).rev().map(|i| Value::Number(i as f64)).collect();
        self.push(Value::List(Rc::new(RefCell::new(ListObj { items }))))
    }

    fn make_iterator(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let list = match value {
            Value::List(list) => list,
            Value::Tuple(items) => Rc::new(RefCell::new(ListObj { items: (*items).clone() })),
            Value::String(s) => {
                let items = s.chars.chars().map(|c| Value::String(self.intern(&c.to_string()))).collect();
                Rc::new(RefCell::new(ListObj { items }))
            }
            other => {
                return Err(self.runtime_error(format!("{} is not iterable.", other.type_name())))
            }
        };
        self.push(Value::Iterator(Rc::new(RefCell::new(IteratorObj { list, cursor: 0 }))))
    }

    /// Peeks the iterator local without popping it (the loop body and
    /// the next pass both need it): pushes the next element and falls
    /// through on success, or jumps past the loop once exhausted.
    fn for_iterator(&mut self, frame_idx: usize, offset: i32) -> Result<(), RuntimeError> {
        let iter_val = self.peek(0).clone();
        let iterator = match iter_val {
            Value::Iterator(it) => it,
            other => unreachable!("for-loop local is not an iterator: {other:?}"),
        };
        if iterator.borrow().reached_end() {
            self.frames[frame_idx].ip = (self.frames[frame_idx].ip as i32 + offset) as usize;
            return Ok(());
        }
        let item = {
            let it = iterator.borrow();
            it.list.borrow().items[it.cursor].clone()
        };
        iterator.borrow_mut().advance();
        self.push(item)
    }
}
