//! context.rs — the VM's mutable state and the call machinery shared
//! by the dispatch loop: the value stack, call frames, globals table,
//! open-upvalue chain and the interner scripts intern runtime strings
//! through. A handle (`VmContext`), not a process-wide singleton — see
//! spec §9's "global mutable VM state" design note: tests spin up as
//! many of these as they like.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{
    BoundMethod, Class, Closure, Instance, Interner, MtString, Native, NativeClass, NativeFn,
    Upvalue, UpvalueState, Value,
};

use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::frame::CallFrame;

pub struct VmContext {
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) globals: HashMap<String, Value>,
    pub(crate) interner: Interner,
    /// Upvalues still pointing at a live stack slot, ordered by
    /// descending slot index (innermost first) exactly like the
    /// original's singly linked `vm.openUpvalues` list — new entries
    /// are inserted in the position that keeps it sorted.
    pub(crate) open_upvalues: Vec<Rc<Upvalue>>,
    pub(crate) init_string: Rc<MtString>,
    pub(crate) config: VmConfig,
}

impl VmContext {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let mut interner = Interner::new();
        let init_string = interner.intern("init");
        Self {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(config.frames_max.min(64)),
            globals: HashMap::new(),
            interner,
            open_upvalues: Vec::new(),
            init_string,
            config,
        }
    }

    /// Interns `s` through this VM's runtime interner. Exposed for
    /// `mt-natives`, which calls this once per `NativeClass` to intern
    /// its namespace name (`math`, `strings`, ...) at registration
    /// time; the natives themselves build fresh, uninterned strings at
    /// call time (concatenation, substring, `ToString`, ...), which is
    /// sound because string equality is by content, not identity.
    pub fn intern(&mut self, s: &str) -> Rc<MtString> {
        self.interner.intern(s)
    }

    /// Binds `name` as a global. Used both by `OP_DEFINE_GLOBAL` and by
    /// host setup code registering natives before a script runs.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn define_native(&mut self, name: &str, function: NativeFn) {
        let interned = self.intern(name);
        let native = Value::Native(Rc::new(Native { name: interned, function }));
        self.define_global(name, native);
    }

    pub fn define_native_class(&mut self, class: NativeClass) {
        let name = class.name.chars.clone();
        self.define_global(&name, Value::NativeClass(Rc::new(class)));
    }

    pub fn config(&self) -> VmConfig {
        self.config
    }

    // ---- stack primitives -------------------------------------------

    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.stack_max {
            return Err(self.runtime_error("stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: compiler emitted an unbalanced op")
    }

    pub(crate) fn peek(&self, distance: usize) -> &Value {
        let idx = self.stack.len() - 1 - distance;
        &self.stack[idx]
    }

    pub(crate) fn peek_mut(&mut self, distance: usize) -> &mut Value {
        let idx = self.stack.len() - 1 - distance;
        &mut self.stack[idx]
    }

    /// Builds a `RuntimeError` carrying a `[line N] in <fn>` trace for
    /// every live frame, innermost first, matching the original host's
    /// `runtimeError()` (spec §8 "uncaught runtime error").
    pub(crate) fn runtime_error(&self, message: impl Into<String>) -> RuntimeError {
        let mut trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let line = frame.current_line();
            let name = frame.display_name();
            if name == "script" {
                trace.push(format!("[line {line}] in script"));
            } else {
                trace.push(format!("[line {line}] in {name}()"));
            }
        }
        RuntimeError::with_trace(message, trace)
    }

    /// Drops every frame and clears the stack, matching the original's
    /// `resetStack()` call after an uncaught runtime error so the VM
    /// can host another `interpret()` call (or, in a REPL, the next
    /// line) from a clean slate.
    pub(crate) fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
    }

    // ---- calls --------------------------------------------------------

    pub(crate) fn call(&mut self, closure: Rc<Closure>, argc: u8) -> Result<(), RuntimeError> {
        if argc != closure.function.arity {
            return Err(self.runtime_error(format!(
                "Expected {} arguments but got {argc}.",
                closure.function.arity
            )));
        }
        if self.frames.len() >= self.config.frames_max {
            return Err(self.runtime_error("Stack overflow."));
        }
        let base = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    pub(crate) fn call_value(&mut self, argc: u8) -> Result<(), RuntimeError> {
        let callee = self.peek(argc as usize).clone();
        match callee {
            Value::Closure(closure) => self.call(closure, argc),
            Value::Native(native) => self.call_native(native.function.clone(), argc),
            Value::Class(class) => self.instantiate(class, argc),
            Value::BoundMethod(bound) => {
                *self.peek_mut(argc as usize) = bound.receiver.clone();
                self.call(bound.method.clone(), argc)
            }
            other => Err(self.runtime_error(format!(
                "Can only call functions and classes, got {}.",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn call_native(&mut self, f: NativeFn, argc: u8) -> Result<(), RuntimeError> {
        let start = self.stack.len() - argc as usize;
        let args: Vec<Value> = self.stack[start..].to_vec();
        let result = f(&args);
        self.stack.truncate(start - 1);
        match result {
            Ok(v) => self.push(v),
            Err(message) => Err(self.runtime_error(message)),
        }
    }

    fn instantiate(&mut self, class: Rc<RefCell<Class>>, argc: u8) -> Result<(), RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));
        *self.peek_mut(argc as usize) = Value::Instance(instance);
        let init = class.borrow().methods.get(self.init_string.chars.as_str()).cloned();
        match init {
            Some(initializer) => self.call(initializer, argc),
            None if argc != 0 => {
                Err(self.runtime_error(format!("Expected 0 arguments but got {argc}.")))
            }
            None => Ok(()),
        }
    }

    /// `obj.name(args)` without allocating an intermediate bound
    /// method, matching the original's `invoke()` fast path.
    pub(crate) fn invoke(&mut self, name: &str, argc: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(argc as usize).clone();
        match receiver {
            Value::Instance(instance) => {
                if let Some(field) = instance.borrow().fields.get(name).cloned() {
                    *self.peek_mut(argc as usize) = field;
                    return self.call_value(argc);
                }
                let class = instance.borrow().class.clone();
                self.invoke_from_class(&class, name, argc)
            }
            Value::NativeClass(native_class) => {
                let f = native_class.methods.get(name).cloned().ok_or_else(|| {
                    self.runtime_error(format!("Undefined property '{name}'."))
                })?;
                self.call_native(f, argc)
            }
            _ => Err(self.runtime_error("Only instances have methods.")),
        }
    }

    fn invoke_from_class(
        &mut self,
        class: &Rc<RefCell<Class>>,
        name: &str,
        argc: u8,
    ) -> Result<(), RuntimeError> {
        let method = class
            .borrow()
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| self.runtime_error(format!("Undefined property '{name}'.")))?;
        self.call(method, argc)
    }

    pub(crate) fn super_invoke(&mut self, name: &str, argc: u8) -> Result<(), RuntimeError> {
        let superclass = self.pop();
        let class = match superclass {
            Value::Class(c) => c,
            other => {
                return Err(self
                    .runtime_error(format!("Superclass must be a class, got {}.", other.type_name())))
            }
        };
        self.invoke_from_class(&class, name, argc)
    }

    pub(crate) fn bind_method(
        &mut self,
        class: &Rc<RefCell<Class>>,
        receiver: Value,
        name: &str,
    ) -> Result<Value, RuntimeError> {
        let method = class
            .borrow()
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| self.runtime_error(format!("Undefined property '{name}'.")))?;
        Ok(Value::BoundMethod(Rc::new(BoundMethod { receiver, method })))
    }

    // ---- upvalues -------------------------------------------------------

    /// Finds (or creates) the open upvalue for stack slot `index`,
    /// matching the original's `captureUpvalue`: the open list stays
    /// sorted by descending slot index so distinct closures over the
    /// same local share one upvalue.
    pub(crate) fn capture_upvalue(&mut self, index: usize) -> Rc<Upvalue> {
        let pos = self.open_upvalues.iter().position(|uv| match uv.stack_index() {
            Some(i) => i <= index,
            None => true,
        });
        if let Some(pos) = pos {
            if self.open_upvalues[pos].stack_index() == Some(index) {
                return self.open_upvalues[pos].clone();
            }
            let created = Upvalue::new_open(index);
            self.open_upvalues.insert(pos, created.clone());
            created
        } else {
            let created = Upvalue::new_open(index);
            self.open_upvalues.push(created.clone());
            created
        }
    }

    /// Closes every open upvalue at or above stack slot `from`,
    /// snapshotting the live stack value into the upvalue itself. Runs
    /// when a block scope that owns captured locals ends, and once per
    /// returning frame over its own slots.
    pub(crate) fn close_upvalues(&mut self, from: usize) {
        let value_at = |stack: &[Value], i: usize| stack[i].clone();
        self.open_upvalues.retain(|uv| {
            let Some(index) = uv.stack_index() else { return true };
            if index >= from {
                let value = value_at(&self.stack, index);
                *uv.state.borrow_mut() = UpvalueState::Closed(value);
                false
            } else {
                true
            }
        });
    }
}

impl Default for VmContext {
    fn default() -> Self {
        Self::new()
    }
}
