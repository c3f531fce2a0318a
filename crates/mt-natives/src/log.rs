//! The `log` namespace — grounded in `module/log.c` (`Print` and
//! `Fatal`; the original's `logProgressNative` is defined but never
//! registered by `createLogModule`, so it has no counterpart here
//! either). Routed through `tracing` instead of hand-rolled ANSI
//! escapes and `printf`, so guest-script logging lands on the same
//! subscriber as the rest of the host's instrumentation.

use std::collections::HashMap;
use std::process;
use std::rc::Rc;

use mt_core::{NativeClass, NativeFn, NativeResult, Value};

use crate::support::expect_string;

fn print(args: &[Value]) -> NativeResult {
    if args.len() > 1 {
        return Err("'Print' expects at most 1 argument.".to_string());
    }
    match args.first() {
        Some(v) => tracing::info!(target: "mt::log", "{v}"),
        None => tracing::info!(target: "mt::log", ""),
    }
    Ok(Value::Nil)
}

fn fatal(args: &[Value]) -> NativeResult {
    if args.len() != 1 {
        return Err("'Fatal' expects exactly 1 argument.".to_string());
    }
    let message = expect_string("Fatal", &args[0])?;
    tracing::error!(target: "mt::log", "{}", message.chars);
    process::exit(74);
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("log");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Print".to_string(), Rc::new(print));
    methods.insert("Fatal".to_string(), Rc::new(fatal));
    NativeClass { name, methods }
}
