//! The `errors` namespace — grounded in `module/errors.c`, whose only
//! method raises a VM runtime error carrying the given message.

use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{NativeClass, NativeFn, NativeResult, Value};

use crate::support::{expect_argc, expect_string};

fn raise(args: &[Value]) -> NativeResult {
    expect_argc("Raise", args, 1)?;
    let message = expect_string("Raise", &args[0])?;
    Err(message.chars.clone())
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("errors");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Raise".to_string(), Rc::new(raise));
    NativeClass { name, methods }
}
