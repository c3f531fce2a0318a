//! The `math` namespace — grounded in `module/math.c`, whose original
//! registers exactly four methods (`Fac, Sin, Cos, Tan`). We keep all
//! four and round the module out with the ordinary unary/binary `f64`
//! helpers the original never got around to adding.

use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{NativeClass, NativeFn, Value};
use rand::Rng;

use crate::support::{arity_error, expect_argc, expect_number};

fn unary(name: &'static str, f: fn(f64) -> f64) -> NativeFn {
    Rc::new(move |args: &[Value]| {
        expect_argc(name, args, 1)?;
        Ok(Value::Number(f(expect_number(name, &args[0])?)))
    })
}

fn binary(name: &'static str, f: fn(f64, f64) -> f64) -> NativeFn {
    Rc::new(move |args: &[Value]| {
        expect_argc(name, args, 2)?;
        let a = expect_number(name, &args[0])?;
        let b = expect_number(name, &args[1])?;
        Ok(Value::Number(f(a, b)))
    })
}

/// Iterative factorial of a non-negative integer, matching the
/// original's `Fac` (recursive in C; this avoids deep Rust recursion
/// for no functional difference since `factorial` has no side effects).
fn factorial(args: &[Value]) -> mt_core::NativeResult {
    expect_argc("Fac", args, 1)?;
    let n = expect_number("Fac", &args[0])?;
    if n.fract() != 0.0 || n < 0.0 {
        return Err("argument to 'Fac' must be a non-negative integer.".to_string());
    }
    let mut acc = 1.0f64;
    let mut i = 1.0f64;
    while i <= n {
        acc *= i;
        i += 1.0;
    }
    Ok(Value::Number(acc))
}

fn random(args: &[Value]) -> mt_core::NativeResult {
    if !args.is_empty() {
        return Err(arity_error("Random", 0, args.len()));
    }
    Ok(Value::Number(rand::thread_rng().gen::<f64>()))
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("math");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Fac".to_string(), Rc::new(factorial));
    methods.insert("Sin".to_string(), unary("Sin", f64::sin));
    methods.insert("Cos".to_string(), unary("Cos", f64::cos));
    methods.insert("Tan".to_string(), unary("Tan", f64::tan));
    methods.insert("Sqrt".to_string(), unary("Sqrt", f64::sqrt));
    methods.insert("Abs".to_string(), unary("Abs", f64::abs));
    methods.insert("Floor".to_string(), unary("Floor", f64::floor));
    methods.insert("Ceil".to_string(), unary("Ceil", f64::ceil));
    methods.insert("Round".to_string(), unary("Round", f64::round));
    methods.insert("Pow".to_string(), binary("Pow", f64::powf));
    methods.insert("Min".to_string(), binary("Min", f64::min));
    methods.insert("Max".to_string(), binary("Max", f64::max));
    methods.insert("Random".to_string(), Rc::new(random));
    NativeClass { name, methods }
}
