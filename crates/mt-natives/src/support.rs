//! Shared argument-checking helpers used by every module in this
//! crate. The original host checks arity and argument kinds by hand in
//! each `*Native` function and calls `runtimeError` on mismatch; here
//! that becomes an `Err(String)` the VM turns into a runtime error at
//! the call site (see `VmContext::call_native`).

use std::rc::Rc;

use mt_core::{fnv1a, MtString, Value};

pub fn arity_error(name: &str, want: usize, got: usize) -> String {
    format!("wrong number of arguments to '{name}': want {want}, got {got}.")
}

pub fn expect_argc(name: &str, args: &[Value], want: usize) -> Result<(), String> {
    if args.len() != want {
        return Err(arity_error(name, want, args.len()));
    }
    Ok(())
}

pub fn expect_number(name: &str, v: &Value) -> Result<f64, String> {
    v.as_number().ok_or_else(|| format!("argument to '{name}' must be a number, got {}.", v.type_name()))
}

pub fn expect_string(name: &str, v: &Value) -> Result<Rc<MtString>, String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        other => Err(format!("argument to '{name}' must be a string, got {}.", other.type_name())),
    }
}

pub fn expect_index(name: &str, v: &Value) -> Result<i64, String> {
    let n = expect_number(name, v)?;
    if n.fract() != 0.0 {
        return Err(format!("argument to '{name}' must be an integer, got {n}."));
    }
    Ok(n as i64)
}

/// Builds a fresh, uninterned `Value::String`. Natives have no handle
/// to the VM's interner (the ABI is `Fn(&[Value]) -> NativeResult`, not
/// VM-aware) — harmless, since string equality is by content (spec §3
/// invariant 1 is about canonical identity for *compiled* literals, not
/// every string a native manufactures at call time).
pub fn new_string(s: impl Into<String>) -> Value {
    let chars = s.into();
    let hash = fnv1a(chars.as_bytes());
    Value::String(Rc::new(MtString { hash, chars }))
}
