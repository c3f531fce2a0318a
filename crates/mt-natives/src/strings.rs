//! The `strings` namespace — grounded in `module/strings.c`, ported
//! method-for-method onto Rust `String`s instead of the original's
//! manual `malloc`/`memcpy` buffers.

use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{ListObj, NativeClass, NativeFn, NativeResult, Value};

use crate::support::{expect_argc, expect_index, expect_string, new_string};

fn concat(args: &[Value]) -> NativeResult {
    let mut out = String::new();
    for arg in args {
        out.push_str(&expect_string("Concat", arg)?.chars);
    }
    Ok(new_string(out))
}

fn len(args: &[Value]) -> NativeResult {
    expect_argc("Len", args, 1)?;
    let s = expect_string("Len", &args[0])?;
    Ok(Value::Number(s.len() as f64))
}

/// Inclusive `[start, end]` bounds, matching the original's buffer
/// arithmetic (`end - start + 1` bytes copied) rather than Rust's
/// usual half-open slicing.
fn substring(args: &[Value]) -> NativeResult {
    expect_argc("Substring", args, 3)?;
    let s = expect_string("Substring", &args[0])?;
    let start = expect_index("Substring", &args[1])?;
    let end = expect_index("Substring", &args[2])?;
    let len = s.chars.len() as i64;
    if start < 0 || end < 0 || start >= len || end >= len {
        return Err("'Substring' bounds out of range.".to_string());
    }
    if start > end {
        return Err("'Substring' start must not be after end.".to_string());
    }
    let bytes = s.chars.as_bytes();
    let slice = &bytes[start as usize..=end as usize];
    Ok(new_string(String::from_utf8_lossy(slice).into_owned()))
}

fn index_of(args: &[Value]) -> NativeResult {
    expect_argc("IndexOf", args, 2)?;
    let haystack = expect_string("IndexOf", &args[0])?;
    let needle = expect_string("IndexOf", &args[1])?;
    let pos = haystack
        .chars
        .find(needle.chars.as_str())
        .map(|byte_pos| byte_pos as f64)
        .unwrap_or(-1.0);
    Ok(Value::Number(pos))
}

/// Non-overlapping literal replacement, left to right, matching the
/// original's scan-and-skip-past-match loop.
fn replace(args: &[Value]) -> NativeResult {
    expect_argc("Replace", args, 3)?;
    let haystack = expect_string("Replace", &args[0])?;
    let needle = expect_string("Replace", &args[1])?;
    let replacement = expect_string("Replace", &args[2])?;
    if needle.chars.is_empty() {
        return Ok(new_string(haystack.chars.clone()));
    }
    Ok(new_string(haystack.chars.replace(needle.chars.as_str(), &replacement.chars)))
}

fn lower(args: &[Value]) -> NativeResult {
    expect_argc("Lower", args, 1)?;
    Ok(new_string(expect_string("Lower", &args[0])?.chars.to_lowercase()))
}

fn upper(args: &[Value]) -> NativeResult {
    expect_argc("Upper", args, 1)?;
    Ok(new_string(expect_string("Upper", &args[0])?.chars.to_uppercase()))
}

/// The original's `Trim` strips every space/tab/newline/CR byte
/// *anywhere* in the string, not just the edges — kept verbatim since
/// that is the actual grounded behavior, surprising as the name is.
fn trim(args: &[Value]) -> NativeResult {
    expect_argc("Trim", args, 1)?;
    let s = expect_string("Trim", &args[0])?;
    let out: String = s.chars.chars().filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\r')).collect();
    Ok(new_string(out))
}

fn split(args: &[Value]) -> NativeResult {
    expect_argc("Split", args, 2)?;
    let s = expect_string("Split", &args[0])?;
    let delim = expect_string("Split", &args[1])?;
    let items: Vec<Value> = if delim.chars.is_empty() {
        vec![new_string(s.chars.clone())]
    } else {
        s.chars.split(delim.chars.as_str()).map(|part| new_string(part.to_string())).collect()
    };
    Ok(Value::List(Rc::new(std::cell::RefCell::new(ListObj { items }))))
}

fn to_string(args: &[Value]) -> NativeResult {
    expect_argc("ToString", args, 1)?;
    let n = args[0]
        .as_number()
        .ok_or_else(|| format!("argument to 'ToString' must be a number, got {}.", args[0].type_name()))?;
    Ok(new_string(format!("{n}")))
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("strings");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Concat".to_string(), Rc::new(concat));
    methods.insert("Len".to_string(), Rc::new(len));
    methods.insert("Substring".to_string(), Rc::new(substring));
    methods.insert("IndexOf".to_string(), Rc::new(index_of));
    methods.insert("Replace".to_string(), Rc::new(replace));
    methods.insert("Lower".to_string(), Rc::new(lower));
    methods.insert("Upper".to_string(), Rc::new(upper));
    methods.insert("Trim".to_string(), Rc::new(trim));
    methods.insert("Split".to_string(), Rc::new(split));
    methods.insert("ToString".to_string(), Rc::new(to_string));
    NativeClass { name, methods }
}
