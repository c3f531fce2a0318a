//! Top-level (not module-namespaced) natives — grounded in `native.c`
//! / `include/native.h`, registered as bare globals by `src/vm.c`'s
//! `initVM`. Their names are taken verbatim from that registration:
//! `clock, sleep, read, write, randInt, input, number, string, exit,
//! clear`. `printf, println, color, bg, append, delete, len` are
//! declared in `include/native.h` and registered there too, but their
//! bodies are not present in the retrieved sources and their jobs are
//! already covered elsewhere (`Op::Print`, the `arrays` module) — they
//! are not re-added as bare globals. `Cd`, `show` and `ls` are
//! shell-integration conveniences with no bearing on language
//! semantics and are dropped.

use std::io::{self, IsTerminal, Write as _};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use mt_core::{NativeResult, Value};
use rand::Rng;

use crate::support::{expect_argc, expect_number, expect_string, new_string};

fn clock(args: &[Value]) -> NativeResult {
    expect_argc("clock", args, 0)?;
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
    Ok(Value::Number(secs))
}

fn sleep(args: &[Value]) -> NativeResult {
    expect_argc("sleep", args, 1)?;
    let secs = expect_number("sleep", &args[0])?;
    if secs < 0.0 {
        return Err("argument to 'sleep' must not be negative.".to_string());
    }
    std::thread::sleep(std::time::Duration::from_secs_f64(secs));
    Ok(Value::Nil)
}

fn read(args: &[Value]) -> NativeResult {
    expect_argc("read", args, 1)?;
    let path = expect_string("read", &args[0])?;
    std::fs::read_to_string(&path.chars)
        .map(new_string)
        .map_err(|e| format!("'read' could not open '{}': {e}", path.chars))
}

fn write(args: &[Value]) -> NativeResult {
    expect_argc("write", args, 2)?;
    let path = expect_string("write", &args[0])?;
    let content = expect_string("write", &args[1])?;
    match std::fs::write(&path.chars, content.chars.as_bytes()) {
        Ok(()) => Ok(Value::Number(1.0)),
        Err(_) => Ok(Value::Number(0.0)),
    }
}

fn rand_int(args: &[Value]) -> NativeResult {
    expect_argc("randInt", args, 2)?;
    let lo = expect_number("randInt", &args[0])? as i64;
    let hi = expect_number("randInt", &args[1])? as i64;
    if lo > hi {
        return Err("'randInt' requires lo <= hi.".to_string());
    }
    Ok(Value::Number(rand::thread_rng().gen_range(lo..=hi) as f64))
}

fn input(args: &[Value]) -> NativeResult {
    if args.len() > 1 {
        return Err("'input' expects at most 1 argument.".to_string());
    }
    if let Some(prompt) = args.first() {
        let prompt = expect_string("input", prompt)?;
        print!("{}", prompt.chars);
        let _ = io::stdout().flush();
    }
    let mut line = String::new();
    io::stdin().read_line(&mut line).map_err(|e| format!("'input' failed to read a line: {e}"))?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(new_string(line))
}

/// Coerces a bool/number/string to a number, matching the original's
/// `doubleNative`.
fn number(args: &[Value]) -> NativeResult {
    expect_argc("number", args, 1)?;
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Bool(b) => Ok(Value::Number(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => {
            s.chars.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                format!("'number' could not parse '{}' as a number.", s.chars)
            })
        }
        other => Err(format!("'number' cannot coerce a {}.", other.type_name())),
    }
}

/// Coerces a bool/number to a string, matching the original's
/// `stringNative`.
fn string(args: &[Value]) -> NativeResult {
    expect_argc("string", args, 1)?;
    match &args[0] {
        Value::String(_) => Ok(args[0].clone()),
        Value::Bool(_) | Value::Number(_) => Ok(new_string(format!("{}", args[0]))),
        other => Err(format!("'string' cannot coerce a {}.", other.type_name())),
    }
}

/// Accepts an optional exit code, unlike the original's `exitNative`
/// (which ignores its argument and always exits 0).
fn exit(args: &[Value]) -> NativeResult {
    if args.len() > 1 {
        return Err("'exit' expects at most 1 argument.".to_string());
    }
    let code = match args.first() {
        Some(v) => expect_number("exit", v)? as i32,
        None => 0,
    };
    process::exit(code);
}

fn clear(args: &[Value]) -> NativeResult {
    expect_argc("clear", args, 0)?;
    if io::stdout().is_terminal() {
        print!("\x1b[2J\x1b[H");
        let _ = io::stdout().flush();
    }
    Ok(Value::Nil)
}

pub fn install(vm: &mut mt_vm::VmContext) {
    vm.define_native("clock", std::rc::Rc::new(clock));
    vm.define_native("sleep", std::rc::Rc::new(sleep));
    vm.define_native("read", std::rc::Rc::new(read));
    vm.define_native("write", std::rc::Rc::new(write));
    vm.define_native("randInt", std::rc::Rc::new(rand_int));
    vm.define_native("input", std::rc::Rc::new(input));
    vm.define_native("number", std::rc::Rc::new(number));
    vm.define_native("string", std::rc::Rc::new(string));
    vm.define_native("exit", std::rc::Rc::new(exit));
    vm.define_native("clear", std::rc::Rc::new(clear));
}
