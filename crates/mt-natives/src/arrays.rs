//! The `arrays` namespace — grounded in `module/arrays.c`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{ListObj, NativeClass, NativeFn, NativeResult, Value};
use rand::Rng;

use crate::support::{expect_argc, expect_index, expect_number};

fn expect_list(name: &str, v: &Value) -> Result<Rc<RefCell<ListObj>>, String> {
    match v {
        Value::List(list) => Ok(list.clone()),
        other => Err(format!("argument to '{name}' must be a list, got {}.", other.type_name())),
    }
}

fn len(args: &[Value]) -> NativeResult {
    expect_argc("Len", args, 1)?;
    let list = expect_list("Len", &args[0])?;
    Ok(Value::Number(list.borrow().items.len() as f64))
}

fn reverse(args: &[Value]) -> NativeResult {
    expect_argc("Reverse", args, 1)?;
    let list = expect_list("Reverse", &args[0])?;
    let mut items = list.borrow().items.clone();
    items.reverse();
    Ok(Value::List(Rc::new(RefCell::new(ListObj { items }))))
}

fn push(args: &[Value]) -> NativeResult {
    expect_argc("Push", args, 2)?;
    let list = expect_list("Push", &args[0])?;
    list.borrow_mut().items.push(args[1].clone());
    Ok(args[0].clone())
}

fn pop(args: &[Value]) -> NativeResult {
    expect_argc("Pop", args, 1)?;
    let list = expect_list("Pop", &args[0])?;
    list.borrow_mut().items.pop().ok_or_else(|| "'Pop' called on an empty list.".to_string())
}

fn shift(args: &[Value]) -> NativeResult {
    expect_argc("Shift", args, 1)?;
    let list = expect_list("Shift", &args[0])?;
    let mut list = list.borrow_mut();
    if list.items.is_empty() {
        return Err("'Shift' called on an empty list.".to_string());
    }
    Ok(list.items.remove(0))
}

fn unshift(args: &[Value]) -> NativeResult {
    expect_argc("Unshift", args, 2)?;
    let list = expect_list("Unshift", &args[0])?;
    list.borrow_mut().items.insert(0, args[1].clone());
    Ok(args[0].clone())
}

/// Negative indices count back from the end, like the original.
fn slice(args: &[Value]) -> NativeResult {
    expect_argc("Slice", args, 3)?;
    let list = expect_list("Slice", &args[0])?;
    let count = list.borrow().items.len() as i64;
    let normalize = |raw: i64| -> i64 {
        if raw < 0 {
            count + raw
        } else {
            raw
        }
    };
    let mut start = normalize(expect_index("Slice", &args[1])?).max(0);
    let mut end = normalize(expect_index("Slice", &args[2])?);
    if end > count {
        end = count;
    }
    if start > end {
        start = end;
    }
    let items = list.borrow().items[start as usize..end as usize].to_vec();
    Ok(Value::List(Rc::new(RefCell::new(ListObj { items }))))
}

/// Builds a list of `n` values in `[0, 100)`, matching the original's
/// `rand() % 100`.
fn rand_list(args: &[Value]) -> NativeResult {
    expect_argc("Rand", args, 1)?;
    let n = expect_number("Rand", &args[0])?;
    if n.fract() != 0.0 || n < 0.0 {
        return Err("argument to 'Rand' must be a non-negative integer.".to_string());
    }
    let mut rng = rand::thread_rng();
    let items = (0..n as u64).map(|_| Value::Number(rng.gen_range(0..100) as f64)).collect();
    Ok(Value::List(Rc::new(RefCell::new(ListObj { items }))))
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("arrays");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Len".to_string(), Rc::new(len));
    methods.insert("Reverse".to_string(), Rc::new(reverse));
    methods.insert("Push".to_string(), Rc::new(push));
    methods.insert("Pop".to_string(), Rc::new(pop));
    methods.insert("Shift".to_string(), Rc::new(shift));
    methods.insert("Unshift".to_string(), Rc::new(unshift));
    methods.insert("Slice".to_string(), Rc::new(slice));
    methods.insert("Rand".to_string(), Rc::new(rand_list));
    NativeClass { name, methods }
}
