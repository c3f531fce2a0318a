//! The `sorts` namespace — grounded in `module/sorts.c`, whose only
//! registered method (`Bubble`) is a stub that returns `Nil` in the
//! original. We give it a real body and round the module out with
//! `Quick`/`Merge` in the same ascending-numbers-only contract.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{ListObj, NativeClass, NativeFn, NativeResult, Value};

use crate::support::expect_argc;

fn numbers_of(name: &str, v: &Value) -> Result<Vec<f64>, String> {
    match v {
        Value::List(list) => list
            .borrow()
            .items
            .iter()
            .map(|item| {
                item.as_number()
                    .ok_or_else(|| format!("'{name}' requires a list of numbers, got {}.", item.type_name()))
            })
            .collect(),
        other => Err(format!("argument to '{name}' must be a list, got {}.", other.type_name())),
    }
}

fn to_list(items: Vec<f64>) -> Value {
    Value::List(Rc::new(RefCell::new(ListObj { items: items.into_iter().map(Value::Number).collect() })))
}

fn bubble(args: &[Value]) -> NativeResult {
    expect_argc("Bubble", args, 1)?;
    let mut items = numbers_of("Bubble", &args[0])?;
    let n = items.len();
    for i in 0..n {
        for j in 0..n.saturating_sub(i + 1) {
            if items[j] > items[j + 1] {
                items.swap(j, j + 1);
            }
        }
    }
    Ok(to_list(items))
}

fn quick(args: &[Value]) -> NativeResult {
    expect_argc("Quick", args, 1)?;
    let mut items = numbers_of("Quick", &args[0])?;
    quicksort(&mut items);
    Ok(to_list(items))
}

/// Lomuto partition, last element as pivot — simple and free of the
/// index-underflow pitfalls a Hoare scheme invites on `usize`.
fn quicksort(items: &mut [f64]) {
    let len = items.len();
    if len <= 1 {
        return;
    }
    let pivot = items[len - 1];
    let mut i = 0;
    for j in 0..len - 1 {
        if items[j] <= pivot {
            items.swap(i, j);
            i += 1;
        }
    }
    items.swap(i, len - 1);
    quicksort(&mut items[..i]);
    quicksort(&mut items[i + 1..]);
}

fn merge(args: &[Value]) -> NativeResult {
    expect_argc("Merge", args, 1)?;
    let items = numbers_of("Merge", &args[0])?;
    Ok(to_list(mergesort(&items)))
}

fn mergesort(items: &[f64]) -> Vec<f64> {
    if items.len() <= 1 {
        return items.to_vec();
    }
    let mid = items.len() / 2;
    let left = mergesort(&items[..mid]);
    let right = mergesort(&items[mid..]);
    let mut out = Vec::with_capacity(items.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] <= right[j] {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("sorts");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Bubble".to_string(), Rc::new(bubble));
    methods.insert("Quick".to_string(), Rc::new(quick));
    methods.insert("Merge".to_string(), Rc::new(merge));
    NativeClass { name, methods }
}
