//! The `http` namespace — grounded in `module/http.c`'s raw-socket GET
//! to `host:port`, reimplemented over `ureq` rather than hand-rolled
//! `socket`/`connect`/`read` calls.

use std::collections::HashMap;
use std::rc::Rc;

use mt_core::{NativeClass, NativeFn, NativeResult, Value};

use crate::support::{expect_number, expect_string};

const DEFAULT_HOST: &str = "mt-lang.org";
const DEFAULT_PORT: f64 = 80.0;

fn get(args: &[Value]) -> NativeResult {
    if args.len() > 2 {
        return Err("'Get' expects at most 2 arguments (host, port).".to_string());
    }
    let host = match args.first() {
        Some(v) => expect_string("Get", v)?.chars.clone(),
        None => DEFAULT_HOST.to_string(),
    };
    let port = match args.get(1) {
        Some(v) => expect_number("Get", v)?,
        None => DEFAULT_PORT,
    };
    let url = format!("http://{host}:{}/", port as u32);
    let body = ureq::get(&url)
        .call()
        .map_err(|e| format!("'http.Get' request to '{url}' failed: {e}"))?
        .into_string()
        .map_err(|e| format!("'http.Get' response from '{url}' was not valid text: {e}"))?;
    Ok(crate::support::new_string(body))
}

pub fn module(vm: &mut mt_vm::VmContext) -> NativeClass {
    let name = vm.intern("http");
    let mut methods: HashMap<String, NativeFn> = HashMap::new();
    methods.insert("Get".to_string(), Rc::new(get));
    NativeClass { name, methods }
}
