//! mt-natives — the host function registry: bare-global natives and
//! the `NativeClass` module namespaces (`math`, `strings`, `arrays`,
//! `sorts`, `assert`, `errors`, `log`, `http`), grounded in
//! `original_source/native.c` and `original_source/module/*.c`.
//!
//! `mt-vm` knows nothing about any of this — `VmContext` only exposes
//! `define_native`/`define_native_class` as registration points, the
//! same separation the teacher workspace draws between its VM and its
//! host-facing crates. A driver (`mt-cli`, or a test) calls
//! [`install`] once on a fresh context before running a script.

mod arrays;
mod assert;
mod errors;
mod http;
mod log;
mod math;
mod sorts;
mod strings;
mod support;
mod toplevel;

use mt_vm::VmContext;

/// Registers every native function and module namespace on `vm`.
pub fn install(vm: &mut VmContext) {
    toplevel::install(vm);
    let math = math::module(vm);
    vm.define_native_class(math);
    let strings = strings::module(vm);
    vm.define_native_class(strings);
    let arrays = arrays::module(vm);
    vm.define_native_class(arrays);
    let sorts = sorts::module(vm);
    vm.define_native_class(sorts);
    let assert = assert::module(vm);
    vm.define_native_class(assert);
    let errors = errors::module(vm);
    vm.define_native_class(errors);
    let log = log::module(vm);
    vm.define_native_class(log);
    let http = http::module(vm);
    vm.define_native_class(http);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_vm::InterpretResult;

    /// A script-level "expect" that raises (rather than asserts, which
    /// would `exit(70)` and take the test binary down with it) so a
    /// failed check surfaces as an ordinary `RuntimeError` the test can
    /// match on.
    fn run_checks(source: &str) {
        let mut vm = VmContext::new();
        install(&mut vm);
        match vm.interpret(source) {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(diags) => panic!("compile error: {:?}", diags.errors),
            InterpretResult::RuntimeError(e) => panic!("check failed: {e}"),
        }
    }

    #[test]
    fn math_module_computes_trig_and_supplements() {
        run_checks(
            r#"
            if (math.Fac(5) != 120) { errors.Raise("Fac(5) != 120"); }
            if (math.Sqrt(16) != 4) { errors.Raise("Sqrt(16) != 4"); }
            if (math.Max(3, 9) != 9) { errors.Raise("Max(3, 9) != 9"); }
            "#,
        );
    }

    #[test]
    fn strings_module_matches_original_semantics() {
        run_checks(
            r#"
            if (strings.Upper("abc") != "ABC") { errors.Raise("Upper failed"); }
            if (strings.Substring("hello", 1, 3) != "ell") { errors.Raise("Substring failed"); }
            if (strings.Trim(" a b ") != "ab") { errors.Raise("Trim failed"); }
            if (strings.IndexOf("hello", "ll") != 2) { errors.Raise("IndexOf failed"); }
            "#,
        );
    }

    #[test]
    fn arrays_module_mutates_in_place() {
        run_checks(
            r#"
            var a = [1, 2];
            arrays.Push(a, 3);
            if (arrays.Len(a) != 3) { errors.Raise("Push/Len failed"); }
            if (arrays.Pop(a) != 3) { errors.Raise("Pop failed"); }
            "#,
        );
    }

    #[test]
    fn sorts_bubble_orders_ascending() {
        run_checks(
            r#"
            var sorted = sorts.Bubble([3, 1, 2]);
            if (sorted[0] != 1) { errors.Raise("Bubble[0] wrong"); }
            if (sorted[1] != 2) { errors.Raise("Bubble[1] wrong"); }
            if (sorted[2] != 3) { errors.Raise("Bubble[2] wrong"); }
            "#,
        );
    }

    #[test]
    fn errors_raise_is_a_catchable_runtime_error() {
        let mut vm = VmContext::new();
        install(&mut vm);
        match vm.interpret(r#"errors.Raise("boom");"#) {
            InterpretResult::RuntimeError(e) => assert!(e.to_string().contains("boom")),
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn native_functions_are_callable_as_globals() {
        run_checks("if (math.Abs(-5) != 5) { errors.Raise(\"toplevel/native wiring broken\"); }");
    }
}
