//! mt-vm — the MT language's stack-based virtual machine. Consumes the
//! `mt_core::Function` chunks the compiler produces and runs them,
//! mirroring how the teacher workspace's `vitte-vm` sits downstream of
//! `vitte-compiler`. Unlike `vitte-vm`'s generic `OpAdapter`-trait
//! shell, this crate implements one concrete opcode set directly (see
//! `DESIGN.md` for why) — there is no host-pluggable instruction set
//! to adapt here.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod frame;

pub use config::VmConfig;
pub use context::VmContext;
pub use dispatch::InterpretResult;
pub use error::RuntimeError;
pub use frame::CallFrame;

/// Convenience entry point for one-shot scripts: a fresh `VmContext`
/// with no natives installed, interpreting `source` once. Callers that
/// need `math`/`strings`/`http`/... should build their own `VmContext`
/// and register `mt_natives::install` on it instead.
pub fn interpret(source: &str) -> InterpretResult {
    VmContext::new().interpret(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_core::Value;

    fn run_ok(vm: &mut VmContext, source: &str) {
        match vm.interpret(source) {
            InterpretResult::Ok => {}
            InterpretResult::CompileError(diags) => {
                panic!("compile error: {:?}", diags.errors);
            }
            InterpretResult::RuntimeError(e) => panic!("runtime error: {e}"),
        }
    }

    #[test]
    fn arithmetic_and_print() {
        let mut vm = VmContext::new();
        run_ok(&mut vm, "print 1 + 2 * 3;");
    }

    #[test]
    fn globals_round_trip() {
        let mut vm = VmContext::new();
        run_ok(&mut vm, "var x = 10; x = x + 5; print x;");
    }

    #[test]
    fn functions_and_recursion() {
        let mut vm = VmContext::new();
        run_ok(
            &mut vm,
            r#"
            fn fact(n) {
                if (n < 2) { return 1; }
                return n * fact(n - 1);
            }
            print fact(5);
            "#,
        );
    }

    #[test]
    fn closures_capture_and_mutate_upvalues() {
        let mut vm = VmContext::new();
        run_ok(
            &mut vm,
            r#"
            fn counter() {
                var n = 0;
                fn inc() {
                    n = n + 1;
                    return n;
                }
                return inc;
            }
            var c = counter();
            print c();
            print c();
            print c();
            "#,
        );
    }

    #[test]
    fn classes_inheritance_and_super() {
        let mut vm = VmContext::new();
        run_ok(
            &mut vm,
            r#"
            class Animal {
                init(name) {
                    this.name = name;
                }
                speak() {
                    return this.name + " makes a sound";
                }
            }
            class Dog < Animal {
                speak() {
                    return super.speak() + " (woof)";
                }
            }
            var d = Dog("Rex");
            print d.speak();
            "#,
        );
    }

    #[test]
    fn lists_tuples_and_indexing() {
        let mut vm = VmContext::new();
        run_ok(
            &mut vm,
            r#"
            var xs = [1, 2, 3];
            xs[1] = 20;
            print xs[1];
            var t = (1, 2, 3);
            print t[0];
            "#,
        );
    }

    #[test]
    fn list_scalar_broadcast_matches_original_semantics() {
        let mut vm = VmContext::new();
        run_ok(&mut vm, "var xs = [1, 2, 3] * 2; print xs;");
    }

    #[test]
    fn for_in_over_generated_range_visits_every_element() {
        // `0..5` generates [4, 3, 2, 1, 0] (descending — see DESIGN.md's
        // GENERATE_LIST note; the left/start operand is discarded
        // unconditionally, matching the original's `rangeExpr`); the
        // sum doesn't care about order.
        let mut vm = VmContext::new();
        run_ok(
            &mut vm,
            r#"
            var total = 0;
            for (x in 0..5) {
                total = total + x;
            }
            print total;
            "#,
        );
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let mut vm = VmContext::new();
        match vm.interpret("print nope;") {
            InterpretResult::RuntimeError(e) => {
                assert!(e.message.contains("Undefined variable"));
            }
            _ => panic!("expected a runtime error"),
        }
    }

    #[test]
    fn calling_a_number_is_a_runtime_error() {
        let mut vm = VmContext::new();
        match vm.interpret("var x = 5; x();") {
            InterpretResult::RuntimeError(e) => {
                assert!(e.message.contains("Can only call"));
            }
            _ => panic!("expected a runtime error"),
        }
    }

    #[test]
    fn division_by_zero_is_infinity_not_a_runtime_error() {
        let mut vm = VmContext::new();
        run_ok(&mut vm, "print 1 / 0;");
    }

    #[test]
    fn defining_a_native_is_callable_from_script() {
        let mut vm = VmContext::new();
        vm.define_native(
            "double",
            std::rc::Rc::new(|args: &[Value]| match args.first() {
                Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
                _ => Err("double expects a number".to_string()),
            }),
        );
        run_ok(&mut vm, "print double(21);");
    }

    /// Registers a one-off native that raises unless its two arguments
    /// are equal, so spec §8's end-to-end scenarios can assert on an
    /// actual computed value rather than just "it ran without error".
    fn expect_vm() -> VmContext {
        let mut vm = VmContext::new();
        vm.define_native(
            "expect",
            std::rc::Rc::new(|args: &[Value]| match args {
                [actual, expected] if actual == expected => Ok(Value::Nil),
                [actual, expected] => Err(format!("expected {expected}, got {actual}")),
                _ => Err("expect(actual, expected) takes exactly two arguments".to_string()),
            }),
        );
        vm
    }

    #[test]
    fn string_concatenation_matches_spec_scenario_two() {
        let mut vm = expect_vm();
        run_ok(
            &mut vm,
            r#"var a = "hi"; var b = " there"; expect(a + b, "hi there");"#,
        );
    }

    #[test]
    fn for_loop_with_continue_skips_only_the_matched_iteration() {
        // spec §8 scenario 6: `for (...) { if (i == 1) continue; print i; }`
        // visits 0 and 2, skipping 1 — asserted here via an accumulator
        // instead of captured stdout.
        let mut vm = expect_vm();
        run_ok(
            &mut vm,
            r#"
            var total = 0;
            var visits = 0;
            for (var i = 0; i < 3; i = i + 1) {
                if (i == 1) continue;
                total = total + i;
                visits = visits + 1;
            }
            expect(total, 2);
            expect(visits, 2);
            "#,
        );
    }

    #[test]
    fn ternary_conditional_selects_the_matching_branch() {
        let mut vm = expect_vm();
        run_ok(&mut vm, r#"expect(true ? "yes" : "no", "yes");"#);
        run_ok(&mut vm, r#"expect(false ? "yes" : "no", "no");"#);
        run_ok(
            &mut vm,
            r#"
            var x = 2;
            expect(x == 1 ? "one" : x == 2 ? "two" : "other", "two");
            "#,
        );
    }

    #[test]
    fn break_unwinds_out_of_a_switch_nested_in_a_loop() {
        let mut vm = expect_vm();
        run_ok(
            &mut vm,
            r#"
            var reached_after = false;
            var i = 0;
            while (i < 3) {
                switch (i) {
                    case 1:
                        break;
                    default:
                        i = i + 1;
                        continue;
                }
                reached_after = true;
                break;
            }
            expect(reached_after, true);
            expect(i, 1);
            "#,
        );
    }
}
