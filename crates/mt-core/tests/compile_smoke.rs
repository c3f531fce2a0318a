use mt_core::{compile, disassemble_chunk, ErrorCode};

#[test]
fn disassembles_a_simple_function() {
    let function = compile(
        r#"
        fn add(a, b) {
            return a + b;
        }
        print add(1, 2);
        "#,
    )
    .expect("well-formed source must compile");

    let text = disassemble_chunk(&function.chunk, "script");
    assert!(text.contains("== script =="));
    assert!(text.contains("fn add"));
    assert!(text.contains("add"));
}

#[test]
fn for_in_and_range_list_compile() {
    let function = compile(
        r#"
        for (x in 0..5) {
            print x;
        }
        "#,
    )
    .expect("for-in over a range literal must compile");
    assert!(!function.chunk.is_empty());
}

#[test]
fn tuple_and_list_literals_compile() {
    let function = compile("var t = (1, 2, 3); var l = [1, 2, 3]; var singleton = (1,);")
        .expect("tuple and list literals must compile");
    assert!(!function.chunk.is_empty());
}

#[test]
fn class_with_inheritance_and_super_call_compiles() {
    let src = r#"
        class Animal {
            speak() {
                print "...";
            }
        }
        class Dog < Animal {
            speak() {
                super.speak();
                print "woof";
            }
        }
        Dog().speak();
    "#;
    assert!(compile(src).is_ok());
}

#[test]
fn duplicate_local_in_same_scope_is_rejected() {
    let diags = compile("{ var x = 1; var x = 2; }").unwrap_err();
    assert!(diags.errors.iter().any(|e| e.code == ErrorCode::VariableRedeclaration));
}

#[test]
fn self_inheriting_class_is_rejected() {
    let diags = compile("class Loopy < Loopy {}").unwrap_err();
    assert!(diags.errors.iter().any(|e| e.code == ErrorCode::SelfInheritance));
}

#[test]
fn switch_statement_compiles() {
    let src = r#"
        var x = 2;
        switch (x) {
            case 1:
                print "one";
            case 2:
                print "two";
            default:
                print "other";
        }
    "#;
    assert!(compile(src).is_ok());
}

#[test]
fn lambda_expression_compiles() {
    assert!(compile("var square = \\x -> x * x; print square(4);").is_ok());
}

#[test]
fn defer_is_accepted_syntactically() {
    assert!(compile("fn f() { defer 1; return 0; }").is_ok());
}

#[test]
fn ternary_conditional_compiles_and_chains_right_associatively() {
    assert!(compile(r#"print true ? 1 : 2;"#).is_ok());
    assert!(compile(r#"var x = 1; print x == 1 ? "one" : x == 2 ? "two" : "other";"#).is_ok());
}

#[test]
fn break_inside_switch_case_is_accepted() {
    let src = r#"
        var x = 1;
        while (true) {
            switch (x) {
                case 1:
                    break;
                default:
                    print "unreached";
            }
            print "after switch";
            break;
        }
    "#;
    assert!(compile(src).is_ok());
}

#[test]
fn bare_break_inside_switch_with_no_enclosing_loop_is_accepted() {
    // `break` exits the nearest loop *or* switch — a switch with no
    // enclosing loop is itself a valid break target.
    let src = r#"
        switch (1) {
            case 1:
                break;
        }
    "#;
    assert!(compile(src).is_ok());
}

#[test]
fn two_hundred_fifty_six_constants_compile_but_257_is_an_error() {
    let mut src = String::new();
    for i in 0..256 {
        src.push_str(&format!("print {i};\n"));
    }
    assert!(compile(&src).is_ok(), "256 distinct constants must fit in one chunk");

    src.push_str("print 9999;\n");
    let diags = compile(&src).unwrap_err();
    assert!(diags.errors.iter().any(|e| e.code == ErrorCode::TooManyConstants));
}

#[test]
fn two_hundred_fifty_six_locals_compile_but_257_is_an_error() {
    let mut src = String::from("{\n");
    for i in 0..256 {
        src.push_str(&format!("var v{i} = {i};\n"));
    }
    src.push_str("}\n");
    assert!(compile(&src).is_ok(), "256 locals in one scope must compile");

    let mut too_many = String::from("{\n");
    for i in 0..257 {
        too_many.push_str(&format!("var v{i} = {i};\n"));
    }
    too_many.push_str("}\n");
    let diags = compile(&too_many).unwrap_err();
    assert!(diags.errors.iter().any(|e| e.code == ErrorCode::TooManyLocals));
}

#[test]
fn oversized_loop_body_is_a_compile_error() {
    // Every statement here between the jump and its loop-back point
    // counts toward the backward jump's 16-bit offset; padding with
    // enough no-op expression statements pushes it past `u16::MAX`.
    let mut body = String::from("while (true) {\n");
    for _ in 0..20_000 {
        body.push_str("1 + 1;\n");
    }
    body.push_str("}\n");
    let diags = compile(&body).unwrap_err();
    assert!(diags.errors.iter().any(|e| e.code == ErrorCode::LoopBodyTooLarge));
}
