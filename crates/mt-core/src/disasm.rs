//! disasm.rs — human-readable, informational disassembler (spec §1:
//! "The debug disassembler: observer on chunks; its output is
//! informational only"). Resolves constant-pool indices and recurses
//! into nested function chunks reachable through `Op::Closure`.

use std::fmt::Write as _;

use crate::chunk::Chunk;
use crate::value::Value;

pub fn disassemble_chunk(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    write_chunk(&mut out, chunk, title, 0);
    out
}

fn write_chunk(out: &mut String, chunk: &Chunk, title: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}== {title} ==");

    if !chunk.consts.is_empty() {
        let _ = writeln!(out, "{indent}-- constants --");
        for (i, v) in chunk.consts.iter() {
            let _ = writeln!(out, "{indent}  [{i}] = {}", render_const(v));
        }
    }

    let _ = writeln!(out, "{indent}-- code --");
    for (pc, op) in chunk.code.iter().enumerate() {
        let line = chunk.lines.line_for_pc(pc as u32).unwrap_or(0);
        let resolved = resolve_operand(chunk, op);
        match resolved {
            Some(extra) => {
                let _ = writeln!(out, "{indent}{pc:05}  (line {line:>4})  {op}  /* {extra} */");
            }
            None => {
                let _ = writeln!(out, "{indent}{pc:05}  (line {line:>4})  {op}");
            }
        }
    }

    // Recurse into nested functions referenced from the constant pool —
    // a function constant may itself be wrapped into a closure by
    // `Op::Closure` at runtime, but its chunk is already known here.
    for (i, v) in chunk.consts.iter() {
        if let Value::Function(f) = v {
            write_chunk(out, &f.chunk, &format!("fn {} (const {i})", f.display_name()), depth + 1);
        }
    }
}

fn resolve_operand(chunk: &Chunk, op: &crate::ops::Op) -> Option<String> {
    use crate::ops::Op::*;
    let idx = match op {
        Constant(i) | GetGlobal(i) | DefineGlobal(i) | SetGlobal(i) | GetProperty(i)
        | SetProperty(i) | GetSuper(i) | Class(i) | Method(i) | Closure(i, _) => *i,
        _ => return None,
    };
    chunk.consts.get(idx).map(render_const)
}

fn render_const(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{s}\""),
        other => format!("{other}"),
    }
}
