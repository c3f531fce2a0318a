//! mt-cli — the REPL and file driver for MT scripts. Grounded in the
//! original host's `main.c`/`repl.c`/`preproc.c`: no positional
//! arguments starts a REPL, one argument runs that file (`.l` files
//! are passed through the literate filter first), more than one
//! argument concatenates the files in reverse order into one scratch
//! buffer before running it. `use "path";` directives are pre-scanned
//! textually and their target files spliced in ahead of the buffer
//! that reaches `mt_core::compile`, exactly as the original's
//! `getImports` does by calling `interpret` on each import before the
//! main file — except here we splice source text rather than
//! re-entering `interpret` per import, since the compiler already
//! treats the concatenated buffer as a single compilation unit.

use std::fmt;
use std::io::{self, IsTerminal, Write as _};
use std::path::{Path, PathBuf};

use clap::Parser;
use mt_vm::{InterpretResult, VmContext};

mod literate;
mod prescan;

pub use literate::strip_literate_fences;
pub use prescan::splice_use_directives;

/// `mt [FILE...]` — no files opens a REPL, one file runs it, more than
/// one concatenates them (reversed) into a single script.
#[derive(Debug, Parser)]
#[command(name = "mt", version, about = "The MT language interpreter")]
pub struct Cli {
    /// Script file(s) to run. Omit to start an interactive REPL.
    pub files: Vec<PathBuf>,

    /// Controls whether diagnostics are colored.
    #[arg(long, value_enum, default_value = "auto")]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn enabled(self, stream_is_terminal: bool) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stream_is_terminal,
        }
    }
}

/// Process exit code matching spec §6: 0 on `Ok`, 65 on a compile
/// error, 70 on a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut vm = VmContext::new();
    mt_natives::install(&mut vm);

    if cli.files.is_empty() {
        repl(&mut vm, cli.color);
        return Ok(ExitCode(0));
    }

    let source = load_source(&cli.files)?;
    let source = splice_use_directives(&source, Path::new(&cli.files[0]))?;
    Ok(run_source(&mut vm, &source, cli.color))
}

/// Reads every file in `paths`; a single path is read as-is (with the
/// literate filter applied when its extension is `l`), more than one
/// path has its contents concatenated in reverse order, matching
/// spec.md §6's "more arguments = concatenate in reverse order".
fn load_source(paths: &[PathBuf]) -> anyhow::Result<String> {
    if paths.len() == 1 {
        return read_one(&paths[0]);
    }
    let mut combined = String::new();
    for path in paths.iter().rev() {
        combined.push_str(&read_one(path)?);
        combined.push('\n');
    }
    Ok(combined)
}

fn read_one(path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not open file '{}': {e}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "l") {
        tracing::debug!(path = %path.display(), "entering literate mode");
        Ok(strip_literate_fences(&text))
    } else {
        Ok(text)
    }
}

fn run_source(vm: &mut VmContext, source: &str, color: ColorMode) -> ExitCode {
    match vm.interpret(source) {
        InterpretResult::Ok => ExitCode(0),
        InterpretResult::CompileError(diags) => {
            let colorize = color.enabled(io::stderr().is_terminal());
            for err in &diags.errors {
                eprintln!("{}", Colored(err, colorize));
            }
            ExitCode(65)
        }
        InterpretResult::RuntimeError(err) => {
            let colorize = color.enabled(io::stderr().is_terminal());
            eprintln!("{}", Colored(&err, colorize));
            ExitCode(70)
        }
    }
}

/// Wraps any `Display` diagnostic in red ANSI escapes when `1` is
/// true, matching the teacher's terminal-aware disassembler output
/// without adding a color-handling dependency for this one use.
struct Colored<'a, T: fmt::Display>(&'a T, bool);

impl<T: fmt::Display> fmt::Display for Colored<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 {
            write!(f, "\x1b[31m{}\x1b[0m", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

fn repl(vm: &mut VmContext, color: ColorMode) {
    println!("mt {} — interactive mode, Ctrl+D to exit", env!("CARGO_PKG_VERSION"));
    let stdin = io::stdin();
    loop {
        print!("mt> ");
        if io::stdout().flush().is_err() {
            break;
        }
        let mut line = String::new();
        match stdin.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                run_source(vm, &line, color);
            }
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_file(name_hint: &str, contents: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!("mt-cli-test-{name_hint}-{n}.mt"));
        std::fs::write(&path, contents).expect("write temp fixture");
        path
    }

    #[test]
    fn running_a_file_returns_ok_exit_code() {
        let path = temp_file("ok", "print 1 + 1;");
        let mut vm = VmContext::new();
        let source = load_source(&[path]).unwrap();
        assert_eq!(run_source(&mut vm, &source, ColorMode::Never), ExitCode(0));
    }

    #[test]
    fn compile_error_maps_to_exit_code_65() {
        let mut vm = VmContext::new();
        assert_eq!(run_source(&mut vm, "var = ;", ColorMode::Never), ExitCode(65));
    }

    #[test]
    fn runtime_error_maps_to_exit_code_70() {
        let mut vm = VmContext::new();
        assert_eq!(run_source(&mut vm, "print undefinedGlobal;", ColorMode::Never), ExitCode(70));
    }

    #[test]
    fn use_directive_splices_target_file_ahead_of_source() {
        let lib = temp_file("lib", "var shared = 41;");
        let main_src = format!(r#"use "{}"; print shared + 1;"#, lib.display());
        let spliced = splice_use_directives(&main_src, Path::new("main.mt")).unwrap();
        assert!(spliced.starts_with("var shared = 41;"));
        let mut vm = VmContext::new();
        assert_eq!(run_source(&mut vm, &spliced, ColorMode::Never), ExitCode(0));
    }
}
