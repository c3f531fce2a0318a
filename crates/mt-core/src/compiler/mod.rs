//! compiler/mod.rs — single-pass Pratt parser and bytecode emitter.
//!
//! Grounded in the teacher workspace's `compiler/mod.rs` pipeline
//! shape (a driver that walks tokens once and emits directly, no
//! intermediate AST) generalized to this language's grammar: Pratt
//! expression parsing with a static precedence table (spec §9 design
//! note), one `FunctionCompiler` per nested function body linked
//! through an explicit stack rather than a raw enclosing pointer, and
//! class-compiler state tracked the same way for `this`/`super`.
//!
//! Compilation never stops at the first error (spec §7 "panic mode"):
//! a syntax error enters panic mode, the parser discards tokens up to
//! the next likely statement boundary, and compiling continues so a
//! single run can report every error in a file.

mod config;

pub use config::CompileConfig;

use std::rc::Rc;

use crate::chunk::Chunk;
use crate::error::{CompileError, Diagnostics, ErrorCode};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::ops::{Op, UpvalueDesc};
use crate::value::{Function, Interner, Value};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment,
    Range,
    Conditional,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Power,
    Call,
    Primary,
}

impl Precedence {
    fn next(self) -> Self {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Range,
            Range => Conditional,
            Conditional => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Power,
            Power => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type ParseFn = fn(&mut Parser, bool);

struct Rule {
    prefix: Option<ParseFn>,
    infix: Option<ParseFn>,
    precedence: Precedence,
}

fn set_op_operand(get_op: &Op) -> u8 {
    match get_op {
        Op::GetLocal(i) | Op::GetUpvalue(i) | Op::GetGlobal(i) => *i,
        _ => unreachable!("named_variable only ever produces Get{Local,Upvalue,Global}"),
    }
}

fn rule(kind: TokenKind) -> Rule {
    use TokenKind as K;
    let none = Precedence::None;
    let (prefix, infix, precedence): (Option<ParseFn>, Option<ParseFn>, Precedence) = match kind {
        K::LeftParen => (Some(Parser::grouping_or_tuple), Some(Parser::call), Precedence::Call),
        K::LeftBracket => (Some(Parser::list_literal), Some(Parser::index), Precedence::Call),
        K::Dot => (None, Some(Parser::dot), Precedence::Call),
        K::Minus => (Some(Parser::unary), Some(Parser::binary), Precedence::Term),
        K::Plus => (None, Some(Parser::binary), Precedence::Term),
        K::Slash => (None, Some(Parser::binary), Precedence::Factor),
        K::Star => (None, Some(Parser::binary), Precedence::Factor),
        K::Percent => (None, Some(Parser::binary), Precedence::Factor),
        K::Caret => (None, Some(Parser::binary), Precedence::Power),
        K::DotDot => (None, Some(Parser::range_list), Precedence::Range),
        K::Question => (None, Some(Parser::conditional), Precedence::Conditional),
        K::Bang => (Some(Parser::unary), None, none),
        K::BangEqual => (None, Some(Parser::binary), Precedence::Equality),
        K::EqualEqual => (None, Some(Parser::binary), Precedence::Equality),
        K::Greater => (None, Some(Parser::binary), Precedence::Comparison),
        K::GreaterEqual => (None, Some(Parser::binary), Precedence::Comparison),
        K::Less => (None, Some(Parser::binary), Precedence::Comparison),
        K::LessEqual => (None, Some(Parser::binary), Precedence::Comparison),
        K::Identifier => (Some(Parser::variable), None, none),
        K::String => (Some(Parser::string_lit), None, none),
        K::Number => (Some(Parser::number), None, none),
        K::And => (None, Some(Parser::and), Precedence::And),
        K::Or => (None, Some(Parser::or), Precedence::Or),
        K::False => (Some(Parser::literal), None, none),
        K::True => (Some(Parser::literal), None, none),
        K::Nil => (Some(Parser::literal), None, none),
        K::This => (Some(Parser::this), None, none),
        K::Super => (Some(Parser::super_), None, none),
        K::Backslash => (Some(Parser::lambda), None, none),
        K::PlusPlus => (None, Some(Parser::postfix_incr), Precedence::Call),
        _ => (None, None, none),
    };
    Rule { prefix, infix, precedence }
}

struct Local {
    name: String,
    depth: i32,
    is_captured: bool,
}

struct LoopCtx {
    loop_start: usize,
    scope_depth: i32,
}

/// A `break`-able construct: either a loop or a `switch` body. Tracked
/// on its own stack (distinct from `loops`) because `break` must exit
/// the nearest of either, while `continue` only ever targets a loop.
struct BreakCtx {
    scope_depth: i32,
    jumps: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
    Method,
    Initializer,
}

struct ClassState {
    has_superclass: bool,
}

struct FunctionCompiler {
    chunk: Chunk,
    arity: u8,
    name: Option<Rc<crate::value::MtString>>,
    kind: FunctionKind,
    locals: Vec<Local>,
    scope_depth: i32,
    upvalues: Vec<UpvalueDesc>,
    loops: Vec<LoopCtx>,
    breaks: Vec<BreakCtx>,
}

impl FunctionCompiler {
    fn new(kind: FunctionKind, name: Option<Rc<crate::value::MtString>>) -> Self {
        // Slot 0 is reserved for the receiver in methods, the callee
        // closure is otherwise unaddressable — matches spec §4.5
        // "local slot 0 holds `this` in methods, is empty otherwise".
        let receiver_name = if kind == FunctionKind::Method || kind == FunctionKind::Initializer {
            "this"
        } else {
            ""
        };
        Self {
            chunk: Chunk::new(),
            arity: 0,
            name,
            kind,
            locals: vec![Local { name: receiver_name.to_string(), depth: 0, is_captured: false }],
            scope_depth: 0,
            upvalues: Vec::new(),
            loops: Vec::new(),
            breaks: Vec::new(),
        }
    }
}

/// Single-pass compiler over a token stream. Owns the active chain of
/// [`FunctionCompiler`]s (one per nested `fn`/method/lambda currently
/// being emitted) as an explicit stack rather than an enclosing
/// pointer, which Rust's borrow checker tolerates far better.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    previous: Token,
    current: Token,
    diagnostics: Diagnostics,
    panic_mode: bool,
    interner: Interner,
    compilers: Vec<FunctionCompiler>,
    classes: Vec<ClassState>,
    config: CompileConfig,
}

/// Compiles `source` into a top-level script [`Function`], using
/// [`CompileConfig::default`]. `Err` carries every diagnostic collected
/// during the run, not just the first (spec §7 panic mode).
pub fn compile(source: &str) -> Result<Rc<Function>, Diagnostics> {
    compile_with_config(source, CompileConfig::default())
}

pub fn compile_with_config(source: &str, config: CompileConfig) -> Result<Rc<Function>, Diagnostics> {
    let mut parser = Parser {
        lexer: Lexer::new(source),
        previous: Token { kind: TokenKind::Eof, lexeme: String::new(), line: 0 },
        current: Token { kind: TokenKind::Eof, lexeme: String::new(), line: 0 },
        diagnostics: Diagnostics::default(),
        panic_mode: false,
        interner: Interner::new(),
        compilers: vec![FunctionCompiler::new(FunctionKind::Script, None)],
        classes: Vec::new(),
        config,
    };
    parser.advance();
    while !parser.matches(TokenKind::Eof) {
        parser.declaration();
    }
    let (function, _) = parser.end_compiler();
    if parser.diagnostics.has_errors() {
        Err(parser.diagnostics)
    } else {
        Ok(Rc::new(function))
    }
}

impl<'a> Parser<'a> {
    // ---- token stream -----------------------------------------------

    fn advance(&mut self) {
        std::mem::swap(&mut self.previous, &mut self.current);
        loop {
            self.current = self.lexer.next_token();
            if !self.current.is_error() {
                break;
            }
            let message = self.current.lexeme.clone();
            let line = self.current.line;
            self.error_raw(ErrorCode::LexInvalidCharacter, line, message, None);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, code: ErrorCode, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(code, message);
    }

    // ---- diagnostics --------------------------------------------------

    fn error_at_current(&mut self, code: ErrorCode, message: &str) {
        let line = self.current.line;
        let lexeme = self.current.lexeme.clone();
        self.error_raw(code, line, message.to_string(), Some(lexeme));
    }

    fn error_at_previous(&mut self, code: ErrorCode, message: &str) {
        let line = self.previous.line;
        let lexeme = self.previous.lexeme.clone();
        self.error_raw(code, line, message.to_string(), Some(lexeme));
    }

    fn error_raw(&mut self, code: ErrorCode, line: u32, message: String, at: Option<String>) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let mut err = CompileError::new(code, line, message);
        if let Some(lexeme) = at {
            err = err.at(lexeme);
        }
        self.diagnostics.errors.push(err);
    }

    /// Discards tokens until a statement boundary, so one syntax error
    /// doesn't cascade into dozens of spurious follow-on errors.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            use TokenKind::*;
            match self.current.kind {
                Class | Fn | Var | Let | For | If | While | Print | Return | Switch | Use => return,
                _ => self.advance(),
            }
        }
    }

    // ---- emission -------------------------------------------------

    fn current_fc(&mut self) -> &mut FunctionCompiler {
        self.compilers.last_mut().expect("at least the script compiler is always present")
    }

    fn emit(&mut self, op: Op) -> usize {
        let line = self.previous.line;
        self.current_fc().chunk.push_op(op, line)
    }

    fn emit_return(&mut self) {
        let kind = self.current_fc().kind;
        if kind == FunctionKind::Initializer {
            self.emit(Op::GetLocal(0));
        } else {
            self.emit(Op::Nil);
        }
        self.emit(Op::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.current_fc().chunk.add_const(value) {
            Ok(idx) => idx,
            Err(_) => {
                self.error_at_previous(ErrorCode::TooManyConstants, "too many constants in one chunk");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit(Op::Constant(idx));
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let interned = self.interner.intern(name);
        self.make_constant(Value::String(interned))
    }

    fn emit_jump(&mut self, placeholder: Op) -> usize {
        self.emit(placeholder)
    }

    fn patch_jump(&mut self, offset: usize) {
        let chunk = &mut self.current_fc().chunk;
        let target = chunk.len() as i32;
        let from = offset as i32 + 1;
        let delta = target - from;
        if delta > i32::from(u16::MAX) {
            self.error_at_previous(ErrorCode::JumpTooLarge, "jump too large");
            return;
        }
        match &mut chunk.code[offset] {
            Op::Jump(o) | Op::JumpIfFalse(o) | Op::ForIterator(o) => *o = delta,
            _ => unreachable!("patch_jump called on a non-jump instruction"),
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let chunk = &mut self.current_fc().chunk;
        let here = chunk.len() as i32;
        let delta = here - loop_start as i32;
        if delta > i32::from(u16::MAX) {
            self.error_at_previous(ErrorCode::LoopBodyTooLarge, "loop body too large");
            return;
        }
        self.emit(Op::Loop(-(delta + 1)));
    }

    // ---- scopes, locals, upvalues -----------------------------------

    fn begin_scope(&mut self) {
        self.current_fc().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_fc().scope_depth -= 1;
        let depth = self.current_fc().scope_depth;
        loop {
            let top_is_captured = match self.current_fc().locals.last() {
                Some(local) if local.depth > depth => local.is_captured,
                _ => break,
            };
            if top_is_captured {
                self.emit(Op::CloseUpvalue);
            } else {
                self.emit(Op::Pop);
            }
            self.current_fc().locals.pop();
        }
    }

    fn declare_variable(&mut self, name: &str) {
        let scope_depth = self.current_fc().scope_depth;
        if scope_depth == 0 {
            return;
        }
        let collides = {
            let fc = self.current_fc();
            let mut found = false;
            for local in fc.locals.iter().rev() {
                if local.depth != -1 && local.depth < scope_depth {
                    break;
                }
                if local.name == name {
                    found = true;
                    break;
                }
            }
            found
        };
        if collides {
            self.error_at_previous(ErrorCode::VariableRedeclaration, "variable already declared in this scope");
            return;
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: &str) {
        let fc = self.current_fc();
        if fc.locals.len() >= self.config.max_locals {
            self.error_at_previous(ErrorCode::TooManyLocals, "too many local variables in function");
            return;
        }
        self.current_fc().locals.push(Local { name: name.to_string(), depth: -1, is_captured: false });
    }

    fn mark_initialized(&mut self) {
        let fc = self.current_fc();
        if fc.scope_depth == 0 {
            return;
        }
        let depth = fc.scope_depth;
        if let Some(local) = fc.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn resolve_local(&mut self, compiler_idx: usize, name: &str) -> Option<u8> {
        let found = {
            let fc = &self.compilers[compiler_idx];
            fc.locals.iter().enumerate().rev().find(|(_, l)| l.name == name).map(|(i, l)| (i as u8, l.depth))
        };
        let (slot, depth) = found?;
        if depth == -1 {
            self.error_at_previous(ErrorCode::LocalResolverError, "can't read local variable in its own initializer");
        }
        Some(slot)
    }

    fn resolve_upvalue(&mut self, compiler_idx: usize, name: &str) -> Option<u8> {
        if compiler_idx == 0 {
            return None;
        }
        let enclosing_idx = compiler_idx - 1;
        if let Some(local_idx) = self.resolve_local(enclosing_idx, name) {
            self.compilers[enclosing_idx].locals[local_idx as usize].is_captured = true;
            return Some(self.add_upvalue(compiler_idx, local_idx, true));
        }
        if let Some(up_idx) = self.resolve_upvalue(enclosing_idx, name) {
            return Some(self.add_upvalue(compiler_idx, up_idx, false));
        }
        None
    }

    fn add_upvalue(&mut self, compiler_idx: usize, index: u8, is_local: bool) -> u8 {
        let fc = &mut self.compilers[compiler_idx];
        for (i, up) in fc.upvalues.iter().enumerate() {
            if up.index == index && up.is_local == is_local {
                return i as u8;
            }
        }
        if fc.upvalues.len() >= self.config.max_upvalues {
            self.error_at_previous(ErrorCode::TooManyClosures, "too many closure variables in function");
            return 0;
        }
        fc.upvalues.push(UpvalueDesc { index, is_local });
        (fc.upvalues.len() - 1) as u8
    }

    /// Pops the current [`FunctionCompiler`], returning the finished
    /// [`Function`] alongside the upvalue descriptors the *enclosing*
    /// compiler needs to emit `Op::Closure` — the descriptors live on
    /// the child compiler and would otherwise be dropped with it.
    fn end_compiler(&mut self) -> (Function, Vec<UpvalueDesc>) {
        self.emit_return();
        let fc = self.compilers.pop().expect("compiler stack must not be empty");
        let function = Function { arity: fc.arity, upvalue_count: fc.upvalues.len() as u8, chunk: fc.chunk, name: fc.name };
        (function, fc.upvalues)
    }

    // ---- declarations -------------------------------------------------

    fn declaration(&mut self) {
        if self.matches(TokenKind::Class) {
            self.class_declaration();
        } else if self.matches(TokenKind::Fn) {
            self.fun_declaration();
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else if self.matches(TokenKind::Let) {
            self.let_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn parse_variable(&mut self, code: ErrorCode, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, code, message);
        let name = self.previous.lexeme.clone();
        self.declare_variable(&name);
        if self.current_fc().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(&name)
    }

    fn define_variable(&mut self, global: u8) {
        if self.current_fc().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit(Op::DefineGlobal(global));
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable(ErrorCode::ExpectedIdentifier, "expected variable name");
        if self.matches(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit(Op::Nil);
        }
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after variable declaration");
        self.define_variable(global);
    }

    /// `let` differs from `var` only by an optional `: Type` annotation,
    /// which the spec leaves unresolved (see open question "defer /
    /// let-type annotations"): the compiler parses and discards it,
    /// there is no runtime type check.
    fn let_declaration(&mut self) {
        let global = self.parse_variable(ErrorCode::ExpectedIdentifier, "expected variable name");
        if self.matches(TokenKind::Colon) {
            self.consume(TokenKind::Identifier, ErrorCode::ExpectedIdentifier, "expected type name after ':'");
        }
        self.consume(TokenKind::Equal, ErrorCode::ExpectedExpression, "expected '=' in 'let' binding");
        self.expression();
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after 'let' binding");
        self.define_variable(global);
    }

    fn fun_declaration(&mut self) {
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedIdentifier, "expected function name");
        let name = self.previous.lexeme.clone();
        self.declare_variable(&name);
        if self.current_fc().scope_depth > 0 {
            self.mark_initialized();
        }
        let global = if self.current_fc().scope_depth == 0 { self.identifier_constant(&name) } else { 0 };
        self.function_body(FunctionKind::Function, &name);
        self.define_variable(global);
    }

    fn function_body(&mut self, kind: FunctionKind, name: &str) {
        let interned_name = self.interner.intern(name);
        self.compilers.push(FunctionCompiler::new(kind, Some(interned_name)));
        self.begin_scope();
        self.consume(TokenKind::LeftParen, ErrorCode::ExpectedLParen, "expected '(' after function name");
        if !self.check(TokenKind::RightParen) {
            loop {
                let fc = self.current_fc();
                if fc.arity == 255 {
                    self.error_at_current(ErrorCode::TooManyArgs, "can't have more than 255 parameters");
                } else {
                    self.current_fc().arity += 1;
                }
                let param = self.parse_variable(ErrorCode::ExpectedIdentifier, "expected parameter name");
                self.define_variable(param);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after parameters");
        self.consume(TokenKind::LeftBrace, ErrorCode::ExpectedLBrace, "expected '{' before function body");
        self.block();
        let (function, upvalue_descs) = self.end_compiler();
        let const_idx = self.make_constant(Value::Function(Rc::new(function)));
        self.emit(Op::Closure(const_idx, upvalue_descs));
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedClassName, "expected class name");
        let class_name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&class_name);
        self.declare_variable(&class_name);
        self.emit(Op::Class(name_constant));
        self.define_variable(name_constant);

        self.classes.push(ClassState { has_superclass: false });

        if self.matches(TokenKind::Less) {
            self.consume(TokenKind::Identifier, ErrorCode::ExpectedSuperclassName, "expected superclass name");
            let super_name = self.previous.lexeme.clone();
            if super_name == class_name {
                self.error_at_previous(ErrorCode::SelfInheritance, "a class can't inherit from itself");
            }
            self.variable_named(&super_name, false);
            self.begin_scope();
            self.add_local("super");
            self.mark_initialized();
            self.variable_named(&class_name, false);
            self.emit(Op::Inherit);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        self.variable_named(&class_name, false);
        self.consume(TokenKind::LeftBrace, ErrorCode::ExpectedLBrace, "expected '{' before class body");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, ErrorCode::ExpectedRBrace, "expected '}' after class body");
        self.emit(Op::Pop); // pop the class value pushed for method binding

        if self.classes.last().unwrap().has_superclass {
            self.end_scope();
        }
        self.classes.pop();
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedMethodName, "expected method name");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);
        let kind = if name == "init" { FunctionKind::Initializer } else { FunctionKind::Method };
        self.function_body(kind, &name);
        self.emit(Op::Method(name_constant));
    }

    // ---- statements -----------------------------------------------

    fn statement(&mut self) {
        if self.matches(TokenKind::Print) {
            self.print_statement();
        } else if self.matches(TokenKind::If) {
            self.if_statement();
        } else if self.matches(TokenKind::While) {
            self.while_statement();
        } else if self.matches(TokenKind::For) {
            self.for_statement();
        } else if self.matches(TokenKind::Return) {
            self.return_statement();
        } else if self.matches(TokenKind::Break) {
            self.break_statement();
        } else if self.matches(TokenKind::Continue) {
            self.continue_statement();
        } else if self.matches(TokenKind::Switch) {
            self.switch_statement();
        } else if self.matches(TokenKind::Defer) {
            self.defer_statement();
        } else if self.matches(TokenKind::Use) {
            self.use_statement();
        } else if self.matches(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after value");
        self.emit(Op::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after expression");
        self.emit(Op::Pop);
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, ErrorCode::ExpectedRBrace, "expected '}' after block");
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, ErrorCode::ExpectedLParen, "expected '(' after 'if'");
        self.expression();
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after condition");

        let then_jump = self.emit_jump(Op::JumpIfFalse(0));
        self.emit(Op::Pop);
        self.statement();
        let else_jump = self.emit_jump(Op::Jump(0));
        self.patch_jump(then_jump);
        self.emit(Op::Pop);
        if self.matches(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_fc().chunk.len();
        self.consume(TokenKind::LeftParen, ErrorCode::ExpectedLParen, "expected '(' after 'while'");
        self.expression();
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after condition");

        let exit_jump = self.emit_jump(Op::JumpIfFalse(0));
        self.emit(Op::Pop);
        let depth = self.current_fc().scope_depth;
        self.current_fc().loops.push(LoopCtx { loop_start, scope_depth: depth });
        self.current_fc().breaks.push(BreakCtx { scope_depth: depth, jumps: Vec::new() });
        self.statement();
        self.emit_loop(loop_start);
        self.patch_jump(exit_jump);
        self.emit(Op::Pop);
        self.end_loop();
    }

    /// Desugars both C-style `for (init; cond; incr)` and `for x in expr`
    /// into the loop primitives above plus, for the `in` form, the
    /// iterator opcodes (spec §4.4 `MAKE_ITERATOR` / `FOR_ITERATOR`).
    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, ErrorCode::ExpectedLParen, "expected '(' after 'for'");

        if self.check(TokenKind::Identifier) && self.peek_is_in_after_identifier() {
            self.for_in_statement();
            self.end_scope();
            return;
        }

        if self.matches(TokenKind::Semicolon) {
            // no initializer
        } else if self.matches(TokenKind::Var) {
            self.var_declaration();
        } else if self.matches(TokenKind::Let) {
            self.let_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_fc().chunk.len();
        let mut exit_jump = None;
        if !self.matches(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after loop condition");
            exit_jump = Some(self.emit_jump(Op::JumpIfFalse(0)));
            self.emit(Op::Pop);
        }

        if !self.check(TokenKind::RightParen) {
            let body_jump = self.emit_jump(Op::Jump(0));
            let increment_start = self.current_fc().chunk.len();
            self.expression();
            self.emit(Op::Pop);
            self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after for clauses");
            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        } else {
            self.advance();
        }

        let depth = self.current_fc().scope_depth;
        self.current_fc().loops.push(LoopCtx { loop_start, scope_depth: depth });
        self.current_fc().breaks.push(BreakCtx { scope_depth: depth, jumps: Vec::new() });
        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit(Op::Pop);
        }
        self.end_loop();
        self.end_scope();
    }

    /// Lookahead used only to distinguish `for (IDENT in ...)` from the
    /// C-style form; the lexer has no token pushback so this clones a
    /// throwaway lexer over the remaining source instead.
    fn peek_is_in_after_identifier(&self) -> bool {
        let mut probe = self.lexer.clone_for_lookahead();
        let t = probe.next_token();
        t.kind == TokenKind::In
    }

    /// `for x in expr { ... }`. The iterable's value becomes a hidden
    /// local holding the [`crate::value::IteratorObj`] (spec §4.4
    /// `MAKE_ITERATOR`); each pass, `ForIterator` peeks it, either
    /// pushing the next element or jumping past the loop when
    /// exhausted (spec §9 fix: ascending, runtime-bound, not the
    /// hardcoded-10 list the defect produced).
    fn for_in_statement(&mut self) {
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedIdentifier, "expected loop variable name");
        let var_name = self.previous.lexeme.clone();
        self.consume(TokenKind::In, ErrorCode::ExpectedIn, "expected 'in' after for-loop variable");
        self.expression();
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after for-in clause");
        self.emit(Op::MakeIterator);
        self.add_local("@iter");
        self.mark_initialized();

        // break/continue unwind to here: past the per-iteration loop
        // variable, but with the iterator itself still on the stack.
        let break_target_depth = self.current_fc().scope_depth;

        let loop_start = self.current_fc().chunk.len();
        let exit_jump = self.emit_jump(Op::ForIterator(0));

        self.begin_scope();
        self.declare_variable(&var_name);
        self.add_local(&var_name);
        self.mark_initialized();

        self.current_fc().loops.push(LoopCtx { loop_start, scope_depth: break_target_depth });
        self.current_fc().breaks.push(BreakCtx { scope_depth: break_target_depth, jumps: Vec::new() });
        self.statement();
        self.end_scope();
        self.emit_loop(loop_start);
        self.patch_jump(exit_jump);
        self.end_loop();
    }

    fn end_loop(&mut self) {
        self.current_fc().loops.pop();
        self.end_breaks();
    }

    /// Pops the innermost break target (loop or `switch`) and patches
    /// every `break` jump recorded against it to land here.
    fn end_breaks(&mut self) {
        let ctx = self.current_fc().breaks.pop().expect("end_breaks called with no matching push");
        for jump in ctx.jumps {
            self.patch_jump(jump);
        }
    }

    fn return_statement(&mut self) {
        if self.current_fc().kind == FunctionKind::Script {
            self.error_at_previous(ErrorCode::UnexpectedReturn, "can't return from top-level code");
        }
        if self.matches(TokenKind::Semicolon) {
            self.emit_return();
            return;
        }
        if self.current_fc().kind == FunctionKind::Initializer {
            self.error_at_previous(ErrorCode::UnexpectedReturn, "can't return a value from an initializer");
        }
        self.expression();
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after return value");
        self.emit(Op::Return);
    }

    fn break_statement(&mut self) {
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after 'break'");
        if self.current_fc().breaks.is_empty() {
            self.error_at_previous(ErrorCode::UnexpectedBreak, "'break' outside a loop or switch");
            return;
        }
        let target_depth = self.current_fc().breaks.last().unwrap().scope_depth;
        self.pop_locals_above(target_depth);
        let jump = self.emit_jump(Op::Jump(0));
        self.current_fc().breaks.last_mut().unwrap().jumps.push(jump);
    }

    fn continue_statement(&mut self) {
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after 'continue'");
        if self.current_fc().loops.is_empty() {
            self.error_at_previous(ErrorCode::UnexpectedContinue, "'continue' outside a loop");
            return;
        }
        let (loop_start, target_depth) = {
            let l = self.current_fc().loops.last().unwrap();
            (l.loop_start, l.scope_depth)
        };
        self.pop_locals_above(target_depth);
        self.emit_loop(loop_start);
    }

    fn pop_locals_above(&mut self, depth: i32) {
        let count = self.current_fc().locals.iter().filter(|l| l.depth > depth).count();
        for _ in 0..count {
            self.emit(Op::Pop);
        }
    }

    fn switch_statement(&mut self) {
        self.consume(TokenKind::LeftParen, ErrorCode::ExpectedLParen, "expected '(' after 'switch'");
        self.expression();
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after switch value");
        self.consume(TokenKind::LeftBrace, ErrorCode::ExpectedLBrace, "expected '{' before switch body");

        // `depth` is the scope *outside* the switch: a `break` from a
        // case body must unwind every local the switch's own scope
        // holds, including ones declared directly in a case (there is
        // no per-case sub-scope — cases share one block like C's).
        let depth = self.current_fc().scope_depth;
        self.begin_scope();
        self.current_fc().breaks.push(BreakCtx { scope_depth: depth, jumps: Vec::new() });

        let mut end_jumps = Vec::new();

        while self.matches(TokenKind::Case) {
            self.emit(Op::Copy);
            self.expression();
            self.consume(TokenKind::Colon, ErrorCode::ExpectedColon, "expected ':' after case value");
            self.emit(Op::Equal);
            let skip = self.emit_jump(Op::JumpIfFalse(0));
            self.emit(Op::Pop);
            while !self.check(TokenKind::Case) && !self.check(TokenKind::Default) && !self.check(TokenKind::RightBrace)
            {
                self.declaration();
            }
            let end_jump = self.emit_jump(Op::Jump(0));
            end_jumps.push(end_jump);
            self.patch_jump(skip);
            self.emit(Op::Pop);
        }

        if self.matches(TokenKind::Default) {
            self.consume(TokenKind::Colon, ErrorCode::ExpectedColon, "expected ':' after 'default'");
            while !self.check(TokenKind::RightBrace) {
                self.declaration();
            }
        }

        self.consume(TokenKind::RightBrace, ErrorCode::ExpectedRBrace, "expected '}' after switch body");
        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.end_breaks();
        self.end_scope();
        self.emit(Op::Pop); // discard the switch subject
    }

    /// `defer expr;` — see spec §9 open question. Resolved as: accepted
    /// by the grammar, compiled to a dedicated opcode, rejected at
    /// runtime (there is no deferred-execution machinery in the VM).
    fn defer_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after 'defer' expression");
        self.emit(Op::Defer);
    }

    /// `use "path";` is resolved textually before compilation even
    /// starts (see the CLI's `use_scan` module) — by the time this
    /// token reaches the compiler the referenced source has already
    /// been prepended. The opcode it emits is a runtime no-op kept for
    /// bytecode compatibility with hand-written chunks.
    fn use_statement(&mut self) {
        self.consume(TokenKind::String, ErrorCode::ExpectedExpression, "expected a module path string after 'use'");
        self.consume(TokenKind::Semicolon, ErrorCode::ExpectedSemicolon, "expected ';' after 'use' directive");
        self.emit(Op::Use);
    }

    // ---- expressions ------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = rule(self.previous.kind).prefix;
        let Some(prefix) = prefix else {
            self.error_at_previous(ErrorCode::ExpectedExpression, "expected expression");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= rule(self.current.kind).precedence {
            self.advance();
            let infix = rule(self.previous.kind).infix.expect("rule table precedence/infix mismatch");
            infix(self, can_assign);
        }

        if can_assign && self.matches(TokenKind::Equal) {
            self.error_at_previous(ErrorCode::InvalidAssignmentTarget, "invalid assignment target");
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(f64::NAN);
        self.emit_constant(Value::Number(value));
    }

    fn string_lit(&mut self, _can_assign: bool) {
        let raw = &self.previous.lexeme;
        let content = &raw[1..raw.len() - 1];
        let interned = self.interner.intern(content);
        self.emit_constant(Value::String(interned));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => {
                self.emit(Op::False);
            }
            TokenKind::True => {
                self.emit(Op::True);
            }
            TokenKind::Nil => {
                self.emit(Op::Nil);
            }
            _ => unreachable!(),
        }
    }

    fn grouping_or_tuple(&mut self, _can_assign: bool) {
        if self.matches(TokenKind::RightParen) {
            self.error_at_previous(ErrorCode::ExpectedExpression, "expected expression");
            return;
        }
        self.expression();
        if self.matches(TokenKind::Comma) {
            let mut count = 1usize;
            if !self.check(TokenKind::RightParen) {
                loop {
                    self.expression();
                    count += 1;
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                    if self.check(TokenKind::RightParen) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after tuple");
            if count > self.config.max_tuple_arity {
                self.error_at_previous(ErrorCode::TupleTooLarge, "tuple has too many elements");
            }
            self.emit(Op::BuildTuple(count as u8));
            return;
        }
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after expression");
    }

    fn unary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match op_kind {
            TokenKind::Minus => self.emit(Op::Negate),
            TokenKind::Bang => self.emit(Op::Not),
            _ => unreachable!(),
        };
    }

    /// `start..end` — the range-list constructor. Infix, per spec.md
    /// §4.2's `Range` precedence tier and `original_source/src/compiler.c`'s
    /// `rangeExpr` (registered only as an infix rule on `TOKEN_DOT_DOT`,
    /// never a prefix one). The left operand is already on the stack by
    /// the time this runs (ordinary Pratt infix discipline); `rangeExpr`
    /// pops it unconditionally and only the right operand feeds the
    /// list — kept bug-for-bug, since nothing in the spec asks for the
    /// start value to do anything.
    ///
    /// spec §9 open question: `GENERATE_LIST`'s hardcoded bound of 10 is
    /// a defect; fixed here to read the runtime-evaluated right operand
    /// instead of a literal 10. The VM still builds
    /// `[n - 1, n - 2, ..., 0]` — see `mt_vm::dispatch::generate_list`
    /// and `DESIGN.md` for why that descending order is kept rather
    /// than "fixed" a second time.
    fn range_list(&mut self, _can_assign: bool) {
        self.emit(Op::Pop);
        self.expression();
        self.emit(Op::GenerateList);
    }

    fn binary(&mut self, _can_assign: bool) {
        let op_kind = self.previous.kind;
        let next_precedence = rule(op_kind).precedence.next();
        // `^` (Pow) is right-associative: re-parse at its own
        // precedence instead of the next tier up.
        let target = if op_kind == TokenKind::Caret { Precedence::Power } else { next_precedence };
        self.parse_precedence(target);
        match op_kind {
            TokenKind::Plus => self.emit(Op::Add),
            TokenKind::Minus => self.emit(Op::Subtract),
            TokenKind::Star => self.emit(Op::Multiply),
            TokenKind::Slash => self.emit(Op::Divide),
            TokenKind::Percent => self.emit(Op::Mod),
            TokenKind::Caret => self.emit(Op::Pow),
            TokenKind::BangEqual => {
                self.emit(Op::Equal);
                self.emit(Op::Not)
            }
            TokenKind::EqualEqual => self.emit(Op::Equal),
            TokenKind::Greater => self.emit(Op::Greater),
            TokenKind::GreaterEqual => {
                self.emit(Op::Less);
                self.emit(Op::Not)
            }
            TokenKind::Less => self.emit(Op::Less),
            TokenKind::LessEqual => {
                self.emit(Op::Greater);
                self.emit(Op::Not)
            }
            _ => unreachable!(),
        };
    }

    fn and(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(Op::JumpIfFalse(0));
        self.emit(Op::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(Op::JumpIfFalse(0));
        let end_jump = self.emit_jump(Op::Jump(0));
        self.patch_jump(else_jump);
        self.emit(Op::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    /// `cond ? then : else` — a mini if-expression producing a value
    /// (spec §4.2). Both branches must leave exactly one value on the
    /// stack; the false branch recurses at `Conditional` again so
    /// chained ternaries (`a ? b : c ? d : e`) associate to the right.
    fn conditional(&mut self, _can_assign: bool) {
        let then_jump = self.emit_jump(Op::JumpIfFalse(0));
        self.emit(Op::Pop);
        self.expression();
        self.consume(TokenKind::Colon, ErrorCode::ExpectedColon, "expected ':' in conditional expression");
        let else_jump = self.emit_jump(Op::Jump(0));
        self.patch_jump(then_jump);
        self.emit(Op::Pop);
        self.parse_precedence(Precedence::Conditional);
        self.patch_jump(else_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit(Op::Call(argc));
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc = 0u8;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if argc as usize == self.config.max_call_args {
                    self.error_at_previous(ErrorCode::TooManyArgs, "can't have more than 255 arguments");
                } else {
                    argc += 1;
                }
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after arguments");
        argc
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedPropertyName, "expected property name after '.'");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            self.emit(Op::SetProperty(name_constant));
        } else if can_assign && self.match_compound_assign() {
            let compound_op = self.compound_op_from_previous();
            self.emit(Op::Copy);
            self.emit(Op::GetProperty(name_constant));
            self.expression();
            self.emit(compound_op);
            self.emit(Op::SetProperty(name_constant));
        } else if self.matches(TokenKind::LeftParen) {
            let argc = self.argument_list();
            self.emit(Op::Invoke(name_constant, argc));
        } else {
            self.emit(Op::GetProperty(name_constant));
        }
    }

    fn index(&mut self, can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightBracket, ErrorCode::ExpectedRBracket, "expected ']' after index");

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            self.emit(Op::IndexSet);
        } else if can_assign && self.match_compound_assign() {
            let compound_op = self.compound_op_from_previous();
            // stack: receiver, index -> duplicate both, read, combine, write
            self.emit(Op::Copy);
            self.emit(Op::IndexGet);
            self.expression();
            self.emit(compound_op);
            self.emit(Op::IndexSet);
        } else {
            self.emit(Op::IndexGet);
        }
    }

    fn postfix_incr(&mut self, _can_assign: bool) {
        self.emit(Op::Incr);
    }

    fn list_literal(&mut self, _can_assign: bool) {
        let mut count = 0u8;
        if !self.check(TokenKind::RightBracket) {
            loop {
                self.expression();
                count = count.saturating_add(1);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
                if self.check(TokenKind::RightBracket) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, ErrorCode::ExpectedRBracket, "expected ']' after list elements");
        if count as usize >= 255 {
            self.error_at_previous(ErrorCode::ListTooLarge, "list literal has too many elements");
        }
        self.emit(Op::BuildList(count));
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.clone();
        self.named_variable(&name, can_assign);
    }

    fn variable_named(&mut self, name: &str, can_assign: bool) {
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let compiler_idx = self.compilers.len() - 1;
        let (get_op, set_op): (Op, fn(u8) -> Op) = if let Some(slot) = self.resolve_local(compiler_idx, name) {
            (Op::GetLocal(slot), Op::SetLocal)
        } else if let Some(slot) = self.resolve_upvalue(compiler_idx, name) {
            (Op::GetUpvalue(slot), Op::SetUpvalue)
        } else {
            let constant = self.identifier_constant(name);
            (Op::GetGlobal(constant), Op::SetGlobal)
        };

        if can_assign && self.matches(TokenKind::Equal) {
            self.expression();
            let slot = set_op_operand(&get_op);
            self.emit(set_op(slot));
        } else if can_assign && self.match_compound_assign() {
            let compound_op = self.compound_op_from_previous();
            self.emit(get_op.clone());
            self.expression();
            self.emit(compound_op);
            let slot = set_op_operand(&get_op);
            self.emit(set_op(slot));
        } else {
            self.emit(get_op);
        }
    }

    fn match_compound_assign(&mut self) -> bool {
        use TokenKind::*;
        matches!(
            self.current.kind,
            PlusEqual | MinusEqual | StarEqual | SlashEqual | CaretEqual | PercentEqual
        ) && {
            self.advance();
            true
        }
    }

    fn compound_op_from_previous(&self) -> Op {
        use TokenKind::*;
        match self.previous.kind {
            PlusEqual => Op::Add,
            MinusEqual => Op::Subtract,
            StarEqual => Op::Multiply,
            SlashEqual => Op::Divide,
            CaretEqual => Op::Pow,
            PercentEqual => Op::Mod,
            _ => unreachable!("match_compound_assign guarantees a compound-assign token"),
        }
    }

    fn this(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error_at_previous(ErrorCode::ReservedKeyword, "can't use 'this' outside a class method");
        }
        self.named_variable("this", false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error_at_previous(ErrorCode::SuperNotAllowed, "can't use 'super' outside a class");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error_at_previous(ErrorCode::SuperNotAllowed, "can't use 'super' in a class with no superclass");
        }
        self.consume(TokenKind::Dot, ErrorCode::ExpectedDot, "expected '.' after 'super'");
        self.consume(TokenKind::Identifier, ErrorCode::ExpectedPropertyName, "expected superclass method name");
        let name = self.previous.lexeme.clone();
        let name_constant = self.identifier_constant(&name);

        let compiler_idx = self.compilers.len() - 1;
        self.named_variable("this", false);
        if self.matches(TokenKind::LeftParen) {
            let argc = self.argument_list();
            let super_slot = self.resolve_upvalue(compiler_idx, "super").or_else(|| self.resolve_local(compiler_idx, "super"));
            self.emit_super_get(super_slot);
            self.emit(Op::SuperInvoke(name_constant, argc));
        } else {
            let super_slot = self.resolve_upvalue(compiler_idx, "super").or_else(|| self.resolve_local(compiler_idx, "super"));
            self.emit_super_get(super_slot);
            self.emit(Op::GetSuper(name_constant));
        }
    }

    fn emit_super_get(&mut self, slot: Option<u8>) {
        match slot {
            Some(s) => {
                self.emit(Op::GetLocal(s));
            }
            None => {
                self.emit(Op::Nil);
            }
        }
    }

    /// `\x -> expr` or `\(x, y) -> expr`: an anonymous function whose
    /// body is a single expression, implicitly returned.
    fn lambda(&mut self, _can_assign: bool) {
        self.compilers.push(FunctionCompiler::new(FunctionKind::Function, None));
        self.begin_scope();

        if self.matches(TokenKind::LeftParen) {
            if !self.check(TokenKind::RightParen) {
                loop {
                    let fc = self.current_fc();
                    if fc.arity == 255 {
                        self.error_at_current(ErrorCode::TooManyArgs, "can't have more than 255 parameters");
                    } else {
                        self.current_fc().arity += 1;
                    }
                    let param = self.parse_variable(ErrorCode::ExpectedIdentifier, "expected parameter name");
                    self.define_variable(param);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightParen, ErrorCode::ExpectedRParen, "expected ')' after lambda parameters");
        } else {
            let fc = self.current_fc();
            if fc.arity == 255 {
                self.error_at_current(ErrorCode::TooManyArgs, "can't have more than 255 parameters");
            } else {
                self.current_fc().arity += 1;
            }
            let param = self.parse_variable(ErrorCode::ExpectedIdentifier, "expected parameter name");
            self.define_variable(param);
        }

        self.consume(TokenKind::Arrow, ErrorCode::ExpectedArrow, "expected '->' after lambda parameters");
        self.expression();
        self.emit(Op::Return);

        let (function, upvalue_descs) = self.end_compiler();
        let const_idx = self.make_constant(Value::Function(Rc::new(function)));
        self.emit(Op::Closure(const_idx, upvalue_descs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_trivial_script() {
        let result = compile("print 1 + 2;");
        assert!(result.is_ok());
    }

    #[test]
    fn reports_lex_and_compile_errors_without_stopping() {
        let result = compile("var x = 1 +; var y = ;");
        let diags = result.expect_err("malformed source must fail to compile");
        assert!(diags.has_errors());
        assert!(diags.errors.len() >= 2, "panic-mode recovery should surface more than one diagnostic");
    }

    #[test]
    fn rejects_return_outside_function() {
        let diags = compile("return 1;").unwrap_err();
        assert!(diags.errors.iter().any(|e| e.code == ErrorCode::UnexpectedReturn));
    }

    #[test]
    fn rejects_break_outside_loop() {
        let diags = compile("break;").unwrap_err();
        assert!(diags.errors.iter().any(|e| e.code == ErrorCode::UnexpectedBreak));
    }

    #[test]
    fn compiles_closures_and_classes() {
        let src = r#"
            class Greeter {
                init(name) {
                    this.name = name;
                }
                greet() {
                    print "hi " + this.name;
                }
            }
            var g = Greeter("world");
            g.greet();
        "#;
        assert!(compile(src).is_ok());
    }
}
