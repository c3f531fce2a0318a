//! Compile-time tunables, mirroring the teacher workspace's
//! `compiler::config::Config` (a plain struct with `Default` plus an
//! env-overridable constructor) rather than hardcoding the spec's
//! limits as literals scattered through `mod.rs`.

use std::env;

/// Per-table capacity limits the compiler enforces while emitting.
/// The numeric defaults come straight from spec §3 invariant 4 / §8
/// ("256 constants", "256 locals", "256 upvalues", "tuple arity 255").
#[derive(Debug, Clone, Copy)]
pub struct CompileConfig {
    pub max_locals: usize,
    pub max_upvalues: usize,
    pub max_constants: usize,
    pub max_call_args: usize,
    pub max_tuple_arity: usize,
    /// Emits a `tracing::trace!` line per opcode as it's pushed to the
    /// chunk. Off by default; `MT_COMPILER_TRACE_EMIT=1` turns it on.
    pub trace_emit: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            max_locals: 256,
            max_upvalues: 256,
            max_constants: 256,
            max_call_args: 255,
            max_tuple_arity: 255,
            trace_emit: false,
        }
    }
}

impl CompileConfig {
    /// Applies `MT_COMPILER_*` overrides on top of [`CompileConfig::default`],
    /// matching the teacher's `Config::from_env` convention. Malformed
    /// values are ignored rather than rejected — this is a developer
    /// knob, not user-facing configuration.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("MT_COMPILER_MAX_LOCALS") {
            cfg.max_locals = v;
        }
        if let Some(v) = env_usize("MT_COMPILER_MAX_UPVALUES") {
            cfg.max_upvalues = v;
        }
        if let Some(v) = env_usize("MT_COMPILER_MAX_CONSTANTS") {
            cfg.max_constants = v;
        }
        if let Some(v) = env_usize("MT_COMPILER_MAX_CALL_ARGS") {
            cfg.max_call_args = v;
        }
        if let Some(v) = env_usize("MT_COMPILER_MAX_TUPLE_ARITY") {
            cfg.max_tuple_arity = v;
        }
        cfg.trace_emit = env::var("MT_COMPILER_TRACE_EMIT").is_ok_and(|v| v == "1");
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
