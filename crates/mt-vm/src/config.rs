//! Runtime-time tunables, mirroring `mt_core::compiler::config::CompileConfig`
//! (a plain struct with `Default` plus an env-overridable constructor).

use std::env;

/// Call-stack and value-stack capacity limits the VM enforces while
/// running. Defaults come from spec §3 invariant 4 ("FRAMES_MAX =
/// 1024", "STACK_MAX = FRAMES_MAX * 256").
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub frames_max: usize,
    pub stack_max: usize,
    /// Emits a `tracing::trace!` line per executed opcode. Off by
    /// default; `MT_VM_TRACE_EXEC=1` turns it on (the teacher's
    /// `--trace` flag, but via env so it also works through the REPL).
    pub trace_exec: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        let frames_max = 1024;
        Self { frames_max, stack_max: frames_max * 256, trace_exec: false }
    }
}

impl VmConfig {
    /// Applies `MT_VM_*` overrides on top of [`VmConfig::default`].
    /// Malformed values are ignored rather than rejected — this is a
    /// developer knob, not user-facing configuration.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_usize("MT_VM_FRAMES_MAX") {
            cfg.frames_max = v;
            cfg.stack_max = v * 256;
        }
        if let Some(v) = env_usize("MT_VM_STACK_MAX") {
            cfg.stack_max = v;
        }
        cfg.trace_exec = env::var("MT_VM_TRACE_EXEC").is_ok_and(|v| v == "1");
        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
