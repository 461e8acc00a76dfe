//! Architecture-independent context switching (spec.md §4.A/§4.B),
//! redesigned per spec.md §9: rather than probing an opaque `jmp_buf`
//! layout at startup, each supported architecture defines its own
//! `Context` with a known, `#[repr(C)]` field layout, and a matched pair
//! of hand-written assembly primitives:
//!
//! - `capture(ctx)` saves the callee-saved registers and stack pointer of
//!   the *calling* point into `ctx` and returns normally, exactly like
//!   `setjmp`.
//! - `restore(ctx)` loads registers from `ctx` and resumes there — either
//!   a point previously saved by `capture`, or a context fabricated by
//!   `Context::for_task`, whose saved "return" is the task trampoline.
//!   Like `longjmp`, it never returns to its caller.
//!
//! A full symmetric transfer (spec.md §4.E) is just `capture(&mut old)`
//! immediately followed by `restore(&new)`; a handler install/raise
//! (spec.md §4.F) uses the same two primitives on a single task's own
//! stack, which is exactly the non-local-jump relationship `setjmp`/
//! `longjmp` have to each other. One pair of primitives covers both
//! components, which is why spec.md §4.A/§4.B collapse into this single
//! module (see SPEC_FULL.md §4.A/B and §9 for the rationale).
//!
//! There is deliberately no frame-copy/rebase step: a task's initial
//! context is built directly against the stack we just allocated for it
//! (`Context::for_task`), so there is nothing to transplant from one
//! stack region to another afterward.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use x86_64::Context;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use aarch64::Context;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!(
    "symtask supports only x86_64 and aarch64: spec.md §9 asks for an \
     explicit supported-platform list rather than a generic probed fallback"
);

#[cfg(not(unix))]
compile_error!("symtask's stack allocator requires mmap/mprotect (unix)");

use crate::error::TaskError;

/// One-shot startup validation (the remaining role of spec.md's Context
/// Probe, §4.A): confirm we're on a supported target. Page size and stack
/// size constants are derived separately in `crate::stack`, since they
/// depend on the allocator, not on context layout.
pub fn validate_supported() -> Result<(), TaskError> {
    // The compile_error! guards above already rule out unsupported
    // targets at build time; this runtime check exists for parity with
    // spec.md's "abort initialization with a fatal error" contract, and
    // as the one place future architectures get added without silently
    // becoming "supported" by falling through a cfg guard.
    if cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) && cfg!(unix) {
        Ok(())
    } else {
        Err(TaskError::UnsupportedArchitecture)
    }
}

/// Save the current callee-saved register state and stack pointer into
/// `ctx`, then return `false` — like `setjmp` returning `0`. If another
/// call later resumes this exact point via `restore`, this same call
/// appears to return a second time, with `true` — like `setjmp`
/// returning nonzero after a matching `longjmp`.
///
/// # Safety
/// `ctx` must be valid for writes for the lifetime of the `Context`.
#[inline(always)]
pub unsafe fn capture(ctx: *mut Context) -> bool {
    unsafe { Context::capture(ctx) }
}

/// Load register state from `ctx` and resume there. Never returns.
///
/// # Safety
/// `ctx` must have been produced by `capture` or `Context::for_task`, and
/// must describe a context that is safe to resume (its stack must still
/// be live).
#[inline(always)]
pub unsafe fn restore(ctx: *const Context) -> ! {
    unsafe { Context::restore(ctx) }
}
