use std::arch::naked_asm;

/// Saved machine context for x86_64 (System V ABI).
///
/// Only the callee-saved registers and the stack pointer are kept — SysV
/// has no callee-saved XMM registers, so there is nothing else to save.
/// `sp` doubles as the return address carrier: at the point `capture` is
/// called, `[rsp]` already holds the address `restore` should resume at,
/// so there is no separate "ra" field the way the teacher's riscv64
/// `TaskContext` needs one.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Context {
    sp: u64,
    rbx: u64,
    rbp: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl Context {
    /// Build a context that, when resumed, starts executing `trampoline`
    /// on a fresh stack ending at `stack_top`.
    ///
    /// `stack_top` must be 16-byte aligned (the allocator in
    /// `crate::stack` guarantees this). We push `trampoline`'s address
    /// onto the new stack ourselves, since `restore` resumes via a plain
    /// `ret`, the same mechanism it uses to resume a previously captured
    /// point. `restore_raw`'s `ret` pops that word and leaves `rsp = sp +
    /// 8`; the SysV ABI requires `rsp ≡ 8 (mod 16)` at a function's entry
    /// (i.e. `rsp + 8` a multiple of 16), so the pushed word must sit at
    /// `top - 16`, not `top - 8` — reserving only one word would leave
    /// `trampoline` entered 8 bytes short of the required alignment.
    pub fn for_task(stack_top: *mut u8, trampoline: unsafe extern "C" fn() -> !) -> Self {
        let top = (stack_top as usize) & !0xf;
        let sp = top - 16;
        // Safety: `top` is within the bounds of the stack this context
        // will run on, and nothing else uses that memory yet.
        unsafe {
            (sp as *mut u64).write(trampoline as usize as u64);
        }
        Context {
            sp: sp as u64,
            rbx: 0,
            rbp: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }

    /// # Safety
    /// See `context::capture`.
    #[inline(always)]
    pub unsafe fn capture(ctx: *mut Context) -> bool {
        unsafe { capture_raw(ctx) }
    }

    /// # Safety
    /// See `context::restore`.
    #[inline(always)]
    pub unsafe fn restore(ctx: *const Context) -> ! {
        unsafe { restore_raw(ctx) }
    }
}

/// Save `rsp` and the callee-saved registers into `*ctx` (passed in
/// `rdi`), then return `false` — the `setjmp` half of the pair.
#[unsafe(naked)]
unsafe extern "C" fn capture_raw(_ctx: *mut Context) -> bool {
    naked_asm!(
        "mov [rdi + 0],  rsp",
        "mov [rdi + 8],  rbx",
        "mov [rdi + 16], rbp",
        "mov [rdi + 24], r12",
        "mov [rdi + 32], r13",
        "mov [rdi + 40], r14",
        "mov [rdi + 48], r15",
        "xor eax, eax",
        "ret",
    )
}

/// Load `rsp` and the callee-saved registers from `*ctx` (passed in
/// `rdi`), set the return-value register to `true`, then `ret` into
/// whatever address is now on top of the new stack — the `longjmp` half
/// of the pair. If that address is a previous `capture_raw` call site,
/// this is what makes it "return" `true` the second time. Never returns
/// to its own caller.
#[unsafe(naked)]
unsafe extern "C" fn restore_raw(_ctx: *const Context) -> ! {
    naked_asm!(
        "mov rsp, [rdi + 0]",
        "mov rbx, [rdi + 8]",
        "mov rbp, [rdi + 16]",
        "mov r12, [rdi + 24]",
        "mov r13, [rdi + 32]",
        "mov r14, [rdi + 40]",
        "mov r15, [rdi + 48]",
        "mov eax, 1",
        "ret",
    )
}
