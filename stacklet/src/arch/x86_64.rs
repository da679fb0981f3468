//! Stack switching for x86-64, using the System V calling convention.
//!
//! The register block is laid out as follows, from the lowest address to the
//! highest:
//!
//!     +-----------------+ <- stack pointer handed to the save callback
//!     | unaligned rsp   |
//!     | rbx             |
//!     | rbp             |
//!     | r12             |
//!     | r13             |
//!     | r14             |
//!     | r15             |
//!     | MXCSR, x87 CW   |
//!     +-----------------+ <- unaligned rsp rounded down to 16 bytes
//!
//! The unaligned stack pointer points to the return address pushed by the
//! caller of `stacklet_switch`.
use crate::arch::{align_down, write_words, Arch, EntryFn, RestoreFn, SaveFn};
use std::arch::asm;

extern "C" {
    fn stacklet_switch(
        save: SaveFn,
        restore: RestoreFn,
        extra: *mut u8,
    ) -> *mut u8;

    fn stacklet_trampoline();
}

asm_func!(
    "stacklet_switch",
    // Align the stack, then save the floating point control words and the
    // callee saved registers.
    "mov rax, rsp\n",
    "and rsp, -16\n",
    "sub rsp, 8\n",
    "stmxcsr dword ptr [rsp]\n",
    "fnstcw word ptr [rsp + 4]\n",
    "push r15\n",
    "push r14\n",
    "push r13\n",
    "push r12\n",
    "push rbp\n",
    "push rbx\n",
    "push rax\n",
    // rbx and r12 are saved at this point, so we use them to keep the restore
    // function and extra argument around while calling the save function.
    "mov rbx, rsi\n",
    "mov r12, rdx\n",
    "mov rax, rdi\n",
    "mov rdi, rsp\n",
    "mov rsi, r12\n",
    "call rax\n",
    "test rax, rax\n",
    "jz .Lstacklet_switch_done\n",
    // The stack pointer now points to the new stack, but its contents are yet
    // to be restored by the restore function.
    "mov rsp, rax\n",
    "mov rdi, rax\n",
    "mov rsi, r12\n",
    "call rbx\n",
    ".Lstacklet_switch_done:\n",
    "pop rcx\n",
    "pop rbx\n",
    "pop rbp\n",
    "pop r12\n",
    "pop r13\n",
    "pop r14\n",
    "pop r15\n",
    "ldmxcsr dword ptr [rsp]\n",
    "fldcw word ptr [rsp + 4]\n",
    "mov rsp, rcx\n",
    "ret\n",
);

// The first switch to a stack produced by `initial_stack()` returns here, with
// the entry function in rbx and its argument in r12.
asm_func!(
    "stacklet_trampoline",
    "mov rdi, rax\n",
    "mov rsi, r12\n",
    "call rbx\n",
    "ud2\n",
);

/// The default MXCSR (low 32 bits) and x87 control word (bits 32 to 47).
const FLOAT_CONTROL: usize = 0x1F80 | (0x037F << 32);

/// The instruction set used by 64 bits x86 processors.
pub struct X86_64;

impl Arch for X86_64 {
    const ALIGNMENT: usize = 16;
    const BLOCK_SIZE: usize = 64;

    // The return address of the trampoline, and the two words above it.
    const FRAME_SIZE: usize = Self::BLOCK_SIZE + 32;

    #[inline(always)]
    unsafe fn switch(
        save: SaveFn,
        restore: RestoreFn,
        extra: *mut u8,
    ) -> *mut u8 {
        stacklet_switch(save, restore, extra)
    }

    unsafe fn initial_stack(
        top: *mut u8,
        entry: EntryFn,
        arg: *mut u8,
    ) -> *mut u8 {
        let top = align_down(top, Self::ALIGNMENT);

        // The trampoline is entered using `ret`, meaning the stack pointer is
        // 16 byte aligned when it calls the entry function. The two words
        // above it are left as zero so stack walkers stop there.
        let ret = top.sub(24);

        write_words(ret, &[stacklet_trampoline as usize, 0, 0]);

        let sp = top.sub(Self::FRAME_SIZE);

        write_words(
            sp,
            &[
                ret as usize,
                entry as usize,
                0,
                arg as usize,
                0,
                0,
                0,
                FLOAT_CONTROL,
            ],
        );

        sp
    }

    #[inline(always)]
    fn stack_pointer() -> *mut u8 {
        let sp: *mut u8;

        unsafe {
            asm!("mov {}, rsp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }

        sp
    }
}
