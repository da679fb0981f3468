//! Stack switching for AArch64, using the AAPCS64 calling convention.
//!
//! The register block is laid out as follows (offsets in bytes):
//!
//!     0    unaligned sp
//!     8    x30 (link register)
//!     16   x19 to x28
//!     96   x29 (frame pointer)
//!     104  FPCR
//!     112  d8 to d15
//!
//! x18 is the platform register and isn't touched.
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
    "mov x9, sp\n",
    "and x10, x9, #0xfffffffffffffff0\n",
    "sub sp, x10, #176\n",
    "stp x9, x30, [sp, #0]\n",
    "stp x19, x20, [sp, #16]\n",
    "stp x21, x22, [sp, #32]\n",
    "stp x23, x24, [sp, #48]\n",
    "stp x25, x26, [sp, #64]\n",
    "stp x27, x28, [sp, #80]\n",
    "str x29, [sp, #96]\n",
    "mrs x10, fpcr\n",
    "str x10, [sp, #104]\n",
    "stp d8, d9, [sp, #112]\n",
    "stp d10, d11, [sp, #128]\n",
    "stp d12, d13, [sp, #144]\n",
    "stp d14, d15, [sp, #160]\n",
    // x19 and x20 keep the restore function and extra argument around while
    // the save function runs.
    "mov x19, x1\n",
    "mov x20, x2\n",
    "mov x9, x0\n",
    "mov x0, sp\n",
    "mov x1, x20\n",
    "blr x9\n",
    "cbz x0, .Lstacklet_switch_done\n",
    // The stack pointer now points to the new stack, but its contents are yet
    // to be restored by the restore function.
    "mov sp, x0\n",
    "mov x1, x20\n",
    "blr x19\n",
    ".Lstacklet_switch_done:\n",
    "ldp d14, d15, [sp, #160]\n",
    "ldp d12, d13, [sp, #144]\n",
    "ldp d10, d11, [sp, #128]\n",
    "ldp d8, d9, [sp, #112]\n",
    "ldr x10, [sp, #104]\n",
    "msr fpcr, x10\n",
    "ldr x29, [sp, #96]\n",
    "ldp x27, x28, [sp, #80]\n",
    "ldp x25, x26, [sp, #64]\n",
    "ldp x23, x24, [sp, #48]\n",
    "ldp x21, x22, [sp, #32]\n",
    "ldp x19, x20, [sp, #16]\n",
    "ldp x9, x30, [sp, #0]\n",
    "mov sp, x9\n",
    "ret\n",
);

// The first switch to a stack produced by `initial_stack()` returns here, with
// the restore function's result in x0, the entry function in x19 and its
// argument in x20.
asm_func!(
    "stacklet_trampoline",
    "mov x1, x20\n",
    "blr x19\n",
    "brk #1\n",
);

const BLOCK_SIZE: usize = 176;

// The register block, plus an empty caller frame for the trampoline.
const FRAME_SIZE: usize = BLOCK_SIZE + 16;

/// The instruction set used by 64 bits ARM processors.
pub struct AArch64;

impl Arch for AArch64 {
    const ALIGNMENT: usize = 16;
    const BLOCK_SIZE: usize = BLOCK_SIZE;
    const FRAME_SIZE: usize = FRAME_SIZE;

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

        // The 16 bytes at the top act as the (empty) caller frame of the
        // trampoline. The FPCR starts out as zero, which is what Linux and
        // macOS start processes with.
        let base = top.sub(FRAME_SIZE - BLOCK_SIZE);
        let sp = base.sub(BLOCK_SIZE);
        let mut words = [0_usize; FRAME_SIZE / 8];

        words[0] = base as usize;
        words[1] = stacklet_trampoline as usize;
        words[2] = entry as usize;
        words[3] = arg as usize;
        write_words(sp, &words);
        sp
    }

    #[inline(always)]
    fn stack_pointer() -> *mut u8 {
        let sp: *mut u8;

        unsafe {
            asm!("mov {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }

        sp
    }
}
