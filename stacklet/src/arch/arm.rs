//! Stack switching for 32 bits ARM, using the AAPCS calling convention.
//!
//! The register block is laid out as follows (offsets in bytes):
//!
//!     0    d8 to d15
//!     64   r4 to r11
//!     96   unaligned sp
//!     100  lr
//!     104  FPSCR
//!     108  padding
//!
//! On targets without VFP registers the first 64 bytes and the FPSCR slot are
//! reserved but left untouched, so the layout is the same for every ARM target.
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

macro_rules! switch_asm {
    (
        $save_float: literal,
        $restore_float: literal,
        $call_save: literal,
        $call_restore: literal
    ) => {
        asm_func!(
            "stacklet_switch",
            "mov r12, sp\n",
            "bic r3, r12, #15\n",
            "mov sp, r3\n",
            "sub sp, sp, #8\n",
            "push {{r4-r12, lr}}\n",
            $save_float,
            // r4 and r5 keep the restore function and extra argument around
            // while the save function runs.
            "mov r4, r1\n",
            "mov r5, r2\n",
            "mov r3, r0\n",
            "mov r0, sp\n",
            "mov r1, r5\n",
            $call_save,
            "cmp r0, #0\n",
            "beq .Lstacklet_switch_done\n",
            // The stack pointer now points to the new stack, but its contents
            // are yet to be restored by the restore function.
            "mov sp, r0\n",
            "mov r1, r5\n",
            $call_restore,
            ".Lstacklet_switch_done:\n",
            $restore_float,
            "pop {{r4-r12, lr}}\n",
            "mov sp, r12\n",
            "bx lr\n",
        );
    };
}

// The FPSCR is stored in the padding above lr, which is 104 bytes above the
// stack pointer once d8 to d15 are pushed.
#[cfg(all(stacklet_vfp, not(stacklet_armv4)))]
switch_asm!(
    "vpush {{d8-d15}}\nvmrs r3, fpscr\nstr r3, [sp, #104]\n",
    "ldr r3, [sp, #104]\nvmsr fpscr, r3\nvpop {{d8-d15}}\n",
    "blx r3\n",
    "blx r4\n"
);

#[cfg(all(not(stacklet_vfp), not(stacklet_armv4)))]
switch_asm!(
    "sub sp, sp, #64\n",
    "add sp, sp, #64\n",
    "blx r3\n",
    "blx r4\n"
);

// ARMv4T has no `blx`. Reading pc yields the address of the instruction after
// the `bx`, which makes it the return address.
#[cfg(all(not(stacklet_vfp), stacklet_armv4))]
switch_asm!(
    "sub sp, sp, #64\n",
    "add sp, sp, #64\n",
    "mov lr, pc\nbx r3\n",
    "mov lr, pc\nbx r4\n"
);

#[cfg(all(stacklet_vfp, stacklet_armv4))]
compile_error!("VFP registers aren't supported on ARMv4 targets");

// The first switch to a stack produced by `initial_stack()` returns here, with
// the restore function's result in r0, the entry function in r4 and its
// argument in r5.
#[cfg(not(stacklet_armv4))]
asm_func!("stacklet_trampoline", "mov r1, r5\n", "blx r4\n", "udf #0\n");

#[cfg(stacklet_armv4)]
asm_func!(
    "stacklet_trampoline",
    "mov r1, r5\n",
    "mov lr, pc\n",
    "bx r4\n",
    "udf #0\n",
);

/// The number of words reserved for d8 to d15.
const FLOAT_WORDS: usize = 16;

const BLOCK_SIZE: usize = 112;

// The register block, plus an empty caller frame for the trampoline.
const FRAME_SIZE: usize = BLOCK_SIZE + 16;

/// The instruction set used by 32 bits ARM processors.
pub struct Arm;

impl Arch for Arm {
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
        let base = top.sub(FRAME_SIZE - BLOCK_SIZE);
        let sp = base.sub(BLOCK_SIZE);
        let mut words = [0_usize; FRAME_SIZE / 4];

        words[FLOAT_WORDS] = entry as usize;
        words[FLOAT_WORDS + 1] = arg as usize;
        words[FLOAT_WORDS + 8] = base as usize;
        words[FLOAT_WORDS + 9] = stacklet_trampoline as usize;
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
