//! Stack switching for 64 bits RISC-V, using the LP64 and LP64D calling
//! conventions.
//!
//! The register block is laid out as follows (offsets in bytes):
//!
//!     0    unaligned sp
//!     8    ra
//!     16   s0 to s11
//!     112  fs0 to fs11
//!     208  fcsr
//!     216  padding
//!
//! Without the D extension the floating point area and the fcsr slot are
//! reserved but left untouched.
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
    ($save_float: literal, $restore_float: literal) => {
        asm_func!(
            "stacklet_switch",
            "mv t0, sp\n",
            "andi t1, t0, -16\n",
            "addi sp, t1, -224\n",
            "sd t0, 0(sp)\n",
            "sd ra, 8(sp)\n",
            "sd s0, 16(sp)\n",
            "sd s1, 24(sp)\n",
            "sd s2, 32(sp)\n",
            "sd s3, 40(sp)\n",
            "sd s4, 48(sp)\n",
            "sd s5, 56(sp)\n",
            "sd s6, 64(sp)\n",
            "sd s7, 72(sp)\n",
            "sd s8, 80(sp)\n",
            "sd s9, 88(sp)\n",
            "sd s10, 96(sp)\n",
            "sd s11, 104(sp)\n",
            $save_float,
            // s1 and s2 keep the restore function and extra argument around
            // while the save function runs.
            "mv s1, a1\n",
            "mv s2, a2\n",
            "mv t2, a0\n",
            "mv a0, sp\n",
            "mv a1, s2\n",
            "jalr t2\n",
            "beqz a0, .Lstacklet_switch_done\n",
            // The stack pointer now points to the new stack, but its contents
            // are yet to be restored by the restore function.
            "mv sp, a0\n",
            "mv a1, s2\n",
            "jalr s1\n",
            ".Lstacklet_switch_done:\n",
            $restore_float,
            "ld ra, 8(sp)\n",
            "ld s0, 16(sp)\n",
            "ld s1, 24(sp)\n",
            "ld s2, 32(sp)\n",
            "ld s3, 40(sp)\n",
            "ld s4, 48(sp)\n",
            "ld s5, 56(sp)\n",
            "ld s6, 64(sp)\n",
            "ld s7, 72(sp)\n",
            "ld s8, 80(sp)\n",
            "ld s9, 88(sp)\n",
            "ld s10, 96(sp)\n",
            "ld s11, 104(sp)\n",
            "ld t0, 0(sp)\n",
            "mv sp, t0\n",
            "ret\n",
        );
    };
}

#[cfg(stacklet_float_d)]
switch_asm!(
    "frcsr t0\n\
     sd t0, 208(sp)\n\
     fsd fs0, 112(sp)\n\
     fsd fs1, 120(sp)\n\
     fsd fs2, 128(sp)\n\
     fsd fs3, 136(sp)\n\
     fsd fs4, 144(sp)\n\
     fsd fs5, 152(sp)\n\
     fsd fs6, 160(sp)\n\
     fsd fs7, 168(sp)\n\
     fsd fs8, 176(sp)\n\
     fsd fs9, 184(sp)\n\
     fsd fs10, 192(sp)\n\
     fsd fs11, 200(sp)\n",
    "ld t0, 208(sp)\n\
     fscsr t0\n\
     fld fs0, 112(sp)\n\
     fld fs1, 120(sp)\n\
     fld fs2, 128(sp)\n\
     fld fs3, 136(sp)\n\
     fld fs4, 144(sp)\n\
     fld fs5, 152(sp)\n\
     fld fs6, 160(sp)\n\
     fld fs7, 168(sp)\n\
     fld fs8, 176(sp)\n\
     fld fs9, 184(sp)\n\
     fld fs10, 192(sp)\n\
     fld fs11, 200(sp)\n"
);

#[cfg(not(stacklet_float_d))]
switch_asm!("", "");

// The first switch to a stack produced by `initial_stack()` returns here, with
// the restore function's result in a0, the entry function in s1 and its
// argument in s2.
asm_func!(
    "stacklet_trampoline",
    "mv a1, s2\n",
    "jalr s1\n",
    "unimp\n",
);

const BLOCK_SIZE: usize = 224;

// The register block, plus an empty caller frame for the trampoline.
const FRAME_SIZE: usize = BLOCK_SIZE + 16;

/// The instruction set used by 64 bits RISC-V processors.
pub struct RiscV64;

impl Arch for RiscV64 {
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
        let mut words = [0_usize; FRAME_SIZE / 8];

        words[0] = base as usize;
        words[1] = stacklet_trampoline as usize;
        words[3] = entry as usize;
        words[4] = arg as usize;
        write_words(sp, &words);
        sp
    }

    #[inline(always)]
    fn stack_pointer() -> *mut u8 {
        let sp: *mut u8;

        unsafe {
            asm!("mv {}, sp", out(reg) sp, options(nomem, nostack, preserves_flags));
        }

        sp
    }
}
