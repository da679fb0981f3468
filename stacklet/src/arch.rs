//! Architecture specific stack switching.
//!
//! Every supported instruction set provides a type implementing [`Arch`],
//! backed by a routine written in assembly. Only the implementation for the
//! target being compiled for is included, and it's exposed as [`Native`].
//!
//! The switching routine (`stacklet_switch`) works in three steps:
//!
//! 1. The stack pointer is rounded down to a 16 byte boundary, and a block
//!    containing the callee saved registers, the return address and the
//!    unaligned stack pointer is pushed onto the stack.
//! 2. The save callback is called with the new stack pointer. If it returns
//!    NULL we skip to step 3. Otherwise the returned value becomes the stack
//!    pointer and the restore callback is called on the new stack.
//! 3. The register block is popped from whatever stack is active at this
//!    point, and the callback's return value is returned.
//!
//! This means the push and pop in step 1 and 3 aren't paired within a single
//! call. Instead, the pop belongs to the call that suspended the stack we just
//! switched to.
//!
//! Registers the calling convention considers scratch registers aren't
//! preserved. This includes the caller saved floating point and vector
//! registers. The callee saved floating point registers _are_ preserved, as the
//! compiler assumes these survive any call to a foreign function. The same
//! applies to the floating point control register (MXCSR and the x87 control
//! word on x86-64, FPCR on AArch64, FPSCR on ARM and fcsr on RISC-V), so a
//! rounding mode set by one stack doesn't leak into another.
/// A function called on the old stack, before switching.
///
/// The first argument is the stack pointer of the old stack, after the
/// register block has been pushed onto it. The second argument is the `extra`
/// value given to [`switch`](crate::switch()).
///
/// The return value is the stack pointer to switch to, or NULL to not switch at
/// all.
pub type SaveFn =
    unsafe extern "C" fn(old_sp: *mut u8, extra: *mut u8) -> *mut u8;

/// A function called on the new stack, after switching.
///
/// The first argument is the new stack pointer, the second argument the `extra`
/// value given to [`switch`](crate::switch()). The return value is returned to
/// the code that resumes running after the switch.
pub type RestoreFn =
    unsafe extern "C" fn(new_sp: *mut u8, extra: *mut u8) -> *mut u8;

/// A function that starts running on a stack prepared using
/// [`initial_stack`](crate::initial_stack()).
///
/// The first argument is the value returned by the restore callback of the
/// first switch onto the stack. The second argument is the argument given to
/// `initial_stack`.
///
/// These functions can't return, as there's nothing to return to. Instead they
/// must switch to a different stack, and never be resumed.
pub type EntryFn = unsafe extern "C" fn(result: *mut u8, arg: *mut u8) -> !;

/// A type implementing stack switching for a specific instruction set.
pub trait Arch {
    /// The alignment (in bytes) of the stack pointers handed to the save and
    /// restore callbacks.
    const ALIGNMENT: usize;

    /// The size (in bytes) of the register block pushed onto the stack.
    const BLOCK_SIZE: usize;

    /// The amount of bytes (below the aligned top of a stack) used by
    /// `initial_stack`: the register block, plus the space above it that the
    /// trampoline starts with.
    const FRAME_SIZE: usize;

    /// Switches to a different stack.
    ///
    /// # Safety
    ///
    /// If `save` returns a non-NULL pointer, that pointer must be a stack
    /// pointer previously handed to a save callback (for a stack that's
    /// currently suspended), or one produced by `initial_stack`. The stack it
    /// points into must not be in use by any other thread.
    unsafe fn switch(
        save: SaveFn,
        restore: RestoreFn,
        extra: *mut u8,
    ) -> *mut u8;

    /// Writes an initial register block below `top`, such that switching to
    /// the returned stack pointer calls `entry`.
    ///
    /// # Safety
    ///
    /// `top` must point to the (exclusive) end of a writable memory region of
    /// at least `FRAME_SIZE + ALIGNMENT` bytes.
    unsafe fn initial_stack(
        top: *mut u8,
        entry: EntryFn,
        arg: *mut u8,
    ) -> *mut u8;

    /// Returns the current value of the stack pointer.
    fn stack_pointer() -> *mut u8;
}

/// Rounds `top` down to a multiple of `alignment`, which must be a power of
/// two.
pub(crate) fn align_down(top: *mut u8, alignment: usize) -> *mut u8 {
    ((top as usize) & !(alignment - 1)) as *mut u8
}

/// Writes the words in `words` to `sp`, in ascending address order.
///
/// # Safety
///
/// `sp` must be aligned to the size of a `usize`, and be valid for writing
/// `words.len()` words.
pub(crate) unsafe fn write_words(sp: *mut u8, words: &[usize]) {
    let ptr = sp as *mut usize;

    for (index, &word) in words.iter().enumerate() {
        ptr.add(index).write(word);
    }
}

#[cfg(all(target_arch = "x86_64", not(windows)))]
mod x86_64;

#[cfg(all(target_arch = "x86_64", not(windows)))]
pub type Native = x86_64::X86_64;

#[cfg(target_arch = "aarch64")]
mod aarch64;

#[cfg(target_arch = "aarch64")]
pub type Native = aarch64::AArch64;

#[cfg(target_arch = "arm")]
mod arm;

#[cfg(target_arch = "arm")]
pub type Native = arm::Arm;

#[cfg(target_arch = "riscv64")]
mod riscv64;

#[cfg(target_arch = "riscv64")]
pub type Native = riscv64::RiscV64;

#[cfg(not(any(
    all(target_arch = "x86_64", not(windows)),
    target_arch = "aarch64",
    target_arch = "arm",
    target_arch = "riscv64",
)))]
compile_error!(
    "Stack switching is only supported on x86-64 (System V), AArch64, ARM \
    and RISC-V 64"
);
