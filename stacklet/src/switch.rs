//! Switching between stacks.
//!
//! Switching is done using [`switch`], which calls a save function on the
//! current stack, switches to the stack pointer it returns, then calls a
//! restore function on the new stack. Which stack to switch to, and what to do
//! with the stack we're switching away from, is entirely up to these two
//! functions.
//!
//! For example, two stacks A and B ping-pong between each other as follows:
//!
//! 1. A calls `switch()`, its save function stores A's stack pointer somewhere
//!    and returns B's stack pointer.
//! 2. The restore function runs on B, and its return value is returned from
//!    the `switch()` call that suspended B earlier.
//! 3. At some point B calls `switch()`, with a save function returning the
//!    stack pointer stored in step 1. The `switch()` call from step 1 then
//!    returns, with the value of the restore function B passed.
use crate::arch::{Arch, EntryFn, Native, RestoreFn, SaveFn};
use log::trace;
use std::ptr::null_mut;

/// Switches to a different stack.
///
/// `save` is called on the current stack with the current stack pointer and
/// `extra`. If it returns NULL, no switch takes place and NULL is returned.
/// Otherwise the returned value becomes the new stack pointer, and `restore` is
/// called on the new stack with the same stack pointer and `extra`. The value
/// it returns is returned to whatever code resumes running on the new stack.
///
/// This function returns when the current stack is resumed, which may be
/// never. The returned value is produced by the restore function passed to
/// the `switch()` call that resumed this stack.
///
/// # Safety
///
/// The pointer returned by `save`, when not NULL, must be a stack pointer
/// previously passed to a save function for a stack that's still suspended, or
/// one returned by [`initial_stack`]. A stack must not be resumed more than once
/// per suspension, and must not be used by more than one thread at a time.
#[inline(always)]
pub unsafe fn switch(
    save: SaveFn,
    restore: RestoreFn,
    extra: *mut u8,
) -> *mut u8 {
    Native::switch(save, restore, extra)
}

/// Prepares a stack such that switching to it calls `entry`.
///
/// `top` is the end of the stack's memory. The return value is the stack
/// pointer a save function must return to start running the stack. `entry` is
/// called with the result of the restore function and `arg`.
///
/// # Safety
///
/// `top` must point to the (exclusive) end of writable memory large enough for
/// the initial frame and anything `entry` does. `entry` must never return.
pub unsafe fn initial_stack(
    top: *mut u8,
    entry: EntryFn,
    arg: *mut u8,
) -> *mut u8 {
    Native::initial_stack(top, entry, arg)
}

/// Returns the current value of the stack pointer.
#[inline(always)]
pub fn stack_pointer() -> *mut u8 {
    Native::stack_pointer()
}

/// The callbacks of a `switch_with()` call, stored on the stack that calls
/// `switch_with()`.
struct Callbacks<S, R> {
    save: Option<S>,
    restore: Option<R>,
    restored: bool,
}

unsafe extern "C" fn save_callback<S, R>(sp: *mut u8, extra: *mut u8) -> *mut u8
where
    S: FnOnce(*mut u8) -> *mut u8,
{
    let callbacks = &mut *(extra as *mut Callbacks<S, R>);

    match callbacks.save.take() {
        Some(func) => func(sp),
        None => null_mut(),
    }
}

unsafe extern "C" fn restore_callback<S, R>(
    sp: *mut u8,
    extra: *mut u8,
) -> *mut u8
where
    R: FnOnce(*mut u8) -> *mut u8,
{
    let callbacks = &mut *(extra as *mut Callbacks<S, R>);

    callbacks.restored = true;

    match callbacks.restore.take() {
        Some(func) => func(sp),
        None => null_mut(),
    }
}

/// Switches to a different stack using a pair of closures.
///
/// This behaves the same as [`switch`]: `save` runs on the current stack and
/// returns the stack pointer to switch to (or NULL to abort), and `restore`
/// runs on the new stack. If the switch is aborted, `restore` is dropped
/// without being called and NULL is returned.
///
/// The closures are stored on the current stack, which stays mapped while
/// it's suspended, so `restore` may borrow data from the current stack frame.
/// A panic in either closure aborts the process.
///
/// # Safety
///
/// The same requirements as [`switch`] apply to the pointer returned by `save`.
pub unsafe fn switch_with<S, R>(save: S, restore: R) -> *mut u8
where
    S: FnOnce(*mut u8) -> *mut u8,
    R: FnOnce(*mut u8) -> *mut u8,
{
    let mut callbacks =
        Callbacks { save: Some(save), restore: Some(restore), restored: false };
    let extra = &mut callbacks as *mut Callbacks<S, R> as *mut u8;
    let result =
        switch(save_callback::<S, R>, restore_callback::<S, R>, extra);

    if !callbacks.restored {
        trace!("the save callback aborted the switch at {:?}", extra);
    }

    result
}
