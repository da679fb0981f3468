//! Switching between call stacks on a single thread.
//!
//! This crate provides the low-level primitive used to build stackful
//! coroutines ("stacklets"): suspending the current stack at an arbitrary
//! point, running code on a different stack, and later resuming the original
//! stack where it left off. Allocating stacks, keeping track of which stacks
//! exist, and deciding which one to run next is left to the caller.
//!
//! The main entry point is [`switch`]. [`initial_stack`] prepares fresh stack
//! memory such that switching to it calls a function, and [`switch_with`]
//! provides the same functionality as `switch` using closures.
mod macros;

mod arch;
mod switch;

#[cfg(test)]
mod config;
#[cfg(test)]
mod memory_map;
#[cfg(test)]
mod stack;

pub use crate::arch::{Arch, EntryFn, Native, RestoreFn, SaveFn};
pub use crate::switch::{initial_stack, stack_pointer, switch, switch_with};
