use crate::memory_map::MemoryMap;
use rustix::param::page_size;
use std::io::Result as IoResult;

/// Memory to switch stacks onto.
///
/// The layout of the stack is as follows:
///
///     +--------------+
///     |  guard page  |
///     +--------------+
///     |              | ^
///     |     stack    | | stack growth direction
///     |              |
///     +--------------+ <- top()
///
/// Stacks don't grow. Running past the end hits the guard page and terminates
/// the program, instead of silently corrupting whatever memory sits below the
/// stack.
pub(crate) struct Stack {
    mem: MemoryMap,
}

impl Stack {
    pub(crate) fn new(size: usize) -> IoResult<Self> {
        let page = page_size();
        let mut mem = MemoryMap::new(size + page)?;

        mem.protect(0)?;
        Ok(Self { mem })
    }

    /// Returns the (exclusive) end of the stack, which is where the stack
    /// pointer starts.
    pub(crate) fn top(&self) -> *mut u8 {
        self.mem.end()
    }

    /// Returns the number of bytes usable by the stack, excluding the guard
    /// page.
    pub(crate) fn usable(&self) -> usize {
        self.mem.len - page_size()
    }

    /// Returns `true` if `pointer` points into the usable part of this stack.
    pub(crate) fn contains(&self, pointer: *mut u8) -> bool {
        let start = self.mem.ptr as usize + page_size();
        let end = self.top() as usize;
        let addr = pointer as usize;

        addr >= start && addr <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let stack = Stack::new(page_size() * 4).unwrap();

        assert_eq!(stack.usable(), page_size() * 4);
        assert_eq!(stack.top() as usize % page_size(), 0);
    }

    #[test]
    fn test_contains() {
        let stack = Stack::new(page_size()).unwrap();
        let top = stack.top();

        assert!(stack.contains(top));
        assert!(stack.contains(unsafe { top.sub(1) }));
        assert!(stack.contains(unsafe { top.sub(page_size()) }));
        assert!(!stack.contains(unsafe { top.sub(page_size() + 1) }));
        assert!(!stack.contains(unsafe { top.add(1) }));
    }
}
