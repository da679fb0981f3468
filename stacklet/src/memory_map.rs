use rustix::mm::{
    mmap_anonymous, mprotect, munmap, MapFlags, MprotectFlags, ProtFlags,
};
use rustix::param::page_size;
use std::io::{Error, Result as IoResult};
use std::ptr::null_mut;

/// Rounds `size` up to a multiple of the page size.
pub(crate) fn multiple_of_page_size(size: usize) -> usize {
    let page = page_size();

    (size + (page - 1)) & !(page - 1)
}

fn mmap_options() -> MapFlags {
    let base = MapFlags::PRIVATE;

    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
    {
        base | MapFlags::STACK
    }

    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
    {
        base
    }
}

/// A chunk of memory created using `mmap` and similar functions, used as stack
/// memory.
pub(crate) struct MemoryMap {
    pub(crate) ptr: *mut u8,
    pub(crate) len: usize,
}

impl MemoryMap {
    pub(crate) fn new(size: usize) -> IoResult<Self> {
        let size = multiple_of_page_size(size);
        let res = unsafe {
            mmap_anonymous(
                null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                mmap_options(),
            )
        };

        match res {
            Ok(ptr) => Ok(MemoryMap { ptr: ptr as *mut u8, len: size }),
            Err(e) => Err(Error::from_raw_os_error(e.raw_os_error())),
        }
    }

    /// Makes the page starting at `start` inaccessible.
    pub(crate) fn protect(&mut self, start: usize) -> IoResult<()> {
        let res = unsafe {
            mprotect(
                self.ptr.add(start) as _,
                page_size(),
                MprotectFlags::empty(),
            )
        };

        res.map_err(|e| Error::from_raw_os_error(e.raw_os_error()))
    }

    /// Returns a pointer to the end of the mapped memory.
    pub(crate) fn end(&self) -> *mut u8 {
        unsafe { self.ptr.add(self.len) }
    }
}

impl Drop for MemoryMap {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.ptr as _, self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_of_page_size() {
        assert_eq!(multiple_of_page_size(1), page_size());
        assert_eq!(multiple_of_page_size(page_size()), page_size());
        assert_eq!(multiple_of_page_size(page_size() + 1), page_size() * 2);
    }

    #[test]
    fn test_new() {
        let map1 = MemoryMap::new(32).unwrap();
        let map2 = MemoryMap::new(page_size() * 3).unwrap();

        assert_eq!(map1.len, page_size());
        assert_eq!(map2.len, page_size() * 3);
        assert_eq!(map2.end() as usize - map2.ptr as usize, map2.len);
    }

    #[test]
    fn test_protect() {
        let mut map = MemoryMap::new(page_size() * 2).unwrap();

        assert!(map.protect(0).is_ok());
    }
}
