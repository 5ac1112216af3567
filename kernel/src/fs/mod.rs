//! The inode/file façade.
//!
//! The block filesystem is an external collaborator; the core only needs
//! reference bookkeeping for fork/exit and a way to read image bytes for
//! the program loader. These handles are that surface.

use core::cmp::min;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::KernelResult;

/// In-core inode handle backed by an immutable byte image.
pub struct Inode {
    refs: AtomicUsize,
    data: &'static [u8],
}

impl Inode {
    pub const fn new(data: &'static [u8]) -> Self {
        Inode {
            refs: AtomicUsize::new(1),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }
}

/// Take another reference to `ip`.
pub fn idup(ip: &'static Inode) -> &'static Inode {
    ip.refs.fetch_add(1, Ordering::Relaxed);
    ip
}

/// Drop one reference.
pub fn iput(ip: &'static Inode) {
    let prev = ip.refs.fetch_sub(1, Ordering::Relaxed);
    assert!(prev >= 1, "iput: refcount underflow");
}

/// Read up to `dst.len()` bytes starting at `off`; short reads happen at
/// end of file. Returns the byte count.
pub fn read_inode(ip: &Inode, dst: &mut [u8], off: usize) -> KernelResult<usize> {
    if off >= ip.data.len() {
        return Ok(0);
    }
    let n = min(dst.len(), ip.data.len() - off);
    dst[..n].copy_from_slice(&ip.data[off..off + n]);
    Ok(n)
}

/// Path lookup. The façade exposes only the root.
pub fn namei(path: &str) -> Option<&'static Inode> {
    static ROOT: Inode = Inode::new(&[]);
    if path == "/" {
        Some(idup(&ROOT))
    } else {
        None
    }
}

/// Opaque open-file object owned by the file subsystem.
pub struct File {
    refs: AtomicUsize,
}

impl File {
    pub const fn new() -> Self {
        File {
            refs: AtomicUsize::new(1),
        }
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }
}

impl Default for File {
    fn default() -> Self {
        Self::new()
    }
}

/// Duplicate an open file for a forked child.
pub fn file_dup(f: &'static File) -> &'static File {
    f.refs.fetch_add(1, Ordering::Relaxed);
    f
}

/// Close one reference; the owning subsystem reclaims the object when
/// the count drains.
pub fn file_close(f: &'static File) {
    let prev = f.refs.fetch_sub(1, Ordering::Relaxed);
    assert!(prev >= 1, "file_close: refcount underflow");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_refcounts_balance() {
        static IP: Inode = Inode::new(b"hello");
        let before = IP.ref_count();
        let same = idup(&IP);
        assert_eq!(same.ref_count(), before + 1);
        iput(same);
        assert_eq!(IP.ref_count(), before);
    }

    #[test]
    fn reads_are_bounded_by_the_image() {
        static IP: Inode = Inode::new(b"0123456789");
        let mut buf = [0u8; 4];
        assert_eq!(read_inode(&IP, &mut buf, 0).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(read_inode(&IP, &mut buf, 8).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(read_inode(&IP, &mut buf, 10).unwrap(), 0);
    }

    #[test]
    fn file_dup_close_balance() {
        static F: File = File::new();
        let before = F.ref_count();
        let same = file_dup(&F);
        assert_eq!(same.ref_count(), before + 1);
        file_close(same);
        assert_eq!(F.ref_count(), before);
    }
}
