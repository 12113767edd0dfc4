//! Taint sources: data read from selected files enters shadow memory tainted.
//!
//! The syscall layer reports opens, closes, seeks and reads to a [`TaintSources`] tracker. A file
//! descriptor is tainted when its path matches the policy's filter at open time; every read
//! through a tainted descriptor taints the part of the buffer that falls inside the policy's
//! file range.

use crate::containers::unordered::{UnorderedMap, UnorderedSet};
use crate::log::*;
use crate::shadow_memory::ShadowMemory;

/// File descriptors at or above this bound are never tracked.
pub const FD_MAX: u32 = 256;

/// `whence` values accepted by [`TaintSources::on_llseek`]
pub const SEEK_SET: u32 = 0;
pub const SEEK_CUR: u32 = 1;
pub const SEEK_END: u32 = 2;

/// Which file bytes become tainted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaintSourcePolicy {
    /// Path prefix of files to taint, or `*suffix` to match by suffix. Empty disables file
    /// tainting entirely.
    pub file_filter: String,
    /// Taint every opened file, and every byte read from it
    pub taint_all: bool,
    /// First file offset to taint
    pub taint_start: u64,
    /// Number of bytes to taint from `taint_start`
    pub taint_len: u64,
    /// The label given to each tainted byte
    pub label: u8,
}

impl Default for TaintSourcePolicy {
    fn default() -> Self {
        Self {
            file_filter: String::new(),
            taint_all: false,
            taint_start: 0,
            taint_len: u64::MAX,
            label: 0xff,
        }
    }
}

impl TaintSourcePolicy {
    /// Whether a file opened at `path` should be tainted.
    pub fn matches(&self, path: &str) -> bool {
        if self.file_filter.is_empty() {
            return false;
        }
        if self.taint_all || path.starts_with(&self.file_filter) {
            return true;
        }
        match self.file_filter.strip_prefix('*') {
            Some(suffix) => path.ends_with(suffix),
            None => false,
        }
    }

    /// The part of the file range `[offset, offset+len)` that should be tainted, as a
    /// `(start, len)` relative to `offset`.
    pub fn taint_window(&self, offset: u64, len: u64) -> Option<(u64, u64)> {
        if self.taint_all {
            return Some((0, len));
        }
        let lo = offset.max(self.taint_start);
        let hi = offset
            .saturating_add(len)
            .min(self.taint_start.saturating_add(self.taint_len));
        if lo >= hi {
            None
        } else {
            Some((lo - offset, hi - lo))
        }
    }
}

/// Per-thread descriptor state
#[derive(Clone, Debug, Default)]
struct ThreadFds {
    tainted: UnorderedSet<u32>,
    offsets: UnorderedMap<u32, u64>,
}

/// Tracks tainted file descriptors across threads, and applies the policy to reads.
#[derive(Clone, Debug, Default)]
pub struct TaintSources {
    policy: TaintSourcePolicy,
    threads: UnorderedMap<u32, ThreadFds>,
}

impl TaintSources {
    pub fn new(policy: TaintSourcePolicy) -> Self {
        Self {
            policy,
            threads: Default::default(),
        }
    }

    pub fn policy(&self) -> &TaintSourcePolicy {
        &self.policy
    }

    fn thread(&mut self, tid: u32) -> &mut ThreadFds {
        self.threads.entry(tid).or_default()
    }

    pub fn is_tainted(&self, tid: u32, fd: u32) -> bool {
        self.threads
            .get(&tid)
            .map(|t| t.tainted.contains(&fd))
            .unwrap_or(false)
    }

    /// The tracked file offset of `fd`
    pub fn offset(&self, tid: u32, fd: u32) -> u64 {
        self.threads
            .get(&tid)
            .and_then(|t| t.offsets.get(&fd).copied())
            .unwrap_or(0)
    }

    pub fn on_open(&mut self, tid: u32, fd: i64, path: &str) {
        if self.policy.file_filter.is_empty() || fd < 0 || fd >= FD_MAX as i64 {
            return;
        }
        let fd = fd as u32;
        let taint = self.policy.matches(path);
        let t = self.thread(tid);
        if taint {
            info!("Tainting opened file"; "tid" => tid, "path" => path, "fd" => fd);
            t.tainted.insert(fd);
            t.offsets.insert(fd, 0);
        } else {
            t.tainted.remove(&fd);
        }
    }

    pub fn on_close(&mut self, tid: u32, fd: i64) {
        if fd < 0 || fd >= FD_MAX as i64 {
            return;
        }
        let fd = fd as u32;
        if self.is_tainted(tid, fd) {
            info!("Closing tainted file"; "tid" => tid, "fd" => fd);
        }
        let t = self.thread(tid);
        t.tainted.remove(&fd);
        t.offsets.remove(&fd);
    }

    /// Track a seek on a tainted descriptor. Seeking relative to the end of the file is not
    /// supported, since the file size is unknown.
    pub fn on_llseek(&mut self, tid: u32, fd: u32, offset: u64, whence: u32) {
        if fd >= FD_MAX || !self.is_tainted(tid, fd) {
            return;
        }
        debug!("Seek on tainted file"; "tid" => tid, "fd" => fd, "offset" => offset, "whence" => whence);
        let cur = self.offset(tid, fd);
        let new = match whence {
            SEEK_SET => offset,
            SEEK_CUR => cur.wrapping_add(offset),
            SEEK_END => panic!("Unsupported SEEK_END on tainted file descriptor {}", fd),
            w => panic!("Unknown seek whence {}", w),
        };
        self.thread(tid).offsets.insert(fd, new);
    }

    /// A `read` of `len` bytes into `buf`. The whole buffer becomes untainted, then the bytes
    /// inside the tainted window are labelled, and the tracked file offset advances.
    pub fn on_read(&mut self, tid: u32, fd: u32, buf: u64, len: u64, mem: &mut dyn ShadowMemory) {
        if len == 0 {
            return;
        }
        mem.mark_defined(buf, len);
        if fd >= FD_MAX || !self.is_tainted(tid, fd) {
            return;
        }
        let offset = self.offset(tid, fd);
        debug!("Read from tainted file"; "tid" => tid, "fd" => fd, "offset" => offset, "len" => len, "buf" => %format!("{:#x}", buf));
        self.taint_range(buf, offset, len, mem);
        self.thread(tid).offsets.insert(fd, offset.wrapping_add(len));
    }

    /// A `pread` of `len` bytes at file `offset` into `buf`. The tracked file offset is not
    /// changed.
    pub fn on_pread(
        &mut self,
        tid: u32,
        fd: u32,
        buf: u64,
        len: u64,
        offset: u64,
        mem: &mut dyn ShadowMemory,
    ) {
        if len == 0 {
            return;
        }
        mem.mark_defined(buf, len);
        if fd >= FD_MAX || !self.is_tainted(tid, fd) {
            return;
        }
        debug!("Positioned read from tainted file"; "tid" => tid, "fd" => fd, "offset" => offset, "len" => len);
        self.taint_range(buf, offset, len, mem);
    }

    fn taint_range(&self, buf: u64, offset: u64, len: u64, mem: &mut dyn ShadowMemory) {
        if let Some((start, n)) = self.policy.taint_window(offset, len) {
            trace!("Tainting bytes"; "addr" => %format!("{:#x}", buf + start), "len" => n);
            mem.mark_tainted(buf + start, n, self.policy.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Endness;
    use crate::shadow_memory::ByteShadowMemory;

    fn policy(filter: &str, start: u64, len: u64) -> TaintSourcePolicy {
        TaintSourcePolicy {
            file_filter: filter.to_string(),
            taint_start: start,
            taint_len: len,
            ..Default::default()
        }
    }

    #[test]
    fn filters() {
        let p = policy("/tmp/in", 0, 1);
        assert!(p.matches("/tmp/input.txt"));
        assert!(!p.matches("/etc/passwd"));
        let p = policy("*.png", 0, 1);
        assert!(p.matches("/home/u/a.png"));
        assert!(!p.matches("/home/u/a.jpg"));
        assert!(!policy("", 0, 1).matches("/tmp/in"));
    }

    #[test]
    fn windows_intersect() {
        let p = policy("x", 10, 20);
        assert_eq!(p.taint_window(0, 5), None);
        assert_eq!(p.taint_window(0, 15), Some((10, 5)));
        assert_eq!(p.taint_window(12, 4), Some((0, 4)));
        assert_eq!(p.taint_window(25, 10), Some((0, 5)));
        assert_eq!(p.taint_window(5, 40), Some((5, 20)));
        assert_eq!(p.taint_window(30, 4), None);
    }

    #[test]
    fn reads_taint_and_advance() {
        let mut src = TaintSources::new(policy("/data", 4, 4));
        let mut mem = ByteShadowMemory::new();
        mem.mark_tainted(0x1000, 16, 0x11);
        src.on_open(1, 3, "/data/secret");
        assert!(src.is_tainted(1, 3));
        assert!(!src.is_tainted(2, 3));

        src.on_read(1, 3, 0x1000, 6, &mut mem);
        assert_eq!(src.offset(1, 3), 6);
        assert_eq!(mem.load_shadow(0x1000, 6, Endness::Little), 0xffff_0000_0000);
        // Bytes past the read buffer keep their previous labels.
        assert_eq!(mem.byte(0x1006), 0x11);

        src.on_read(1, 3, 0x2000, 6, &mut mem);
        assert_eq!(mem.load_shadow(0x2000, 6, Endness::Little), 0xffff);
        assert_eq!(src.offset(1, 3), 12);
    }

    #[test]
    fn untracked_reads_only_clear() {
        let mut src = TaintSources::new(policy("/data", 0, 100));
        let mut mem = ByteShadowMemory::new();
        mem.mark_tainted(0x10, 4, 0xff);
        src.on_open(0, 5, "/other");
        src.on_read(0, 5, 0x10, 4, &mut mem);
        assert_eq!(mem.tainted_bytes(), 0);
    }

    #[test]
    fn seeks_and_preads() {
        let mut src = TaintSources::new(policy("/data", 8, 2));
        let mut mem = ByteShadowMemory::new();
        src.on_open(0, 4, "/data");
        src.on_llseek(0, 4, 7, SEEK_SET);
        src.on_llseek(0, 4, 1, SEEK_CUR);
        assert_eq!(src.offset(0, 4), 8);
        src.on_pread(0, 4, 0x500, 4, 6, &mut mem);
        assert_eq!(mem.load_shadow(0x500, 4, Endness::Little), 0xffff_0000);
        assert_eq!(src.offset(0, 4), 8);
        src.on_close(0, 4);
        assert!(!src.is_tainted(0, 4));
    }

    #[test]
    #[should_panic(expected = "SEEK_END")]
    fn seek_end_is_fatal() {
        let mut src = TaintSources::new(policy("/data", 0, 1));
        src.on_open(0, 4, "/data");
        src.on_llseek(0, 4, 0, SEEK_END);
    }
}
