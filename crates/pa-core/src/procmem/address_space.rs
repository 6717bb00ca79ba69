//! Read-only views of a foreign process's address space.
//!
//! The extractor only needs positioned reads. Opening is split from reading so
//! tests can substitute an in-memory image, and closing is `Drop`, so a handle
//! is released on every exit path of an extraction call.

use pa_common::{Error, ProcessId, Result};
use std::io;
use std::path::{Path, PathBuf};

/// A byte-addressable, randomly positionable view of target memory.
pub trait AddressSpace {
    /// Read up to `buf.len()` bytes at absolute address `offset`.
    ///
    /// A short count is not an error at this layer; callers decide what a
    /// short read means.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;
}

/// Opens address-space views by process id.
pub trait AddressSpaceOpener {
    /// The handle type; dropping it closes the view.
    type Space: AddressSpace;

    /// Open the address space of `pid` for reading.
    fn open(&self, pid: ProcessId) -> Result<Self::Space>;
}

/// Per-process memory file name on this platform.
#[cfg(any(target_os = "solaris", target_os = "illumos", target_os = "aix"))]
pub const DEFAULT_MEMORY_FILE: &str = "as";

/// Per-process memory file name on this platform.
#[cfg(not(any(target_os = "solaris", target_os = "illumos", target_os = "aix")))]
pub const DEFAULT_MEMORY_FILE: &str = "mem";

/// Default procfs mount point.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Opens `<root>/<pid>/<file_name>` read-only.
#[derive(Debug, Clone)]
pub struct ProcfsOpener {
    root: PathBuf,
    file_name: String,
}

impl Default for ProcfsOpener {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_PROC_ROOT),
            file_name: DEFAULT_MEMORY_FILE.to_string(),
        }
    }
}

impl ProcfsOpener {
    /// Opener for the platform's procfs layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener rooted somewhere other than `/proc`.
    pub fn with_root(root: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            file_name: file_name.into(),
        }
    }

    /// Mount point this opener reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the memory file for `pid`.
    pub fn path_for(&self, pid: ProcessId) -> PathBuf {
        self.root.join(pid.to_string()).join(&self.file_name)
    }
}

/// Map an open failure onto the error taxonomy.
#[cfg_attr(not(unix), allow(dead_code))]
fn classify_open_error(pid: ProcessId, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied { pid: pid.0 },
        io::ErrorKind::NotFound => Error::ProcessNotFound { pid: pid.0 },
        _ => Error::Io(err),
    }
}

#[cfg(unix)]
mod unix_impl {
    use super::*;
    use std::fs::File;
    use std::os::unix::fs::FileExt;

    /// A procfs memory file.
    #[derive(Debug)]
    pub struct ProcAddressSpace {
        file: File,
    }

    impl AddressSpace for ProcAddressSpace {
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            self.file.read_at(buf, offset)
        }
    }

    impl AddressSpaceOpener for ProcfsOpener {
        type Space = ProcAddressSpace;

        fn open(&self, pid: ProcessId) -> Result<ProcAddressSpace> {
            let path = self.path_for(pid);
            let file = File::open(&path).map_err(|e| classify_open_error(pid, e))?;
            Ok(ProcAddressSpace { file })
        }
    }
}

#[cfg(unix)]
pub use unix_impl::ProcAddressSpace;

#[cfg(not(unix))]
mod fallback_impl {
    use super::*;

    /// Placeholder handle; never constructed on this platform.
    #[derive(Debug)]
    pub enum ProcAddressSpace {}

    impl AddressSpace for ProcAddressSpace {
        fn read_at(&mut self, _offset: u64, _buf: &mut [u8]) -> io::Result<usize> {
            match *self {}
        }
    }

    impl AddressSpaceOpener for ProcfsOpener {
        type Space = ProcAddressSpace;

        fn open(&self, _pid: ProcessId) -> Result<ProcAddressSpace> {
            Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string()))
        }
    }
}

#[cfg(not(unix))]
pub use fallback_impl::ProcAddressSpace;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_for_uses_root_and_file_name() {
        let opener = ProcfsOpener::with_root("/tmp/fakeproc", "as");
        assert_eq!(
            opener.path_for(ProcessId(31)),
            PathBuf::from("/tmp/fakeproc/31/as")
        );
    }

    #[test]
    fn test_default_opener_points_at_proc() {
        let opener = ProcfsOpener::new();
        assert_eq!(opener.root(), Path::new("/proc"));
        assert!(opener
            .path_for(ProcessId(1))
            .ends_with(format!("1/{}", DEFAULT_MEMORY_FILE)));
    }

    #[test]
    fn test_classify_open_errors() {
        let pid = ProcessId(5);
        assert!(matches!(
            classify_open_error(pid, io::Error::from(io::ErrorKind::PermissionDenied)),
            Error::PermissionDenied { pid: 5 }
        ));
        assert!(matches!(
            classify_open_error(pid, io::Error::from(io::ErrorKind::NotFound)),
            Error::ProcessNotFound { pid: 5 }
        ));
        assert!(matches!(
            classify_open_error(pid, io::Error::from(io::ErrorKind::Interrupted)),
            Error::Io(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_open_missing_process_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let opener = ProcfsOpener::with_root(dir.path(), "as");
        assert!(matches!(
            opener.open(ProcessId(999_999)),
            Err(Error::ProcessNotFound { pid: 999_999 })
        ));
    }
}
