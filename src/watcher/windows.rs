//! `ReadDirectoryChangesW` change source

use std::ffi::c_void;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, ReadDirectoryChangesW, FILE_FLAG_BACKUP_SEMANTICS, FILE_LIST_DIRECTORY,
    FILE_NOTIFY_CHANGE_ATTRIBUTES, FILE_NOTIFY_CHANGE_DIR_NAME, FILE_NOTIFY_CHANGE_FILE_NAME,
    FILE_NOTIFY_CHANGE_LAST_WRITE, FILE_NOTIFY_CHANGE_SECURITY, FILE_NOTIFY_CHANGE_SIZE,
    FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::CancelIoEx;

use super::decode::NotifyRecords;
use super::{ChangeSource, RawNotification, SourceCloser};
use crate::error::Result;

const NOTIFY_FILTER: u32 = FILE_NOTIFY_CHANGE_FILE_NAME
    | FILE_NOTIFY_CHANGE_DIR_NAME
    | FILE_NOTIFY_CHANGE_ATTRIBUTES
    | FILE_NOTIFY_CHANGE_SIZE
    | FILE_NOTIFY_CHANGE_LAST_WRITE
    | FILE_NOTIFY_CHANGE_SECURITY;

/// Smallest buffer worth issuing a read with
const MIN_BUFFER: usize = 4096;

/// Directory handle shared between the reader and its closer
struct HandleGuard {
    handle: HANDLE,
    closed: AtomicBool,
}

// The handle is only an opaque kernel object id; all access goes through the
// Win32 calls below.
unsafe impl Send for HandleGuard {}
unsafe impl Sync for HandleGuard {}

impl SourceCloser for HandleGuard {
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // SAFETY: the handle came from CreateFileW and is closed exactly once,
        // guarded by the swap above.
        unsafe {
            CancelIoEx(self.handle, ptr::null());
            CloseHandle(self.handle);
        }
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.close();
    }
}

pub(super) struct DirectoryChanges {
    root: PathBuf,
    guard: Arc<HandleGuard>,
    // u32 words keep the buffer DWORD-aligned as the API requires
    buf: Vec<u32>,
}

impl DirectoryChanges {
    pub(super) fn open(root: &Path, buffer_size: usize) -> Result<Self> {
        let wide: Vec<u16> = root
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                FILE_LIST_DIRECTORY,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_FLAG_BACKUP_SEMANTICS,
                0,
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error().into());
        }

        let words = buffer_size.max(MIN_BUFFER) / 4;
        Ok(Self {
            root: root.to_path_buf(),
            guard: Arc::new(HandleGuard {
                handle,
                closed: AtomicBool::new(false),
            }),
            buf: vec![0u32; words],
        })
    }
}

impl ChangeSource for DirectoryChanges {
    fn next_batch(&mut self) -> Result<Option<Vec<RawNotification>>> {
        loop {
            if self.guard.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let mut returned: u32 = 0;
            let len = u32::try_from(self.buf.len() * 4).unwrap_or(u32::MAX);
            // SAFETY: the buffer is owned, aligned and `len` bytes long; the call
            // is synchronous so the buffer is not touched after it returns.
            let ok = unsafe {
                ReadDirectoryChangesW(
                    self.guard.handle,
                    self.buf.as_mut_ptr() as *mut c_void,
                    len,
                    1,
                    NOTIFY_FILTER,
                    &mut returned,
                    ptr::null_mut(),
                    None,
                )
            };

            if ok == 0 {
                if self.guard.closed.load(Ordering::SeqCst) {
                    return Ok(None);
                }
                return Err(io::Error::last_os_error().into());
            }

            if returned == 0 {
                tracing::warn!(
                    "change buffer overflowed for {}, events were lost",
                    self.root.display()
                );
                continue;
            }

            let bytes: Vec<u8> = self
                .buf
                .iter()
                .flat_map(|word| word.to_ne_bytes())
                .take(returned as usize)
                .collect();

            let mut batch = Vec::new();
            for record in NotifyRecords::new(&bytes) {
                match record {
                    Ok(record) => batch.push(RawNotification::new(
                        record.action,
                        self.root.join(&record.name),
                    )),
                    Err(e) => {
                        tracing::warn!("change buffer for {}: {}", self.root.display(), e);
                        break;
                    }
                }
            }
            return Ok(Some(batch));
        }
    }

    fn closer(&self) -> Arc<dyn SourceCloser> {
        self.guard.clone()
    }
}
