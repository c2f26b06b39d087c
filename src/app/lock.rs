//! Single-instance guard so two players never fight over the audio device.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub fn lock_path() -> PathBuf {
    std::env::temp_dir().join("soundline_audio.lock")
}

/// Held for the process lifetime. Dropping it removes the lock file.
#[derive(Debug)]
pub struct AudioLock {
    path: PathBuf,
    _file: File,
}

impl Drop for AudioLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // kill(pid, 0) checks existence without sending a signal.
    // EPERM still means the process exists.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Returns None if a live process already holds the lock.
pub fn try_acquire_at(path: &Path) -> Option<AudioLock> {
    if let Ok(mut file) = OpenOptions::new().read(true).open(path) {
        let mut pid_str = String::new();
        if file.read_to_string(&mut pid_str).is_ok() {
            if let Ok(pid) = pid_str.trim().parse::<i32>() {
                if pid_alive(pid) && pid as u32 != std::process::id() {
                    return None;
                }
            }
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .ok()?;
    write!(file, "{}", std::process::id()).ok()?;
    Some(AudioLock {
        path: path.to_path_buf(),
        _file: file,
    })
}

pub fn try_acquire_audio_lock() -> Option<AudioLock> {
    try_acquire_at(&lock_path())
}
