//! Output and errno helpers that are safe to call from a signal handler.
//!
//! Nothing in here allocates, takes a lock or goes through `std::io::Stdout`;
//! every write is a direct `write(2)` on the standard output descriptor.

use libc::{STDOUT_FILENO, c_int};

/// Writes `s` to standard output, retrying on partial writes and `EINTR`.
/// Returns the number of bytes written, or -1 on failure.
pub fn puts(s: &str) -> isize {
    write_all(s.as_bytes())
}

/// Writes the decimal form of `v` to standard output.
pub fn putl(v: i64) -> isize {
    let mut buf = [0u8; 24];
    let digits = ltoa(v, &mut buf);
    write_all(digits)
}

/// Prints `s` and terminates the process immediately, skipping every exit
/// handler and buffered stream.
pub fn error(s: &str) -> ! {
    puts(s);
    puts("\n");
    unsafe { libc::_exit(1) }
}

/// Formats `v` in base 10 into the tail of `buf` and returns that slice.
fn ltoa(v: i64, buf: &mut [u8; 24]) -> &[u8] {
    let negative = v < 0;
    let mut n = v.unsigned_abs();
    let mut i = buf.len();
    loop {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if negative {
        i -= 1;
        buf[i] = b'-';
    }
    &buf[i..]
}

fn write_all(mut bytes: &[u8]) -> isize {
    let mut total = 0isize;
    while !bytes.is_empty() {
        let n = unsafe { libc::write(STDOUT_FILENO, bytes.as_ptr().cast(), bytes.len()) };
        if n < 0 {
            if unsafe { *errno_location() } == libc::EINTR {
                continue;
            }
            return -1;
        }
        total += n;
        bytes = &bytes[n as usize..];
    }
    total
}

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "emscripten", target_os = "redox"))] {
        unsafe fn errno_location() -> *mut c_int {
            unsafe { libc::__errno_location() }
        }
    } else if #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))] {
        unsafe fn errno_location() -> *mut c_int {
            unsafe { libc::__error() }
        }
    } else if #[cfg(any(target_os = "android", target_os = "openbsd", target_os = "netbsd"))] {
        unsafe fn errno_location() -> *mut c_int {
            unsafe { libc::__errno() }
        }
    } else {
        compile_error!("tsh does not know where errno lives on this platform");
    }
}

/// Saves `errno` on creation and puts it back on drop, so a handler that
/// makes system calls leaves the interrupted code's `errno` untouched.
pub struct ErrnoGuard {
    saved: c_int,
}

impl ErrnoGuard {
    pub fn save() -> Self {
        ErrnoGuard {
            saved: unsafe { *errno_location() },
        }
    }
}

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        unsafe { *errno_location() = self.saved };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(v: i64) -> String {
        let mut buf = [0u8; 24];
        String::from_utf8(ltoa(v, &mut buf).to_vec()).unwrap()
    }

    #[test]
    fn ltoa_formats_like_display() {
        for v in [0, 7, 10, 1234, 32768, -1, -905, i64::MAX, i64::MIN] {
            assert_eq!(fmt(v), v.to_string());
        }
    }

    #[test]
    fn errno_guard_restores_value() {
        unsafe { *errno_location() = libc::EAGAIN };
        {
            let _guard = ErrnoGuard::save();
            unsafe { *errno_location() = libc::ECHILD };
        }
        assert_eq!(unsafe { *errno_location() }, libc::EAGAIN);
    }
}
