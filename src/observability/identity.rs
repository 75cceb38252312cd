//! Process identity attached to root log contexts.

use std::fs;
use std::sync::OnceLock;

/// Process id and host identity, resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub hostname: String,
}

static IDENTITY: OnceLock<ProcessIdentity> = OnceLock::new();

/// The identity of the running process. Resolved on first use.
pub fn process_identity() -> &'static ProcessIdentity {
    IDENTITY.get_or_init(|| ProcessIdentity {
        pid: std::process::id(),
        hostname: resolve_hostname(),
    })
}

/// The kernel's host name first, then `HOSTNAME` and `/etc/hostname`.
fn resolve_hostname() -> String {
    system_hostname()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .or_else(|| fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
fn system_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the pointer and length describe `buf`, which outlives the call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    // truncated names may lack the terminator
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..len]).trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(not(unix))]
fn system_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_stable() {
        let first = process_identity();
        let second = process_identity();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.pid, std::process::id());
        assert!(!first.hostname.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_hostname_comes_from_the_kernel() {
        let name = system_hostname().unwrap();
        assert!(!name.is_empty());
        assert!(!name.contains('\0'));
        assert_eq!(process_identity().hostname, name);
    }
}
