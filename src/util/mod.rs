//! util — small shared helpers.
//!
//! Contains:
//! - now_millis(): current Unix time in milliseconds (u64, saturating).
//! - env_bool(): "1|true|on|yes" parsing used for SB_* switches.
//!
//! Purpose: keep trivial helpers in one place instead of duplicating them.

/// Current Unix time in milliseconds (saturating, never panics).
#[inline]
pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis().min(u64::MAX as u128) as u64
}

/// Parse a boolean-ish env value: "1|true|on|yes" (case-insensitive) => true.
#[inline]
pub fn env_bool(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_monotonic_nonzero() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
        assert!(a > 0);
    }

    #[test]
    fn env_bool_variants() {
        assert!(env_bool("1"));
        assert!(env_bool("TRUE"));
        assert!(env_bool(" on "));
        assert!(env_bool("yes"));
        assert!(!env_bool("0"));
        assert!(!env_bool("off"));
        assert!(!env_bool(""));
    }
}
