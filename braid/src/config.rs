//! Build-time tunables.
//!
//! Every constant can be overridden when compiling the crate by exporting an
//! environment variable named after it with a `BRAID_` prefix, for example
//! `BRAID_POOL_LEVELS=32 cargo build`. Malformed values fall back to the
//! default.

/// Maximum number of bytes a thread caches per frame size class.
pub const POOL_MAX_CACHE_BYTES: usize =
    parse_or(option_env!("BRAID_POOL_MAX_CACHE_BYTES"), 102_400);

/// Size-class step, expressed in pointers.
pub const POOL_STEP_POINTERS: usize = parse_or(option_env!("BRAID_POOL_STEP_POINTERS"), 10);

/// Number of size classes served by the pool.
pub const POOL_LEVELS: usize = parse_or(option_env!("BRAID_POOL_LEVELS"), 20);

/// Percentage applied to the nominal size of [`StaticStorage`] buffers.
///
/// [`StaticStorage`]: crate::alloc::StaticStorage
pub const STATIC_STORAGE_PERCENT: usize =
    parse_or(option_env!("BRAID_STATIC_STORAGE_PERCENT"), 100);

/// Size-class step in bytes.
pub const POOL_STEP_BYTES: usize = POOL_STEP_POINTERS * size_of::<usize>();

/// Largest frame served by the pool; bigger frames go to the host allocator.
pub const POOL_MAX_FRAME: usize = POOL_STEP_BYTES * POOL_LEVELS;

const fn parse_or(value: Option<&str>, default: usize) -> usize {
    let Some(text) = value else {
        return default;
    };

    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return default;
    }

    let mut out: usize = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if !b.is_ascii_digit() {
            return default;
        }

        out = match out.checked_mul(10) {
            Some(v) => match v.checked_add((b - b'0') as usize) {
                Some(v) => v,
                None => return default,
            },
            None => return default,
        };
        i += 1;
    }

    if out == 0 { default } else { out }
}

#[cfg(test)]
mod tests {
    use super::parse_or;

    #[test]
    fn parses_overrides() {
        assert_eq!(parse_or(Some("42"), 7), 42);
        assert_eq!(parse_or(None, 7), 7);
        assert_eq!(parse_or(Some(""), 7), 7);
        assert_eq!(parse_or(Some("4x"), 7), 7);
        assert_eq!(parse_or(Some("0"), 7), 7);
    }
}
