//! Construction errors.

/// Errors surfaced when building a JIT instance. Everything at run time is
/// either recovered internally or reported through halt reasons.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("code cache of {size} bytes is too small (minimum {minimum})")]
    CodeCacheTooSmall { size: usize, minimum: usize },

    #[error("far code offset {offset} must lie inside the code cache of {size} bytes")]
    FarCodeOffsetOutOfRange { offset: usize, size: usize },
}

pub(crate) fn validate_cache_sizes(size: usize, far_offset: usize) -> Result<(), Error> {
    // Room for the constant pool, the prelude and at least one block window
    // on either side of the far boundary.
    const MINIMUM: usize = 8 * 1024 * 1024;
    if size < MINIMUM {
        return Err(Error::CodeCacheTooSmall { size, minimum: MINIMUM });
    }
    if far_offset >= size || far_offset < MINIMUM / 2 {
        return Err(Error::FarCodeOffsetOutOfRange { offset: far_offset, size });
    }
    Ok(())
}
