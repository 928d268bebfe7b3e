//! Memory access ordering classes.

/// Ordering semantics attached to each memory micro-op, decoded from the
/// guest instruction. Selects which host barriers the memory emitters place
/// around the access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccType {
    /// Plain access.
    Normal,
    /// Atomic access (load/store exclusive pairs).
    Atomic,
    /// Load-acquire / store-release.
    Ordered,
    /// Acquire-release pair semantics on a read-modify-write.
    OrderedRw,
    /// LDAPR-style limited ordering.
    LimitedOrdered,
}
