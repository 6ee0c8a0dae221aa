//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Records persisted through the storage boundary are entities keyed by a
/// surrogate identifier.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;
}
