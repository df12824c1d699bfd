use std::fmt::Debug;
use std::hash::Hash;

/// A domain object distinguished by identity rather than by its fields.
///
/// Two cart lines holding the same product and quantity are still different
/// lines; a line keeps its identity while its quantity changes. Equality of
/// ids, not of contents, is what callers should compare.
pub trait Entity {
    /// Identifier type; stable for the entity's whole lifetime.
    type Id: Clone + Eq + Hash + Debug;

    fn id(&self) -> &Self::Id;
}
