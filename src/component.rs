//! The [`Component`] trait and type identity.

use std::any::TypeId;

/// Marker trait for types storable in a [`crate::Storage`].
///
/// The two associated constants let a component type override the defaults
/// used when sizing and policy-selecting its storage. Most components need
/// neither override and can derive this trait with `#[derive(Component)]`
/// (see the `rusty_macros` crate), or implement it with an empty body.
pub trait Component: 'static + Sized {
    /// Number of elements per page in this component's `Storage<Self>`. Must be
    /// a power of two. Defaults to 1024; left overridable per type since a
    /// component that's sparse across a large index space benefits from a
    /// larger page, while a dense, small one doesn't need it.
    const PAGE_SIZE: usize = 1024;

    /// When `true`, `Storage<Self>` always uses [`crate::DeletionPolicy::InPlace`]
    /// regardless of what the caller requests at construction time. Intended
    /// for components whose identity (packed position) other state depends on
    /// staying stable across erases of unrelated entities.
    const IN_PLACE_DELETE: bool = false;
}

/// A stable identifier for a component type, distinguishing every `Storage<T>`
/// instantiation (including `T = ()` and empty-struct component types) from
/// one another.
///
/// This is a thin wrapper over [`TypeId`], which is already exactly "a hash of
/// the type" — the natural Rust substitute for hashing a type's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeId(TypeId);

impl ComponentTypeId {
    /// The type identity for `T`.
    #[inline]
    pub fn of<T: Component>() -> Self {
        Self(TypeId::of::<T>())
    }
}

/// The unit type is a valid component: it runs through the same generic
/// `Storage<T>` code as any other type rather than a separate "empty
/// storage" path (see [`crate::Storage::get_as_tuple`] for what that costs
/// and why it's accepted here).
impl Component for () {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn distinct_types_have_distinct_ids() {
        assert_ne!(ComponentTypeId::of::<Position>(), ComponentTypeId::of::<Velocity>());
    }

    #[test]
    fn same_type_has_stable_id() {
        assert_eq!(ComponentTypeId::of::<Position>(), ComponentTypeId::of::<Position>());
    }

    #[test]
    fn unit_type_has_an_id_like_any_other() {
        let _ = ComponentTypeId::of::<()>();
    }

    #[test]
    fn defaults_are_reasonable() {
        assert_eq!(Position::PAGE_SIZE, 1024);
        assert!(!Position::IN_PLACE_DELETE);
    }
}
