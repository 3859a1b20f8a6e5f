//! Type-erased projected values and the equality predicate over them.
//!
//! Selectors registered on one listener project to different value types, so
//! the last-value cache stores them as `Arc<dyn Projection>`. Any
//! `Debug + PartialEq` value that is `Send + Sync + 'static` is a projection.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// A value produced by a selector, as seen by the cache and the equality
/// function.
pub trait Projection: Any + Debug + Send + Sync {
    /// Access the concrete value for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// `PartialEq` across the erased boundary. Values of different concrete
    /// types are never equal.
    fn dyn_eq(&self, other: &dyn Projection) -> bool;
}

impl<T> Projection for T
where
    T: Any + Debug + PartialEq + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn Projection) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// Predicate deciding whether a selector's previous and next projections are
/// the same. Effects fire only when it returns `false`.
pub type EqualityFn = Arc<dyn Fn(&dyn Projection, &dyn Projection) -> bool + Send + Sync>;

/// Default equality: the values' own `PartialEq`.
///
/// For `Arc`-held values this compares contents. Supply a custom
/// [`EqualityFn`] that downcasts and uses `Arc::ptr_eq` to get reference
/// semantics instead.
pub fn value_eq(previous: &dyn Projection, next: &dyn Projection) -> bool {
    previous.dyn_eq(next)
}

pub(crate) fn default_equality() -> EqualityFn {
    Arc::new(value_eq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct User {
        name: &'static str,
    }

    #[test]
    fn value_eq_uses_partial_eq() {
        assert!(value_eq(&3_i64, &3_i64));
        assert!(!value_eq(&3_i64, &4_i64));
        assert!(value_eq(&User { name: "John" }, &User { name: "John" }));
    }

    #[test]
    fn values_of_different_types_are_unequal() {
        assert!(!value_eq(&3_i64, &3_i32));
        assert!(!value_eq(&"3", &String::from("3")));
    }

    #[test]
    fn projections_downcast_to_their_concrete_type() {
        let erased: Arc<dyn Projection> = Arc::new(User { name: "Michel" });

        let user = erased.as_any().downcast_ref::<User>();
        assert_eq!(user, Some(&User { name: "Michel" }));
    }

    #[test]
    fn pointer_equality_is_expressible() {
        let ptr_eq: EqualityFn = Arc::new(|a, b| {
            match (
                a.as_any().downcast_ref::<Arc<User>>(),
                b.as_any().downcast_ref::<Arc<User>>(),
            ) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
        });

        let john = Arc::new(User { name: "John" });
        let twin = Arc::new(User { name: "John" });

        assert!(ptr_eq(&john, &john.clone()));
        assert!(!ptr_eq(&john, &twin));
        assert!(value_eq(&john, &twin));
    }
}
