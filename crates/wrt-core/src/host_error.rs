use core::any::{Any, TypeId};

/// Trait that allows the host to plug a custom error type into a [`Trap`](crate::Trap).
///
/// Mirrors the teacher's `HostError` trait (`src/host.rs`): any `Display + Debug`
/// type that is `'static` can be stored in a trap and downcast back out of it.
pub trait HostError: 'static + core::fmt::Display + core::fmt::Debug + Send + Sync {
    #[doc(hidden)]
    fn type_id_priv(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> HostError for T
where
    T: 'static + core::fmt::Display + core::fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn HostError {
    pub fn downcast_ref<T: HostError>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: HostError>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}
