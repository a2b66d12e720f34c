//! Views from a subtype's state onto the state of its base type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

type View = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;
type ViewMut = Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

fn view<F>(f: F) -> View
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn view_mut<F>(f: F) -> ViewMut
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Borrows the embedded base state out of a subtype's state.
///
/// Subtypes usually embed their base struct as a field; members inherited
/// from the base are read and written through this projection.
#[derive(Clone)]
pub struct StateProjection {
    view: View,
    view_mut: ViewMut,
}

impl StateProjection {
    pub fn new<T: Any, B: Any>(get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        Self {
            view: view(move |state: &dyn Any| {
                state.downcast_ref::<T>().map(|target| get(target) as &dyn Any)
            }),
            view_mut: view_mut(move |state: &mut dyn Any| {
                state
                    .downcast_mut::<T>()
                    .map(|target| get_mut(target) as &mut dyn Any)
            }),
        }
    }

    #[must_use]
    pub fn view<'a>(&self, state: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.view)(state)
    }

    pub fn view_mut<'a>(&self, state: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.view_mut)(state)
    }

    /// This projection followed by `next`.
    #[must_use]
    pub fn then(&self, next: &StateProjection) -> StateProjection {
        let (first, second) = (Arc::clone(&self.view), Arc::clone(&next.view));
        let (first_mut, second_mut) = (Arc::clone(&self.view_mut), Arc::clone(&next.view_mut));
        Self {
            view: view(move |state: &dyn Any| first(state).and_then(|inner| second(inner))),
            view_mut: view_mut(move |state: &mut dyn Any| {
                first_mut(state).and_then(|inner| second_mut(inner))
            }),
        }
    }
}

impl fmt::Debug for StateProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateProjection")
    }
}
