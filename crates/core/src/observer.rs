/// Receives events emitted by a running solver or simulation.
///
/// The `observe` method returns `Option<A>`, where `Some(action)` asks the
/// emitter for an emitter-specific action and `None` leaves it undisturbed.
/// Emitters that support no actions use [`std::convert::Infallible`] for `A`,
/// which makes observation purely informational.
///
/// Closures of the form `FnMut(&E) -> Option<A>` implement `Observer`, and
/// `()` is the no-op observer.
pub trait Observer<E, A> {
    /// Observes one event and optionally returns an action.
    fn observe(&mut self, event: &E) -> Option<A>;
}

impl<E, A, F> Observer<E, A> for F
where
    F: FnMut(&E) -> Option<A>,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self(event)
    }
}

impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _event: &E) -> Option<A> {
        None
    }
}
