/// Watches optimisation steps alongside the scheduled tasks.
///
/// A driver hands its chained observer a [`Step`](crate::Step) after every
/// callback, once the tasks have run. Returning `Some(Action::StopEarly)`
/// asks the optimiser to stop; `None` lets it carry on.
///
/// Any `FnMut(&E) -> Option<A>` closure is an observer, and `()` stands in
/// when nothing is chained.
pub trait Observer<E, A> {
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

/// Never asks for anything.
impl<E, A> Observer<E, A> for () {
    fn observe(&mut self, _: &E) -> Option<A> {
        None
    }
}
