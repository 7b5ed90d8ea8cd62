/// Control actions that can be requested from inside the optimisation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop stepping the optimiser and keep the last recorded state.
    StopEarly,
}

/// Event describing one optimisation step, as seen by a chained observer.
#[derive(Debug, Clone, Copy)]
pub struct Step<'a> {
    /// The iteration index after the driver incremented it (1 for the first step).
    pub iteration: usize,

    /// The parameter vector reported by the optimiser.
    pub x: &'a [f64],
}
