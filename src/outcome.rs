// ABOUTME: Statement-execution outcome, replacing exception-based control flow

use crate::value::Value;

/// What happened while executing a statement or block, on the success path.
/// `break`/`continue`/`return` are ordinary data flowing back up through
/// `execute`, not unwinding exceptions — the resolver guarantees `Broke`/
/// `Continued` never escape past their enclosing loop. `report`/`stop()`
/// instead ride the `Result::Err` channel (see `RuntimeError::Reported` and
/// `RuntimeError::Halted`), since those two must unwind across function call
/// boundaries that `Outcome` alone does not cross.
#[derive(Debug, Clone)]
pub enum Outcome {
    Normal,
    Broke,
    Continued,
    Returned(Value),
}

impl Outcome {
    pub fn is_normal(&self) -> bool {
        matches!(self, Outcome::Normal)
    }

    pub fn interrupts(&self) -> bool {
        !matches!(self, Outcome::Normal)
    }
}
