//! Stackless resumable task primitive.
//!
//! A task persists exactly one resume point and a finished latch; there is
//! no retained call stack across suspensions. Any data the task body needs
//! across a suspension must live outside the task (here, in the line
//! socket), never in transient locals.

/// Outcome of driving a task body from its current resume point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The body hit a suspension point and is waiting on a transport event.
    Pending,
    /// The body ran to its end.
    Complete,
}

/// A resumable task. `P` is the resume-point type; its `Default` value
/// marks the start of the body.
#[derive(Debug)]
pub struct Task<P> {
    point: P,
    finished: bool,
}

impl<P: Default> Task<P> {
    /// Create a task positioned at the start of its body.
    pub fn start() -> Self {
        Self {
            point: P::default(),
            finished: false,
        }
    }

    /// Reset an existing task back to the start of its body.
    pub fn restart(&mut self) {
        self.point = P::default();
        self.finished = false;
    }

    /// Drive the body from the current resume point until it suspends or
    /// finishes. Once finished, further calls return `Complete` without
    /// running the body. An error leaves the task unfinished; the caller
    /// must discard the task rather than resume it.
    pub fn advance<E>(
        &mut self,
        body: impl FnOnce(&mut P) -> Result<Step, E>,
    ) -> Result<Step, E> {
        if self.finished {
            return Ok(Step::Complete);
        }
        let step = body(&mut self.point)?;
        if step == Step::Complete {
            self.finished = true;
        }
        Ok(step)
    }

    /// Whether the body has run to completion since the last start.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
