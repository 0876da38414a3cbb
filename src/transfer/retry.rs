/// Bounded retransmission of the last outstanding packet. Every timeout consumes one retry;
///  progress (the peer's expected answer) resets the budget.
#[derive(Debug)]
pub struct RetryBudget {
    max_retries: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> RetryBudget {
        RetryBudget { max_retries, used: 0 }
    }

    /// Returns true if the outstanding packet should be re-sent, false if the budget is exhausted
    #[must_use]
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.max_retries {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// total number of sends of the outstanding packet so far, including the original one
    pub fn attempts(&self) -> u32 {
        self.used + 1
    }
}
