//! Yes/no prompts the session raises before destructive or invalid starts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

/// Invoked from the session's control loop only, one prompt at a time.
pub trait ConfirmationGate: Send + Sync {
    /// Existing results would be deleted by the next search.
    fn confirm_clear_existing_results(&self) -> Confirmation;

    /// Acknowledgement only; `selected` is how many nodes were chosen.
    fn notify_insufficient_selection(&self, selected: usize);
}

/// Answers every confirmation the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoGate {
    answer: Confirmation,
}

impl AutoGate {
    pub fn new(answer: Confirmation) -> Self {
        Self { answer }
    }
}

impl ConfirmationGate for AutoGate {
    fn confirm_clear_existing_results(&self) -> Confirmation {
        log::info!("clearing existing results: {:?}", self.answer);
        self.answer
    }

    fn notify_insufficient_selection(&self, selected: usize) {
        log::warn!(
            "TWO nodes are required to start relation path discovery ({} selected)",
            selected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_gate_confirms() {
        let gate = AutoGate::new(Confirmation::Confirmed);
        assert_eq!(gate.confirm_clear_existing_results(), Confirmation::Confirmed);
    }

    #[test]
    fn test_auto_gate_declines() {
        let gate = AutoGate::new(Confirmation::Declined);
        assert_eq!(gate.confirm_clear_existing_results(), Confirmation::Declined);
        gate.notify_insufficient_selection(1);
        assert_eq!(gate.confirm_clear_existing_results(), Confirmation::Declined);
    }
}
