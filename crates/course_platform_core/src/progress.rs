//! Course completion arithmetic and the completion toggle state machine.

/// Completed and total video counts for one user in one course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressCounts {
    pub completed: i64,
    pub total: i64,
}

impl ProgressCounts {
    /// `round(100 * completed / total)` with halves rounded up, `0` for an empty course.
    pub fn percent(&self) -> u8 {
        if self.total <= 0 {
            return 0;
        }
        let completed = self.completed.clamp(0, self.total);
        ((200 * completed + self.total) / (2 * self.total)) as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleState {
    Idle { completed: bool },
    Pending { confirmed: bool, requested: bool },
}

/// Client-side state of a "mark complete" button.
///
/// `idle(c) -> pending -> idle(!c)` on success, `pending -> idle(c)` on failure.
/// The displayed value is always the last server-confirmed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionToggle {
    state: ToggleState,
}

impl CompletionToggle {
    pub fn new(completed: bool) -> Self {
        Self {
            state: ToggleState::Idle { completed },
        }
    }

    pub fn displayed(&self) -> bool {
        match self.state {
            ToggleState::Idle { completed } => completed,
            ToggleState::Pending { confirmed, .. } => confirmed,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ToggleState::Pending { .. })
    }

    /// Starts a toggle and returns the value to send, or `None` while one is in flight.
    pub fn begin(&mut self) -> Option<bool> {
        match self.state {
            ToggleState::Idle { completed } => {
                self.state = ToggleState::Pending {
                    confirmed: completed,
                    requested: !completed,
                };
                Some(!completed)
            }
            ToggleState::Pending { .. } => None,
        }
    }

    /// The server persisted `completed`.
    pub fn succeed(&mut self, completed: bool) {
        self.state = ToggleState::Idle { completed };
    }

    pub fn fail(&mut self) {
        if let ToggleState::Pending { confirmed, .. } = self.state {
            self.state = ToggleState::Idle {
                completed: confirmed,
            };
        }
    }

    /// The value in flight, if any.
    pub fn requested(&self) -> Option<bool> {
        match self.state {
            ToggleState::Pending { requested, .. } => Some(requested),
            ToggleState::Idle { .. } => None,
        }
    }
}
