use std::fmt;

/// Where a delivery session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Started,
    AwaitingUnit,
    DispatchingCommand,
    AwaitingField,
    Cancelling,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded
                | SessionState::Failed
                | SessionState::Cancelled
                | SessionState::TimedOut
        )
    }

    /// The working states a running session cycles through.
    fn is_working(&self) -> bool {
        matches!(
            self,
            SessionState::AwaitingUnit
                | SessionState::DispatchingCommand
                | SessionState::AwaitingField
        )
    }

    /// Allowed transitions. A session never goes back to `Created` or
    /// `Started` and never leaves a terminal state; the working states alternate
    /// with `AwaitingUnit` once per exchanged unit.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Created, Started) | (Created, Cancelled) => true,
            (Started, AwaitingUnit) => true,
            (AwaitingUnit, DispatchingCommand) | (AwaitingUnit, AwaitingField) => true,
            (DispatchingCommand, AwaitingUnit) | (AwaitingField, AwaitingUnit) => true,
            (Started, Cancelling) => true,
            (s, Cancelling) if s.is_working() => true,
            (Cancelling, Cancelled) => true,
            (Started, Succeeded | Failed | TimedOut) => true,
            (s, Succeeded | Failed | TimedOut) if s.is_working() => true,
            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Started => "started",
            SessionState::AwaitingUnit => "awaiting-unit",
            SessionState::DispatchingCommand => "dispatching-command",
            SessionState::AwaitingField => "awaiting-field",
            SessionState::Cancelling => "cancelling",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
            SessionState::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}
