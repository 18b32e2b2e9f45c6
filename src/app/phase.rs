use thiserror::Error;

/// Top-level lifecycle of a journal session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Starting,
    Authenticating,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    SignInRequired,
    SignedIn,
    Refresh,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event:?} while {phase:?}")]
pub struct PhaseError {
    pub phase: SessionPhase,
    pub event: PhaseEvent,
}

impl SessionPhase {
    /// Phase reached by applying `event`, or an error for moves the
    /// lifecycle does not allow.
    pub fn next(&self, event: PhaseEvent) -> Result<SessionPhase, PhaseError> {
        use PhaseEvent as E;
        use SessionPhase as P;

        let next = match (self, &event) {
            (P::Starting, E::SignInRequired) => P::Authenticating,
            (P::Starting | P::Authenticating, E::SignedIn) => P::Loading,
            (P::Ready | P::Error(_), E::Refresh) => P::Loading,
            (P::Loading, E::Loaded) => P::Ready,
            (_, E::Failed(reason)) => P::Error(reason.clone()),
            _ => {
                return Err(PhaseError {
                    phase: self.clone(),
                    event: event.clone(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SessionPhase::Ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_ready() -> anyhow::Result<()> {
        let phase = SessionPhase::default()
            .next(PhaseEvent::SignInRequired)?
            .next(PhaseEvent::SignedIn)?
            .next(PhaseEvent::Loaded)?;
        assert!(phase.is_ready());
        assert_eq!(phase.next(PhaseEvent::Refresh)?, SessionPhase::Loading);
        Ok(())
    }

    #[test]
    fn invalid_moves_are_rejected() {
        let err = SessionPhase::Starting
            .next(PhaseEvent::Loaded)
            .unwrap_err();
        assert_eq!(err.phase, SessionPhase::Starting);
        assert!(SessionPhase::Loading.next(PhaseEvent::Refresh).is_err());
    }

    #[test]
    fn failures_land_in_error_from_anywhere() -> anyhow::Result<()> {
        let phase = SessionPhase::Loading.next(PhaseEvent::Failed("offline".into()))?;
        assert_eq!(phase, SessionPhase::Error("offline".into()));
        assert_eq!(phase.next(PhaseEvent::Refresh)?, SessionPhase::Loading);
        Ok(())
    }
}
