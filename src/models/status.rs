use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a proposal.
///
/// Forward path: `Draft -> Sent -> PartiallySigned -> FullySigned`.
/// `Expired` and `Cancelled` branch off `Sent` or `PartiallySigned`.
/// Any status may be reset back to `Draft`, which only happens when the
/// signatures are cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    #[default]
    Draft,
    Sent,
    PartiallySigned,
    FullySigned,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot move proposal from {from} to {to}")]
pub struct TransitionError {
    pub from: ProposalStatus,
    pub to: ProposalStatus,
}

impl ProposalStatus {
    pub const ALL: [ProposalStatus; 6] = [
        ProposalStatus::Draft,
        ProposalStatus::Sent,
        ProposalStatus::PartiallySigned,
        ProposalStatus::FullySigned,
        ProposalStatus::Expired,
        ProposalStatus::Cancelled,
    ];

    /// Content and payment schedule may only be edited while drafting.
    pub fn is_editable(&self) -> bool {
        matches!(self, ProposalStatus::Draft)
    }

    /// Whether a new signature may be recorded in this status.
    pub fn accepts_signatures(&self) -> bool {
        matches!(self, ProposalStatus::Sent | ProposalStatus::PartiallySigned)
    }

    /// Terminal absent an explicit reset.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::FullySigned | ProposalStatus::Expired | ProposalStatus::Cancelled
        )
    }

    /// Forward transitions. Resetting to `Draft` is not part of this table,
    /// see [`ProposalStatus::reset`].
    pub fn can_transition_to(&self, target: &ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, target),
            (Draft, Sent)
                | (Sent, PartiallySigned)
                | (Sent, FullySigned)
                | (Sent, Expired)
                | (Sent, Cancelled)
                | (PartiallySigned, PartiallySigned)
                | (PartiallySigned, FullySigned)
                | (PartiallySigned, Expired)
                | (PartiallySigned, Cancelled)
        )
    }

    pub fn valid_transitions(&self) -> Vec<ProposalStatus> {
        ProposalStatus::ALL
            .into_iter()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }

    pub fn transition_to(&self, target: ProposalStatus) -> Result<ProposalStatus, TransitionError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(TransitionError {
                from: *self,
                to: target,
            })
        }
    }

    /// Status a proposal should be in after receiving its `signed`-th signature.
    pub fn after_signature(
        &self,
        signed: usize,
        required: u32,
    ) -> Result<ProposalStatus, TransitionError> {
        let target = if signed >= required as usize {
            ProposalStatus::FullySigned
        } else {
            ProposalStatus::PartiallySigned
        };

        if !self.accepts_signatures() {
            return Err(TransitionError {
                from: *self,
                to: target,
            });
        }

        self.transition_to(target)
    }

    /// Always allowed.
    pub fn reset(&self) -> ProposalStatus {
        ProposalStatus::Draft
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "DRAFT",
            ProposalStatus::Sent => "SENT",
            ProposalStatus::PartiallySigned => "PARTIALLY_SIGNED",
            ProposalStatus::FullySigned => "FULLY_SIGNED",
            ProposalStatus::Expired => "EXPIRED",
            ProposalStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProposalStatus::*;

    #[test]
    fn default_is_draft() {
        assert_eq!(ProposalStatus::default(), Draft);
    }

    #[test]
    fn draft_can_only_be_sent() {
        assert_eq!(Draft.valid_transitions(), vec![Sent]);
    }

    #[test]
    fn expired_and_cancelled_reachable_from_sent_and_partially_signed() {
        for from in [Sent, PartiallySigned] {
            assert!(from.can_transition_to(&Expired));
            assert!(from.can_transition_to(&Cancelled));
        }
        assert!(!Draft.can_transition_to(&Expired));
        assert!(!FullySigned.can_transition_to(&Cancelled));
    }

    #[test]
    fn terminal_statuses_have_no_forward_transitions() {
        for status in [FullySigned, Expired, Cancelled] {
            assert!(status.is_terminal());
            assert!(status.valid_transitions().is_empty());
        }
    }

    #[test]
    fn transition_to_reports_both_statuses() {
        let err = Cancelled.transition_to(PartiallySigned).unwrap_err();
        assert_eq!(err.from, Cancelled);
        assert_eq!(err.to, PartiallySigned);
        assert_eq!(
            err.to_string(),
            "Cannot move proposal from CANCELLED to PARTIALLY_SIGNED"
        );
    }

    #[test]
    fn after_signature_counts_against_required() {
        assert_eq!(Sent.after_signature(1, 2), Ok(PartiallySigned));
        assert_eq!(PartiallySigned.after_signature(2, 2), Ok(FullySigned));
        assert_eq!(Sent.after_signature(1, 1), Ok(FullySigned));
    }

    #[test]
    fn after_signature_rejects_draft_and_terminal() {
        assert!(Draft.after_signature(1, 2).is_err());
        assert!(FullySigned.after_signature(3, 2).is_err());
        assert!(Cancelled.after_signature(1, 2).is_err());
        assert!(Expired.after_signature(1, 2).is_err());
    }

    #[test]
    fn reset_returns_draft_from_anywhere() {
        for status in ProposalStatus::ALL {
            assert_eq!(status.reset(), Draft);
        }
    }

    #[test]
    fn serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&PartiallySigned).unwrap();
        assert_eq!(json, "\"PARTIALLY_SIGNED\"");
        let parsed: ProposalStatus = serde_json::from_str("\"FULLY_SIGNED\"").unwrap();
        assert_eq!(parsed, FullySigned);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(serde_json::from_str::<ProposalStatus>("\"ARCHIVED\"").is_err());
    }
}
