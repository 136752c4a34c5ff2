use std::net::IpAddr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// UUID of the signature
    pub id: Uuid,
    /// Proposal this signature belongs to
    pub proposal_id: Uuid,
    /// Name typed by the signer
    pub signer_name: String,
    /// Email of the signer
    pub email: String,
    /// Role the signer signs as (e.g. "client", "company")
    pub role: Option<String>,
    /// When the signature was recorded
    pub signed_at: Timestamp,
    /// Network address the signature came from
    pub ip_address: IpAddr,
}

/// Append-only log of signatures for one proposal.
///
/// Entries are never edited; the whole log can only be wiped at once.
#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq)]
pub struct SignatureTrail {
    entries: Vec<Signature>,
}

impl SignatureTrail {
    pub fn append(&mut self, signature: Signature) {
        self.entries.push(signature);
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first; ties keep insertion order.
    pub fn list_ordered_by_time(&self) -> Vec<&Signature> {
        let mut ordered: Vec<&Signature> = self.entries.iter().collect();
        ordered.sort_by_key(|s| s.signed_at);
        ordered
    }

    /// Returns how many signatures were removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }
}
