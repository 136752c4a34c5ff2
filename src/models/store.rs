use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{proposal::Proposal, signature::SignatureTrail};

/// Current schema version
pub const CURRENT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Store {
    pub version: u32,
    pub proposals: Vec<Proposal>,
    /// Signature trails keyed by proposal id
    #[serde(default)]
    pub signatures: BTreeMap<Uuid, SignatureTrail>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            proposals: vec![],
            signatures: BTreeMap::new(),
        }
    }
}

impl Store {
    pub fn add_proposal(&mut self, proposal: Proposal) {
        self.signatures.entry(proposal.id).or_default();
        self.proposals.push(proposal);
    }

    pub fn get_proposal(&self, id: Uuid) -> Option<&Proposal> {
        self.proposals.iter().find(|p| p.id == id)
    }

    pub fn get_proposal_mut(&mut self, id: Uuid) -> Option<&mut Proposal> {
        self.proposals.iter_mut().find(|p| p.id == id)
    }

    pub fn get_proposal_by_slug(&self, slug: &str) -> Option<&Proposal> {
        self.proposals
            .iter()
            .find(|p| p.slug.eq_ignore_ascii_case(slug))
    }

    /// Resolves a UUID or a slug.
    pub fn find_proposal(&self, reference: &str) -> Option<&Proposal> {
        match reference.parse::<Uuid>() {
            Ok(id) => self.get_proposal(id),
            Err(_) => self.get_proposal_by_slug(reference),
        }
    }

    pub fn slug_exists(&self, slug: &str) -> bool {
        self.get_proposal_by_slug(slug).is_some()
    }

    pub fn signatures_for(&self, proposal_id: Uuid) -> Option<&SignatureTrail> {
        self.signatures.get(&proposal_id)
    }

    pub fn signatures_for_mut(&mut self, proposal_id: Uuid) -> &mut SignatureTrail {
        self.signatures.entry(proposal_id).or_default()
    }

    pub fn signature_count(&self, proposal_id: Uuid) -> usize {
        self.signatures_for(proposal_id)
            .map(SignatureTrail::count)
            .unwrap_or(0)
    }

    /// Removes the proposal together with its signature trail.
    pub fn remove_proposal(&mut self, id: Uuid) -> Option<(Proposal, SignatureTrail)> {
        let position = self.proposals.iter().position(|p| p.id == id)?;
        let proposal = self.proposals.remove(position);
        let trail = self.signatures.remove(&id).unwrap_or_default();
        Some((proposal, trail))
    }
}
