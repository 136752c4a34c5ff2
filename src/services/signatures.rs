use std::net::IpAddr;

use jiff::Timestamp;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        proposal::{Proposal, ValidationError, require, validate_email},
        signature::Signature,
        status::{ProposalStatus, TransitionError},
        store::Store,
    },
    services::{persist, proposals::GetProposalError},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum RecordSignatureError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Invalid signature: {0}")]
    Validation(#[from] ValidationError),

    #[error("Proposal cannot be signed: {0}")]
    StateConflict(#[from] TransitionError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct RecordSignatureParameters {
    pub reference: String,
    pub signer_name: String,
    pub email: String,
    pub role: Option<String>,
    pub ip_address: IpAddr,
    pub signed_at: Timestamp,
}

pub struct SignatureRecorded {
    pub signature: Signature,
    pub proposal: Proposal,
    pub signature_count: usize,
}

/// Appends a signature and moves the proposal to partially or fully signed
/// depending on how many of its required signers have signed.
pub fn record_signature(
    store: &mut Store,
    storage: &impl Storage,
    parameters: RecordSignatureParameters,
) -> Result<SignatureRecorded, RecordSignatureError> {
    require("signer_name", &parameters.signer_name)?;
    validate_email(&parameters.email)?;

    let current = store
        .find_proposal(&parameters.reference)
        .ok_or_else(|| RecordSignatureError::ProposalNotFound(parameters.reference.clone()))?;

    let signature_count = store.signature_count(current.id) + 1;
    let status = current
        .status
        .after_signature(signature_count, current.required_signers)?;

    let mut updated = current.clone();
    updated.status = status;
    updated.updated_at = parameters.signed_at;
    if status == ProposalStatus::FullySigned && updated.fully_signed_at.is_none() {
        updated.fully_signed_at = Some(parameters.signed_at);
    }

    let signature = Signature {
        id: Uuid::new_v4(),
        proposal_id: updated.id,
        signer_name: parameters.signer_name,
        email: parameters.email,
        role: parameters.role,
        signed_at: parameters.signed_at,
        ip_address: parameters.ip_address,
    };

    let snapshot = store.clone();
    store.signatures_for_mut(updated.id).append(signature.clone());
    if let Some(slot) = store.get_proposal_mut(updated.id) {
        *slot = updated.clone();
    }
    persist(store, storage, snapshot)?;

    info!(
        id = %updated.id,
        slug = %updated.slug,
        signer = %signature.email,
        signatures = signature_count,
        required = updated.required_signers,
        status = %status,
        "signature recorded"
    );
    Ok(SignatureRecorded {
        signature,
        proposal: updated,
        signature_count,
    })
}

/// Signatures of a proposal, oldest first.
pub fn get_proposal_signatures(
    store: &Store,
    reference: &str,
) -> Result<Vec<Signature>, GetProposalError> {
    let proposal = store
        .find_proposal(reference)
        .ok_or_else(|| GetProposalError::ProposalNotFound(reference.to_string()))?;

    Ok(store
        .signatures_for(proposal.id)
        .map(|trail| trail.list_ordered_by_time().into_iter().cloned().collect())
        .unwrap_or_default())
}

#[derive(Debug, Error)]
pub enum ClearSignaturesError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct ClearSignaturesResult {
    pub proposal: Proposal,
    pub removed_signatures: usize,
}

/// Wipes every signature and puts the proposal back into draft.
pub fn clear_proposal_signatures(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
) -> Result<ClearSignaturesResult, ClearSignaturesError> {
    let current = store
        .find_proposal(reference)
        .ok_or_else(|| ClearSignaturesError::ProposalNotFound(reference.to_string()))?;

    let mut updated = current.clone();
    let previous_status = updated.status;
    updated.status = previous_status.reset();
    updated.updated_at = Timestamp::now();

    let snapshot = store.clone();
    let removed_signatures = store.signatures_for_mut(updated.id).clear_all();
    store.signatures.retain(|_, trail| !trail.is_empty());
    if let Some(slot) = store.get_proposal_mut(updated.id) {
        *slot = updated.clone();
    }
    persist(store, storage, snapshot)?;

    info!(
        id = %updated.id,
        slug = %updated.slug,
        removed = removed_signatures,
        from = %previous_status,
        "signatures cleared, proposal reset to draft"
    );
    Ok(ClearSignaturesResult {
        proposal: updated,
        removed_signatures,
    })
}
