use jiff::Timestamp;
use slug::slugify;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        payment::{ScheduledPayment, ScheduledPaymentList},
        proposal::{
            DEFAULT_REQUIRED_SIGNERS, Proposal, ProposalSummary, ValidationError, require,
            validate_required_signers, validate_slug,
        },
        status::{ProposalStatus, TransitionError},
        store::Store,
    },
    services::{persist, resolve},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum GetProposalError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),
}

pub fn get_proposal(store: &Store, reference: &str) -> Result<Proposal, GetProposalError> {
    store
        .find_proposal(reference)
        .cloned()
        .ok_or_else(|| GetProposalError::ProposalNotFound(reference.to_string()))
}

/// Oldest first.
pub fn get_all_proposals(store: &Store) -> Vec<ProposalSummary> {
    let mut proposals: Vec<_> = store.proposals.iter().collect();
    proposals.sort_by_key(|p| p.created_at);
    proposals
        .into_iter()
        .map(|p| ProposalSummary::new(p, store.signature_count(p.id)))
        .collect()
}

#[derive(Debug, Error)]
pub enum CreateProposalError {
    #[error("Invalid proposal: {0}")]
    Validation(#[from] ValidationError),

    #[error("A proposal with slug '{0}' already exists")]
    SlugTaken(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct CreateProposalParameters {
    pub company_name: String,
    /// Derived from the company name when absent
    pub slug: Option<String>,
    pub title: String,
    pub agreement: String,
    pub custom_page_path: Option<String>,
    pub notes: Option<String>,
    pub project_id: Option<Uuid>,
    pub draft_bill_id: Option<Uuid>,
    pub payments: Vec<ScheduledPayment>,
    pub required_signers: u32,
}

impl Default for CreateProposalParameters {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            slug: None,
            title: String::new(),
            agreement: String::new(),
            custom_page_path: None,
            notes: None,
            project_id: None,
            draft_bill_id: None,
            payments: vec![],
            required_signers: DEFAULT_REQUIRED_SIGNERS,
        }
    }
}

pub fn create_proposal(
    store: &mut Store,
    storage: &impl Storage,
    parameters: CreateProposalParameters,
) -> Result<Proposal, CreateProposalError> {
    require("company_name", &parameters.company_name)?;
    require("title", &parameters.title)?;
    require("agreement", &parameters.agreement)?;
    validate_required_signers(parameters.required_signers)?;

    let slug = match parameters.slug {
        Some(slug) => {
            validate_slug(&slug)?;
            slug
        }
        None => {
            let derived = slugify(&parameters.company_name);
            if derived.is_empty() {
                return Err(ValidationError::MissingField("slug").into());
            }
            validate_slug(&derived)?;
            derived
        }
    };
    if store.slug_exists(&slug) {
        return Err(CreateProposalError::SlugTaken(slug));
    }

    let now = Timestamp::now();
    let proposal = Proposal {
        id: Uuid::new_v4(),
        slug,
        company_name: parameters.company_name,
        title: parameters.title,
        agreement: parameters.agreement,
        custom_page_path: parameters.custom_page_path,
        notes: parameters.notes,
        project_id: parameters.project_id,
        draft_bill_id: parameters.draft_bill_id,
        required_signers: parameters.required_signers,
        status: ProposalStatus::Draft,
        payments: ScheduledPaymentList::new(parameters.payments),
        created_at: now,
        updated_at: now,
        sent_at: None,
        fully_signed_at: None,
    };

    let snapshot = store.clone();
    store.add_proposal(proposal.clone());
    persist(store, storage, snapshot)?;

    info!(id = %proposal.id, slug = %proposal.slug, "proposal created");
    Ok(proposal)
}

#[derive(Debug, Error)]
pub enum UpdateProposalError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Slug is fixed at creation: '{current}' cannot become '{requested}'")]
    SlugImmutable { current: String, requested: String },

    #[error("Proposal is {0}; only drafts can be edited (clear signatures to reopen it)")]
    NotEditable(ProposalStatus),

    #[error("Invalid proposal: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Partial update. `None` leaves a field alone; for optional fields
/// `Some(None)` clears them.
#[derive(Default)]
pub struct UpdateProposalParameters {
    pub reference: String,
    /// Only accepted when equal to the current slug
    pub slug: Option<String>,
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub agreement: Option<String>,
    pub custom_page_path: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub project_id: Option<Option<Uuid>>,
    pub draft_bill_id: Option<Option<Uuid>>,
    pub payments: Option<Vec<ScheduledPayment>>,
    pub required_signers: Option<u32>,
}

impl UpdateProposalParameters {
    /// Notes stay editable whatever the status; everything else needs a draft.
    fn touches_content(&self) -> bool {
        self.company_name.is_some()
            || self.title.is_some()
            || self.agreement.is_some()
            || self.custom_page_path.is_some()
            || self.project_id.is_some()
            || self.draft_bill_id.is_some()
            || self.payments.is_some()
            || self.required_signers.is_some()
    }
}

pub fn update_proposal(
    store: &mut Store,
    storage: &impl Storage,
    parameters: UpdateProposalParameters,
) -> Result<Proposal, UpdateProposalError> {
    let current = store
        .find_proposal(&parameters.reference)
        .ok_or_else(|| UpdateProposalError::ProposalNotFound(parameters.reference.clone()))?;

    if let Some(requested) = &parameters.slug
        && requested != &current.slug
    {
        return Err(UpdateProposalError::SlugImmutable {
            current: current.slug.clone(),
            requested: requested.clone(),
        });
    }
    if parameters.touches_content() && !current.status.is_editable() {
        return Err(UpdateProposalError::NotEditable(current.status));
    }
    if let Some(company_name) = &parameters.company_name {
        require("company_name", company_name)?;
    }
    if let Some(title) = &parameters.title {
        require("title", title)?;
    }
    if let Some(agreement) = &parameters.agreement {
        require("agreement", agreement)?;
    }
    if let Some(required) = parameters.required_signers {
        validate_required_signers(required)?;
    }

    let mut updated = current.clone();
    if let Some(company_name) = parameters.company_name {
        updated.company_name = company_name;
    }
    if let Some(title) = parameters.title {
        updated.title = title;
    }
    if let Some(agreement) = parameters.agreement {
        updated.agreement = agreement;
    }
    if let Some(custom_page_path) = parameters.custom_page_path {
        updated.custom_page_path = custom_page_path;
    }
    if let Some(notes) = parameters.notes {
        updated.notes = notes;
    }
    if let Some(project_id) = parameters.project_id {
        updated.project_id = project_id;
    }
    if let Some(draft_bill_id) = parameters.draft_bill_id {
        updated.draft_bill_id = draft_bill_id;
    }
    if let Some(payments) = parameters.payments {
        updated.payments = ScheduledPaymentList::new(payments);
    }
    if let Some(required) = parameters.required_signers {
        updated.required_signers = required;
    }
    updated.updated_at = Timestamp::now();

    let snapshot = store.clone();
    if let Some(slot) = store.get_proposal_mut(updated.id) {
        *slot = updated.clone();
    }
    persist(store, storage, snapshot)?;

    info!(id = %updated.id, slug = %updated.slug, "proposal updated");
    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DeleteProposalError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct DeleteProposalResult {
    pub proposal: Proposal,
    pub removed_payments: usize,
    pub removed_signatures: usize,
}

/// Hard delete of the proposal, its payment schedule and its signatures.
pub fn delete_proposal(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
) -> Result<DeleteProposalResult, DeleteProposalError> {
    let id = resolve(store, reference)
        .ok_or_else(|| DeleteProposalError::ProposalNotFound(reference.to_string()))?;

    let snapshot = store.clone();
    let Some((proposal, trail)) = store.remove_proposal(id) else {
        return Err(DeleteProposalError::ProposalNotFound(reference.to_string()));
    };
    persist(store, storage, snapshot)?;

    info!(
        id = %proposal.id,
        slug = %proposal.slug,
        signatures = trail.count(),
        "proposal deleted"
    );
    Ok(DeleteProposalResult {
        removed_payments: proposal.payments.len(),
        removed_signatures: trail.count(),
        proposal,
    })
}

#[derive(Debug, Error)]
pub enum TransitionProposalError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("{0}")]
    StateConflict(#[from] TransitionError),

    #[error("Payment schedule is incomplete: positions {positions:?} have no day offset")]
    IncompleteSchedule { positions: Vec<usize> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Marks a draft as sent. The payment schedule must be complete so due
/// dates can be computed once it is signed.
pub fn send_proposal(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
) -> Result<Proposal, TransitionProposalError> {
    transition_proposal(store, storage, reference, ProposalStatus::Sent)
}

pub fn expire_proposal(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
) -> Result<Proposal, TransitionProposalError> {
    transition_proposal(store, storage, reference, ProposalStatus::Expired)
}

pub fn cancel_proposal(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
) -> Result<Proposal, TransitionProposalError> {
    transition_proposal(store, storage, reference, ProposalStatus::Cancelled)
}

fn transition_proposal(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
    target: ProposalStatus,
) -> Result<Proposal, TransitionProposalError> {
    let current = store
        .find_proposal(reference)
        .ok_or_else(|| TransitionProposalError::ProposalNotFound(reference.to_string()))?;

    let status = current.status.transition_to(target)?;
    if status == ProposalStatus::Sent {
        let positions = current.payments.missing_offsets();
        if !positions.is_empty() {
            return Err(TransitionProposalError::IncompleteSchedule { positions });
        }
    }

    let mut updated = current.clone();
    let now = Timestamp::now();
    updated.status = status;
    updated.updated_at = now;
    if status == ProposalStatus::Sent && updated.sent_at.is_none() {
        updated.sent_at = Some(now);
    }

    let snapshot = store.clone();
    if let Some(slot) = store.get_proposal_mut(updated.id) {
        *slot = updated.clone();
    }
    persist(store, storage, snapshot)?;

    info!(id = %updated.id, slug = %updated.slug, status = %status, "proposal status changed");
    Ok(updated)
}
