use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use slug::slugify;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{payment::ScheduledPaymentList, status::ProposalStatus};

/// Company + client.
pub const DEFAULT_REQUIRED_SIGNERS: u32 = 2;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Proposal {
    /// UUID of the proposal
    pub id: Uuid,
    /// URL slug, fixed at creation
    pub slug: String,
    /// Company the proposal is addressed to
    pub company_name: String,
    /// Title of the proposal
    pub title: String,
    /// Agreement body in markdown
    pub agreement: String,
    /// Custom public page path
    pub custom_page_path: Option<String>,
    /// Internal notes
    pub notes: Option<String>,
    /// Associated project if any
    pub project_id: Option<Uuid>,
    /// Draft bill generated for this proposal if any
    pub draft_bill_id: Option<Uuid>,
    /// Number of signatures needed to be fully signed
    pub required_signers: u32,
    pub status: ProposalStatus,
    /// Payment milestones, in order
    pub payments: ScheduledPaymentList,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// First time the proposal was sent
    pub sent_at: Option<Timestamp>,
    /// First time the proposal became fully signed
    pub fully_signed_at: Option<Timestamp>,
}

impl Default for Proposal {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            slug: String::new(),
            company_name: String::new(),
            title: String::new(),
            agreement: String::new(),
            custom_page_path: None,
            notes: None,
            project_id: None,
            draft_bill_id: None,
            required_signers: DEFAULT_REQUIRED_SIGNERS,
            status: ProposalStatus::Draft,
            payments: ScheduledPaymentList::default(),
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
            sent_at: None,
            fully_signed_at: None,
        }
    }
}

/// Row shown when listing proposals.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProposalSummary {
    pub id: Uuid,
    pub slug: String,
    pub company_name: String,
    pub title: String,
    pub status: ProposalStatus,
    pub signature_count: usize,
    pub required_signers: u32,
    pub created_at: Timestamp,
}

impl ProposalSummary {
    pub fn new(proposal: &Proposal, signature_count: usize) -> Self {
        Self {
            id: proposal.id,
            slug: proposal.slug.clone(),
            company_name: proposal.company_name.clone(),
            title: proposal.title.clone(),
            status: proposal.status,
            signature_count,
            required_signers: proposal.required_signers,
            created_at: proposal.created_at,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Slug '{0}' is not valid, expected something like '{1}'")]
    InvalidSlug(String, String),

    #[error("Slug '{0}' looks like a proposal id; slugs and ids share one lookup")]
    SlugIsUuid(String),

    #[error("Email '{0}' is not valid")]
    InvalidEmail(String),

    #[error("A proposal needs at least one required signer")]
    NoRequiredSigners,
}

/// Rejects empty or whitespace-only values for required text fields.
pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// A slug is valid when slugifying it is a no-op and it cannot be read as
/// a uuid, since references try the uuid form first.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let normalized = slugify(slug);
    if normalized.is_empty() || normalized != slug {
        return Err(ValidationError::InvalidSlug(slug.to_string(), normalized));
    }
    if slug.parse::<Uuid>().is_ok() {
        return Err(ValidationError::SlugIsUuid(slug.to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

pub fn validate_required_signers(required: u32) -> Result<(), ValidationError> {
    if required == 0 {
        return Err(ValidationError::NoRequiredSigners);
    }
    Ok(())
}
