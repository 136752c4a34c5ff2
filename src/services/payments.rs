use jiff::{Timestamp, civil::Date, tz::TimeZone};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::{
    models::{
        payment::{PaymentField, ScheduleError, ScheduledPayment, ScheduledPaymentList},
        proposal::Proposal,
        status::ProposalStatus,
        store::Store,
    },
    services::persist,
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum EditPaymentError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Proposal is {0}; the payment schedule can only change while drafting")]
    NotEditable(ProposalStatus),

    #[error("{0}")]
    Schedule(#[from] ScheduleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub struct AddPaymentParameters {
    pub reference: String,
    pub days_after_previous: Option<u32>,
    pub description: Option<String>,
    pub bill_id: Option<Uuid>,
}

pub fn add_payment(
    store: &mut Store,
    storage: &impl Storage,
    parameters: AddPaymentParameters,
) -> Result<Proposal, EditPaymentError> {
    let reference = parameters.reference.clone();
    edit_schedule(store, storage, &reference, |payments| {
        let payment = ScheduledPayment {
            bill_id: parameters.bill_id,
            days_after_previous: parameters.days_after_previous,
            description: parameters.description,
        };
        if payment == ScheduledPayment::default() {
            payments.append_empty();
        } else {
            payments.append(payment);
        }
        Ok(())
    })
}

pub fn remove_payment(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
    index: usize,
) -> Result<Proposal, EditPaymentError> {
    edit_schedule(store, storage, reference, |payments| {
        payments.remove_at(index).map(|_| ())
    })
}

pub fn update_payment(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
    index: usize,
    field: PaymentField,
) -> Result<Proposal, EditPaymentError> {
    edit_schedule(store, storage, reference, |payments| {
        payments.update_at(index, field)
    })
}

fn edit_schedule(
    store: &mut Store,
    storage: &impl Storage,
    reference: &str,
    edit: impl FnOnce(&mut ScheduledPaymentList) -> Result<(), ScheduleError>,
) -> Result<Proposal, EditPaymentError> {
    let current = store
        .find_proposal(reference)
        .ok_or_else(|| EditPaymentError::ProposalNotFound(reference.to_string()))?;
    if !current.status.is_editable() {
        return Err(EditPaymentError::NotEditable(current.status));
    }

    let mut updated = current.clone();
    edit(&mut updated.payments)?;
    updated.updated_at = Timestamp::now();

    let snapshot = store.clone();
    if let Some(slot) = store.get_proposal_mut(updated.id) {
        *slot = updated.clone();
    }
    persist(store, storage, snapshot)?;

    info!(
        id = %updated.id,
        slug = %updated.slug,
        payments = updated.payments.len(),
        "payment schedule updated"
    );
    Ok(updated)
}

#[derive(Debug, Error)]
pub enum DueDatesError {
    #[error("Proposal '{0}' not found")]
    ProposalNotFound(String),

    #[error("Proposal '{0}' has not been fully signed; pass a signing date to preview")]
    NotSigned(String),

    #[error("{0}")]
    Schedule(#[from] ScheduleError),
}

pub struct DueDatesParameters {
    pub reference: String,
    /// Overrides the proposal's own signing date
    pub signed_on: Option<Date>,
    /// Zone used to turn the signing timestamp into a calendar date
    pub time_zone: TimeZone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueMilestone {
    pub position: usize,
    pub description: Option<String>,
    pub bill_id: Option<Uuid>,
    pub days_after_previous: u32,
    pub due_on: Date,
}

pub struct DueSchedule {
    pub signed_on: Date,
    pub milestones: Vec<DueMilestone>,
}

pub fn proposal_due_dates(
    store: &Store,
    parameters: DueDatesParameters,
) -> Result<DueSchedule, DueDatesError> {
    let proposal = store
        .find_proposal(&parameters.reference)
        .ok_or_else(|| DueDatesError::ProposalNotFound(parameters.reference.clone()))?;

    // The completing signature of the current trail; `fully_signed_at` keeps
    // the first signing and survives resets.
    let completed_at = store
        .signatures_for(proposal.id)
        .and_then(|trail| trail.list_ordered_by_time().last().map(|s| s.signed_at))
        .filter(|_| proposal.status == ProposalStatus::FullySigned);

    let signed_on = match (parameters.signed_on, completed_at) {
        (Some(date), _) => date,
        (None, Some(signed_at)) => signed_at.to_zoned(parameters.time_zone).date(),
        (None, None) => return Err(DueDatesError::NotSigned(proposal.slug.clone())),
    };

    let due_dates = proposal.payments.compute_due_dates(signed_on)?;
    let milestones = proposal
        .payments
        .iter()
        .zip(due_dates)
        .enumerate()
        .map(|(position, (payment, due_on))| DueMilestone {
            position,
            description: payment.description.clone(),
            bill_id: payment.bill_id,
            days_after_previous: payment.days_after_previous.unwrap_or_default(),
            due_on,
        })
        .collect();

    Ok(DueSchedule {
        signed_on,
        milestones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    use crate::services::{
        fixtures::store_with_acme,
        proposals::{get_proposal, send_proposal},
        signatures::{RecordSignatureParameters, clear_proposal_signatures, record_signature},
    };

    fn preview(reference: &str, signed_on: Option<Date>) -> DueDatesParameters {
        DueDatesParameters {
            reference: reference.to_string(),
            signed_on,
            time_zone: TimeZone::UTC,
        }
    }

    fn sign_fully(store: &mut Store, storage: &impl Storage, at: &str) {
        send_proposal(store, storage, "acme-co").unwrap();
        for name in ["ada", "grace"] {
            record_signature(
                store,
                storage,
                RecordSignatureParameters {
                    reference: "acme-co".to_string(),
                    signer_name: name.to_string(),
                    email: format!("{}@example.com", name),
                    role: None,
                    ip_address: "198.51.100.1".parse().unwrap(),
                    signed_at: at.parse().unwrap(),
                },
            )
            .unwrap();
        }
    }

    #[test]
    fn acme_due_dates_after_signing_on_new_year() {
        let (mut store, storage, _) = store_with_acme();
        sign_fully(&mut store, &storage, "2025-01-01T12:00:00Z");

        let schedule = proposal_due_dates(&store, preview("acme-co", None)).unwrap();

        assert_eq!(schedule.signed_on, date(2025, 1, 1));
        let due: Vec<_> = schedule.milestones.iter().map(|m| m.due_on).collect();
        assert_eq!(due, vec![date(2025, 1, 1), date(2025, 1, 15)]);
        assert_eq!(
            schedule.milestones[1].description.as_deref(),
            Some("milestone 2")
        );
    }

    #[test]
    fn resigning_after_reset_uses_the_new_signing_date() {
        let (mut store, storage, _) = store_with_acme();
        sign_fully(&mut store, &storage, "2025-01-01T12:00:00Z");
        clear_proposal_signatures(&mut store, &storage, "acme-co").unwrap();
        sign_fully(&mut store, &storage, "2025-03-01T12:00:00Z");

        let schedule = proposal_due_dates(&store, preview("acme-co", None)).unwrap();

        assert_eq!(schedule.signed_on, date(2025, 3, 1));
        let due: Vec<_> = schedule.milestones.iter().map(|m| m.due_on).collect();
        assert_eq!(due, vec![date(2025, 3, 1), date(2025, 3, 15)]);
        assert_eq!(
            get_proposal(&store, "acme-co").unwrap().fully_signed_at,
            Some("2025-01-01T12:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn reset_proposal_has_no_signing_date() {
        let (mut store, storage, _) = store_with_acme();
        sign_fully(&mut store, &storage, "2025-01-01T12:00:00Z");
        clear_proposal_signatures(&mut store, &storage, "acme-co").unwrap();

        assert!(matches!(
            proposal_due_dates(&store, preview("acme-co", None)),
            Err(DueDatesError::NotSigned(_))
        ));
    }

    #[test]
    fn signing_date_follows_the_requested_zone() {
        let (mut store, storage, _) = store_with_acme();
        sign_fully(&mut store, &storage, "2025-01-01T02:00:00Z");

        let parameters = DueDatesParameters {
            time_zone: TimeZone::fixed(jiff::tz::offset(-5)),
            ..preview("acme-co", None)
        };
        let schedule = proposal_due_dates(&store, parameters).unwrap();
        assert_eq!(schedule.signed_on, date(2024, 12, 31));
    }

    #[test]
    fn unsigned_proposal_needs_an_explicit_date() {
        let (store, _, _) = store_with_acme();
        assert!(matches!(
            proposal_due_dates(&store, preview("acme-co", None)),
            Err(DueDatesError::NotSigned(_))
        ));

        let schedule =
            proposal_due_dates(&store, preview("acme-co", Some(date(2025, 6, 1)))).unwrap();
        assert_eq!(schedule.milestones[1].due_on, date(2025, 6, 15));
    }

    #[test]
    fn add_update_remove_payments_on_a_draft() {
        let (mut store, storage, _) = store_with_acme();

        let updated = add_payment(
            &mut store,
            &storage,
            AddPaymentParameters {
                reference: "acme-co".to_string(),
                days_after_previous: None,
                description: None,
                bill_id: None,
            },
        )
        .unwrap();
        assert_eq!(updated.payments.len(), 3);
        assert_eq!(updated.payments.get(2), Some(&ScheduledPayment::default()));
        assert!(matches!(
            proposal_due_dates(&store, preview("acme-co", Some(date(2025, 1, 1)))),
            Err(DueDatesError::Schedule(ScheduleError::UndefinedOffsets(p))) if p == vec![2]
        ));

        update_payment(
            &mut store,
            &storage,
            "acme-co",
            2,
            PaymentField::DaysAfterPrevious(Some(30)),
        )
        .unwrap();
        let schedule =
            proposal_due_dates(&store, preview("acme-co", Some(date(2025, 1, 1)))).unwrap();
        assert_eq!(schedule.milestones[2].due_on, date(2025, 2, 14));

        let updated = remove_payment(&mut store, &storage, "acme-co", 0).unwrap();
        assert_eq!(updated.payments.len(), 2);
        assert_eq!(get_proposal(&store, "acme-co").unwrap().payments.len(), 2);
    }

    #[test]
    fn schedule_is_frozen_once_sent() {
        let (mut store, storage, _) = store_with_acme();
        send_proposal(&mut store, &storage, "acme-co").unwrap();

        let result = remove_payment(&mut store, &storage, "acme-co", 0);
        assert!(matches!(
            result,
            Err(EditPaymentError::NotEditable(ProposalStatus::Sent))
        ));
        assert_eq!(get_proposal(&store, "acme-co").unwrap().payments.len(), 2);
    }

    #[test]
    fn out_of_range_edit_does_not_save() {
        let (mut store, storage, _) = store_with_acme();
        let result = update_payment(
            &mut store,
            &storage,
            "acme-co",
            9,
            PaymentField::Description(Some("nope".to_string())),
        );
        assert!(matches!(
            result,
            Err(EditPaymentError::Schedule(ScheduleError::OutOfRange {
                index: 9,
                len: 2
            }))
        ));
        assert_eq!(storage.save_count(), 1);
    }
}
