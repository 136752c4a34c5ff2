use std::{fmt::Display, net::IpAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::*;
use jiff::civil::Date;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::{
    config::Config,
    models::{payment::PaymentField, payment::ScheduledPayment, store::Store},
    services::{
        payments::{
            AddPaymentParameters, DueDatesParameters, add_payment, proposal_due_dates,
            remove_payment, update_payment,
        },
        proposals::{
            CreateProposalParameters, DeleteProposalError, GetProposalError,
            UpdateProposalParameters, cancel_proposal, create_proposal, delete_proposal,
            expire_proposal, get_all_proposals, get_proposal, send_proposal, update_proposal,
        },
        signatures::{
            RecordSignatureParameters, clear_proposal_signatures, get_proposal_signatures,
            record_signature,
        },
    },
    storage::{Storage, json::JsonFileStorage},
};

mod config;
mod models;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "propdesk",
    about = "Track proposals, their signatures and payment schedules"
)]
struct Cli {
    /// Path of the store file (defaults to $PROPDESK_STORE or the data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all proposals
    List,

    /// Show a proposal
    Show { proposal: String },

    /// Create a new draft proposal
    New {
        /// Company the proposal is for
        company: String,

        /// Proposal title
        #[arg(short, long)]
        title: String,

        /// Slug (derived from the company name if omitted)
        #[arg(long)]
        slug: Option<String>,

        #[command(flatten)]
        agreement: AgreementArgs,

        /// Custom public page path
        #[arg(long)]
        page: Option<String>,

        /// Internal notes
        #[arg(short, long)]
        notes: Option<String>,

        /// Associated project id
        #[arg(long)]
        project: Option<Uuid>,

        /// Associated draft bill id
        #[arg(long)]
        bill: Option<Uuid>,

        /// Signatures needed to be fully signed
        #[arg(long)]
        signers: Option<u32>,

        /// Payment milestone as DAYS or DAYS:DESCRIPTION (can be used multiple times)
        #[arg(short, long, value_parser = parse_payment, action = clap::ArgAction::Append)]
        payment: Vec<ScheduledPayment>,
    },

    /// Edit a draft proposal
    Edit {
        proposal: String,

        /// Slugs cannot change; passing a different one is an error
        #[arg(long)]
        slug: Option<String>,

        #[arg(long)]
        company: Option<String>,

        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        agreement: OptionalAgreementArgs,

        #[arg(long, conflicts_with = "clear_page")]
        page: Option<String>,

        #[arg(long)]
        clear_page: bool,

        #[arg(short, long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        #[arg(long)]
        clear_notes: bool,

        #[arg(long)]
        project: Option<Uuid>,

        #[arg(long)]
        bill: Option<Uuid>,

        #[arg(long)]
        signers: Option<u32>,
    },

    /// Delete a proposal with its payments and signatures
    Delete { proposal: String },

    /// Mark a draft as sent
    Send { proposal: String },

    /// Mark a sent proposal as expired
    Expire { proposal: String },

    /// Cancel a sent proposal
    Cancel { proposal: String },

    /// Record a signature
    Sign {
        proposal: String,

        /// Signer name
        #[arg(long)]
        name: String,

        /// Signer email
        #[arg(long)]
        email: String,

        /// Role the signer signs as
        #[arg(long)]
        role: Option<String>,

        /// Address the signature came from
        #[arg(long, default_value = "127.0.0.1")]
        ip: IpAddr,
    },

    /// List the signatures of a proposal
    Signatures { proposal: String },

    /// Remove every signature and reopen the proposal as a draft
    ClearSignatures { proposal: String },

    /// Edit the payment schedule of a draft
    #[command(subcommand)]
    Payment(PaymentCommands),

    /// Show payment due dates
    Schedule {
        proposal: String,

        /// Preview with this signing date (YYYY-MM-DD)
        #[arg(long)]
        signed_on: Option<Date>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct AgreementArgs {
    /// Agreement body (markdown)
    #[arg(short, long)]
    agreement: Option<String>,

    /// Read the agreement body from a file
    #[arg(long)]
    agreement_file: Option<PathBuf>,
}

#[derive(Args)]
#[group(required = false, multiple = false)]
struct OptionalAgreementArgs {
    /// Agreement body (markdown)
    #[arg(short, long)]
    agreement: Option<String>,

    /// Read the agreement body from a file
    #[arg(long)]
    agreement_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum PaymentCommands {
    /// Append a milestone
    Add {
        proposal: String,

        /// Days after the previous milestone (after signing for the first)
        #[arg(short, long)]
        days: Option<u32>,

        #[arg(short = 'm', long)]
        description: Option<String>,

        #[arg(long)]
        bill: Option<Uuid>,
    },
    /// Remove the milestone at a position
    Remove { proposal: String, position: usize },
    /// Change one field of a milestone
    Set {
        proposal: String,
        position: usize,

        #[command(flatten)]
        field: PaymentFieldArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct PaymentFieldArgs {
    #[arg(short, long)]
    days: Option<u32>,

    /// Mark the day offset as not yet decided
    #[arg(long)]
    clear_days: bool,

    #[arg(short = 'm', long)]
    description: Option<String>,

    #[arg(long)]
    bill: Option<Uuid>,

    #[arg(long)]
    clear_bill: bool,
}

impl PaymentFieldArgs {
    fn into_field(self) -> PaymentField {
        if let Some(days) = self.days {
            PaymentField::DaysAfterPrevious(Some(days))
        } else if self.clear_days {
            PaymentField::DaysAfterPrevious(None)
        } else if let Some(bill) = self.bill {
            PaymentField::BillId(Some(bill))
        } else if self.clear_bill {
            PaymentField::BillId(None)
        } else {
            PaymentField::Description(self.description)
        }
    }
}

/// Parses `DAYS` or `DAYS:DESCRIPTION`.
fn parse_payment(raw: &str) -> Result<ScheduledPayment, String> {
    let (days, description) = match raw.split_once(':') {
        Some((days, description)) => (days, Some(description.trim())),
        None => (raw, None),
    };
    let days = days
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("'{}' is not a non-negative number of days", days.trim()))?;

    Ok(match description.filter(|d| !d.is_empty()) {
        Some(description) => ScheduledPayment::new(days, description),
        None => ScheduledPayment {
            days_after_previous: Some(days),
            ..ScheduledPayment::default()
        },
    })
}

fn read_agreement(text: Option<String>, file: Option<PathBuf>) -> Option<String> {
    match (text, file) {
        (Some(text), _) => Some(text),
        (None, Some(path)) => match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => fail(format!(
                "Failed to read agreement from '{}': {}",
                path.display(),
                e
            )),
        },
        (None, None) => None,
    }
}

fn fail(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn fail_not_found(reference: &str, store: &Store) -> ! {
    eprintln!("Error: Proposal '{}' not found", reference);

    let proposals = get_all_proposals(store);
    if !proposals.is_empty() {
        eprintln!("\nAvailable proposals:");
        for p in proposals {
            eprintln!("  - {} ({})", p.slug, p.company_name);
        }
    }
    std::process::exit(1);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("propdesk=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();

    let config = Config::resolve(cli.store).unwrap_or_else(|e| fail(e));

    if let Some(parent) = config.store_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).unwrap_or_else(|e| {
            fail(format!("Failed to create data directory: {}", e));
        });
    }

    let storage = JsonFileStorage::new(config.store_path.clone());

    let mut store = match storage.load() {
        Ok(store) => store,
        Err(e) => fail(format!("Failed to load store: {}", e)),
    };

    match cli.command {
        None | Some(Commands::List) => {
            let proposals = get_all_proposals(&store);
            if proposals.is_empty() {
                println!("No proposals yet");
            } else {
                ui::render_view_header("Proposals", proposals.len());
                for summary in &proposals {
                    ui::render_proposal_line(summary);
                }
                println!();
            }
        }
        Some(Commands::Show { proposal }) => match get_proposal(&store, &proposal) {
            Ok(found) => {
                let count = store.signature_count(found.id);
                ui::render_proposal_detail(&found, count, &config.time_zone);
            }
            Err(GetProposalError::ProposalNotFound(reference)) => {
                fail_not_found(&reference, &store)
            }
        },
        Some(Commands::New {
            company,
            title,
            slug,
            agreement,
            page,
            notes,
            project,
            bill,
            signers,
            payment,
        }) => {
            let params = CreateProposalParameters {
                company_name: company,
                slug,
                title,
                agreement: read_agreement(agreement.agreement, agreement.agreement_file)
                    .unwrap_or_default(),
                custom_page_path: page,
                notes,
                project_id: project,
                draft_bill_id: bill,
                payments: payment,
                required_signers: signers.unwrap_or(config.required_signers),
            };
            match create_proposal(&mut store, &storage, params) {
                Ok(created) => println!(
                    "✓ Proposal {} created with slug {}",
                    created.title.bold(),
                    created.slug.cyan()
                ),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Edit {
            proposal,
            slug,
            company,
            title,
            agreement,
            page,
            clear_page,
            notes,
            clear_notes,
            project,
            bill,
            signers,
        }) => {
            let params = UpdateProposalParameters {
                reference: proposal,
                slug,
                company_name: company,
                title,
                agreement: read_agreement(agreement.agreement, agreement.agreement_file),
                custom_page_path: if clear_page { Some(None) } else { page.map(Some) },
                notes: if clear_notes { Some(None) } else { notes.map(Some) },
                project_id: project.map(Some),
                draft_bill_id: bill.map(Some),
                payments: None,
                required_signers: signers,
            };
            match update_proposal(&mut store, &storage, params) {
                Ok(updated) => println!("✓ Proposal {} updated", updated.slug.cyan()),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Delete { proposal }) => {
            match delete_proposal(&mut store, &storage, &proposal) {
                Ok(result) => {
                    println!("✓ Proposal deleted: {}", result.proposal.slug);
                    if result.removed_payments > 0 || result.removed_signatures > 0 {
                        println!(
                            "  └─ {} payment(s) and {} signature(s) also deleted",
                            result.removed_payments, result.removed_signatures
                        );
                    }
                }
                Err(DeleteProposalError::ProposalNotFound(reference)) => {
                    fail_not_found(&reference, &store)
                }
                Err(e) => fail(e),
            }
        }
        Some(Commands::Send { proposal }) => {
            match send_proposal(&mut store, &storage, &proposal) {
                Ok(sent) => println!("✓ Proposal {} marked as sent", sent.slug.cyan()),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Expire { proposal }) => {
            match expire_proposal(&mut store, &storage, &proposal) {
                Ok(expired) => println!("✓ Proposal {} expired", expired.slug.cyan()),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Cancel { proposal }) => {
            match cancel_proposal(&mut store, &storage, &proposal) {
                Ok(cancelled) => println!("✓ Proposal {} cancelled", cancelled.slug.cyan()),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Sign {
            proposal,
            name,
            email,
            role,
            ip,
        }) => {
            let params = RecordSignatureParameters {
                reference: proposal,
                signer_name: name,
                email,
                role,
                ip_address: ip,
                signed_at: jiff::Timestamp::now(),
            };
            match record_signature(&mut store, &storage, params) {
                Ok(recorded) => println!(
                    "✓ Signed by {} · {} · {}",
                    recorded.signature.signer_name.bold(),
                    ui::signature_progress(
                        recorded.signature_count,
                        recorded.proposal.required_signers
                    ),
                    ui::colorize_status(recorded.proposal.status)
                ),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Signatures { proposal }) => {
            match get_proposal_signatures(&store, &proposal) {
                Ok(signatures) if signatures.is_empty() => println!("No signatures yet"),
                Ok(signatures) => {
                    println!();
                    for signature in &signatures {
                        ui::render_signature_line(signature, &config.time_zone);
                    }
                    println!();
                }
                Err(GetProposalError::ProposalNotFound(reference)) => {
                    fail_not_found(&reference, &store)
                }
            }
        }
        Some(Commands::ClearSignatures { proposal }) => {
            match clear_proposal_signatures(&mut store, &storage, &proposal) {
                Ok(result) => println!(
                    "✓ Removed {} signature(s); {} is a draft again",
                    result.removed_signatures,
                    result.proposal.slug.cyan()
                ),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Payment(PaymentCommands::Add {
            proposal,
            days,
            description,
            bill,
        })) => {
            let params = AddPaymentParameters {
                reference: proposal,
                days_after_previous: days,
                description,
                bill_id: bill,
            };
            match add_payment(&mut store, &storage, params) {
                Ok(updated) => println!(
                    "✓ Payment added at position {}",
                    updated.payments.len() - 1
                ),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Payment(PaymentCommands::Remove { proposal, position })) => {
            match remove_payment(&mut store, &storage, &proposal, position) {
                Ok(updated) => println!(
                    "✓ Payment {} removed, {} left",
                    position,
                    updated.payments.len()
                ),
                Err(e) => fail(e),
            }
        }
        Some(Commands::Payment(PaymentCommands::Set {
            proposal,
            position,
            field,
        })) => {
            match update_payment(&mut store, &storage, &proposal, position, field.into_field()) {
                Ok(updated) => {
                    println!("✓ Payment {} updated", position);
                    if let Some(payment) = updated.payments.get(position) {
                        ui::render_payment_line(position, payment);
                    }
                }
                Err(e) => fail(e),
            }
        }
        Some(Commands::Schedule {
            proposal,
            signed_on,
        }) => {
            let params = DueDatesParameters {
                reference: proposal,
                signed_on,
                time_zone: config.time_zone.clone(),
            };
            match proposal_due_dates(&store, params) {
                Ok(schedule) if schedule.milestones.is_empty() => {
                    println!("No scheduled payments")
                }
                Ok(schedule) => {
                    let today = jiff::Timestamp::now()
                        .to_zoned(config.time_zone.clone())
                        .date();
                    ui::render_due_schedule(&schedule, today);
                }
                Err(e) => fail(e),
            }
        }
    }
}
