use colored::*;
use jiff::civil::Date;
use jiff::tz::TimeZone;

use crate::{
    models::{
        payment::ScheduledPayment,
        proposal::{Proposal, ProposalSummary},
        signature::Signature,
        status::ProposalStatus,
    },
    services::payments::DueSchedule,
};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// Glyph shown in front of a proposal for its status
pub fn get_status_glyph(status: ProposalStatus) -> ColoredString {
    match status {
        ProposalStatus::Draft => "○".normal(),
        ProposalStatus::Sent => "◔".cyan(),
        ProposalStatus::PartiallySigned => "◑".yellow(),
        ProposalStatus::FullySigned => "✓".green(),
        ProposalStatus::Expired => "⌛".dimmed(),
        ProposalStatus::Cancelled => "✗".red(),
    }
}

pub fn colorize_status(status: ProposalStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        ProposalStatus::Draft => label.normal(),
        ProposalStatus::Sent => label.cyan(),
        ProposalStatus::PartiallySigned => label.yellow(),
        ProposalStatus::FullySigned => label.green(),
        ProposalStatus::Expired => label.dimmed(),
        ProposalStatus::Cancelled => label.red(),
    }
}

/// "1/2 signed" style progress for a proposal
pub fn signature_progress(signed: usize, required: u32) -> String {
    format!("{}/{} signed", signed, required)
}

/// Render a single proposal with glyph, slug, title and right-aligned progress
pub fn render_proposal_line(summary: &ProposalSummary) {
    let terminal_width = get_terminal_width();

    let glyph = get_status_glyph(summary.status);
    let left_section = format!("  {}  {}  {}", glyph, summary.slug, summary.title);
    let left_visible_len = format!("  {}  {}  {}", " ", summary.slug, summary.title)
        .chars()
        .count();

    let styled_left = if summary.status.is_terminal() {
        left_section.dimmed()
    } else {
        left_section.bold()
    };

    let right_section = format!(
        "{}  ·  {}",
        summary.company_name,
        signature_progress(summary.signature_count, summary.required_signers)
    );
    let right_visible_len = right_section.chars().count();
    let total_content = left_visible_len + right_visible_len;

    if total_content + 4 < terminal_width {
        let padding = terminal_width - total_content - 2;
        println!(
            "{}{}{}",
            styled_left,
            " ".repeat(padding),
            right_section.dimmed()
        );
    } else {
        println!("{}", styled_left);
    }
}

/// Full view of a proposal
pub fn render_proposal_detail(proposal: &Proposal, signature_count: usize, tz: &TimeZone) {
    println!(
        "\n  {} {}\n",
        proposal.title.cyan().bold(),
        format!("({})", proposal.slug).dimmed()
    );
    render_field("Company", &proposal.company_name);
    render_field("Status", &colorize_status(proposal.status).to_string());
    let next: Vec<&str> = proposal
        .status
        .valid_transitions()
        .into_iter()
        .filter(|s| *s != proposal.status)
        .map(|s| s.as_str())
        .collect();
    if !next.is_empty() {
        render_field("Next", &next.join(", ").dimmed().to_string());
    }
    render_field(
        "Signatures",
        &signature_progress(signature_count, proposal.required_signers),
    );
    render_field("Created", &format_timestamp(proposal.created_at, tz));
    if let Some(sent_at) = proposal.sent_at {
        render_field("Sent", &format_timestamp(sent_at, tz));
    }
    if let Some(signed_at) = proposal.fully_signed_at {
        render_field("Signed", &format_timestamp(signed_at, tz));
    }
    if let Some(path) = &proposal.custom_page_path {
        render_field("Page", path);
    }
    if let Some(project_id) = proposal.project_id {
        render_field("Project", &project_id.to_string());
    }
    if let Some(bill_id) = proposal.draft_bill_id {
        render_field("Draft bill", &bill_id.to_string());
    }
    if let Some(notes) = &proposal.notes {
        render_field("Notes", notes);
    }

    render_section_header("Payments");
    if proposal.payments.is_empty() {
        println!("    {}", "No scheduled payments".dimmed());
    }
    for (position, payment) in proposal.payments.iter().enumerate() {
        render_payment_line(position, payment);
    }

    render_section_header("Agreement");
    for line in proposal.agreement.lines() {
        println!("    {}", line);
    }
    println!();
}

pub fn render_payment_line(position: usize, payment: &ScheduledPayment) {
    let offset = match payment.days_after_previous {
        Some(days) => format!("+{}d", days),
        None => "?".red().to_string(),
    };
    let description = payment.description.as_deref().unwrap_or("(no description)");
    let bill = payment
        .bill_id
        .map(|id| format!("  bill {}", id))
        .unwrap_or_default();
    println!(
        "  {:>3}  {:>6}  {}{}",
        position,
        offset,
        description,
        bill.dimmed()
    );
}

fn render_field(label: &str, value: &str) {
    println!("  {:<12}{}", format!("{}:", label).dimmed(), value);
}

pub fn render_signature_line(signature: &Signature, tz: &TimeZone) {
    let role = signature
        .role
        .as_deref()
        .map(|r| format!(" ({})", r))
        .unwrap_or_default();
    println!(
        "  {} {}{} <{}>",
        "✍".green(),
        signature.signer_name.bold(),
        role,
        signature.email
    );
    println!(
        "      {} from {}",
        format_timestamp(signature.signed_at, tz).dimmed(),
        signature.ip_address.to_string().dimmed()
    );
}

pub fn render_due_schedule(schedule: &DueSchedule, today: Date) {
    println!(
        "\n  {} {}\n",
        "Payment schedule".cyan().bold(),
        format!("(signed {})", schedule.signed_on).dimmed()
    );
    for milestone in &schedule.milestones {
        let due = format_due_date(milestone.due_on, today);
        let due = if milestone.due_on < today {
            due.red()
        } else {
            due.normal()
        };
        println!(
            "  {:>3}  {:<22}  {:>6}  {}",
            milestone.position,
            due,
            format!("+{}d", milestone.days_after_previous),
            milestone
                .description
                .as_deref()
                .unwrap_or("(no description)")
        );
    }
    println!();
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let word = if count == 1 { "proposal" } else { "proposals" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, word);
}

/// Render a section header (e.g., "Payments", "Agreement")
pub fn render_section_header(title: &str) {
    println!("\n  ─── {} ───\n", title.bold());
}

/// Format a timestamp in the configured zone (e.g., "Jan 05 2025 14:30")
pub fn format_timestamp(timestamp: jiff::Timestamp, tz: &TimeZone) -> String {
    timestamp
        .to_zoned(tz.clone())
        .strftime("%b %d %Y %H:%M")
        .to_string()
}

/// Format a due date relative to today (e.g., "Today", "Tomorrow", "Mon, Feb 17 2025")
pub fn format_due_date(date: Date, today: Date) -> String {
    if date == today {
        "Today".to_string()
    } else if today.tomorrow().is_ok_and(|tomorrow| tomorrow == date) {
        "Tomorrow".to_string()
    } else {
        date.strftime("%a, %b %d %Y").to_string()
    }
}
