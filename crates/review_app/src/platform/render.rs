//! Plain-text rendering of view models and one-shot command results.
use review_core::{
    AppViewModel, Estimate, IdValidation, ItemStatus, JobRowView, JobStatus, SubmissionState,
};
use review_engine::PreviewSet;

use super::effects::Completion;

pub fn render(view: &AppViewModel) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(line) = submission_line(&view.submission) {
        lines.push(line);
    }
    if let Some(line) = validation_line(&view.validation) {
        lines.push(line);
    }

    if view.list_open {
        if view.jobs.is_empty() {
            lines.push("No jobs.".to_string());
        }
        for row in &view.jobs {
            let marker = if view.selected_job_id.as_ref() == Some(&row.job_id) {
                '>'
            } else {
                ' '
            };
            lines.push(format!("{marker} {}", job_row(row)));
        }
    } else if view.unseen_count > 0 {
        lines.push(format!("{} finished job(s) not yet viewed", view.unseen_count));
    }

    if let Some(selected) = &view.selected {
        let job = &selected.job;
        lines.push(format!(
            "  {} [{}] {:.0}% done, {} succeeded, {} failed, {} flagged",
            job.id,
            status_label(job.status),
            job.progress() * 100.0,
            job.succeeded_items,
            job.failed_items,
            job.flagged_items
        ));
        for item in selected.items.iter() {
            let mut line = format!(
                "    {:<10} {}/{}",
                item_status_label(item.status),
                item.target.record_type,
                item.target.code
            );
            if item.flagged {
                line.push_str(" flagged");
            }
            if let Some(error) = &item.last_error {
                line.push_str(&format!(" error: {error}"));
            }
            lines.push(line);
        }
    }

    if let Some(error) = &view.last_error {
        lines.push(format!("Error: {error}"));
    }
    lines
}

pub fn render_completion(completion: &Completion) -> String {
    let label = if completion.label.is_empty() {
        completion.job_id.as_str()
    } else {
        completion.label.as_str()
    };
    format!(
        "Job \"{label}\" ({}) {}",
        completion.job_id,
        status_label(completion.status)
    )
}

pub fn render_estimate(estimate: &Estimate) -> Vec<String> {
    let mut lines = vec![
        format!(
            "{} items, {} sampled",
            estimate.total_items, estimate.sample_size
        ),
        format!(
            "Per item: {} input / {} output tokens",
            estimate.input_tokens_per_item, estimate.output_tokens_per_item
        ),
        format!(
            "Total: {} input / {} output tokens",
            estimate.total_input_tokens, estimate.total_output_tokens
        ),
    ];
    match estimate.estimated_cost {
        Some(cost) => lines.push(format!("Estimated cost: ${cost:.2}")),
        None => lines.push("Estimated cost: unknown (model has no price entry)".to_string()),
    }
    if let Some(error) = &estimate.clustering_error {
        lines.push(format!("Warning: {error}"));
    }
    if !estimate.unresolved_variables.is_empty() {
        lines.push(format!(
            "Warning: unresolved variables: {}",
            estimate.unresolved_variables.join(", ")
        ));
    }
    lines
}

pub fn render_preview(preview: &PreviewSet) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = &preview.clustering_error {
        lines.push(format!("Warning: {error}"));
    }
    for record in &preview.records {
        lines.push(format!(
            "--- {}/{}",
            record.target.record_type, record.target.code
        ));
        lines.extend(record.prompt.lines().map(str::to_string));
        if !record.unresolved_variables.is_empty() {
            lines.push(format!(
                "(unresolved: {})",
                record.unresolved_variables.join(", ")
            ));
        }
    }
    if preview.records.is_empty() {
        lines.push("Scope matched no records.".to_string());
    }
    lines
}

fn job_row(row: &JobRowView) -> String {
    let cost = row
        .cost
        .map(|cost| format!(" ${cost:.2}"))
        .unwrap_or_default();
    let unseen = if row.seen { "" } else { " *" };
    format!(
        "{:<12} {:<24} {:<9} {}/{} flagged {}{cost}{unseen}",
        row.job_id,
        row.label,
        status_label(row.status),
        row.processed,
        row.total,
        row.flagged
    )
}

fn submission_line(submission: &SubmissionState) -> Option<String> {
    match submission {
        SubmissionState::Idle => None,
        SubmissionState::Counting { label } => Some(format!("Sizing scope for \"{label}\"...")),
        SubmissionState::Submitting { label, total_items } => {
            Some(format!("Submitting \"{label}\" ({total_items} items)..."))
        }
        SubmissionState::Submitted { job_id } => Some(format!("Submitted job {job_id}")),
        SubmissionState::Failed { message } => Some(format!("Submission failed: {message}")),
    }
}

fn validation_line(validation: &IdValidation) -> Option<String> {
    match validation {
        IdValidation::Idle => None,
        IdValidation::Pending { ids, .. } => Some(format!("Validating {} id(s)...", ids.len())),
        IdValidation::Valid { ids } => Some(format!("{} id(s) valid", ids.len())),
        IdValidation::Invalid { unknown } => Some(format!("Unknown ids: {}", unknown.join(", "))),
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Running => "running",
        JobStatus::Paused => "paused",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
        JobStatus::Cancelled => "cancelled",
    }
}

fn item_status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Queued => "queued",
        ItemStatus::Submitting => "submitting",
        ItemStatus::Processing => "processing",
        ItemStatus::Succeeded => "succeeded",
        ItemStatus::Failed => "failed",
        ItemStatus::Skipped => "skipped",
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn row(id: &str, status: JobStatus, seen: bool) -> JobRowView {
        JobRowView {
            job_id: id.into(),
            label: format!("label {id}"),
            status,
            processed: 3,
            total: 10,
            flagged: 1,
            cost: None,
            seen,
        }
    }

    #[test]
    fn open_list_marks_selection_and_unseen_rows() {
        let view = AppViewModel {
            jobs: vec![
                row("job-1", JobStatus::Running, true),
                row("job-2", JobStatus::Completed, false),
            ],
            selected_job_id: Some("job-2".into()),
            list_open: true,
            ..AppViewModel::default()
        };
        let lines = render(&view);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  job-1"));
        assert!(lines[1].starts_with("> job-2"));
        assert!(lines[1].ends_with(" *"));
    }

    #[test]
    fn closed_list_shows_unseen_count_and_errors() {
        let view = AppViewModel {
            unseen_count: 2,
            submission: SubmissionState::Failed {
                message: "template is empty".into(),
            },
            last_error: Some("Job list unavailable: 403".into()),
            ..AppViewModel::default()
        };
        assert_eq!(
            render(&view),
            vec![
                "Submission failed: template is empty".to_string(),
                "2 finished job(s) not yet viewed".to_string(),
                "Error: Job list unavailable: 403".to_string(),
            ]
        );
    }

    #[test]
    fn completion_falls_back_to_job_id() {
        let completion = Completion {
            job_id: "job-4".into(),
            label: String::new(),
            status: JobStatus::Cancelled,
        };
        assert_eq!(
            render_completion(&completion),
            "Job \"job-4\" (job-4) cancelled"
        );
    }

    #[test]
    fn estimate_without_price_says_so() {
        let estimate = Estimate {
            sample_size: 2,
            total_items: 100,
            input_tokens_per_item: 10,
            output_tokens_per_item: 256,
            total_input_tokens: 1000,
            total_output_tokens: 25600,
            ..Estimate::default()
        };
        let lines = render_estimate(&estimate);
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Estimated cost: unknown (model has no price entry)")
        );
    }
}
