//! Replies rendered from the aggregated view alone

use std::fmt::Write;

use procstore::TaskRow;
use tracing::debug;

use super::NO_DATA;
use crate::progress::{AggregatedProgress, StepView};

/// Progress summary for the current step and the whole procedure
pub fn status(aggregated: Option<&AggregatedProgress>) -> String {
    debug!("status: called");
    let Some((agg, step)) = with_current_step(aggregated) else {
        return NO_DATA.to_string();
    };
    let progress = &agg.progress;

    let mut out = String::new();
    let _ = writeln!(out, "## Status: {}\n", agg.procedure_info.procedure_title);
    let _ = writeln!(out, "**You are currently in:**");
    let _ = writeln!(out, "Phase: {}", step.phase_title);
    let _ = writeln!(out, "Step: {}\n", step.step_title);
    let _ = writeln!(out, "**Progress:**");
    let _ = writeln!(
        out,
        "Overall: {}/{} tasks ({:.1}%)",
        progress.completed_tasks, progress.total_tasks, progress.percentage
    );
    let _ = writeln!(
        out,
        "Current step: {}/{} tasks ({:.1}%)\n",
        progress.current_step_completed, progress.current_step_total, progress.current_step_percentage
    );

    if progress.current_step_completed == progress.current_step_total {
        let _ = writeln!(out, "**This step is completed!** You can proceed to the next step.\n");
    } else {
        let remaining = progress.current_step_total - progress.current_step_completed;
        let _ = writeln!(out, "**{} {} remaining in this step.**\n", remaining, plural(remaining, "task"));
    }
    out.push_str("Use the checklist to mark tasks as completed.");
    out
}

/// The first open task of the current step
pub fn current_task(aggregated: Option<&AggregatedProgress>) -> String {
    debug!("current_task: called");
    let Some((_, step)) = with_current_step(aggregated) else {
        return NO_DATA.to_string();
    };

    match step.first_open_task() {
        Some(task) => describe_task("Your current task", step, task),
        None => format!(
            "All tasks in step '{}' are completed. You can proceed to the next step.",
            step.step_title
        ),
    }
}

/// The first open task of the step after the current one
pub fn next_task(aggregated: Option<&AggregatedProgress>) -> String {
    debug!("next_task: called");
    let Some((agg, step)) = with_current_step(aggregated) else {
        return NO_DATA.to_string();
    };

    let Some(next) = agg.next_step() else {
        return format!(
            "There are no further steps after '{}'. It is the last step of the procedure.",
            step.step_title
        );
    };

    match next.first_open_task() {
        Some(task) => describe_task("Your next task", next, task),
        None => format!("All tasks in the next step '{}' are already completed.", next.step_title),
    }
}

/// Full checklist with the current step marked and a preview of upcoming steps
pub fn checklist(aggregated: Option<&AggregatedProgress>, preview_steps: usize) -> String {
    debug!(%preview_steps, "checklist: called");
    let Some(agg) = aggregated else {
        return NO_DATA.to_string();
    };
    let current_id = agg.current_step().map(|s| s.step_id);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}/{} tasks, {:.1}%)",
        agg.procedure_info.procedure_title,
        agg.progress.completed_tasks,
        agg.progress.total_tasks,
        agg.progress.percentage
    );
    if let Some(basis) = &agg.procedure_info.basis {
        let _ = writeln!(out, "Basis: {}", basis);
    }

    for phase in &agg.phases {
        let done = if agg.is_phase_complete(phase.phase_id) == Some(true) {
            " (done)"
        } else {
            ""
        };
        let _ = writeln!(out, "\nPhase {}: {}{}", phase.phase_order, phase.phase_title, done);

        for step in agg.phase_steps(phase.phase_id) {
            let marker = if Some(step.step_id) == current_id { "->" } else { "  " };
            let role = step
                .responsible_role
                .as_deref()
                .map(|r| format!(" [{}]", r))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "{} Step {}: {}{} ({}/{})",
                marker,
                step.step_order,
                step.step_title,
                role,
                step.completed_tasks(),
                step.total_tasks()
            );
            for task in &step.tasks {
                let check = if task.task_status.is_completed() { "x" } else { " " };
                let _ = writeln!(out, "     [{}] #{} {}", check, task.task_id, task.task_description);
                if let Some(docs) = &task.required_documents {
                    let _ = writeln!(out, "         documents: {}", docs);
                }
            }
        }
    }

    let upcoming = agg.next_steps(preview_steps);
    if !upcoming.is_empty() {
        let _ = writeln!(out, "\nComing up:");
        for step in upcoming {
            let _ = writeln!(out, "  - {} ({})", step.step_title, step.phase_title);
        }
    }
    out.trim_end().to_string()
}

fn with_current_step(aggregated: Option<&AggregatedProgress>) -> Option<(&AggregatedProgress, &StepView)> {
    let agg = aggregated?;
    let step = agg.current_step()?;
    Some((agg, step))
}

fn describe_task(label: &str, step: &StepView, task: &TaskRow) -> String {
    let mut out = format!(
        "**{}** (Phase: {}, Step: {})\n{}",
        label, step.phase_title, step.step_title, task.task_description
    );
    if let Some(docs) = &task.required_documents {
        let _ = write!(out, "\nRequired documents: {}", docs);
    }
    if let Some(link) = task.task_link.as_ref().or(step.step_link.as_ref()) {
        let _ = write!(out, "\nMore information: {}", link);
    }
    out
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
