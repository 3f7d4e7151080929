//! Row grouping, current-step selection and progress math
//!
//! `aggregate` is pure: the same rows always give the same view. Rows may
//! arrive in any order and may contain duplicates from a bad join.

use std::cmp::Ordering;
use std::collections::HashSet;

use procstore::{TaskRow, TaskStatus};
use serde::Serialize;
use tracing::debug;

/// Title and legal grounds of the procedure being tracked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureInfo {
    pub procedure_title: String,
    pub basis: Option<String>,
}

/// One phase and the ids of its steps, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseView {
    pub phase_id: i64,
    pub phase_title: String,
    pub phase_order: i64,
    pub phase_link: Option<String>,
    pub step_ids: Vec<i64>,
}

/// One step with its tasks in task order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step_id: i64,
    pub phase_id: i64,
    pub phase_title: String,
    pub phase_order: i64,
    pub step_title: String,
    pub step_order: i64,
    pub responsible_role: Option<String>,
    pub step_link: Option<String>,
    pub tasks: Vec<TaskRow>,
}

impl StepView {
    pub fn total_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.task_status.is_completed()).count()
    }

    /// True when no task is left open (vacuously true for an empty step)
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|t| t.task_status.is_completed())
    }

    /// First task in task order that is not completed
    pub fn first_open_task(&self) -> Option<&TaskRow> {
        self.tasks.iter().find(|t| !t.task_status.is_completed())
    }
}

/// Overall and current-step counts
///
/// Percentages are unrounded; rounding is left to presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub percentage: f64,
    pub current_step_total: usize,
    pub current_step_completed: usize,
    pub current_step_percentage: f64,
}

/// Structured view over one position's checklist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedProgress {
    pub procedure_info: ProcedureInfo,
    /// Phases sorted by phase order
    pub phases: Vec<PhaseView>,
    /// All steps sorted by (phase order, step order)
    pub all_steps: Vec<StepView>,
    /// Index into `all_steps`
    pub current_step: Option<usize>,
    pub progress: Progress,
}

/// `completed / total * 100`, or 0 when there is nothing to complete
pub fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Build the structured view from flat task rows
///
/// Returns None for an empty row set, which is how an unknown position or a
/// procedure without tasks shows up.
pub fn aggregate(rows: &[TaskRow]) -> Option<AggregatedProgress> {
    debug!(row_count = rows.len(), "aggregate: called");
    if rows.is_empty() {
        debug!("aggregate: no rows");
        return None;
    }

    let mut sorted: Vec<&TaskRow> = rows.iter().collect();
    sorted.sort_by(|a, b| hierarchy_key(a).cmp(&hierarchy_key(b)).then_with(|| duplicate_precedence(a, b)));

    // Duplicates of a task are adjacent now, with the preferred copy first
    let mut seen = HashSet::new();
    sorted.retain(|r| seen.insert(r.task_id));
    if sorted.len() != rows.len() {
        debug!(dropped = rows.len() - sorted.len(), "aggregate: collapsed duplicate task rows");
    }

    let first = sorted[0];
    let procedure_info = ProcedureInfo {
        procedure_title: first.procedure_title.clone(),
        basis: first.basis.clone(),
    };

    // Sorted input means each phase and step arrives as one contiguous run
    let mut phases: Vec<PhaseView> = Vec::new();
    let mut all_steps: Vec<StepView> = Vec::new();
    for row in &sorted {
        if phases.last().is_none_or(|p| p.phase_id != row.phase_id) {
            phases.push(PhaseView {
                phase_id: row.phase_id,
                phase_title: row.phase_title.clone(),
                phase_order: row.phase_order,
                phase_link: row.phase_link.clone(),
                step_ids: Vec::new(),
            });
        }
        if all_steps.last().is_none_or(|s| s.step_id != row.step_id) {
            if let Some(phase) = phases.last_mut() {
                phase.step_ids.push(row.step_id);
            }
            all_steps.push(StepView {
                step_id: row.step_id,
                phase_id: row.phase_id,
                phase_title: row.phase_title.clone(),
                phase_order: row.phase_order,
                step_title: row.step_title.clone(),
                step_order: row.step_order,
                responsible_role: row.responsible_role.clone(),
                step_link: row.step_link.clone(),
                tasks: Vec::new(),
            });
        }
        if let Some(step) = all_steps.last_mut() {
            step.tasks.push((*row).clone());
        }
    }

    let current_step = select_current_step(&all_steps);
    debug!(?current_step, step_count = all_steps.len(), "aggregate: current step selected");

    let total_tasks = sorted.len();
    let completed_tasks = sorted.iter().filter(|r| r.task_status.is_completed()).count();
    let (current_step_total, current_step_completed) = current_step
        .map(|idx| (all_steps[idx].total_tasks(), all_steps[idx].completed_tasks()))
        .unwrap_or((0, 0));

    let progress = Progress {
        total_tasks,
        completed_tasks,
        percentage: percentage(completed_tasks, total_tasks),
        current_step_total,
        current_step_completed,
        current_step_percentage: percentage(current_step_completed, current_step_total),
    };

    Some(AggregatedProgress {
        procedure_info,
        phases,
        all_steps,
        current_step,
        progress,
    })
}

fn hierarchy_key(row: &TaskRow) -> (i64, i64, i64, i64, i64, i64) {
    (
        row.phase_order,
        row.phase_id,
        row.step_order,
        row.step_id,
        row.task_order,
        row.task_id,
    )
}

/// Which of two rows for the same task is kept
///
/// Completed beats in progress beats not started; then the latest completion,
/// then the higher `completed_by`, then notes.
fn duplicate_precedence(a: &TaskRow, b: &TaskRow) -> Ordering {
    status_rank(a.task_status)
        .cmp(&status_rank(b.task_status))
        .then_with(|| b.completed_at.cmp(&a.completed_at))
        .then_with(|| b.completed_by.cmp(&a.completed_by))
        .then_with(|| b.notes.cmp(&a.notes))
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Completed => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::NotStarted => 2,
    }
}

/// First step with open work, else the last step
fn select_current_step(steps: &[StepView]) -> Option<usize> {
    steps
        .iter()
        .position(|s| !s.is_complete())
        .or_else(|| steps.len().checked_sub(1))
}

impl AggregatedProgress {
    pub fn current_step(&self) -> Option<&StepView> {
        self.current_step.and_then(|idx| self.all_steps.get(idx))
    }

    /// The step right after the current one in global order
    pub fn next_step(&self) -> Option<&StepView> {
        self.current_step.and_then(|idx| self.all_steps.get(idx + 1))
    }

    /// Up to `n` steps following the current one
    pub fn next_steps(&self, n: usize) -> &[StepView] {
        match self.current_step {
            Some(idx) => {
                let start = (idx + 1).min(self.all_steps.len());
                let end = start.saturating_add(n).min(self.all_steps.len());
                &self.all_steps[start..end]
            }
            None => &[],
        }
    }

    pub fn step(&self, step_id: i64) -> Option<&StepView> {
        self.all_steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn phase(&self, phase_id: i64) -> Option<&PhaseView> {
        self.phases.iter().find(|p| p.phase_id == phase_id)
    }

    /// Steps of a phase in order
    pub fn phase_steps(&self, phase_id: i64) -> impl Iterator<Item = &StepView> {
        self.all_steps.iter().filter(move |s| s.phase_id == phase_id)
    }

    /// Whether every task of the phase is completed; None for an unknown phase
    pub fn is_phase_complete(&self, phase_id: i64) -> Option<bool> {
        self.phase(phase_id)?;
        Some(self.phase_steps(phase_id).all(StepView::is_complete))
    }

    /// Whether the whole procedure is done
    pub fn is_complete(&self) -> bool {
        self.progress.total_tasks > 0 && self.progress.completed_tasks == self.progress.total_tasks
    }

    pub fn task(&self, task_id: i64) -> Option<&TaskRow> {
        self.all_steps
            .iter()
            .flat_map(|s| s.tasks.iter())
            .find(|t| t.task_id == task_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn row(phase: (i64, i64), step: (i64, i64), task: (i64, i64), status: TaskStatus) -> TaskRow {
        let (phase_id, phase_order) = phase;
        let (step_id, step_order) = step;
        let (task_id, task_order) = task;
        TaskRow {
            procedure_title: "W2/W3 Appointment".to_string(),
            basis: Some("Higher Education Act".to_string()),
            phase_id,
            phase_title: format!("Phase {}", phase_id),
            phase_order,
            phase_link: None,
            step_id,
            step_title: format!("Step {}", step_id),
            step_order,
            responsible_role: None,
            step_link: None,
            task_id,
            task_description: format!("Task {}", task_id),
            task_order,
            required_documents: None,
            task_link: None,
            task_status: status,
            completed_at: None,
            notes: None,
            completed_by: None,
        }
    }

    /// Two phases: phase 1 step 10 with tasks 100 (done) and 101 (open),
    /// phase 2 step 20 with task 200 (open)
    pub(crate) fn two_phase_rows() -> Vec<TaskRow> {
        vec![
            row((1, 1), (10, 1), (100, 1), TaskStatus::Completed),
            row((1, 1), (10, 1), (101, 2), TaskStatus::NotStarted),
            row((2, 2), (20, 1), (200, 1), TaskStatus::NotStarted),
        ]
    }

    #[test]
    fn test_empty_rows_is_none() {
        assert!(aggregate(&[]).is_none());
    }

    #[test]
    fn test_two_phase_scenario() {
        let agg = aggregate(&two_phase_rows()).unwrap();

        assert_eq!(agg.current_step().unwrap().step_id, 10);
        assert_eq!(agg.progress.completed_tasks, 1);
        assert_eq!(agg.progress.total_tasks, 3);
        assert_eq!(agg.progress.current_step_completed, 1);
        assert_eq!(agg.progress.current_step_total, 2);
        assert_eq!(agg.progress.current_step_percentage, 50.0);
        assert_eq!(agg.procedure_info.procedure_title, "W2/W3 Appointment");
        assert_eq!(agg.phases.len(), 2);
        assert_eq!(agg.phases[0].step_ids, vec![10]);
    }

    #[test]
    fn test_completing_last_open_task_advances_step() {
        let mut rows = two_phase_rows();
        rows[1].task_status = TaskStatus::Completed;

        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.current_step().unwrap().step_id, 20);
        assert_eq!(agg.progress.current_step_total, 1);
        assert_eq!(agg.progress.current_step_completed, 0);
    }

    #[test]
    fn test_all_complete_selects_last_step() {
        let rows: Vec<TaskRow> = two_phase_rows()
            .into_iter()
            .map(|mut r| {
                r.task_status = TaskStatus::Completed;
                r
            })
            .collect();

        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.current_step().unwrap().step_id, 20);
        assert_eq!(agg.progress.current_step_percentage, 100.0);
        assert_eq!(agg.progress.percentage, 100.0);
        assert!(agg.is_complete());
        assert!(agg.next_step().is_none());
    }

    #[test]
    fn test_percentage_math() {
        let expected = 3.0 / 7.0 * 100.0;
        assert!((percentage(3, 7) - expected).abs() < 1e-9);
        assert!((percentage(3, 7) - 42.857).abs() < 1e-3);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn test_seven_tasks_three_completed() {
        let rows: Vec<TaskRow> = (0..7)
            .map(|i| {
                let status = if i < 3 { TaskStatus::Completed } else { TaskStatus::NotStarted };
                row((1, 1), (10, 1), (100 + i, i), status)
            })
            .collect();
        let agg = aggregate(&rows).unwrap();
        assert!((agg.progress.percentage - 300.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut rows = two_phase_rows();
        rows.reverse();

        let agg = aggregate(&rows).unwrap();
        let step_ids: Vec<i64> = agg.all_steps.iter().map(|s| s.step_id).collect();
        assert_eq!(step_ids, vec![10, 20]);
        let task_ids: Vec<i64> = agg.all_steps[0].tasks.iter().map(|t| t.task_id).collect();
        assert_eq!(task_ids, vec![100, 101]);
        assert_eq!(agg.current_step().unwrap().step_id, 10);
    }

    #[test]
    fn test_phase_order_beats_phase_id() {
        // Phase 5 comes first by order even though its id is larger
        let rows = vec![
            row((1, 2), (10, 1), (100, 1), TaskStatus::NotStarted),
            row((5, 1), (50, 1), (500, 1), TaskStatus::NotStarted),
        ];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.phases[0].phase_id, 5);
        assert_eq!(agg.current_step().unwrap().step_id, 50);
    }

    #[test]
    fn test_duplicate_rows_collapsed() {
        let mut rows = two_phase_rows();
        rows.push(rows[0].clone());

        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.progress.total_tasks, 3);
        assert_eq!(agg.all_steps[0].tasks.len(), 2);
    }

    #[test]
    fn test_in_progress_counts_as_open() {
        let rows = vec![
            row((1, 1), (10, 1), (100, 1), TaskStatus::InProgress),
            row((1, 1), (11, 2), (110, 1), TaskStatus::NotStarted),
        ];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.current_step().unwrap().step_id, 10);
        assert_eq!(agg.progress.completed_tasks, 0);
    }

    #[test]
    fn test_next_steps_preview() {
        let rows = vec![
            row((1, 1), (10, 1), (100, 1), TaskStatus::Completed),
            row((1, 1), (11, 2), (110, 1), TaskStatus::NotStarted),
            row((2, 2), (20, 1), (200, 1), TaskStatus::NotStarted),
            row((2, 2), (21, 2), (210, 1), TaskStatus::NotStarted),
        ];
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.current_step().unwrap().step_id, 11);

        let preview: Vec<i64> = agg.next_steps(2).iter().map(|s| s.step_id).collect();
        assert_eq!(preview, vec![20, 21]);

        let long: Vec<i64> = agg.next_steps(10).iter().map(|s| s.step_id).collect();
        assert_eq!(long, vec![20, 21]);
        assert!(agg.next_steps(0).is_empty());
        assert_eq!(agg.next_step().unwrap().step_id, 20);
    }

    #[test]
    fn test_phase_completion() {
        let agg = aggregate(&two_phase_rows()).unwrap();
        assert_eq!(agg.is_phase_complete(1), Some(false));
        assert_eq!(agg.is_phase_complete(2), Some(false));
        assert_eq!(agg.is_phase_complete(99), None);

        let mut rows = two_phase_rows();
        rows[1].task_status = TaskStatus::Completed;
        let agg = aggregate(&rows).unwrap();
        assert_eq!(agg.is_phase_complete(1), Some(true));
    }

    #[test]
    fn test_lookup_helpers() {
        let agg = aggregate(&two_phase_rows()).unwrap();
        assert_eq!(agg.step(20).unwrap().phase_id, 2);
        assert!(agg.step(99).is_none());
        assert_eq!(agg.phase(2).unwrap().phase_title, "Phase 2");
        assert_eq!(agg.task(101).unwrap().task_description, "Task 101");
        assert_eq!(agg.current_step().unwrap().first_open_task().unwrap().task_id, 101);
    }

    fn status_strategy() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::NotStarted),
            Just(TaskStatus::InProgress),
            Just(TaskStatus::Completed),
        ]
    }

    /// Rows for up to 3 phases x 3 steps x 3 tasks with arbitrary statuses
    fn rows_strategy() -> impl Strategy<Value = Vec<TaskRow>> {
        prop::collection::vec(status_strategy(), 1..27).prop_map(|statuses| {
            statuses
                .into_iter()
                .enumerate()
                .map(|(i, status)| {
                    let i = i as i64;
                    let phase = i / 9;
                    let step = i / 3;
                    row((phase + 1, phase + 1), (step + 10, step % 3 + 1), (i + 100, i % 3 + 1), status)
                })
                .collect()
        })
    }

    /// Valid rows plus extra copies of some tasks carrying conflicting statuses
    fn rows_with_duplicates_strategy() -> impl Strategy<Value = Vec<TaskRow>> {
        (
            rows_strategy(),
            prop::collection::vec((any::<usize>(), status_strategy()), 1..8),
        )
            .prop_map(|(mut rows, copies)| {
                let len = rows.len();
                for (idx, status) in copies {
                    let mut copy = rows[idx % len].clone();
                    copy.task_status = status;
                    rows.push(copy);
                }
                rows
            })
    }

    #[test]
    fn test_conflicting_duplicates_ignore_row_order() {
        let done_first = vec![
            row((1, 1), (10, 1), (100, 1), TaskStatus::Completed),
            row((1, 1), (10, 1), (100, 1), TaskStatus::NotStarted),
            row((2, 2), (20, 1), (200, 1), TaskStatus::NotStarted),
        ];
        let open_first = vec![
            row((1, 1), (10, 1), (100, 1), TaskStatus::NotStarted),
            row((1, 1), (10, 1), (100, 1), TaskStatus::Completed),
            row((2, 2), (20, 1), (200, 1), TaskStatus::NotStarted),
        ];

        let a = aggregate(&done_first).unwrap();
        let b = aggregate(&open_first).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.progress.completed_tasks, 1);
        assert_eq!(a.current_step().unwrap().step_id, 20);
    }

    proptest! {
        #[test]
        fn prop_duplicates_order_independent(rows in rows_with_duplicates_strategy(), seed in any::<u64>()) {
            let mut shuffled = rows.clone();
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            prop_assert_eq!(aggregate(&rows), aggregate(&shuffled));
        }

        #[test]
        fn prop_order_independent(rows in rows_strategy(), seed in any::<u64>()) {
            let mut shuffled = rows.clone();
            // Deterministic rotation stands in for a shuffle
            let len = shuffled.len();
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();

            prop_assert_eq!(aggregate(&rows), aggregate(&shuffled));
        }

        #[test]
        fn prop_percentages_bounded(rows in rows_strategy()) {
            let agg = aggregate(&rows).unwrap();
            prop_assert!((0.0..=100.0).contains(&agg.progress.percentage));
            prop_assert!((0.0..=100.0).contains(&agg.progress.current_step_percentage));
            prop_assert!(agg.progress.completed_tasks <= agg.progress.total_tasks);
            prop_assert_eq!(agg.progress.total_tasks, rows.len());
        }

        #[test]
        fn prop_current_step_is_first_open(rows in rows_strategy()) {
            let agg = aggregate(&rows).unwrap();
            let idx = agg.current_step.unwrap();
            prop_assert!(agg.all_steps[..idx].iter().all(StepView::is_complete));
            if agg.is_complete() {
                prop_assert_eq!(idx, agg.all_steps.len() - 1);
            } else {
                prop_assert!(!agg.all_steps[idx].is_complete());
            }
        }
    }
}
