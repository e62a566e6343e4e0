use crate::checkpoint::{Checkpoint, SessionPhase, SessionSummary};
use crate::pipeline::{PipelineObserver, Slot, StageKind, StateRecord};
use crate::session::SessionOutcome;
use crate::ui::icons::{ANSWER, CHECK, CROSS, DATABASE, PAUSE, QUESTION, SPARKLE, TABLE, TRASH};
use crate::util::truncate;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Longest result text shown inline before it is cut.
const RESULT_PREVIEW_CHARS: usize = 2000;

/// Terminal progress for a running session: one spinner per stage, replaced by
/// a status line when the stage finishes.
pub struct SessionUI {
    spinner: Mutex<Option<ProgressBar>>,
    verbose: bool,
}

impl SessionUI {
    pub fn new(verbose: bool) -> Self {
        Self {
            spinner: Mutex::new(None),
            verbose,
        }
    }

    fn label(stage: StageKind) -> &'static str {
        match stage {
            StageKind::GenerateQuery => "Generating SQL query",
            StageKind::ExecuteQuery => "Executing query",
            StageKind::GenerateAnswer => "Writing answer",
        }
    }

    fn take_spinner(&self) -> Option<ProgressBar> {
        self.spinner.lock().ok().and_then(|mut guard| guard.take())
    }
}

impl PipelineObserver for SessionUI {
    fn stage_started(&self, _thread_id: &str, stage: StageKind) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner} {msg}")
                .expect("progress bar template is a valid static string"),
        );
        spinner.set_message(Self::label(stage));
        spinner.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut guard) = self.spinner.lock()
            && let Some(previous) = guard.replace(spinner)
        {
            previous.finish_and_clear();
        }
    }

    fn stage_finished(&self, _thread_id: &str, stage: StageKind, record: &StateRecord) {
        if let Some(spinner) = self.take_spinner() {
            spinner.finish_and_clear();
        }

        match record.slot(stage) {
            Slot::Value(value) => {
                println!("  {}{}", CHECK, Self::label(stage));
                if self.verbose {
                    println!("     {}", style(truncate(value, 200)).dim());
                }
            }
            Slot::Failed => println!(
                "  {}{} {}",
                CROSS,
                Self::label(stage),
                style("failed").red()
            ),
            Slot::Pending => {}
        }
    }

    fn paused(&self, _thread_id: &str, _record: &StateRecord) {
        if let Some(spinner) = self.take_spinner() {
            spinner.finish_and_clear();
        }
        println!(
            "  {}{}",
            PAUSE,
            style("Waiting for approval before executing the query").yellow()
        );
    }
}

fn render_slot(slot: &Slot) -> String {
    match slot {
        Slot::Value(value) => value.clone(),
        Slot::Failed => style("(failed)").red().to_string(),
        Slot::Pending => style("(pending)").dim().to_string(),
    }
}

/// Print the four fields of a record.
pub fn print_record(record: &StateRecord) {
    println!();
    println!("{}{}", QUESTION, style(&record.question).bold());
    println!("{}{}", DATABASE, render_slot(&record.query));
    let result = match &record.result {
        Slot::Value(value) => truncate(value, RESULT_PREVIEW_CHARS),
        other => render_slot(other),
    };
    println!("{}{}", TABLE, result);
    println!("{}{}", ANSWER, render_slot(&record.answer));
}

/// Print a stored checkpoint with its lifecycle state.
pub fn print_checkpoint(checkpoint: &Checkpoint) {
    println!(
        "{} {}",
        style("Session").bold(),
        style(&checkpoint.thread_id).cyan()
    );
    println!("  State:   {}", phase_label(checkpoint.phase()));
    println!("  Cursor:  {}", checkpoint.cursor);
    println!(
        "  Updated: {}",
        checkpoint.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    print_record(&checkpoint.record);
}

fn phase_label(phase: SessionPhase) -> String {
    match phase {
        SessionPhase::Completed => style(phase).green().to_string(),
        SessionPhase::AwaitingApproval => style(phase).yellow().to_string(),
        SessionPhase::Running { .. } => style(phase).cyan().to_string(),
    }
}

pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("No sessions stored.");
        return;
    }

    println!("{}", style("Sessions").bold());
    for session in sessions {
        println!(
            "  {}  {}  {}",
            style(&session.thread_id).cyan(),
            style(session.updated_at.format("%Y-%m-%d %H:%M")).dim(),
            phase_label(session.phase)
        );
        println!("      {}", truncate(&session.question, 80));
    }
}

/// Print how a session ended and, if paused, how to continue it.
pub fn print_outcome(thread_id: &str, outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::Completed(record) => {
            print_record(record);
            println!();
            println!("{}{}", SPARKLE, style("Completed").green().bold());
        }
        SessionOutcome::Paused(record) => {
            print_record(record);
            println!();
            println!(
                "{}Session paused. Resume with: {}",
                PAUSE,
                style(format!("sqlpilot resume {}", thread_id)).cyan()
            );
        }
        SessionOutcome::Aborted => {
            println!("{}Session {} discarded", TRASH, style(thread_id).cyan());
        }
    }
}
