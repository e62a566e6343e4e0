use crate::pipeline::{Slot, StateRecord};
use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Approved,
    ApprovedAll, // User chose "yes to all"
    Deferred,
    Discarded,
}

/// Source of a gate decision: an interactive prompt, or a script in tests.
pub trait ApprovalPrompt: Send {
    fn decide(&mut self, thread_id: &str, record: &StateRecord) -> Result<GateDecision>;
}

/// Asks on the terminal with a `dialoguer` selection list.
pub struct ConsolePrompt;

impl ApprovalPrompt for ConsolePrompt {
    fn decide(&mut self, _thread_id: &str, _record: &StateRecord) -> Result<GateDecision> {
        // Nobody to ask: leave the session paused for a later `resume`.
        if !console::user_attended_stderr() {
            println!(
                "  {} (no terminal attached)",
                console::style("Approval deferred").dim()
            );
            return Ok(GateDecision::Deferred);
        }

        let options = &[
            "Yes, execute this query",
            "Yes, and auto-approve remaining queries (--yes)",
            "Not now, keep the session paused",
            "Discard this session",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Execute this query?")
            .items(options)
            .default(0)
            .interact()?;

        match selection {
            0 => Ok(GateDecision::Approved),
            1 => Ok(GateDecision::ApprovedAll),
            2 => Ok(GateDecision::Deferred),
            3 => Ok(GateDecision::Discarded),
            _ => unreachable!(),
        }
    }
}

pub struct ApprovalGate {
    pub skip_all: bool,
    prompt: Box<dyn ApprovalPrompt>,
}

impl ApprovalGate {
    pub fn new(skip_all: bool) -> Self {
        Self::with_prompt(skip_all, Box::new(ConsolePrompt))
    }

    pub fn with_prompt(skip_all: bool, prompt: Box<dyn ApprovalPrompt>) -> Self {
        Self { skip_all, prompt }
    }

    /// Show the pending query and decide whether it may run.
    pub fn check(&mut self, thread_id: &str, record: &StateRecord) -> Result<GateDecision> {
        println!();
        println!(
            "  {} {}",
            console::style("Pending query").bold(),
            console::style(format!("[{}]", thread_id)).dim()
        );
        match &record.query {
            Slot::Value(sql) => {
                for line in sql.lines() {
                    println!("    {}", console::style(line).cyan());
                }
            }
            Slot::Failed => println!("    {}", console::style("(query generation failed)").red()),
            Slot::Pending => println!("    {}", console::style("(no query yet)").dim()),
        }

        // If --yes flag, auto-approve everything
        if self.skip_all {
            println!("  {} (--yes flag)", console::style("Auto-approved").dim());
            return Ok(GateDecision::Approved);
        }

        let decision = self.prompt.decide(thread_id, record)?;
        if decision == GateDecision::ApprovedAll {
            self.skip_all = true;
        }
        Ok(decision)
    }
}
