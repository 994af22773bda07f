use std::io::{self, Write};

use serde::Serialize;

use crate::harvest::{HarvestEvent, HarvestReport, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &HarvestReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: HarvestEvent) {}
}

/// Human-readable progress lines on stdout, one per event.
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn print_report(report: &HarvestReport) {
        println!(
            "Harvested {} resource(s) of profile {}",
            report.completed.len(),
            report.profile_id
        );
        if let Some(resource) = &report.timed_out {
            println!("Still running when the wait ended: {}", resource.title);
        }
        for resource in &report.not_started {
            println!("Not started: {}", resource.title);
        }
    }
}

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: HarvestEvent) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        println!("{}", progress_line(&now, &event));
    }
}

/// Every event gets a line, including polls that saw no status text.
pub fn progress_line(now: &str, event: &HarvestEvent) -> String {
    match event {
        HarvestEvent::Discovered {
            profile_id,
            resources,
        } => format!("{now}: profile {profile_id} has {resources} resource(s) to harvest"),
        HarvestEvent::Started { resource } => format!(
            "{now}: Initiate harvesting GI-Cat resource {}. Please wait a couple minutes for the process to complete.",
            resource.title
        ),
        HarvestEvent::Polled {
            resource,
            status,
            raw_status,
        } => format!(
            "{now}: Harvest {} status ({status}): {raw_status}",
            resource.title
        ),
        HarvestEvent::Completed { resource, elapsed } => format!(
            "{now}: Successfully harvested {} in {}s",
            resource.title,
            elapsed.as_secs()
        ),
        HarvestEvent::TimedOut { resource, budget } => format!(
            "{now}: Warning: harvest wait for {} ran out ({} seconds), reusing the previous harvest results",
            resource.title,
            budget.as_secs()
        ),
    }
}
