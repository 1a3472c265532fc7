use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::app::commands::{
    check_adb, get_config, get_config_path, list_devices, provision_devices, reset_config,
    run_stage_command,
};
use crate::app::models::{DeviceRecord, Stage, StageReport};
use crate::app::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "adb-provisioner", version)]
#[command(about = "Provision Android devices over adb", long_about = None)]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Trace id attached to every log line (generated when omitted)
    #[arg(long, global = true)]
    pub trace_id: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List connected devices in the `device` state
    Devices,

    /// Run one stage (install, admin or finish)
    ///
    /// Without --target the stage runs against every connected device.
    Stage {
        stage: Stage,

        /// Transport id to address; repeatable
        #[arg(short = 't', long = "target")]
        targets: Vec<String>,
    },

    /// Install, promote to owner and finish every connected device
    Provision,

    /// Check that adb resolves and runs on this host
    CheckAdb,

    /// Inspect or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Overwrite the configuration with defaults
    Reset,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_devices(devices: &[DeviceRecord]) {
    if devices.is_empty() {
        println!("No devices found");
        return;
    }
    for device in devices {
        match device.transport_id() {
            Some(transport_id) => {
                println!("{}  transport_id={transport_id}", device.display_name())
            }
            None => println!("{}  (no transport_id)", device.display_name()),
        }
    }
}

fn print_report(report: &StageReport) {
    println!("{}", report.summary());
    for result in report.results.values() {
        if result.succeeded {
            println!("  [ok]   {}", result.target.label());
        } else {
            let code = result
                .error_code
                .map(|code| format!(" ({code})"))
                .unwrap_or_default();
            println!(
                "  [fail] {}: {}{code}",
                result.target.label(),
                result.output_or_error
            );
        }
        for step in result.steps.iter().filter(|step| step.tolerated) {
            println!("         {} failed (ignored): {}", step.operation, step.output_or_error);
        }
    }
}

fn exit_code_for(reports: &[StageReport]) -> ExitCode {
    if reports.iter().all(StageReport::all_succeeded) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub fn execute(cli: Cli) -> Result<ExitCode> {
    let state = AppState::new();
    let trace_id = cli.trace_id.clone();

    match cli.command {
        Commands::Devices => {
            let response = list_devices(&state, trace_id)?;
            if cli.json {
                print_json(&response)?;
            } else {
                print_devices(&response.data);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Stage { stage, targets } => {
            let response = run_stage_command(stage, targets, &state, trace_id)?;
            if cli.json {
                print_json(&response)?;
            } else {
                print_report(&response.data);
            }
            Ok(exit_code_for(std::slice::from_ref(&response.data)))
        }
        Commands::Provision => {
            let response = provision_devices(&state, trace_id)?;
            if cli.json {
                print_json(&response)?;
            } else if response.data.is_empty() {
                println!("No devices found");
            } else {
                for report in &response.data {
                    print_report(report);
                }
                if state.workflow().current_step() == crate::app::state::WorkflowStep::Done {
                    println!("Setup finished. The devices can be unplugged.");
                }
            }
            Ok(exit_code_for(&response.data))
        }
        Commands::CheckAdb => {
            let response = check_adb(trace_id)?;
            let available = response.data.available;
            if cli.json {
                print_json(&response)?;
            } else if available {
                println!("{}", response.data.command_path);
                println!("{}", response.data.version_output);
            } else {
                println!(
                    "adb unavailable at {}: {}",
                    response.data.command_path,
                    response.data.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(if available {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => print_json(&get_config(trace_id)?.data)?,
                ConfigAction::Path => println!("{}", get_config_path(trace_id).data),
                ConfigAction::Reset => {
                    let response = reset_config(trace_id)?;
                    if cli.json {
                        print_json(&response)?;
                    } else {
                        println!("Configuration reset to defaults");
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
