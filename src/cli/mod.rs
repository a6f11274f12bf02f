//! Command-line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::time::Duration;

use crate::application::Orchestrator;
use crate::domain::models::{Config, Task, TaskPriority};

#[derive(Parser, Debug)]
#[command(name = "taskweave", about = "Multi-agent task orchestration", version)]
pub struct Cli {
    /// Path to a YAML config file (defaults to taskweave.yaml if present)
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator over a set of submitted tasks until they settle
    Run {
        /// Task titles to submit; selection routes each by its keywords
        #[arg(long = "task", required = true)]
        tasks: Vec<String>,

        /// Priority applied to every submitted task
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "30")]
        wait_secs: u64,
    },
    /// Execute a workflow template
    Workflow {
        /// Template id (task-assignment, status-update, escalation)
        template: String,

        /// Workflow parameters as key=value pairs
        #[arg(long = "param")]
        params: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

pub async fn execute(command: Commands, config: Config, json: bool) -> Result<()> {
    match command {
        Commands::Run {
            tasks,
            priority,
            wait_secs,
        } => run(tasks, &priority, wait_secs, config, json).await,
        Commands::Workflow { template, params } => workflow(&template, &params, config, json).await,
        Commands::Config => {
            if json {
                println!("{}", serde_json::to_string(&config)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

async fn run(
    titles: Vec<String>,
    priority: &str,
    wait_secs: u64,
    config: Config,
    json: bool,
) -> Result<()> {
    let priority = TaskPriority::from_str(priority)
        .with_context(|| format!("unknown priority: {priority}"))?;

    let orchestrator = Orchestrator::new(config);
    orchestrator.initialize().await?;

    let mut ids = Vec::new();
    for title in titles {
        let task = Task::new(title, "").with_priority(priority);
        ids.push(orchestrator.submit_task(task).await?);
    }

    // The optimizer loop dispatches; wait for all tasks to settle.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    loop {
        let mut settled = true;
        for id in &ids {
            if !orchestrator.get_task_status(*id).await?.is_terminal() {
                settled = false;
                break;
            }
        }
        if settled || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    for id in &ids {
        let task = orchestrator.task_snapshot(*id).await?;
        if json {
            println!("{}", serde_json::to_string(&task)?);
        } else {
            println!("{} {} [{}]", task.id, task.title, task.status.as_str());
        }
    }

    orchestrator.shutdown().await?;
    Ok(())
}

async fn workflow(template: &str, params: &[String], config: Config, json: bool) -> Result<()> {
    let mut parameters = HashMap::new();
    for pair in params {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("parameter {pair} is not key=value"))?;
        parameters.insert(key.to_string(), serde_json::json!(value));
    }

    let orchestrator = Orchestrator::new(config);
    orchestrator.initialize().await?;
    let execution = orchestrator.execute_workflow(template, parameters).await?;
    orchestrator.shutdown().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
    } else {
        println!(
            "workflow {} [{}]",
            execution.template_id,
            match execution.status {
                crate::domain::models::WorkflowStatus::Completed => "completed",
                crate::domain::models::WorkflowStatus::Failed => "failed",
                crate::domain::models::WorkflowStatus::Running => "running",
            }
        );
        for step in &execution.steps {
            println!(
                "  {} ({}) {:?}",
                step.step_id,
                step.role.as_str(),
                step.outcome
            );
        }
    }
    Ok(())
}
