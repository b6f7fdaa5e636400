//! `procq run` - submit, await and report

use anyhow::{anyhow, bail, Context};
use futures::future::join_all;
use procq_foundation::RunnerConfig;
use procq_task::{PageSelector, TaskId, TaskOptions, TaskRunner, TaskSummary};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Concurrency cap
    #[arg(long)]
    max_running: Option<usize>,

    /// Per-task timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Wait after SIGTERM before sending SIGKILL
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Wait after SIGKILL before giving up
    #[arg(long)]
    force_ms: Option<u64>,

    /// Default working directory
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Lines of stdout/stderr to show per task
    #[arg(long, default_value = "20")]
    page_length: usize,

    /// Print a JSON report instead of a table
    #[arg(long)]
    json: bool,

    /// Command lines, one task each
    #[arg(last = true, required = true)]
    commands: Vec<String>,
}

/// Run every command to completion. Returns whether all of them exited 0.
pub async fn run(config: RunnerConfig, args: RunArgs) -> anyhow::Result<bool> {
    let runner = TaskRunner::new(config);
    apply_overrides(&runner, &args)?;

    let mut ids = Vec::with_capacity(args.commands.len());
    for line in &args.commands {
        let words = shlex::split(line).ok_or_else(|| anyhow!("Unbalanced quotes in '{}'", line))?;
        let Some((program, rest)) = words.split_first() else {
            bail!("Empty command line");
        };
        let receipt = runner
            .submit(program, rest.iter().cloned(), TaskOptions::new())
            .with_context(|| format!("Failed to queue '{}'", line))?;
        info!("Queued {} as {}", line, receipt.id);
        ids.push(receipt.id);
    }

    let waits = join_all(ids.iter().map(|id| runner.wait(id.as_str())));
    tokio::select! {
        results = waits => {
            for result in results {
                result?;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping unfinished tasks");
            let stops = join_all(ids.iter().map(|id| runner.stop_task(id.as_str(), 0, None))).await;
            for (id, result) in ids.iter().zip(stops) {
                if let Err(e) = result {
                    warn!("Failed to stop {}: {}", id, e);
                }
            }
        }
    }

    let summaries = ids
        .iter()
        .map(|id| runner.task(id.as_str()))
        .collect::<procq_foundation::Result<Vec<_>>>()?;

    if args.json {
        print_json(&runner, &ids, args.page_length)?;
    } else {
        print_table(&runner, &summaries, args.page_length)?;
    }

    Ok(summaries.iter().all(|task| task.exit_code == Some(0)))
}

fn apply_overrides(runner: &TaskRunner, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(n) = args.max_running {
        runner.update_config("maxRunning", &json!(n))?;
    }
    if let Some(ms) = args.timeout_ms {
        runner.update_config("timeout", &json!(ms))?;
    }
    if let Some(ms) = args.grace_ms {
        runner.update_config("terminateGraceMs", &json!(ms))?;
    }
    if let Some(ms) = args.force_ms {
        runner.update_config("terminateForceMs", &json!(ms))?;
    }
    if let Some(cwd) = &args.cwd {
        runner.update_config("path", &json!(cwd))?;
    }
    Ok(())
}

fn print_json(runner: &TaskRunner, ids: &[TaskId], page_length: usize) -> anyhow::Result<()> {
    let selector = PageSelector::page(1, page_length);
    let mut outputs = Vec::with_capacity(ids.len());
    for id in ids {
        let stdout = runner.stdout_page(id.as_str(), selector)?;
        let stderr = runner.stderr_page(id.as_str(), selector)?;
        outputs.push(json!({ "id": id, "stdout": stdout, "stderr": stderr }));
    }

    let report = json!({
        "snapshot": runner.snapshot(),
        "outputs": outputs,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_table(runner: &TaskRunner, summaries: &[TaskSummary], page_length: usize) -> anyhow::Result<()> {
    println!(
        "{:<22} {:<10} {:<6} {:<8} {:<10} {}",
        "ID", "STATUS", "EXIT", "SIGNAL", "DURATION", "COMMAND"
    );
    println!("{}", "-".repeat(80));

    for task in summaries {
        let exit = task.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".into());
        let duration = task
            .duration_ms
            .map(|ms| format!("{}ms", ms))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<22} {:<10} {:<6} {:<8} {:<10} {} {}",
            task.id.to_string(),
            task.status.to_string(),
            exit,
            task.signal.as_deref().unwrap_or("-"),
            duration,
            task.command,
            task.args.join(" ")
        );
    }

    let selector = PageSelector::page(1, page_length);
    for task in summaries {
        let id = task.id.as_str();
        for (label, page) in [
            ("stdout", runner.stdout_page(id, selector)?),
            ("stderr", runner.stderr_page(id, selector)?),
        ] {
            if page.is_empty() {
                continue;
            }
            println!("\n[{} {}] lines {}-{}", id, label, page.start, page.end);
            println!("{}", page.logs);
            if !page.last_page {
                println!("... more lines available");
            }
        }
    }

    Ok(())
}
