//! Wiring a loaded scenario into an orchestrated run.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, BufReader};
use tokio::process::{Child, Command};

use evcheck_config::{EventsConfig, ScenarioConfig};
use evcheck_engine::{EventSource, JsonLinesSource, SourceError};
use evcheck_runner::{ParallelRun, Task, TestContext, TestOutcome, run_workload};
use evcheck_types::ObservedEvent;

type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// JSON-lines events from whichever input the scenario names. Owns the
/// producing child process, if any, which is killed when the run ends.
pub struct ScenarioSource {
    lines: JsonLinesSource<BufReader<BoxedReader>>,
    _producer: Option<Child>,
}

impl ScenarioSource {
    pub async fn open(events: &EventsConfig) -> Result<Self> {
        let (reader, producer): (BoxedReader, Option<Child>) = match events {
            EventsConfig::File { path } => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open event file {}", path.display()))?;
                (Box::new(file), None)
            }
            EventsConfig::Stdin => (Box::new(tokio::io::stdin()), None),
            EventsConfig::Command { command } => {
                let (program, args) = command
                    .split_first()
                    .context("event source command must name a program")?;
                let mut child = Command::new(program)
                    .args(args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .with_context(|| format!("failed to spawn event source `{program}`"))?;
                let stdout = child
                    .stdout
                    .take()
                    .context("event source stdout was not captured")?;
                tracing::info!(program = %program, "Event source started");
                (Box::new(stdout), Some(child))
            }
        };
        Ok(Self {
            lines: JsonLinesSource::new(BufReader::new(reader)),
            _producer: producer,
        })
    }
}

impl EventSource for ScenarioSource {
    async fn next_event(&mut self) -> Result<Option<ObservedEvent>, SourceError> {
        self.lines.next_event().await
    }
}

/// Build the orchestrated run a scenario describes.
pub fn build_run(config: &ScenarioConfig) -> Result<ParallelRun> {
    let ctx = TestContext::new(config.run_defaults());
    let checker = ctx.checker(&config.checker.name, config.expectation_set()?);
    let mut run = ctx.parallel(checker);

    for command in config.setup_commands()? {
        run = run.setup(Task::new(format!("setup `{command}`"), async move {
            command.run().await
        }));
    }

    if let Some(workload) = config.workload_command()? {
        let policy = ctx.retry_policy();
        run = run.collaborator("workload", move |handle| async move {
            run_workload(&handle, policy, |attempt| {
                tracing::info!(attempt, command = %workload, "Starting workload");
                workload.run()
            })
            .await
        });
    }

    for command in config.cleanup_commands()? {
        run = run.cleanup(Task::new(format!("cleanup `{command}`"), async move {
            command.run().await
        }));
    }
    Ok(run)
}

pub async fn run_scenario(config: &ScenarioConfig) -> Result<TestOutcome> {
    let run = build_run(config)?;
    let source = ScenarioSource::open(&config.events).await?;
    Ok(run.run(source).await)
}
