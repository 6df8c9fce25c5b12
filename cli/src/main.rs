//! `orc` binary: start the test-orchestration server, or act as a thin
//! HTTP client against a running one (§0 workspace layout).

mod client;

use std::collections::HashMap;
use std::error::Error;

use clap::{Parser, Subcommand};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser, Debug)]
#[command(name = "orc", about = "orc — test-orchestration service for LLM agents")]
struct Args {
    #[command(subcommand)]
    cmd: Command,

    /// Base URL of a running orc server. Ignored by `serve`.
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + WebSocket server.
    Serve,
    /// Trigger a run against a running server and print the resulting job.
    Run {
        /// Qualified test names to run; omit to run every discovered test.
        tests: Vec<String>,
    },
    /// Inspect discovered tests and their history.
    Tests {
        #[command(subcommand)]
        sub: TestsCommand,
    },
    /// List, show, or invoke a tool.
    Tool {
        #[command(subcommand)]
        sub: ToolCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TestsCommand {
    /// List discovered tests.
    List,
    /// Print history: one qualified test's log, or every test's if omitted.
    History { qualified_name: Option<String> },
}

#[derive(Subcommand, Debug)]
enum ToolCommand {
    /// List agent-visible tools.
    List,
    /// Show one tool's resolved parameter schema.
    Show { name: String },
    /// Invoke a tool with `key=value` arguments.
    Invoke {
        name: String,
        #[arg(value_name = "KEY=VALUE")]
        args: Vec<String>,
    },
}

fn parse_kv_args(raw: &[String]) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let _ = orc_config::load_and_apply("orc", None);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let base_url = args.server.unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    match args.cmd {
        Command::Serve => {
            let config = orc_config::OrcConfig::from_env();
            return cli::serve::run(config).await;
        }
        Command::Run { tests } => {
            let http = client::Client::new(base_url);
            let tests = if tests.is_empty() { None } else { Some(tests) };
            let job = http.create_run(tests).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Tests { sub } => {
            let http = client::Client::new(base_url);
            match sub {
                TestsCommand::List => {
                    let tests = http.list_tests().await?;
                    println!("{}", serde_json::to_string_pretty(&tests)?);
                }
                TestsCommand::History { qualified_name } => match qualified_name {
                    Some(name) => {
                        let history = http.history_for(&name).await?;
                        println!("{}", serde_json::to_string_pretty(&history)?);
                    }
                    None => {
                        let history = http.history_all().await?;
                        println!("{}", serde_json::to_string_pretty(&history)?);
                    }
                },
            }
        }
        Command::Tool { sub } => {
            let http = client::Client::new(base_url);
            match sub {
                ToolCommand::List => {
                    let tools = http.list_tools().await?;
                    println!("{}", serde_json::to_string_pretty(&tools)?);
                }
                ToolCommand::Show { name } => {
                    let schema = http.tool_schema(&name).await?;
                    println!("{}", serde_json::to_string_pretty(&schema)?);
                }
                ToolCommand::Invoke { name, args } => {
                    let outcome = http.invoke_tool(&name, parse_kv_args(&args)).await?;
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
            }
        }
    }

    Ok(())
}
