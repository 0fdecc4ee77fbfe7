//! Interactive terminal coding agent powered by tether-rs.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Interactive REPL
//! tether-code --workdir /path/to/project
//!
//! # One-shot mode
//! tether-code --prompt "Add error handling to src/main.zig"
//! ```

mod api;
mod commands;
mod config;
mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use api::HttpLlmClient;
use commands::{HELP_TEXT, ReplCommand, parse_line};
use config::CodeConfig;
use prompt::coding_system_prompt;
use tether_rs::persist;
use tether_rs::prelude::*;

/// Interactive terminal coding agent.
#[derive(Parser)]
#[command(name = "tether-code")]
struct Cli {
    /// Initial prompt (one-shot mode). Without this, starts the REPL.
    #[arg(long)]
    prompt: Option<String>,

    /// Model to use for completions.
    #[arg(long, default_value = "anthropic/claude-sonnet-4")]
    model: String,

    /// Working directory; all tool paths are sandboxed under it.
    #[arg(long, default_value = ".")]
    workdir: String,

    /// Hard iteration cap per request.
    #[arg(long, default_value_t = 24)]
    max_steps: u32,

    /// Use the bridge orchestrator instead of router mode.
    #[arg(long)]
    bridge: bool,
}

/// UI port printing status and timeline lines to stderr, keeping stdout
/// for agent answers.
struct ReplPort;

impl UiPort for ReplPort {
    fn publish_status(&self, status: &str) {
        eprintln!("· {status}");
    }

    fn append_timeline_line(&self, line: &str) {
        eprintln!("  [{line}]");
    }
}

/// Everything one REPL session needs.
struct Session {
    client: HttpLlmClient,
    executor: ToolExecutor,
    config: CodeConfig,
    cancel: CancelFlag,
    ui: Arc<ReplPort>,
    context: ContextWindow,
    context_path: PathBuf,
    todos_path: PathBuf,
    history_path: PathBuf,
}

impl Session {
    /// Run one agent turn and persist state afterwards.
    async fn run_turn(&mut self, text: &str) {
        let response = if self.config.bridge_mode {
            self.run_bridge_turn(text).await
        } else {
            let agent_config = self.config.build_agent_config();
            let agent = AgentHarness::new(
                &self.client,
                &self.executor,
                agent_config,
                self.cancel.clone(),
                self.ui.clone(),
            );
            let outcome = agent.run(text, &mut self.context).await;
            if outcome.tool_call_count > 0 {
                eprintln!(
                    "  ({} tool call(s), {} step(s))",
                    outcome.tool_call_count, outcome.steps
                );
            }
            outcome.response
        };

        println!("{response}");
        self.persist_state();
    }

    /// Bridge-mode turn: structured tool calls from the provider client.
    async fn run_bridge_turn(&mut self, text: &str) -> String {
        self.cancel.reset();
        self.context.append(TurnRole::User, text, TurnMeta::default());
        let messages = vec![
            BridgeMessage::system(coding_system_prompt()),
            BridgeMessage::user(self.context.build_prompt(text)),
        ];
        let orchestrator = BridgeOrchestrator::new(
            &self.client,
            &self.executor,
            self.ui.as_ref(),
            &self.cancel,
            self.config.build_agent_config().bridge_max_iterations,
        );
        let response = match orchestrator.run(messages).await {
            Ok(text) => text,
            Err(e) => format!("Bridge error: {e}"),
        };
        self.context
            .append(TurnRole::Assistant, &response, TurnMeta::default());
        self.context.compact(Some(&self.client)).await;
        response
    }

    fn persist_state(&self) {
        if let Err(e) = self.context.save(&self.context_path) {
            eprintln!("warning: could not save context: {e}");
        }
        if let Err(e) = self.executor.save_todos(&self.todos_path) {
            eprintln!("warning: could not save todos: {e}");
        }
    }

    fn append_history(&self, line: &str) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        use std::io::Write;
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
        {
            let _ = writeln!(file, "{line}");
        }
    }

    async fn handle(&mut self, command: ReplCommand) -> bool {
        match command {
            ReplCommand::Help => println!("{HELP_TEXT}"),
            ReplCommand::Todos => {
                let result = self
                    .executor
                    .execute(&ToolInvocation::new("todo_list", "{}"))
                    .await;
                println!("{}", result.payload);
            }
            ReplCommand::Status => {
                println!(
                    "model: {}\nworkspace: {}\ncontext: ~{} chars over {} turn(s)",
                    self.client.model(),
                    self.executor.root().root().display(),
                    self.context.estimated_chars(),
                    self.context.turns().len(),
                );
            }
            ReplCommand::Compact => {
                self.context.compact(Some(&self.client)).await;
                println!("context compacted to ~{} chars", self.context.estimated_chars());
                self.persist_state();
            }
            ReplCommand::Clear => {
                self.context.clear();
                println!("context cleared");
                self.persist_state();
            }
            ReplCommand::Model(None) => println!("model: {}", self.client.model()),
            ReplCommand::Model(Some(model)) => {
                self.client.set_model(model.clone());
                self.config.model = model;
                println!("model set to {}", self.client.model());
            }
            ReplCommand::Cancel => {
                self.cancel.trigger();
                println!("cancellation requested");
            }
            ReplCommand::Quit => return false,
            ReplCommand::Prompt(text) => {
                self.append_history(&text);
                self.run_turn(&text).await;
            }
            ReplCommand::Unknown(name) => {
                println!("unknown command '/{name}' — try /help");
            }
        }
        true
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let workdir = std::fs::canonicalize(&cli.workdir)
        .unwrap_or_else(|_| PathBuf::from(&cli.workdir))
        .to_string_lossy()
        .to_string();
    let root = match WorkspaceRoot::new(&workdir) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let api_key = match std::env::var("OPENROUTER_KEY") {
        Ok(key) => key,
        Err(_) => {
            eprintln!("Error: OPENROUTER_KEY environment variable is not set");
            std::process::exit(1);
        }
    };

    let code_config = CodeConfig {
        model: cli.model.clone(),
        workdir: workdir.clone(),
        max_steps: cli.max_steps,
        bridge_mode: cli.bridge,
        ..Default::default()
    };

    let cancel = CancelFlag::new();
    let ui = Arc::new(ReplPort);
    let executor = ToolExecutor::new(root.clone(), cancel.clone(), ui.clone());

    let client = match HttpLlmClient::new(api_key, cli.model, coding_system_prompt()) {
        Ok(client) => client.with_bridge_tools(executor.registry().descriptors()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    // Project-scoped state: context, todos, input history.
    let state_dir = persist::state_dir();
    let context_path = persist::context_file(&state_dir, root.root());
    let todos_path = persist::todos_file(&state_dir, root.root());
    let history_path = persist::history_file(&state_dir);

    let agent_defaults = code_config.build_agent_config();
    let mut context = ContextWindow::new(
        agent_defaults.max_context_chars,
        agent_defaults.keep_recent_turns,
    );
    if context_path.exists()
        && let Err(e) = context.load(&context_path)
    {
        eprintln!("warning: could not load saved context: {e}");
    }
    executor.load_todos(&todos_path);

    // Ctrl-C trips the cooperative cancellation flag; the loop notices at
    // its next yield point. A second Ctrl-C while idle exits normally via
    // EOF handling.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    break;
                }
                cancel.trigger();
            }
        });
    }

    let mut session = Session {
        client,
        executor,
        config: code_config,
        cancel,
        ui,
        context,
        context_path,
        todos_path,
        history_path,
    };

    // One-shot mode.
    if let Some(prompt) = cli.prompt {
        session.run_turn(&prompt).await;
        return;
    }

    // REPL.
    println!("tether-code ({}) in {workdir}", session.client.model());
    println!("type /help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        use std::io::Write;
        print!("tether> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let Some(command) = parse_line(&line) else {
            continue;
        };
        if !session.handle(command).await {
            break;
        }
    }
    session.persist_state();
}
