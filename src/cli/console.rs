use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;

use crate::agent::{Agent, AskRequest};

/// What the REPL should do after a line of input
#[derive(Debug, PartialEq)]
pub enum Step {
    Print(String),
    Exit,
}

/// Line-oriented chat over one agent session
pub struct Console {
    agent: Arc<Agent>,
    session_id: Option<String>,
    enable_tools: bool,
    tool_names: Option<Vec<String>>,
}

impl Console {
    pub fn new(agent: Arc<Agent>) -> Self {
        Self {
            agent,
            session_id: None,
            enable_tools: true,
            tool_names: None,
        }
    }

    pub fn resume(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn tools(mut self, enable: bool, names: Option<Vec<String>>) -> Self {
        self.enable_tools = enable;
        self.tool_names = names;
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn handle(&mut self, input: &str) -> Step {
        let input = input.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            return Step::Exit;
        }
        if input.is_empty() {
            return Step::Print(String::new());
        }

        if let Some(command) = input.strip_prefix(':') {
            return Step::Print(self.command(command.trim()).await);
        }

        let mut request = AskRequest::new(input).enable_tools(self.enable_tools);
        if let Some(id) = &self.session_id {
            request = request.session(id.as_str());
        }
        if let Some(names) = &self.tool_names {
            request = request.tool_names(names.iter().cloned());
        }

        match self.agent.ask(request).await {
            Ok(outcome) => {
                self.session_id = Some(outcome.session_id.clone());
                let mut out = String::new();
                for call in &outcome.tool_calls {
                    out.push_str(&format!(
                        "  [{}] {} -> {}\n",
                        call.tool_name,
                        serde_json::Value::Object(call.arguments.clone()),
                        call.result
                    ));
                }
                out.push_str(&outcome.answer);
                Step::Print(out)
            }
            Err(e) => Step::Print(format!("Error: {}", e)),
        }
    }

    async fn command(&mut self, command: &str) -> String {
        match command {
            "session" => match &self.session_id {
                Some(id) => format!("Session: {}", id),
                None => "No session yet".to_string(),
            },
            "history" => {
                let Some(id) = &self.session_id else {
                    return "No session yet".to_string();
                };
                match self.agent.history(id).await {
                    Some(history) => history
                        .messages
                        .iter()
                        .map(|m| format!("{}: {}", m.role, m.content.as_deref().unwrap_or("")))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    None => format!("Session {} not found", id),
                }
            }
            "reset" => match self.session_id.take() {
                Some(id) => {
                    self.agent.delete_session(&id);
                    format!("Cleared session {}", id)
                }
                None => "No session yet".to_string(),
            },
            "tools" => self
                .agent
                .registry()
                .list()
                .iter()
                .map(|t| format!("{} - {}", t.name(), t.description()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "Unknown command. Available: :history, :reset, :session, :tools".to_string(),
        }
    }
}

pub async fn run(console: Console) -> Result<()> {
    let mut console = console;
    println!("Colloquy chat ({})", console.agent.model_name());
    println!("Ask a question or type 'exit' to quit");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        match console.handle(&input).await {
            Step::Print(text) if text.is_empty() => {}
            Step::Print(text) => println!("{}", text),
            Step::Exit => break,
        }
    }

    println!("Goodbye!");
    Ok(())
}
