//! Interactive console
//!
//! Reads one command per line from stdin and drives the bridge with it.
//! Ports are numbered 1-8 here, as on the device's front panel.

use std::fmt::Write as _;
use std::str::FromStr;

use matrix_bridge::{
    port_from_user, BridgeError, BridgeHandle, DeviceEndpoint, PortKind, RoutingState,
};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands (ports are 1-8):
  select <input>        arm an input for switching
  switch <output>       route the armed input to an output
  all                   route the armed input to every output
  test <text>           feed text to the response parser
  routing               show the routing table
  selected? <input>     is this input armed?
  fed? <output>         is this output fed by the armed input?
  resources             show connection and poll task state
  start                 connect with the current endpoint
  reconfigure [host] [port]
                        reconnect, optionally to a new address
  stop                  disconnect and stop polling
  help                  show this text
  quit                  exit";

/// A parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Select(u8),
    Switch(u8),
    All,
    Test(String),
    Routing,
    IsSelected(u8),
    IsFed(u8),
    Resources,
    Start,
    Reconfigure {
        host: Option<String>,
        port: Option<u16>,
    },
    Stop,
    Help,
    Quit,
}

/// Why a console line was rejected
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, try 'help'")]
    Unknown(String),

    #[error("'{command}' needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("{0:?} is not a number")]
    NotANumber(String),

    #[error(transparent)]
    Port(#[from] BridgeError),
}

fn user_port(
    command: &'static str,
    kind: PortKind,
    arg: Option<&str>,
) -> Result<u8, CommandError> {
    let what = match kind {
        PortKind::Input => "an input number",
        PortKind::Output => "an output number",
    };
    let arg = arg.ok_or(CommandError::MissingArgument { command, what })?;
    let number: u8 = arg
        .parse()
        .map_err(|_| CommandError::NotANumber(arg.to_string()))?;
    Ok(port_from_user(kind, number)?)
}

impl FromStr for ConsoleCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let cmd = match word.to_ascii_lowercase().as_str() {
            "select" | "sel" => Self::Select(user_port("select", PortKind::Input, args.next())?),
            "switch" | "sw" => Self::Switch(user_port("switch", PortKind::Output, args.next())?),
            "all" => Self::All,
            // Text is passed through untouched, spaces and all
            "test" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument {
                        command: "test",
                        what: "some response text",
                    });
                }
                Self::Test(rest.to_string())
            }
            "routing" | "status" => Self::Routing,
            "selected?" => {
                Self::IsSelected(user_port("selected?", PortKind::Input, args.next())?)
            }
            "fed?" => Self::IsFed(user_port("fed?", PortKind::Output, args.next())?),
            "resources" => Self::Resources,
            "start" => Self::Start,
            "reconfigure" | "reconnect" => {
                let host = args.next().map(str::to_string);
                let port = args
                    .next()
                    .map(|p| p.parse().map_err(|_| CommandError::NotANumber(p.to_string())))
                    .transpose()?;
                Self::Reconfigure { host, port }
            }
            "stop" => Self::Stop,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(CommandError::Unknown(word.to_string())),
        };
        Ok(cmd)
    }
}

/// Render the routing table with 1-based numbering
pub fn format_routing(routing: &RoutingState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Selected input: {}", routing.selected_input() + 1);
    for (output, input) in routing.output_map().iter().enumerate() {
        let marker = if routing.is_output_fed_by_selected(output as u8) {
            " *"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  output {} <- input {}{}",
            output + 1,
            input.saturating_add(1),
            marker
        );
    }
    out
}

/// Console session bound to one bridge
pub struct Console {
    bridge: BridgeHandle,
    endpoint: DeviceEndpoint,
}

impl Console {
    pub fn new(bridge: BridgeHandle, endpoint: DeviceEndpoint) -> Self {
        Self { bridge, endpoint }
    }

    /// Read commands until `quit` or end of input
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", HELP);

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(cmd) => {
                    if let Err(e) = self.execute(cmd).await {
                        println!("error: {}", e);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }

        Ok(())
    }

    async fn execute(&mut self, cmd: ConsoleCommand) -> Result<(), BridgeError> {
        match cmd {
            ConsoleCommand::Select(input) => self.bridge.select_input(input).await?,
            ConsoleCommand::Switch(output) => self.bridge.switch_output(output).await?,
            ConsoleCommand::All => self.bridge.all_outputs_to_selected().await?,
            ConsoleCommand::Test(text) => self.bridge.inject_test_response(text).await?,
            ConsoleCommand::Routing => {
                print!("{}", format_routing(&self.bridge.routing().await?));
            }
            ConsoleCommand::IsSelected(input) => {
                println!("{}", self.bridge.is_input_selected(input).await?);
            }
            ConsoleCommand::IsFed(output) => {
                println!("{}", self.bridge.is_output_fed_by_selected(output).await?);
            }
            ConsoleCommand::Resources => {
                let summary = self.bridge.resources().await?;
                println!(
                    "generation {}, connection {} ({}), poll task {}",
                    summary.generation,
                    if summary.connection_active { "open" } else { "none" },
                    summary.connection_status.name(),
                    if summary.poll_task_active { "running" } else { "stopped" },
                );
            }
            ConsoleCommand::Start => self.bridge.start(self.endpoint.clone()).await?,
            ConsoleCommand::Reconfigure { host, port } => {
                if let Some(host) = host {
                    self.endpoint.host = host;
                }
                if let Some(port) = port {
                    self.endpoint.port = port;
                }
                self.bridge.reconfigure(self.endpoint.clone()).await?;
            }
            ConsoleCommand::Stop => self.bridge.stop().await?,
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}
