use clap::{Parser, Subcommand};
use serde_json::Value;

use inspection_agent::agent::CompiledSubmission;
use inspection_agent::cache::Handle;
use inspection_agent::http::FRAME_CONTENT_TYPE;
use inspection_agent::interactive::InteractMessage;
use inspection_agent::protocol::{encode_frame, FrameDecoder, Request, RequestEnvelope};

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Client for a running inspection agent", long_about = None)]
struct Cli {
    /// Agent endpoint, as printed by the agent on startup.
    #[arg(short, long, default_value = "http://127.0.0.1:49152/v1/agent")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the agent's identity
    Identity,
    /// List supported requests and hierarchy kinds
    Features,
    /// Evaluate a unit of code
    Evaluate {
        code: String,
        #[arg(long, default_value = "cli")]
        cell: String,
    },
    /// Read the members of a handle
    Members { handle: i64 },
    /// Interact with a proxy handle
    Interact {
        handle: i64,
        #[arg(long, requires = "representation")]
        member: Option<usize>,
        #[arg(long, requires = "member")]
        representation: Option<usize>,
    },
    /// Set a member to a JSON value
    Set {
        handle: i64,
        member: String,
        value: String,
    },
    /// Capture a view hierarchy
    Tree {
        #[arg(default_value = "demo")]
        kind: String,
    },
    /// Change the agent's log level
    LogLevel { level: String },
    /// Clear handles and reset proxies
    Reset,
    /// Stream pushed messages until interrupted
    Listen,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let request = match cli.command {
        Commands::Identity => Request::AgentIdentity,
        Commands::Features => Request::AgentFeatures,
        Commands::Evaluate { code, cell } => Request::Evaluate(CompiledSubmission {
            code_cell_id: cell,
            unit: code,
        }),
        Commands::Members { handle } => Request::GetObjectMembers {
            handle: Handle::new(handle),
        },
        Commands::Interact {
            handle,
            member,
            representation,
        } => Request::Interact {
            handle: Handle::new(handle),
            message: Some(match (member, representation) {
                (Some(member_index), Some(representation_index)) => InteractMessage::Member {
                    member_index,
                    representation_index,
                },
                _ => InteractMessage::ReadAllMembers,
            }),
        },
        Commands::Set {
            handle,
            member,
            value,
        } => Request::SetObjectMember {
            handle: Handle::new(handle),
            member_name: member,
            value: serde_json::from_str(&value)?,
            return_updated_value: true,
        },
        Commands::Tree { kind } => Request::VisualTree {
            hierarchy_kind: kind,
        },
        Commands::LogLevel { level } => Request::SetLogLevel { level },
        Commands::Reset => Request::ResetState,
        Commands::Listen => Request::OpenMessageChannel,
    };

    let body = encode_frame(&RequestEnvelope::new(request))?;
    let mut res = client
        .post(&cli.url)
        .header(reqwest::header::CONTENT_TYPE, FRAME_CONTENT_TYPE)
        .body(body)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: agent returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Body: {}", text);
        }
        return Ok(());
    }

    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = res.chunk().await? {
        decoder.extend(&chunk);
        while let Some(frame) = decoder.next_message::<Value>()? {
            if frame.get("type").and_then(Value::as_str) == Some("end_of_messages") {
                return Ok(());
            }
            println!("{}", serde_json::to_string_pretty(&frame)?);
        }
    }

    if decoder.buffered() > 0 {
        eprintln!("Warning: {} trailing bytes", decoder.buffered());
    }
    Ok(())
}
