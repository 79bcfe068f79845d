//! Greeter Bot Example
//!
//! A console bot built on the neo core. Every line read from stdin is
//! treated as a chat message from `--author` in server `--server`:
//!
//! ```text
//! n!hello            -> greets the author (once per cooldown)
//! n!add 2 3          -> prints 5
//! n!prefix ?         -> changes the server prefix, persisted on assignment
//! /join <name>       -> dispatches a member_join event
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package greeter-bot -- --config demos/greeter/neo.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use neo::event_args;
use neo::prelude::*;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const HELLO_COOLDOWN: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "greeter-bot", about = "A console bot example for the neo core")]
struct Args {
    /// Configuration file, `neo.toml` in the current directory by default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server the console messages belong to.
    #[arg(long, default_value_t = 1)]
    server: i64,

    #[arg(long, default_value = "console")]
    author: String,

    /// User id of the author, for the command cooldown.
    #[arg(long, default_value_t = 1)]
    author_id: i64,
}

// ============================================================================
// Greeter addon
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GreeterConfig {
    greeting: String,
}

impl Default for GreeterConfig {
    fn default() -> Self {
        Self {
            greeting: "Hello".into(),
        }
    }
}

struct Greeter {
    greeting: RwLock<String>,
    /// Authors greeted within the cooldown. Created on load so its timers
    /// stop when the addon unloads.
    recently_greeted: RwLock<Option<DecayingSet<String>>>,
}

impl Greeter {
    fn new() -> Self {
        Self {
            greeting: RwLock::new(GreeterConfig::default().greeting),
            recently_greeted: RwLock::new(None),
        }
    }

    /// Returns `true` if `author` has not been greeted within the cooldown.
    fn mark_greeted(&self, author: &str) -> bool {
        let recently_greeted = self.recently_greeted.read();
        let Some(set) = recently_greeted.as_ref() else {
            return false;
        };
        if set.contains(author) {
            return false;
        }
        set.insert(author.to_owned())
    }

    fn member_join<'a>(&'a self, args: &'a EventArgs) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let member = args.get::<String>(0)?;
            println!("{}, {member}!", self.greeting.read());
            HandlerResult::Ok(())
        })
    }
}

fn author(inv: &Invocation) -> CommandResult<String> {
    inv.context
        .get::<String>(0)
        .cloned()
        .map_err(|e| CommandError::failed(e.to_string()))
}

async fn hello(inv: Invocation) -> CommandResult {
    let greeter = inv
        .owner_as::<Greeter>()
        .ok_or_else(|| CommandError::failed("greeter is not loaded"))?;
    let author = author(&inv)?;

    if !greeter.mark_greeted(&author) {
        return Ok(());
    }
    println!("{}, {author}!", greeter.greeting.read());
    Ok(())
}

async fn add(inv: Invocation) -> CommandResult {
    let a: i64 = inv.parse_arg(0, "a")?;
    let b: i64 = inv.parse_arg(1, "b")?;
    println!("{}", checked_sum(a, b)?);
    Ok(())
}

fn checked_sum(a: i64, b: i64) -> CommandResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| CommandError::failed(format!("{a} + {b} overflows")))
}

#[async_trait]
impl Addon for Greeter {
    const NAME: &'static str = "greeter";

    fn receivers() -> Receivers<Self> {
        Receivers::new().on("member_join", Self::member_join)
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![
            Command::new("hello")
                .alias("hi")
                .description("Greets you, once per cooldown")
                .handler(hello),
            Command::new("add")
                .description("Adds two integers")
                .handler(add),
        ]
    }

    async fn on_load(&self, ctx: &AddonContext) -> Result<(), BoxError> {
        let config: GreeterConfig = ctx.get_config()?;
        *self.greeting.write() = config.greeting;
        *self.recently_greeted.write() =
            Some(DecayingSet::with_parent(HELLO_COOLDOWN, ctx.token()));
        Ok(())
    }
}

// ============================================================================
// Console loop
// ============================================================================

async fn console(runtime: &NeoRuntime, args: &Args) -> Result<()> {
    let server = runtime.add_server(args.server).await?;
    info!(
        server = args.server,
        prefix = %server.prefix(),
        "Reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(member) = line.strip_prefix("/join ") {
            runtime
                .dispatch("member_join", &event_args![member.trim().to_owned()])
                .await;
            continue;
        }

        let prefix = runtime.prefix_for(Some(args.server));
        if let Some(new_prefix) = line.strip_prefix(&format!("{prefix}prefix ")) {
            server.set_prefix(new_prefix.trim().to_owned());
            println!("Prefix is now `{}`", server.prefix());
            continue;
        }

        let context = event_args![args.author.clone()];
        if let Some(reply) = runtime
            .handle_message(Some(args.server), args.author_id, &line, context)
            .await
        {
            println!("{reply}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = NeoRuntime::builder().addon(Greeter::new);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    runtime
        .run_until(async {
            tokio::select! {
                result = console(&runtime, &args) => {
                    if let Err(e) = result {
                        warn!(error = %e, "Console loop failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
            }
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_sum_overflow() {
        assert_eq!(checked_sum(2, 3).unwrap(), 5);
        assert_eq!(checked_sum(i64::MIN, 1).unwrap(), i64::MIN + 1);

        let err = checked_sum(i64::MAX, 1).unwrap_err();
        assert_eq!(err.to_string(), format!("{} + 1 overflows", i64::MAX));
    }
}
