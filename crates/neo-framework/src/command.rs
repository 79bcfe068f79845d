//! Command trees and the global command registry.
//!
//! A [`Command`] is a node with an optional handler and any number of
//! subcommands; a node with subcommands is a *group*. Every node records the
//! addon that owns it. Ownership is assigned by
//! [`AddonManager::add_command`](crate::manager::AddonManager::add_command),
//! which walks the whole tree.
//!
//! ```rust,ignore
//! let todo = Command::new("todo")
//!     .description("Manage your todo list")
//!     .subcommand(Command::new("add").handler(add_todo))
//!     .subcommand(Command::new("remove").alias("rm").handler(remove_todo));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::addon::{Addon, AddonRef, downcast};
use crate::error::{CommandError, CommandResult};
use crate::event::EventArgs;

/// Boxed command handler.
pub type CommandFn = Arc<dyn Fn(Invocation) -> BoxFuture<'static, CommandResult> + Send + Sync>;

// =============================================================================
// Invocation
// =============================================================================

/// Everything a handler receives for one command call.
pub struct Invocation {
    /// The addon currently owning the command.
    pub owner: AddonRef,
    /// Space-separated path of the invoked node, e.g. `todo add`.
    pub path: String,
    /// Remaining whitespace-separated words.
    pub args: Vec<String>,
    /// Caller-supplied context (author, channel, ...).
    pub context: EventArgs,
}

impl Invocation {
    /// The argument at `index`, or [`CommandError::MissingArgument`] named `name`.
    pub fn arg(&self, index: usize, name: &str) -> CommandResult<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| CommandError::missing_argument(name))
    }

    /// Parses the argument at `index`.
    pub fn parse_arg<T>(&self, index: usize, name: &str) -> CommandResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.arg(index, name)?
            .parse()
            .map_err(|e| CommandError::bad_argument(name, e))
    }

    /// Every argument from `index` on, joined by single spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|a| a.join(" ")).unwrap_or_default()
    }

    /// The owning addon as a concrete type.
    pub fn owner_as<A: Addon>(&self) -> Option<Arc<A>> {
        downcast::<A>(&self.owner)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("owner", &self.owner.name())
            .field("path", &self.path)
            .field("args", &self.args)
            .finish()
    }
}

// =============================================================================
// Command
// =============================================================================

/// A command node.
#[derive(Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: String,
    handler: Option<CommandFn>,
    children: Vec<Command>,
    owner: Option<&'static str>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            handler: None,
            children: Vec::new(),
            owner: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the handler run when this node is invoked.
    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        self.handler = Some(Arc::new(move |inv| handler(inv).boxed()));
        self
    }

    /// Adds a subcommand, turning this node into a group.
    pub fn subcommand(mut self, child: Command) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn help(&self) -> &str {
        &self.description
    }

    /// Name of the owning addon, once registered.
    pub fn owner(&self) -> Option<&'static str> {
        self.owner
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn children(&self) -> &[Command] {
        &self.children
    }

    pub(crate) fn handler_fn(&self) -> Option<&CommandFn> {
        self.handler.as_ref()
    }

    /// Sets the owner of this node and of every descendant.
    pub fn reparent(&mut self, owner: &'static str) {
        self.owner = Some(owner);
        for child in &mut self.children {
            child.reparent(owner);
        }
    }

    /// Every descendant (not this node), depth first, with its full path.
    pub fn walk(&self) -> Vec<(String, &Command)> {
        let mut out = Vec::new();
        self.walk_into(&self.name, &mut out);
        out
    }

    fn walk_into<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Command)>) {
        for child in &self.children {
            let path = format!("{prefix} {}", child.name);
            out.push((path.clone(), child));
            child.walk_into(&path, out);
        }
    }

    /// Returns `true` if `token` is this node's name or one of its aliases.
    pub fn matches(&self, token: &str, case_insensitive: bool) -> bool {
        self.is_named(token, case_insensitive) || self.has_alias(token, case_insensitive)
    }

    fn is_named(&self, token: &str, case_insensitive: bool) -> bool {
        same_word(&self.name, token, case_insensitive)
    }

    fn has_alias(&self, token: &str, case_insensitive: bool) -> bool {
        self.aliases.iter().any(|a| same_word(a, token, case_insensitive))
    }

    pub fn find_child(&self, token: &str, case_insensitive: bool) -> Option<&Command> {
        find_named(&self.children, token, case_insensitive)
    }
}

fn same_word(candidate: &str, token: &str, case_insensitive: bool) -> bool {
    if case_insensitive {
        candidate.to_lowercase() == token.to_lowercase()
    } else {
        candidate == token
    }
}

/// A command whose own name is `token` wins over one that only aliases it.
fn find_named<'a, I>(commands: I, token: &str, case_insensitive: bool) -> Option<&'a Command>
where
    I: IntoIterator<Item = &'a Command>,
    I::IntoIter: Clone,
{
    let commands = commands.into_iter();
    commands
        .clone()
        .find(|c| c.is_named(token, case_insensitive))
        .or_else(|| commands.clone().find(|c| c.has_alias(token, case_insensitive)))
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("children", &self.children)
            .finish()
    }
}

// =============================================================================
// CommandRegistry
// =============================================================================

/// A resolved command: the matched node and how many words it consumed.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub command: Command,
    pub path: String,
    pub consumed: usize,
}

/// Top-level commands of every loaded addon, keyed by name.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<String, Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `command`, returning the command it replaced.
    pub fn add(&self, command: Command) -> Option<Command> {
        self.commands.write().insert(command.name.clone(), command)
    }

    pub fn remove(&self, name: &str) -> Option<Command> {
        self.commands.write().remove(name)
    }

    /// Removes and returns every top-level command owned by `owner`.
    pub fn remove_owner(&self, owner: &str) -> Vec<Command> {
        let mut commands = self.commands.write();
        let names: Vec<String> = commands
            .values()
            .filter(|c| c.owner == Some(owner))
            .map(|c| c.name.clone())
            .collect();
        names
            .iter()
            .filter_map(|name| commands.remove(name))
            .collect()
    }

    /// The top-level command registered under exactly `name`.
    pub fn get(&self, name: &str) -> Option<Command> {
        self.commands.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.read().keys().cloned().collect()
    }

    /// Names of the top-level commands owned by `owner`.
    pub fn owned_by(&self, owner: &str) -> Vec<String> {
        self.commands
            .read()
            .values()
            .filter(|c| c.owner == Some(owner))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Follows `words` down the tree as far as they name subcommands.
    pub fn resolve(&self, words: &[&str], case_insensitive: bool) -> Option<Resolved> {
        let (first, rest) = words.split_first()?;
        let commands = self.commands.read();
        let mut node = find_named(commands.values(), first, case_insensitive)?;
        let mut path = node.name.clone();
        let mut consumed = 1;

        for word in rest {
            match node.find_child(word, case_insensitive) {
                Some(child) => {
                    path.push(' ');
                    path.push_str(&child.name);
                    node = child;
                    consumed += 1;
                }
                None => break,
            }
        }

        Some(Resolved {
            command: node.clone(),
            path,
            consumed,
        })
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Command {
        Command::new("todo")
            .subcommand(
                Command::new("list")
                    .subcommand(Command::new("all"))
                    .subcommand(Command::new("done").alias("finished")),
            )
            .subcommand(Command::new("add"))
    }

    #[test]
    fn test_walk_paths() {
        let todo = tree();
        let paths: Vec<_> = todo.walk().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec!["todo list", "todo list all", "todo list done", "todo add"]
        );
    }

    #[test]
    fn test_reparent_is_recursive() {
        let mut todo = tree();
        todo.reparent("todos");
        assert_eq!(todo.owner(), Some("todos"));
        assert!(todo.walk().iter().all(|(_, c)| c.owner() == Some("todos")));
    }

    #[test]
    fn test_resolve() {
        let registry = CommandRegistry::new();
        registry.add(tree());

        let resolved = registry.resolve(&["todo", "list", "finished", "x"], false).unwrap();
        assert_eq!(resolved.path, "todo list done");
        assert_eq!(resolved.consumed, 3);

        let resolved = registry.resolve(&["todo", "nope"], false).unwrap();
        assert_eq!(resolved.path, "todo");
        assert_eq!(resolved.consumed, 1);

        assert!(registry.resolve(&["TODO", "LIST"], false).is_none());
        let resolved = registry.resolve(&["TODO", "LIST"], true).unwrap();
        assert_eq!(resolved.path, "todo list");

        assert!(registry.resolve(&[], true).is_none());
    }

    #[test]
    fn test_name_wins_over_alias() {
        let registry = CommandRegistry::new();
        registry.add(Command::new("help").alias("info"));
        registry.add(Command::new("info"));
        registry.add(Command::new("status").alias("stat"));

        assert_eq!(registry.resolve(&["info"], false).unwrap().path, "info");
        assert_eq!(registry.resolve(&["INFO"], true).unwrap().path, "info");
        assert_eq!(registry.resolve(&["stat"], false).unwrap().path, "status");

        let parent = Command::new("todo")
            .subcommand(Command::new("list").alias("ls"))
            .subcommand(Command::new("ls"));
        assert_eq!(parent.find_child("ls", false).unwrap().name(), "ls");
        assert_eq!(parent.find_child("list", false).unwrap().name(), "list");
    }

    #[test]
    fn test_replace_and_remove_owner() {
        let registry = CommandRegistry::new();
        let mut first = Command::new("ping");
        first.reparent("a");
        let mut second = Command::new("ping");
        second.reparent("b");

        registry.add(first);
        let replaced = registry.add(second).unwrap();
        assert_eq!(replaced.owner(), Some("a"));
        assert!(registry.owned_by("a").is_empty());
        assert_eq!(registry.owned_by("b"), vec!["ping"]);

        let removed = registry.remove_owner("b");
        assert_eq!(removed.len(), 1);
        assert!(registry.is_empty());
    }
}
