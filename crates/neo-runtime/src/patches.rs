//! The behaviour patches the runtime applies at startup.
//!
//! | Patch | Slot | Value |
//! |-------|------|-------|
//! | `command lookup` | `command.case_insensitive` | `bot.case_insensitive` |
//! | `error wording` | `command.format_error` | user-facing argument messages |
//! | `ignored errors` | `command.suppress_error` | kinds in `bot.ignored_errors` |

use std::collections::HashSet;
use std::sync::Arc;

use neo_core::{HookTable, Patch};
use neo_framework::CommandError;
use neo_framework::behaviour::{self, CASE_INSENSITIVE, FORMAT_ERROR, SUPPRESS_ERROR};

use crate::config::BotConfig;

/// Renders command errors the way users see them.
pub fn user_facing_message(error: &CommandError) -> String {
    match error {
        CommandError::MissingArgument(name) => {
            format!("Missing required argument(s): `{name}`")
        }
        CommandError::BadArgument { name, message } => format!("Argument `{name}`: {message}"),
        other => other.to_string(),
    }
}

/// The stock patches for `hooks`, in application order.
pub fn stock_patches(hooks: &Arc<HookTable>, bot: &BotConfig) -> Vec<Patch> {
    let ignored: HashSet<String> = bot.ignored_errors.iter().cloned().collect();

    vec![
        Patch::new("command lookup", hooks).attribute(CASE_INSENSITIVE, bot.case_insensitive),
        Patch::new("error wording", hooks)
            .attribute(FORMAT_ERROR, behaviour::formatter(user_facing_message)),
        Patch::new("ignored errors", hooks).attribute(
            SUPPRESS_ERROR,
            behaviour::filter(move |e| ignored.contains(e.kind())),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use neo_core::apply_all;
    use neo_framework::Behaviours;

    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            user_facing_message(&CommandError::missing_argument("user")),
            "Missing required argument(s): `user`"
        );
        assert_eq!(
            user_facing_message(&CommandError::bad_argument("count", "invalid digit found in string")),
            "Argument `count`: invalid digit found in string"
        );
        assert_eq!(user_facing_message(&CommandError::failed("nope")), "nope");
    }

    #[test]
    fn test_stock_patches_drive_behaviours() {
        let behaviours = Behaviours::new();
        let bot = BotConfig {
            ignored_errors: vec!["not_found".into()],
            ..Default::default()
        };
        let patches = stock_patches(behaviours.hooks(), &bot);
        assert_eq!(patches.len(), 3);
        assert!(!behaviours.case_insensitive());

        apply_all(&patches).unwrap();
        assert!(behaviours.case_insensitive());
        assert!(behaviours.suppresses(&CommandError::NotFound("x".into())));
        assert!(!behaviours.suppresses(&CommandError::failed("x")));
        assert_eq!(
            behaviours.format_error(&CommandError::missing_argument("text")),
            "Missing required argument(s): `text`"
        );

        for patch in patches.iter().rev() {
            patch.revert().unwrap();
        }
        assert!(!behaviours.case_insensitive());
    }
}
