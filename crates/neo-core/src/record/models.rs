//! The record types the bot persists.

use time::OffsetDateTime;

use super::value::Value;

crate::define_record! {
    /// Per-user settings, one row of `profiles`.
    pub struct UserProfile in "profiles" {
        key user_id: i64;
        /// Users whose messages never trigger a highlight for this user.
        hl_blocks: Vec<i64> => set_hl_blocks,
        receive_highlights: bool => set_receive_highlights,
        created_at: OffsetDateTime => set_created_at,
        /// IANA timezone name.
        timezone: Option<String> => set_timezone,
        /// Highlight cooldown in minutes.
        hl_timeout: i64 => set_hl_timeout,
        default_ephemeral: bool => set_default_ephemeral,
    }
}

crate::define_record! {
    /// Per-server settings, one row of `servers`.
    pub struct ServerConfig in "servers" {
        key server_id: i64;
        prefix: String => set_prefix,
        starboard: bool => set_starboard,
        disabled_channels: Vec<i64> => set_disabled_channels,
        disabled_commands: Vec<String> => set_disabled_commands,
    }
}

impl UserProfile {
    /// Column defaults of the `profiles` table.
    pub fn column_defaults() -> Vec<(&'static str, Value)> {
        vec![
            ("hl_blocks", Value::IntList(Vec::new())),
            ("receive_highlights", Value::Bool(true)),
            ("created_at", Value::Timestamp(OffsetDateTime::now_utc())),
            ("timezone", Value::Null),
            ("hl_timeout", Value::Int(1)),
            ("default_ephemeral", Value::Bool(true)),
        ]
    }
}

impl ServerConfig {
    /// Column defaults of the `servers` table. `prefix` is the bot-wide prefix.
    pub fn column_defaults(prefix: &str) -> Vec<(&'static str, Value)> {
        vec![
            ("prefix", Value::from(prefix)),
            ("starboard", Value::Bool(false)),
            ("disabled_channels", Value::IntList(Vec::new())),
            ("disabled_commands", Value::TextList(Vec::new())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::error::RecordError;
    use crate::record::{MemoryStore, Record, RecordLink, RecordStore, Row, RowRef};

    async fn setup() -> (Arc<MemoryStore>, RecordLink, Row) {
        let store = Arc::new(MemoryStore::new().with_table(
            "profiles",
            "user_id",
            UserProfile::column_defaults(),
        ));
        let row = store
            .insert(&RowRef::new("profiles", "user_id", 42i64))
            .await
            .unwrap();
        let link = RecordLink::new(store.clone(), CancellationToken::new());
        (store, link, row)
    }

    #[tokio::test]
    async fn test_from_row_does_not_persist() {
        let (store, link, row) = setup().await;
        let profile = UserProfile::from_row(&row, link.queue()).unwrap();
        profile.flush().await.unwrap();

        assert_eq!(profile.user_id(), 42);
        assert_eq!(profile.hl_timeout(), 1);
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_setter_is_immediate_and_persists_once() {
        let (store, link, row) = setup().await;
        let profile = UserProfile::from_row(&row, link.queue()).unwrap();

        profile.set_timezone(Some("Europe/Paris".to_owned()));
        assert_eq!(profile.timezone().as_deref(), Some("Europe/Paris"));

        profile.flush().await.unwrap();
        let executed = store.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].column, "timezone");
        assert_eq!(executed[0].value, Value::from("Europe/Paris"));
        assert_eq!(executed[0].row.key, Value::Int(42));
        assert_eq!(
            executed[0].statement(),
            "UPDATE profiles SET timezone=$1 WHERE user_id=$2"
        );
    }

    #[tokio::test]
    async fn test_writes_keep_assignment_order() {
        let (store, link, row) = setup().await;
        let profile = UserProfile::from_row(&row, link.queue()).unwrap();

        profile.set_hl_timeout(5);
        profile.set_receive_highlights(false);
        profile.set_hl_timeout(10);
        profile.flush().await.unwrap();

        let columns: Vec<_> = store
            .executed()
            .into_iter()
            .map(|u| (u.column, u.value))
            .collect();
        assert_eq!(
            columns,
            vec![
                ("hl_timeout", Value::Int(5)),
                ("receive_highlights", Value::Bool(false)),
                ("hl_timeout", Value::Int(10)),
            ]
        );
        assert_eq!(
            store.row("profiles", &Value::Int(42)).unwrap()["hl_timeout"],
            Value::Int(10)
        );
    }

    #[tokio::test]
    async fn test_failed_write_keeps_local_value() {
        let (store, link, row) = setup().await;
        let mut failures = link.subscribe_failures();
        let profile = UserProfile::from_row(&row, link.queue()).unwrap();

        store.fail_next(1);
        profile.set_hl_timeout(3);
        profile.flush().await.unwrap();

        assert_eq!(profile.hl_timeout(), 3);
        assert_eq!(failures.recv().await.unwrap().column, "hl_timeout");
        assert_eq!(
            store.row("profiles", &Value::Int(42)).unwrap()["hl_timeout"],
            Value::Int(1)
        );
    }

    #[tokio::test]
    async fn test_reset_field() {
        let (store, link, row) = setup().await;
        let profile = UserProfile::from_row(&row, link.queue()).unwrap();

        profile.set_hl_timeout(30);
        profile.reset_field("hl_timeout").await.unwrap();

        assert_eq!(profile.hl_timeout(), 1);
        // The reset itself is not written back as an update.
        assert_eq!(store.executed().len(), 1);

        let err = profile.reset_field("nickname").await.unwrap_err();
        assert!(matches!(err, RecordError::UnknownField { record: "UserProfile", .. }));
    }

    #[tokio::test]
    async fn test_assignment_during_reset_is_kept() {
        let store = Arc::new(
            MemoryStore::new()
                .with_table("profiles", "user_id", UserProfile::column_defaults())
                .with_latency(Duration::from_millis(5)),
        );
        let row = store
            .insert(&RowRef::new("profiles", "user_id", 42i64))
            .await
            .unwrap();
        let link = RecordLink::new(store.clone(), CancellationToken::new());
        let profile = Arc::new(UserProfile::from_row(&row, link.queue()).unwrap());
        profile.set_hl_timeout(30);

        let reset = tokio::spawn({
            let profile = Arc::clone(&profile);
            async move { profile.reset_field("hl_timeout").await }
        });
        tokio::task::yield_now().await;
        profile.set_hl_timeout(99);

        reset.await.unwrap().unwrap();
        profile.flush().await.unwrap();
        assert_eq!(profile.hl_timeout(), 99);
        assert_eq!(
            store.row("profiles", &Value::Int(42)).unwrap()["hl_timeout"],
            Value::Int(99)
        );
    }

    #[tokio::test]
    async fn test_row_errors() {
        let (_store, link, mut row) = setup().await;
        row.insert("hl_timeout".into(), Value::from("soon"));
        assert!(matches!(
            UserProfile::from_row(&row, link.queue()),
            Err(RecordError::TypeMismatch { column: "hl_timeout", expected: "int", found: "text" })
        ));

        row.remove("hl_timeout");
        assert!(matches!(
            UserProfile::from_row(&row, link.queue()),
            Err(RecordError::MissingColumn { table: "profiles", column: "hl_timeout" })
        ));
    }

    #[tokio::test]
    async fn test_snapshot_and_debug() {
        let store = Arc::new(MemoryStore::new().with_table(
            "servers",
            "server_id",
            ServerConfig::column_defaults("n!"),
        ));
        let row = store
            .insert(&RowRef::new("servers", "server_id", 7i64))
            .await
            .unwrap();
        let link = RecordLink::new(store, CancellationToken::new());
        let config = ServerConfig::from_row(&row, link.queue()).unwrap();

        config.set_disabled_commands(vec!["ping".into()]);
        let snapshot = config.snapshot();
        assert_eq!(snapshot["server_id"], Value::Int(7));
        assert_eq!(snapshot["disabled_commands"], Value::TextList(vec!["ping".into()]));
        assert_eq!(snapshot.len(), 1 + ServerConfig::FIELDS.len());
        assert_eq!(format!("{config:?}"), "<ServerConfig server_id=7>");
    }
}
