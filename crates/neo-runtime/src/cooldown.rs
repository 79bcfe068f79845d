//! Per-user command rate limit.
//!
//! Each user gets a budget of `rate` commands. The first command opens a
//! window of `per`; once the window decays the budget is whole again.
//! Owners are never limited.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use neo_core::DecayingMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::CooldownConfig;

struct Window {
    opened: Instant,
    used: AtomicU32,
}

pub struct CommandCooldown {
    rate: u32,
    per: Duration,
    owners: HashSet<i64>,
    windows: DecayingMap<i64, Arc<Window>>,
    /// Serialises opening a window so concurrent commands share it.
    opening: Mutex<()>,
}

impl CommandCooldown {
    /// Window timers stop when `parent` is cancelled.
    pub fn new(
        config: &CooldownConfig,
        owners: impl IntoIterator<Item = i64>,
        parent: &CancellationToken,
    ) -> Self {
        Self {
            rate: config.rate,
            per: config.per(),
            owners: owners.into_iter().collect(),
            windows: DecayingMap::with_parent(config.per(), parent),
            opening: Mutex::new(()),
        }
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owners.contains(&user_id)
    }

    /// Counts one command by `user_id`.
    ///
    /// Returns the time left in the window once the budget is spent.
    pub fn hit(&self, user_id: i64) -> Result<(), Duration> {
        if self.rate == 0 || self.is_owner(user_id) {
            return Ok(());
        }

        let window = {
            let _opening = self.opening.lock();
            match self.windows.get(&user_id) {
                Some(window) => window,
                None => {
                    let window = Arc::new(Window {
                        opened: Instant::now(),
                        used: AtomicU32::new(0),
                    });
                    self.windows.insert(user_id, Arc::clone(&window));
                    window
                }
            }
        };

        let used = window.used.fetch_add(1, Ordering::Relaxed);
        if used < self.rate {
            return Ok(());
        }
        let retry_after = self.per.saturating_sub(window.opened.elapsed());
        debug!(user_id, retry_after = ?retry_after, "Command budget spent");
        Err(retry_after)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;

    fn cooldown(rate: u32, owners: &[i64]) -> CommandCooldown {
        let config = CooldownConfig { rate, per_secs: 4.0 };
        CommandCooldown::new(&config, owners.iter().copied(), &CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_per_window() {
        let cooldown = cooldown(2, &[]);
        assert_eq!(cooldown.hit(1), Ok(()));
        assert_eq!(cooldown.hit(1), Ok(()));

        sleep(Duration::from_secs(1)).await;
        assert_eq!(cooldown.hit(1), Err(Duration::from_secs(3)));
        // Other users have their own budget.
        assert_eq!(cooldown.hit(2), Ok(()));

        sleep(Duration::from_secs(4)).await;
        assert_eq!(cooldown.hit(1), Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_owners_and_disabled_limit() {
        let limited = cooldown(1, &[7]);
        for _ in 0..5 {
            assert_eq!(limited.hit(7), Ok(()));
        }
        assert!(limited.is_owner(7));

        let unlimited = cooldown(0, &[]);
        for _ in 0..5 {
            assert_eq!(unlimited.hit(1), Ok(()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_windows_stop_with_parent() {
        let parent = CancellationToken::new();
        let config = CooldownConfig { rate: 1, per_secs: 4.0 };
        let cooldown = CommandCooldown::new(&config, [], &parent);
        assert_eq!(cooldown.hit(1), Ok(()));

        parent.cancel();
        sleep(Duration::from_secs(8)).await;
        assert!(cooldown.hit(1).is_err());
    }
}
