//! # Neo Core
//!
//! Building blocks shared by every layer of the neo bot.
//!
//! - **Decaying containers** ([`DecayingSet`], [`DecayingMap`]): members
//!   expire a fixed delay after their last insertion. Used for cooldowns and
//!   short-lived markers.
//! - **Write-through records** ([`record`]): in-memory mirrors of store rows
//!   whose setters persist each assignment in the background, in order.
//! - **Behaviour overrides** ([`HookTable`], [`Patch`]): named slots the
//!   framework consults at call time, replaced and restored as a unit.
//!
//! ```text
//! ┌──────────────┐   setter   ┌────────────┐  ordered  ┌─────────────┐
//! │ UserProfile  │───────────▶│ WriteQueue │──────────▶│ RecordStore │
//! │ ServerConfig │            └────────────┘           └─────────────┘
//! └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use neo_core::record::{MemoryStore, RecordCache, RecordLink, UserProfile};
//!
//! let store = Arc::new(MemoryStore::new().with_table(
//!     "profiles",
//!     "user_id",
//!     UserProfile::column_defaults(),
//! ));
//! let profiles = RecordCache::<UserProfile>::new(RecordLink::new(store, shutdown));
//! let profile = profiles.get_or_insert(42).await?;
//! profile.set_hl_timeout(5); // returns at once, persisted in the background
//! ```

pub mod decay;
pub mod error;
pub mod patch;
pub mod record;

pub use decay::{DecayingMap, DecayingSet};
pub use error::{
    BoxError, PatchError, PatchResult, RecordError, RecordResult, StoreError, StoreResult,
};
pub use patch::{HookTable, Patch, apply_all};
pub use record::{Record, RecordCache, RecordLink, RecordStore, Row, Value};
