//! Two-replica reconciliation between the local machine and a codespace.
//!
//! Every resource exists on two sides: the local filesystem and the remote
//! environment. This module decides which side is authoritative and what to
//! move. The bytes themselves are moved by [`crate::remote`].
//!
//! # Architecture
//!
//! - **timestamp**: last-activity instant of a session log (final line only)
//! - **compare**: newer-side-wins verdict; absent loses, ties never transfer
//! - **enumerate**: recent candidates on either side, with an injectable clock
//! - **sessions**: push/pull passes over session logs and their aux dirs
//! - **settings**: `.claude/settings.local.json` allow-list reads and in-place appends
//! - **permissions**: foreign-path filter, per-grant confirmation, additive merge
//!
//! # Failure policy
//!
//! Session passes stop on the first transport failure and return it. A
//! permission pass never fails; problems are logged and it reports zero
//! merged grants.
//!
//! ```rust,ignore
//! use codespace_sync::remote::GhCodespace;
//! use codespace_sync::sync::{SessionLayout, SessionReconciler, SystemClock};
//!
//! let cs = GhCodespace::new("fluffy-umbrella-5g4x");
//! let layout = SessionLayout::new(projects_dir).with_window_days(7);
//! let report = SessionReconciler::new(&cs, &cs, &SystemClock, layout).push("widget")?;
//! println!("{report}");
//! ```

pub mod compare;
pub mod enumerate;
pub mod permissions;
pub mod sessions;
pub mod settings;
pub mod timestamp;

pub use compare::{Direction, Replica, Verdict, decide};
pub use enumerate::{
    Clock, DEFAULT_WINDOW_DAYS, FixedClock, SystemClock, recent_local_sessions,
    recent_remote_sessions,
};
pub use permissions::{
    PathScope, PermissionError, PermissionReconciler, find_new_permissions, merge_accepted,
    read_remote_allow_list,
};
pub use sessions::{SessionLayout, SessionOutcome, SessionReconciler, SessionReport, SyncError};
pub use settings::{
    SETTINGS_SUBPATH, Settings, SettingsError, append_allowed, read_allow_list, settings_path,
};
pub use timestamp::{ActivityTime, extract_timestamp, last_record_instant, local_last_instant};
