//! SQLite-backed persistence for completed chats.
//!
//! Every finished turn is handed to the [`ChatStore`] as a [`ChatRecord`]:
//! the chat id, a title taken from the opening message, the owning user, a
//! timestamp, a path, and the full message sequence. Saving the same chat
//! again replaces the earlier version.
//!
//! # Example
//!
//! ```no_run
//! use storage::{ChatId, ChatRecord, ChatStore, Role, StoredMessage};
//!
//! let store = ChatStore::open("chats.db")?;
//!
//! let record = ChatRecord::new(
//!     ChatId::new(),
//!     "local",
//!     vec![
//!         StoredMessage::new(Role::User, "Which widgets are red?"),
//!         StoredMessage::new(Role::Assistant, "Two: w1 and w4."),
//!     ],
//! );
//! store.save(&record)?;
//!
//! for summary in store.list_for_user("local")? {
//!     println!("{} {}: {} messages", summary.id, summary.title, summary.message_count);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod chat;
mod error;
mod store;

pub use chat::{ChatId, ChatRecord, ChatSummary, Role, StoredMessage, TITLE_LEN};
pub use error::{Error, Result};
pub use store::ChatStore;
