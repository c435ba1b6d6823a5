//! Internal domain modules for the NotaMy core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod codec;
pub mod date_range;
pub mod delete;
pub mod display;
pub mod error;
pub mod note;
pub mod notebook;
pub mod protect;
pub mod record;
pub mod session;
pub mod shape;
pub mod storage;
pub mod tree;

#[doc(inline)]
pub use codec::CodecError;
#[doc(inline)]
pub use date_range::{parse_note_date, DateRange};
#[doc(inline)]
pub use delete::{DeleteResult, DeleteStrategy};
#[doc(inline)]
pub use display::{NoteView, OutlineEntry, OutlineRow, RenderStyle};
#[doc(inline)]
pub use error::{NotamyError, Result};
#[doc(inline)]
pub use note::{NoteChanges, NoteRecord, TagSpec};
#[doc(inline)]
pub use notebook::{Candidate, NodeKey, Notebook};
#[doc(inline)]
pub use session::Session;
#[doc(inline)]
pub use storage::Storage;
#[doc(inline)]
pub use tree::{Locator, MatchField, NodeId, NodeInfo, TreeIndex};
