//! Fragment Patcher: declarative text patching for component markup
//!
//! A small patching system for splicing blocks of markup into front-end
//! source files (JSX/TSX components) and keeping fragment-wrapper tokens
//! balanced while doing it.
//!
//! # Architecture
//!
//! All edit operations compile down to a single primitive: [`Splice`], a
//! verified byte-span replacement applied to an in-memory document.
//! Intelligence lives in span acquisition (whole-string block match,
//! line scan with a positional floor, wrapper-boundary search), not in the
//! application logic. The core is pure — documents go in and come out as
//! strings — and file I/O happens exactly once at the boundary.
//!
//! # Safety
//!
//! - All splices verify expected before-text before applying
//! - Declared wrapper pairs must balance after the transform or nothing
//!   is written
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - Idempotent operations
//!
//! # Example
//!
//! ```
//! use fragment_patcher::Splice;
//!
//! let splice = Splice::new(0, 5, "howdy", "hello");
//! let out = splice.apply_to("hello world").unwrap();
//! assert_eq!(out.into_document(), "howdy world");
//! ```

pub mod balance;
pub mod config;
pub mod document;
pub mod locate;
pub mod safety;
pub mod splice;

// Re-exports
pub use balance::{plan_close_insertion, BalanceError, WrapperPair};
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError, ConfigError,
    PatchConfig, PatchResult,
};
pub use document::{Document, DocumentError};
pub use locate::{find_block, find_line, LineHit, LocateError, Span};
pub use safety::{SafetyError, WorkspaceGuard};
pub use splice::{indent_block, Splice, SpliceError, SpliceOutcome, SpliceVerification};
