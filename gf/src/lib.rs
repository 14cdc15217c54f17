//! Genframe - incremental AI file generation framework
//!
//! Genframe decides whether a generated text artifact has to be recomputed
//! from its declared inputs, and rewrites it while recording enough metadata
//! to make the same decision cheaply next time. Into every output it writes a
//! version marker listing the fingerprints of all inputs it was generated
//! from; on the next run the current fingerprints are compared against the
//! recorded ones and the artifact is only regenerated when they differ.
//!
//! # Core concepts
//!
//! - **Fingerprints stay cheap**: a whitespace-insensitive 8-hex-digit
//!   checksum, not a secure hash
//! - **State in files**: the regeneration decision is recorded inside the
//!   artifact itself, so generated files can be checked into git
//! - **Pinning**: an input that carries its own version marker contributes
//!   that recorded version instead of a fresh content hash, so cosmetic
//!   edits do not cascade downstream
//!
//! # Modules
//!
//! - [`fingerprint`] - whitespace-insensitive content checksum
//! - [`marker`] - the `AIGenVersion(...)` version marker
//! - [`inout`] - addressing of whole files, file segments and stdin
//! - [`segmented`] - splitting a file into content and separator segments
//! - [`writing`] - strategies for embedding and recovering version markers
//! - [`regencheck`] - strategies deciding whether to regenerate
//! - [`task`] - a single generation task wired to a chat collaborator
//! - [`chat`] - the chat collaborator trait and its implementations

pub mod chat;
pub mod error;
pub mod fingerprint;
pub mod inout;
pub mod marker;
pub mod regencheck;
pub mod segmented;
pub mod task;
pub mod writing;

// Re-export commonly used types
pub use chat::{
    ChatClient, ChatError, ChatMessage, ChatRequest, CopyChat, MODEL_COPY, OPENAI_URL, OpenAiChat,
    Role,
};
pub use error::{GenError, Result};
pub use fingerprint::fingerprint;
pub use inout::InOut;
pub use marker::{VersionMarker, unclutter};
pub use regencheck::RegenerationCheckStrategy;
pub use segmented::SegmentedFile;
pub use task::{FIXME, GenerationTask};
pub use writing::WritingStrategy;
