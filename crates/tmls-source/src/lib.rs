//! Text primitives shared by every tmls crate.
//!
//! Offsets are UTF-8 byte offsets into a document's text. Editor positions
//! are converted at the edges through [`LineIndex`] and a
//! [`PositionEncoding`].

mod collections;
mod file;
mod loader;
mod path;
mod position;
mod span;
mod system;

pub use collections::FxDashMap;
pub use file::SourceText;
pub use file::TextEncoding;
pub use loader::FileTextLoader;
pub use loader::InMemoryTextLoader;
pub use loader::LoadedText;
pub use loader::TextLoadError;
pub use loader::TextLoader;
pub use path::clean_utf8_path;
pub use path::Utf8PathClean;
pub use position::LineCol;
pub use position::LineIndex;
pub use position::PositionEncoding;
pub use span::Offset;
pub use span::Span;
pub use system::FileSystem;
pub use system::InMemoryFileSystem;
pub use system::OsFileSystem;
