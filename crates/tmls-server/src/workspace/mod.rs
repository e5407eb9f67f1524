mod buffers;
mod loader;
mod manager;

pub use buffers::Buffers;
pub use buffers::TextDocument;
pub use loader::BufferedLoaderFactory;
pub use loader::TextLoaderFactory;
pub use manager::ProjectManager;
pub use manager::WorkspaceChange;
pub use manager::MISC_PROJECT_PATH;
