pub mod library;
pub mod subagent;
pub mod task;
pub mod vfs;

pub use library::{register_library_tools, LibraryAdapter, LibraryHandle};
pub use subagent::{register_subagent_tools, SubagentRunner};
pub use task::{register_task_tools, Task, TaskStore};
pub use vfs::{register_vfs_tools, VirtualFileSystem};
