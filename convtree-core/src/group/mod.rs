pub mod progress;
pub mod task;

pub use progress::group_agent_progress;
pub use task::group_agent_tasks;
