//! Task store client
//!
//! A task is a user's request to collect data from one website. Tasks are
//! stored in the shared document store and scoped to their owner: a session
//! only sees its own tasks and may only modify tasks its snapshot attributes
//! to it. Completion is announced exactly once, whichever session sees it
//! first.

mod model;
mod store;
mod subscription;

pub use model::{NewTask, ResultRow, Task, TaskPatch, TaskStatus, TaskSummary};
pub use store::{OwnershipCheck, Result, TaskError, TaskStore};
pub use subscription::TaskSubscription;
