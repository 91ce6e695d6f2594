//! Console core: task model, result extraction and the pure list state machine.
mod effect;
mod extract;
mod msg;
mod pagination;
mod reconcile;
mod selection;
mod state;
mod submission;
mod task;
mod update;
mod view_model;

pub use effect::Effect;
pub use extract::{decode_inline_media, extract_media, payload_summary, MediaRef, ResultShape};
pub use msg::{ListSnapshot, Msg};
pub use pagination::PageCursor;
pub use reconcile::{has_active_work, reconcile, refresh_selection, ReconciledPage};
pub use selection::{SelectAllState, SelectionSet};
pub use state::{PagingMode, TaskListState};
pub use submission::{
    mime_for_path, size_for_ratio, GenerationRequest, InputMode, ReferenceImage,
    ValidationError, DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL, MAX_REFERENCE_IMAGE_BYTES,
};
pub use task::{
    ListQuery, SortOrder, Task, TaskId, TaskPage, TaskStatus, TaskType, DEFAULT_PAGE_SIZE,
};
pub use update::update;
pub use view_model::{format_size, NoticeLevel, TaskListView, TaskRowView};
