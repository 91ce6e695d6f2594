use crate::{ListQuery, NoticeLevel, TaskId, TaskStatus, TaskType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPage(ListQuery),
    BatchDelete {
        task_ids: Vec<TaskId>,
    },
    ClearTasks {
        task_type: Option<TaskType>,
        status: Option<TaskStatus>,
    },
    StartPolling,
    StopPolling,
    Notify {
        level: NoticeLevel,
        message: String,
    },
}

impl Effect {
    pub(crate) fn error(message: impl Into<String>) -> Self {
        Effect::Notify {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub(crate) fn success(message: impl Into<String>) -> Self {
        Effect::Notify {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }
}
