/// Outcome of an agent task that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task observed its cancellation token and stopped early.
    Cancelled,
    /// The task ran to completion but could not produce a value.
    Failed(String),
    /// The task panicked while starting or while running.
    Panicked(String),
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

impl std::fmt::Display for TaskError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskError::Cancelled => write!(f, "task cancelled"),
            TaskError::Failed(msg) => write!(f, "task failed: {msg}"),
            TaskError::Panicked(msg) => write!(f, "task panicked: {msg}"),
        }
    }
}

impl std::error::Error for TaskError {}

pub type TaskResult<T> = Result<T, TaskError>;

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{panic_message, TaskError};

    #[test]
    fn displays_reason() {
        assert_eq!(TaskError::failed("boom").to_string(), "task failed: boom");
        assert_eq!(TaskError::Cancelled.to_string(), "task cancelled");
    }

    #[test]
    fn extracts_panic_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("bad {}", 1)).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad 1");
    }
}
