use crate::error::{Error, Result};
use tasks_types::NewTaskRequest;

fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidParameter(message()))
    }
}

pub(crate) fn task_id(id: i64) -> Result<()> {
    check(id > 0, || format!("TaskId must be positive number. Got: {}", id))
}

pub(crate) fn page(offset: i64, limit: i64, max_page_size: i64) -> Result<()> {
    check(offset >= 0, || format!("Offset can't be negative. Got: {}", offset))?;
    check(limit > 0, || format!("Limit must be positive number. Got: {}", limit))?;
    check(limit <= max_page_size, || {
        format!("Limit must be <= {}. Got: {}", max_page_size, limit)
    })
}

pub(crate) fn new_task(request: &NewTaskRequest) -> Result<()> {
    check(!request.description.trim().is_empty(), || {
        "Task description can't be empty".to_string()
    })?;
    check(request.ends_at_ms > 0, || "Task ends_at_ms must be > 0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id() {
        assert!(task_id(1).is_ok());
        assert!(matches!(task_id(0), Err(Error::InvalidParameter(_))));
        assert!(matches!(task_id(-5), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_page_bounds() {
        assert!(page(0, 1, 100).is_ok());
        assert!(page(10, 100, 100).is_ok());
        assert!(page(-1, 10, 100).is_err());
        assert!(page(0, 0, 100).is_err());
        assert!(page(0, 101, 100).is_err());
    }

    #[test]
    fn test_new_task() {
        assert!(new_task(&NewTaskRequest::new("walk the dog", 1)).is_ok());
        assert!(new_task(&NewTaskRequest::new("   ", 1)).is_err());
        assert!(new_task(&NewTaskRequest::new("", 1)).is_err());
        assert!(new_task(&NewTaskRequest::new("walk the dog", 0)).is_err());
    }
}
