pub mod session_manager;
pub mod session_task;
pub mod storage;
