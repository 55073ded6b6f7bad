pub mod attendance;
pub mod backup_exchange;
pub mod core;
pub mod grades;
pub mod notifications;
pub mod progress;
pub mod sections;
pub mod setup;
pub mod students;
