pub mod addresses;
pub mod attendance;
pub mod contacts;
pub mod core;
pub mod courses;
pub mod enrollments;
pub mod grades;
pub mod records;
pub mod setup;
pub mod students;
