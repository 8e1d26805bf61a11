pub mod attendance;
pub mod classes;
pub mod core;
pub mod finance;
pub mod grades;
pub mod settings;
pub mod students;
