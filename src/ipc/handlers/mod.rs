pub mod classes;
pub mod core;
pub mod session;
pub mod setup;
pub mod subjects;
pub mod teachers;
pub mod timetable;
