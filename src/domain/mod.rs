//! Domain entities, value objects and the ports the application layer depends on.

pub mod batch;
pub mod course;
pub mod enrollment;
pub mod ports;
pub mod student;
