//! Application layer containing the use cases.
//!
//! `AccountTransferService` and `EnrollmentService` are the entry points a
//! caller drives. Both receive their collaborators at construction as shared
//! trait objects and route every write through a single atomic batch.

pub mod enrollment;
pub mod transfer;
