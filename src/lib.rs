//! Student gradebook: roster, course catalog and grade records kept in
//! Postgres, with credit-weighted GPA reporting on top.
//!
//! [`gpa`] holds the grade arithmetic and has no I/O. Everything that checks
//! user input before it is stored lives in [`validation`].

pub mod db;
pub mod gpa;
pub mod models;
pub mod report;
pub mod validation;
