//! Studyhall - a classroom management backend
//!
//! This library provides the core functionality for the Studyhall server:
//! classes with join codes, assignments and grades, per-class chats and
//! personal calendar events.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
