//! Execdiff - structural diff engine for recorded program executions
//!
//! A recorded execution is a forest of steps (calls, syscalls, loop
//! iterations). This library aligns two such forests and reports the
//! cheapest pairing of steps together with the steps each side executed on
//! its own. Repeated loop iterations are recognized, so an execution that
//! polled 12,500 times lines up against one that polled 10,000 times without
//! quadratic blow-up.

pub mod builder;
pub mod canonical;
pub mod cli;
pub mod config;
pub mod cost;
pub mod diff;
pub mod error;
pub mod graph;
pub mod intern;
pub mod matcher;
pub mod preorder;
pub mod property;
pub mod repetition;
pub mod step_model;
pub mod step_trace;
