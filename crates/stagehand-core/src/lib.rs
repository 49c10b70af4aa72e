//! Script-block scheduling for a staged, tick-based simulation.
//!
//! A model is a set of script blocks: events that fire at fixed stages of
//! every tick, callbacks that fire from inside population machinery, and
//! user-defined functions. This crate decides which blocks apply at a given
//! tick and context, and keeps that answer consistent while running scripts
//! register, deregister and reschedule blocks mid-cycle.
//!
//! # Modules
//!
//! - [`block`] -- [`ScriptBlock`] and the [`BlockRequest`] builder.
//! - [`cache`] -- Per-kind dispatch index, rebuilt lazily.
//! - [`clock`] -- Tick and stage clock for WF and non-WF cycles.
//! - [`config`] -- Configuration loading from `stagehand-config.yaml`.
//! - [`cycle`] -- Runs the initialization pass and one tick at a time.
//! - [`dispatch`] -- Query matching and seeded shuffling.
//! - [`error`] -- Scheduling and script errors.
//! - [`interpreter`] -- The [`Interpreter`] seam and a no-op stub.
//! - [`pending`] -- Deferred-removal queues.
//! - [`registry`] -- Handle-keyed block storage.
//! - [`runner`] -- The run loop and its end conditions.
//! - [`schedule`] -- Reschedule modes and tick-run merging.
//! - [`scheduler`] -- The [`Scheduler`] façade.
//!
//! [`ScriptBlock`]: block::ScriptBlock
//! [`BlockRequest`]: block::BlockRequest
//! [`Interpreter`]: interpreter::Interpreter
//! [`Scheduler`]: scheduler::Scheduler

pub mod block;
pub mod cache;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod error;
pub mod interpreter;
pub mod pending;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod scheduler;
