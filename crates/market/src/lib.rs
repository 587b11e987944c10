//! Market runtime: event store, dispatcher, read models, application service.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod review;
pub mod service;
