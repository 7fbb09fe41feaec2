//! Tail log files and turn pattern matches into rendered events.
//!
//! A [`watch::Watcher`] reports file changes, the
//! [`pipeline::dispatch`] loop reads the newly appended bytes through a
//! [`source::FileCursor`], and every [`rule::ExtractionRule`] renders its
//! template once per match into a [`rule::RenderedEvent`] for the
//! configured [`pipeline::EventSink`].

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod rule;
pub mod source;
pub mod watch;
