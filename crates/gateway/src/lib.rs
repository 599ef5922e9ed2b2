//! hearthd: a local assistant daemon that streams generations from an
//! OpenAI-compatible model server and reconfigures that server (via
//! systemd) without cutting off answers in flight.

pub mod api;
pub mod backend;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
