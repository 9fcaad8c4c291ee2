//! Orchestration tests against in-process stubs and the in-memory index.

mod orchestrator;
mod pipeline;
mod support;
