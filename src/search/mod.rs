//! Search layer: form state, debounce, and the orchestrator that ties form
//! activity to the remote client and the renderer.

pub mod debounce;
pub mod form;
pub mod orchestrator;
