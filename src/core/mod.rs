pub mod analytics;
pub mod api;
pub mod autosave;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod kanban;
pub mod search;
pub mod sync;
pub mod terminal;
