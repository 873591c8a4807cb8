mod api;
mod common;
mod recheck;
mod store;
