pub mod agent;
pub mod chat;
pub mod context;
pub mod core;
pub mod llm;
pub mod rag;
pub mod server;
pub mod state;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
