pub mod auth;
pub mod gemini_api;
pub mod generation;
pub mod openai_api;
pub mod prompts;
pub mod review_writer;
pub mod supabase_sync;
pub mod uniqueness;
