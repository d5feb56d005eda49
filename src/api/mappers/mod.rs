// Front-end protocol <-> Gemini translation, one concern per file

pub mod common_utils;
pub mod conversation;
pub mod finish_reason;
pub mod generation;
pub mod response;
pub mod schema;
