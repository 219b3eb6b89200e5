pub mod chat;
pub mod response;
