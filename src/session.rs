pub mod editor_session;
pub mod replay;
