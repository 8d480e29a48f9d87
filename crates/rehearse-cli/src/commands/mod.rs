pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod diagnostics;
pub mod history;
pub mod landing;
pub mod practice;
pub mod tailor;
