pub mod application;
pub mod commands;
pub mod error;
pub mod http;
pub mod package;
pub mod provider;
pub mod registry;
pub mod runtime;
pub mod source;
pub mod validator;
