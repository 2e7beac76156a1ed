pub mod bootstrap;
pub mod bulk_clear;
pub mod commands;
pub mod deadline_scanner;
pub mod list_resolver;
pub mod note_parser;
pub mod oauth;
pub mod relocator;
