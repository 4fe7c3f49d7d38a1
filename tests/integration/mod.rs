//! Integration tests for fan-out dispatch and completion reconciliation

mod cli_parse;
mod config_loading;
mod fanout_flow;
mod support;
