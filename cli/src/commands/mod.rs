mod advice;
mod analyze;
mod helpers;
mod import;
mod key;
mod report;

pub(crate) use advice::{cmd_advice, cmd_chat};
pub(crate) use analyze::{cmd_aggregate, cmd_merge, cmd_window};
pub(crate) use helpers::parse_fields;
pub(crate) use import::{cmd_import, cmd_reset, cmd_show, cmd_status};
pub(crate) use key::{cmd_key_clear, cmd_key_set};
pub(crate) use report::cmd_report;
