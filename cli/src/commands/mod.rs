mod backfill;
mod foods;
mod goal;
mod helpers;
mod log;
mod summary;
mod transfer;

pub(crate) use backfill::cmd_backfill;
pub(crate) use foods::cmd_foods;
pub(crate) use goal::{cmd_goal_clear, cmd_goal_set, cmd_goal_show};
pub(crate) use log::{LogArgs, cmd_delete, cmd_log, cmd_water};
pub(crate) use summary::{cmd_history, cmd_summary};
pub(crate) use transfer::{cmd_export, cmd_import};
