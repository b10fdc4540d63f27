//! Command binds: handlers attached to key functions by independent owners

mod handler;
mod registry;

pub use handler::{FnHandler, InputCmdHandler, InputCmdMessage, PressHandler};
pub use registry::{
    BindsError, CommandBind, CommandBindRegistry, CommandBinds, CommandBindsBuilder, OwnerId,
};
