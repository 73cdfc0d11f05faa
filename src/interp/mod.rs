//! Tree-walking interpreter for TurtleScript
//!
//! Runs parsed commands directly. Values live in parent-chained [`Memory`]
//! scopes; side effects leave through a [`Bus`].

pub mod args;
pub mod builtins;
pub mod exec;
pub mod hooks;
pub mod memory;
pub mod value;

pub use args::{ArgSpec, ArgType, Categories};
pub use builtins::{CommandSpec, Handler, Registry};
pub use exec::{BoxFuture, ControlFlow, Executable, ExecutableFactory, Interpreter, Session};
pub use hooks::{Bus, ChannelBus, Hooks, Message, MessageQueue, NoHooks, NullBus, RecordingBus};
pub use memory::{BoundParameters, DataInjector, Memory};
pub use value::{ParamType, StructuredMemoryData, format_value};
