//! Core executor
//!
//! Walks a command tree statement by statement. Each statement is resolved
//! against the built-in registry, then against procedures bound in scope,
//! and finally treated as a bare expression. Early `return` travels back up
//! as [`ControlFlow::Return`] until a procedure body absorbs it.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use tracing::Instrument;
use ulid::Ulid;

use super::args::{ArgSpec, Categories, validate};
use super::builtins::{Handler, Registry};
use super::hooks::{Bus, Hooks, Message, MessageQueue, NoHooks, NullBus};
use super::memory::{BoundParameters, DataInjector, Memory, WeakMemory};
use super::value::ParamType;
use crate::ast::{Argument, Block, Command, Commands};
use crate::common::is_identifier;
use crate::config::Config;
use crate::diagnostics::{Result, TurtleError};
use crate::{expr, lexer, parser};

/// Boxed future used where execution recurses into nested blocks
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Outcome of running a statement or block
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// Continue with the next statement; carries the implicit value, if any
    Next(Option<ParamType>),
    /// A `return` is unwinding toward the nearest procedure body
    Return(Option<ParamType>),
}

impl ControlFlow {
    pub fn value(&self) -> Option<&ParamType> {
        match self {
            ControlFlow::Next(v) | ControlFlow::Return(v) => v.as_ref(),
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, ControlFlow::Return(_))
    }
}

/// A block together with the scope it was written in.
///
/// The scope is held weakly: `learn` stores the factory inside the very
/// scope it points back to.
#[derive(Clone)]
pub struct ExecutableFactory {
    block: Block,
    scope: WeakMemory,
    params: Rc<[String]>,
}

impl ExecutableFactory {
    pub fn new(block: Block, scope: &Memory) -> Self {
        Self {
            block,
            scope: scope.downgrade(),
            params: Rc::from(Vec::new()),
        }
    }

    /// The same block, declared as a procedure taking `params`
    pub fn with_params(mut self, params: Vec<String>) -> Self {
        self.params = Rc::from(params);
        self
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// A fresh invocation in a new child of the defining scope
    pub fn instantiate(&self) -> Result<Executable> {
        let parent = self.scope.upgrade().ok_or(TurtleError::ScopeExpired)?;
        Ok(Executable {
            block: Rc::clone(&self.block),
            scope: Memory::child(&parent),
        })
    }

    /// Like [`instantiate`](Self::instantiate), with read-only bindings
    pub fn instantiate_with(&self, bindings: Rc<dyn DataInjector>) -> Result<Executable> {
        let parent = self.scope.upgrade().ok_or(TurtleError::ScopeExpired)?;
        Ok(Executable {
            block: Rc::clone(&self.block),
            scope: Memory::child_with(&parent, bindings),
        })
    }
}

impl PartialEq for ExecutableFactory {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.block, &other.block)
            && self.scope.ptr_eq(&other.scope)
            && self.params == other.params
    }
}

impl fmt::Debug for ExecutableFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableFactory")
            .field("commands", &self.block.len())
            .field("params", &self.params)
            .finish()
    }
}

/// One invocation of a block, with its own scope
#[derive(Debug)]
pub struct Executable {
    block: Block,
    scope: Memory,
}

impl Executable {
    pub fn commands(&self) -> &Commands {
        &self.block
    }

    pub fn scope(&self) -> &Memory {
        &self.scope
    }
}

/// Per-run state
#[derive(Debug)]
pub struct Session {
    id: String,
    queue: MessageQueue,
    depth: usize,
}

impl Session {
    fn new(bus: Rc<dyn Bus>, capacity: usize) -> Self {
        Self {
            id: Ulid::new().to_string(),
            queue: MessageQueue::new(bus, capacity),
            depth: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queue a side effect
    pub fn publish(&mut self, message: Message) {
        self.queue.push(message);
    }

    pub fn queue(&mut self) -> &mut MessageQueue {
        &mut self.queue
    }

    /// Current block nesting depth
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// The interpreter: command registry plus host collaborators
pub struct Interpreter {
    registry: Registry,
    hooks: Rc<dyn Hooks>,
    bus: Rc<dyn Bus>,
    config: Config,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            registry: Registry::standard(),
            hooks: Rc::new(NoHooks),
            bus: Rc::new(NullBus),
            config: Config::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Rc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_bus(mut self, bus: Rc<dyn Bus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Add (or replace) a command
    pub fn register(&mut self, spec: super::builtins::CommandSpec) {
        self.registry.register(spec);
    }

    /// Run a program in a fresh global scope
    pub async fn execute(&self, source: &str) -> Result<()> {
        self.execute_in(source, &Memory::root()).await
    }

    /// Run a program with `scope` as its global scope
    pub async fn execute_in(&self, source: &str, scope: &Memory) -> Result<()> {
        let tokens = lexer::tokenize(source)?;
        let commands = parser::parse(&tokens)?;
        self.run_session(&commands, scope).await
    }

    /// Drive one session: hooks, statements, final flush
    pub async fn run_session(&self, commands: &Commands, scope: &Memory) -> Result<()> {
        let mut session = Session::new(Rc::clone(&self.bus), self.config.queue_capacity);
        let span = tracing::debug_span!("session", id = %session.id);

        async move {
            tracing::debug!("Running {} top-level statement(s)", commands.len());
            let outcome = match self.hooks.before_start_session(&session.id).await {
                Ok(()) => self
                    .run_block(&mut session, commands, scope, false)
                    .await
                    .map(|_| ()),
                Err(err) => Err(err),
            };
            session.queue.flush();

            if let Err(err) = &outcome {
                tracing::warn!(error = %err, "session failed");
                self.hooks.after_error(&session.id, err).await;
            }
            let finished = self.hooks.after_finish_session(&session.id).await;
            tracing::debug!("Session finished");
            outcome.and(finished)
        }
        .instrument(span)
        .await
    }

    /// Run `commands` in `scope`.
    ///
    /// A procedure body turns `Return` into `Next`; any other block passes
    /// it on to its caller.
    pub fn run_block<'a>(
        &'a self,
        session: &'a mut Session,
        commands: &'a Commands,
        scope: &'a Memory,
        procedure: bool,
    ) -> BoxFuture<'a, Result<ControlFlow>> {
        Box::pin(async move {
            if session.depth >= self.config.max_call_depth {
                return Err(TurtleError::RecursionLimit {
                    limit: self.config.max_call_depth,
                });
            }
            session.depth += 1;
            let result = self.run_statements(session, commands, scope).await;
            session.depth -= 1;

            match result? {
                ControlFlow::Return(value) if procedure => Ok(ControlFlow::Next(value)),
                flow => Ok(flow),
            }
        })
    }

    /// Instantiate `code` and run it, optionally binding read-only values
    pub async fn run_code(
        &self,
        session: &mut Session,
        code: &ExecutableFactory,
        bindings: Option<BoundParameters>,
        procedure: bool,
    ) -> Result<ControlFlow> {
        let executable = match bindings {
            Some(bindings) => code.instantiate_with(Rc::new(bindings))?,
            None => code.instantiate()?,
        };
        self.run_block(session, executable.commands(), executable.scope(), procedure)
            .await
    }

    async fn run_statements(
        &self,
        session: &mut Session,
        commands: &Commands,
        scope: &Memory,
    ) -> Result<ControlFlow> {
        let mut last = None;
        for command in commands {
            let flow = self
                .run_command(session, command, scope)
                .await
                .map_err(|err| err.at_line(command.line))?;
            match flow {
                ControlFlow::Return(value) => return Ok(ControlFlow::Return(value)),
                ControlFlow::Next(value) => last = value,
            }
        }
        Ok(ControlFlow::Next(last))
    }

    async fn run_command(
        &self,
        session: &mut Session,
        command: &Command,
        scope: &Memory,
    ) -> Result<ControlFlow> {
        tracing::trace!(label = %command.label, line = command.line, "statement");
        self.hooks
            .before_run_new_command(&session.id, command, &mut session.queue)
            .await?;

        let flow = if let Some(spec) = self.registry.get(&command.label) {
            let args = validate(&command.label, &command.arguments, &spec.args, scope)?;
            match spec.handler {
                Handler::Simple(handler) => handler(self, session, scope, args)?,
                Handler::Control(handler) => handler(self, session, scope, args).await?,
            }
        } else if let Some(procedure) = self.procedure(&command.label, scope) {
            self.call_procedure(session, command, &procedure, scope)
                .await?
        } else {
            self.evaluate_statement(command, scope)?
        };

        if let Some(target) = &command.return_variable {
            let value = flow
                .value()
                .cloned()
                .ok_or_else(|| TurtleError::MissingValue {
                    command: command.label.clone(),
                })?;
            if command.creates_new_return_var {
                scope.create(target, value)?;
            } else {
                scope.set(target, value)?;
            }
        }
        Ok(flow)
    }

    /// The code value bound to `label`, if it names one
    fn procedure(&self, label: &str, scope: &Memory) -> Option<ExecutableFactory> {
        if !is_identifier(label) {
            return None;
        }
        match scope.get(label) {
            Ok(ParamType::Code(code)) => Some(code),
            _ => None,
        }
    }

    async fn call_procedure(
        &self,
        session: &mut Session,
        command: &Command,
        procedure: &ExecutableFactory,
        scope: &Memory,
    ) -> Result<ControlFlow> {
        let spec = ArgSpec::exact(Categories::VALUE, procedure.arity());
        let args = validate(&command.label, &command.arguments, &spec, scope)?;
        let bindings = procedure
            .params()
            .iter()
            .zip(args)
            .fold(BoundParameters::new(), |bindings, (name, arg)| {
                bindings.bind(name.clone(), arg.into_param())
            });

        tracing::debug!("Calling procedure `{}` (depth {})", command.label, session.depth);
        self.run_code(session, procedure, Some(bindings), true).await
    }

    /// Treat the whole statement as an expression
    fn evaluate_statement(&self, command: &Command, scope: &Memory) -> Result<ControlFlow> {
        let unknown = || TurtleError::UnknownCommand {
            label: command.label.clone(),
        };
        if is_identifier(&command.label)
            && !command.arguments.is_empty()
            && !scope.exists(&command.label)
        {
            return Err(unknown());
        }

        let mut text = command.label.clone();
        for arg in &command.arguments {
            let Argument::Text(part) = arg else {
                return Err(unknown());
            };
            text.push(' ');
            text.push_str(part);
        }
        Ok(ControlFlow::Next(Some(expr::evaluate(&text, scope)?)))
    }
}
