//! Selection strategies: which commands become tools, which flags they
//! expose, and what runs around each call.
//!
//! Selectors are evaluated in order and the first one whose command
//! predicate accepts a command owns the resulting tool. An absent predicate
//! is the explicit [`Predicate::AcceptAll`] sentinel, never a missing value.
//!
//! # Examples
//!
//! ```
//! use command_tools_core::{CommandNode, FlagDescriptor, FlagType, Selector};
//!
//! let selector = Selector::new()
//!     .matching(|node: &CommandNode| node.command_path().starts_with("app math"))
//!     .with_local_flags(|flag: &FlagDescriptor| flag.name != "precision");
//!
//! let sum = CommandNode::new("app").with_child(CommandNode::new("math").with_child(CommandNode::new("sum")));
//! assert!(selector.accepts_command(&sum.children[0].children[0]));
//! assert!(!selector.accepts_local_flag(&FlagDescriptor::new("precision", FlagType::Int)));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::{
    CallRequest, CallResult, CommandNode, FlagDescriptor, InvocationContext, InvocationError,
    ToolInput,
};

/// Hook run before argument reconstruction. May replace the context (for a
/// deadline or cancellation) and rewrite the request and payload.
pub type PreInvokeHook = Arc<
    dyn Fn(InvocationContext, &mut CallRequest, &mut ToolInput) -> InvocationContext + Send + Sync,
>;

/// Hook run on the outcome of a call. May observe or replace it.
pub type PostInvokeHook = Arc<
    dyn Fn(
            &InvocationContext,
            &CallRequest,
            Result<CallResult, InvocationError>,
        ) -> Result<CallResult, InvocationError>
        + Send
        + Sync,
>;

/// A yes/no test over commands or flags.
pub enum Predicate<T: ?Sized> {
    AcceptAll,
    Custom(Arc<dyn Fn(&T) -> bool + Send + Sync>),
}

impl<T: ?Sized> Predicate<T> {
    pub fn custom(test: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(test))
    }

    pub fn accepts(&self, item: &T) -> bool {
        match self {
            Self::AcceptAll => true,
            Self::Custom(test) => test(item),
        }
    }
}

impl<T: ?Sized> Clone for Predicate<T> {
    fn clone(&self) -> Self {
        match self {
            Self::AcceptAll => Self::AcceptAll,
            Self::Custom(test) => Self::Custom(Arc::clone(test)),
        }
    }
}

impl<T: ?Sized> Default for Predicate<T> {
    fn default() -> Self {
        Self::AcceptAll
    }
}

impl<T: ?Sized> fmt::Debug for Predicate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcceptAll => f.write_str("AcceptAll"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// One selection strategy.
#[derive(Clone, Default)]
pub struct Selector {
    command: Predicate<CommandNode>,
    local_flags: Predicate<FlagDescriptor>,
    inherited_flags: Predicate<FlagDescriptor>,
    pre_invoke: Option<PreInvokeHook>,
    post_invoke: Option<PostInvokeHook>,
}

impl Selector {
    /// A selector accepting every command and every flag, with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, test: impl Fn(&CommandNode) -> bool + Send + Sync + 'static) -> Self {
        self.command = Predicate::custom(test);
        self
    }

    pub fn with_local_flags(
        mut self,
        test: impl Fn(&FlagDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.local_flags = Predicate::custom(test);
        self
    }

    pub fn with_inherited_flags(
        mut self,
        test: impl Fn(&FlagDescriptor) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.inherited_flags = Predicate::custom(test);
        self
    }

    pub fn with_pre_invoke(
        mut self,
        hook: impl Fn(InvocationContext, &mut CallRequest, &mut ToolInput) -> InvocationContext
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.pre_invoke = Some(Arc::new(hook));
        self
    }

    pub fn with_post_invoke(
        mut self,
        hook: impl Fn(
            &InvocationContext,
            &CallRequest,
            Result<CallResult, InvocationError>,
        ) -> Result<CallResult, InvocationError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.post_invoke = Some(Arc::new(hook));
        self
    }

    pub fn accepts_command(&self, node: &CommandNode) -> bool {
        self.command.accepts(node)
    }

    pub fn accepts_local_flag(&self, flag: &FlagDescriptor) -> bool {
        self.local_flags.accepts(flag)
    }

    pub fn accepts_inherited_flag(&self, flag: &FlagDescriptor) -> bool {
        self.inherited_flags.accepts(flag)
    }

    /// Runs the pre-invoke hook, or passes the context through unchanged.
    pub fn pre_invoke(
        &self,
        ctx: InvocationContext,
        request: &mut CallRequest,
        input: &mut ToolInput,
    ) -> InvocationContext {
        match &self.pre_invoke {
            Some(hook) => hook(ctx, request, input),
            None => ctx,
        }
    }

    /// Runs the post-invoke hook, or passes the outcome through unchanged.
    pub fn post_invoke(
        &self,
        ctx: &InvocationContext,
        request: &CallRequest,
        outcome: Result<CallResult, InvocationError>,
    ) -> Result<CallResult, InvocationError> {
        match &self.post_invoke {
            Some(hook) => hook(ctx, request, outcome),
            None => outcome,
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("command", &self.command)
            .field("local_flags", &self.local_flags)
            .field("inherited_flags", &self.inherited_flags)
            .field("pre_invoke", &self.pre_invoke.is_some())
            .field("post_invoke", &self.post_invoke.is_some())
            .finish()
    }
}

/// Accepts flags whose name is in `names`.
pub fn flag_names_in(names: Vec<String>) -> impl Fn(&FlagDescriptor) -> bool + Send + Sync + 'static {
    move |flag: &FlagDescriptor| names.iter().any(|name| *name == flag.name)
}

/// Accepts flags whose name is not in `names`.
pub fn flag_names_not_in(
    names: Vec<String>,
) -> impl Fn(&FlagDescriptor) -> bool + Send + Sync + 'static {
    move |flag: &FlagDescriptor| !names.iter().any(|name| *name == flag.name)
}
