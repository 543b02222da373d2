//! Binding resolution.
//!
//! A [`ComBinder`] resolves every dynamic operation by asking an ordered list of
//! [`Resolver`]s; the first one returning a [`Binding`] wins. The default chain is:
//!
//! 1. [`EventAssignResolver`] - assigning a bound event back to its own name is a no-op
//! 2. [`StructuredResolver`] - members already known for the type
//! 3. [`LateBoundResolver`] - name lookups against the object
//! 4. [`DefaultMemberResolver`] - calls and index operations use the default member
//! 5. [`FallbackResolver`] - an external [`DynamicFallback`], when configured

use std::{fmt, sync::Arc};

use crate::{
    binding::{ComBinder, EventDesc, MethodDesc, TypeDesc},
    native::ComPtr,
    types::{Argument, Value},
    Result,
};

/// A dynamic operation on a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// Read a member: `object.Name`
    GetMember(&'a str),
    /// Write a member: `object.Name = value`; the value is the last argument
    SetMember(&'a str),
    /// Call the object itself: `object(args)`
    Invoke,
    /// Call a member: `object.Name(args)`
    InvokeMember(&'a str),
    /// Read an index: `object[args]`
    GetIndex,
    /// Write an index: `object[args] = value`; the value is the last argument
    SetIndex,
}

impl Operation<'_> {
    /// The member name, for named operations.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Operation::GetMember(name)
            | Operation::SetMember(name)
            | Operation::InvokeMember(name) => Some(name),
            Operation::Invoke | Operation::GetIndex | Operation::SetIndex => None,
        }
    }

    /// Returns `true` for operations whose last argument is an assigned value.
    #[must_use]
    pub fn assigns(&self) -> bool {
        matches!(self, Operation::SetMember(_) | Operation::SetIndex)
    }
}

impl fmt::Display for Operation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::GetMember(name) => write!(f, "get {name}"),
            Operation::SetMember(name) => write!(f, "set {name}"),
            Operation::Invoke => f.write_str("invoke"),
            Operation::InvokeMember(name) => write!(f, "call {name}"),
            Operation::GetIndex => f.write_str("get index"),
            Operation::SetIndex => f.write_str("set index"),
        }
    }
}

/// The outcome of a successful resolution.
#[derive(Debug)]
pub enum Binding {
    /// Invoke the member with the operation's arguments
    Invoke(Arc<MethodDesc>),
    /// Return the member as a callable without invoking it
    Callable(Arc<MethodDesc>),
    /// Return the event as a bound event
    Event(Arc<EventDesc>),
    /// Do nothing and return [`Value::Empty`]
    Discard,
    /// The operation was already performed and produced this value
    Value(Value),
}

/// Everything a resolver may look at.
pub struct ResolveScope<'a> {
    /// The binder performing the operation
    pub binder: &'a ComBinder,
    /// The target object
    pub object: &'a ComPtr,
    /// The descriptor of the object's type
    pub type_desc: &'a Arc<TypeDesc>,
    /// The operation
    pub operation: Operation<'a>,
    /// The operation's arguments; an assigned value comes last
    pub args: &'a mut [Argument],
}

impl ResolveScope<'_> {
    /// The assigned value of a write operation.
    #[must_use]
    pub fn assigned(&self) -> Option<&Value> {
        if self.operation.assigns() {
            self.args.last().map(|arg| &arg.value)
        } else {
            None
        }
    }
}

/// One strategy of the resolution chain.
pub trait Resolver: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Resolves the operation, or returns `None` to let the next resolver try.
    ///
    /// # Errors
    ///
    /// Errors abort the whole resolution; later resolvers are not asked.
    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>>;
}

/// Handles operations the native object cannot resolve.
///
/// The fallback receives the binder itself and may bind again; nested binding is bounded by
/// [`crate::BinderConfig::max_binding_depth`].
pub trait DynamicFallback: Send + Sync {
    /// Performs the operation, or returns `None` to decline it.
    fn fallback(
        &self,
        binder: &ComBinder,
        object: &ComPtr,
        operation: Operation<'_>,
        args: &mut [Argument],
    ) -> Option<Result<Value>>;
}

/// Returns `true` if assigning `value` should use a by-value property write.
///
/// Value types, arrays, strings, nulls, the database-null and missing markers and currency
/// are written by value; every other reference, live objects in particular, is written by
/// reference.
#[must_use]
pub fn prefer_put(value: &Value) -> bool {
    if value.holds_null() {
        return true;
    }
    match value {
        Value::Array(_)
        | Value::String(_)
        | Value::BStr(_)
        | Value::DbNull
        | Value::Missing
        | Value::Currency(_) => true,
        other => other.managed_type().is_value_type(),
    }
}

/// Chooses between the two write forms of a property for `value`, falling back to whichever
/// one exists.
#[must_use]
pub fn select_put(
    put: Option<Arc<MethodDesc>>,
    put_ref: Option<Arc<MethodDesc>>,
    value: &Value,
) -> Option<Arc<MethodDesc>> {
    if prefer_put(value) {
        put.or(put_ref)
    } else {
        put_ref.or(put)
    }
}

fn get_binding(scope: &ResolveScope<'_>, method: Arc<MethodDesc>) -> Binding {
    if method.is_data_member() || !scope.binder.config().return_callables {
        Binding::Invoke(method)
    } else {
        Binding::Callable(method)
    }
}

/// Resolves members already known for the object's type.
#[derive(Debug, Default)]
pub struct StructuredResolver;

impl Resolver for StructuredResolver {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        let desc = scope.type_desc;
        match scope.operation {
            Operation::GetMember(name) => {
                if let Some(method) = desc.func(name) {
                    return Ok(Some(get_binding(scope, method)));
                }
                if !desc.is_structured() {
                    return Ok(None);
                }
                let event = scope
                    .binder
                    .discovery()
                    .event(scope.object, desc, name)?;
                Ok(event.map(Binding::Event))
            }
            Operation::InvokeMember(name) => Ok(desc.func(name).map(Binding::Invoke)),
            Operation::SetMember(name) => {
                let Some(value) = scope.assigned() else {
                    return Ok(None);
                };
                Ok(select_put(desc.put(name), desc.put_ref(name), value).map(Binding::Invoke))
            }
            Operation::Invoke | Operation::GetIndex | Operation::SetIndex => Ok(None),
        }
    }
}

/// Resolves members by asking the object for the id of a name.
#[derive(Debug, Default)]
pub struct LateBoundResolver;

impl Resolver for LateBoundResolver {
    fn name(&self) -> &'static str {
        "late-bound"
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        let discovery = scope.binder.discovery();
        match scope.operation {
            Operation::GetMember(name) => Ok(discovery
                .late_bound_func(scope.object, scope.type_desc, name)?
                .map(|method| get_binding(scope, method))),
            Operation::InvokeMember(name) => Ok(discovery
                .late_bound_func(scope.object, scope.type_desc, name)?
                .map(Binding::Invoke)),
            Operation::SetMember(name) => {
                let Some(value) = scope.assigned() else {
                    return Ok(None);
                };
                let Some((put, put_ref)) =
                    discovery.late_bound_puts(scope.object, scope.type_desc, name)?
                else {
                    return Ok(None);
                };
                Ok(select_put(Some(put), Some(put_ref), value).map(Binding::Invoke))
            }
            Operation::Invoke | Operation::GetIndex | Operation::SetIndex => Ok(None),
        }
    }
}

/// Treats assigning a bound event to the member it came from as a no-op.
///
/// Subscribing through `object.Event += handler` reads the event, adds the handler and then
/// assigns the event back; the assignment must not reach the object, not even as a name
/// lookup.
#[derive(Debug, Default)]
pub struct EventAssignResolver;

impl Resolver for EventAssignResolver {
    fn name(&self) -> &'static str {
        "event-assign"
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        let Operation::SetMember(name) = scope.operation else {
            return Ok(None);
        };
        match scope.assigned() {
            Some(Value::Event(event))
                if event.name().eq_ignore_ascii_case(name)
                    && Arc::ptr_eq(event.object(), scope.object) =>
            {
                Ok(Some(Binding::Discard))
            }
            _ => Ok(None),
        }
    }
}

/// Resolves calls and index operations to the object's default member.
#[derive(Debug, Default)]
pub struct DefaultMemberResolver;

impl Resolver for DefaultMemberResolver {
    fn name(&self) -> &'static str {
        "default-member"
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        Ok(match scope.operation {
            Operation::Invoke | Operation::GetIndex => {
                Some(Binding::Invoke(scope.type_desc.get_item()))
            }
            Operation::SetIndex => Some(Binding::Invoke(scope.type_desc.set_item())),
            Operation::GetMember(_) | Operation::SetMember(_) | Operation::InvokeMember(_) => {
                None
            }
        })
    }
}

/// Defers to an external [`DynamicFallback`].
pub struct FallbackResolver {
    fallback: Box<dyn DynamicFallback>,
}

impl FallbackResolver {
    /// Wraps a fallback.
    pub fn new(fallback: impl DynamicFallback + 'static) -> Self {
        FallbackResolver {
            fallback: Box::new(fallback),
        }
    }
}

impl Resolver for FallbackResolver {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        match self
            .fallback
            .fallback(scope.binder, scope.object, scope.operation, scope.args)
        {
            Some(Ok(value)) => Ok(Some(Binding::Value(value))),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }
}

/// The default resolution chain, without a fallback.
#[must_use]
pub fn default_chain() -> Vec<Box<dyn Resolver>> {
    vec![
        Box::new(EventAssignResolver),
        Box::new(StructuredResolver),
        Box::new(LateBoundResolver),
        Box::new(DefaultMemberResolver),
    ]
}
