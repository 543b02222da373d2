//! The binder: dynamic operations on native objects.

use std::{cell::Cell, fmt, sync::Arc};

use log::debug;

use crate::{
    binding::{
        resolver::{default_chain, Binding, FallbackResolver, Operation, ResolveScope, Resolver},
        BinderConfig, DispCallable, DynamicFallback, MemberDiscovery, TypeCache, TypeDesc,
    },
    dispatch::{invoke, Invocation},
    events::{BoundEvent, EventSinkTable, HandlerToken},
    native::ComPtr,
    types::{Argument, Value},
    Error, Result,
};

thread_local! {
    static BINDING_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nested binding on the current thread.
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<Self> {
        BINDING_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return Err(Error::RecursionLimit(limit));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        BINDING_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Performs dynamic operations on native automation objects.
///
/// Members are found by name: from type metadata when the object offers it, by asking the
/// object otherwise. What was found is cached per native type in a [`TypeCache`], which may
/// be shared between binders, as may the [`EventSinkTable`] holding event subscriptions.
///
/// # Examples
///
/// ```rust,no_run
/// use dispbind::prelude::*;
///
/// # fn sheet() -> ComPtr { unimplemented!() }
/// let binder = ComBinder::new();
/// let sheet = sheet();
///
/// let count = binder.get_member(&sheet, "Count")?;
/// binder.set_member(&sheet, "Name", "Totals")?;
/// let cell = binder.get_index(&sheet, &mut [Argument::new(1), Argument::new(2)])?;
/// # Ok::<(), dispbind::Error>(())
/// ```
pub struct ComBinder {
    config: BinderConfig,
    discovery: MemberDiscovery,
    events: Arc<EventSinkTable>,
    resolvers: Vec<Box<dyn Resolver>>,
}

impl ComBinder {
    /// Creates a binder with the default configuration and private caches.
    #[must_use]
    pub fn new() -> Self {
        ComBinder::with_config(BinderConfig::default())
    }

    /// Creates a binder with private caches.
    #[must_use]
    pub fn with_config(config: BinderConfig) -> Self {
        ComBinder::with_services(
            config,
            Arc::new(TypeCache::new()),
            Arc::new(EventSinkTable::new()),
        )
    }

    /// Creates a binder using the given caches.
    #[must_use]
    pub fn with_services(
        config: BinderConfig,
        types: Arc<TypeCache>,
        events: Arc<EventSinkTable>,
    ) -> Self {
        ComBinder {
            config,
            discovery: MemberDiscovery::new(types, config),
            events,
            resolvers: default_chain(),
        }
    }

    /// Appends an external fallback as the last resolver.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl DynamicFallback + 'static) -> Self {
        self.resolvers.push(Box::new(FallbackResolver::new(fallback)));
        self
    }

    /// Appends a custom resolver to the chain.
    #[must_use]
    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &BinderConfig {
        &self.config
    }

    /// The type cache.
    #[must_use]
    pub fn type_cache(&self) -> &Arc<TypeCache> {
        self.discovery.types()
    }

    /// The event subscriptions.
    #[must_use]
    pub fn event_sinks(&self) -> &Arc<EventSinkTable> {
        &self.events
    }

    /// The member discovery service.
    #[must_use]
    pub fn discovery(&self) -> &MemberDiscovery {
        &self.discovery
    }

    /// The descriptor of `object`'s type.
    ///
    /// # Errors
    ///
    /// See [`MemberDiscovery::type_desc`].
    pub fn type_desc(&self, object: &ComPtr) -> Result<Arc<TypeDesc>> {
        self.discovery.type_desc(object)
    }

    /// Names of the members known for `object`.
    ///
    /// Objects without type metadata only report the members resolved so far.
    ///
    /// # Errors
    ///
    /// See [`MemberDiscovery::type_desc`].
    pub fn member_names(&self, object: &ComPtr) -> Result<Vec<String>> {
        let desc = self.discovery.type_desc(object)?;
        if desc.is_structured() && !desc.events_discovered() {
            // Forces event discovery; the name looked up is irrelevant
            self.discovery.event(object, &desc, "")?;
        }
        Ok(desc.member_names())
    }

    /// Reads a member: a property value, a callable, or a bound event.
    ///
    /// # Errors
    ///
    /// * [`Error::MemberNotFound`] - No resolver knew the name
    /// * Any invocation error
    pub fn get_member(&self, object: &ComPtr, name: &str) -> Result<Value> {
        self.bind(object, Operation::GetMember(name), &mut [])
    }

    /// Writes a member.
    ///
    /// # Errors
    ///
    /// * [`Error::MemberNotFound`] - No resolver knew the name
    /// * Any invocation error
    pub fn set_member(&self, object: &ComPtr, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut args = [Argument::new(value)];
        self.bind(object, Operation::SetMember(name), &mut args)
            .map(|_| ())
    }

    /// Calls the object itself through its default member.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub fn invoke(&self, object: &ComPtr, args: &mut [Argument]) -> Result<Value> {
        self.bind(object, Operation::Invoke, args)
    }

    /// Calls a member.
    ///
    /// # Errors
    ///
    /// * [`Error::MemberNotFound`] - No resolver knew the name
    /// * Any invocation error
    pub fn invoke_member(&self, object: &ComPtr, name: &str, args: &mut [Argument]) -> Result<Value> {
        self.bind(object, Operation::InvokeMember(name), args)
    }

    /// Reads the default member with `args` as index.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub fn get_index(&self, object: &ComPtr, args: &mut [Argument]) -> Result<Value> {
        self.bind(object, Operation::GetIndex, args)
    }

    /// Writes the default member with `args` as index.
    ///
    /// By-reference index arguments are written back into `args`.
    ///
    /// # Errors
    ///
    /// Any invocation error.
    pub fn set_index(
        &self,
        object: &ComPtr,
        args: &mut [Argument],
        value: impl Into<Value>,
    ) -> Result<()> {
        let mut all: Vec<Argument> = args.iter_mut().map(std::mem::take).collect();
        all.push(Argument::new(value));
        let outcome = self.bind(object, Operation::SetIndex, &mut all);

        for (slot, arg) in args.iter_mut().zip(all) {
            *slot = arg;
        }
        outcome.map(|_| ())
    }

    /// Calls a value: a native object through its default member, or a callable.
    ///
    /// # Errors
    ///
    /// * [`Error::NotCallable`] - The value is neither
    /// * Any invocation error
    pub fn call(&self, target: &Value, args: &mut [Argument]) -> Result<Value> {
        match target {
            Value::Callable(callable) => callable.call(args),
            other => match other.as_object() {
                Some(object) => self.invoke(object, args),
                None => Err(Error::NotCallable(other.managed_type().name())),
            },
        }
    }

    /// Subscribes `handler` to the event `name` of `object`.
    ///
    /// # Errors
    ///
    /// * [`Error::MemberNotFound`] - The object has no such event
    /// * [`Error::EventsNotSupported`] / [`Error::SourceInterfaceNotSupported`] - Connecting failed
    pub fn subscribe<F>(&self, object: &ComPtr, name: &str, handler: F) -> Result<HandlerToken>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.bound_event(object, name)?.add_handler(handler)
    }

    /// Removes a handler added with [`ComBinder::subscribe`].
    ///
    /// Returns `false` if the handler was not subscribed.
    ///
    /// # Errors
    ///
    /// * [`Error::MemberNotFound`] - The object has no such event
    pub fn unsubscribe(&self, object: &ComPtr, name: &str, token: HandlerToken) -> Result<bool> {
        Ok(self.bound_event(object, name)?.remove_handler(token))
    }

    fn bound_event(&self, object: &ComPtr, name: &str) -> Result<BoundEvent> {
        let desc = self.discovery.type_desc(object)?;
        let event = self
            .discovery
            .event(object, &desc, name)?
            .ok_or_else(|| Error::MemberNotFound(name.to_string()))?;
        Ok(BoundEvent::new(object.clone(), &event, self.events.clone()))
    }

    /// Resolves and performs one operation.
    fn bind(&self, object: &ComPtr, operation: Operation<'_>, args: &mut [Argument]) -> Result<Value> {
        let _depth = DepthGuard::enter(self.config.max_binding_depth)?;
        let type_desc = self.discovery.type_desc(object)?;

        let binding = {
            let mut scope = ResolveScope {
                binder: self,
                object,
                type_desc: &type_desc,
                operation,
                args: &mut *args,
            };
            self.resolve(&mut scope)?
        };

        let Some(binding) = binding else {
            return Err(Error::MemberNotFound(
                operation.name().unwrap_or("[default]").to_string(),
            ));
        };

        match binding {
            Binding::Invoke(method) => {
                let call = Invocation::new(&method.name, method.dispid, method.call_flags())
                    .with_lcid(self.config.lcid);
                let value = invoke(object, &call, args)?;
                Ok(if operation.assigns() { Value::Empty } else { value })
            }
            Binding::Callable(method) => Ok(Value::Callable(DispCallable::new(
                object.clone(),
                method,
                type_desc,
                self.config.lcid,
            ))),
            Binding::Event(event) => Ok(Value::Event(BoundEvent::new(
                object.clone(),
                &event,
                self.events.clone(),
            ))),
            Binding::Discard => Ok(Value::Empty),
            Binding::Value(value) => Ok(value),
        }
    }

    fn resolve(&self, scope: &mut ResolveScope<'_>) -> Result<Option<Binding>> {
        for resolver in &self.resolvers {
            if let Some(binding) = resolver.resolve(scope)? {
                debug!(
                    "{} on {} resolved by {}: {:?}",
                    scope.operation,
                    scope.object.id(),
                    resolver.name(),
                    binding
                );
                return Ok(Some(binding));
            }
        }
        Ok(None)
    }
}

impl Default for ComBinder {
    fn default() -> Self {
        ComBinder::new()
    }
}

impl fmt::Debug for ComBinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolvers: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ComBinder")
            .field("config", &self.config)
            .field("discovery", &self.discovery)
            .field("resolvers", &resolvers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        binding::EventDesc,
        native::{HResult, InvokeFlags, DISPID_VALUE},
        test::{MockObject, MockTypeInfo},
    };
    use uguid::guid;

    fn counter_type() -> Arc<MockTypeInfo> {
        MockTypeInfo::builder("Counter", guid!("3b0e8e52-6c1f-4d7a-9f0e-1a2b3c4d5e01"))
            .property_get("Count", 7, 0)
            .function("Reset", 8, 0)
            .property_get("Item", DISPID_VALUE, 1)
            .build()
    }

    fn counter() -> ComPtr {
        MockObject::builder("Counter")
            .type_info(counter_type())
            .property("Count", 7, 3i32)
            .method("Reset", 8, |_| Ok(Value::Empty))
            .indexed("Item", DISPID_VALUE)
            .build()
    }

    #[test]
    fn get_member_invokes_data_member() {
        let binder = ComBinder::new();
        let object = counter();

        assert_eq!(binder.get_member(&object, "count").unwrap(), Value::I32(3));
        let last = MockObject::calls(&object).pop().unwrap();
        assert_eq!(last.dispid, 7);
        assert!(last.args.is_empty());
    }

    #[test]
    fn scripting_returns_callables() {
        let binder = ComBinder::with_config(BinderConfig::scripting());
        let object = counter();

        let reset = binder.get_member(&object, "Reset").unwrap();
        let Value::Callable(callable) = &reset else {
            panic!("expected a callable, got {reset:?}");
        };
        assert_eq!(callable.name(), "Reset");
        assert!(MockObject::calls(&object).is_empty());

        binder.call(&reset, &mut []).unwrap();
        assert_eq!(MockObject::calls(&object).pop().map(|c| c.dispid), Some(8));

        // Data members are still read directly
        assert_eq!(binder.get_member(&object, "Count").unwrap(), Value::I32(3));
    }

    #[test]
    fn missing_member() {
        let binder = ComBinder::new();
        let object = MockObject::builder("Bare").build();

        let cases: Vec<Result<Value>> = vec![
            binder.get_member(&object, "Nope"),
            binder.invoke_member(&object, "Nope", &mut []),
            binder.set_member(&object, "Nope", 1i32).map(|()| Value::Empty),
        ];
        for outcome in cases {
            assert!(matches!(outcome, Err(Error::MemberNotFound(ref name)) if name == "Nope"));
        }
    }

    #[test]
    fn index_through_default_member() {
        let binder = ComBinder::new();
        let object = counter();

        let mut index = [Argument::new(1i32)];
        binder.set_index(&object, &mut index, "first").unwrap();
        assert_eq!(index[0].value, Value::I32(1));
        assert_eq!(
            MockObject::calls(&object).pop().map(|c| (c.dispid, c.flags)),
            Some((DISPID_VALUE, InvokeFlags::PROPERTYPUT))
        );

        let value = binder.get_index(&object, &mut [Argument::new(1i32)]).unwrap();
        assert_eq!(value, Value::from("first"));
        assert_eq!(binder.invoke(&object, &mut [Argument::new(1i32)]).unwrap(), Value::from("first"));
    }

    #[test]
    fn fallback_handles_unknown_members() {
        struct Echo;

        impl DynamicFallback for Echo {
            fn fallback(
                &self,
                _binder: &ComBinder,
                _object: &ComPtr,
                operation: Operation<'_>,
                _args: &mut [Argument],
            ) -> Option<Result<Value>> {
                operation.name().map(|name| Ok(Value::from(name)))
            }
        }

        let binder = ComBinder::new().with_fallback(Echo);
        let object = MockObject::builder("Bare").build();
        assert_eq!(binder.get_member(&object, "Anything").unwrap(), Value::from("Anything"));
    }

    #[test]
    fn recursive_fallback_is_bounded() {
        struct Again;

        impl DynamicFallback for Again {
            fn fallback(
                &self,
                binder: &ComBinder,
                object: &ComPtr,
                operation: Operation<'_>,
                _args: &mut [Argument],
            ) -> Option<Result<Value>> {
                Some(binder.get_member(object, operation.name().unwrap_or("x")))
            }
        }

        let binder = ComBinder::with_config(BinderConfig {
            max_binding_depth: 4,
            ..BinderConfig::default()
        })
        .with_fallback(Again);
        let object = MockObject::builder("Bare").build();

        assert!(matches!(
            binder.get_member(&object, "Loop").unwrap_err(),
            Error::RecursionLimit(4)
        ));
        // The guard unwinds completely
        assert!(binder.get_member(&object, "Loop").is_err());
        assert_eq!(BINDING_DEPTH.with(Cell::get), 0);
    }

    #[test]
    fn errors_from_object() {
        let binder = ComBinder::new();
        let object = MockObject::builder("Failing")
            .method("Explode", 3, |_| Err(HResult::E_FAIL))
            .build();

        let error = binder.invoke_member(&object, "Explode", &mut []).unwrap_err();
        assert_eq!(error.hresult(), Some(HResult::E_FAIL));
    }

    #[test]
    fn event_reassignment_skips_name_lookup() {
        let binder = ComBinder::new();
        let object = MockObject::builder("Button")
            .ids_of_names_error(HResult::E_FAIL)
            .build();
        let event = BoundEvent::new(
            object.clone(),
            &EventDesc {
                name: "Click".to_string(),
                dispid: 1,
                source_iid: guid!("3b0e8e52-6c1f-4d7a-9f0e-1a2b3c4d5e02"),
            },
            binder.event_sinks().clone(),
        );

        binder.set_member(&object, "click", Value::Event(event.clone())).unwrap();
        assert!(MockObject::calls(&object).is_empty());

        // Another object's event is an ordinary assignment
        let other = MockObject::builder("Other").build();
        assert!(binder.set_member(&other, "Click", Value::Event(event)).is_err());
    }

    #[test]
    fn not_callable() {
        let binder = ComBinder::new();
        assert!(matches!(
            binder.call(&Value::I32(1), &mut []).unwrap_err(),
            Error::NotCallable(_)
        ));
    }
}
