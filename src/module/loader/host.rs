//! In-process module registrations
//!
//! Hosts register every loadable module as a `ModuleHandle`: its types, the
//! methods of those types as function trampolines, and constructors. The
//! engine resolves catalog records against these handles at call time.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::module::metadata::{qualify, ParameterRecord};
use crate::module::registry::manifest::{
    ArtifactManifest, ConstructorManifest, MemberManifest, ParamManifest, TypeKind, TypeManifest,
    ARTIFACT_EXTENSION,
};
use crate::module::value::{Instance, PendingValue, Value};
use crate::utils::recover_lock;

/// File extensions stripped when normalizing module names
const KNOWN_ARTIFACT_EXTENSIONS: &[&str] = &[ARTIFACT_EXTENSION, ".dll", ".so", ".dylib"];

/// Synchronous method trampoline
pub type SyncFn = Arc<dyn Fn(Option<&Instance>, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Asynchronous method trampoline
pub type AsyncFn =
    Arc<dyn Fn(Option<Instance>, Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Constructor trampoline
pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> anyhow::Result<Instance> + Send + Sync>;

/// Executable body of a method
#[derive(Clone)]
pub enum Callable {
    Sync(SyncFn),
    Async(AsyncFn),
}

/// One invocable method of a registered type
#[derive(Clone)]
pub struct MethodHandle {
    pub name: String,
    pub is_static: bool,
    pub parameters: Vec<ParameterRecord>,
    pub return_type: String,
    callable: Callable,
}

impl MethodHandle {
    pub fn new(
        name: impl Into<String>,
        is_static: bool,
        parameters: Vec<ParameterRecord>,
        return_type: impl Into<String>,
        callable: Callable,
    ) -> Self {
        Self {
            name: name.into(),
            is_static,
            parameters,
            return_type: return_type.into(),
            callable,
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }

    pub fn parameter_types(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.type_name.as_str()).collect()
    }

    /// Whether this is the method `name` with exactly `parameter_types`
    pub fn matches(&self, name: &str, is_static: bool, parameter_types: &[&str]) -> bool {
        self.name == name
            && self.is_static == is_static
            && self.parameters.len() == parameter_types.len()
            && self
                .parameters
                .iter()
                .zip(parameter_types)
                .all(|(p, t)| same_type_name(&p.type_name, t))
    }

    pub fn signature(&self, owner: &str) -> String {
        let prefix = if self.is_static { "static " } else { "" };
        format!(
            "{}{}({}) -> {}",
            prefix,
            qualify(owner, &self.name),
            render_params(&self.parameters),
            self.return_type
        )
    }

    /// Run the trampoline
    ///
    /// Async methods start nothing here: the returned `Value::Pending` runs
    /// the body when awaited. Panics inside an async body surface as errors
    /// from the pending value.
    pub fn call(&self, owner: &str, instance: Option<&Instance>, args: &[Value]) -> anyhow::Result<Value> {
        match &self.callable {
            Callable::Sync(body) => body(instance, args),
            Callable::Async(body) => {
                let future = body(instance.cloned(), args.to_vec());
                let guarded = AssertUnwindSafe(future)
                    .catch_unwind()
                    .map(|outcome| outcome.unwrap_or_else(|payload| Err(panic_error(payload))))
                    .boxed();
                Ok(Value::Pending(PendingValue::new(self.signature(owner), guarded)))
            }
        }
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("name", &self.name)
            .field("is_static", &self.is_static)
            .field("parameters", &self.parameter_types())
            .field("return_type", &self.return_type)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// One constructor of a registered type
#[derive(Clone)]
pub struct ConstructorHandle {
    pub is_public: bool,
    pub parameters: Vec<ParameterRecord>,
    factory: ConstructorFn,
}

impl ConstructorHandle {
    /// Whether `args` fit this constructor's parameters
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.parameters.len() == args.len()
            && self
                .parameters
                .iter()
                .zip(args)
                .all(|(p, arg)| arg.is_assignable_to(&p.type_name))
    }

    pub fn construct(&self, args: &[Value]) -> anyhow::Result<Instance> {
        (self.factory)(args)
    }

    pub fn signature(&self, owner: &str) -> String {
        let visibility = if self.is_public { "" } else { "private " };
        format!("{}{}({})", visibility, owner, render_params(&self.parameters))
    }
}

impl fmt::Debug for ConstructorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorHandle")
            .field("is_public", &self.is_public)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A registered type
#[derive(Debug, Clone)]
pub struct TypeHandle {
    pub full_name: String,
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    pub is_static: bool,
    pub methods: Vec<MethodHandle>,
    pub constructors: Vec<ConstructorHandle>,
}

impl TypeHandle {
    pub fn builder(namespace: &str, name: &str) -> TypeHandleBuilder {
        TypeHandleBuilder {
            ty: TypeHandle {
                full_name: qualify(namespace, name),
                namespace: namespace.to_string(),
                name: name.to_string(),
                kind: TypeKind::Class,
                is_abstract: false,
                is_static: false,
                methods: Vec::new(),
                constructors: Vec::new(),
            },
        }
    }

    pub fn find_method(&self, name: &str, is_static: bool, parameter_types: &[&str]) -> Option<&MethodHandle> {
        self.methods
            .iter()
            .find(|m| m.matches(name, is_static, parameter_types))
    }

    pub fn method_signatures(&self) -> Vec<String> {
        self.methods
            .iter()
            .map(|m| m.signature(&self.full_name))
            .collect()
    }

    pub fn constructor_signatures(&self) -> Vec<String> {
        self.constructors
            .iter()
            .map(|c| c.signature(&self.full_name))
            .collect()
    }

    fn describe(&self) -> TypeManifest {
        TypeManifest {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            kind: self.kind,
            is_abstract: self.is_abstract,
            is_static: self.is_static,
            members: self
                .methods
                .iter()
                .map(|m| MemberManifest {
                    name: m.name.clone(),
                    returns: m.return_type.clone(),
                    is_static: m.is_static,
                    is_public: true,
                    params: describe_params(&m.parameters),
                })
                .collect(),
            constructors: self
                .constructors
                .iter()
                .map(|c| ConstructorManifest {
                    is_public: c.is_public,
                    params: describe_params(&c.parameters),
                })
                .collect(),
        }
    }
}

/// Builder for `TypeHandle`
pub struct TypeHandleBuilder {
    ty: TypeHandle,
}

impl TypeHandleBuilder {
    pub fn kind(mut self, kind: TypeKind) -> Self {
        self.ty.kind = kind;
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.ty.is_abstract = true;
        self
    }

    pub fn static_type(mut self) -> Self {
        self.ty.is_static = true;
        self
    }

    /// Add a static method; `params` are `(name, type)` pairs
    pub fn static_method<F>(self, name: &str, params: &[(&str, &str)], returns: &str, body: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let body: SyncFn = Arc::new(move |_: Option<&Instance>, args: &[Value]| body(args));
        self.push_method(name, true, params, returns, Callable::Sync(body))
    }

    /// Add an instance method
    pub fn method<F>(self, name: &str, params: &[(&str, &str)], returns: &str, body: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let body: SyncFn = Arc::new(move |instance: Option<&Instance>, args: &[Value]| match instance {
            Some(instance) => body(instance, args),
            None => Err(anyhow::anyhow!("instance method called without an instance")),
        });
        self.push_method(name, false, params, returns, Callable::Sync(body))
    }

    /// Add a static method returning an async result
    pub fn async_static_method<F>(self, name: &str, params: &[(&str, &str)], returns: &str, body: F) -> Self
    where
        F: Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        let body: AsyncFn = Arc::new(move |_: Option<Instance>, args: Vec<Value>| body(args));
        self.push_method(name, true, params, returns, Callable::Async(body))
    }

    /// Add an instance method returning an async result
    pub fn async_method<F>(self, name: &str, params: &[(&str, &str)], returns: &str, body: F) -> Self
    where
        F: Fn(Instance, Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync + 'static,
    {
        let body: AsyncFn = Arc::new(move |instance: Option<Instance>, args: Vec<Value>| match instance {
            Some(instance) => body(instance, args),
            None => async { Err(anyhow::anyhow!("instance method called without an instance")) }.boxed(),
        });
        self.push_method(name, false, params, returns, Callable::Async(body))
    }

    /// Add a public constructor producing a `T`
    pub fn constructor<T, F>(self, params: &[(&str, &str)], factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[Value]) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.push_constructor(true, params, factory)
    }

    /// Add a constructor that exists but is not callable from outside
    pub fn private_constructor<T, F>(self, params: &[(&str, &str)], factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[Value]) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.push_constructor(false, params, factory)
    }

    pub fn build(self) -> TypeHandle {
        self.ty
    }

    fn push_method(
        mut self,
        name: &str,
        is_static: bool,
        params: &[(&str, &str)],
        returns: &str,
        callable: Callable,
    ) -> Self {
        self.ty.methods.push(MethodHandle::new(
            name,
            is_static,
            to_parameters(params),
            returns,
            callable,
        ));
        self
    }

    fn push_constructor<T, F>(mut self, is_public: bool, params: &[(&str, &str)], factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&[Value]) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let type_name = self.ty.full_name.clone();
        let factory: ConstructorFn =
            Arc::new(move |args: &[Value]| factory(args).map(|value| Instance::new(type_name.clone(), value)));
        self.ty.constructors.push(ConstructorHandle {
            is_public,
            parameters: to_parameters(params),
            factory,
        });
        self
    }
}

/// A registered in-process module
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    pub name: String,
    /// Additional artifact names this module answers to
    pub artifacts: Vec<String>,
    pub types: Vec<TypeHandle>,
}

impl ModuleHandle {
    pub fn builder(name: &str) -> ModuleHandleBuilder {
        ModuleHandleBuilder {
            handle: ModuleHandle {
                name: name.to_string(),
                artifacts: Vec::new(),
                types: Vec::new(),
            },
        }
    }

    /// Type with `full_name`, compared case-insensitively
    pub fn find_type(&self, full_name: &str) -> Option<&TypeHandle> {
        self.types
            .iter()
            .find(|ty| ty.full_name.eq_ignore_ascii_case(full_name.trim()))
    }

    pub fn type_names(&self) -> Vec<String> {
        self.types.iter().map(|ty| ty.full_name.clone()).collect()
    }

    /// Artifact manifest describing every registration of this module
    pub fn describe(&self) -> ArtifactManifest {
        ArtifactManifest {
            name: Some(self.name.clone()),
            types: self.types.iter().map(TypeHandle::describe).collect(),
        }
    }

    /// Names this module can be resolved by
    fn aliases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.artifacts.iter().map(String::as_str))
    }
}

/// Builder for `ModuleHandle`
pub struct ModuleHandleBuilder {
    handle: ModuleHandle,
}

impl ModuleHandleBuilder {
    pub fn artifact(mut self, name: &str) -> Self {
        self.handle.artifacts.push(name.to_string());
        self
    }

    pub fn with_type(mut self, ty: TypeHandle) -> Self {
        self.handle.types.push(ty);
        self
    }

    pub fn build(self) -> ModuleHandle {
        self.handle
    }
}

/// Process-wide set of registered modules
#[derive(Debug, Default)]
pub struct HostModules {
    modules: RwLock<BTreeMap<String, Arc<ModuleHandle>>>,
}

impl HostModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under its name and artifact names
    ///
    /// A later registration under the same normalized name replaces the
    /// earlier one.
    pub fn register(&self, handle: ModuleHandle) -> Arc<ModuleHandle> {
        let handle = Arc::new(handle);
        let mut modules = recover_lock(self.modules.write());
        for alias in handle.aliases() {
            modules.insert(normalize_module_name(alias), Arc::clone(&handle));
        }
        info!(
            "Registered host module {} ({} types)",
            handle.name,
            handle.types.len()
        );
        handle
    }

    /// Module registered under `name` (normalized)
    pub fn find(&self, name: &str) -> Option<Arc<ModuleHandle>> {
        let key = normalize_module_name(name);
        recover_lock(self.modules.read()).get(&key).cloned()
    }

    /// Remove the module registered under `name` and all its aliases
    pub fn unregister(&self, name: &str) -> bool {
        let key = normalize_module_name(name);
        let mut modules = recover_lock(self.modules.write());
        let Some(handle) = modules.get(&key).cloned() else {
            return false;
        };
        modules.retain(|_, registered| !Arc::ptr_eq(registered, &handle));
        debug!("Unregistered host module {}", handle.name);
        true
    }

    /// Whether any registered module declares `full_name`
    pub fn contains_type(&self, full_name: &str) -> bool {
        recover_lock(self.modules.read())
            .values()
            .any(|handle| handle.find_type(full_name).is_some())
    }

    /// Distinct registered module names, sorted
    pub fn names(&self) -> Vec<String> {
        let modules = recover_lock(self.modules.read());
        let mut names: Vec<String> = modules.values().map(|h| h.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn is_empty(&self) -> bool {
        recover_lock(self.modules.read()).is_empty()
    }
}

/// Lowercase, trim and strip a known artifact extension
pub fn normalize_module_name(name: &str) -> String {
    let lowered = name.trim().to_ascii_lowercase();
    for extension in KNOWN_ARTIFACT_EXTENSIONS {
        if let Some(stem) = lowered.strip_suffix(extension) {
            if !stem.is_empty() {
                return stem.to_string();
            }
        }
    }
    lowered
}

/// Render a panic payload as an error
pub(crate) fn panic_error(payload: Box<dyn Any + Send>) -> anyhow::Error {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    };
    anyhow::anyhow!("panicked: {}", message)
}

fn same_type_name(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn to_parameters(params: &[(&str, &str)]) -> Vec<ParameterRecord> {
    params
        .iter()
        .map(|(name, type_name)| ParameterRecord::required(*name, *type_name))
        .collect()
}

fn render_params(params: &[ParameterRecord]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.type_name, p.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_params(params: &[ParameterRecord]) -> Vec<ParamManifest> {
    params
        .iter()
        .map(|p| ParamManifest {
            name: p.name.clone(),
            type_name: p.type_name.clone(),
            optional: p.optional,
            default: p.default_value.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeter() -> ModuleHandle {
        ModuleHandle::builder("Sample")
            .artifact("Sample.Core.dll")
            .with_type(
                TypeHandle::builder("Sample", "Greeter")
                    .static_type()
                    .static_method("Greet", &[("name", "string")], "string", |args| {
                        let name = args[0].as_str().unwrap_or_default();
                        Ok(Value::from(format!("Hello, {}!", name)))
                    })
                    .async_static_method("FetchAsync", &[], "Future<string>", |_| {
                        async { Ok(Value::from("fetched")) }.boxed()
                    })
                    .build(),
            )
            .with_type(
                TypeHandle::builder("Sample", "Widget")
                    .constructor(&[("width", "int"), ("height", "int")], |args| {
                        Ok((args[0].as_int().unwrap_or(0), args[1].as_int().unwrap_or(0)))
                    })
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_normalize_module_name() {
        assert_eq!(normalize_module_name("  Sample.Core.DLL "), "sample.core");
        assert_eq!(normalize_module_name("Sample.artifact.toml"), "sample");
        assert_eq!(normalize_module_name("Sample"), "sample");
        assert_eq!(normalize_module_name(".so"), ".so");
    }

    #[test]
    fn test_register_and_find_by_alias() {
        let hosts = HostModules::new();
        hosts.register(greeter());

        assert!(hosts.find("sample").is_some());
        assert!(hosts.find("Sample.Core").is_some());
        assert!(hosts.find("Other").is_none());
        assert!(hosts.contains_type("sample.widget"));
        assert_eq!(hosts.names(), vec!["Sample"]);

        assert!(hosts.unregister("Sample.Core.dll"));
        assert!(hosts.find("Sample").is_none());
        assert!(hosts.is_empty());
    }

    #[test]
    fn test_find_method_by_exact_signature() {
        let module = greeter();
        let ty = module.find_type("Sample.Greeter").unwrap();
        assert!(ty.find_method("Greet", true, &["String"]).is_some());
        assert!(ty.find_method("Greet", false, &["string"]).is_none());
        assert!(ty.find_method("Greet", true, &[]).is_none());
    }

    #[test]
    fn test_sync_call() {
        let module = greeter();
        let ty = module.find_type("Sample.Greeter").unwrap();
        let greet = ty.find_method("Greet", true, &["string"]).unwrap();
        let result = greet
            .call(&ty.full_name, None, &[Value::from("world")])
            .unwrap();
        assert_eq!(result, Value::from("Hello, world!"));
    }

    #[tokio::test]
    async fn test_async_call_yields_pending_value() {
        let module = greeter();
        let ty = module.find_type("Sample.Greeter").unwrap();
        let fetch = ty.find_method("FetchAsync", true, &[]).unwrap();
        assert!(fetch.is_async());

        let Value::Pending(pending) = fetch.call(&ty.full_name, None, &[]).unwrap() else {
            panic!("async method must return a pending value");
        };
        assert!(pending.member().contains("FetchAsync"));
        assert_eq!(pending.wait().await.unwrap(), Value::from("fetched"));
    }

    #[test]
    fn test_constructor_accepts_assignable_args() {
        let module = greeter();
        let widget = module.find_type("Sample.Widget").unwrap();
        let ctor = &widget.constructors[0];
        assert!(ctor.accepts(&[Value::from(2), Value::from(3)]));
        assert!(!ctor.accepts(&[Value::from(2)]));
        assert!(!ctor.accepts(&[Value::from("2"), Value::from(3)]));

        let instance = ctor.construct(&[Value::from(2), Value::from(3)]).unwrap();
        assert_eq!(instance.type_name(), "Sample.Widget");
        assert_eq!(instance.downcast_ref::<(i64, i64)>(), Some(&(2, 3)));
    }

    #[test]
    fn test_describe_matches_registrations() {
        let manifest = greeter().describe();
        assert_eq!(manifest.name.as_deref(), Some("Sample"));
        assert_eq!(manifest.types.len(), 2);
        let greet = &manifest.types[0].members[0];
        assert_eq!(greet.name, "Greet");
        assert!(greet.is_static);
        assert_eq!(greet.params[0].type_name, "string");
        assert_eq!(manifest.types[1].constructors[0].params.len(), 2);

        let rendered = manifest.to_toml_string().unwrap();
        assert_eq!(ArtifactManifest::from_toml_str(&rendered).unwrap(), manifest);
    }

    #[test]
    fn test_panic_error_message() {
        let payload = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        assert!(panic_error(payload).to_string().contains("kaboom"));
    }
}
