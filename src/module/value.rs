//! Dynamic values passed to and returned from invoked members

use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::module::metadata::is_async_return_type;
use crate::module::traits::{ModuleError, ModuleResult};

/// Type names understood without any module providing them
pub const PRIMITIVE_TYPES: &[&str] = &["bool", "int", "float", "string", "list", "object", "void"];

/// Primitive types that cannot hold `null` unless declared nullable (`int?`)
const VALUE_PRIMITIVES: &[&str] = &["bool", "int", "float"];

/// Whether `type_name` is a built-in primitive (nullable suffix allowed)
pub fn is_primitive_type(type_name: &str) -> bool {
    let base = type_name.trim().trim_end_matches('?');
    PRIMITIVE_TYPES.iter().any(|p| p.eq_ignore_ascii_case(base))
}

/// Object instance created by a module constructor
#[derive(Clone)]
pub struct Instance {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: Arc::from(type_name.into()),
            inner: Arc::new(value),
        }
    }

    /// Full name of the instance's type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Whether two handles point at the same object
    pub fn same_object(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Result of an async member that has been dispatched but not awaited
///
/// The wrapped future can be awaited exactly once.
#[derive(Clone)]
pub struct PendingValue {
    member: Arc<str>,
    future: Arc<Mutex<Option<BoxFuture<'static, anyhow::Result<Value>>>>>,
}

impl PendingValue {
    pub fn new(member: impl Into<String>, future: BoxFuture<'static, anyhow::Result<Value>>) -> Self {
        Self {
            member: Arc::from(member.into()),
            future: Arc::new(Mutex::new(Some(future))),
        }
    }

    /// Signature of the member that produced this value
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Whether the result has already been taken
    pub fn is_consumed(&self) -> bool {
        self.future
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Await completion and unwrap the produced value
    ///
    /// Errors raised by the awaited code become `InvocationFailed`.
    pub async fn wait(self) -> ModuleResult<Value> {
        let future = self
            .future
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(future) = future else {
            return Err(ModuleError::Validation(format!(
                "async result of {} was already awaited",
                self.member
            )));
        };
        future
            .await
            .map_err(|cause| ModuleError::invocation_failed(self.member.to_string(), cause))
    }
}

impl fmt::Debug for PendingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingValue")
            .field("member", &self.member)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// Dynamically typed argument or return value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Instance),
    Pending(PendingValue),
}

impl Value {
    /// Type name used in diagnostics and assignability checks
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Object(instance) => instance.type_name(),
            Value::Pending(_) => "Future",
        }
    }

    /// Whether this value can be passed where `type_name` is declared
    ///
    /// `object` accepts everything, `float` accepts `int`, and `null` fits
    /// any reference type or a nullable value type (`int?`).
    pub fn is_assignable_to(&self, type_name: &str) -> bool {
        let declared = type_name.trim();
        let (target, nullable) = match declared.strip_suffix('?') {
            Some(base) => (base, true),
            None => (declared, false),
        };
        if target.eq_ignore_ascii_case("object") {
            return true;
        }
        match self {
            Value::Null => {
                nullable || !VALUE_PRIMITIVES.iter().any(|p| p.eq_ignore_ascii_case(target))
            }
            Value::Bool(_) => target.eq_ignore_ascii_case("bool"),
            Value::Int(_) => {
                target.eq_ignore_ascii_case("int") || target.eq_ignore_ascii_case("float")
            }
            Value::Float(_) => target.eq_ignore_ascii_case("float"),
            Value::Str(_) => target.eq_ignore_ascii_case("string"),
            Value::List(_) => target.eq_ignore_ascii_case("list"),
            Value::Object(instance) => instance.type_name() == target,
            Value::Pending(_) => is_async_return_type(target),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn into_instance(self) -> Option<Instance> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.same_object(b),
            // Pending results compare by identity only
            (Value::Pending(a), Value::Pending(b)) => Arc::ptr_eq(&a.future, &b.future),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
