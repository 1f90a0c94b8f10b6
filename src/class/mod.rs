//! Single-inheritance class tables
//!
//! A [`Class`] is a named type descriptor holding a resolved method table and a
//! resolved field table. Tables are merged once, when the class is built: own
//! entries win, everything else is inherited from the parent's already-resolved
//! tables. Every override keeps a direct handle to the implementation it
//! replaced, so [`Call::call_super`] never walks the chain at call time.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Signature shared by every method stored in a class table.
pub type MethodFn<R> = Arc<dyn Fn(&mut Call<'_, R>) -> anyhow::Result<Value> + Send + Sync>;

/// Configuration errors raised while resolving methods.
///
/// These point at wiring bugs in the code that defines or calls the classes,
/// so they are always returned to the caller and never recovered from here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassError {
    #[error("method '{method}' not found on class '{class}' or its ancestors")]
    MethodNotFound { class: String, method: String },

    #[error("class '{ancestor}' is not an ancestor of '{class}'")]
    TypeMismatch { class: String, ancestor: String },
}

/// A method as seen by one class: the implementation plus the implementation
/// it overrides, if any.
pub struct Binding<R> {
    owner: String,
    method: String,
    func: MethodFn<R>,
    overridden: Option<Arc<Binding<R>>>,
}

impl<R> Binding<R> {
    /// Name of the class that defined this implementation.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// The implementation this one overrides.
    pub fn overridden(&self) -> Option<&Arc<Binding<R>>> {
        self.overridden.as_ref()
    }

    /// Run this implementation against `receiver`.
    pub fn invoke(&self, receiver: &mut R, args: Value) -> anyhow::Result<Value> {
        let mut call = Call {
            receiver,
            args,
            binding: self,
        };
        (self.func)(&mut call)
    }
}

impl<R> fmt::Debug for Binding<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("owner", &self.owner)
            .field("method", &self.method)
            .field("overrides", &self.overridden.as_ref().map(|b| b.owner.clone()))
            .finish()
    }
}

/// One method invocation: the receiver, its arguments and the binding that is
/// currently running.
pub struct Call<'a, R> {
    receiver: &'a mut R,
    args: Value,
    binding: &'a Binding<R>,
}

impl<'a, R> Call<'a, R> {
    /// The object the method runs on.
    pub fn this(&mut self) -> &mut R {
        self.receiver
    }

    pub fn args(&self) -> &Value {
        &self.args
    }

    /// Name of the class whose implementation is running.
    pub fn owner(&self) -> &str {
        &self.binding.owner
    }

    /// Invoke the implementation that the running one overrides.
    pub fn call_super(&mut self, args: Value) -> anyhow::Result<Value> {
        let binding = self.binding;
        let parent = binding.overridden.as_deref().ok_or_else(|| {
            let err = ClassError::MethodNotFound {
                class: binding.owner.clone(),
                method: binding.method.clone(),
            };
            error!("no overridden implementation: {}", err);
            err
        })?;
        parent.invoke(&mut *self.receiver, args)
    }
}

/// A resolved type descriptor.
pub struct Class<R> {
    name: String,
    parent: Option<Arc<Class<R>>>,
    methods: HashMap<String, Arc<Binding<R>>>,
    fields: HashMap<String, Value>,
}

impl<R> Class<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Class<R>>> {
        self.parent.as_ref()
    }

    /// Whether two handles refer to the very same class.
    pub fn same(a: &Arc<Class<R>>, b: &Arc<Class<R>>) -> bool {
        Arc::ptr_eq(a, b)
    }

    /// This class followed by its ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Class<R>> {
        std::iter::successors(Some(self), |c| c.parent.as_deref())
    }

    /// Whether `name` is this class or one of its ancestors.
    pub fn is_a(&self, name: &str) -> bool {
        self.ancestors().any(|c| c.name == name)
    }

    pub fn responds_to(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Resolved field value, own or inherited.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up the resolved binding for `method`.
    pub fn resolve(&self, method: &str) -> Result<&Arc<Binding<R>>, ClassError> {
        self.methods.get(method).ok_or_else(|| {
            let err = ClassError::MethodNotFound {
                class: self.name.clone(),
                method: method.to_string(),
            };
            error!("{}", err);
            err
        })
    }

    /// Dispatch `method` on `receiver`.
    pub fn invoke(&self, method: &str, receiver: &mut R, args: Value) -> anyhow::Result<Value> {
        self.resolve(method)?.invoke(receiver, args)
    }

    /// Dispatch `method` as the named ancestor resolves it.
    pub fn invoke_as(
        &self,
        ancestor: &str,
        method: &str,
        receiver: &mut R,
        args: Value,
    ) -> anyhow::Result<Value> {
        let class = self.ancestors().find(|c| c.name == ancestor).ok_or_else(|| {
            let err = ClassError::TypeMismatch {
                class: self.name.clone(),
                ancestor: ancestor.to_string(),
            };
            error!("{}", err);
            err
        })?;
        class.invoke(method, receiver, args)
    }
}

impl<R> fmt::Debug for Class<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("methods", &methods)
            .finish()
    }
}

/// Builder for [`Class`].
pub struct ClassBuilder<R> {
    name: String,
    parent: Option<Arc<Class<R>>>,
    methods: Vec<(String, MethodFn<R>)>,
    fields: HashMap<String, Value>,
}

impl<R> ClassBuilder<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            methods: Vec::new(),
            fields: HashMap::new(),
        }
    }

    pub fn extends(mut self, parent: &Arc<Class<R>>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Call<'_, R>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), Arc::new(func)));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Resolve the tables against the parent and freeze the class.
    pub fn build(self) -> Arc<Class<R>> {
        let (mut methods, mut fields) = match &self.parent {
            Some(parent) => (parent.methods.clone(), parent.fields.clone()),
            None => (HashMap::new(), HashMap::new()),
        };

        for (method, func) in self.methods {
            let overridden = methods.get(&method).cloned();
            let binding = Arc::new(Binding {
                owner: self.name.clone(),
                method: method.clone(),
                func,
                overridden,
            });
            methods.insert(method, binding);
        }
        fields.extend(self.fields);

        Arc::new(Class {
            name: self.name,
            parent: self.parent,
            methods,
            fields,
        })
    }
}
