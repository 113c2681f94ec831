//! Component Factory
//!
//! A [`Component`] wraps a definition, either a render function or a
//! stateful type implementing [`Render`], and produces instances. Invoking
//! it allocates a fresh [`LifecycleContext`], runs the body as a mount pass
//! with that context ambient, and returns a [`Handle`] carrying the output
//! and an identity-key setter.
//!
//! Re-rendering an existing instance goes through [`Component::update`] and
//! [`Component::unmount`], which replay the same lifecycle context. Deciding
//! when to call them belongs to the reconciler.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use super::lifecycle::{Key, LifecycleContext, LifecycleStatus};
use crate::config::HookPolicy;
use crate::error::Result;

/// A stateful component definition.
///
/// The instance is built from props outside the lifecycle context; `render`
/// runs inside it and may call hooks.
pub trait Render {
    fn render(&mut self) -> Result<()>;
}

enum Definition<P, V> {
    Function(Rc<dyn Fn(P) -> Result<V>>),
    Stateful {
        construct: Rc<dyn Fn(P) -> V>,
        render: fn(&mut V) -> Result<()>,
    },
}

impl<P, V> Clone for Definition<P, V> {
    fn clone(&self) -> Self {
        match self {
            Definition::Function(render) => Definition::Function(Rc::clone(render)),
            Definition::Stateful { construct, render } => Definition::Stateful {
                construct: Rc::clone(construct),
                render: *render,
            },
        }
    }
}

/// A component definition plus the hook policy its instances use.
pub struct Component<P, V> {
    definition: Definition<P, V>,
    policy: HookPolicy,
}

impl<P: 'static, V: 'static> Component<P, V> {
    /// Define a component from a render function.
    ///
    /// Functions with nothing to hand back return `()`, which still yields a
    /// usable handle.
    pub fn function<F>(render: F) -> Self
    where
        F: Fn(P) -> Result<V> + 'static,
    {
        Self {
            definition: Definition::Function(Rc::new(render)),
            policy: HookPolicy::default(),
        }
    }
}

impl<P: 'static, V: Render + 'static> Component<P, V> {
    /// Define a component from a constructor for a [`Render`] type.
    ///
    /// Every pass builds the instance from the props it receives, so
    /// persistent state belongs in hooks.
    pub fn stateful<F>(construct: F) -> Self
    where
        F: Fn(P) -> V + 'static,
    {
        Self {
            definition: Definition::Stateful {
                construct: Rc::new(construct),
                render: V::render,
            },
            policy: HookPolicy::default(),
        }
    }
}

impl<P: 'static, V: 'static> Component<P, V> {
    /// Use `policy` for every instance created from now on.
    pub fn with_policy(mut self, policy: HookPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> HookPolicy {
        self.policy
    }

    /// Mount a new instance.
    pub fn invoke(&self, props: P) -> Result<Handle<V>> {
        let context = LifecycleContext::new(self.policy);
        let output = self.pass(&context, LifecycleStatus::Mount, props)?;
        Ok(Handle { context, output })
    }

    /// Re-render an existing instance with new props.
    pub fn update(&self, handle: &mut Handle<V>, props: P) -> Result<()> {
        handle.output = self.pass(&handle.context, LifecycleStatus::Update, props)?;
        Ok(())
    }

    /// Run the teardown pass for an instance.
    pub fn unmount(&self, handle: Handle<V>, props: P) -> Result<()> {
        self.pass(&handle.context, LifecycleStatus::Unmount, props)
            .map(drop)
    }

    /// Turn the definition into a plain factory function.
    pub fn into_factory(self) -> impl Fn(P) -> Result<Handle<V>> {
        move |props| self.invoke(props)
    }

    fn pass(&self, context: &Rc<LifecycleContext>, status: LifecycleStatus, props: P) -> Result<V> {
        match &self.definition {
            Definition::Function(render) => context.run(status, || render(props)),
            Definition::Stateful { construct, render } => {
                let mut instance = construct(props);
                context.run(status, || render(&mut instance))?;
                Ok(instance)
            }
        }
    }
}

impl<P, V> Clone for Component<P, V> {
    fn clone(&self) -> Self {
        Self {
            definition: self.definition.clone(),
            policy: self.policy,
        }
    }
}

impl<P, V> fmt::Debug for Component<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.definition {
            Definition::Function(_) => "function",
            Definition::Stateful { .. } => "stateful",
        };
        f.debug_struct("Component")
            .field("kind", &kind)
            .field("policy", &self.policy)
            .finish()
    }
}

/// What an invocation hands back: the body's output plus its lifecycle.
///
/// Derefs to the output, so builder methods on a stateful instance chain
/// straight off the handle.
pub struct Handle<V> {
    context: Rc<LifecycleContext>,
    output: V,
}

impl<V> Handle<V> {
    /// Record an identity key for keyed reconciliation.
    pub fn key(self, key: impl Into<Key>) -> Self {
        self.context.set_key(key.into());
        self
    }

    pub fn identity(&self) -> Option<Key> {
        self.context.key()
    }

    pub fn context(&self) -> &Rc<LifecycleContext> {
        &self.context
    }

    pub fn output(&self) -> &V {
        &self.output
    }

    pub fn into_output(self) -> V {
        self.output
    }
}

impl<V> Deref for Handle<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.output
    }
}

impl<V> DerefMut for Handle<V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.output
    }
}

impl<V: fmt::Debug> fmt::Debug for Handle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("output", &self.output)
            .field("context", &self.context)
            .finish()
    }
}
