use crate::capability::CapabilityHandle;
use crate::descriptor::{ExtensionDescriptor, Runtime};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds a capability for an installed descriptor.
pub type NativeFactory = Arc<dyn Fn(&ExtensionDescriptor) -> CapabilityHandle + Send + Sync>;

/// Sources compiled into the host, keyed by module name.
///
/// A descriptor with [`Runtime::Native`] is only loadable if its module was
/// registered here before the loader was built.
#[derive(Clone, Default)]
pub struct NativeRegistry {
    factories: HashMap<String, NativeFactory>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, module: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ExtensionDescriptor) -> CapabilityHandle + Send + Sync + 'static,
    {
        self.factories.insert(module.into(), Arc::new(factory));
        self
    }

    pub fn with<F>(mut self, module: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ExtensionDescriptor) -> CapabilityHandle + Send + Sync + 'static,
    {
        self.register(module, factory);
        self
    }

    pub fn contains(&self, module: &str) -> bool {
        self.factories.contains_key(module)
    }

    /// `None` if the descriptor isn't native, or its module isn't registered.
    pub fn instantiate(&self, descriptor: &ExtensionDescriptor) -> Option<CapabilityHandle> {
        let Runtime::Native { module } = &descriptor.runtime else {
            return None;
        };
        self.factories.get(module).map(|factory| factory(descriptor))
    }
}

impl fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut modules: Vec<_> = self.factories.keys().collect();
        modules.sort();
        f.debug_struct("NativeRegistry").field("modules", &modules).finish()
    }
}
