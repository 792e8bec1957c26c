use crate::error::{QueryError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    name: &'static str,
    service: Box<dyn Any + Send + Sync>,
}

/// Registry of services keyed by the capability they provide.
///
/// Services are registered as `Arc<dyn Capability>` and looked up by the
/// same trait object type. Lookups are pure reads.
#[derive(Default)]
pub struct ServiceLocator {
    services: HashMap<TypeId, Entry>,
}

impl ServiceLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T>(&mut self, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.insert(
            TypeId::of::<T>(),
            Entry {
                name: std::any::type_name::<T>(),
                service: Box::new(service),
            },
        );
    }

    pub fn with<T>(mut self, service: Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(service);
        self
    }

    pub fn find<T>(&self) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.service.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Service '{}' is not registered",
                    std::any::type_name::<T>()
                ))
            })
    }

    pub fn contains<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.services.contains_key(&TypeId::of::<T>())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .values()
            .map(|entry| entry.name.to_string())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_register_and_find_trait_object() {
        let locator = ServiceLocator::new().with::<dyn Greeter>(Arc::new(English));

        assert!(locator.contains::<dyn Greeter>());
        assert_eq!(locator.find::<dyn Greeter>().unwrap().greet(), "hello");
        assert_eq!(locator.list().len(), 1);
        assert!(locator.list()[0].contains("Greeter"));
    }

    #[test]
    fn test_missing_service_is_configuration_error() {
        let locator = ServiceLocator::new();
        let err = locator.find::<dyn Greeter>().err().unwrap();
        assert!(err.is_configuration());
    }
}
