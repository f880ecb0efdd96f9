//! Service lifecycle registry.
//!
//! The registry is the single source of truth for component lifecycle
//! ordering and aggregate health. Components are registered explicitly
//! during bootstrap; the registry computes a topological startup order from
//! their declared dependencies and drives every component through
//! initialize → start → stop, strictly sequentially, so a component can
//! assume its dependencies are ready before its own lifecycle calls run.
//!
//! The registry is an ordinary value constructed once at process start and
//! passed by reference to whatever needs it; there is no ambient global
//! instance, so tests construct isolated registries freely.

use crate::application::ports::{Component, ComponentError};
use crate::domain::health::HealthReport;
use crate::domain::lifecycle::ServiceState;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Error from registry operations and boot.
#[derive(Debug)]
pub enum RegistryError {
    /// A component with this name is already registered.
    DuplicateService(String),
    /// No component registered under this name.
    ServiceNotFound(String),
    /// The dependency graph contains a cycle through this component.
    CircularDependency(String),
    /// A component depends on a name that is not registered.
    UnknownDependency {
        /// The component declaring the dependency.
        service: String,
        /// The missing dependency name.
        dependency: String,
    },
    /// A component's `initialize()` failed; boot must abort.
    InitializeFailed {
        /// The failing component.
        service: String,
        /// The underlying error.
        source: ComponentError,
    },
    /// A component's `start()` failed; boot must abort.
    StartFailed {
        /// The failing component.
        service: String,
        /// The underlying error.
        source: ComponentError,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateService(name) => {
                write!(f, "service already registered: {}", name)
            }
            RegistryError::ServiceNotFound(name) => {
                write!(f, "service not found: {}", name)
            }
            RegistryError::CircularDependency(name) => {
                write!(f, "circular dependency involving service: {}", name)
            }
            RegistryError::UnknownDependency {
                service,
                dependency,
            } => {
                write!(
                    f,
                    "service {} depends on unregistered service {}",
                    service, dependency
                )
            }
            RegistryError::InitializeFailed { service, source } => {
                write!(f, "service {} failed to initialize: {}", service, source)
            }
            RegistryError::StartFailed { service, source } => {
                write!(f, "service {} failed to start: {}", service, source)
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::InitializeFailed { source, .. }
            | RegistryError::StartFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

struct Registration {
    component: Arc<dyn Component>,
    dependencies: Vec<String>,
    state: ServiceState,
}

/// Lifecycle manager for registered components.
pub struct ServiceRegistry {
    services: HashMap<String, Registration>,
    /// Registration order; makes the topological order deterministic.
    insertion_order: Vec<String>,
    /// Resolved startup order, set by `initialize_all`.
    startup_order: Option<Vec<String>>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.insertion_order)
            .field("startup_order", &self.startup_order)
            .finish()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
            insertion_order: Vec::new(),
            startup_order: None,
        }
    }

    /// Register a component under its declared name.
    ///
    /// # Errors
    /// `RegistryError::DuplicateService` if the name is taken.
    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), RegistryError> {
        let name = component.name().to_string();
        if self.services.contains_key(&name) {
            return Err(RegistryError::DuplicateService(name));
        }

        tracing::debug!(service = %name, "registered service");
        let dependencies = component.dependencies();
        self.services.insert(
            name.clone(),
            Registration {
                component,
                dependencies,
                state: ServiceState::Uninitialized,
            },
        );
        self.insertion_order.push(name);
        Ok(())
    }

    /// Fetch a registered component by name.
    ///
    /// # Errors
    /// `RegistryError::ServiceNotFound` if absent.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Component>, RegistryError> {
        self.services
            .get(name)
            .map(|r| Arc::clone(&r.component))
            .ok_or_else(|| RegistryError::ServiceNotFound(name.to_string()))
    }

    /// Current lifecycle state of a registered component.
    pub fn state(&self, name: &str) -> Option<ServiceState> {
        self.services.get(name).map(|r| r.state)
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if no components are registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Compute the startup order: a topological sort of the dependency
    /// graph, leaves (no unresolved dependencies) first.
    ///
    /// # Errors
    /// `CircularDependency` on a cycle, `UnknownDependency` on a dangling
    /// reference.
    pub fn resolve_order(&self) -> Result<Vec<String>, RegistryError> {
        fn visit(
            services: &HashMap<String, Registration>,
            name: &str,
            visiting: &mut HashSet<String>,
            visited: &mut HashSet<String>,
            order: &mut Vec<String>,
        ) -> Result<(), RegistryError> {
            if visited.contains(name) {
                return Ok(());
            }
            if !visiting.insert(name.to_string()) {
                return Err(RegistryError::CircularDependency(name.to_string()));
            }

            for dep in &services[name].dependencies {
                if !services.contains_key(dep) {
                    return Err(RegistryError::UnknownDependency {
                        service: name.to_string(),
                        dependency: dep.clone(),
                    });
                }
                visit(services, dep, visiting, visited, order)?;
            }

            visiting.remove(name);
            visited.insert(name.to_string());
            order.push(name.to_string());
            Ok(())
        }

        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(self.services.len());

        for name in &self.insertion_order {
            visit(&self.services, name, &mut visiting, &mut visited, &mut order)?;
        }
        Ok(order)
    }

    /// Initialize every component in dependency order, awaiting each before
    /// moving to the next. Returns the startup order on success.
    ///
    /// # Errors
    /// The first failing `initialize()` flips that component to `Error` and
    /// aborts the whole call; remaining components are not initialized.
    pub async fn initialize_all(&mut self) -> Result<Vec<String>, RegistryError> {
        let order = self.resolve_order()?;
        self.startup_order = Some(order.clone());

        for name in &order {
            self.transition(name, ServiceState::Initializing);
            let component = Arc::clone(&self.services[name].component);

            match component.initialize().await {
                Ok(()) => {
                    self.transition(name, ServiceState::Ready);
                    tracing::info!(service = %name, "service initialized");
                }
                Err(source) => {
                    self.transition(name, ServiceState::Error);
                    return Err(RegistryError::InitializeFailed {
                        service: name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(order)
    }

    /// Start every component in startup order. A component's `start()` may
    /// assume all of its dependencies are already ready.
    ///
    /// # Errors
    /// The first failing `start()` flips that component to `Error` and
    /// aborts the whole call.
    pub async fn start_all(&mut self) -> Result<(), RegistryError> {
        let order = match &self.startup_order {
            Some(order) => order.clone(),
            None => self.resolve_order()?,
        };

        for name in &order {
            let component = Arc::clone(&self.services[name].component);
            match component.start().await {
                Ok(()) => {
                    tracing::info!(service = %name, "service started");
                }
                Err(source) => {
                    self.transition(name, ServiceState::Error);
                    return Err(RegistryError::StartFailed {
                        service: name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Stop every ready component in reverse startup order, best-effort: a
    /// failure is logged and collected, and the remaining components still
    /// stop. Returns the collected failures.
    pub async fn stop_all(&mut self) -> Vec<(String, ComponentError)> {
        let order = match &self.startup_order {
            Some(order) => order.clone(),
            None => self
                .resolve_order()
                .unwrap_or_else(|_| self.insertion_order.clone()),
        };

        let mut failures = Vec::new();
        for name in order.iter().rev() {
            if self.services[name].state != ServiceState::Ready {
                continue;
            }

            self.transition(name, ServiceState::Stopping);
            let component = Arc::clone(&self.services[name].component);

            match component.stop().await {
                Ok(()) => {
                    self.transition(name, ServiceState::Stopped);
                    tracing::info!(service = %name, "service stopped");
                }
                Err(source) => {
                    self.transition(name, ServiceState::Error);
                    tracing::warn!(service = %name, error = %source, "service failed to stop");
                    failures.push((name.clone(), source));
                }
            }
        }

        failures
    }

    /// Probe every registered component. A probe error is converted into an
    /// unhealthy report; this never fails as a whole.
    pub async fn health_check_all(&self) -> HashMap<String, HealthReport> {
        let mut reports = HashMap::with_capacity(self.services.len());

        for name in &self.insertion_order {
            let component = Arc::clone(&self.services[name].component);
            let report = match component.health().await {
                Ok(report) => report,
                Err(e) => HealthReport::unhealthy(e.to_string()),
            };
            reports.insert(name.clone(), report);
        }

        reports
    }

    fn transition(&mut self, name: &str, next: ServiceState) {
        if let Some(registration) = self.services.get_mut(name) {
            if registration.state.can_transition(next) {
                registration.state = next;
            } else {
                // Illegal transition request is a registry bug; force the
                // descriptor into Error rather than lying about state.
                tracing::warn!(
                    service = %name,
                    from = %registration.state,
                    to = %next,
                    "illegal lifecycle transition"
                );
                registration.state = ServiceState::Error;
            }
        }
    }
}
