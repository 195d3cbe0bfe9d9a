//! Built-in hydrologic module backends for the catchflow pipeline.
//!
//! Two intentionally small process models cover the common coupling shape: a
//! [`LinearReservoirBackend`] turning precipitation into runoff, and a
//! [`ChannelRouteBackend`] attenuating that runoff into channel discharge.
//! Both implement the module interface natively and are registered with a
//! factory via [`register_builtins`].
//!
//! [`LinearReservoirBackend`]: linear_reservoir::LinearReservoirBackend
//! [`ChannelRouteBackend`]: channel_route::ChannelRouteBackend

pub mod channel_route;
pub mod linear_reservoir;

mod init_text;

use catchflow_core::module::{BackendRegistry, ModuleBackend};

/// Register every bundled backend under its model-type name.
pub fn register_builtins(registry: &mut BackendRegistry) {
    registry.register(linear_reservoir::MODEL_TYPE, |_config| {
        Ok(Box::new(linear_reservoir::LinearReservoirBackend::new()) as Box<dyn ModuleBackend>)
    });
    registry.register(channel_route::MODEL_TYPE, |_config| {
        Ok(Box::new(channel_route::ChannelRouteBackend::new()) as Box<dyn ModuleBackend>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use catchflow_core::module::BackendRegistry;

    #[test]
    fn builtins_are_registered() {
        let mut registry = BackendRegistry::new();
        register_builtins(&mut registry);
        assert_eq!(
            registry.known_model_types(),
            vec!["channel_route".to_string(), "linear_reservoir".to_string()]
        );
    }
}
