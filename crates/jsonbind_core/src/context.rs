//! The engine instance: configuration, registry, components, converters.

use crate::components::ComponentMatcher;
use crate::config::JsonbConfig;
use crate::convert::{default_converters, ConverterRegistry};
use crate::mapping::MappingContext;

// -----------------------------------------------------------------------------
// JsonbContext

/// Everything a de/serialization run needs, built once per engine and shared
/// immutably afterwards.
pub struct JsonbContext {
    config: JsonbConfig,
    mapping: MappingContext,
    components: ComponentMatcher,
    converters: &'static ConverterRegistry,
}

impl JsonbContext {
    pub fn new(config: JsonbConfig) -> Self {
        let mapping = MappingContext::with_config(&config);
        let components = ComponentMatcher::new();
        for serializer in config.serializers() {
            components.register_serializer(serializer.clone());
        }
        for deserializer in config.deserializers() {
            components.register_deserializer(deserializer.clone());
        }
        for adapter in config.adapters() {
            components.register_adapter(adapter.clone());
        }
        Self {
            config,
            mapping,
            components,
            converters: default_converters(),
        }
    }

    #[inline]
    pub fn config(&self) -> &JsonbConfig {
        &self.config
    }

    #[inline]
    pub fn mapping(&self) -> &MappingContext {
        &self.mapping
    }

    #[inline]
    pub fn components(&self) -> &ComponentMatcher {
        &self.components
    }

    #[inline]
    pub fn converters(&self) -> &'static ConverterRegistry {
        self.converters
    }
}

impl Default for JsonbContext {
    fn default() -> Self {
        Self::new(JsonbConfig::default())
    }
}
