//! Processed class models.
//!
//! A [`ClassDescriptor`](crate::model::ClassDescriptor) is the as-declared
//! shape of one struct; a [`ClassModel`] is what the drivers actually use:
//! the full superclass-then-subclass property list with JSON names
//! translated, clashes rejected and the configured ordering applied.

use core::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::PropertyOrderStrategy;
use crate::error::{JsonbError, Result};
use crate::mapping::MappingContext;
use crate::model::binding_type::{BindingType, ConcreteType};
use crate::model::customization::{ClassCustomization, PropertyCustomization};
use crate::model::descriptor::{GetterFn, InstanceFn, SetterFn, TypeDescriptor};

// -----------------------------------------------------------------------------
// PropertyModel

/// One fully processed property.
#[derive(Clone)]
pub struct PropertyModel {
    name: String,
    read_name: String,
    write_name: String,
    declared_type: BindingType,
    getter: Option<GetterFn>,
    setter: Option<SetterFn>,
    customization: PropertyCustomization,
}

impl PropertyModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// JSON key this property binds from.
    pub fn read_name(&self) -> &str {
        &self.read_name
    }

    /// JSON key this property is written under.
    pub fn write_name(&self) -> &str {
        &self.write_name
    }

    pub fn declared_type(&self) -> &BindingType {
        &self.declared_type
    }

    pub fn getter(&self) -> Option<GetterFn> {
        self.getter
    }

    pub fn setter(&self) -> Option<SetterFn> {
        self.setter
    }

    pub fn customization(&self) -> &PropertyCustomization {
        &self.customization
    }
}

// -----------------------------------------------------------------------------
// ClassModel

/// The processed model of one bound struct, cached per mapping context.
pub struct ClassModel {
    ty: ConcreteType,
    type_params: Vec<&'static str>,
    parent: Option<BindingType>,
    properties: Vec<PropertyModel>,
    read_index: HashMap<String, usize>,
    customization: ClassCustomization,
    instance: Option<InstanceFn>,
}

impl ClassModel {
    /// Builds the model for the class registered under `id`.
    ///
    /// Properties are merged superclass-first; a subclass re-declaration of
    /// a property name shadows the inherited one and takes the subclass
    /// position, so its setter runs last.
    pub(crate) fn process(ctx: &MappingContext, id: TypeId) -> Result<ClassModel> {
        let chain = descriptor_chain(ctx, id)?;
        let leaf = chain
            .last()
            .ok_or_else(|| JsonbError::Internal("empty descriptor chain".to_string()))?;
        let TypeDescriptor::Object(leaf_class) = leaf.as_ref() else {
            return Err(JsonbError::Internal(
                "class model requested for a non-object descriptor".to_string(),
            ));
        };
        let ty = leaf_class.ty();
        let type_params = leaf_class.type_params().to_vec();
        let parent = leaf_class.parent().cloned();
        let customization = leaf_class.customization().clone();
        let instance = leaf_class.instance();

        // Superclass-first merge with shadowing by declared name.
        let mut merged: Vec<PropertyModel> = Vec::new();
        for descriptor in &chain {
            let TypeDescriptor::Object(class) = descriptor.as_ref() else {
                return Err(JsonbError::Internal(
                    "non-object descriptor in superclass chain".to_string(),
                ));
            };
            for property in class.properties() {
                let read_name = property
                    .customization()
                    .read_name
                    .clone()
                    .unwrap_or_else(|| ctx.property_naming().translate(property.name()));
                let write_name = property
                    .customization()
                    .write_name
                    .clone()
                    .unwrap_or_else(|| ctx.property_naming().translate(property.name()));
                let model = PropertyModel {
                    name: property.name().to_string(),
                    read_name,
                    write_name,
                    declared_type: property.declared_type().clone(),
                    getter: property.getter(),
                    setter: property.setter(),
                    customization: property.customization().clone(),
                };
                if let Some(shadowed) = merged.iter().position(|p| p.name == model.name) {
                    tracing::debug!(
                        class = ty.name(),
                        property = %model.name,
                        "subclass re-declaration shadows inherited property"
                    );
                    merged.remove(shadowed);
                }
                merged.push(model);
            }
        }

        let mut properties = order_properties(merged, &customization, ctx.property_order());
        detect_clashes(ty, &properties)?;

        let read_index = properties
            .iter()
            .enumerate()
            .map(|(i, p)| (p.read_name.clone(), i))
            .collect();

        // Creator parameters must all exist as properties.
        if let Some(creator) = &customization.creator {
            for param in &creator.params {
                if !properties.iter().any(|p| p.name == *param) {
                    return Err(JsonbError::UnsupportedMapping {
                        binding: ty.name().to_string(),
                        message: format!("creator parameter `{param}` has no matching property"),
                    });
                }
            }
        }

        properties.shrink_to_fit();
        Ok(ClassModel {
            ty,
            type_params,
            parent,
            properties,
            read_index,
            customization,
            instance,
        })
    }

    pub fn ty(&self) -> ConcreteType {
        self.ty
    }

    pub fn type_params(&self) -> &[&'static str] {
        &self.type_params
    }

    pub fn parent(&self) -> Option<&BindingType> {
        self.parent.as_ref()
    }

    pub fn properties(&self) -> &[PropertyModel] {
        &self.properties
    }

    pub fn customization(&self) -> &ClassCustomization {
        &self.customization
    }

    pub fn instance(&self) -> Option<InstanceFn> {
        self.instance
    }

    /// Finds the property bound to an incoming JSON key.
    pub fn property_by_read_name(&self, key: &str) -> Option<(usize, &PropertyModel)> {
        let index = *self.read_index.get(key)?;
        Some((index, &self.properties[index]))
    }

    /// Finds a property by its declared name, e.g. for creator parameters.
    pub fn property_by_name(&self, name: &str) -> Option<(usize, &PropertyModel)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
    }
}

/// Walks `parent` links and returns descriptors root-first.
fn descriptor_chain(ctx: &MappingContext, id: TypeId) -> Result<Vec<Arc<TypeDescriptor>>> {
    let mut chain = Vec::new();
    let mut seen = Vec::new();
    let mut current = Some(id);
    while let Some(id) = current {
        if seen.contains(&id) {
            return Err(JsonbError::Internal(
                "cyclic superclass chain".to_string(),
            ));
        }
        seen.push(id);
        let descriptor = ctx.descriptor(id).ok_or_else(|| JsonbError::Internal(
            "superclass chain refers to an unregistered type".to_string(),
        ))?;
        current = match descriptor.as_ref() {
            TypeDescriptor::Object(class) => class
                .parent()
                .and_then(BindingType::raw_type)
                .map(|raw| raw.id()),
            _ => None,
        };
        chain.push(descriptor);
    }
    chain.reverse();
    Ok(chain)
}

fn order_properties(
    merged: Vec<PropertyModel>,
    customization: &ClassCustomization,
    strategy: PropertyOrderStrategy,
) -> Vec<PropertyModel> {
    let mut rest = merged;
    let mut ordered = Vec::with_capacity(rest.len());

    // Explicitly listed properties come first, in the listed order.
    if let Some(order) = &customization.property_order {
        for name in order {
            if let Some(at) = rest.iter().position(|p| &p.name == name) {
                ordered.push(rest.remove(at));
            }
        }
    }

    match strategy {
        PropertyOrderStrategy::Any => {}
        PropertyOrderStrategy::Lexicographical => rest.sort_by(|a, b| a.name.cmp(&b.name)),
        PropertyOrderStrategy::Reverse => rest.sort_by(|a, b| b.name.cmp(&a.name)),
    }
    ordered.extend(rest);
    ordered
}

fn detect_clashes(ty: ConcreteType, properties: &[PropertyModel]) -> Result<()> {
    for (i, a) in properties.iter().enumerate() {
        for b in &properties[i + 1..] {
            let json_name = if a.read_name == b.read_name {
                Some(&a.read_name)
            } else if a.write_name == b.write_name {
                Some(&a.write_name)
            } else {
                None
            };
            if let Some(json_name) = json_name {
                return Err(JsonbError::NamingClash {
                    class: ty.name().to_string(),
                    first: a.name.clone(),
                    second: b.name.clone(),
                    json_name: json_name.clone(),
                });
            }
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Tests
