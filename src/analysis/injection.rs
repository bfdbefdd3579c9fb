//! Property injection.
//!
//! Properties carrying a data source attribute are populated after construction and before
//! the first before-test hook. How generated code writes the value is decided once per property
//! by [`choose_strategy`], a pure function of the property's [`PropertyShape`]:
//!
//! | shape                                   | strategy                                   |
//! |-----------------------------------------|--------------------------------------------|
//! | no setter                               | [`InjectionStrategy::Unsupported`]         |
//! | `init` accessor                         | [`InjectionStrategy::InitOnlyAccessor`]    |
//! | public setter                           | [`InjectionStrategy::DirectSetter`]        |
//! | `<Name>k__BackingField` exists          | [`InjectionStrategy::BackingFieldAccess`]  |
//! | anything else                           | [`InjectionStrategy::ReflectionFallback`]  |
//!
//! Injected values may themselves have injectable properties; [`PropertyInjectionResolver`]
//! resolves those nested injections recursively. A type already on the resolution path is not
//! entered again, and nesting deeper than [`MAX_NESTING_DEPTH`] is an error.

use std::{collections::HashSet, fmt, sync::Arc};

use strum::{Display, EnumIter};
use tracing::debug;

use crate::{
    analysis::{
        classify::{AttributeClassifier, AttributeFamily, DataSourceMarker},
        datasource::{DataSourceAnalyzer, DataSourceDescriptor},
    },
    config::ReflectionFallbackPolicy,
    model::{
        Accessibility, Location, ProgramModel, PropertySymbol, Token, TypeNameStyle,
        TypeSignature,
    },
    Error, Result,
};

/// Maximum depth of nested property injection
pub const MAX_NESTING_DEPTH: usize = 8;

/// How generated code writes an injected property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum InjectionStrategy {
    /// `instance.Property = value`
    DirectSetter,
    /// `UnsafeAccessor` to the backing field of an `init` property
    InitOnlyAccessor,
    /// Direct write to the compiler generated backing field
    BackingFieldAccess,
    /// `PropertyInfo.SetValue`, not trimming or AOT safe
    ReflectionFallback,
    /// The property cannot be written
    Unsupported,
}

impl InjectionStrategy {
    /// Returns true if the emitted writer relies on runtime reflection
    #[must_use]
    pub fn needs_reflection(&self) -> bool {
        matches!(self, InjectionStrategy::ReflectionFallback)
    }
}

/// The facts [`choose_strategy`] decides on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyShape {
    /// Setter accessibility, `None` without a setter
    pub setter: Option<Accessibility>,
    /// The setter is an `init` accessor
    pub init_only: bool,
    /// The conventional backing field exists
    pub backing_field: bool,
}

impl PropertyShape {
    /// Extracts the shape of a property declared in `model`
    #[must_use]
    pub fn of(model: &ProgramModel, property: &PropertySymbol) -> Self {
        PropertyShape {
            setter: property.setter.map(|setter| setter.accessibility),
            init_only: property.setter.is_some_and(|setter| setter.init_only),
            backing_field: model
                .find_field(property.declaring_type, &property.backing_field_name())
                .is_some(),
        }
    }
}

/// Selects the write strategy for a property
#[must_use]
pub fn choose_strategy(shape: PropertyShape) -> InjectionStrategy {
    match shape.setter {
        None => InjectionStrategy::Unsupported,
        Some(_) if shape.init_only => InjectionStrategy::InitOnlyAccessor,
        Some(Accessibility::Public) => InjectionStrategy::DirectSetter,
        Some(_) if shape.backing_field => InjectionStrategy::BackingFieldAccess,
        Some(_) => InjectionStrategy::ReflectionFallback,
    }
}

/// Generic type a property is declared on, for accessors that must be generic themselves
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericContext {
    /// Open generic definition
    pub definition: Token,
    /// Type arguments of the closed owner
    pub arguments: Vec<TypeSignature>,
}

/// One property to inject
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInjectionDescriptor {
    /// The property
    pub property: Token,
    /// Property name
    pub name: String,
    /// Closed type declaring the property
    pub declaring_type: TypeSignature,
    /// Property type with the owner's arguments applied
    pub property_type: TypeSignature,
    /// Write strategy
    pub strategy: InjectionStrategy,
    /// Name of the backing field, if it exists
    pub backing_field: Option<String>,
    /// Declared `required`
    pub is_required: bool,
    /// Source of the injected value
    pub data_source: Arc<DataSourceDescriptor>,
    /// Injections into the injected value
    pub nested: Vec<PropertyInjectionDescriptor>,
    /// Set when the declaring type is a generic instantiation
    pub generic_context: Option<GenericContext>,
    /// Declaration site
    pub location: Option<Location>,
}

impl PropertyInjectionDescriptor {
    /// Number of injections including nested ones
    #[must_use]
    pub fn total(&self) -> usize {
        1 + self.nested.iter().map(Self::total).sum::<usize>()
    }
}

impl fmt::Display for PropertyInjectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.name, self.strategy)
    }
}

/// Finds injectable properties and their nested injections
pub struct PropertyInjectionResolver<'a> {
    model: &'a ProgramModel,
    classifier: AttributeClassifier<'a>,
    datasources: &'a DataSourceAnalyzer<'a>,
    policy: ReflectionFallbackPolicy,
}

impl<'a> PropertyInjectionResolver<'a> {
    /// Creates a resolver applying `policy` to reflection fallbacks
    #[must_use]
    pub fn new(
        model: &'a ProgramModel,
        datasources: &'a DataSourceAnalyzer<'a>,
        policy: ReflectionFallbackPolicy,
    ) -> Self {
        PropertyInjectionResolver {
            model,
            classifier: AttributeClassifier::new(model),
            datasources,
            policy,
        }
    }

    /// Returns true if `declaring` or one of its bases has a property with a data source
    #[must_use]
    pub fn has_injectable_properties(&self, declaring: &TypeSignature) -> bool {
        self.model.lineage(declaring).iter().any(|ancestor| {
            self.model.resolve(ancestor).is_some_and(|symbol| {
                self.model
                    .properties_of(&symbol)
                    .iter()
                    .any(|property| !property.is_static && self.marker(property).is_some())
            })
        })
    }

    /// Resolves all injections for instances of `declaring`, base class properties first.
    ///
    /// Properties without a setter are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReflectionDenied`] if a property needs reflection and the policy
    /// denies it, [`Error::RecursionLimit`] if nested injections go deeper than
    /// [`MAX_NESTING_DEPTH`], and any error of the property's data source.
    pub fn resolve(&self, declaring: &TypeSignature) -> Result<Vec<PropertyInjectionDescriptor>> {
        let mut path = HashSet::new();
        self.resolve_nested(declaring, &mut path, 0)
    }

    fn resolve_nested(
        &self,
        declaring: &TypeSignature,
        path: &mut HashSet<TypeSignature>,
        depth: usize,
    ) -> Result<Vec<PropertyInjectionDescriptor>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::RecursionLimit(MAX_NESTING_DEPTH));
        }
        if !path.insert(declaring.clone()) {
            return Ok(Vec::new());
        }

        let mut lineage = self.model.lineage(declaring);
        lineage.reverse();

        let mut injections = Vec::new();
        let mut seen = HashSet::new();
        for ancestor in &lineage {
            let Some(symbol) = self.model.resolve(ancestor) else {
                continue;
            };
            for property in self.model.properties_of(&symbol) {
                if property.is_static || !seen.insert(property.name.clone()) {
                    continue;
                }
                let Some(marker) = self.marker(&property) else {
                    continue;
                };
                if let Some(injection) =
                    self.describe(&property, ancestor, &marker, path, depth)?
                {
                    injections.push(injection);
                }
            }
        }

        path.remove(declaring);
        Ok(injections)
    }

    fn describe(
        &self,
        property: &PropertySymbol,
        owner: &TypeSignature,
        marker: &DataSourceMarker,
        path: &mut HashSet<TypeSignature>,
        depth: usize,
    ) -> Result<Option<PropertyInjectionDescriptor>> {
        let owner_name = self.model.type_name(owner, TypeNameStyle::Identity);
        let strategy = choose_strategy(PropertyShape::of(self.model, property));

        match strategy {
            InjectionStrategy::Unsupported => {
                debug!(
                    target: "injection",
                    property = %format!("{}.{}", owner_name, property.name),
                    "skipping property without setter"
                );
                return Ok(None);
            }
            InjectionStrategy::ReflectionFallback
                if self.policy == ReflectionFallbackPolicy::Deny =>
            {
                return Err(Error::ReflectionDenied {
                    owner: owner_name,
                    property: property.name.clone(),
                });
            }
            _ => {}
        }

        let data_source = self.datasources.analyze(marker, owner)?;
        let property_type = property
            .signature
            .substitute(owner.generic_arguments(), &[]);

        let nested = if self.model.resolve(&property_type).is_some() {
            self.resolve_nested(&property_type, path, depth + 1)?
        } else {
            Vec::new()
        };

        let backing_field = property.backing_field_name();
        let backing_field = self
            .model
            .find_field(property.declaring_type, &backing_field)
            .map(|_| backing_field);

        let generic_context = match owner {
            TypeSignature::GenericInst(base, args) => base.token().map(|definition| {
                GenericContext {
                    definition,
                    arguments: args.clone(),
                }
            }),
            _ => None,
        };

        Ok(Some(PropertyInjectionDescriptor {
            property: property.token,
            name: property.name.clone(),
            declaring_type: owner.clone(),
            property_type,
            strategy,
            backing_field,
            is_required: property.is_required,
            data_source,
            nested,
            generic_context,
            location: property.location.clone(),
        }))
    }

    fn marker(&self, property: &PropertySymbol) -> Option<DataSourceMarker> {
        property
            .attributes
            .iter()
            .find_map(|attribute| match self.classifier.classify(attribute) {
                Some(AttributeFamily::DataSource(marker)) => Some(marker),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ProgramBuilder, PropertyBuilder},
        test::attributes,
    };
    use strum::IntoEnumIterator;

    fn shape(setter: Option<Accessibility>, init_only: bool, backing_field: bool) -> PropertyShape {
        PropertyShape {
            setter,
            init_only,
            backing_field,
        }
    }

    #[test]
    fn test_strategy_rules() {
        assert_eq!(
            choose_strategy(shape(None, false, true)),
            InjectionStrategy::Unsupported
        );
        assert_eq!(
            choose_strategy(shape(Some(Accessibility::Public), true, false)),
            InjectionStrategy::InitOnlyAccessor
        );
        assert_eq!(
            choose_strategy(shape(Some(Accessibility::Private), true, true)),
            InjectionStrategy::InitOnlyAccessor
        );
        assert_eq!(
            choose_strategy(shape(Some(Accessibility::Public), false, true)),
            InjectionStrategy::DirectSetter
        );
        assert_eq!(
            choose_strategy(shape(Some(Accessibility::Private), false, true)),
            InjectionStrategy::BackingFieldAccess
        );
        assert_eq!(
            choose_strategy(shape(Some(Accessibility::Internal), false, false)),
            InjectionStrategy::ReflectionFallback
        );
    }

    #[test]
    fn test_strategy_is_pure() {
        let setters = [
            None,
            Some(Accessibility::Public),
            Some(Accessibility::Internal),
            Some(Accessibility::Private),
        ];
        for setter in setters {
            for init_only in [false, true] {
                for backing_field in [false, true] {
                    let input = shape(setter, init_only, backing_field);
                    assert_eq!(choose_strategy(input), choose_strategy(input));
                }
            }
        }
        assert_eq!(InjectionStrategy::iter().count(), 5);
        assert!(InjectionStrategy::ReflectionFallback.needs_reflection());
    }

    #[test]
    fn test_shape_from_model() {
        let program = ProgramBuilder::new("Demo.Tests");
        let fixture = program
            .class("Demo", "Fixture")
            .property(
                PropertyBuilder::new("Auto", TypeSignature::String)
                    .setter(Accessibility::Private)
                    .auto(),
            )
            .property(
                PropertyBuilder::new("Manual", TypeSignature::String)
                    .setter(Accessibility::Private),
            )
            .build()
            .unwrap();
        let model = program.finish();

        let auto = model.find_property(fixture, "Auto").unwrap();
        assert_eq!(
            choose_strategy(PropertyShape::of(&model, &auto)),
            InjectionStrategy::BackingFieldAccess
        );
        let manual = model.find_property(fixture, "Manual").unwrap();
        assert_eq!(
            choose_strategy(PropertyShape::of(&model, &manual)),
            InjectionStrategy::ReflectionFallback
        );
    }

    #[test]
    fn test_resolve_with_nested() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let database = program.class("Demo", "Database").build().unwrap();
        let server = program
            .class("Demo", "Server")
            .property(
                PropertyBuilder::new("Database", TypeSignature::Class(database))
                    .setter(Accessibility::Public)
                    .attribute(attrs.class_data_source(vec![TypeSignature::Class(database)])),
            )
            .build()
            .unwrap();
        let fixture = program
            .class("Demo", "Fixture")
            .property(
                PropertyBuilder::new("Server", TypeSignature::Class(server))
                    .init(Accessibility::Public)
                    .auto()
                    .required()
                    .attribute(attrs.class_data_source(vec![TypeSignature::Class(server)])),
            )
            .property(
                PropertyBuilder::new("Plain", TypeSignature::I4).setter(Accessibility::Public),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let resolver =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);

        let declaring = TypeSignature::Class(fixture);
        assert!(resolver.has_injectable_properties(&declaring));
        let injections = resolver.resolve(&declaring).unwrap();
        assert_eq!(injections.len(), 1);
        let server_injection = &injections[0];
        assert_eq!(server_injection.strategy, InjectionStrategy::InitOnlyAccessor);
        assert!(server_injection.is_required);
        assert_eq!(
            server_injection.backing_field.as_deref(),
            Some("<Server>k__BackingField")
        );
        assert_eq!(server_injection.nested.len(), 1);
        assert_eq!(server_injection.nested[0].name, "Database");
        assert_eq!(server_injection.total(), 2);
    }

    #[test]
    fn test_cycle_terminates() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let node = program.class("Demo", "Node");
        let token = node.token();
        node.property(
            PropertyBuilder::new("Next", TypeSignature::Class(token))
                .setter(Accessibility::Public)
                .attribute(attrs.class_data_source(vec![TypeSignature::Class(token)])),
        )
        .build()
        .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let resolver =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);

        let injections = resolver.resolve(&TypeSignature::Class(token)).unwrap();
        assert_eq!(injections.len(), 1);
        assert!(injections[0].nested.is_empty());
    }

    #[test]
    fn test_reflection_policy() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let value = program.class("Demo", "Value").build().unwrap();
        let fixture = program
            .class("Demo", "Fixture")
            .property(
                PropertyBuilder::new("Hidden", TypeSignature::Class(value))
                    .setter(Accessibility::Private)
                    .attribute(attrs.class_data_source(vec![TypeSignature::Class(value)])),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let declaring = TypeSignature::Class(fixture);

        let warn =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);
        let injections = warn.resolve(&declaring).unwrap();
        assert_eq!(injections[0].strategy, InjectionStrategy::ReflectionFallback);

        let deny =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Deny);
        assert!(matches!(
            deny.resolve(&declaring),
            Err(Error::ReflectionDenied { property, .. }) if property == "Hidden"
        ));
    }

    #[test]
    fn test_generic_owner_context() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let value = program.class("Demo", "Value").build().unwrap();
        let base = program
            .class("Demo", "Base")
            .generic_param("T")
            .property(
                PropertyBuilder::new("Item", TypeSignature::Class(value))
                    .init(Accessibility::Public)
                    .auto()
                    .attribute(attrs.class_data_source(vec![TypeSignature::Class(value)])),
            )
            .build()
            .unwrap();
        let closed = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(base)),
            vec![TypeSignature::String],
        );
        let derived = program
            .class("Demo", "Derived")
            .extends(closed.clone())
            .build()
            .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let resolver =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);

        let injections = resolver.resolve(&TypeSignature::Class(derived)).unwrap();
        assert_eq!(injections.len(), 1);
        assert_eq!(injections[0].declaring_type, closed);
        assert_eq!(
            injections[0].generic_context,
            Some(GenericContext {
                definition: base,
                arguments: vec![TypeSignature::String],
            })
        );
    }
}
