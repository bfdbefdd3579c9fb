//! Builders for populating a [`ProgramModel`].
//!
//! This module provides [`ProgramBuilder`] and the fluent [`TypeBuilder`], [`MethodBuilder`],
//! [`PropertyBuilder`] and [`FieldBuilder`] APIs. A host integration translates its compiler's
//! semantic model through these builders; tests and benchmarks use them to describe fixture
//! programs.
//!
//! # Example
//!
//! ```rust
//! use testscope::model::{AttributeData, MethodBuilder, ProgramBuilder, TypeSignature};
//!
//! let program = ProgramBuilder::new("Demo.Tests");
//! let test = program.well_known().test;
//! let fixture = program
//!     .class("Demo", "CalculatorTests")
//!     .method(
//!         MethodBuilder::new("Adds")
//!             .returns(TypeSignature::Void)
//!             .attribute(AttributeData::new(test)),
//!     )
//!     .build()?;
//! let model = program.finish();
//! assert!(model.find_method(fixture, "Adds").is_some());
//! # Ok::<(), testscope::Error>(())
//! ```

use std::sync::Arc;

use crate::{
    model::{
        Accessibility, AttributeData, FieldSymbol, GenericConstraint, GenericParam,
        InvocationSite, Location, MethodModifiers, MethodSymbol, ParameterSymbol, ProgramModel,
        PropertySymbol, SetterSymbol, Token, TypeModifiers, TypeSignature, TypeSymbol,
        WellKnown,
    },
    Error, Result,
};

/// Entry point for describing a program
pub struct ProgramBuilder {
    model: ProgramModel,
}

impl ProgramBuilder {
    /// Creates a builder for the emitting assembly `assembly`
    #[must_use]
    pub fn new(assembly: &str) -> Self {
        ProgramBuilder {
            model: ProgramModel::new(assembly),
        }
    }

    /// Returns the tokens of the well-known types
    #[must_use]
    pub fn well_known(&self) -> &WellKnown {
        self.model.well_known()
    }

    /// Returns the model under construction
    #[must_use]
    pub fn model(&self) -> &ProgramModel {
        &self.model
    }

    /// Starts a public class declaration in the emitting assembly
    #[must_use]
    pub fn class(&self, namespace: &str, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(&self.model, namespace, name)
    }

    /// Starts a public struct declaration in the emitting assembly
    #[must_use]
    pub fn value_type(&self, namespace: &str, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(&self.model, namespace, name)
            .modifiers(TypeModifiers::VALUE_TYPE | TypeModifiers::SEALED)
    }

    /// Starts a public interface declaration in the emitting assembly
    #[must_use]
    pub fn interface(&self, namespace: &str, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(&self.model, namespace, name)
            .modifiers(TypeModifiers::INTERFACE | TypeModifiers::ABSTRACT)
    }

    /// Starts a public attribute class deriving from `base` (or `System.Attribute`)
    #[must_use]
    pub fn attribute_class(
        &self,
        namespace: &str,
        name: &str,
        base: Option<TypeSignature>,
    ) -> TypeBuilder<'_> {
        let base =
            base.unwrap_or_else(|| TypeSignature::Class(self.model.well_known().attribute));
        TypeBuilder::new(&self.model, namespace, name).extends(base)
    }

    /// Declares that `grantor` exposes its internals to `grantee`
    pub fn friend(&self, grantor: &str, grantee: &str) {
        self.model.add_friend(grantor, grantee);
    }

    /// Records a framework call site
    pub fn invocation(&self, site: InvocationSite) {
        self.model.record_invocation(site);
    }

    fn generic(&self, definition: Token, args: Vec<TypeSignature>) -> TypeSignature {
        let base = match self.model.get_type(definition) {
            Some(symbol) if symbol.is_value_type() => TypeSignature::ValueType(definition),
            _ => TypeSignature::Class(definition),
        };
        TypeSignature::GenericInst(Box::new(base), args)
    }

    /// `Task`
    #[must_use]
    pub fn task(&self) -> TypeSignature {
        TypeSignature::Class(self.well_known().task)
    }

    /// `Task<T>`
    #[must_use]
    pub fn task_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().task_1, vec![sig])
    }

    /// `ValueTask`
    #[must_use]
    pub fn value_task(&self) -> TypeSignature {
        TypeSignature::ValueType(self.well_known().value_task)
    }

    /// `ValueTask<T>`
    #[must_use]
    pub fn value_task_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().value_task_1, vec![sig])
    }

    /// `IEnumerable<T>`
    #[must_use]
    pub fn enumerable_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().enumerable_1, vec![sig])
    }

    /// `IAsyncEnumerable<T>`
    #[must_use]
    pub fn async_enumerable_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().async_enumerable_1, vec![sig])
    }

    /// `List<T>`
    #[must_use]
    pub fn list_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().list_1, vec![sig])
    }

    /// `Func<T>`
    #[must_use]
    pub fn func_of(&self, sig: TypeSignature) -> TypeSignature {
        self.generic(self.well_known().func_1, vec![sig])
    }

    /// `CancellationToken`
    #[must_use]
    pub fn cancellation_token(&self) -> TypeSignature {
        TypeSignature::ValueType(self.well_known().cancellation_token)
    }

    /// A `ValueTuple` over `elements`, nesting the remainder into `Rest` beyond seven elements
    #[must_use]
    pub fn tuple(&self, elements: Vec<TypeSignature>) -> TypeSignature {
        let wk = self.well_known();
        if elements.len() <= 7 {
            let arity = elements.len().max(1);
            let token = wk.value_tuple(arity).unwrap_or(wk.value_tuples[0]);
            return TypeSignature::GenericInst(Box::new(TypeSignature::ValueType(token)), elements);
        }

        let mut head = elements;
        let rest = head.split_off(7);
        head.push(self.tuple(rest));
        TypeSignature::GenericInst(Box::new(TypeSignature::ValueType(wk.value_tuples[7])), head)
    }

    /// Finishes building and returns the shareable model
    #[must_use]
    pub fn finish(self) -> Arc<ProgramModel> {
        Arc::new(self.model)
    }
}

/// Fluent builder for a type declaration
///
/// The type token is reserved when the builder is created so members can refer to their own
/// declaring type (see [`TypeBuilder::token`]) before [`TypeBuilder::build`] runs.
pub struct TypeBuilder<'a> {
    model: &'a ProgramModel,
    token: Token,
    namespace: String,
    name: String,
    assembly: String,
    accessibility: Accessibility,
    modifiers: TypeModifiers,
    declaring_type: Option<Token>,
    base_type: Option<TypeSignature>,
    interfaces: Vec<TypeSignature>,
    generic_params: Vec<GenericParam>,
    attributes: Vec<AttributeData>,
    methods: Vec<MethodBuilder>,
    properties: Vec<PropertyBuilder>,
    fields: Vec<FieldBuilder>,
    location: Option<Location>,
}

impl<'a> TypeBuilder<'a> {
    fn new(model: &'a ProgramModel, namespace: &str, name: &str) -> Self {
        TypeBuilder {
            model,
            token: model.next_type_token(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            assembly: model.assembly().to_string(),
            accessibility: Accessibility::Public,
            modifiers: TypeModifiers::empty(),
            declaring_type: None,
            base_type: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            attributes: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            location: None,
        }
    }

    /// Token reserved for this type
    #[must_use]
    pub fn token(&self) -> Token {
        self.token
    }

    /// Sets the declared accessibility
    #[must_use]
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Declares the type `internal`
    #[must_use]
    pub fn internal(self) -> Self {
        self.accessibility(Accessibility::Internal)
    }

    /// Adds declaration modifiers
    #[must_use]
    pub fn modifiers(mut self, modifiers: TypeModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Moves the type into another assembly
    #[must_use]
    pub fn in_assembly(mut self, assembly: &str) -> Self {
        self.assembly = assembly.to_string();
        self
    }

    /// Nests the type inside `outer`
    #[must_use]
    pub fn nested_in(mut self, outer: Token) -> Self {
        self.declaring_type = Some(outer);
        self.namespace.clear();
        self
    }

    /// Sets the base type
    #[must_use]
    pub fn extends(mut self, base: TypeSignature) -> Self {
        self.base_type = Some(base);
        self
    }

    /// Adds an implemented interface
    #[must_use]
    pub fn implements(mut self, interface: TypeSignature) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declares a generic parameter without constraints
    #[must_use]
    pub fn generic_param(self, name: &str) -> Self {
        self.constrained_generic_param(name, Vec::new())
    }

    /// Declares a generic parameter with constraints
    #[must_use]
    pub fn constrained_generic_param(
        mut self,
        name: &str,
        constraints: Vec<GenericConstraint>,
    ) -> Self {
        let index = self.generic_params.len() as u32;
        self.generic_params.push(GenericParam {
            name: name.to_string(),
            index,
            constraints,
        });
        self
    }

    /// Applies an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a method
    #[must_use]
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a property
    #[must_use]
    pub fn property(mut self, property: PropertyBuilder) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a field
    #[must_use]
    pub fn field(mut self, field: FieldBuilder) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the declaration site
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Inserts the type and its members into the model
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if the base type, an interface or the containing type
    /// is not part of the model, and [`Error::DuplicateType`] if a type with the same full
    /// name already exists.
    pub fn build(self) -> Result<Token> {
        for referenced in self.base_type.iter().chain(self.interfaces.iter()) {
            if let Some(token) = referenced.token() {
                if token != self.token && self.model.get_type(token).is_none() {
                    return Err(Error::TypeNotFound(token));
                }
            }
        }
        if let Some(outer) = self.declaring_type {
            if self.model.get_type(outer).is_none() {
                return Err(Error::TypeNotFound(outer));
            }
        }

        let is_interface = self.modifiers.contains(TypeModifiers::INTERFACE);
        let is_static = self.modifiers.contains(TypeModifiers::STATIC);
        let base_type = match self.base_type {
            None if !is_interface && !self.modifiers.contains(TypeModifiers::VALUE_TYPE) => {
                Some(TypeSignature::Object)
            }
            other => other,
        };

        let mut methods = self.methods;
        if !is_interface && !is_static && !methods.iter().any(|m| m.is_constructor()) {
            methods.insert(0, MethodBuilder::constructor());
        }

        let mut fields = self.fields;
        for property in &self.properties {
            if property.backing_field {
                let name = format!("<{}>k__BackingField", property.name);
                fields.push(
                    FieldBuilder::new(&name, property.signature.clone())
                        .with_static(property.is_static),
                );
            }
        }

        let mut symbol = TypeSymbol {
            token: self.token,
            namespace: self.namespace,
            name: self.name,
            assembly: self.assembly,
            accessibility: self.accessibility,
            modifiers: self.modifiers,
            declaring_type: self.declaring_type,
            base_type,
            interfaces: self.interfaces,
            generic_params: self.generic_params,
            attributes: self.attributes,
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            location: self.location,
        };

        let full_name = self.model.metadata_full_name(&symbol);
        if self.model.type_by_fullname(&full_name).is_some() {
            return Err(Error::DuplicateType(full_name));
        }

        symbol.methods = methods
            .into_iter()
            .map(|method| method.insert(self.model, self.token))
            .collect();
        symbol.properties = self
            .properties
            .into_iter()
            .map(|property| property.insert(self.model, self.token))
            .collect();
        symbol.fields = fields
            .into_iter()
            .map(|field| field.insert(self.model, self.token))
            .collect();

        self.model.insert_type(symbol);
        Ok(self.token)
    }
}

/// Fluent builder for a method declaration
#[derive(Debug, Clone)]
pub struct MethodBuilder {
    name: String,
    accessibility: Accessibility,
    modifiers: MethodModifiers,
    return_type: TypeSignature,
    parameters: Vec<ParameterSymbol>,
    generic_params: Vec<GenericParam>,
    attributes: Vec<AttributeData>,
    location: Option<Location>,
}

impl MethodBuilder {
    /// Starts a public instance method returning `void`
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            accessibility: Accessibility::Public,
            modifiers: MethodModifiers::empty(),
            return_type: TypeSignature::Void,
            parameters: Vec::new(),
            generic_params: Vec::new(),
            attributes: Vec::new(),
            location: None,
        }
    }

    /// Starts a public parameterless instance constructor
    #[must_use]
    pub fn constructor() -> Self {
        MethodBuilder::new(".ctor").modifiers(MethodModifiers::CONSTRUCTOR)
    }

    fn is_constructor(&self) -> bool {
        self.modifiers.contains(MethodModifiers::CONSTRUCTOR)
    }

    /// Sets the declared accessibility
    #[must_use]
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Adds declaration modifiers
    #[must_use]
    pub fn modifiers(mut self, modifiers: MethodModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    /// Declares the method `static`
    #[must_use]
    pub fn as_static(self) -> Self {
        self.modifiers(MethodModifiers::STATIC)
    }

    /// Sets the return type
    #[must_use]
    pub fn returns(mut self, sig: TypeSignature) -> Self {
        self.return_type = sig;
        self
    }

    /// Appends a parameter
    #[must_use]
    pub fn param(self, name: &str, sig: TypeSignature) -> Self {
        self.param_with(name, sig, Vec::new())
    }

    /// Appends a parameter carrying attributes
    #[must_use]
    pub fn param_with(
        mut self,
        name: &str,
        sig: TypeSignature,
        attributes: Vec<AttributeData>,
    ) -> Self {
        let index = self.parameters.len();
        self.parameters.push(ParameterSymbol {
            name: name.to_string(),
            index,
            signature: sig,
            attributes,
            has_default: false,
            is_params: false,
        });
        self
    }

    /// Declares a generic parameter
    #[must_use]
    pub fn generic_param(mut self, name: &str) -> Self {
        let index = self.generic_params.len() as u32;
        self.generic_params.push(GenericParam {
            name: name.to_string(),
            index,
            constraints: Vec::new(),
        });
        self
    }

    /// Applies an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the declaration site
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    fn insert(self, model: &ProgramModel, declaring_type: Token) -> Token {
        let token = model.next_method_token();
        model.insert_method(MethodSymbol {
            token,
            declaring_type,
            name: self.name,
            accessibility: self.accessibility,
            modifiers: self.modifiers,
            return_type: self.return_type,
            parameters: self.parameters,
            generic_params: self.generic_params,
            attributes: self.attributes,
            location: self.location,
        });
        token
    }
}

/// Fluent builder for a property declaration
#[derive(Debug, Clone)]
pub struct PropertyBuilder {
    name: String,
    signature: TypeSignature,
    getter: Option<Accessibility>,
    setter: Option<SetterSymbol>,
    is_static: bool,
    is_required: bool,
    backing_field: bool,
    attributes: Vec<AttributeData>,
    location: Option<Location>,
}

impl PropertyBuilder {
    /// Starts a public get-only instance property
    #[must_use]
    pub fn new(name: &str, sig: TypeSignature) -> Self {
        PropertyBuilder {
            name: name.to_string(),
            signature: sig,
            getter: Some(Accessibility::Public),
            setter: None,
            is_static: false,
            is_required: false,
            backing_field: false,
            attributes: Vec::new(),
            location: None,
        }
    }

    /// Adds a `set` accessor with the given accessibility
    #[must_use]
    pub fn setter(mut self, accessibility: Accessibility) -> Self {
        self.setter = Some(SetterSymbol {
            accessibility,
            init_only: false,
        });
        self
    }

    /// Adds an `init` accessor with the given accessibility
    #[must_use]
    pub fn init(mut self, accessibility: Accessibility) -> Self {
        self.setter = Some(SetterSymbol {
            accessibility,
            init_only: true,
        });
        self
    }

    /// Marks the property as an auto-property with a compiler generated backing field
    #[must_use]
    pub fn auto(mut self) -> Self {
        self.backing_field = true;
        self
    }

    /// Declares the property `required`
    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Declares the property `static`
    #[must_use]
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Applies an attribute
    #[must_use]
    pub fn attribute(mut self, attribute: AttributeData) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Sets the declaration site
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    fn insert(self, model: &ProgramModel, declaring_type: Token) -> Token {
        let token = model.next_property_token();
        model.insert_property(PropertySymbol {
            token,
            declaring_type,
            name: self.name,
            signature: self.signature,
            getter: self.getter,
            setter: self.setter,
            is_static: self.is_static,
            is_required: self.is_required,
            attributes: self.attributes,
            location: self.location,
        });
        token
    }
}

/// Fluent builder for a field declaration
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    name: String,
    signature: TypeSignature,
    accessibility: Accessibility,
    is_static: bool,
}

impl FieldBuilder {
    /// Starts a private instance field
    #[must_use]
    pub fn new(name: &str, sig: TypeSignature) -> Self {
        FieldBuilder {
            name: name.to_string(),
            signature: sig,
            accessibility: Accessibility::Private,
            is_static: false,
        }
    }

    /// Sets the declared accessibility
    #[must_use]
    pub fn accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    /// Sets whether the field is static
    #[must_use]
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    fn insert(self, model: &ProgramModel, declaring_type: Token) -> Token {
        let token = model.next_field_token();
        model.insert_field(FieldSymbol {
            token,
            declaring_type,
            name: self.name,
            signature: self.signature,
            accessibility: self.accessibility,
            is_static: self.is_static,
        });
        token
    }
}
