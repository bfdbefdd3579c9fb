//! The program model.
//!
//! [`ProgramModel`] is the generator's view of the compilation being processed: every type,
//! method, property and field, the assembly friendship graph and the recorded framework call
//! sites. It answers the structural questions all analysis passes rely on, such as "what are
//! this type's ancestors" or "which `IEnumerable<T>` does this type implement".
//!
//! # Architecture
//!
//! Storage follows a registry layout:
//! - Lock-free primary storage per symbol kind (`SkipMap` keyed by [`Token`])
//! - Concurrent secondary indices (`DashMap`) for full-name lookup and friend assemblies
//! - A lock-free append-only list (`boxcar::Vec`) for invocation sites
//!
//! All queries take `&self`. The model is populated through
//! [`crate::model::ProgramBuilder`] and is read-only afterwards, which is what allows the
//! synthesizer to process candidates on many threads at once.
//!
//! # Base chain walks
//!
//! [`ProgramModel::base_chain`] walks ancestors with an explicit worklist, substituting the
//! generic arguments of each instantiation into the next base type, so
//! `class Derived : Base<int>` yields `Base<int>` and not the open `Base<T>`.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicU32, Ordering},
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::model::{
    FieldRc, FieldSymbol, GenericParam, InvocationSite, MethodRc, MethodSymbol, PropertyRc,
    PropertySymbol, Token, TypeRc, TypeSignature, TypeSymbol, WellKnown,
};

/// Upper bound for ancestor walks; guards against cyclic base declarations
const MAX_CHAIN_LENGTH: usize = 64;

/// How type names are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeNameStyle {
    /// Stable identity text: `Demo.Outer.Inner<System.Int32>`
    Identity,
    /// C# source text: `global::Demo.Outer.Inner<int>`
    Code,
}

/// The symbols of one compilation plus everything it references
pub struct ProgramModel {
    assembly: String,
    types: SkipMap<Token, TypeRc>,
    methods: SkipMap<Token, MethodRc>,
    properties: SkipMap<Token, PropertyRc>,
    fields: SkipMap<Token, FieldRc>,
    types_by_fullname: DashMap<String, Token>,
    friends: DashMap<String, HashSet<String>>,
    invocations: boxcar::Vec<InvocationSite>,
    next_type: AtomicU32,
    next_method: AtomicU32,
    next_property: AtomicU32,
    next_field: AtomicU32,
    well_known: WellKnown,
}

impl ProgramModel {
    /// Creates a model for the assembly `assembly` containing only the well-known types
    #[must_use]
    pub fn new(assembly: &str) -> Self {
        let mut model = ProgramModel {
            assembly: assembly.to_string(),
            types: SkipMap::new(),
            methods: SkipMap::new(),
            properties: SkipMap::new(),
            fields: SkipMap::new(),
            types_by_fullname: DashMap::new(),
            friends: DashMap::new(),
            invocations: boxcar::Vec::new(),
            next_type: AtomicU32::new(1),
            next_method: AtomicU32::new(1),
            next_property: AtomicU32::new(1),
            next_field: AtomicU32::new(1),
            well_known: WellKnown::default(),
        };
        model.well_known = WellKnown::register(&model);
        model
    }

    /// Name of the assembly the generated code is compiled into
    #[must_use]
    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    /// Tokens of the well-known system and framework types
    #[must_use]
    pub fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    pub(crate) fn next_type_token(&self) -> Token {
        Token::from_parts(
            Token::TYPE_DEF,
            self.next_type.fetch_add(1, Ordering::Relaxed),
        )
    }

    pub(crate) fn next_method_token(&self) -> Token {
        Token::from_parts(Token::METHOD, self.next_method.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn next_property_token(&self) -> Token {
        Token::from_parts(
            Token::PROPERTY,
            self.next_property.fetch_add(1, Ordering::Relaxed),
        )
    }

    pub(crate) fn next_field_token(&self) -> Token {
        Token::from_parts(Token::FIELD, self.next_field.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert_type(&self, symbol: TypeSymbol) {
        let full_name = self.metadata_full_name(&symbol);
        self.types_by_fullname.insert(full_name, symbol.token);
        self.types.insert(symbol.token, TypeRc::new(symbol));
    }

    pub(crate) fn insert_method(&self, symbol: MethodSymbol) {
        self.methods.insert(symbol.token, MethodRc::new(symbol));
    }

    pub(crate) fn insert_property(&self, symbol: PropertySymbol) {
        self.properties.insert(symbol.token, PropertyRc::new(symbol));
    }

    pub(crate) fn insert_field(&self, symbol: FieldSymbol) {
        self.fields.insert(symbol.token, FieldRc::new(symbol));
    }

    /// Grants `grantee` access to the internals of `grantor` (`InternalsVisibleTo`)
    pub fn add_friend(&self, grantor: &str, grantee: &str) {
        self.friends
            .entry(grantor.to_string())
            .or_default()
            .insert(grantee.to_string());
    }

    /// Returns true if code in `consumer` may use internal symbols of `owner`
    #[must_use]
    pub fn grants_internals(&self, owner: &str, consumer: &str) -> bool {
        owner == consumer
            || self
                .friends
                .get(owner)
                .is_some_and(|grantees| grantees.contains(consumer))
    }

    /// Records a framework call site found in a method body
    pub fn record_invocation(&self, site: InvocationSite) {
        self.invocations.push(site);
    }

    /// Returns all recorded call sites
    pub fn invocations(&self) -> impl Iterator<Item = &InvocationSite> {
        self.invocations.iter().map(|(_, site)| site)
    }

    /// Looks up a type by token
    #[must_use]
    pub fn get_type(&self, token: Token) -> Option<TypeRc> {
        self.types.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a method by token
    #[must_use]
    pub fn get_method(&self, token: Token) -> Option<MethodRc> {
        self.methods.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a property by token
    #[must_use]
    pub fn get_property(&self, token: Token) -> Option<PropertyRc> {
        self.properties.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a field by token
    #[must_use]
    pub fn get_field(&self, token: Token) -> Option<FieldRc> {
        self.fields.get(&token).map(|entry| entry.value().clone())
    }

    /// Looks up a type by metadata full name, e.g. ``System.Collections.Generic.List`1``
    #[must_use]
    pub fn type_by_fullname(&self, full_name: &str) -> Option<TypeRc> {
        let token = *self.types_by_fullname.get(full_name)?;
        self.get_type(token)
    }

    /// Returns the type a signature refers to
    #[must_use]
    pub fn resolve(&self, sig: &TypeSignature) -> Option<TypeRc> {
        sig.token().and_then(|token| self.get_type(token))
    }

    /// Returns all types, ordered by token
    #[must_use]
    pub fn types(&self) -> Vec<TypeRc> {
        self.types.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Returns all types defined in `assembly`, ordered by token
    #[must_use]
    pub fn types_in_assembly(&self, assembly: &str) -> Vec<TypeRc> {
        self.types
            .iter()
            .filter(|entry| entry.value().assembly == assembly)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Returns the methods declared by `owner` in declaration order
    #[must_use]
    pub fn methods_of(&self, owner: &TypeSymbol) -> Vec<MethodRc> {
        owner
            .methods
            .iter()
            .filter_map(|token| self.get_method(*token))
            .collect()
    }

    /// Returns the properties declared by `owner` in declaration order
    #[must_use]
    pub fn properties_of(&self, owner: &TypeSymbol) -> Vec<PropertyRc> {
        owner
            .properties
            .iter()
            .filter_map(|token| self.get_property(*token))
            .collect()
    }

    /// Returns the fields declared by `owner` in declaration order
    #[must_use]
    pub fn fields_of(&self, owner: &TypeSymbol) -> Vec<FieldRc> {
        owner
            .fields
            .iter()
            .filter_map(|token| self.get_field(*token))
            .collect()
    }

    /// Returns the instance constructors declared by `owner`
    #[must_use]
    pub fn constructors_of(&self, owner: &TypeSymbol) -> Vec<MethodRc> {
        self.methods_of(owner)
            .into_iter()
            .filter(|method| method.is_constructor())
            .collect()
    }

    /// Returns the methods named `name` declared by `owner`
    #[must_use]
    pub fn find_methods(&self, owner: Token, name: &str) -> Vec<MethodRc> {
        self.get_type(owner)
            .map(|symbol| {
                self.methods_of(&symbol)
                    .into_iter()
                    .filter(|method| method.name == name)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the first method named `name` declared by `owner`
    #[must_use]
    pub fn find_method(&self, owner: Token, name: &str) -> Option<MethodRc> {
        self.find_methods(owner, name).into_iter().next()
    }

    /// Returns the property named `name` declared by `owner`
    #[must_use]
    pub fn find_property(&self, owner: Token, name: &str) -> Option<PropertyRc> {
        let symbol = self.get_type(owner)?;
        self.properties_of(&symbol)
            .into_iter()
            .find(|property| property.name == name)
    }

    /// Returns the field named `name` declared by `owner`
    #[must_use]
    pub fn find_field(&self, owner: Token, name: &str) -> Option<FieldRc> {
        let symbol = self.get_type(owner)?;
        self.fields_of(&symbol)
            .into_iter()
            .find(|field| field.name == name)
    }

    /// Returns the ancestors of `sig`, nearest first, with generic arguments substituted.
    ///
    /// The signature itself is not part of the result. Unresolvable base types end the walk.
    #[must_use]
    pub fn base_chain(&self, sig: &TypeSignature) -> Vec<TypeSignature> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = sig.clone();

        while chain.len() < MAX_CHAIN_LENGTH {
            let Some(symbol) = self.resolve(&current) else {
                break;
            };
            if !seen.insert(symbol.token) {
                break;
            }
            let Some(base) = &symbol.base_type else {
                break;
            };

            let next = base.substitute(current.generic_arguments(), &[]);
            chain.push(next.clone());
            current = next;
        }

        chain
    }

    /// Returns `sig` followed by its ancestors, nearest first
    #[must_use]
    pub fn lineage(&self, sig: &TypeSignature) -> Vec<TypeSignature> {
        let mut lineage = vec![sig.clone()];
        lineage.extend(self.base_chain(sig));
        lineage
    }

    /// Returns true if `sig` is `target` or derives from it
    #[must_use]
    pub fn inherits_from(&self, sig: &TypeSignature, target: Token) -> bool {
        self.lineage(sig)
            .iter()
            .any(|ancestor| ancestor.token() == Some(target))
    }

    /// Returns all interfaces implemented by `sig` or its ancestors, transitively, with
    /// generic arguments substituted
    #[must_use]
    pub fn all_interfaces(&self, sig: &TypeSignature) -> Vec<TypeSignature> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut worklist: Vec<TypeSignature> = Vec::new();

        for ancestor in self.lineage(sig) {
            if let Some(symbol) = self.resolve(&ancestor) {
                for interface in &symbol.interfaces {
                    worklist.push(interface.substitute(ancestor.generic_arguments(), &[]));
                }
            }
        }

        while let Some(interface) = worklist.pop() {
            if !seen.insert(interface.clone()) {
                continue;
            }
            if let Some(symbol) = self.resolve(&interface) {
                for inherited in &symbol.interfaces {
                    worklist.push(inherited.substitute(interface.generic_arguments(), &[]));
                }
            }
            result.push(interface);
        }

        result
    }

    /// Finds the instantiation of the interface (or class) `definition` that `sig` is, derives
    /// from or implements.
    ///
    /// For `List<int>` and `IEnumerable<T>` this returns `IEnumerable<int>`. Single
    /// dimensional arrays implement `IEnumerable<T>` of their element type.
    #[must_use]
    pub fn find_implementation(
        &self,
        sig: &TypeSignature,
        definition: Token,
    ) -> Option<TypeSignature> {
        if let TypeSignature::SzArray(element) = sig {
            if definition == self.well_known.enumerable_1 {
                return Some(TypeSignature::GenericInst(
                    Box::new(TypeSignature::Class(definition)),
                    vec![(**element).clone()],
                ));
            }
            return None;
        }

        self.lineage(sig)
            .into_iter()
            .chain(self.all_interfaces(sig))
            .find(|candidate| candidate.token() == Some(definition))
    }

    /// Returns true if `sig` is an instantiation of `definition`
    #[must_use]
    pub fn is_instance_of(&self, sig: &TypeSignature, definition: Token) -> bool {
        matches!(sig, TypeSignature::GenericInst(..)) && sig.token() == Some(definition)
    }

    /// Returns the generic parameters declared by a type
    #[must_use]
    pub fn generic_params_of(&self, token: Token) -> Vec<GenericParam> {
        self.get_type(token)
            .map(|symbol| symbol.generic_params.clone())
            .unwrap_or_default()
    }

    /// Returns the metadata full name (`Namespace.Outer+Inner`1`) of a type symbol
    #[must_use]
    pub fn metadata_full_name(&self, symbol: &TypeSymbol) -> String {
        match symbol.declaring_type.and_then(|outer| self.get_type(outer)) {
            Some(outer) => format!(
                "{}+{}",
                self.metadata_full_name(&outer),
                symbol.metadata_name()
            ),
            None if symbol.namespace.is_empty() => symbol.metadata_name(),
            None => format!("{}.{}", symbol.namespace, symbol.metadata_name()),
        }
    }

    /// Returns the dotted full name of a type symbol without arity: `Namespace.Outer.Inner`
    #[must_use]
    pub fn full_name(&self, symbol: &TypeSymbol) -> String {
        match symbol.declaring_type.and_then(|outer| self.get_type(outer)) {
            Some(outer) => format!("{}.{}", self.full_name(&outer), symbol.name),
            None if symbol.namespace.is_empty() => symbol.name.clone(),
            None => format!("{}.{}", symbol.namespace, symbol.name),
        }
    }

    /// Renders a signature as text
    #[must_use]
    pub fn type_name(&self, sig: &TypeSignature, style: TypeNameStyle) -> String {
        self.type_name_in(sig, style, &[], &[])
    }

    /// Renders a signature as text, naming open type parameters after the given declarations
    #[must_use]
    pub fn type_name_in(
        &self,
        sig: &TypeSignature,
        style: TypeNameStyle,
        type_params: &[GenericParam],
        method_params: &[GenericParam],
    ) -> String {
        let recurse =
            |inner: &TypeSignature| self.type_name_in(inner, style, type_params, method_params);
        let separator = match style {
            TypeNameStyle::Identity => ",",
            TypeNameStyle::Code => ", ",
        };

        match sig {
            TypeSignature::Unknown => "?".to_string(),
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
                self.definition_name(*token, style)
            }
            TypeSignature::GenericInst(base, args) => {
                let base_name = recurse(base);
                let args: Vec<String> = args.iter().map(recurse).collect();
                format!("{}<{}>", base_name, args.join(separator))
            }
            TypeSignature::GenericParamType(index) => type_params
                .get(*index as usize)
                .map(|param| param.name.clone())
                .unwrap_or_else(|| format!("T{index}")),
            TypeSignature::GenericParamMethod(index) => method_params
                .get(*index as usize)
                .map(|param| param.name.clone())
                .unwrap_or_else(|| format!("TM{index}")),
            TypeSignature::SzArray(element) => format!("{}[]", recurse(element)),
            TypeSignature::Array { base, rank } => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                format!("{}[{}]", recurse(base), commas)
            }
            TypeSignature::Ptr(inner) => format!("{}*", recurse(inner)),
            TypeSignature::ByRef(inner) => format!("{}&", recurse(inner)),
            TypeSignature::FnPtr(ret, params) => {
                let mut parts: Vec<String> = params.iter().map(recurse).collect();
                parts.push(recurse(ret));
                format!("delegate*<{}>", parts.join(separator))
            }
            TypeSignature::TypedByRef => match style {
                TypeNameStyle::Identity => "System.TypedReference".to_string(),
                TypeNameStyle::Code => "global::System.TypedReference".to_string(),
            },
            primitive => match style {
                TypeNameStyle::Identity => primitive.system_name().unwrap_or("?").to_string(),
                TypeNameStyle::Code => primitive.keyword().unwrap_or("?").to_string(),
            },
        }
    }

    fn definition_name(&self, token: Token, style: TypeNameStyle) -> String {
        match (self.get_type(token), style) {
            (Some(symbol), TypeNameStyle::Identity) => self.full_name(&symbol),
            (Some(symbol), TypeNameStyle::Code) => format!("global::{}", self.full_name(&symbol)),
            (None, _) => format!("<unresolved {token}>"),
        }
    }
}

impl std::fmt::Debug for ProgramModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramModel")
            .field("assembly", &self.assembly)
            .field("types", &self.types.len())
            .field("methods", &self.methods.len())
            .field("properties", &self.properties.len())
            .field("fields", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProgramBuilder, TypeModifiers};

    #[test]
    fn test_well_known_registered() {
        let model = ProgramModel::new("Demo.Tests");
        let wk = model.well_known();
        let task = model.get_type(wk.task_1).unwrap();
        assert_eq!(task.metadata_name(), "Task`1");
        assert_eq!(
            model
                .type_by_fullname("System.Collections.Generic.IEnumerable`1")
                .map(|t| t.token),
            Some(wk.enumerable_1)
        );
        assert_eq!(wk.value_tuple_arity(wk.value_tuples[7]), Some(8));
    }

    #[test]
    fn test_base_chain_substitutes_arguments() {
        let program = ProgramBuilder::new("Demo.Tests");
        let root = program
            .class("Demo", "Root")
            .generic_param("TRoot")
            .modifiers(TypeModifiers::ABSTRACT)
            .build()
            .unwrap();
        let middle = program
            .class("Demo", "Middle")
            .generic_param("T")
            .extends(TypeSignature::GenericInst(
                Box::new(TypeSignature::Class(root)),
                vec![TypeSignature::SzArray(Box::new(TypeSignature::GenericParamType(0)))],
            ))
            .build()
            .unwrap();
        let leaf = program
            .class("Demo", "Leaf")
            .extends(TypeSignature::GenericInst(
                Box::new(TypeSignature::Class(middle)),
                vec![TypeSignature::String],
            ))
            .build()
            .unwrap();
        let model = program.finish();

        let chain = model.base_chain(&TypeSignature::Class(leaf));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].generic_arguments(), &[TypeSignature::String]);
        assert_eq!(
            chain[1].generic_arguments(),
            &[TypeSignature::SzArray(Box::new(TypeSignature::String))]
        );
        assert!(model.inherits_from(&TypeSignature::Class(leaf), root));
    }

    #[test]
    fn test_find_implementation() {
        let program = ProgramBuilder::new("Demo.Tests");
        let list_of_int = program.list_of(TypeSignature::I4);
        let model = program.finish();
        let wk = model.well_known();

        let found = model.find_implementation(&list_of_int, wk.enumerable_1).unwrap();
        assert_eq!(found.generic_arguments(), &[TypeSignature::I4]);

        let array = TypeSignature::SzArray(Box::new(TypeSignature::String));
        let found = model.find_implementation(&array, wk.enumerable_1).unwrap();
        assert_eq!(found.generic_arguments(), &[TypeSignature::String]);

        assert!(model
            .find_implementation(&TypeSignature::I4, wk.enumerable_1)
            .is_none());
    }

    #[test]
    fn test_type_names() {
        let program = ProgramBuilder::new("Demo.Tests");
        let outer = program.class("Demo", "Outer").build().unwrap();
        let inner = program
            .class("Demo", "Inner")
            .nested_in(outer)
            .generic_param("TKey")
            .generic_param("TValue")
            .build()
            .unwrap();
        let model = program.finish();

        let sig = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(inner)),
            vec![TypeSignature::I4, TypeSignature::String],
        );
        assert_eq!(
            model.type_name(&sig, TypeNameStyle::Identity),
            "Demo.Outer.Inner<System.Int32,System.String>"
        );
        assert_eq!(
            model.type_name(&sig, TypeNameStyle::Code),
            "global::Demo.Outer.Inner<int, string>"
        );
        let symbol = model.get_type(inner).unwrap();
        assert_eq!(model.metadata_full_name(&symbol), "Demo.Outer+Inner`2");
    }

    #[test]
    fn test_friend_assemblies() {
        let model = ProgramModel::new("Demo.Tests");
        assert!(model.grants_internals("Demo", "Demo"));
        assert!(!model.grants_internals("Demo", "Demo.Tests"));
        model.add_friend("Demo", "Demo.Tests");
        assert!(model.grants_internals("Demo", "Demo.Tests"));
        assert!(!model.grants_internals("Demo.Tests", "Demo"));
    }
}
