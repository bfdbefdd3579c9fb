//! Hook resolution.
//!
//! Hooks are setup and teardown methods marked with `[Before(..)]`, `[After(..)]`,
//! `[BeforeEvery(..)]` or `[AfterEvery(..)]`. For a test class, [`HookResolver::resolve`]
//! produces a [`HookBundle`] with four ordered lists merged across the whole base chain:
//!
//! 1. the chain is walked from the class towards the root, then reversed so base classes come
//!    first
//! 2. hooks are bucketed by scope and timing in declaration order
//! 3. each bucket is stably sorted by the declared `Order`
//!
//! Equal orders therefore keep base-before-derived and then declaration order. When the class
//! has injectable properties, a synthetic injection hook with order [`PROPERTY_INJECTION_ORDER`]
//! leads the before-test list.
//!
//! Assembly, session and discovery hooks, and every "Every" hook, are not attached to a class;
//! [`HookResolver::collect_global`] gathers them into a [`GlobalHookSet`] that is registered in
//! addition to the per-class bundles.
//!
//! A marked method with a signature generated code cannot call is excluded without a
//! diagnostic.

use std::{fmt, sync::Arc};

use tracing::debug;

use crate::{
    analysis::{
        access::Generatability,
        classify::{AttributeClassifier, AttributeFamily, HookMarker, HookScope, HookTiming},
    },
    model::{
        Accessibility, Location, MethodSymbol, ProgramModel, Token, TypeNameStyle, TypeRc,
        TypeSignature,
    },
};

/// Order of the synthetic property injection hook; runs before any declared hook
pub const PROPERTY_INJECTION_ORDER: i32 = i32::MIN;

/// What a hook returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSynchronicity {
    /// `void`
    Void,
    /// `Task`
    Task,
    /// `ValueTask`
    ValueTask,
}

/// How a hook is called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookBinding {
    /// On the test instance
    Instance,
    /// Without an instance
    Static,
}

/// Parameters a hook accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookParameters {
    /// `()`
    None,
    /// `(CancellationToken)`
    CancellationToken,
    /// `(Context)`
    Context,
    /// `(Context, CancellationToken)`
    ContextAndCancellation,
}

impl HookParameters {
    /// Returns true if the scope context is passed
    #[must_use]
    pub fn takes_context(&self) -> bool {
        matches!(
            self,
            HookParameters::Context | HookParameters::ContextAndCancellation
        )
    }

    /// Returns true if a cancellation token is passed
    #[must_use]
    pub fn takes_cancellation(&self) -> bool {
        matches!(
            self,
            HookParameters::CancellationToken | HookParameters::ContextAndCancellation
        )
    }
}

/// What runs when the hook fires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// A user declared hook method
    Method(Token),
    /// The synthetic property injection step
    PropertyInjection,
}

/// A validated hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDescriptor {
    /// What runs
    pub kind: HookKind,
    /// Closed type declaring the hook
    pub owner: TypeSignature,
    /// Stable name, `Namespace.Type.Method`
    pub name: String,
    /// Method name
    pub method_name: String,
    /// Scope
    pub scope: HookScope,
    /// Setup or teardown
    pub timing: HookTiming,
    /// Global "Every" hook
    pub every: bool,
    /// Declared order
    pub order: i32,
    /// Position of the method within its declaring type
    pub declaration_index: usize,
    /// Return shape
    pub synchronicity: HookSynchronicity,
    /// Call binding
    pub binding: HookBinding,
    /// Accepted parameters
    pub parameters: HookParameters,
    /// Declaration site
    pub location: Option<Location>,
}

impl HookDescriptor {
    /// Returns true if the hook must be awaited
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.synchronicity != HookSynchronicity::Void
    }

    /// The synthetic property injection hook for `owner`
    #[must_use]
    pub fn property_injection(owner: TypeSignature, owner_name: &str) -> Self {
        HookDescriptor {
            kind: HookKind::PropertyInjection,
            owner,
            name: format!("{owner_name}.<InjectProperties>"),
            method_name: "<InjectProperties>".to_string(),
            scope: HookScope::Test,
            timing: HookTiming::Before,
            every: false,
            order: PROPERTY_INJECTION_ORDER,
            declaration_index: 0,
            synchronicity: HookSynchronicity::Task,
            binding: HookBinding::Instance,
            parameters: HookParameters::ContextAndCancellation,
            location: None,
        }
    }
}

impl fmt::Display for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timing = match self.timing {
            HookTiming::Before => "Before",
            HookTiming::After => "After",
        };
        let every = if self.every { "Every" } else { "" };
        write!(
            f,
            "{}{}({}) {} [order {}]",
            timing,
            every,
            self.scope.as_str(),
            self.name,
            self.order
        )
    }
}

/// Per-class hooks, each list in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookBundle {
    /// Before the first test of the class
    pub before_class: Vec<Arc<HookDescriptor>>,
    /// Before every test of the class
    pub before_test: Vec<Arc<HookDescriptor>>,
    /// After every test of the class
    pub after_test: Vec<Arc<HookDescriptor>>,
    /// After the last test of the class
    pub after_class: Vec<Arc<HookDescriptor>>,
}

impl HookBundle {
    /// Total number of hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.before_class.len()
            + self.before_test.len()
            + self.after_test.len()
            + self.after_class.len()
    }

    /// Returns true if no hook applies
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all hooks, list by list
    pub fn iter(&self) -> impl Iterator<Item = &Arc<HookDescriptor>> {
        self.before_class
            .iter()
            .chain(&self.before_test)
            .chain(&self.after_test)
            .chain(&self.after_class)
    }
}

/// Hooks not attached to a single class
#[derive(Debug, Clone, Default)]
pub struct GlobalHookSet {
    hooks: Vec<Arc<HookDescriptor>>,
}

impl GlobalHookSet {
    /// Hooks of one scope and timing, `every` selecting the "Every" variants, in execution
    /// order
    #[must_use]
    pub fn select(
        &self,
        scope: HookScope,
        timing: HookTiming,
        every: bool,
    ) -> Vec<Arc<HookDescriptor>> {
        self.hooks
            .iter()
            .filter(|hook| hook.scope == scope && hook.timing == timing && hook.every == every)
            .cloned()
            .collect()
    }

    /// All global hooks
    #[must_use]
    pub fn all(&self) -> &[Arc<HookDescriptor>] {
        &self.hooks
    }

    /// Number of global hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns true if there are no global hooks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

/// Discovers and validates hooks
pub struct HookResolver<'a> {
    model: &'a ProgramModel,
    classifier: AttributeClassifier<'a>,
    access: Generatability<'a>,
}

impl<'a> HookResolver<'a> {
    /// Creates a resolver for code emitted into `assembly`
    #[must_use]
    pub fn new(model: &'a ProgramModel, assembly: &'a str) -> Self {
        HookResolver {
            model,
            classifier: AttributeClassifier::new(model),
            access: Generatability::new(model, assembly),
        }
    }

    /// Returns the hook marker of a method, if any
    #[must_use]
    pub fn marker(&self, method: &MethodSymbol) -> Option<HookMarker> {
        method
            .attributes
            .iter()
            .find_map(|attribute| match self.classifier.classify(attribute) {
                Some(AttributeFamily::Hook(marker)) => Some(marker),
                _ => None,
            })
    }

    /// Validates a marked method declared on the closed type `owner`.
    ///
    /// Returns `None` for unmarked methods and for hooks whose signature or binding cannot be
    /// called from generated code.
    #[must_use]
    pub fn descriptor(
        &self,
        method: &MethodSymbol,
        owner: &TypeSignature,
        declaration_index: usize,
    ) -> Option<HookDescriptor> {
        let marker = self.marker(method)?;
        let owner_name = self.model.type_name(owner, TypeNameStyle::Identity);
        let reject = |reason: &str| {
            debug!(
                target: "hooks",
                hook = %format!("{}.{}", owner_name, method.name),
                reason,
                "excluding hook"
            );
        };

        if method.accessibility != Accessibility::Public {
            reject("not public");
            return None;
        }
        if method.is_generic() || method.is_abstract() || method.is_constructor() {
            reject("not a callable method");
            return None;
        }

        let binding = if marker.scope == HookScope::Test && !marker.every {
            HookBinding::Instance
        } else {
            HookBinding::Static
        };
        if method.is_static() != (binding == HookBinding::Static) {
            reject("wrong static or instance binding");
            return None;
        }

        let Some(synchronicity) = self.synchronicity(&method.return_type) else {
            reject("unsupported return type");
            return None;
        };
        let Some(parameters) = self.parameters(method, &marker) else {
            reject("unsupported parameter list");
            return None;
        };

        Some(HookDescriptor {
            kind: HookKind::Method(method.token),
            owner: owner.clone(),
            name: format!("{}.{}", owner_name, method.name),
            method_name: method.name.clone(),
            scope: marker.scope,
            timing: marker.timing,
            every: marker.every,
            order: marker.order,
            declaration_index,
            synchronicity,
            binding,
            parameters,
            location: method.location.clone(),
        })
    }

    /// Returns the class and test hooks of a test class merged across its base chain.
    ///
    /// `inject_properties` adds the synthetic injection hook in front of the before-test list.
    #[must_use]
    pub fn resolve(&self, declaring: &TypeSignature, inject_properties: bool) -> HookBundle {
        let mut lineage = self.model.lineage(declaring);
        lineage.reverse();

        let mut bundle = HookBundle::default();
        for ancestor in &lineage {
            let Some(symbol) = self.model.resolve(ancestor) else {
                continue;
            };
            for (index, method) in self.model.methods_of(&symbol).iter().enumerate() {
                let Some(hook) = self.descriptor(method, ancestor, index) else {
                    continue;
                };
                if hook.every {
                    continue;
                }
                let bucket = match (hook.scope, hook.timing) {
                    (HookScope::Class, HookTiming::Before) => &mut bundle.before_class,
                    (HookScope::Test, HookTiming::Before) => &mut bundle.before_test,
                    (HookScope::Test, HookTiming::After) => &mut bundle.after_test,
                    (HookScope::Class, HookTiming::After) => &mut bundle.after_class,
                    _ => continue,
                };
                bucket.push(Arc::new(hook));
            }
        }

        for bucket in [
            &mut bundle.before_class,
            &mut bundle.before_test,
            &mut bundle.after_test,
            &mut bundle.after_class,
        ] {
            bucket.sort_by_key(|hook| hook.order);
        }

        if inject_properties {
            let name = self.model.type_name(declaring, TypeNameStyle::Identity);
            bundle.before_test.insert(
                0,
                Arc::new(HookDescriptor::property_injection(declaring.clone(), &name)),
            );
        }

        bundle
    }

    /// Collects assembly, session and discovery hooks and all "Every" hooks of `types`
    #[must_use]
    pub fn collect_global(&self, types: &[TypeRc]) -> GlobalHookSet {
        let mut hooks = Vec::new();

        for symbol in types {
            if symbol.is_generic() {
                continue;
            }
            let owner = symbol.open_signature();
            if !self.access.is_definition_accessible(symbol.token) {
                continue;
            }
            for (index, method) in self.model.methods_of(symbol).iter().enumerate() {
                let Some(hook) = self.descriptor(method, &owner, index) else {
                    continue;
                };
                let global = hook.every
                    || matches!(
                        hook.scope,
                        HookScope::Assembly | HookScope::TestSession | HookScope::TestDiscovery
                    );
                if global {
                    hooks.push(Arc::new(hook));
                }
            }
        }

        hooks.sort_by_key(|hook| hook.order);
        GlobalHookSet { hooks }
    }

    fn synchronicity(&self, return_type: &TypeSignature) -> Option<HookSynchronicity> {
        let wk = self.model.well_known();
        match return_type {
            TypeSignature::Void => Some(HookSynchronicity::Void),
            TypeSignature::Class(token) if *token == wk.task => Some(HookSynchronicity::Task),
            TypeSignature::ValueType(token) if *token == wk.value_task => {
                Some(HookSynchronicity::ValueTask)
            }
            _ => None,
        }
    }

    fn parameters(&self, method: &MethodSymbol, marker: &HookMarker) -> Option<HookParameters> {
        let wk = self.model.well_known();
        let ct = TypeSignature::ValueType(wk.cancellation_token);
        let context = TypeSignature::Class(self.context_type(marker));
        let types: Vec<&TypeSignature> = method
            .parameters
            .iter()
            .map(|param| &param.signature)
            .collect();

        match types.as_slice() {
            [] => Some(HookParameters::None),
            [only] if **only == ct => Some(HookParameters::CancellationToken),
            [only] if **only == context => Some(HookParameters::Context),
            [first, second] if **first == context && **second == ct => {
                Some(HookParameters::ContextAndCancellation)
            }
            _ => None,
        }
    }

    /// Context type passed to hooks of the marker's scope
    #[must_use]
    pub fn context_type(&self, marker: &HookMarker) -> Token {
        let wk = self.model.well_known();
        match (marker.scope, marker.timing) {
            (HookScope::Test, _) => wk.test_context,
            (HookScope::Class, _) => wk.class_hook_context,
            (HookScope::Assembly, _) => wk.assembly_hook_context,
            (HookScope::TestSession, _) => wk.test_session_context,
            (HookScope::TestDiscovery, HookTiming::Before) => wk.before_test_discovery_context,
            (HookScope::TestDiscovery, HookTiming::After) => wk.test_discovery_context,
        }
    }
}
