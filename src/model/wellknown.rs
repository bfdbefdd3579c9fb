//! Well-known system and framework types.
//!
//! Every [`crate::model::ProgramModel`] starts out with the handful of base class library
//! types the generator needs to recognise (tasks, sequences, tuples, `Func<T>`,
//! `CancellationToken`, ...) and the test framework's own attribute and context types. They
//! are registered once when the model is created; [`WellKnown`] keeps their tokens so the
//! analysis passes can compare tokens instead of names.

use crate::model::{
    Accessibility, GenericParam, ProgramModel, Token, TypeModifiers, TypeSignature, TypeSymbol,
};

/// Assembly name used for base class library types
pub const SYSTEM_ASSEMBLY: &str = "System.Runtime";
/// Assembly name used for the test framework's runtime types
pub const FRAMEWORK_ASSEMBLY: &str = "Testscope.Core";
/// Namespace of the test framework's runtime types
pub const FRAMEWORK_NAMESPACE: &str = "Testscope.Core";

/// Tokens of the system and framework types every program model contains
#[derive(Debug, Clone, Default)]
pub struct WellKnown {
    /// `System.Attribute`
    pub attribute: Token,
    /// `System.Type`
    pub system_type: Token,
    /// `System.Threading.Tasks.Task`
    pub task: Token,
    /// `System.Threading.Tasks.Task<T>`
    pub task_1: Token,
    /// `System.Threading.Tasks.ValueTask`
    pub value_task: Token,
    /// `System.Threading.Tasks.ValueTask<T>`
    pub value_task_1: Token,
    /// `System.Collections.IEnumerable`
    pub enumerable: Token,
    /// `System.Collections.Generic.IEnumerable<T>`
    pub enumerable_1: Token,
    /// `System.Collections.Generic.IAsyncEnumerable<T>`
    pub async_enumerable_1: Token,
    /// `System.Collections.Generic.List<T>`
    pub list_1: Token,
    /// `System.Func<T>`
    pub func_1: Token,
    /// `System.ValueTuple<T1>` .. `System.ValueTuple<T1, .., T7, TRest>`
    pub value_tuples: [Token; 8],
    /// `System.Threading.CancellationToken`
    pub cancellation_token: Token,
    /// `System.Span<T>`
    pub span_1: Token,
    /// `System.Runtime.CompilerServices.InternalsVisibleToAttribute`
    pub internals_visible_to: Token,

    /// `TestAttribute`
    pub test: Token,
    /// `BeforeAttribute`
    pub before: Token,
    /// `AfterAttribute`
    pub after: Token,
    /// `BeforeEveryAttribute`
    pub before_every: Token,
    /// `AfterEveryAttribute`
    pub after_every: Token,
    /// `HookType` enum
    pub hook_type: Token,
    /// `IDataSourceAttribute`
    pub data_source_interface: Token,
    /// `ArgumentsAttribute`
    pub arguments: Token,
    /// `MethodDataSourceAttribute`
    pub method_data_source: Token,
    /// `ClassDataSourceAttribute<T..>`
    pub class_data_source: Token,
    /// `DataSourceGeneratorAttribute<T..>`
    pub data_source_generator: Token,
    /// `AsyncDataSourceGeneratorAttribute<T..>`
    pub async_data_source_generator: Token,
    /// `UntypedDataSourceGeneratorAttribute`
    pub untyped_data_source_generator: Token,
    /// `MatrixAttribute`
    pub matrix: Token,
    /// `SkipAttribute`
    pub skip: Token,
    /// `TimeoutAttribute`
    pub timeout: Token,
    /// `RetryAttribute`
    pub retry: Token,
    /// `RepeatAttribute`
    pub repeat: Token,
    /// `CategoryAttribute`
    pub category: Token,
    /// `PropertyAttribute`
    pub property: Token,
    /// `DisplayNameAttribute`
    pub display_name: Token,
    /// `DependsOnAttribute`
    pub depends_on: Token,
    /// `NotInParallelAttribute`
    pub not_in_parallel: Token,
    /// `GenerateGenericTestAttribute`
    pub generate_generic_test: Token,
    /// `InheritsTestsAttribute`
    pub inherits_tests: Token,

    /// `TestContext`
    pub test_context: Token,
    /// `ClassHookContext`
    pub class_hook_context: Token,
    /// `AssemblyHookContext`
    pub assembly_hook_context: Token,
    /// `TestSessionContext`
    pub test_session_context: Token,
    /// `TestDiscoveryContext`
    pub test_discovery_context: Token,
    /// `BeforeTestDiscoveryContext`
    pub before_test_discovery_context: Token,
}

struct Definition<'a> {
    assembly: &'a str,
    namespace: &'a str,
    name: &'a str,
    arity: u32,
    modifiers: TypeModifiers,
    base_type: Option<TypeSignature>,
    interfaces: Vec<TypeSignature>,
}

impl<'a> Definition<'a> {
    fn system(namespace: &'a str, name: &'a str) -> Self {
        Definition {
            assembly: SYSTEM_ASSEMBLY,
            namespace,
            name,
            arity: 0,
            modifiers: TypeModifiers::empty(),
            base_type: None,
            interfaces: Vec::new(),
        }
    }

    fn framework(name: &'a str) -> Self {
        Definition {
            assembly: FRAMEWORK_ASSEMBLY,
            namespace: FRAMEWORK_NAMESPACE,
            name,
            arity: 0,
            modifiers: TypeModifiers::empty(),
            base_type: None,
            interfaces: Vec::new(),
        }
    }

    fn arity(mut self, arity: u32) -> Self {
        self.arity = arity;
        self
    }

    fn modifiers(mut self, modifiers: TypeModifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    fn extends(mut self, base: TypeSignature) -> Self {
        self.base_type = Some(base);
        self
    }

    fn implements(mut self, interface: TypeSignature) -> Self {
        self.interfaces.push(interface);
        self
    }

    fn define(self, model: &ProgramModel) -> Token {
        let token = model.next_type_token();
        let symbol = TypeSymbol {
            token,
            namespace: self.namespace.to_string(),
            name: self.name.to_string(),
            assembly: self.assembly.to_string(),
            accessibility: Accessibility::Public,
            modifiers: self.modifiers,
            declaring_type: None,
            base_type: self.base_type,
            interfaces: self.interfaces,
            generic_params: (0..self.arity)
                .map(|index| GenericParam {
                    name: if self.arity == 1 {
                        "T".to_string()
                    } else {
                        format!("T{}", index + 1)
                    },
                    index,
                    constraints: Vec::new(),
                })
                .collect(),
            attributes: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            location: None,
        };
        model.insert_type(symbol);
        token
    }
}

fn generic(token: Token, args: Vec<TypeSignature>) -> TypeSignature {
    TypeSignature::GenericInst(Box::new(TypeSignature::Class(token)), args)
}

impl WellKnown {
    /// Registers all well-known types in `model` and returns their tokens
    pub(crate) fn register(model: &ProgramModel) -> WellKnown {
        let interface = TypeModifiers::INTERFACE | TypeModifiers::ABSTRACT;
        let value_type = TypeModifiers::VALUE_TYPE | TypeModifiers::SEALED;

        let attribute = Definition::system("System", "Attribute")
            .modifiers(TypeModifiers::ABSTRACT)
            .define(model);
        let attribute_base = || TypeSignature::Class(attribute);

        let system_type = Definition::system("System", "Type")
            .modifiers(TypeModifiers::ABSTRACT)
            .define(model);
        let task = Definition::system("System.Threading.Tasks", "Task").define(model);
        let task_1 = Definition::system("System.Threading.Tasks", "Task")
            .arity(1)
            .extends(TypeSignature::Class(task))
            .define(model);
        let value_task = Definition::system("System.Threading.Tasks", "ValueTask")
            .modifiers(value_type)
            .define(model);
        let value_task_1 = Definition::system("System.Threading.Tasks", "ValueTask")
            .arity(1)
            .modifiers(value_type)
            .define(model);
        let enumerable = Definition::system("System.Collections", "IEnumerable")
            .modifiers(interface)
            .define(model);
        let enumerable_1 = Definition::system("System.Collections.Generic", "IEnumerable")
            .arity(1)
            .modifiers(interface)
            .implements(TypeSignature::Class(enumerable))
            .define(model);
        let async_enumerable_1 =
            Definition::system("System.Collections.Generic", "IAsyncEnumerable")
                .arity(1)
                .modifiers(interface)
                .define(model);
        let list_1 = Definition::system("System.Collections.Generic", "List")
            .arity(1)
            .implements(generic(
                enumerable_1,
                vec![TypeSignature::GenericParamType(0)],
            ))
            .define(model);
        let func_1 = Definition::system("System", "Func")
            .arity(1)
            .modifiers(TypeModifiers::SEALED)
            .define(model);

        let mut value_tuples = [Token(0); 8];
        for (index, slot) in value_tuples.iter_mut().enumerate() {
            *slot = Definition::system("System", "ValueTuple")
                .arity(index as u32 + 1)
                .modifiers(TypeModifiers::VALUE_TYPE)
                .define(model);
        }

        let cancellation_token = Definition::system("System.Threading", "CancellationToken")
            .modifiers(value_type)
            .define(model);
        let span_1 = Definition::system("System", "Span")
            .arity(1)
            .modifiers(value_type | TypeModifiers::REF_LIKE)
            .define(model);
        let internals_visible_to = Definition::system(
            "System.Runtime.CompilerServices",
            "InternalsVisibleToAttribute",
        )
        .modifiers(TypeModifiers::SEALED)
        .extends(attribute_base())
        .define(model);

        let framework_attribute = |name: &str| {
            Definition::framework(name)
                .extends(attribute_base())
                .define(model)
        };

        let data_source_interface = Definition::framework("IDataSourceAttribute")
            .modifiers(interface)
            .define(model);
        let data_source_attribute = |name: &str, arity: u32| {
            Definition::framework(name)
                .arity(arity)
                .modifiers(TypeModifiers::ABSTRACT)
                .extends(attribute_base())
                .implements(TypeSignature::Class(data_source_interface))
                .define(model)
        };

        let hook_type = Definition::framework("HookType")
            .modifiers(value_type)
            .define(model);

        WellKnown {
            attribute,
            system_type,
            task,
            task_1,
            value_task,
            value_task_1,
            enumerable,
            enumerable_1,
            async_enumerable_1,
            list_1,
            func_1,
            value_tuples,
            cancellation_token,
            span_1,
            internals_visible_to,

            test: framework_attribute("TestAttribute"),
            before: framework_attribute("BeforeAttribute"),
            after: framework_attribute("AfterAttribute"),
            before_every: framework_attribute("BeforeEveryAttribute"),
            after_every: framework_attribute("AfterEveryAttribute"),
            hook_type,
            data_source_interface,
            arguments: data_source_attribute("ArgumentsAttribute", 0),
            method_data_source: data_source_attribute("MethodDataSourceAttribute", 0),
            class_data_source: data_source_attribute("ClassDataSourceAttribute", 1),
            data_source_generator: data_source_attribute("DataSourceGeneratorAttribute", 1),
            async_data_source_generator: data_source_attribute(
                "AsyncDataSourceGeneratorAttribute",
                1,
            ),
            untyped_data_source_generator: data_source_attribute(
                "UntypedDataSourceGeneratorAttribute",
                0,
            ),
            matrix: data_source_attribute("MatrixAttribute", 0),
            skip: framework_attribute("SkipAttribute"),
            timeout: framework_attribute("TimeoutAttribute"),
            retry: framework_attribute("RetryAttribute"),
            repeat: framework_attribute("RepeatAttribute"),
            category: framework_attribute("CategoryAttribute"),
            property: framework_attribute("PropertyAttribute"),
            display_name: framework_attribute("DisplayNameAttribute"),
            depends_on: framework_attribute("DependsOnAttribute"),
            not_in_parallel: framework_attribute("NotInParallelAttribute"),
            generate_generic_test: framework_attribute("GenerateGenericTestAttribute"),
            inherits_tests: framework_attribute("InheritsTestsAttribute"),

            test_context: Definition::framework("TestContext").define(model),
            class_hook_context: Definition::framework("ClassHookContext").define(model),
            assembly_hook_context: Definition::framework("AssemblyHookContext").define(model),
            test_session_context: Definition::framework("TestSessionContext").define(model),
            test_discovery_context: Definition::framework("TestDiscoveryContext").define(model),
            before_test_discovery_context: Definition::framework("BeforeTestDiscoveryContext")
                .define(model),
        }
    }

    /// Returns the `ValueTuple` definition for `arity` elements (1..=8)
    #[must_use]
    pub fn value_tuple(&self, arity: usize) -> Option<Token> {
        if arity == 0 {
            return None;
        }
        self.value_tuples.get(arity - 1).copied()
    }

    /// Returns the arity of a `ValueTuple` definition token
    #[must_use]
    pub fn value_tuple_arity(&self, token: Token) -> Option<usize> {
        self.value_tuples
            .iter()
            .position(|candidate| *candidate == token)
            .map(|index| index + 1)
    }
}
