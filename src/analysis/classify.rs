//! Attribute classification.
//!
//! [`AttributeClassifier`] maps attribute applications onto the closed set of
//! [`AttributeFamily`] variants the rest of the generator understands. Classification happens
//! once per attribute; synthesis code matches on the resulting enum and never looks at
//! attribute names again.
//!
//! # Recognition
//!
//! An attribute is recognised through its class *and its base-type chain*, so a user's
//! `class SmokeTestAttribute : TestAttribute` classifies exactly like `[Test]`. An attribute
//! class implementing `IDataSourceAttribute` is a data source regardless of its name or of
//! any other framework base it might share.
//!
//! Arguments must match one of the family's constructor shapes completely. An attribute
//! whose arguments do not fit is ignored, as are attributes the framework does not know;
//! neither is an error.

use crate::model::{
    AttributeArgument, AttributeData, Location, ProgramModel, Token, TypeSignature,
};

/// Scope of a hook, decoded from the `HookType` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookScope {
    /// Around every test
    Test,
    /// Around all tests of a class
    Class,
    /// Around all tests of an assembly
    Assembly,
    /// Around the whole test session
    TestSession,
    /// Around test discovery
    TestDiscovery,
}

impl HookScope {
    /// Decodes the underlying value of the `HookType` enum
    #[must_use]
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(HookScope::Test),
            1 => Some(HookScope::Class),
            2 => Some(HookScope::Assembly),
            3 => Some(HookScope::TestSession),
            4 => Some(HookScope::TestDiscovery),
            _ => None,
        }
    }

    /// Name of the `HookType` member
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HookScope::Test => "Test",
            HookScope::Class => "Class",
            HookScope::Assembly => "Assembly",
            HookScope::TestSession => "TestSession",
            HookScope::TestDiscovery => "TestDiscovery",
        }
    }
}

/// Whether a hook runs before or after its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookTiming {
    /// Setup
    Before,
    /// Teardown
    After,
}

/// A decoded `Before`, `After`, `BeforeEvery` or `AfterEvery` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookMarker {
    /// Setup or teardown
    pub timing: HookTiming,
    /// Global hook applying to every instance of the scope
    pub every: bool,
    /// Hook scope
    pub scope: HookScope,
    /// Declared `Order`, 0 when absent
    pub order: i32,
}

/// A decoded data source attribute
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceMarker {
    /// `[Arguments(1, "a")]`: one literal row
    Arguments {
        /// Row values
        values: Vec<AttributeArgument>,
    },
    /// `[MethodDataSource(typeof(Source), nameof(Source.Rows), Arguments = [..])]`
    MethodDataSource {
        /// Type declaring the member, the consumer's type when absent
        class: Option<TypeSignature>,
        /// Method or property name
        member: String,
        /// Arguments passed to the data source method
        arguments: Vec<AttributeArgument>,
    },
    /// `[ClassDataSource<T1, T2>]`: fresh instances of the given types
    ClassDataSource {
        /// Types to construct
        types: Vec<TypeSignature>,
    },
    /// A data source generator attribute, typed or untyped, sync or async
    Generator {
        /// The concrete attribute class
        attribute_class: Token,
        /// Element types declared through the generic generator base; empty when untyped
        element_types: Vec<TypeSignature>,
        /// Rows are produced asynchronously
        is_async: bool,
    },
    /// `[Matrix(1, 2, 3)]` on a parameter
    Matrix {
        /// Candidate values of the parameter
        values: Vec<AttributeArgument>,
    },
}

/// A decoded `DependsOn` attribute
#[derive(Debug, Clone, PartialEq)]
pub struct DependsOnMarker {
    /// Class of the dependency; the consumer's own class when absent
    pub class: Option<TypeSignature>,
    /// Test name; every test of `class` when absent
    pub method: Option<String>,
    /// Parameter types disambiguating overloads
    pub parameter_types: Option<Vec<TypeSignature>>,
    /// Run even when the dependency failed
    pub proceed_on_failure: bool,
}

/// The closed set of framework-meaningful attribute families
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeFamily {
    /// `[Test]`
    Test,
    /// A hook marker
    Hook(HookMarker),
    /// A data source
    DataSource(DataSourceMarker),
    /// `[Skip("reason")]`
    Skip {
        /// Reason reported to the runner
        reason: String,
    },
    /// `[Timeout(ms)]`
    Timeout {
        /// Timeout in milliseconds
        milliseconds: u64,
    },
    /// `[Retry(n)]`
    Retry {
        /// Number of retries
        count: u32,
    },
    /// `[Repeat(n)]`
    Repeat {
        /// Number of repetitions
        count: u32,
    },
    /// `[Category("name")]`
    Category(String),
    /// `[Property("name", "value")]`
    Property {
        /// Property name
        name: String,
        /// Property value
        value: String,
    },
    /// `[DisplayName("...")]`
    DisplayName(String),
    /// A `DependsOn` marker
    DependsOn(DependsOnMarker),
    /// `[NotInParallel]`, optionally with constraint keys
    NotInParallel {
        /// Constraint keys; tests sharing a key never overlap
        keys: Vec<String>,
    },
    /// `[GenerateGenericTest(typeof(int), typeof(string))]`
    GenerateGenericTest(Vec<TypeSignature>),
    /// `[InheritsTests]`
    InheritsTests,
}

/// An attribute together with its classification
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedAttribute {
    /// The decoded family
    pub family: AttributeFamily,
    /// The attribute class
    pub attribute_type: Token,
    /// Application site
    pub location: Option<Location>,
}

/// Recognises framework attributes through the program model
pub struct AttributeClassifier<'a> {
    model: &'a ProgramModel,
}

impl<'a> AttributeClassifier<'a> {
    /// Creates a classifier over `model`
    #[must_use]
    pub fn new(model: &'a ProgramModel) -> Self {
        AttributeClassifier { model }
    }

    /// Classifies a single attribute, `None` when it belongs to no family or its arguments
    /// do not match
    #[must_use]
    pub fn classify(&self, attribute: &AttributeData) -> Option<AttributeFamily> {
        let wk = self.model.well_known();
        let sig = TypeSignature::Class(attribute.attribute_type);
        let lineage = self.model.lineage(&sig);

        let is_data_source = self
            .model
            .find_implementation(&sig, wk.data_source_interface)
            .is_some();
        if is_data_source {
            return self.classify_data_source(attribute, &lineage);
        }

        lineage
            .iter()
            .filter_map(TypeSignature::token)
            .find_map(|token| self.classify_as(token, attribute))
    }

    /// Classifies every attribute of a list, dropping the unrecognised ones
    #[must_use]
    pub fn classify_all(&self, attributes: &[AttributeData]) -> Vec<ClassifiedAttribute> {
        attributes
            .iter()
            .filter_map(|attribute| {
                self.classify(attribute).map(|family| ClassifiedAttribute {
                    family,
                    attribute_type: attribute.attribute_type,
                    location: attribute.location.clone(),
                })
            })
            .collect()
    }

    /// Returns true if any attribute of the list is `[Test]`
    #[must_use]
    pub fn has_test_marker(&self, attributes: &[AttributeData]) -> bool {
        attributes
            .iter()
            .any(|attribute| matches!(self.classify(attribute), Some(AttributeFamily::Test)))
    }

    fn classify_as(&self, token: Token, attribute: &AttributeData) -> Option<AttributeFamily> {
        let wk = self.model.well_known();
        let args = attribute.fixed_args.as_slice();

        if token == wk.test {
            return match args {
                [] | [AttributeArgument::String(_), AttributeArgument::I4(_)] => {
                    Some(AttributeFamily::Test)
                }
                _ => None,
            };
        }

        let hook = [
            (wk.before, HookTiming::Before, false),
            (wk.after, HookTiming::After, false),
            (wk.before_every, HookTiming::Before, true),
            (wk.after_every, HookTiming::After, true),
        ]
        .into_iter()
        .find(|(candidate, _, _)| *candidate == token);
        if let Some((_, timing, every)) = hook {
            return self.hook_marker(attribute, timing, every);
        }

        if token == wk.skip {
            return match args {
                [AttributeArgument::String(reason)] => Some(AttributeFamily::Skip {
                    reason: reason.clone(),
                }),
                _ => None,
            };
        }
        if token == wk.timeout {
            return match single_integer(args) {
                Some(ms) if ms >= 0 => Some(AttributeFamily::Timeout {
                    milliseconds: ms as u64,
                }),
                _ => None,
            };
        }
        if token == wk.retry {
            return non_negative_count(args).map(|count| AttributeFamily::Retry { count });
        }
        if token == wk.repeat {
            return non_negative_count(args).map(|count| AttributeFamily::Repeat { count });
        }
        if token == wk.category {
            return match args {
                [AttributeArgument::String(name)] => Some(AttributeFamily::Category(name.clone())),
                _ => None,
            };
        }
        if token == wk.property {
            return match args {
                [AttributeArgument::String(name), AttributeArgument::String(value)] => {
                    Some(AttributeFamily::Property {
                        name: name.clone(),
                        value: value.clone(),
                    })
                }
                _ => None,
            };
        }
        if token == wk.display_name {
            return match args {
                [AttributeArgument::String(name)] => {
                    Some(AttributeFamily::DisplayName(name.clone()))
                }
                _ => None,
            };
        }
        if token == wk.depends_on {
            return self.depends_on_marker(attribute);
        }
        if token == wk.not_in_parallel {
            return match args {
                [] => Some(AttributeFamily::NotInParallel { keys: Vec::new() }),
                [AttributeArgument::String(key)] => Some(AttributeFamily::NotInParallel {
                    keys: vec![key.clone()],
                }),
                [AttributeArgument::Array(_, keys)] => keys
                    .iter()
                    .map(|key| key.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .map(|keys| AttributeFamily::NotInParallel { keys }),
                _ => None,
            };
        }
        if token == wk.generate_generic_test {
            let values = flatten_params(args);
            if values.is_empty() {
                return None;
            }
            return values
                .iter()
                .map(|value| value.as_type().cloned())
                .collect::<Option<Vec<_>>>()
                .map(AttributeFamily::GenerateGenericTest);
        }
        if token == wk.inherits_tests {
            return args.is_empty().then_some(AttributeFamily::InheritsTests);
        }

        None
    }

    fn hook_marker(
        &self,
        attribute: &AttributeData,
        timing: HookTiming,
        every: bool,
    ) -> Option<AttributeFamily> {
        let wk = self.model.well_known();
        let scope = match attribute.fixed_args.as_slice() {
            [AttributeArgument::Enum(enum_type, value), rest @ ..]
                if enum_type.token() == Some(wk.hook_type)
                    && matches!(
                        rest,
                        [] | [AttributeArgument::String(_), AttributeArgument::I4(_)]
                    ) =>
            {
                HookScope::from_value(*value)?
            }
            _ => return None,
        };

        let order = match attribute.named_arg("Order") {
            None => 0,
            Some(AttributeArgument::I4(order)) => *order,
            Some(_) => return None,
        };

        Some(AttributeFamily::Hook(HookMarker {
            timing,
            every,
            scope,
            order,
        }))
    }

    fn depends_on_marker(&self, attribute: &AttributeData) -> Option<AttributeFamily> {
        let proceed_on_failure = match attribute.named_arg("ProceedOnFailure") {
            None => false,
            Some(AttributeArgument::Bool(value)) => *value,
            Some(_) => return None,
        };

        let generic_class = match attribute.type_arguments.as_slice() {
            [] => None,
            [class] => Some(class.clone()),
            _ => return None,
        };

        let parameter_types = |values: &[AttributeArgument]| -> Option<Vec<TypeSignature>> {
            values
                .iter()
                .map(|value| value.as_type().cloned())
                .collect()
        };

        use AttributeArgument as A;
        let (class, method, parameter_types) =
            match (generic_class, attribute.fixed_args.as_slice()) {
                (None, [A::String(method)]) => (None, Some(method.clone()), None),
                (None, [A::String(method), A::Array(_, types)]) => {
                    (None, Some(method.clone()), Some(parameter_types(types)?))
                }
                (None, [A::Type(class)]) => (Some(class.clone()), None, None),
                (None, [A::Type(class), A::String(method)]) => {
                    (Some(class.clone()), Some(method.clone()), None)
                }
                (None, [A::Type(class), A::String(method), A::Array(_, types)]) => (
                    Some(class.clone()),
                    Some(method.clone()),
                    Some(parameter_types(types)?),
                ),
                (Some(class), []) => (Some(class), None, None),
                (Some(class), [A::String(method)]) => (Some(class), Some(method.clone()), None),
                (Some(class), [A::String(method), A::Array(_, types)]) => {
                    (Some(class), Some(method.clone()), Some(parameter_types(types)?))
                }
                _ => return None,
            };

        Some(AttributeFamily::DependsOn(DependsOnMarker {
            class,
            method,
            parameter_types,
            proceed_on_failure,
        }))
    }

    fn classify_data_source(
        &self,
        attribute: &AttributeData,
        lineage: &[TypeSignature],
    ) -> Option<AttributeFamily> {
        let wk = self.model.well_known();
        let args = attribute.fixed_args.as_slice();

        for ancestor in lineage {
            let Some(token) = ancestor.token() else {
                continue;
            };

            if token == wk.arguments {
                return Some(AttributeFamily::DataSource(DataSourceMarker::Arguments {
                    values: flatten_params(args),
                }));
            }
            if token == wk.matrix {
                return Some(AttributeFamily::DataSource(DataSourceMarker::Matrix {
                    values: flatten_params(args),
                }));
            }
            if token == wk.method_data_source {
                let (class, member) = match args {
                    [AttributeArgument::String(member)] => (None, member.clone()),
                    [AttributeArgument::Type(class), AttributeArgument::String(member)] => {
                        (Some(class.clone()), member.clone())
                    }
                    _ => return None,
                };
                let arguments = match attribute.named_arg("Arguments") {
                    None => Vec::new(),
                    Some(AttributeArgument::Array(_, values)) => values.clone(),
                    Some(_) => return None,
                };
                return Some(AttributeFamily::DataSource(
                    DataSourceMarker::MethodDataSource {
                        class,
                        member,
                        arguments,
                    },
                ));
            }
            if token == wk.class_data_source {
                let types = if !attribute.type_arguments.is_empty() {
                    attribute.type_arguments.clone()
                } else if let Some(from_ancestor) = ancestor_arguments(ancestor) {
                    from_ancestor
                } else {
                    flatten_params(args)
                        .iter()
                        .map(|value| value.as_type().cloned())
                        .collect::<Option<Vec<_>>>()?
                };
                if types.is_empty() {
                    return None;
                }
                return Some(AttributeFamily::DataSource(
                    DataSourceMarker::ClassDataSource { types },
                ));
            }
            if token == wk.data_source_generator || token == wk.async_data_source_generator {
                return Some(AttributeFamily::DataSource(DataSourceMarker::Generator {
                    attribute_class: attribute.attribute_type,
                    element_types: ancestor.generic_arguments().to_vec(),
                    is_async: token == wk.async_data_source_generator,
                }));
            }
            if token == wk.untyped_data_source_generator {
                return Some(AttributeFamily::DataSource(DataSourceMarker::Generator {
                    attribute_class: attribute.attribute_type,
                    element_types: Vec::new(),
                    is_async: false,
                }));
            }
        }

        // A custom IDataSourceAttribute implementation outside the known bases
        Some(AttributeFamily::DataSource(DataSourceMarker::Generator {
            attribute_class: attribute.attribute_type,
            element_types: Vec::new(),
            is_async: false,
        }))
    }
}

fn ancestor_arguments(ancestor: &TypeSignature) -> Option<Vec<TypeSignature>> {
    let args = ancestor.generic_arguments();
    (!args.is_empty() && !args.iter().any(TypeSignature::contains_generic_param))
        .then(|| args.to_vec())
}

// `params object[]` arrives as a single array argument
fn flatten_params(args: &[AttributeArgument]) -> Vec<AttributeArgument> {
    match args {
        [AttributeArgument::Array(_, values)] => values.clone(),
        _ => args.to_vec(),
    }
}

fn single_integer(args: &[AttributeArgument]) -> Option<i64> {
    match args {
        [value] => value.as_i64(),
        _ => None,
    }
}

fn non_negative_count(args: &[AttributeArgument]) -> Option<u32> {
    single_integer(args).and_then(|value| u32::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgramBuilder;
    use crate::test::attributes;

    #[test]
    fn test_test_marker() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let classifier = AttributeClassifier::new(program.model());

        assert_eq!(classifier.classify(&attrs.test()), Some(AttributeFamily::Test));
        let with_args = attrs
            .test()
            .arg(AttributeArgument::I4(1));
        assert_eq!(classifier.classify(&with_args), None);
    }

    #[test]
    fn test_subclassed_test_attribute() {
        let program = ProgramBuilder::new("Demo.Tests");
        let test = program.well_known().test;
        let smoke = program
            .attribute_class("Demo", "SmokeTestAttribute", Some(TypeSignature::Class(test)))
            .build()
            .unwrap();
        let classifier = AttributeClassifier::new(program.model());

        assert_eq!(
            classifier.classify(&AttributeData::new(smoke)),
            Some(AttributeFamily::Test)
        );
    }

    #[test]
    fn test_hook_marker() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let classifier = AttributeClassifier::new(program.model());

        let marker = classifier.classify(
            &attrs
                .before(HookScope::Class)
                .named("Order", AttributeArgument::I4(-5)),
        );
        assert_eq!(
            marker,
            Some(AttributeFamily::Hook(HookMarker {
                timing: HookTiming::Before,
                every: false,
                scope: HookScope::Class,
                order: -5,
            }))
        );

        let every = classifier.classify(&attrs.after_every(HookScope::Assembly));
        assert!(matches!(
            every,
            Some(AttributeFamily::Hook(HookMarker {
                every: true,
                timing: HookTiming::After,
                scope: HookScope::Assembly,
                order: 0,
            }))
        ));
    }

    #[test]
    fn test_hook_with_bad_order_is_ignored() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let classifier = AttributeClassifier::new(program.model());

        let attr = attrs
            .before(HookScope::Test)
            .named("Order", AttributeArgument::String("first".into()));
        assert_eq!(classifier.classify(&attr), None);
    }

    #[test]
    fn test_data_source_interface_wins_over_name() {
        let program = ProgramBuilder::new("Demo.Tests");
        let wk = program.well_known().clone();
        let custom = program
            .attribute_class("Demo", "BeforeSomethingAttribute", None)
            .implements(TypeSignature::Class(wk.data_source_interface))
            .build()
            .unwrap();
        let classifier = AttributeClassifier::new(program.model());

        assert!(matches!(
            classifier.classify(&AttributeData::new(custom)),
            Some(AttributeFamily::DataSource(DataSourceMarker::Generator {
                element_types,
                ..
            })) if element_types.is_empty()
        ));
    }

    #[test]
    fn test_typed_generator() {
        let program = ProgramBuilder::new("Demo.Tests");
        let wk = program.well_known().clone();
        let generator = program
            .attribute_class(
                "Demo",
                "NumbersAttribute",
                Some(TypeSignature::GenericInst(
                    Box::new(TypeSignature::Class(wk.data_source_generator)),
                    vec![TypeSignature::I4],
                )),
            )
            .build()
            .unwrap();
        let classifier = AttributeClassifier::new(program.model());

        match classifier.classify(&AttributeData::new(generator)) {
            Some(AttributeFamily::DataSource(DataSourceMarker::Generator {
                attribute_class,
                element_types,
                is_async,
            })) => {
                assert_eq!(attribute_class, generator);
                assert_eq!(element_types, vec![TypeSignature::I4]);
                assert!(!is_async);
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn test_arguments_and_method_data_source() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let classifier = AttributeClassifier::new(program.model());

        assert_eq!(
            classifier.classify(&attrs.arguments(vec![AttributeArgument::I4(1)])),
            Some(AttributeFamily::DataSource(DataSourceMarker::Arguments {
                values: vec![AttributeArgument::I4(1)]
            }))
        );

        let mds = attrs.method_data_source("Rows").named(
            "Arguments",
            AttributeArgument::Array(TypeSignature::Object, vec![AttributeArgument::I4(3)]),
        );
        assert_eq!(
            classifier.classify(&mds),
            Some(AttributeFamily::DataSource(DataSourceMarker::MethodDataSource {
                class: None,
                member: "Rows".into(),
                arguments: vec![AttributeArgument::I4(3)],
            }))
        );
    }

    #[test]
    fn test_depends_on_forms() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let other = program.class("Demo", "Other").build().unwrap();
        let classifier = AttributeClassifier::new(program.model());

        let by_name =
            classifier.classify(&attrs.depends_on(vec![AttributeArgument::String("First".into())]));
        assert!(matches!(
            by_name,
            Some(AttributeFamily::DependsOn(DependsOnMarker {
                class: None,
                method: Some(ref m),
                ..
            })) if m == "First"
        ));

        let by_class = classifier.classify(
            &attrs
                .depends_on(vec![AttributeArgument::Type(TypeSignature::Class(other))])
                .named("ProceedOnFailure", AttributeArgument::Bool(true)),
        );
        assert!(matches!(
            by_class,
            Some(AttributeFamily::DependsOn(DependsOnMarker {
                class: Some(_),
                method: None,
                proceed_on_failure: true,
                ..
            }))
        ));

        let generic = classifier.classify(
            &attrs
                .depends_on(vec![AttributeArgument::String("Second".into())])
                .type_arg(TypeSignature::Class(other)),
        );
        assert!(matches!(
            generic,
            Some(AttributeFamily::DependsOn(DependsOnMarker {
                class: Some(TypeSignature::Class(t)),
                method: Some(_),
                ..
            })) if t == other
        ));

        assert_eq!(
            classifier.classify(&attrs.depends_on(vec![AttributeArgument::I4(1)])),
            None
        );
    }

    #[test]
    fn test_policy_attributes() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let wk = program.well_known().clone();
        let classifier = AttributeClassifier::new(program.model());

        assert_eq!(
            classifier.classify(&AttributeData::new(wk.retry).arg(AttributeArgument::I4(3))),
            Some(AttributeFamily::Retry { count: 3 })
        );
        assert_eq!(
            classifier.classify(&AttributeData::new(wk.retry).arg(AttributeArgument::I4(-1))),
            None
        );
        assert_eq!(
            classifier.classify(&attrs.skip("flaky")),
            Some(AttributeFamily::Skip { reason: "flaky".into() })
        );
        assert_eq!(
            classifier.classify(&AttributeData::new(wk.timeout).arg(AttributeArgument::I4(250))),
            Some(AttributeFamily::Timeout { milliseconds: 250 })
        );
    }

    #[test]
    fn test_unknown_attribute_is_skipped() {
        let program = ProgramBuilder::new("Demo.Tests");
        let unrelated = program
            .attribute_class("Demo", "ObsoleteAttribute", None)
            .build()
            .unwrap();
        let classifier = AttributeClassifier::new(program.model());

        assert_eq!(classifier.classify(&AttributeData::new(unrelated)), None);
        assert!(classifier.classify_all(&[AttributeData::new(unrelated)]).is_empty());
    }
}
