//! Data source analysis.
//!
//! Every construct that feeds values into a test is normalised into a
//! [`DataSourceDescriptor`] with exactly one [`DataSourceShape`]:
//!
//! | Shape | Produced by |
//! |-------|-------------|
//! | [`DataSourceShape::Eager`] | `[Arguments]` rows and `[Matrix]` values, known at generation time |
//! | [`DataSourceShape::Method`] | a method or property returning a value or an `IEnumerable<T>`, class data sources, synchronous generators |
//! | [`DataSourceShape::AsyncEnumerable`] | a method returning `IAsyncEnumerable<T>`, asynchronous generators |
//! | [`DataSourceShape::AsyncTask`] | a method returning `Task<X>` or `ValueTask<X>` |
//!
//! Member-based descriptors are shared: the analyzer keeps one descriptor per
//! [`FactoryKey`] and hands out the same [`Arc`] to every consumer. Each of them also owns a
//! generated synchronous wrapper whose name is derived from the declaring type and the member
//! and is unique across the compilation.
//!
//! How a produced element is spread over the consumer's parameters is decided separately by
//! [`DataSourceAnalyzer::bind`], since the same source may feed a method with one tuple
//! parameter and another with the tuple's elements as parameters.

use std::{fmt, sync::Arc};

use dashmap::DashMap;

use crate::{
    analysis::{
        access::Generatability,
        classify::DataSourceMarker,
        tuples::{NestedTuples, TupleLayout},
    },
    model::{
        AttributeArgument, MethodRc, ProgramModel, PropertyRc, Token, TypeNameStyle,
        TypeSignature,
    },
    Error, Result,
};

/// Name of the generated class holding all synchronous data source wrappers
pub const WRAPPER_CLASS: &str = "DataSourceWrappers";

/// How values are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSourceShape {
    /// Literal values known at generation time
    Eager,
    /// A synchronous call producing a value or a sequence
    Method,
    /// An `IAsyncEnumerable<T>` driven through the async adapter
    AsyncEnumerable,
    /// A `Task<X>`/`ValueTask<X>` awaited through the async adapter
    AsyncTask,
}

impl DataSourceShape {
    /// Returns true for shapes that need the sync-over-async adapter
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, DataSourceShape::AsyncEnumerable | DataSourceShape::AsyncTask)
    }
}

/// Static shape of one produced element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementShape {
    /// A single value
    Single(TypeSignature),
    /// A `ValueTuple`, decomposed with nested tuple elements preserved
    Tuple(TupleLayout),
    /// An `object?[]` row, already spread
    ObjectRow,
    /// A row with statically known column types
    Columns(Vec<TypeSignature>),
    /// A `Func<T>` invoked once per row to produce the element
    Deferred(Box<ElementShape>),
}

impl ElementShape {
    /// Statically known element types, `None` for untyped rows
    #[must_use]
    pub fn element_types(&self) -> Option<Vec<TypeSignature>> {
        match self {
            ElementShape::Single(sig) => Some(vec![sig.clone()]),
            ElementShape::Tuple(layout) => Some(layout.element_types()),
            ElementShape::ObjectRow => None,
            ElementShape::Columns(types) => Some(types.clone()),
            ElementShape::Deferred(inner) => inner.element_types(),
        }
    }

    /// Returns true if elements are produced through a factory delegate
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, ElementShape::Deferred(_))
    }
}

/// Parameters the data source member itself accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberParameters {
    /// No parameters
    None,
    /// A single `CancellationToken`
    CancellationToken,
    /// Values from the attribute's `Arguments`, optionally followed by a `CancellationToken`
    Supplied {
        /// Number of supplied values
        count: usize,
        /// A trailing `CancellationToken` is passed as well
        with_cancellation: bool,
    },
}

/// The construct that produces values
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceProducer {
    /// One `[Arguments]` row
    Literal {
        /// Row values
        values: Vec<AttributeArgument>,
    },
    /// Candidate values of one `[Matrix]` parameter
    Matrix {
        /// Candidate values
        values: Vec<AttributeArgument>,
    },
    /// A method call
    Method {
        /// The called method
        method: Token,
        /// Called without an instance
        is_static: bool,
        /// Accepted parameters
        parameters: MemberParameters,
    },
    /// A property read
    Property {
        /// The read property
        property: Token,
        /// Read without an instance
        is_static: bool,
    },
    /// A data source generator attribute
    Generator {
        /// The attribute class instantiated by generated code
        attribute_class: Token,
        /// Rows are produced asynchronously
        is_async: bool,
    },
    /// `ClassDataSource<T..>`: fresh instances per row
    ClassConstruction {
        /// Constructed types
        types: Vec<TypeSignature>,
    },
}

/// Identity of a shared, member-based data source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactoryKey {
    /// Closed type declaring the member
    pub declaring_type: TypeSignature,
    /// Member name
    pub member: String,
    /// Number of supplied arguments; distinguishes overloads
    pub arity: usize,
}

/// A normalised data source
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceDescriptor {
    /// What produces the values
    pub producer: DataSourceProducer,
    /// Type declaring the producing member
    pub declaring_type: TypeSignature,
    /// Producing member, or the attribute name for attribute-based sources
    pub member_name: String,
    /// Production shape
    pub shape: DataSourceShape,
    /// The member returns a sequence rather than a single element
    pub yields_sequence: bool,
    /// Shape of one element
    pub element: ElementShape,
    /// Stable key for deduplication and lookup
    pub factory_key: String,
    /// Name of the generated synchronous wrapper, `None` for eager sources
    pub wrapper_name: Option<String>,
}

impl fmt::Display for DataSourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.factory_key, self.shape)
    }
}

/// How one produced element is mapped onto the consumer's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowBinding {
    /// The element is the single argument
    Whole,
    /// The element is a tuple whose elements become the arguments
    Unwrap(TupleLayout),
    /// The element already is the argument row
    Spread,
}

/// Classifies data sources and keeps the shared descriptor table
pub struct DataSourceAnalyzer<'a> {
    model: &'a ProgramModel,
    access: Generatability<'a>,
    factories: DashMap<FactoryKey, Arc<DataSourceDescriptor>>,
    wrapper_names: DashMap<String, FactoryKey>,
}

impl<'a> DataSourceAnalyzer<'a> {
    /// Creates an analyzer for code emitted into `assembly`
    #[must_use]
    pub fn new(model: &'a ProgramModel, assembly: &'a str) -> Self {
        DataSourceAnalyzer {
            model,
            access: Generatability::new(model, assembly),
            factories: DashMap::new(),
            wrapper_names: DashMap::new(),
        }
    }

    /// Classifies a data source applied to a member of `owner`.
    ///
    /// Member-based sources are registered once per [`FactoryKey`]; later calls return the
    /// same descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if a referenced member does not exist,
    /// [`Error::DataSource`] if it is inaccessible, has an unsupported parameter list or a
    /// return type that cannot produce values, and [`Error::Unsupported`] for generic
    /// data source methods.
    pub fn analyze(
        &self,
        marker: &DataSourceMarker,
        owner: &TypeSignature,
    ) -> Result<Arc<DataSourceDescriptor>> {
        let (descriptor, key) = self.describe(marker, owner)?;
        let Some(key) = key else {
            return Ok(Arc::new(descriptor));
        };

        if let Some(existing) = self.factories.get(&key) {
            return Ok(existing.clone());
        }

        let entry = self.factories.entry(key.clone()).or_insert_with(|| {
            let mut descriptor = descriptor;
            descriptor.wrapper_name = Some(self.allocate_wrapper_name(&key));
            Arc::new(descriptor)
        });
        Ok(entry.value().clone())
    }

    /// Element types the source would produce for `owner`, without registering anything
    #[must_use]
    pub fn element_types(
        &self,
        marker: &DataSourceMarker,
        owner: &TypeSignature,
    ) -> Option<Vec<TypeSignature>> {
        let (descriptor, _) = self.describe(marker, owner).ok()?;
        descriptor.element.element_types()
    }

    /// Decides how one element of `descriptor` fills parameters of the `expected` types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataSource`] if the element cannot provide exactly `expected.len()`
    /// values.
    pub fn bind(
        &self,
        descriptor: &DataSourceDescriptor,
        expected: &[TypeSignature],
    ) -> Result<RowBinding> {
        let mismatch = |produced: usize| Error::DataSource {
            member: descriptor.factory_key.clone(),
            message: format!(
                "produces {} value(s) per row but {} parameter(s) are expected",
                produced,
                expected.len()
            ),
        };

        if let DataSourceProducer::Literal { values } = &descriptor.producer {
            return if values.len() == expected.len() {
                Ok(RowBinding::Spread)
            } else {
                Err(mismatch(values.len()))
            };
        }

        self.bind_element(&descriptor.element, expected, &mismatch)
    }

    fn bind_element(
        &self,
        element: &ElementShape,
        expected: &[TypeSignature],
        mismatch: &dyn Fn(usize) -> Error,
    ) -> Result<RowBinding> {
        match element {
            ElementShape::ObjectRow => Ok(RowBinding::Spread),
            ElementShape::Deferred(inner) => self.bind_element(inner, expected, mismatch),
            ElementShape::Single(_) if expected.len() == 1 => Ok(RowBinding::Whole),
            ElementShape::Single(_) => Err(mismatch(1)),
            ElementShape::Columns(types) if types.len() == expected.len() => {
                Ok(RowBinding::Spread)
            }
            ElementShape::Columns(types) if types.len() == 1 && expected.len() > 1 => {
                let flattened = TupleLayout::of(self.model, &types[0], NestedTuples::Flatten);
                match flattened {
                    Some(layout) if layout.arity() == expected.len() => {
                        Ok(RowBinding::Unwrap(layout))
                    }
                    _ => Err(mismatch(1)),
                }
            }
            ElementShape::Columns(types) => Err(mismatch(types.len())),
            ElementShape::Tuple(layout) => {
                if expected.len() == 1 && expected[0] == layout.signature {
                    return Ok(RowBinding::Whole);
                }
                if layout.arity() == expected.len() {
                    return Ok(RowBinding::Unwrap(layout.clone()));
                }
                match TupleLayout::of(self.model, &layout.signature, NestedTuples::Flatten) {
                    Some(flat) if flat.arity() == expected.len() => Ok(RowBinding::Unwrap(flat)),
                    _ if expected.len() == 1 => Ok(RowBinding::Whole),
                    _ => Err(mismatch(layout.arity())),
                }
            }
        }
    }

    /// All shared descriptors, ordered by wrapper name
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<DataSourceDescriptor>> {
        let mut all: Vec<_> = self
            .factories
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.wrapper_name.cmp(&b.wrapper_name));
        all
    }

    /// Returns true if any shared descriptor needs the async adapter
    #[must_use]
    pub fn has_async(&self) -> bool {
        self.factories
            .iter()
            .any(|entry| entry.value().shape.is_async())
    }

    fn describe(
        &self,
        marker: &DataSourceMarker,
        owner: &TypeSignature,
    ) -> Result<(DataSourceDescriptor, Option<FactoryKey>)> {
        let owner_name = self.model.type_name(owner, TypeNameStyle::Identity);

        match marker {
            DataSourceMarker::Arguments { values } => Ok((
                DataSourceDescriptor {
                    producer: DataSourceProducer::Literal {
                        values: values.clone(),
                    },
                    declaring_type: owner.clone(),
                    member_name: "Arguments".to_string(),
                    shape: DataSourceShape::Eager,
                    yields_sequence: false,
                    element: ElementShape::Columns(
                        values.iter().map(|value| self.literal_type(value)).collect(),
                    ),
                    factory_key: format!("{owner_name}:Arguments({})", render_literals(values)),
                    wrapper_name: None,
                },
                None,
            )),
            DataSourceMarker::Matrix { values } => Ok((
                DataSourceDescriptor {
                    producer: DataSourceProducer::Matrix {
                        values: values.clone(),
                    },
                    declaring_type: owner.clone(),
                    member_name: "Matrix".to_string(),
                    shape: DataSourceShape::Eager,
                    yields_sequence: true,
                    element: ElementShape::Single(
                        values
                            .first()
                            .map(|value| self.literal_type(value))
                            .unwrap_or(TypeSignature::Object),
                    ),
                    factory_key: format!("{owner_name}:Matrix({})", render_literals(values)),
                    wrapper_name: None,
                },
                None,
            )),
            DataSourceMarker::ClassDataSource { types } => {
                let names: Vec<String> = types
                    .iter()
                    .map(|sig| self.model.type_name(sig, TypeNameStyle::Identity))
                    .collect();
                for (sig, name) in types.iter().zip(&names) {
                    if !self.access.is_type_generatable(sig) {
                        return Err(Error::DataSource {
                            member: name.clone(),
                            message: "class data source type is not accessible".to_string(),
                        });
                    }
                }
                Ok((
                    DataSourceDescriptor {
                        producer: DataSourceProducer::ClassConstruction {
                            types: types.clone(),
                        },
                        declaring_type: owner.clone(),
                        member_name: "ClassDataSource".to_string(),
                        shape: DataSourceShape::Method,
                        yields_sequence: false,
                        element: ElementShape::Columns(types.clone()),
                        factory_key: format!("ClassDataSource<{}>", names.join(",")),
                        wrapper_name: None,
                    },
                    None,
                ))
            }
            DataSourceMarker::Generator {
                attribute_class,
                element_types,
                is_async,
            } => {
                let attribute = TypeSignature::Class(*attribute_class);
                if !self.access.is_type_generatable(&attribute) {
                    return Err(Error::DataSource {
                        member: self.model.type_name(&attribute, TypeNameStyle::Identity),
                        message: "data source attribute is not accessible".to_string(),
                    });
                }
                let element = match element_types.as_slice() {
                    [] => ElementShape::ObjectRow,
                    [single] => self.element_shape(single),
                    many => ElementShape::Columns(many.to_vec()),
                };
                let key = FactoryKey {
                    declaring_type: attribute.clone(),
                    member: "GenerateDataSources".to_string(),
                    arity: 0,
                };
                Ok((
                    DataSourceDescriptor {
                        producer: DataSourceProducer::Generator {
                            attribute_class: *attribute_class,
                            is_async: *is_async,
                        },
                        factory_key: self.factory_key_text(&key),
                        declaring_type: attribute,
                        member_name: "GenerateDataSources".to_string(),
                        shape: if *is_async {
                            DataSourceShape::AsyncEnumerable
                        } else {
                            DataSourceShape::Method
                        },
                        yields_sequence: true,
                        element: ElementShape::Deferred(Box::new(element)),
                        wrapper_name: None,
                    },
                    Some(key),
                ))
            }
            DataSourceMarker::MethodDataSource {
                class,
                member,
                arguments,
            } => {
                let declaring = class.clone().unwrap_or_else(|| owner.clone());
                self.describe_member(&declaring, member, arguments)
            }
        }
    }

    fn describe_member(
        &self,
        declaring: &TypeSignature,
        member: &str,
        arguments: &[AttributeArgument],
    ) -> Result<(DataSourceDescriptor, Option<FactoryKey>)> {
        let declaring_name = self.model.type_name(declaring, TypeNameStyle::Identity);
        let not_found = || Error::MemberNotFound {
            owner: declaring_name.clone(),
            member: member.to_string(),
        };
        let failure = |message: &str| Error::DataSource {
            member: format!("{declaring_name}.{member}"),
            message: message.to_string(),
        };

        let symbol = self.model.resolve(declaring).ok_or_else(not_found)?;
        if !self.access.is_definition_accessible(symbol.token) {
            return Err(failure("declaring type is not accessible"));
        }
        let type_args = declaring.generic_arguments();

        let key = FactoryKey {
            declaring_type: declaring.clone(),
            member: member.to_string(),
            arity: arguments.len(),
        };

        let methods = self.find_methods_in_hierarchy(declaring, member);
        let (producer, return_type) = if !methods.is_empty() {
            let (method, parameters) = methods
                .iter()
                .find_map(|method| {
                    self.match_parameters(method, arguments)
                        .map(|parameters| (method.clone(), parameters))
                })
                .ok_or_else(|| failure("no overload accepts the supplied arguments"))?;

            if method.is_generic() {
                return Err(Error::Unsupported(format!(
                    "generic data source method {declaring_name}.{member}"
                )));
            }
            if !self.access.is_member_accessible(method.accessibility) {
                return Err(failure("member is not accessible"));
            }
            (
                DataSourceProducer::Method {
                    method: method.token,
                    is_static: method.is_static(),
                    parameters,
                },
                method.return_type.substitute(type_args, &[]),
            )
        } else {
            let property = self
                .find_property_in_hierarchy(declaring, member)
                .ok_or_else(not_found)?;
            if !arguments.is_empty() {
                return Err(failure("a property cannot receive arguments"));
            }
            match property.getter {
                Some(getter) if self.access.is_member_accessible(getter) => {}
                _ => return Err(failure("property has no accessible getter")),
            }
            (
                DataSourceProducer::Property {
                    property: property.token,
                    is_static: property.is_static,
                },
                property.signature.substitute(type_args, &[]),
            )
        };

        let (shape, yields_sequence, element) = self.classify_return(&return_type)
            .ok_or_else(|| failure("return type cannot produce data"))?;

        Ok((
            DataSourceDescriptor {
                producer,
                declaring_type: declaring.clone(),
                member_name: member.to_string(),
                shape,
                yields_sequence,
                element,
                factory_key: self.factory_key_text(&key),
                wrapper_name: None,
            },
            Some(key),
        ))
    }

    // Members declared on the type or inherited from its ancestors, nearest first
    fn find_methods_in_hierarchy(&self, declaring: &TypeSignature, name: &str) -> Vec<MethodRc> {
        self.model
            .lineage(declaring)
            .iter()
            .filter_map(TypeSignature::token)
            .flat_map(|token| self.model.find_methods(token, name))
            .filter(|method| !method.is_constructor())
            .collect()
    }

    fn find_property_in_hierarchy(
        &self,
        declaring: &TypeSignature,
        name: &str,
    ) -> Option<PropertyRc> {
        self.model
            .lineage(declaring)
            .iter()
            .filter_map(TypeSignature::token)
            .find_map(|token| self.model.find_property(token, name))
    }

    fn match_parameters(
        &self,
        method: &MethodRc,
        arguments: &[AttributeArgument],
    ) -> Option<MemberParameters> {
        let ct = TypeSignature::ValueType(self.model.well_known().cancellation_token);
        let params = &method.parameters;
        let trailing_ct = params.last().is_some_and(|param| param.signature == ct);

        match (params.len(), arguments.len(), trailing_ct) {
            (0, 0, _) => Some(MemberParameters::None),
            (1, 0, true) => Some(MemberParameters::CancellationToken),
            (p, a, false) if p == a && a > 0 => Some(MemberParameters::Supplied {
                count: a,
                with_cancellation: false,
            }),
            (p, a, true) if p == a + 1 && a > 0 => Some(MemberParameters::Supplied {
                count: a,
                with_cancellation: true,
            }),
            _ => None,
        }
    }

    /// Classifies a producing member's return type into shape, sequence flag and element
    fn classify_return(
        &self,
        return_type: &TypeSignature,
    ) -> Option<(DataSourceShape, bool, ElementShape)> {
        let wk = self.model.well_known();
        if return_type.is_void() || return_type.contains_generic_param() {
            return None;
        }

        if self.model.is_instance_of(return_type, wk.task_1)
            || self.model.is_instance_of(return_type, wk.value_task_1)
        {
            let awaited = return_type.generic_arguments().first()?;
            let (yields_sequence, element) = self.sequence_element(awaited);
            return Some((DataSourceShape::AsyncTask, yields_sequence, element));
        }
        if return_type.token() == Some(wk.task) || return_type.token() == Some(wk.value_task) {
            return None;
        }

        if let Some(sequence) = self
            .model
            .find_implementation(return_type, wk.async_enumerable_1)
        {
            let element = sequence.generic_arguments().first()?;
            return Some((
                DataSourceShape::AsyncEnumerable,
                true,
                self.element_shape(element),
            ));
        }

        let (yields_sequence, element) = self.sequence_element(return_type);
        Some((DataSourceShape::Method, yields_sequence, element))
    }

    fn sequence_element(&self, sig: &TypeSignature) -> (bool, ElementShape) {
        let wk = self.model.well_known();
        if *sig != TypeSignature::String && !self.is_object_row(sig) {
            if let Some(sequence) = self.model.find_implementation(sig, wk.enumerable_1) {
                if let Some(element) = sequence.generic_arguments().first() {
                    return (true, self.element_shape(element));
                }
            }
        }
        (false, self.element_shape(sig))
    }

    fn element_shape(&self, sig: &TypeSignature) -> ElementShape {
        let wk = self.model.well_known();
        if self.model.is_instance_of(sig, wk.func_1) {
            if let Some(inner) = sig.generic_arguments().first() {
                return ElementShape::Deferred(Box::new(self.element_shape(inner)));
            }
        }
        if self.is_object_row(sig) {
            return ElementShape::ObjectRow;
        }
        match TupleLayout::of(self.model, sig, NestedTuples::Preserve) {
            Some(layout) => ElementShape::Tuple(layout),
            None => ElementShape::Single(sig.clone()),
        }
    }

    fn is_object_row(&self, sig: &TypeSignature) -> bool {
        matches!(sig, TypeSignature::SzArray(element) if **element == TypeSignature::Object)
    }

    fn literal_type(&self, value: &AttributeArgument) -> TypeSignature {
        match value {
            AttributeArgument::Type(_) => TypeSignature::Class(self.model.well_known().system_type),
            other => other.static_type().unwrap_or(TypeSignature::Object),
        }
    }

    fn factory_key_text(&self, key: &FactoryKey) -> String {
        let owner = self.model.type_name(&key.declaring_type, TypeNameStyle::Identity);
        if key.arity == 0 {
            format!("{}.{}", owner, key.member)
        } else {
            format!("{}.{}/{}", owner, key.member, key.arity)
        }
    }

    fn allocate_wrapper_name(&self, key: &FactoryKey) -> String {
        let owner = self.model.type_name(&key.declaring_type, TypeNameStyle::Identity);
        let base = format!("{}__{}", safe_identifier(&owner), safe_identifier(&key.member));

        let mut candidate = base.clone();
        let mut suffix = 1;
        loop {
            let claimed = self
                .wrapper_names
                .entry(candidate.clone())
                .or_insert_with(|| key.clone());
            if *claimed.value() == *key {
                return candidate;
            }
            drop(claimed);
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
    }
}

/// Converts arbitrary text into a C# identifier fragment
#[must_use]
pub fn safe_identifier(text: &str) -> String {
    let mut out: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    while out.ends_with('_') {
        out.pop();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn render_literals(values: &[AttributeArgument]) -> String {
    values
        .iter()
        .map(|value| format!("{value:?}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Accessibility, MethodBuilder, ProgramBuilder, PropertyBuilder};

    fn mds(member: &str) -> DataSourceMarker {
        DataSourceMarker::MethodDataSource {
            class: None,
            member: member.to_string(),
            arguments: Vec::new(),
        }
    }

    #[test]
    fn test_method_shapes() {
        let program = ProgramBuilder::new("Demo.Tests");
        let ints = program.enumerable_of(TypeSignature::I4);
        let async_ints = program.async_enumerable_of(TypeSignature::I4);
        let task_list = program.task_of(program.list_of(TypeSignature::String));
        let value_task = program.value_task_of(TypeSignature::I8);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Sync").as_static().returns(ints))
            .method(MethodBuilder::new("Stream").as_static().returns(async_ints))
            .method(MethodBuilder::new("Later").as_static().returns(task_list))
            .method(MethodBuilder::new("One").as_static().returns(value_task))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let sync = analyzer.analyze(&mds("Sync"), &owner).unwrap();
        assert_eq!(sync.shape, DataSourceShape::Method);
        assert!(sync.yields_sequence);
        assert_eq!(sync.element, ElementShape::Single(TypeSignature::I4));

        let stream = analyzer.analyze(&mds("Stream"), &owner).unwrap();
        assert_eq!(stream.shape, DataSourceShape::AsyncEnumerable);

        let later = analyzer.analyze(&mds("Later"), &owner).unwrap();
        assert_eq!(later.shape, DataSourceShape::AsyncTask);
        assert!(later.yields_sequence);
        assert_eq!(later.element, ElementShape::Single(TypeSignature::String));

        let one = analyzer.analyze(&mds("One"), &owner).unwrap();
        assert_eq!(one.shape, DataSourceShape::AsyncTask);
        assert!(!one.yields_sequence);

        assert!(analyzer.has_async());
    }

    #[test]
    fn test_descriptor_shared_per_member() {
        let program = ProgramBuilder::new("Demo.Tests");
        let ints = program.enumerable_of(TypeSignature::I4);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Rows").as_static().returns(ints))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let first = analyzer.analyze(&mds("Rows"), &owner).unwrap();
        let second = analyzer.analyze(&mds("Rows"), &owner).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.wrapper_name.as_deref(), Some("Demo_Fixture__Rows"));
        assert_eq!(first.factory_key, "Demo.Fixture.Rows");
        assert_eq!(analyzer.descriptors().len(), 1);
    }

    #[test]
    fn test_wrapper_names_unique() {
        let program = ProgramBuilder::new("Demo.Tests");
        let ints = program.enumerable_of(TypeSignature::I4);
        let a = program
            .class("Demo", "A_B")
            .method(MethodBuilder::new("Rows").as_static().returns(ints.clone()))
            .build()
            .unwrap();
        let b = program
            .class("Demo.A", "B")
            .method(MethodBuilder::new("Rows").as_static().returns(ints))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");

        let first = analyzer.analyze(&mds("Rows"), &TypeSignature::Class(a)).unwrap();
        let second = analyzer.analyze(&mds("Rows"), &TypeSignature::Class(b)).unwrap();
        assert_ne!(first.wrapper_name, second.wrapper_name);
    }

    #[test]
    fn test_parameter_lists() {
        let program = ProgramBuilder::new("Demo.Tests");
        let ints = program.enumerable_of(TypeSignature::I4);
        let ct = program.cancellation_token();
        let fixture = program
            .class("Demo", "Fixture")
            .method(
                MethodBuilder::new("WithToken")
                    .as_static()
                    .param("token", ct.clone())
                    .returns(ints.clone()),
            )
            .method(
                MethodBuilder::new("WithCount")
                    .as_static()
                    .param("count", TypeSignature::I4)
                    .param("token", ct)
                    .returns(ints.clone()),
            )
            .method(
                MethodBuilder::new("TwoValues")
                    .as_static()
                    .param("a", TypeSignature::I4)
                    .param("b", TypeSignature::I4)
                    .returns(ints),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let token = analyzer.analyze(&mds("WithToken"), &owner).unwrap();
        assert!(matches!(
            token.producer,
            DataSourceProducer::Method { parameters: MemberParameters::CancellationToken, .. }
        ));

        let counted = analyzer
            .analyze(
                &DataSourceMarker::MethodDataSource {
                    class: None,
                    member: "WithCount".into(),
                    arguments: vec![AttributeArgument::I4(3)],
                },
                &owner,
            )
            .unwrap();
        assert!(matches!(
            counted.producer,
            DataSourceProducer::Method {
                parameters: MemberParameters::Supplied { count: 1, with_cancellation: true },
                ..
            }
        ));

        let unsupported = analyzer.analyze(&mds("TwoValues"), &owner);
        assert!(matches!(unsupported, Err(Error::DataSource { .. })));
    }

    #[test]
    fn test_missing_member() {
        let program = ProgramBuilder::new("Demo.Tests");
        let fixture = program.class("Demo", "Fixture").build().unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");

        let result = analyzer.analyze(&mds("Nope"), &TypeSignature::Class(fixture));
        assert!(matches!(result, Err(Error::MemberNotFound { member, .. }) if member == "Nope"));
    }

    #[test]
    fn test_property_source() {
        let program = ProgramBuilder::new("Demo.Tests");
        let strings = program.list_of(TypeSignature::String);
        let fixture = program
            .class("Demo", "Fixture")
            .property(PropertyBuilder::new("Names", strings).as_static())
            .property(
                PropertyBuilder::new("Hidden", TypeSignature::I4).setter(Accessibility::Public),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let names = analyzer.analyze(&mds("Names"), &owner).unwrap();
        assert!(matches!(
            names.producer,
            DataSourceProducer::Property { is_static: true, .. }
        ));
        assert_eq!(names.element, ElementShape::Single(TypeSignature::String));
    }

    #[test]
    fn test_tuple_and_deferred_elements() {
        let program = ProgramBuilder::new("Demo.Tests");
        let pair = program.tuple(vec![TypeSignature::I4, TypeSignature::String]);
        let rows = program.enumerable_of(pair.clone());
        let factories = program.enumerable_of(program.func_of(pair.clone()));
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Pairs").as_static().returns(rows))
            .method(MethodBuilder::new("Factories").as_static().returns(factories))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let pairs = analyzer.analyze(&mds("Pairs"), &owner).unwrap();
        assert!(matches!(&pairs.element, ElementShape::Tuple(layout) if layout.arity() == 2));
        assert!(matches!(
            analyzer.bind(&pairs, &[TypeSignature::I4, TypeSignature::String]).unwrap(),
            RowBinding::Unwrap(_)
        ));
        assert_eq!(analyzer.bind(&pairs, &[pair]).unwrap(), RowBinding::Whole);
        let three = [TypeSignature::I4, TypeSignature::I4, TypeSignature::I4];
        assert!(analyzer.bind(&pairs, &three).is_err());

        let deferred = analyzer.analyze(&mds("Factories"), &owner).unwrap();
        assert!(deferred.element.is_deferred());
        assert_eq!(
            deferred.element.element_types(),
            Some(vec![TypeSignature::I4, TypeSignature::String])
        );
    }

    #[test]
    fn test_literal_binding() {
        let program = ProgramBuilder::new("Demo.Tests");
        let fixture = program.class("Demo", "Fixture").build().unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let owner = TypeSignature::Class(fixture);

        let row = analyzer
            .analyze(
                &DataSourceMarker::Arguments {
                    values: vec![AttributeArgument::I4(1), AttributeArgument::String("a".into())],
                },
                &owner,
            )
            .unwrap();
        assert_eq!(row.shape, DataSourceShape::Eager);
        assert!(row.wrapper_name.is_none());
        assert_eq!(
            analyzer.bind(&row, &[TypeSignature::I4, TypeSignature::String]).unwrap(),
            RowBinding::Spread
        );
        assert!(analyzer.bind(&row, &[TypeSignature::I4]).is_err());
        assert!(analyzer.descriptors().is_empty());
    }

    #[test]
    fn test_safe_identifier() {
        assert_eq!(safe_identifier("Demo.Box<System.Int32>"), "Demo_Box_System_Int32");
        assert_eq!(safe_identifier("1st"), "_1st");
    }
}
