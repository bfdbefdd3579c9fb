//! Data source wrappers and the sync-over-async adapter.
//!
//! Every shared member-based [`DataSourceDescriptor`] gets one synchronous wrapper in the
//! generated `DataSourceWrappers` class. A wrapper takes the attribute-supplied arguments as
//! an `object?[]` and yields one element per produced row; deferred `Func<T>` elements are
//! invoked as the sequence is enumerated.
//!
//! Async shapes go through two shared helpers, `ConvertToSync` for `IAsyncEnumerable<T>`
//! and `TryAwaitSync` for `Task<T>`. Both bound each step, including the final dispose, by
//! [`GeneratorOptions::async_step_timeout`] on a dedicated `CancellationTokenSource`. What
//! happens on expiry is decided by [`AsyncTimeoutPolicy`]; a truncated task yields nothing,
//! whether it produces one element or a whole sequence.
//!
//! How an element becomes an argument row is decided per consumer by the record's
//! [`RowBinding`] and emitted by [`emit_rows`].

use std::{sync::Arc, time::Duration};

use crate::{
    analysis::{
        DataSourceDescriptor, DataSourceProducer, DataSourceShape, ElementShape,
        MemberParameters, RowBinding, WRAPPER_CLASS,
    },
    codegen::{
        literals::render_literal,
        tuples::emit_unwrap,
        writer::{string_literal, CodeWriter, GeneratedSource},
    },
    config::{AsyncTimeoutPolicy, GeneratorOptions},
    model::{AttributeArgument, ProgramModel, TypeNameStyle, TypeSignature},
    synth::RecordDataSource,
    Error, Result,
};

/// File name of the generated wrapper class
pub const WRAPPERS_HINT: &str = "DataSourceWrappers.g.cs";

const CANCELLATION_NONE: &str = "global::System.Threading.CancellationToken.None";

/// Emits the `DataSourceWrappers` class
pub struct DataSourceEmitter<'a> {
    model: &'a ProgramModel,
    options: &'a GeneratorOptions,
}

impl<'a> DataSourceEmitter<'a> {
    /// Creates an emitter
    #[must_use]
    pub fn new(model: &'a ProgramModel, options: &'a GeneratorOptions) -> Self {
        DataSourceEmitter { model, options }
    }

    /// Emits all wrappers for the shared descriptors, `None` when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MemberNotFound`] if a descriptor's producing member has disappeared
    /// from the model.
    pub fn emit(
        &self,
        descriptors: &[Arc<DataSourceDescriptor>],
    ) -> Result<Option<GeneratedSource>> {
        if descriptors.is_empty() {
            return Ok(None);
        }

        let mut writer = CodeWriter::with_header();
        writer.open(format!("namespace {}", self.options.generated_namespace));
        writer.open(format!("public static class {WRAPPER_CLASS}"));

        for descriptor in descriptors {
            self.emit_wrapper(&mut writer, descriptor)?;
            writer.blank();
        }

        emit_row_helper(&mut writer);
        if descriptors.iter().any(|descriptor| descriptor.shape.is_async()) {
            writer.blank();
            self.emit_async_adapter(&mut writer);
        }

        writer.close();
        writer.close();
        Ok(Some(GeneratedSource::new(WRAPPERS_HINT, writer.finish())))
    }

    fn emit_wrapper(
        &self,
        writer: &mut CodeWriter,
        descriptor: &DataSourceDescriptor,
    ) -> Result<()> {
        let Some(name) = &descriptor.wrapper_name else {
            return Ok(());
        };

        writer.line(format!("// {}", descriptor.factory_key));
        writer.open(format!(
            "public static global::System.Collections.Generic.IEnumerable<object?> {name}(object?[] arguments)"
        ));

        let member = string_literal(&descriptor.factory_key);
        let element = |item: &str| element_expression(&descriptor.element, item);

        match &descriptor.producer {
            DataSourceProducer::Generator { attribute_class, is_async } => {
                let attribute = self
                    .model
                    .type_name(&TypeSignature::Class(*attribute_class), TypeNameStyle::Code);
                if *is_async {
                    writer.open(format!(
                        "foreach (var factory in ConvertToSync(ct => new {attribute}().GenerateDataSourcesAsync(ct), {member}))"
                    ));
                } else {
                    writer.open(format!(
                        "foreach (var factory in new {attribute}().GenerateDataSources())"
                    ));
                }
                writer.line(format!("yield return {};", element("factory")));
                writer.close();
            }
            DataSourceProducer::Method { .. } | DataSourceProducer::Property { .. } => {
                let call = self.member_call(descriptor)?;
                match descriptor.shape {
                    DataSourceShape::AsyncEnumerable => {
                        writer.open(format!(
                            "foreach (var item in ConvertToSync(ct => {call}, {member}))"
                        ));
                        writer.line(format!("yield return {};", element("item")));
                        writer.close();
                    }
                    DataSourceShape::AsyncTask => {
                        let task = if self.returns_value_task(descriptor) {
                            format!("{call}.AsTask()")
                        } else {
                            call
                        };
                        writer.open(format!(
                            "if (TryAwaitSync(ct => {task}, {member}, out var awaited))"
                        ));
                        if descriptor.yields_sequence {
                            writer.open("foreach (var item in awaited)");
                            writer.line(format!("yield return {};", element("item")));
                            writer.close();
                        } else {
                            writer.line(format!("yield return {};", element("awaited")));
                        }
                        writer.close();
                    }
                    DataSourceShape::Method | DataSourceShape::Eager => {
                        if descriptor.yields_sequence {
                            writer.open(format!("foreach (var item in {call})"));
                            writer.line(format!("yield return {};", element("item")));
                            writer.close();
                        } else {
                            writer.line(format!("yield return {};", element(&call)));
                        }
                    }
                }
            }
            DataSourceProducer::Literal { .. }
            | DataSourceProducer::Matrix { .. }
            | DataSourceProducer::ClassConstruction { .. } => {
                writer.line("yield break;");
            }
        }

        writer.close();
        Ok(())
    }

    /// Renders the call producing the source value; async shapes refer to the adapter's `ct`
    fn member_call(&self, descriptor: &DataSourceDescriptor) -> Result<String> {
        let owner = self
            .model
            .type_name(&descriptor.declaring_type, TypeNameStyle::Code);
        let token = if descriptor.shape.is_async() { "ct" } else { CANCELLATION_NONE };

        match &descriptor.producer {
            DataSourceProducer::Method {
                method,
                is_static,
                parameters,
            } => {
                let symbol = self.model.get_method(*method).ok_or_else(|| Error::MemberNotFound {
                    owner: owner.clone(),
                    member: descriptor.member_name.clone(),
                })?;
                let type_args = descriptor.declaring_type.generic_arguments();

                let mut arguments = Vec::new();
                match parameters {
                    MemberParameters::None => {}
                    MemberParameters::CancellationToken => arguments.push(token.to_string()),
                    MemberParameters::Supplied {
                        count,
                        with_cancellation,
                    } => {
                        let supplied = symbol.parameters.iter().take(*count);
                        for (index, parameter) in supplied.enumerate() {
                            let sig = parameter.signature.substitute(type_args, &[]);
                            arguments.push(format!(
                                "({})arguments[{}]!",
                                self.model.type_name(&sig, TypeNameStyle::Code),
                                index
                            ));
                        }
                        if *with_cancellation {
                            arguments.push(token.to_string());
                        }
                    }
                }

                let receiver = if *is_static { owner } else { format!("new {owner}()") };
                Ok(format!(
                    "{}.{}({})",
                    receiver,
                    descriptor.member_name,
                    arguments.join(", ")
                ))
            }
            DataSourceProducer::Property { is_static, .. } => {
                let receiver = if *is_static { owner } else { format!("new {owner}()") };
                Ok(format!("{}.{}", receiver, descriptor.member_name))
            }
            _ => Err(synthesis_error!(
                "{} is not produced by a member",
                descriptor.factory_key
            )),
        }
    }

    fn returns_value_task(&self, descriptor: &DataSourceDescriptor) -> bool {
        let value_task = self.model.well_known().value_task_1;
        let returned = match &descriptor.producer {
            DataSourceProducer::Method { method, .. } => self
                .model
                .get_method(*method)
                .map(|symbol| symbol.return_type.clone()),
            DataSourceProducer::Property { property, .. } => self
                .model
                .get_property(*property)
                .map(|symbol| symbol.signature.clone()),
            _ => None,
        };
        returned.is_some_and(|sig| self.model.is_instance_of(&sig, value_task))
    }

    fn emit_async_adapter(&self, writer: &mut CodeWriter) {
        let wait = timeout_expression(self.options.async_step_timeout);
        let seconds = self.options.async_step_timeout.as_secs_f64();
        let timeout_message = format!(
            "$\"Async data source '{{member}}' did not produce a value within {seconds} seconds\""
        );

        writer.open(
            "private static global::System.Collections.Generic.IEnumerable<T> ConvertToSync<T>(global::System.Func<global::System.Threading.CancellationToken, global::System.Collections.Generic.IAsyncEnumerable<T>> factory, string member)",
        );
        writer.line("var cts = new global::System.Threading.CancellationTokenSource();");
        writer.line("var enumerator = factory(cts.Token).GetAsyncEnumerator(cts.Token);");
        writer.open("try");
        writer.open("while (true)");
        writer.line("bool moved;");
        writer.open("try");
        writer.line("var step = enumerator.MoveNextAsync().AsTask();");
        writer.open(format!("if (!step.Wait({wait}))"));
        writer.line("cts.Cancel();");
        match self.options.async_timeout_policy {
            AsyncTimeoutPolicy::Fail => {
                writer.line(format!(
                    "throw new global::System.TimeoutException({timeout_message});"
                ));
            }
            AsyncTimeoutPolicy::Truncate => {
                writer.line("break;");
            }
        }
        writer.close();
        writer.line("moved = step.Result;");
        writer.close();
        writer.open(
            "catch (global::System.AggregateException ae) when (ae.InnerException is global::System.OperationCanceledException)",
        );
        writer.line("break;");
        writer.close();
        writer.open("if (!moved)");
        writer.line("break;");
        writer.close();
        writer.line("yield return enumerator.Current;");
        writer.close();
        writer.close();
        writer.open("finally");
        writer.open("try");
        writer.line(format!("enumerator.DisposeAsync().AsTask().Wait({wait});"));
        writer.close();
        writer.line("catch { }");
        writer.line("cts.Dispose();");
        writer.close();
        writer.close();
        writer.blank();

        writer.open(
            "private static bool TryAwaitSync<T>(global::System.Func<global::System.Threading.CancellationToken, global::System.Threading.Tasks.Task<T>> factory, string member, out T result)",
        );
        writer.line("var cts = new global::System.Threading.CancellationTokenSource();");
        writer.open("try");
        writer.line("var task = factory(cts.Token);");
        writer.open(format!("if (!task.Wait({wait}))"));
        writer.line("cts.Cancel();");
        match self.options.async_timeout_policy {
            AsyncTimeoutPolicy::Fail => {
                writer.line(format!(
                    "throw new global::System.TimeoutException({timeout_message});"
                ));
            }
            AsyncTimeoutPolicy::Truncate => {
                writer.line("result = default!;");
                writer.line("return false;");
            }
        }
        writer.close();
        writer.line("result = task.Result;");
        writer.line("return true;");
        writer.close();
        writer.open("finally");
        writer.line("cts.Dispose();");
        writer.close();
        writer.close();
    }
}

/// Renders the `static () => IEnumerable<object?[]>` row factory of one record data source
#[must_use]
pub fn rows_factory(
    model: &ProgramModel,
    options: &GeneratorOptions,
    source: &RecordDataSource,
) -> String {
    let mut writer = CodeWriter::new();
    emit_rows(&mut writer, model, options, source);
    writer.finish().trim_end().to_string()
}

/// Writes the row factory of one record data source
pub fn emit_rows(
    writer: &mut CodeWriter,
    model: &ProgramModel,
    options: &GeneratorOptions,
    source: &RecordDataSource,
) {
    let descriptor = &source.descriptor;

    match &descriptor.producer {
        DataSourceProducer::Literal { values } => {
            writer.line(format!(
                "static () => new object?[][] {{ {} }}",
                object_array(model, values)
            ));
        }
        DataSourceProducer::Matrix { values } => {
            let rows: Vec<String> = values
                .iter()
                .map(|value| format!("new object?[] {{ {} }}", render_literal(model, value)))
                .collect();
            writer.line(format!("static () => new object?[][] {{ {} }}", rows.join(", ")));
        }
        DataSourceProducer::ClassConstruction { types } => {
            let instances: Vec<String> = types
                .iter()
                .map(|sig| format!("new {}()", model.type_name(sig, TypeNameStyle::Code)))
                .collect();
            writer.line(format!(
                "static () => new object?[][] {{ new object?[] {{ {} }} }}",
                instances.join(", ")
            ));
        }
        _ => {
            let Some(wrapper) = &descriptor.wrapper_name else {
                writer.line("static () => global::System.Array.Empty<object?[]>()");
                return;
            };
            let call = format!(
                "global::{}.{}.{}({})",
                options.generated_namespace,
                WRAPPER_CLASS,
                wrapper,
                object_array(model, &source.supplied)
            );

            match &source.binding {
                RowBinding::Whole => writer.line(format!(
                    "static () => global::System.Linq.Enumerable.Select({call}, static element => new object?[] {{ element }})"
                )),
                RowBinding::Spread => writer.line(format!(
                    "static () => global::System.Linq.Enumerable.Select({call}, static element => (object?[])element!)"
                )),
                RowBinding::Unwrap(layout) => {
                    writer.open(format!(
                        "static () => global::System.Linq.Enumerable.Select({call}, static element =>"
                    ));
                    emit_unwrap(writer, model, layout, "element", "row");
                    writer.line("return row;");
                    writer.close_with("})")
                }
            };
        }
    }
}

/// Renders `new object?[] { .. }`, or an empty array for no values
#[must_use]
pub fn object_array(model: &ProgramModel, values: &[AttributeArgument]) -> String {
    if values.is_empty() {
        return "global::System.Array.Empty<object?>()".to_string();
    }
    let values: Vec<String> = values
        .iter()
        .map(|value| render_literal(model, value))
        .collect();
    format!("new object?[] {{ {} }}", values.join(", "))
}

fn element_expression(element: &ElementShape, item: &str) -> String {
    match element {
        ElementShape::Deferred(inner) => element_expression(inner, &format!("{item}()")),
        ElementShape::Columns(types) if types.len() > 1 => format!("ToRow({item})"),
        _ => item.to_string(),
    }
}

fn emit_row_helper(writer: &mut CodeWriter) {
    writer.open("private static object?[] ToRow(object? value)");
    writer.open("if (value is object?[] row)");
    writer.line("return row;");
    writer.close();
    writer.line("var tuple = (global::System.Runtime.CompilerServices.ITuple)value!;");
    writer.line("var values = new object?[tuple.Length];");
    writer.open("for (var i = 0; i < values.Length; i++)");
    writer.line("values[i] = tuple[i];");
    writer.close();
    writer.line("return values;");
    writer.close();
}

fn timeout_expression(timeout: Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("global::System.TimeSpan.FromSeconds({})", timeout.as_secs())
    } else {
        format!("global::System.TimeSpan.FromMilliseconds({})", timeout.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{DataSourceAnalyzer, DataSourceMarker},
        model::{MethodBuilder, ProgramBuilder},
    };

    fn marker(member: &str) -> DataSourceMarker {
        DataSourceMarker::MethodDataSource {
            class: None,
            member: member.to_string(),
            arguments: Vec::new(),
        }
    }

    #[test]
    fn test_sync_wrapper() {
        let program = ProgramBuilder::new("Demo.Tests");
        let ints = program.enumerable_of(TypeSignature::I4);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Rows").as_static().returns(ints))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        analyzer
            .analyze(&marker("Rows"), &TypeSignature::Class(fixture))
            .unwrap();

        let options = GeneratorOptions::default();
        let source = DataSourceEmitter::new(&model, &options)
            .emit(&analyzer.descriptors())
            .unwrap()
            .unwrap();
        assert_eq!(source.hint_name, WRAPPERS_HINT);
        assert!(source.text.contains("public static class DataSourceWrappers"));
        assert!(source.text.contains("Demo_Fixture__Rows(object?[] arguments)"));
        assert!(source.text.contains("foreach (var item in global::Demo.Fixture.Rows())"));
        assert!(!source.text.contains("ConvertToSync"));
    }

    #[test]
    fn test_async_adapter_policies() {
        let program = ProgramBuilder::new("Demo.Tests");
        let stream = program.async_enumerable_of(TypeSignature::I4);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Stream").as_static().returns(stream))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        analyzer
            .analyze(&marker("Stream"), &TypeSignature::Class(fixture))
            .unwrap();
        let descriptors = analyzer.descriptors();

        let strict = GeneratorOptions::default();
        let text = DataSourceEmitter::new(&model, &strict)
            .emit(&descriptors)
            .unwrap()
            .unwrap()
            .text;
        assert!(text.contains("ConvertToSync(ct => global::Demo.Fixture.Stream()"));
        assert!(text.contains("TimeSpan.FromSeconds(30)"));
        assert!(text.contains("throw new global::System.TimeoutException("));
        assert!(text.contains(
            "enumerator.DisposeAsync().AsTask().Wait(global::System.TimeSpan.FromSeconds(30));"
        ));
        assert!(!text.contains(".Wait();"));
        assert!(text.contains("cts.Dispose();"));

        let legacy = GeneratorOptions::legacy();
        let text = DataSourceEmitter::new(&model, &legacy)
            .emit(&descriptors)
            .unwrap()
            .unwrap()
            .text;
        assert!(!text.contains("TimeoutException"));
        assert!(text.contains("break;"));
    }

    #[test]
    fn test_awaited_sequence_truncates_to_nothing() {
        let program = ProgramBuilder::new("Demo.Tests");
        let later = program.task_of(program.list_of(TypeSignature::String));
        let single = program.task_of(TypeSignature::I4);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Later").as_static().returns(later))
            .method(MethodBuilder::new("One").as_static().returns(single))
            .build()
            .unwrap();
        let model = program.finish();
        let analyzer = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let class = TypeSignature::Class(fixture);
        let sequence = analyzer.analyze(&marker("Later"), &class).unwrap();
        assert_eq!(sequence.shape, DataSourceShape::AsyncTask);
        assert!(sequence.yields_sequence);
        analyzer.analyze(&marker("One"), &class).unwrap();

        let legacy = GeneratorOptions::legacy();
        let text = DataSourceEmitter::new(&model, &legacy)
            .emit(&analyzer.descriptors())
            .unwrap()
            .unwrap()
            .text;
        assert!(text.contains(
            "if (TryAwaitSync(ct => global::Demo.Fixture.Later(), \"Demo.Fixture.Later\", out var awaited))"
        ));
        assert!(text.contains("foreach (var item in awaited)"));
        assert!(text.contains("yield return awaited;"));
        assert!(text.contains("result = default!;"));
        assert!(text.contains("return false;"));
        assert!(!text.contains("private static T AwaitSync"));
        assert!(!text.contains("TimeoutException"));
    }

    #[test]
    fn test_no_descriptors() {
        let model = ProgramBuilder::new("Demo.Tests").finish();
        let options = GeneratorOptions::default();
        assert!(DataSourceEmitter::new(&model, &options).emit(&[]).unwrap().is_none());
    }

    #[test]
    fn test_timeout_expression() {
        assert_eq!(
            timeout_expression(Duration::from_secs(5)),
            "global::System.TimeSpan.FromSeconds(5)"
        );
        assert_eq!(
            timeout_expression(Duration::from_millis(1500)),
            "global::System.TimeSpan.FromMilliseconds(1500)"
        );
    }

    #[test]
    fn test_object_array() {
        let model = ProgramBuilder::new("Demo.Tests").finish();
        assert_eq!(object_array(&model, &[]), "global::System.Array.Empty<object?>()");
        assert_eq!(
            object_array(&model, &[AttributeArgument::I4(1), AttributeArgument::Bool(true)]),
            "new object?[] { 1, true }"
        );
    }
}
