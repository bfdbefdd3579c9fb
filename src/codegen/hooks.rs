//! Hook registration sources.
//!
//! Every hook gets its own source file under `Hooks/{Family}/`, named after the hook and its
//! declaration index so the name is stable across runs. The file holds a module initializer
//! that registers a `HookMetadata` with a typed body lambda:
//!
//! ```csharp
//! Body = static (instance, context, cancellationToken) => global::Demo.Fixture.SetUp((global::Testscope.Core.ClassHookContext)context!),
//! ```

use strum::{Display, EnumIter};

use crate::{
    analysis::{
        safe_identifier, HookBinding, HookDescriptor, HookKind, HookMarker, HookResolver,
        HookSynchronicity, HookTiming,
    },
    codegen::writer::{string_literal, CodeWriter, GeneratedSource},
    config::GeneratorOptions,
    model::{ProgramModel, TypeNameStyle, TypeSignature},
    Result,
};

const VALUE_TASK: &str = "global::System.Threading.Tasks.ValueTask";

/// The four hook generation passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum HookFamily {
    /// `[Before(..)]`
    Before,
    /// `[After(..)]`
    After,
    /// `[BeforeEvery(..)]`
    BeforeEvery,
    /// `[AfterEvery(..)]`
    AfterEvery,
}

impl HookFamily {
    /// Family of a hook
    #[must_use]
    pub fn of(hook: &HookDescriptor) -> Self {
        match (hook.timing, hook.every) {
            (HookTiming::Before, false) => HookFamily::Before,
            (HookTiming::After, false) => HookFamily::After,
            (HookTiming::Before, true) => HookFamily::BeforeEvery,
            (HookTiming::After, true) => HookFamily::AfterEvery,
        }
    }
}

/// Writes hook registrations
pub struct HookEmitter<'a> {
    model: &'a ProgramModel,
    options: &'a GeneratorOptions,
    resolver: HookResolver<'a>,
}

impl<'a> HookEmitter<'a> {
    /// Creates an emitter
    #[must_use]
    pub fn new(model: &'a ProgramModel, options: &'a GeneratorOptions) -> Self {
        HookEmitter {
            model,
            options,
            resolver: HookResolver::new(model, model.assembly()),
        }
    }

    /// Hint name of the hook's source file
    #[must_use]
    pub fn hint_name(&self, hook: &HookDescriptor) -> String {
        format!(
            "Hooks/{}/{}_{}.g.cs",
            HookFamily::of(hook),
            safe_identifier(&hook.name),
            hook.declaration_index
        )
    }

    /// Renders the `static (instance, context, cancellationToken) => ..` body of a hook.
    ///
    /// The synthetic injection hook calls `InjectProperties` on `injector_class`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Synthesis`] if the hook method no longer resolves, or if an
    /// injection hook has no injector class.
    pub fn body_lambda(
        &self,
        hook: &HookDescriptor,
        injector_class: Option<&str>,
    ) -> Result<String> {
        let owner = self.model.type_name(&hook.owner, TypeNameStyle::Code);

        let method = match &hook.kind {
            HookKind::PropertyInjection => {
                let injector = injector_class
                    .ok_or_else(|| synthesis_error!("no injector for {}", hook.name))?;
                return Ok(format!(
                    "static (instance, context, cancellationToken) => {{ {}.InjectProperties(({})instance!); return {}.CompletedTask; }}",
                    injector, owner, VALUE_TASK
                ));
            }
            HookKind::Method(token) => self
                .model
                .get_method(*token)
                .ok_or_else(|| synthesis_error!("hook method {} not found", hook.name))?,
        };

        let context = TypeSignature::Class(self.resolver.context_type(&HookMarker {
            timing: hook.timing,
            every: hook.every,
            scope: hook.scope,
            order: hook.order,
        }));
        let mut arguments = Vec::new();
        if hook.parameters.takes_context() {
            arguments.push(format!(
                "({})context!",
                self.model.type_name(&context, TypeNameStyle::Code)
            ));
        }
        if hook.parameters.takes_cancellation() {
            arguments.push("cancellationToken".to_string());
        }

        let receiver = match hook.binding {
            HookBinding::Instance => format!("(({owner})instance!)"),
            HookBinding::Static => owner,
        };
        let call = format!("{}.{}({})", receiver, method.name, arguments.join(", "));

        let body = match hook.synchronicity {
            HookSynchronicity::Void => format!("{{ {call}; return {VALUE_TASK}.CompletedTask; }}"),
            HookSynchronicity::Task => format!("new {VALUE_TASK}({call})"),
            HookSynchronicity::ValueTask => call,
        };
        Ok(format!("static (instance, context, cancellationToken) => {body}"))
    }

    /// Renders the registration source of one declared hook.
    ///
    /// Returns `None` for the synthetic injection hook, which is registered with its test
    /// class.
    ///
    /// # Errors
    ///
    /// See [`HookEmitter::body_lambda`].
    pub fn emit(&self, hook: &HookDescriptor) -> Result<Option<GeneratedSource>> {
        if hook.kind == HookKind::PropertyInjection {
            return Ok(None);
        }

        let runtime = &self.options.runtime_namespace;
        let family = HookFamily::of(hook);
        let class_name = format!(
            "{}_{}_{}",
            family,
            safe_identifier(&hook.name),
            hook.declaration_index
        );
        let body = self.body_lambda(hook, None)?;

        let mut writer = CodeWriter::with_header();
        writer.open(format!("namespace {}.Hooks", self.options.generated_namespace));
        writer.open(format!("internal static class {class_name}"));
        writer.line("[global::System.Runtime.CompilerServices.ModuleInitializer]");
        writer.open("internal static void Register()");
        writer.open(format!(
            "global::{runtime}.HookRegistry.Register(new global::{runtime}.HookMetadata"
        ));
        writer.lines([
            format!("Name = {},", string_literal(&hook.name)),
            format!(
                "DeclaringType = typeof({}),",
                self.model.type_name(&hook.owner, TypeNameStyle::Code)
            ),
            format!("Scope = global::{runtime}.HookScope.{},", hook.scope.as_str()),
            format!("Family = global::{runtime}.HookFamily.{family},"),
            format!("Order = {},", hook.order),
            format!("DeclarationIndex = {},", hook.declaration_index),
            format!("IsStatic = {},", hook.binding == HookBinding::Static),
            format!("Body = {body},"),
        ]);
        writer.close_with("});");
        writer.close();
        writer.close();
        writer.close();

        Ok(Some(GeneratedSource::new(self.hint_name(hook), writer.finish())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::HookScope,
        model::{MethodBuilder, ProgramBuilder},
        test::attributes,
    };

    #[test]
    fn test_family_of() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let fixture = program
            .class("Demo", "Fixture")
            .method(
                MethodBuilder::new("Every")
                    .as_static()
                    .attribute(attrs.after_every(HookScope::Test)),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let resolver = HookResolver::new(&model, "Demo.Tests");
        let method = model.find_method(fixture, "Every").unwrap();
        let hook = resolver
            .descriptor(&method, &TypeSignature::Class(fixture), 0)
            .unwrap();
        assert_eq!(HookFamily::of(&hook), HookFamily::AfterEvery);
        assert_eq!(HookFamily::AfterEvery.to_string(), "AfterEvery");
    }

    #[test]
    fn test_emit_class_hook() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let task = program.task();
        let fixture = program
            .class("Demo", "Fixture")
            .method(
                MethodBuilder::new("SetUp")
                    .as_static()
                    .returns(task)
                    .attribute(attrs.before(HookScope::Class)),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let options = GeneratorOptions::default();
        let hooks = HookResolver::new(&model, "Demo.Tests")
            .resolve(&TypeSignature::Class(fixture), false);
        let emitter = HookEmitter::new(&model, &options);

        let source = emitter.emit(&hooks.before_class[0]).unwrap().unwrap();
        assert_eq!(source.hint_name, "Hooks/Before/Demo_Fixture_SetUp_0.g.cs");
        assert!(source
            .text
            .contains("[global::System.Runtime.CompilerServices.ModuleInitializer]"));
        assert!(source.text.contains("HookRegistry.Register("));
        assert!(source.text.contains(
            "new global::System.Threading.Tasks.ValueTask(global::Demo.Fixture.SetUp())"
        ));
        assert!(source.text.contains("IsStatic = true,"));
    }

    #[test]
    fn test_instance_hook_with_context() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let context = TypeSignature::Class(program.well_known().test_context);
        let ct = program.cancellation_token();
        let fixture = program
            .class("Demo", "Fixture")
            .method(
                MethodBuilder::new("Prepare")
                    .param("context", context)
                    .param("token", ct)
                    .attribute(attrs.before(HookScope::Test)),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let options = GeneratorOptions::default();
        let hooks = HookResolver::new(&model, "Demo.Tests")
            .resolve(&TypeSignature::Class(fixture), true);
        let emitter = HookEmitter::new(&model, &options);

        let injection = emitter
            .body_lambda(&hooks.before_test[0], Some("global::Gen.Demo_Fixture_Tests"))
            .unwrap();
        assert!(injection.contains(
            "global::Gen.Demo_Fixture_Tests.InjectProperties((global::Demo.Fixture)instance!)"
        ));
        assert!(emitter.emit(&hooks.before_test[0]).unwrap().is_none());

        let prepare = emitter.body_lambda(&hooks.before_test[1], None).unwrap();
        assert!(prepare.contains("((global::Demo.Fixture)instance!).Prepare("));
        assert!(prepare.contains("context!, cancellationToken); return"));
    }
}
