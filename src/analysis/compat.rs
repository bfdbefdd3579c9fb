//! Reflection usage advisory.
//!
//! Scans the invocation sites recorded in the program model for reflection APIs that break
//! under trimming and ahead-of-time compilation. Each hit is either *handled* (the generated
//! code already provides a replacement, or the call lives in generated or generator code) or
//! *unhandled*, in which case the generator reports a warning.

use std::fmt;

use strum::{Display, EnumIter, IntoStaticStr};

use crate::model::{InvocationSite, Location, ProgramModel};

/// Reflection API families that are tracked
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, IntoStaticStr,
)]
pub enum ReflectionCall {
    /// `Type.GetType(string)`
    TypeGetType,
    /// `Type.MakeGenericType(..)`
    MakeGenericType,
    /// `MethodInfo.Invoke(..)`
    MethodInvoke,
    /// `GetField` / `GetFields`
    FieldLookup,
    /// `GetProperty` / `GetProperties`
    PropertyLookup,
    /// `GetMethod` / `GetMethods`
    MethodLookup,
    /// `Activator.CreateInstance(..)`
    ActivatorCreateInstance,
    /// `FieldInfo` / `PropertyInfo` `GetValue` and `SetValue`
    MemberValueAccess,
}

impl ReflectionCall {
    /// Classifies a call by receiver type and member name
    #[must_use]
    pub fn classify(receiver: &str, member: &str) -> Option<Self> {
        let reflection_member = ["FieldInfo", "PropertyInfo", "MethodInfo"]
            .iter()
            .any(|name| receiver.contains(name));

        match member {
            "GetType" if receiver == "System.Type" || receiver == "Type" => {
                Some(ReflectionCall::TypeGetType)
            }
            "MakeGenericType" => Some(ReflectionCall::MakeGenericType),
            "Invoke" if receiver.contains("MethodInfo") || receiver.contains("MethodBase") => {
                Some(ReflectionCall::MethodInvoke)
            }
            "GetField" | "GetFields" => Some(ReflectionCall::FieldLookup),
            "GetProperty" | "GetProperties" => Some(ReflectionCall::PropertyLookup),
            "GetMethod" | "GetMethods" => Some(ReflectionCall::MethodLookup),
            "CreateInstance" if receiver.contains("Activator") => {
                Some(ReflectionCall::ActivatorCreateInstance)
            }
            "GetValue" | "SetValue" if reflection_member => Some(ReflectionCall::MemberValueAccess),
            _ => None,
        }
    }
}

/// One detected reflection call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionUsage {
    /// API family
    pub call: ReflectionCall,
    /// Invoked member name
    pub member: String,
    /// Receiver type name
    pub receiver: String,
    /// `Type.Method` containing the call
    pub context: String,
    /// A generated replacement exists or the call is exempt
    pub handled: bool,
    /// Call site
    pub location: Option<Location>,
}

impl fmt::Display for ReflectionUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {} in {}", self.member, self.receiver, self.context)
    }
}

/// Finds reflection calls in recorded invocation sites
pub struct ReflectionUsageAnalyzer<'a> {
    model: &'a ProgramModel,
    generated_namespace: &'a str,
}

impl<'a> ReflectionUsageAnalyzer<'a> {
    /// Creates an analyzer; calls inside `generated_namespace` count as handled
    #[must_use]
    pub fn new(model: &'a ProgramModel, generated_namespace: &'a str) -> Self {
        ReflectionUsageAnalyzer {
            model,
            generated_namespace,
        }
    }

    /// Returns every reflection call in the model, in recording order
    #[must_use]
    pub fn analyze(&self) -> Vec<ReflectionUsage> {
        self.model
            .invocations()
            .filter_map(|site| self.inspect(site))
            .collect()
    }

    /// Classifies a single call site, `None` if it is not a tracked reflection call
    #[must_use]
    pub fn inspect(&self, site: &InvocationSite) -> Option<ReflectionUsage> {
        let call = ReflectionCall::classify(&site.receiver, &site.member)?;

        let containing = self.model.get_type(site.containing_type);
        let class_name = containing
            .as_ref()
            .map_or_else(|| "Unknown".to_string(), |symbol| symbol.name.clone());
        let method_name = site
            .containing_method
            .and_then(|token| self.model.get_method(token))
            .map_or_else(|| "Unknown".to_string(), |method| method.name.clone());

        let exempt = containing.as_ref().is_some_and(|symbol| {
            symbol.namespace == self.generated_namespace
                || symbol
                    .namespace
                    .starts_with(&format!("{}.", self.generated_namespace))
                || symbol.name.ends_with("Generator")
        });
        let replaced = match call {
            ReflectionCall::TypeGetType
            | ReflectionCall::MakeGenericType
            | ReflectionCall::MethodInvoke => true,
            ReflectionCall::FieldLookup => {
                site.member == "GetFields"
                    && (method_name.contains("Tuple") || method_name.contains("Convert"))
            }
            _ => false,
        };

        Some(ReflectionUsage {
            call,
            member: site.member.clone(),
            receiver: site.receiver.clone(),
            context: format!("{class_name}.{method_name}"),
            handled: exempt || replaced,
            location: site.location.clone(),
        })
    }
}
