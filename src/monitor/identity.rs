use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// Registry key grouping every invocation of one method.
///
/// Rendered as `Type.method(arity)`. Only the parameter count takes part,
/// so two overloads that differ by parameter types but not by arity share
/// a timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MethodKey(String);

impl MethodKey {
    pub fn derive(type_name: &str, method: &str, arity: usize) -> Self {
        Self(format!("{type_name}.{method}({arity})"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of an instrumented call, supplied statically by whoever wraps
/// the call (the `method_identity!` macro or the HTTP route layer).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
    /// Module path of the declaring code. Used for matching only.
    namespace: Cow<'static, str>,
    type_name: Cow<'static, str>,
    method: Cow<'static, str>,
    arity: usize,
    key: MethodKey,
}

impl MethodIdentity {
    pub fn new(
        namespace: impl Into<Cow<'static, str>>,
        type_name: impl Into<Cow<'static, str>>,
        method: impl Into<Cow<'static, str>>,
        arity: usize,
    ) -> Self {
        let type_name = type_name.into();
        let method = method.into();
        let key = MethodKey::derive(&type_name, &method, arity);
        Self {
            namespace: namespace.into(),
            type_name,
            method,
            arity,
            key,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn key(&self) -> &MethodKey {
        &self.key
    }
}

/// Builds a [`MethodIdentity`] for the surrounding module.
///
/// ```ignore
/// let id = method_identity!("UserService", "find_user", 1);
/// ```
#[macro_export]
macro_rules! method_identity {
    ($type_name:expr, $method:expr, $arity:expr) => {
        $crate::monitor::MethodIdentity::new(module_path!(), $type_name, $method, $arity)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_deterministic() {
        let a = MethodKey::derive("UserService", "find_user", 1);
        let b = MethodKey::derive("UserService", "find_user", 1);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "UserService.find_user(1)");
    }

    #[test]
    fn arity_is_part_of_the_key() {
        let one = MethodKey::derive("UserService", "find_user", 1);
        let two = MethodKey::derive("UserService", "find_user", 2);
        assert_ne!(one, two);
    }

    #[test]
    fn declaring_type_is_part_of_the_key() {
        let a = MethodIdentity::new("app::a", "A", "foo", 1);
        let b = MethodIdentity::new("app::b", "B", "foo", 1);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn namespace_does_not_change_the_key() {
        let a = MethodIdentity::new("app::v1", "Orders", "list", 0);
        let b = MethodIdentity::new("app::v2", "Orders", "list", 0);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn macro_captures_module_path() {
        let id = crate::method_identity!("Probe", "run", 0);
        assert_eq!(id.namespace(), module_path!());
        assert_eq!(id.key().as_str(), "Probe.run(0)");
    }
}
