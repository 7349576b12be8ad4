use crate::deferred::DeferredObject;
use crate::error::DeferResult;
use crate::proxy::FieldGroupMap;
use crate::value::ResolvedValue;

/// Capability required of any type materialized through deferred loading.
///
/// The trait gives the injection mechanism three things: a way to construct
/// an unpopulated instance, a way to ask whether a field already holds a
/// value, and a privileged per-field write. The write is reserved for the
/// injection mechanism; it is not a general mutation API.
pub trait Deferrable: Sized {
    /// Stable fully-qualified name of the type, used to key proxy plan
    /// artifacts. Override only if `std::any::type_name` is not stable
    /// enough for the deployment (e.g. across differently-built binaries
    /// sharing one cache directory).
    fn type_name() -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// The type's instance methods eligible for interception. Methods not
    /// listed here are never intercepted, even if the group map names them.
    fn methods() -> &'static [&'static str];

    /// Declarative mapping from method name to the fields that method needs
    /// injected before it may run. Methods absent from the map are
    /// forwarded without any loading.
    fn field_groups() -> FieldGroupMap;

    /// Constructs a fresh, unpopulated instance. The deferred object is
    /// passed as loader context; the hook must not inject any field data
    /// itself.
    fn import(defer: &DeferredObject<Self>) -> DeferResult<Self>;

    /// Whether the instance's current value for `field` is already set.
    /// Unknown field names are a data mismatch.
    fn field_is_set(&self, field: &str) -> DeferResult<bool>;

    /// Privileged field write used only by the injection mechanism.
    /// Unknown field names and unacceptable value shapes are a data
    /// mismatch.
    fn inject_field(&mut self, field: &str, value: ResolvedValue<Self>) -> DeferResult<()>;
}
