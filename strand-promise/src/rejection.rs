use std::any::{self, Any};
use std::error::Error;
use std::fmt;
use std::rc::Rc;

/// An error type that participates in typed rejection matching.
///
/// Rust has no subtype hierarchy to catch by, so the catch chain is spelled
/// out on the type: [`Catchable::parent`] names the next error a typed
/// [`fail`] handler may match in place of the concrete payload. The default
/// is a chain of one.
///
/// [`fail`]: crate::Promise::fail
pub trait Catchable: Error + Any {
    /// The next error in this type's catch chain, if any.
    fn parent(&self) -> Option<&dyn Catchable> {
        None
    }
}

/// A settled rejection: the type-erased carrier for whatever value the
/// producer rejected with or a handler failed with.
///
/// The carrier is cheap to clone and shared by every chain link a rejection
/// flows through. Matching is typed: [`Rejection::downcast_ref`] recovers
/// the payload at its concrete type, at any ancestor type in its
/// [`Catchable`] chain (when stored via [`Rejection::from_error`]), or as
/// `&Rejection` itself, which always matches and serves as the catch-all.
#[derive(Clone)]
pub struct Rejection {
    payload: Rc<dyn Any>,
    type_name: &'static str,
    as_catchable: Option<fn(&dyn Any) -> &dyn Catchable>,
}

fn catchable_view<E: Catchable>(payload: &dyn Any) -> &dyn Catchable {
    payload
        .downcast_ref::<E>()
        .expect("rejection payload matches its recorded type")
}

impl Rejection {
    /// Wrap an arbitrary payload.
    ///
    /// A payload that is already a `Rejection` is passed through rather than
    /// nested, so re-throwing a caught rejection keeps typed matching
    /// intact.
    pub fn new<E: Any>(payload: E) -> Self {
        let payload: Box<dyn Any> = Box::new(payload);
        match payload.downcast::<Rejection>() {
            Ok(carried) => *carried,
            Err(payload) => Self {
                payload: Rc::from(payload),
                type_name: any::type_name::<E>(),
                as_catchable: None,
            },
        }
    }

    /// Wrap an error payload, recording its catch chain.
    ///
    /// Unlike [`Rejection::new`], typed handlers can then match any ancestor
    /// named by the payload's [`Catchable::parent`] chain, not just the
    /// concrete type.
    pub fn from_error<E: Catchable>(err: E) -> Self {
        Self {
            payload: Rc::new(err),
            type_name: any::type_name::<E>(),
            as_catchable: Some(catchable_view::<E>),
        }
    }

    /// The payload at type `E`, if it matches.
    ///
    /// `E = Rejection` returns the carrier itself and therefore always
    /// matches.
    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        if let Some(catch_all) = <dyn Any>::downcast_ref::<E>(self) {
            return Some(catch_all);
        }
        if let Some(hit) = self.payload.downcast_ref::<E>() {
            return Some(hit);
        }
        if let Some(view) = self.as_catchable {
            let mut link = view(self.payload.as_ref()).parent();
            while let Some(ancestor) = link {
                let any: &dyn Any = ancestor;
                if let Some(hit) = any.downcast_ref::<E>() {
                    return Some(hit);
                }
                link = ancestor.parent();
            }
        }
        None
    }

    /// Whether [`Rejection::downcast_ref`] would match type `E`.
    pub fn is<E: Any>(&self) -> bool {
        self.downcast_ref::<E>().is_some()
    }

    /// The `type_name` of the stored payload; diagnostic only.
    pub fn payload_type(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_catchable {
            Some(view) => write!(
                f,
                "Rejection({}: {})",
                self.type_name,
                view(self.payload.as_ref())
            ),
            None => write!(f, "Rejection({})", self.type_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("request refused")]
    struct Refused;

    impl Catchable for Refused {}

    #[derive(Debug, thiserror::Error)]
    #[error("queue full: {reason}")]
    struct QueueFull {
        reason: String,
        #[source]
        parent: Refused,
    }

    impl Catchable for QueueFull {
        fn parent(&self) -> Option<&dyn Catchable> {
            Some(&self.parent)
        }
    }

    #[test]
    fn plain_payloads_match_their_concrete_type() {
        let rejection = Rejection::new("foo".to_string());
        assert!(rejection.is::<String>());
        assert!(!rejection.is::<i32>());
        assert_eq!(rejection.downcast_ref::<String>().unwrap(), "foo");
    }

    #[test]
    fn carrier_is_never_nested() {
        let inner = Rejection::new(7u32);
        let outer = Rejection::new(inner);
        assert_eq!(outer.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn rejection_itself_is_the_catch_all() {
        let rejection = Rejection::new(7u32);
        assert!(rejection.is::<Rejection>());
        let this = rejection.downcast_ref::<Rejection>().unwrap();
        assert!(this.is::<u32>());
    }

    #[test]
    fn error_payloads_match_along_the_catch_chain() {
        let rejection = Rejection::from_error(QueueFull {
            reason: "burst".into(),
            parent: Refused,
        });
        assert!(rejection.is::<QueueFull>());
        assert!(rejection.is::<Refused>());
        assert!(!rejection.is::<String>());
    }

    #[test]
    fn plain_storage_does_not_chain() {
        let rejection = Rejection::new(QueueFull {
            reason: "burst".into(),
            parent: Refused,
        });
        assert!(rejection.is::<QueueFull>());
        assert!(!rejection.is::<Refused>());
    }

    #[test]
    fn debug_reports_the_payload_type() {
        let rejection = Rejection::new(42i64);
        assert_eq!(format!("{rejection:?}"), "Rejection(i64)");
        let chained = Rejection::from_error(Refused);
        assert!(format!("{chained:?}").contains("request refused"));
    }
}
