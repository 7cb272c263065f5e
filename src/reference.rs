//! Deferred reference resolution.
//!
//! Handlers record "there is a reference here" while walking a section,
//! before the semantic model needed to resolve it exists. A
//! [`ReferenceResolver`] pairs the reference's own location with a function
//! that is evaluated later against a [`ResolutionContext`].

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::document::Location;
use crate::error::{Error, Result};

/// External semantic model able to answer "what does this name refer to".
pub trait ResolutionContext: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Revision of `source_id` this context was built from, if it knows.
    fn revision_of(&self, _source_id: &str) -> Option<u64> {
        None
    }
}

/// Why a reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// The referenced entity does not exist in the context.
    NotFound,
    /// The name matches several entities.
    Ambiguous(usize),
    /// No context is available (e.g. compilation failed).
    ContextUnavailable,
    /// The context is not the kind this resolver understands.
    IncompatibleContext,
    /// The context was built from a different revision of the document.
    StaleContext { expected: u64, actual: u64 },
    /// The resolution function panicked.
    Panicked(String),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::NotFound => write!(f, "entity not found"),
            ResolutionError::Ambiguous(count) => write!(f, "ambiguous ({} candidates)", count),
            ResolutionError::ContextUnavailable => write!(f, "no resolution context available"),
            ResolutionError::IncompatibleContext => write!(f, "incompatible resolution context"),
            ResolutionError::StaleContext { expected, actual } => write!(
                f,
                "stale resolution context (revision {} instead of {})",
                actual, expected
            ),
            ResolutionError::Panicked(message) => write!(f, "resolver panicked: {}", message),
        }
    }
}

type ResolveFn =
    dyn Fn(&dyn ResolutionContext) -> std::result::Result<Location, ResolutionError> + Send + Sync;

/// A discovered reference whose target is computed on demand.
#[derive(Clone)]
pub struct ReferenceResolver {
    location: Location,
    revision: Option<u64>,
    resolve: Arc<ResolveFn>,
}

impl fmt::Debug for ReferenceResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceResolver")
            .field("location", &self.location)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl ReferenceResolver {
    /// Create a resolver over any context. `resolve` is not called here.
    pub fn new<F>(location: Location, resolve: F) -> Self
    where
        F: Fn(&dyn ResolutionContext) -> std::result::Result<Location, ResolutionError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            location,
            revision: None,
            resolve: Arc::new(resolve),
        }
    }

    /// Create a resolver for a concrete context type `C`.
    ///
    /// Resolving against any other context type fails with
    /// [`ResolutionError::IncompatibleContext`]; `None` from `resolve` means
    /// the entity was not found.
    pub fn for_context<C, F>(location: Location, resolve: F) -> Self
    where
        C: Any,
        F: Fn(&C) -> Option<Location> + Send + Sync + 'static,
    {
        Self::new(location, move |context| {
            let context = context
                .as_any()
                .downcast_ref::<C>()
                .ok_or(ResolutionError::IncompatibleContext)?;
            resolve(context).ok_or(ResolutionError::NotFound)
        })
    }

    /// Pin the resolver to the document revision it was discovered in.
    pub fn at_revision(mut self, revision: u64) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Location of the reference itself.
    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn revision(&self) -> Option<u64> {
        self.revision
    }

    /// Resolve the reference's target against `context`.
    pub fn resolve(&self, context: &dyn ResolutionContext) -> Result<Location> {
        self.try_resolve(context).map_err(|reason| {
            log::debug!(
                target: "seclsp::reference",
                "reference at {} unresolved: {}",
                self.location,
                reason
            );
            Error::ResolutionFailed {
                location: self.location.clone(),
                reason,
            }
        })
    }

    /// Resolve against an optional context; `None` fails as unavailable.
    pub fn resolve_with(&self, context: Option<&dyn ResolutionContext>) -> Result<Location> {
        match context {
            Some(context) => self.resolve(context),
            None => Err(Error::ResolutionFailed {
                location: self.location.clone(),
                reason: ResolutionError::ContextUnavailable,
            }),
        }
    }

    fn try_resolve(
        &self,
        context: &dyn ResolutionContext,
    ) -> std::result::Result<Location, ResolutionError> {
        if let Some(expected) = self.revision {
            if let Some(actual) = context.revision_of(self.location.source_id()) {
                if actual != expected {
                    return Err(ResolutionError::StaleContext { expected, actual });
                }
            }
        }

        catch_unwind(AssertUnwindSafe(|| (self.resolve)(context)))
            .map_err(|payload| ResolutionError::Panicked(panic_message(payload.as_ref())))?
    }
}

/// The innermost resolver whose location covers `position` in `source_id`.
pub fn resolver_at<'a>(
    resolvers: &'a [ReferenceResolver],
    source_id: &str,
    position: crate::document::Position,
) -> Option<&'a ReferenceResolver> {
    resolvers
        .iter()
        .filter(|r| r.location.contains(source_id, position))
        // Innermost reference wins when references nest.
        .min_by(|a, b| {
            let a = a.location.interval();
            let b = b.location.interval();
            if a.subsumes(&b, true) {
                std::cmp::Ordering::Greater
            } else if b.subsumes(&a, true) {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
