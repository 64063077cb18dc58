//! Identity collaborator.
//!
//! Authentication itself is handled by an external provider. The wizard only needs a
//! synchronous way to ask "who is signed in right now?" when a submission starts.

use intake_types::{EmailAddress, NonEmptyText};
use serde::Serialize;

/// The authenticated user on whose behalf a registration is submitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Stable identifier assigned by the identity provider; stored as `createdBy`.
    pub uid: NonEmptyText,
    pub email: Option<EmailAddress>,
}

impl Identity {
    pub fn new(uid: NonEmptyText) -> Self {
        Self { uid, email: None }
    }

    pub fn with_email(mut self, email: EmailAddress) -> Self {
        self.email = Some(email);
        self
    }
}

/// Read access to the currently authenticated identity.
pub trait IdentityProvider {
    /// Returns the signed-in identity, or `None` if nobody is signed in.
    fn current_identity(&self) -> Option<Identity>;
}

/// Identity provider with a fixed answer.
///
/// Used by the REST host (identity resolved from request headers) and by the CLI
/// (identity from arguments or environment).
#[derive(Clone, Debug, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    pub fn signed_in(identity: Identity) -> Self {
        Self(Some(identity))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl From<Option<Identity>> for StaticIdentity {
    fn from(identity: Option<Identity>) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<Identity> {
        self.0.clone()
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn current_identity(&self) -> Option<Identity> {
        (**self).current_identity()
    }
}
