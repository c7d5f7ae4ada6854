//! Identity resolution and login/logout signalling.

use std::sync::{PoisonError, RwLock};

use jiff::Timestamp;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::{
    auth::credential::{BearerCredential, decode_subject},
    domain::carts::models::OwnerKey,
};

const EVENT_CAPACITY: usize = 16;

/// Signal emitted when the active credential changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEvent {
    /// A credential was acquired (login).
    Acquired,

    /// The credential was dropped (logout).
    Cleared,
}

/// Who the cart currently belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Guest,
    Authenticated {
        subject: String,
        credential: BearerCredential,
    },
}

impl Identity {
    /// Resolve an optional credential; anything undecodable is a guest.
    #[must_use]
    pub fn resolve(credential: Option<BearerCredential>, now: Timestamp) -> Self {
        let Some(credential) = credential else {
            return Self::Guest;
        };

        match decode_subject(&credential, now) {
            Ok(subject) => Self::Authenticated {
                subject,
                credential,
            },
            Err(reason) => {
                debug!(%reason, "ignoring unusable credential");

                Self::Guest
            }
        }
    }

    #[must_use]
    pub fn owner_key(&self) -> OwnerKey {
        match self {
            Self::Guest => OwnerKey::Guest,
            Self::Authenticated { subject, .. } => OwnerKey::User(subject.clone()),
        }
    }

    #[must_use]
    pub fn credential(&self) -> Option<&BearerCredential> {
        match self {
            Self::Guest => None,
            Self::Authenticated { credential, .. } => Some(credential),
        }
    }
}

/// Source of the active credential and of login/logout signals.
pub trait IdentityProvider: Send + Sync {
    /// The credential currently in effect, if any.
    fn current(&self) -> Option<BearerCredential>;

    /// Subscribe to identity transitions.
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

/// In-process identity provider holding a single session credential.
#[derive(Debug)]
pub struct SessionIdentity {
    credential: RwLock<Option<BearerCredential>>,
    events: broadcast::Sender<IdentityEvent>,
}

impl SessionIdentity {
    #[must_use]
    pub fn new(credential: Option<BearerCredential>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            credential: RwLock::new(credential.filter(|credential| !credential.is_blank())),
            events,
        }
    }

    /// Adopt a credential and announce the login.
    pub fn login(&self, credential: BearerCredential) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);

        info!("session credential acquired");

        self.publish(IdentityEvent::Acquired);
    }

    /// Drop the credential and announce the logout.
    pub fn logout(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;

        info!("session credential cleared");

        self.publish(IdentityEvent::Cleared);
    }

    fn publish(&self, event: IdentityEvent) {
        // No subscribers is not an error; nobody needs to react.
        if self.events.send(event).is_err() {
            debug!(?event, "no identity subscribers");
        }
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<BearerCredential> {
        self.credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}
