//! # Keywarden Guard
//!
//! Remote-request authorization: an inbound request from a paired browser is
//! dispatched to exactly one [`Authorizer`] flow, gated by user validation,
//! and answered over the session channel. The [`AuthorizationGuard`] enforces
//! that only one authorization or pairing attempt runs at a time and drives
//! the pairing handshake for new sessions.
//!
//! Transport, push plumbing and durable storage media stay outside; they
//! enter through the [`SessionChannel`], [`SessionFactory`] and
//! [`AccountStore`] seams.

mod authorizer;
mod error;
mod guard;
mod session;

pub use self::{
    authorizer::Authorizer,
    error::AuthorizationError,
    guard::{AuthorizationGuard, InFlight},
    session::{
        Account, AccountStore, MemoryAccounts, Pairing, SessionChannel, SessionFactory,
        SessionResponse, Site, TeamPairing, TeamSession,
    },
};

#[cfg(any(test, feature = "testable"))]
pub use self::session::{MockAccountStore, MockSessionChannel, MockSessionFactory};
