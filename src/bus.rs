//! Connection to the message bus
//!
//! Picks the session bus when `DBUS_SESSION_BUS_ADDRESS` is set, the system
//! bus otherwise. Subscribes to `NameOwnerChanged` from the bus daemon and
//! answers `ListNames` queries for the matcher.

use std::ffi::OsStr;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures_lite::{Stream, StreamExt};
use zbus::connection::Builder;
use zbus::message::Type;
use zbus::{Connection, MatchRule, Message, MessageStream};

use crate::error::{Result, WaitError};

pub const DBUS_SERVICE: &str = "org.freedesktop.DBus";
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";
pub const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
pub const NAME_OWNER_CHANGED: &str = "NameOwnerChanged";

/// Environment variable advertising a session bus
pub const SESSION_BUS_ENV: &str = "DBUS_SESSION_BUS_ADDRESS";

/// An in-flight `ListNames` call
pub type NameQuery = Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send>>;

/// Source of the authoritative list of names currently on the bus
pub trait NameDirectory {
    /// Start an asynchronous name listing; resolves once the reply arrives
    fn list_names(&self) -> NameQuery;
}

/// Which well-known bus to connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

impl BusKind {
    /// Choose from the process environment
    pub fn from_env() -> Self {
        Self::from_session_address(std::env::var_os(SESSION_BUS_ENV).as_deref())
    }

    pub fn from_session_address(address: Option<&OsStr>) -> Self {
        match address {
            Some(_) => BusKind::Session,
            None => BusKind::System,
        }
    }
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::Session => write!(f, "session"),
            BusKind::System => write!(f, "system"),
        }
    }
}

/// Live bus connection, held for the whole run
#[derive(Clone)]
pub struct BusSession {
    connection: Connection,
}

impl BusSession {
    pub async fn connect(kind: BusKind) -> Result<Self> {
        let builder = match kind {
            BusKind::Session => Builder::session(),
            BusKind::System => Builder::system(),
        };

        let connection = match builder {
            Ok(builder) => builder.build().await,
            Err(e) => Err(e),
        }
        .map_err(|source| WaitError::Connect { kind, source })?;

        log::debug!(
            "Connected to {} bus as {}",
            kind,
            connection
                .unique_name()
                .map(|n| n.to_string())
                .unwrap_or_default()
        );

        Ok(Self { connection })
    }

    /// Install the NameOwnerChanged match rule and return the filtered events
    ///
    /// Each item is one ownership change. The payload is not decoded; the
    /// matcher re-lists names instead.
    pub async fn owner_changes(&self) -> Result<impl Stream<Item = Result<()>> + Send> {
        let rule = owner_changed_rule().map_err(WaitError::Filter)?;
        let stream = MessageStream::for_match_rule(rule, &self.connection, None)
            .await
            .map_err(WaitError::Filter)?;

        Ok(stream.filter_map(|msg| match msg {
            Ok(msg) if is_name_owner_changed(&msg) => Some(Ok(())),
            Ok(_) => None,
            Err(e) => Some(Err(WaitError::Dispatch(e))),
        }))
    }
}

impl NameDirectory for BusSession {
    fn list_names(&self) -> NameQuery {
        let connection = self.connection.clone();
        Box::pin(async move { list_names(&connection).await })
    }
}

/// `type='signal',interface='org.freedesktop.DBus',member='NameOwnerChanged'`
fn owner_changed_rule() -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(Type::Signal)
        .interface(DBUS_INTERFACE)?
        .member(NAME_OWNER_CHANGED)?
        .build())
}

/// Message filter: only ownership changes trigger a re-check
pub fn is_name_owner_changed(msg: &Message) -> bool {
    let header = msg.header();
    header.message_type() == Type::Signal
        && header
            .member()
            .is_some_and(|member| member.as_str() == NAME_OWNER_CHANGED)
}

async fn list_names(connection: &Connection) -> Result<Vec<String>> {
    let reply = match connection
        .call_method(
            Some(DBUS_SERVICE),
            DBUS_PATH,
            Some(DBUS_INTERFACE),
            "ListNames",
            &(),
        )
        .await
    {
        Ok(reply) => reply,
        // An error reply carries no name list; treat it as "not there yet"
        Err(zbus::Error::MethodError(name, detail, _)) => {
            log::warn!(
                "ListNames returned {}: {}",
                name,
                detail.unwrap_or_default()
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(WaitError::Query(e)),
    };

    match reply.body().deserialize::<Vec<String>>() {
        Ok(names) => Ok(names),
        Err(e) => {
            log::warn!("Unexpected ListNames reply: {}", e);
            Ok(Vec::new())
        }
    }
}
