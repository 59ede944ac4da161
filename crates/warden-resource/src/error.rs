// SPDX-License-Identifier: Apache-2.0

//! Resource-layer error taxonomy.

use thiserror::Error;

/// Errors emitted by the registry and the arbitration engine.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Registration was attempted after the registry was sealed.
    #[error("registry is sealed; definitions are fixed after startup")]
    InitSealed,
    /// A fixed-capacity registry is full.
    #[error("capacity exceeded: at most {limit} {what}")]
    CapacityExceeded {
        /// What ran out (zones, resource definitions).
        what: &'static str,
        /// The fixed capacity.
        limit: usize,
    },
    /// The name is already registered.
    #[error("name collision: {0}")]
    NameCollision(String),
    /// No zone, class, resource definition, or attribute has this name.
    #[error("unknown name: {0}")]
    UnknownName(String),
    /// An attribute value does not match its declared type.
    #[error("type mismatch for attribute {name}: expected {expected}, got {got}")]
    TypeMismatch {
        /// Attribute name.
        name: String,
        /// Declared type.
        expected: &'static str,
        /// Supplied type.
        got: &'static str,
    },
    /// A schema definition is malformed or redefined.
    #[error("invalid schema: {0}")]
    SchemaInvalid(String),
    /// The zone id does not exist.
    #[error("unknown zone")]
    UnknownZone,
    /// The class id does not exist.
    #[error("unknown class")]
    UnknownClass,
    /// The set id does not exist.
    #[error("unknown resource set")]
    UnknownSet,
    /// The client id does not exist.
    #[error("unknown client")]
    UnknownClient,
    /// The set already carries an instance of this resource definition.
    #[error("resource already present in set: {0}")]
    AlreadyPresent(String),
}
