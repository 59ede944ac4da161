// SPDX-License-Identifier: Apache-2.0

//! Clients: the owners of resource sets.

use crate::ids::{ClientId, SetId};

/// A registered client. Destroying a client releases and removes all of its
/// sets (the engine handles the arbitration fallout).
#[derive(Debug)]
pub struct Client {
    pub(crate) id: ClientId,
    pub(crate) name: String,
    pub(crate) sets: Vec<SetId>,
}

impl Client {
    /// The client id.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The client's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the sets this client owns, in creation order.
    #[must_use]
    pub fn sets(&self) -> &[SetId] {
        &self.sets
    }
}
