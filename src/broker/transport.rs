/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use async_trait::async_trait;

use crate::xso::Xso;

use super::TransportError;

/// Outgoing half of an established and authenticated stream.
///
/// The incoming half is pushed into the broker with
/// [`StanzaBroker::receive`](super::StanzaBroker::receive), and a dead
/// connection is reported with
/// [`StanzaBroker::connection_lost`](super::StanzaBroker::connection_lost).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one top level element to the stream.
    async fn send_xso(&self, xso: &dyn Xso) -> Result<(), TransportError>;
}
