/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Stream management counters and the queue of unacknowledged stanzas.

use std::collections::VecDeque;

use crate::stanza::SmAck;
use crate::stanza::SmEnabled;

use super::StanzaState;
use super::StanzaToken;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SmState {
    #[default]
    Disabled,
    /// `<enable/>` is pending or about to be sent.
    Negotiating,
    Enabled,
}

#[derive(Debug, Default)]
pub(super) struct SmSession {
    pub(super) state: SmState,
    pub(super) id: Option<String>,
    pub(super) resumable: bool,
    pub(super) location: Option<(String, u16)>,
    pub(super) max: Option<u32>,
    pub(super) outbound_ack_base: u32,
    pub(super) inbound_counter: u32,
    pub(super) unacked: VecDeque<StanzaToken>,
}

impl SmSession {
    pub(super) fn is_engaged(&self) -> bool {
        self.state != SmState::Disabled
    }

    pub(super) fn start_negotiation(&mut self) {
        self.state = SmState::Negotiating;
        self.outbound_ack_base = 0;
        self.inbound_counter = 0;
    }

    pub(super) fn enabled(&mut self, enabled: &SmEnabled) {
        if self.state != SmState::Negotiating {
            tracing::warn!(state = ?self.state, "unexpected stream management confirmation");
        }
        self.state = SmState::Enabled;
        self.id = enabled.id.clone();
        self.resumable = enabled.resume;
        self.location = enabled.location.clone();
        self.max = enabled.max;
    }

    /// Records a stanza written to the stream.
    pub(super) fn sent(&mut self, token: &StanzaToken) {
        if self.is_engaged() {
            token.set_state(StanzaState::Sent);
            self.unacked.push_back(token.clone());
        } else {
            token.set_state(StanzaState::SentWithoutAck);
        }
    }

    pub(super) fn received_stanza(&mut self) {
        if self.state == SmState::Enabled {
            self.inbound_counter = self.inbound_counter.wrapping_add(1);
        }
    }

    /// Applies the peer's counter and returns the number of newly acked
    /// stanzas.
    pub(super) fn ack(&mut self, counter: u32) -> usize {
        if !self.is_engaged() {
            tracing::warn!(counter, "ack received while stream management is disabled");
            return 0;
        }
        if counter == self.outbound_ack_base {
            return 0;
        }
        if counter < self.outbound_ack_base {
            tracing::warn!(
                counter,
                base = self.outbound_ack_base,
                "peer acked fewer stanzas than before"
            );
            return 0;
        }
        let mut count = (counter - self.outbound_ack_base) as usize;
        if count > self.unacked.len() {
            tracing::warn!(
                counter,
                base = self.outbound_ack_base,
                unacked = self.unacked.len(),
                "peer acked more stanzas than were sent"
            );
            count = self.unacked.len();
        }
        for token in self.unacked.drain(..count) {
            token.set_state(StanzaState::Acked);
        }
        self.outbound_ack_base = counter;
        count
    }

    /// Answer to an ack request.
    pub(super) fn ack_reply(&self) -> Option<SmAck> {
        if self.state != SmState::Enabled {
            tracing::warn!("ack requested while stream management is disabled");
            return None;
        }
        Some(SmAck::new(self.inbound_counter))
    }

    /// Applies a resumed session and hands out the stanzas to send again,
    /// oldest first.
    pub(super) fn resume(&mut self, counter: u32) -> Vec<StanzaToken> {
        if !self.is_engaged() {
            tracing::warn!(counter, "resuming a session without stream management");
            self.state = SmState::Enabled;
            return Vec::new();
        }
        self.state = SmState::Enabled;
        self.ack(counter);
        self.unacked.drain(..).collect()
    }

    /// Gives up on stream management. Unacked stanzas keep their place
    /// in history as sent without ack.
    pub(super) fn disable(&mut self) {
        for token in self.unacked.drain(..) {
            token.set_state(StanzaState::SentWithoutAck);
        }
        *self = SmSession::default();
    }
}
