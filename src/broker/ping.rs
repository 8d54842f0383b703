/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum PingState {
    /// A probe may ride along with outgoing traffic.
    SendOpportunistic,
    SendNow,
    AwaitingPong,
}

#[derive(Debug, Eq, PartialEq)]
pub(super) enum PingAction {
    Wait,
    SendPing,
    Timeout,
}

/// Liveness timer of one session.
#[derive(Debug)]
pub(super) struct Pinger {
    interval: Duration,
    timeout: Duration,
    state: PingState,
    deadline: Instant,
    /// Id of the ping IQ in flight, when not using stream management.
    pub(super) pending_id: Option<String>,
}

impl Pinger {
    pub(super) fn new(interval: Duration, timeout: Duration) -> Self {
        Pinger {
            interval,
            timeout,
            state: PingState::SendOpportunistic,
            deadline: Instant::now() + interval,
            pending_id: None,
        }
    }

    #[cfg(test)]
    pub(super) fn state(&self) -> PingState {
        self.state
    }

    pub(super) fn deadline(&self) -> Instant {
        self.deadline
    }

    /// The peer has shown a sign of life.
    pub(super) fn alive(&mut self, now: Instant) {
        if self.state != PingState::SendOpportunistic {
            tracing::debug!(state = ?self.state, "peer is alive");
        }
        self.state = PingState::SendOpportunistic;
        self.deadline = now + self.interval;
        self.pending_id = None;
    }

    pub(super) fn expired(&mut self, now: Instant) -> PingAction {
        if now < self.deadline {
            return PingAction::Wait;
        }
        match self.state {
            PingState::SendOpportunistic | PingState::SendNow => {
                self.state = PingState::SendNow;
                PingAction::SendPing
            }
            PingState::AwaitingPong => PingAction::Timeout,
        }
    }

    /// Outgoing traffic is flowing; probe along with it once half of the
    /// interval is gone.
    pub(super) fn wants_opportunistic(&self, now: Instant) -> bool {
        self.state == PingState::SendOpportunistic && now + self.interval / 2 >= self.deadline
    }

    pub(super) fn ping_sent(&mut self, now: Instant) {
        tracing::debug!("ping sent");
        self.state = PingState::AwaitingPong;
        self.deadline = now + self.timeout;
    }
}
