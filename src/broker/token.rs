/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::stanza::Stanza;

use super::TokenError;

/// Delivery state of an enqueued stanza.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StanzaState {
    /// Waiting in the outbound queue.
    Active,
    /// Written to the stream, waiting for a stream management ack.
    Sent,
    Acked,
    /// Written to the stream without stream management.
    SentWithoutAck,
    Aborted,
}

impl StanzaState {
    pub fn is_final(self) -> bool {
        matches!(
            self,
            StanzaState::Acked | StanzaState::SentWithoutAck | StanzaState::Aborted
        )
    }
}

impl Display for StanzaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StanzaState::Active => "active",
            StanzaState::Sent => "sent",
            StanzaState::Acked => "acked",
            StanzaState::SentWithoutAck => "sent without ack",
            StanzaState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

type Observer = Box<dyn Fn(&Stanza, StanzaState) + Send + Sync>;

struct TokenInner {
    stanza: Stanza,
    state: watch::Sender<StanzaState>,
    /// Set while the transport writes the stanza. Only touched with the
    /// state lock held.
    sending: AtomicBool,
    observer: Mutex<Option<Observer>>,
}

/// Handle of an enqueued stanza. Clones refer to the same stanza.
#[derive(Clone)]
pub struct StanzaToken {
    inner: Arc<TokenInner>,
}

impl StanzaToken {
    pub(super) fn new(stanza: Stanza) -> Self {
        let (state, _) = watch::channel(StanzaState::Active);
        StanzaToken {
            inner: Arc::new(TokenInner {
                stanza,
                state,
                sending: AtomicBool::new(false),
                observer: Mutex::new(None),
            }),
        }
    }

    pub fn stanza(&self) -> &Stanza {
        &self.inner.stanza
    }

    pub fn state(&self) -> StanzaState {
        *self.inner.state.borrow()
    }

    /// Calls `observer` on every later state change.
    pub fn set_observer(&self, observer: impl Fn(&Stanza, StanzaState) + Send + Sync + 'static) {
        *self.inner.observer.lock() = Some(Box::new(observer));
    }

    /// Takes the stanza out of the queue if it was not sent yet.
    pub fn abort(&self) -> Result<(), TokenError> {
        let mut result = Ok(());
        let aborted = self.inner.state.send_if_modified(|state| {
            if *state != StanzaState::Active {
                result = Err(TokenError::TooLate(*state));
                false
            } else if self.inner.sending.load(Ordering::Relaxed) {
                result = Err(TokenError::Sending);
                false
            } else {
                *state = StanzaState::Aborted;
                true
            }
        });
        if aborted {
            self.notify(StanzaState::Aborted);
        }
        result
    }

    /// Waits until the stanza reaches a final state and returns it.
    pub async fn settled(&self) -> StanzaState {
        let mut receiver = self.inner.state.subscribe();
        match receiver.wait_for(|state| state.is_final()).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Marks a queued token as being sent, after which it can no longer
    /// be aborted. Replayed tokens are already `Sent`. False if the token
    /// was aborted meanwhile.
    pub(super) fn claim(&self) -> bool {
        let mut claimed = false;
        self.inner.state.send_if_modified(|state| {
            claimed = matches!(*state, StanzaState::Active | StanzaState::Sent);
            if claimed {
                self.inner.sending.store(true, Ordering::Relaxed);
            }
            false
        });
        claimed
    }

    /// Gives a claimed token back after a failed send.
    pub(super) fn release(&self) {
        self.inner.state.send_if_modified(|_| {
            self.inner.sending.store(false, Ordering::Relaxed);
            false
        });
    }

    /// Moves the token forward. Acked and aborted tokens stay as they are.
    pub(super) fn set_state(&self, new_state: StanzaState) {
        let changed = self.inner.state.send_if_modified(|state| {
            if *state == new_state || matches!(*state, StanzaState::Acked | StanzaState::Aborted) {
                return false;
            }
            self.inner.sending.store(false, Ordering::Relaxed);
            *state = new_state;
            true
        });
        if changed {
            self.notify(new_state);
        }
    }

    fn notify(&self, state: StanzaState) {
        if let Some(observer) = &*self.inner.observer.lock() {
            observer(&self.inner.stanza, state);
        }
    }
}

impl std::fmt::Debug for StanzaToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StanzaToken")
            .field("id", &self.inner.stanza.id())
            .field("state", &self.state())
            .finish()
    }
}
