/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

use crate::stanza::StanzaException;
use crate::xso::XsoError;

use super::StanzaState;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    #[error("cannot send: {0}")]
    Send(String),

    #[error("cannot encode the element: {0}")]
    Encode(#[from] XsoError),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("stanza cannot be aborted, it is already {0}")]
    TooLate(StanzaState),

    #[error("stanza cannot be aborted, it is being sent")]
    Sending,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrokerError {
    #[error("broker is already running")]
    AlreadyRunning,

    #[error("not possible while the broker is running")]
    Running,

    #[error("a handler is already registered for {0}")]
    HandlerExists(String),

    #[error("request handlers serve only get and set requests")]
    NotARequest,

    #[error("peer did not answer the ping in time")]
    PingTimeout,

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("request was cancelled before a response arrived")]
    Cancelled,

    #[error("peer answered with an error: {0}")]
    Stanza(#[from] StanzaException),

    #[error(transparent)]
    Xso(#[from] XsoError),
}
