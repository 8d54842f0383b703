/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use once_cell::sync::Lazy;

use crate::Jid;
use crate::xml::Tag;
use crate::xso::Attr;
use crate::xso::Candidates;
use crate::xso::Child;
use crate::xso::ClassRegistry;
use crate::xso::DecodeFailure;
use crate::xso::EnumCodec;
use crate::xso::JidCodec;
use crate::xso::LanguageTag;
use crate::xso::Offender;
use crate::xso::Schema;
use crate::xso::StringCodec;
use crate::xso::Xso;
use crate::xso::XsoClass;
use crate::xso::XsoError;

use super::PayloadError;
use super::Ping;
use super::StanzaError;
use super::StanzaException;
use super::constants::CLIENT_NS;
use super::error::description;
use super::generate_id;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum IqType {
    #[default]
    Get,
    Set,
    Result,
    Error,
}

const IQ_TYPES: &[(&str, IqType)] = &[
    ("get", IqType::Get),
    ("set", IqType::Set),
    ("result", IqType::Result),
    ("error", IqType::Error),
];

impl IqType {
    pub fn is_request(self) -> bool {
        matches!(self, IqType::Get | IqType::Set)
    }
}

/// Payload classes an IQ can carry. Ping is always known.
pub static IQ_PAYLOADS: Lazy<ClassRegistry> = Lazy::new(|| {
    let registry = ClassRegistry::new();
    if let Err(err) = registry.register::<Ping>() {
        tracing::error!(%err, "cannot register the ping payload");
    }
    registry
});

/// Makes `C` decodable as an IQ payload.
pub fn register_iq_payload<C: XsoClass>() -> Result<(), XsoError> {
    IQ_PAYLOADS.register::<C>()
}

/// An info/query request or response.
///
/// A payload which fails to decode does not fail the whole IQ, the failure
/// is kept in `payload_error` so a request can be answered with an error.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Iq {
    pub id: Option<String>,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub iq_type: IqType,
    pub lang: Option<LanguageTag>,
    pub payload: Option<Box<dyn Xso>>,
    pub error: Option<StanzaError>,
    pub payload_error: Option<PayloadError>,
}

impl XsoClass for Iq {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Iq>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(CLIENT_NS, "iq"))
                .attr(Attr::local("id", StringCodec, |iq: &Iq| iq.id.as_ref(), |iq, v| iq.id = v).required())
                .attr(Attr::local("from", JidCodec, |iq: &Iq| iq.from.as_ref(), |iq, v| iq.from = v))
                .attr(Attr::local("to", JidCodec, |iq: &Iq| iq.to.as_ref(), |iq, v| iq.to = v))
                .attr(
                    Attr::local(
                        "type",
                        EnumCodec::new(IQ_TYPES),
                        |iq: &Iq| Some(&iq.iq_type),
                        |iq, v| {
                            if let Some(v) = v {
                                iq.iq_type = v;
                            }
                        },
                    )
                    .required(),
                )
                .attr(Attr::xml_lang(|iq: &Iq| iq.lang.as_ref(), |iq, v| iq.lang = v))
                .child(Child::new(
                    "payload",
                    Candidates::open(&IQ_PAYLOADS),
                    |iq: &Iq| &iq.payload,
                    |iq| &mut iq.payload,
                ))
                .child(Child::new(
                    "error",
                    Candidates::of::<StanzaError>(),
                    |iq: &Iq| &iq.error,
                    |iq| &mut iq.error,
                ))
                .lang(|iq: &Iq| iq.lang.as_ref())
                .build_static()
        });
        &SCHEMA
    }

    fn handle_error(&mut self, failure: &DecodeFailure) -> bool {
        let Offender::Child(tag) = &failure.offender else {
            return false;
        };
        self.payload_error = match failure.field {
            Some("payload") => Some(PayloadError::Malformed {
                tag: tag.clone(),
                error: failure.error.clone(),
            }),
            None => Some(PayloadError::Unknown(tag.clone())),
            Some(_) => return false,
        };
        true
    }
}

impl Iq {
    pub fn new(iq_type: IqType) -> Self {
        Iq {
            iq_type,
            ..Default::default()
        }
    }

    pub fn get(payload: impl Xso) -> Self {
        Self::new(IqType::Get).with_payload(payload)
    }

    pub fn set(payload: impl Xso) -> Self {
        Self::new(IqType::Set).with_payload(payload)
    }

    pub fn with_payload(mut self, payload: impl Xso) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }

    pub fn with_to(mut self, to: Jid) -> Self {
        self.to = Some(to);
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn is_request(&self) -> bool {
        self.iq_type.is_request()
    }

    pub fn payload_as<C: Xso>(&self) -> Option<&C> {
        self.payload.as_deref().and_then(|payload| payload.downcast_ref::<C>())
    }

    /// Tag of the payload, decoded or not.
    pub fn payload_tag(&self) -> Option<&Tag> {
        match (&self.payload, &self.payload_error) {
            (Some(payload), _) => Some(payload.xso_tag()),
            (None, Some(PayloadError::Unknown(tag) | PayloadError::Malformed { tag, .. })) => Some(tag),
            (None, None) => None,
        }
    }

    pub fn autoset_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(generate_id());
        }
    }

    /// An empty response to this request.
    pub fn make_reply(&self, reply_type: IqType) -> Result<Iq, XsoError> {
        if !self.is_request() {
            return Err(XsoError::Validation(description::NOT_A_REQUEST.to_string()));
        }
        if reply_type.is_request() {
            return Err(XsoError::Validation(description::NOT_A_REPLY_TYPE.to_string()));
        }
        Ok(Iq {
            id: self.id.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
            iq_type: reply_type,
            ..Default::default()
        })
    }

    pub fn make_error_reply(&self, exc: &StanzaException) -> Result<Iq, XsoError> {
        let mut reply = self.make_reply(IqType::Error)?;
        reply.error = Some(StanzaError::from(exc));
        Ok(reply)
    }
}
