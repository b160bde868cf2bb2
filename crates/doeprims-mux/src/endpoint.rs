use bytes::Bytes;
use doeprims_discovery::{
    DiscoveryClient, DiscoveryConfig, DiscoveryRegistry, DiscoveryRequest, DiscoveryResponder,
};
use doeprims_transport::Mailbox;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatcher, Inbound};
use crate::error::{MuxError, Result};
use crate::spdm::{
    vendor_request, wrap_secured_spdm, wrap_spdm, SPDM_VENDOR_DEFINED_RESPONSE, SPDM_VERSION_12,
};
use crate::vendor::{PciProtocol, VendorMessage};

/// Configuration for a [`DoeRequester`].
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    pub discovery: DiscoveryConfig,
    /// SPDM version byte used for vendor-defined requests.
    pub spdm_version: u8,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            discovery: DiscoveryConfig::default(),
            spdm_version: SPDM_VERSION_12,
        }
    }
}

/// Requester side of a DOE mailbox.
///
/// Until [`discover`](Self::discover) runs, the PCI-SIG types are assumed;
/// afterwards responses are checked against what the responder reported.
pub struct DoeRequester<M> {
    mailbox: M,
    config: RequesterConfig,
    dispatcher: Dispatcher,
    registry: Option<DiscoveryRegistry>,
}

impl<M: Mailbox> DoeRequester<M> {
    pub fn new(mailbox: M) -> Self {
        Self::with_config(mailbox, RequesterConfig::default())
    }

    pub fn with_config(mailbox: M, config: RequesterConfig) -> Self {
        Self {
            mailbox,
            config,
            dispatcher: Dispatcher::with_defaults(),
            registry: None,
        }
    }

    /// Enumerate the responder's protocols, replacing any earlier registry.
    pub fn discover(&mut self) -> Result<&DiscoveryRegistry> {
        let mut client =
            DiscoveryClient::with_config(&mut self.mailbox, self.config.discovery.clone());
        let registry = client.discover()?;
        self.dispatcher = Dispatcher::from_registry(&registry);
        Ok(self.registry.insert(registry))
    }

    /// Registry from the last successful discovery.
    pub fn registry(&self) -> Option<&DiscoveryRegistry> {
        self.registry.as_ref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Send an SPDM message and return the SPDM response.
    pub fn exchange_spdm(&mut self, payload: &[u8]) -> Result<Bytes> {
        let request = wrap_spdm(payload)?;
        self.exchange(&request, false)
    }

    /// Send a secured SPDM record and return the secured response record.
    pub fn exchange_secured_spdm(&mut self, payload: &[u8]) -> Result<Bytes> {
        let request = wrap_secured_spdm(payload)?;
        self.exchange(&request, true)
    }

    /// Send a PCI-SIG vendor-defined request and return the vendor response.
    pub fn exchange_vendor(&mut self, protocol: PciProtocol, payload: &[u8]) -> Result<VendorMessage> {
        let request = vendor_request(self.config.spdm_version, protocol, payload)?;
        let response = self.exchange_spdm(&request)?;
        let (header, message) = self.dispatcher.dispatch_vendor(response)?;
        if header.request_response_code != SPDM_VENDOR_DEFINED_RESPONSE {
            return Err(MuxError::UnexpectedResponse(format!(
                "SPDM code {:#04x} in reply to a vendor-defined request",
                header.request_response_code
            )));
        }
        if message.protocol() != protocol {
            return Err(MuxError::UnexpectedResponse(format!(
                "{} reply to a {} request",
                message.protocol().name(),
                protocol.name()
            )));
        }
        Ok(message)
    }

    fn exchange(&mut self, request: &[u8], secured: bool) -> Result<Bytes> {
        let reply = self.mailbox.send_and_receive(request)?;
        match self.dispatcher.dispatch(reply)? {
            Inbound::Spdm {
                secured: reply_secured,
                payload,
            } if reply_secured == secured => Ok(payload),
            other => Err(MuxError::UnexpectedResponse(format!(
                "expected {} object, got {}",
                if secured { "secured SPDM" } else { "SPDM" },
                describe(&other)
            ))),
        }
    }

    pub fn get_ref(&self) -> &M {
        &self.mailbox
    }

    pub fn get_mut(&mut self) -> &mut M {
        &mut self.mailbox
    }

    pub fn into_inner(self) -> M {
        self.mailbox
    }
}

fn describe(inbound: &Inbound) -> &'static str {
    match inbound {
        Inbound::Discovery(_) => "discovery",
        Inbound::Spdm { secured: true, .. } => "secured SPDM",
        Inbound::Spdm { secured: false, .. } => "SPDM",
    }
}

/// Produces SPDM responses for a [`DoeResponder`].
///
/// `secured` tells whether the request arrived as a secured SPDM record; the
/// reply goes back with the same data object type.
pub trait SpdmHandler {
    fn handle(&mut self, secured: bool, request: Bytes) -> Result<Bytes>;
}

impl<F> SpdmHandler for F
where
    F: FnMut(bool, Bytes) -> Result<Bytes>,
{
    fn handle(&mut self, secured: bool, request: Bytes) -> Result<Bytes> {
        self(secured, request)
    }
}

/// Configuration for a [`DoeResponder`].
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Drop unsupported objects with a warning instead of failing.
    pub discard_unsupported: bool,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            discard_unsupported: true,
        }
    }
}

/// What [`DoeResponder::serve_one`] did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Served {
    Discovery { index: u8 },
    Spdm { secured: bool },
    Discarded {
        vendor_id: u16,
        data_object_type: u8,
        length_dw: u32,
    },
}

/// Responder side of a DOE mailbox.
pub struct DoeResponder<M, H> {
    mailbox: M,
    handler: H,
    table: DiscoveryResponder,
    dispatcher: Dispatcher,
    config: ResponderConfig,
}

impl<M: Mailbox, H: SpdmHandler> DoeResponder<M, H> {
    /// Responder advertising Discovery, SPDM and Secured SPDM.
    pub fn new(mailbox: M, handler: H) -> Self {
        Self::with_config(
            mailbox,
            handler,
            DiscoveryResponder::with_defaults(),
            ResponderConfig::default(),
        )
    }

    pub fn with_config(
        mailbox: M,
        handler: H,
        table: DiscoveryResponder,
        config: ResponderConfig,
    ) -> Self {
        let dispatcher = Dispatcher::from_table(&table);
        Self {
            mailbox,
            handler,
            table,
            dispatcher,
            config,
        }
    }

    /// Receive one object and answer it.
    pub fn serve_one(&mut self) -> Result<Served> {
        let object = self.mailbox.receive()?;
        let inbound = match self.dispatcher.dispatch(object) {
            Ok(inbound) => inbound,
            Err(MuxError::UnsupportedObjectType {
                vendor_id,
                data_object_type,
                length_dw,
                ..
            }) if self.config.discard_unsupported => {
                warn!(
                    vendor_id,
                    data_object_type, length_dw, "discarding unsupported data object"
                );
                return Ok(Served::Discarded {
                    vendor_id,
                    data_object_type,
                    length_dw,
                });
            }
            Err(err) => return Err(err),
        };

        match inbound {
            Inbound::Discovery(payload) => {
                let request = DiscoveryRequest::parse(&payload)?;
                let response = self.table.respond(&request).to_object()?;
                self.mailbox.transmit(&response)?;
                Ok(Served::Discovery {
                    index: request.index,
                })
            }
            Inbound::Spdm { secured, payload } => {
                let reply = self.handler.handle(secured, payload)?;
                let object = if secured {
                    wrap_secured_spdm(&reply)?
                } else {
                    wrap_spdm(&reply)?
                };
                self.mailbox.transmit(&object)?;
                debug!(secured, reply_len = reply.len(), "answered SPDM request");
                Ok(Served::Spdm { secured })
            }
        }
    }

    /// Serve requests until the mailbox shuts down. Returns the number of
    /// objects handled.
    ///
    /// Recoverable errors and errors confined to one message (a short
    /// discovery body, a malformed vendor header) are logged and the request
    /// is dropped without a reply. Stream-level errors end the loop.
    pub fn serve(&mut self) -> Result<usize> {
        let mut served = 0usize;
        loop {
            match self.serve_one() {
                Ok(_) => served += 1,
                Err(err) if err.is_shutdown() => {
                    info!(served, "mailbox closed");
                    return Ok(served);
                }
                Err(err) if err.is_recoverable() || err.is_message_scoped() => {
                    warn!(error = %err, "dropping request");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn get_mut(&mut self) -> &mut M {
        &mut self.mailbox
    }

    pub fn into_inner(self) -> (M, H) {
        (self.mailbox, self.handler)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use doeprims_frame::{DataObjectType, DoeObject, VENDOR_ID_PCISIG};
    use doeprims_transport::TransportError;

    use super::*;
    use crate::spdm::vendor_response;

    /// Feeds queued inbound objects and records everything transmitted.
    #[derive(Default)]
    struct QueueMailbox {
        inbound: VecDeque<Bytes>,
        sent: Vec<Bytes>,
    }

    impl Mailbox for QueueMailbox {
        fn transmit(&mut self, object: &[u8]) -> doeprims_transport::Result<()> {
            self.sent.push(Bytes::copy_from_slice(object));
            Ok(())
        }

        fn receive(&mut self) -> doeprims_transport::Result<Bytes> {
            self.inbound.pop_front().ok_or(TransportError::Shutdown)
        }
    }

    /// Requester mailbox backed by an in-process responder.
    struct LoopbackMailbox<H> {
        responder: DoeResponder<QueueMailbox, H>,
        reply: Option<Bytes>,
    }

    impl<H: SpdmHandler> Mailbox for LoopbackMailbox<H> {
        fn transmit(&mut self, object: &[u8]) -> doeprims_transport::Result<()> {
            self.responder
                .get_mut()
                .inbound
                .push_back(Bytes::copy_from_slice(object));
            self.responder
                .serve_one()
                .map_err(|err| TransportError::Desync(err.to_string()))?;
            self.reply = self.responder.get_mut().sent.pop();
            Ok(())
        }

        fn receive(&mut self) -> doeprims_transport::Result<Bytes> {
            self.reply.take().ok_or(TransportError::Shutdown)
        }
    }

    fn echo(_secured: bool, request: Bytes) -> Result<Bytes> {
        Ok(request)
    }

    fn loopback<H: SpdmHandler>(handler: H) -> DoeRequester<LoopbackMailbox<H>> {
        DoeRequester::new(LoopbackMailbox {
            responder: DoeResponder::new(QueueMailbox::default(), handler),
            reply: None,
        })
    }

    #[test]
    fn requester_discovers_responder() {
        let mut requester = loopback(echo);
        let registry = requester.discover().unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.supports(VENDOR_ID_PCISIG, DataObjectType::SecuredSpdm));
        assert!(requester.registry().is_some());
    }

    #[test]
    fn spdm_and_secured_spdm_echo() {
        let mut requester = loopback(echo);
        let reply = requester.exchange_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap();
        assert_eq!(reply.as_ref(), &[0x12, 0x84, 0x00, 0x00]);

        let reply = requester.exchange_secured_spdm(&[0xFF; 8]).unwrap();
        assert_eq!(reply.as_ref(), &[0xFF; 8]);
    }

    #[test]
    fn vendor_exchange_through_handler() {
        let handler = |_secured: bool, request: Bytes| -> Result<Bytes> {
            let (_, message) = Dispatcher::with_defaults().dispatch_vendor(request)?;
            let mut content = message.payload.to_vec();
            content.reverse();
            vendor_response(SPDM_VERSION_12, message.protocol(), &content)
        };
        let mut requester = loopback(handler);
        let message = requester
            .exchange_vendor(PciProtocol::Tdisp, &[1, 2, 3])
            .unwrap();
        assert_eq!(message.protocol(), PciProtocol::Tdisp);
        assert_eq!(message.payload.as_ref(), &[3, 2, 1]);
    }

    #[test]
    fn vendor_reply_with_wrong_protocol_is_unexpected() {
        let handler = |_secured: bool, _request: Bytes| -> Result<Bytes> {
            vendor_response(SPDM_VERSION_12, PciProtocol::IdeKm, &[])
        };
        let mut requester = loopback(handler);
        assert!(matches!(
            requester.exchange_vendor(PciProtocol::Tdisp, &[]),
            Err(MuxError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn vendor_reply_echoing_request_code_is_unexpected() {
        let mut requester = loopback(echo);
        assert!(matches!(
            requester.exchange_vendor(PciProtocol::IdeKm, &[0]),
            Err(MuxError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn requester_rejects_mismatched_reply_type() {
        let mut mailbox = QueueMailbox::default();
        mailbox
            .inbound
            .push_back(wrap_secured_spdm(&[0u8; 4]).unwrap());
        let mut requester = DoeRequester::new(mailbox);
        assert!(matches!(
            requester.exchange_spdm(&[0x12, 0x84, 0x00, 0x00]),
            Err(MuxError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn responder_answers_discovery_from_table() {
        let mut mailbox = QueueMailbox::default();
        mailbox
            .inbound
            .push_back(DiscoveryRequest::new(2).to_object().unwrap());
        let mut responder = DoeResponder::new(mailbox, echo);

        assert_eq!(responder.serve_one().unwrap(), Served::Discovery { index: 2 });
        let (mailbox, _) = responder.into_inner();
        assert_eq!(
            mailbox.sent[0].as_ref(),
            &[0x01, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00]
        );
    }

    #[test]
    fn responder_discards_unknown_objects_and_continues() {
        let mut mailbox = QueueMailbox::default();
        mailbox.inbound.push_back(
            DoeObject::new(VENDOR_ID_PCISIG, DataObjectType::Unknown(0x30), vec![0u8; 8])
                .unwrap()
                .to_bytes(),
        );
        mailbox.inbound.push_back(wrap_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap());
        let mut responder = DoeResponder::new(mailbox, echo);

        assert_eq!(responder.serve().unwrap(), 2);
        let (mailbox, _) = responder.into_inner();
        assert_eq!(mailbox.sent.len(), 1);
        assert_eq!(
            mailbox.sent[0],
            wrap_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap()
        );
    }

    #[test]
    fn strict_responder_fails_on_unknown_objects() {
        let mut mailbox = QueueMailbox::default();
        mailbox.inbound.push_back(
            DoeObject::new(0x1AB4, DataObjectType::Spdm, vec![0u8; 4])
                .unwrap()
                .to_bytes(),
        );
        let mut responder = DoeResponder::with_config(
            mailbox,
            echo,
            DiscoveryResponder::with_defaults(),
            ResponderConfig {
                discard_unsupported: false,
            },
        );
        let err = responder.serve_one().unwrap_err();
        assert_eq!(err.skip_len(), Some(12));
    }

    #[test]
    fn responder_stops_on_protocol_violation() {
        let mut mailbox = QueueMailbox::default();
        mailbox
            .inbound
            .push_back(Bytes::from_static(&[0x01, 0x00, 0x01, 0x00, 0x05, 0, 0, 0]));
        let mut responder = DoeResponder::new(mailbox, echo);
        assert!(matches!(
            responder.serve(),
            Err(MuxError::Frame(doeprims_frame::FrameError::ProtocolViolation(_)))
        ));
    }

    #[test]
    fn short_discovery_request_is_dropped_and_serving_continues() {
        let mut mailbox = QueueMailbox::default();
        mailbox.inbound.push_back(
            DoeObject::new(VENDOR_ID_PCISIG, DataObjectType::Discovery, Vec::<u8>::new())
                .unwrap()
                .to_bytes(),
        );
        mailbox.inbound.push_back(wrap_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap());
        let mut responder = DoeResponder::new(mailbox, echo);

        assert_eq!(responder.serve().unwrap(), 1);
        let (mailbox, _) = responder.into_inner();
        assert!(mailbox.inbound.is_empty());
        assert_eq!(mailbox.sent, vec![wrap_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap()]);
    }

    #[test]
    fn malformed_handler_error_does_not_stop_serving() {
        let handler = |_secured: bool, request: Bytes| -> Result<Bytes> {
            if request.first() != Some(&0x12) {
                return Err(MuxError::Malformed("unknown SPDM version".into()));
            }
            Ok(request)
        };
        let mut mailbox = QueueMailbox::default();
        mailbox.inbound.push_back(wrap_spdm(&[0x00]).unwrap());
        mailbox.inbound.push_back(wrap_spdm(&[0x12, 0x84, 0x00, 0x00]).unwrap());
        let mut responder = DoeResponder::new(mailbox, handler);

        assert_eq!(responder.serve().unwrap(), 1);
        let (mailbox, _) = responder.into_inner();
        assert_eq!(mailbox.sent.len(), 1);
    }

    #[test]
    fn handler_recoverable_error_drops_request() {
        let handler = |_secured: bool, request: Bytes| -> Result<Bytes> {
            Dispatcher::with_defaults().dispatch_vendor(request)?;
            Ok(Bytes::new())
        };
        let mut mailbox = QueueMailbox::default();
        let request = vendor_request(SPDM_VERSION_12, PciProtocol::Unknown(0x44), &[]).unwrap();
        mailbox.inbound.push_back(wrap_spdm(&request).unwrap());
        let mut responder = DoeResponder::new(mailbox, handler);

        assert_eq!(responder.serve().unwrap(), 0);
        let (mailbox, _) = responder.into_inner();
        assert!(mailbox.sent.is_empty());
    }
}
