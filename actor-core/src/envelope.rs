//! The envelope: the one unit of inter-service communication.

use bitflags::bitflags;

use crate::buffer::{Buffer, Payload, SharedBuffer};

/// Message type tag, modeled as a newtype over `u8` so user-defined types
/// beyond the built-in set can coexist with it (the same pattern as
/// `http::StatusCode`: a handful of named constants plus an open range).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(pub u8);

impl MessageType {
    pub const UNKNOWN: MessageType = MessageType(0);
    pub const SYSTEM: MessageType = MessageType(1);
    pub const TEXT: MessageType = MessageType(2);
    pub const SOCKET: MessageType = MessageType(3);
    pub const ERROR: MessageType = MessageType(4);
    pub const DEBUG: MessageType = MessageType(5);

    /// Smallest value available to user-defined message types.
    pub const USER_START: u8 = 16;

    pub const fn user(n: u8) -> MessageType {
        MessageType(Self::USER_START + n)
    }

    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }
}

impl Default for MessageType {
    fn default() -> Self {
        MessageType::UNKNOWN
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnvelopeFlags: u8 {
        /// Delivered to every `ok` service except the sender.
        const BROADCAST = 0b0000_0001;
        /// Hint that this message closes a logical stream; unused by the
        /// core, carried through for downstream transports.
        const CLOSE     = 0b0000_0010;
        /// Hint that the payload is one slice of a larger message; unused
        /// by the core, carried through for downstream transports.
        const SLICE     = 0b0000_0100;
    }
}

impl Default for EnvelopeFlags {
    fn default() -> Self {
        EnvelopeFlags::empty()
    }
}

/// An owned message: sender, receiver, session, header, type, flags, and
/// a byte payload.
///
/// Once pushed into a mailbox, an envelope belongs exclusively to the
/// receiving worker; nothing else may read or mutate it.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    sender: u32,
    receiver: u32,
    session: i32,
    header: String,
    msg_type: MessageType,
    flags: EnvelopeFlags,
    payload: Payload,
}

impl Envelope {
    pub fn new(payload: Payload) -> Self {
        Envelope {
            payload,
            ..Default::default()
        }
    }

    pub fn with_capacity(back_capacity: usize) -> Self {
        Envelope::new(Payload::Owned(Buffer::with_capacity(back_capacity)))
    }

    pub fn shared(buf: SharedBuffer) -> Self {
        Envelope::new(Payload::Shared(buf))
    }

    pub fn sender(&self) -> u32 {
        self.sender
    }

    pub fn set_sender(&mut self, sender: u32) -> &mut Self {
        self.sender = sender;
        self
    }

    pub fn receiver(&self) -> u32 {
        self.receiver
    }

    pub fn set_receiver(&mut self, receiver: u32) -> &mut Self {
        self.receiver = receiver;
        self
    }

    pub fn session(&self) -> i32 {
        self.session
    }

    pub fn set_session(&mut self, session: i32) -> &mut Self {
        self.session = session;
        self
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn set_header(&mut self, header: impl Into<String>) -> &mut Self {
        self.header = header.into();
        self
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn set_type(&mut self, msg_type: MessageType) -> &mut Self {
        self.msg_type = msg_type;
        self
    }

    pub fn flags(&self) -> EnvelopeFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: EnvelopeFlags) -> &mut Self {
        self.flags = flags;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags.contains(EnvelopeFlags::BROADCAST)
    }

    pub fn set_broadcast(&mut self, broadcast: bool) -> &mut Self {
        self.flags.set(EnvelopeFlags::BROADCAST, broadcast);
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn data(&self) -> &[u8] {
        self.payload.as_slice()
    }

    pub fn write_back(&mut self, bytes: &[u8]) {
        if let Payload::Owned(buf) = &mut self.payload {
            buf.write_back(bytes);
        }
    }

    pub fn write_front(&mut self, bytes: &[u8]) {
        if let Payload::Owned(buf) = &mut self.payload {
            buf.write_front(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_the_default() {
        assert!(MessageType::default().is_unknown());
    }

    #[test]
    fn broadcast_flag_roundtrips() {
        let mut e = Envelope::with_capacity(4);
        assert!(!e.is_broadcast());
        e.set_broadcast(true);
        assert!(e.is_broadcast());
    }

    #[test]
    fn setters_chain() {
        let mut e = Envelope::with_capacity(0);
        e.set_sender(1).set_receiver(2).set_session(7).set_header("ping");
        assert_eq!(e.sender(), 1);
        assert_eq!(e.receiver(), 2);
        assert_eq!(e.session(), 7);
        assert_eq!(e.header(), "ping");
    }
}
