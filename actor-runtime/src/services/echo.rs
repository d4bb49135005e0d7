//! Demo service: replies to every directed message with its payload
//! reversed. Stands in for "a user-written service" in the end-to-end
//! boot+echo scenario; registered under the type name `"echo"`.

use actor_core::{Envelope, MessageType, Service, ServiceContext};

#[derive(Default)]
pub struct Echo;

impl Service for Echo {
    fn init(&mut self, _ctx: &ServiceContext, _config: &[u8]) -> bool {
        true
    }

    fn dispatch(&mut self, ctx: &ServiceContext, envelope: &Envelope) {
        if envelope.is_broadcast() || envelope.sender() == 0 {
            return;
        }
        let reversed: Vec<u8> = envelope.data().iter().rev().copied().collect();
        ctx.router().response(
            envelope.sender(),
            "",
            &reversed,
            envelope.session(),
            MessageType::TEXT,
        );
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn reverses_ascii_payload() {
        let body = b"hello";
        let reversed: Vec<u8> = body.iter().rev().copied().collect();
        assert_eq!(reversed, b"olleh");
    }
}
