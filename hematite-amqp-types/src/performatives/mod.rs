//! Performatives defined in AMQP 1.0 specification Part 2.7

mod attach;
mod begin;
mod close;
mod detach;
mod disposition;
mod end;
mod flow;
mod open;
mod transfer;

pub use attach::Attach;
pub use begin::Begin;
pub use close::Close;
pub use detach::Detach;
pub use disposition::Disposition;
pub use end::End;
pub use flow::Flow;
pub use open::{ChannelMax, MaxFrameSize, Open};
pub use transfer::Transfer;

/// The body of an AMQP frame.
#[derive(Debug, Clone)]
pub enum Performative {
    /// Open performative
    Open(Open),

    /// Begin performative
    Begin(Begin),

    /// Attach performative
    Attach(Attach),

    /// Flow performative
    Flow(Flow),

    /// Transfer performative
    Transfer(Transfer),

    /// Disposition performative
    Disposition(Disposition),

    /// Detach performative
    Detach(Detach),

    /// End performative
    End(End),

    /// Close performative
    Close(Close),
}

impl Performative {
    /// Name of the performative, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Performative::Open(_) => "open",
            Performative::Begin(_) => "begin",
            Performative::Attach(_) => "attach",
            Performative::Flow(_) => "flow",
            Performative::Transfer(_) => "transfer",
            Performative::Disposition(_) => "disposition",
            Performative::Detach(_) => "detach",
            Performative::End(_) => "end",
            Performative::Close(_) => "close",
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use crate::buffer::ByteReader;
    use crate::composite::{encode_composite, read_composite};
    use crate::definitions::{AmqpError, Error, Handle, ReceiverSettleMode, Role, SenderSettleMode};
    use crate::messaging::{Accepted, DeliveryState, Source, Target};
    use crate::primitives::Binary;

    use super::*;

    #[test]
    fn open_round_trips_with_trailing_fields_absent() {
        let open = Open {
            container_id: "client-1".to_string(),
            hostname: Some("broker.example.com".to_string()),
            max_frame_size: MaxFrameSize(4096),
            channel_max: ChannelMax(127),
            idle_time_out: Some(30_000),
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };

        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &open);
        let mut reader = ByteReader::new(&buf);
        let decoded: Open = read_composite(&mut reader).unwrap();
        assert!(reader.is_empty());
        assert_eq!(decoded.container_id, "client-1");
        assert_eq!(decoded.max_frame_size.0, 4096);
        assert_eq!(decoded.channel_max.0, 127);
        assert_eq!(decoded.idle_time_out, Some(30_000));
    }

    #[test]
    fn open_defaults_apply_when_fields_are_absent() {
        let open = Open {
            container_id: "c".to_string(),
            hostname: None,
            max_frame_size: MaxFrameSize::default(),
            channel_max: ChannelMax::default(),
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &open);
        let mut reader = ByteReader::new(&buf);
        let decoded: Open = read_composite(&mut reader).unwrap();
        assert_eq!(decoded.max_frame_size.0, u32::MAX);
        assert_eq!(decoded.channel_max.0, u16::MAX);
    }

    #[test]
    fn attach_round_trips() {
        let attach = Attach {
            name: "sender-link-1".to_string(),
            handle: Handle(0),
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Unsettled,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(Source::builder().address("local").build()),
            target: Some(Target::builder().address("q1").build()),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };

        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &attach);
        let mut reader = ByteReader::new(&buf);
        let decoded: Attach = read_composite(&mut reader).unwrap();
        assert_eq!(decoded.name, "sender-link-1");
        assert_eq!(decoded.role, Role::Sender);
        assert_eq!(decoded.initial_delivery_count, Some(0));
        assert_eq!(
            decoded.target.as_ref().and_then(|t| t.address.as_deref()),
            Some("q1")
        );
    }

    #[test]
    fn transfer_round_trips() {
        let transfer = Transfer {
            handle: Handle(2),
            delivery_id: Some(7),
            delivery_tag: Some(Binary::from_static(b"\x00\x07")),
            message_format: Some(0),
            settled: Some(false),
            more: true,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        };

        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &transfer);
        let mut reader = ByteReader::new(&buf);
        let decoded: Transfer = read_composite(&mut reader).unwrap();
        assert_eq!(decoded.handle, Handle(2));
        assert_eq!(decoded.delivery_id, Some(7));
        assert!(decoded.more);
        assert!(!decoded.aborted);
    }

    #[test]
    fn disposition_round_trips_with_outcome() {
        let disposition = Disposition {
            role: Role::Receiver,
            first: 0,
            last: Some(0),
            settled: true,
            state: Some(DeliveryState::Accepted(Accepted {})),
            batchable: false,
        };

        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &disposition);
        let mut reader = ByteReader::new(&buf);
        let decoded: Disposition = read_composite(&mut reader).unwrap();
        assert_eq!(decoded.role, Role::Receiver);
        assert!(decoded.settled);
        assert!(matches!(decoded.state, Some(DeliveryState::Accepted(_))));
    }

    #[test]
    fn detach_carries_error_condition() {
        let detach = Detach {
            handle: Handle(1),
            closed: true,
            error: Some(Error::new(
                AmqpError::ResourceDeleted,
                Some("queue removed".to_string()),
                None,
            )),
        };

        let mut buf = BytesMut::new();
        encode_composite(&mut buf, &detach);
        let mut reader = ByteReader::new(&buf);
        let decoded: Detach = read_composite(&mut reader).unwrap();
        assert!(decoded.closed);
        let error = decoded.error.unwrap();
        assert_eq!(
            error.condition,
            AmqpError::ResourceDeleted.into()
        );
        assert_eq!(error.description.as_deref(), Some("queue removed"));
    }
}
