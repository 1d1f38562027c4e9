//! Outbound client events. The payload is a MessagePack argument array; use
//! [`crate::resource::Resource::emit_client`] rather than calling this directly.

natives! {
    namespace "event";

    0x2F7A49E6 => TRIGGER_CLIENT_EVENT_INTERNAL: fn trigger_client_event_internal(
        name: str,
        target: str,
        payload: bytes,
    );
}
