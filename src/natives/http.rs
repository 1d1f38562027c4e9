natives! {
    namespace "http";

    /// `request` is MessagePack-encoded request options; returns a request token.
    0x8E8CC653 => PERFORM_HTTP_REQUEST_INTERNAL: fn perform_http_request_internal(request: bytes) -> int;
}
