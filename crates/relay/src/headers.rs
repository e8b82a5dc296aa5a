use std::time::{SystemTime, UNIX_EPOCH};

/// Ensure the outgoing body carries `From:` and `Message-ID:` headers.
///
/// Checks run in order against the evolving body: a missing `From:` is
/// prepended first, then a missing `Message-ID:`, so when both are injected
/// the Message-ID header ends up on the first line. Applying this to its
/// own output changes nothing.
///
/// ```
/// # use std::time::{Duration, UNIX_EPOCH};
/// let body = relay::ensure_headers("Hello\r\n", "<a@x.com>", UNIX_EPOCH + Duration::from_secs(1));
///
/// assert_eq!(
///     body,
///     "Message-ID: <1.relay@localhost>\r\n\
///     From: <a@x.com>\r\n\
///     Hello\r\n"
/// );
/// ```
pub fn ensure_headers(body: &str, mail_from: &str, now: SystemTime) -> String {
    let mut body = body.to_owned();

    if !has_header(&body, "from:") {
        body = format!("From: {mail_from}\r\n{body}");
    }

    if !has_header(&body, "message-id:") {
        body = format!("Message-ID: {}\r\n{body}", message_id(now));
    }

    body
}

/// Substring search, not header parsing: a matching token anywhere in the
/// body counts as present.
fn has_header(body: &str, lowercase_name: &str) -> bool {
    body.to_ascii_lowercase().contains(lowercase_name)
}

/// `<unix-secs.relay@localhost>`, a pure function of the clock reading.
fn message_id(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("<{secs}.relay@localhost>")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use super::ensure_headers;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn injects_both_headers_in_order() {
        let body = ensure_headers("Hello\r\n", "<a@x.com>", at(1700000000));
        assert_eq!(
            body,
            "Message-ID: <1700000000.relay@localhost>\r\n\
             From: <a@x.com>\r\n\
             Hello\r\n"
        );
    }

    #[test]
    fn present_headers_are_left_alone() {
        let body = "From: Alice <a@x.com>\r\nMessage-ID: <abc@x.com>\r\n\r\nHi\r\n";
        assert_eq!(ensure_headers(body, "<a@x.com>", at(0)), body);
    }

    #[test]
    fn detection_is_case_insensitive() {
        let body = "FROM: <a@x.com>\r\nmessage-id: <abc@x.com>\r\n\r\nHi\r\n";
        assert_eq!(ensure_headers(body, "<a@x.com>", at(0)), body);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let once = ensure_headers("Subject: hi\r\n\r\nHello\r\n", "<a@x.com>", at(1700000000));
        let twice = ensure_headers(&once, "<a@x.com>", at(1700009999));
        assert_eq!(once, twice);
    }

    #[test]
    fn only_the_missing_header_is_added() {
        let body = ensure_headers("From: <a@x.com>\r\nHi\r\n", "<a@x.com>", at(42));
        assert_eq!(
            body,
            "Message-ID: <42.relay@localhost>\r\nFrom: <a@x.com>\r\nHi\r\n"
        );
    }
}
