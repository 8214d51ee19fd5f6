//! Fixed user-facing texts sent instead of a completion.
//!
//! Provider errors never reach the end user; these are the only bodies the
//! relay sends besides generated text.

use discuss_core::Channel;

pub const MULTIPART_UNSUPPORTED: &str =
    "We don't yet support text prompts with more than 160 characters.";

pub const COMPLETION_FAILED: &str =
    "We could not generate a response to your message. Please try again later.";

pub fn unsupported_content_type(content_type: &str) -> String {
    format!(
        "We only support text messages at the moment we plan to support {} content in the future.",
        content_type
    )
}

pub fn response_too_long(length: usize, max: usize, support_contact: &str, channel: Channel) -> String {
    format!(
        "The response text contains {} characters. Contact us at {} to receive responses with more than {} characters via {}.",
        length, support_contact, max, channel
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_names_the_type() {
        assert_eq!(
            unsupported_content_type("image"),
            "We only support text messages at the moment we plan to support image content in the future."
        );
    }

    #[test]
    fn too_long_quotes_counts_and_contact() {
        let text = response_too_long(912, 800, "help@example.com", Channel::Sms);
        assert!(text.contains("912 characters"));
        assert!(text.contains("more than 800 characters via sms"));
        assert!(text.contains("help@example.com"));
    }
}
