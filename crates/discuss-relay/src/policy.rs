use std::collections::BTreeSet;

use discuss_channels::types::CONTENT_TYPE_TEXT;
use discuss_core::Channel;

/// Characters in a single SMS segment.
pub const SMS_SEGMENT_CHARS: usize = 160;
/// Longest reply we send over SMS, in segments.
pub const SMS_MAX_SEGMENTS: usize = 5;

/// Per-channel delivery rules applied by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPolicy {
    /// Longest reply (in UTF-8 bytes) the channel accepts. `None` = no cap.
    pub max_reply_length: Option<usize>,
    /// Lowercase content types the relay answers with a completion.
    pub supported_content_types: BTreeSet<String>,
    /// Answer multipart segments with a single notice instead of a completion.
    pub suppress_multipart: bool,
    /// Replies reference the inbound message ID.
    pub supports_threading: bool,
}

impl ChannelPolicy {
    /// Built-in policy for `channel`.
    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Sms => Self {
                max_reply_length: Some(SMS_SEGMENT_CHARS * SMS_MAX_SEGMENTS),
                supported_content_types: text_only(),
                suppress_multipart: true,
                supports_threading: false,
            },
            // segmentation is the provider's business on WhatsApp
            Channel::Whatsapp => Self {
                max_reply_length: None,
                supported_content_types: text_only(),
                suppress_multipart: false,
                supports_threading: true,
            },
            Channel::Email => Self {
                max_reply_length: None,
                supported_content_types: text_only(),
                suppress_multipart: false,
                supports_threading: true,
            },
        }
    }

    pub fn supports(&self, content_type: &str) -> bool {
        self.supported_content_types
            .contains(&content_type.trim().to_ascii_lowercase())
    }

    /// The cap `text` breaks, if any.
    pub fn exceeded_limit(&self, text: &str) -> Option<usize> {
        self.max_reply_length
            .filter(|max| reply_length(text) > *max)
    }
}

/// Length of a reply as measured against `max_reply_length`: UTF-8 bytes.
pub fn reply_length(text: &str) -> usize {
    text.len()
}

fn text_only() -> BTreeSet<String> {
    BTreeSet::from([CONTENT_TYPE_TEXT.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sms_caps_at_five_segments() {
        let policy = ChannelPolicy::for_channel(Channel::Sms);
        assert_eq!(policy.max_reply_length, Some(800));
        assert!(policy.suppress_multipart);
        assert!(!policy.supports_threading);
    }

    #[test]
    fn whatsapp_has_no_cap_and_threads() {
        let policy = ChannelPolicy::for_channel(Channel::Whatsapp);
        assert_eq!(policy.max_reply_length, None);
        assert!(!policy.suppress_multipart);
        assert!(policy.supports_threading);
        assert_eq!(policy.exceeded_limit(&"x".repeat(10_000)), None);
    }

    #[test]
    fn only_text_is_supported() {
        for channel in [Channel::Sms, Channel::Whatsapp, Channel::Email] {
            let policy = ChannelPolicy::for_channel(channel);
            assert!(policy.supports("text"));
            assert!(policy.supports("TEXT"));
            assert!(!policy.supports("image"));
            assert!(!policy.supports(""));
        }
    }

    #[test]
    fn length_is_counted_in_bytes() {
        let policy = ChannelPolicy::for_channel(Channel::Sms);
        // "é" is two bytes
        assert_eq!(policy.exceeded_limit(&"é".repeat(400)), None);
        assert_eq!(policy.exceeded_limit(&"é".repeat(401)), Some(800));
        assert_eq!(reply_length(&"é".repeat(401)), 802);
        assert_eq!(policy.exceeded_limit(&"x".repeat(800)), None);
    }
}
