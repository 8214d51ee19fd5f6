use discuss_core::Channel;

/// Name used in the system prompt when the channel gives us none.
const ANONYMOUS_SENDER: &str = "a user";

/// Frame the conversation for the model: who is talking and over which channel.
///
/// The channel matters to the model's tone and length (an SMS reply should be
/// short, a WhatsApp one can be longer).
pub fn system_prompt(channel: Channel, display_name: Option<&str>) -> String {
    let name = display_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(ANONYMOUS_SENDER);
    format!(
        "As {} chatting with the AI language model via {}.",
        name, channel
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_sender_and_channel() {
        assert_eq!(
            system_prompt(Channel::Whatsapp, Some("Alice")),
            "As Alice chatting with the AI language model via whatsapp."
        );
    }

    #[test]
    fn blank_name_falls_back_to_anonymous() {
        assert_eq!(
            system_prompt(Channel::Sms, Some("  ")),
            "As a user chatting with the AI language model via sms."
        );
        assert_eq!(
            system_prompt(Channel::Sms, None),
            "As a user chatting with the AI language model via sms."
        );
    }
}
