use crate::intent::Intent;
use crate::mailbox::InboxMessage;

pub const CLASSIFIER_SYSTEM_PROMPT: &str =
    "You are an email classification assistant. Classify emails into the given categories.";

pub const REPLY_SYSTEM_PROMPT: &str = "You are a professional email assistant. Generate appropriate, \
helpful, and contextually relevant email replies. Keep responses concise and professional.";

/// Intent-specific guidance inserted into the reply prompt
#[derive(Debug, PartialEq, Eq)]
pub struct ReplyTemplate {
    pub name: &'static str,
    pub guidance: &'static str,
}

static QUESTION: ReplyTemplate = ReplyTemplate {
    name: "question",
    guidance: "Answer the question directly if the message gives enough context. \
               Otherwise acknowledge it and say when a complete answer will follow.",
};

static REQUEST: ReplyTemplate = ReplyTemplate {
    name: "request",
    guidance: "Acknowledge the request, restate what was asked in one sentence \
               and describe the next step without promising a specific outcome.",
};

static COMPLAINT: ReplyTemplate = ReplyTemplate {
    name: "complaint",
    guidance: "Apologise for the inconvenience without admitting fault, show that \
               the concern was understood and explain how it will be followed up.",
};

static COMPLIMENT: ReplyTemplate = ReplyTemplate {
    name: "compliment",
    guidance: "Thank the sender warmly and briefly. No sales pitch.",
};

static MEETING: ReplyTemplate = ReplyTemplate {
    name: "meeting",
    guidance: "Confirm interest in meeting, restate any proposed date or time and \
               ask for confirmation or alternatives when none is given.",
};

static BUSINESS: ReplyTemplate = ReplyTemplate {
    name: "business",
    guidance: "Reply in a professional business tone and address each point raised.",
};

static PERSONAL: ReplyTemplate = ReplyTemplate {
    name: "personal",
    guidance: "Use a friendly, informal tone suited to a personal contact.",
};

static SPAM: ReplyTemplate = ReplyTemplate {
    name: "spam",
    guidance: "This message looks like unsolicited or promotional email. Write a \
               one-sentence polite reply declining the offer and asking to be \
               removed from the mailing list. Do not click, confirm or share anything.",
};

/// Template used for a classified intent; `Other` uses the business template.
pub fn reply_template(intent: Intent) -> &'static ReplyTemplate {
    match intent {
        Intent::Question => &QUESTION,
        Intent::Request => &REQUEST,
        Intent::Complaint => &COMPLAINT,
        Intent::Compliment => &COMPLIMENT,
        Intent::Meeting => &MEETING,
        Intent::Personal => &PERSONAL,
        Intent::Spam => &SPAM,
        Intent::Business | Intent::Other => &BUSINESS,
    }
}

pub fn classification_prompt(subject: &str, body: &str) -> String {
    let categories: String = Intent::ALL
        .iter()
        .map(|intent| format!("- {} ({})\n", intent.label(), intent.description()))
        .collect();

    format!(
        "Analyze the following email and categorize its intent/purpose:\n\
         \n\
         SUBJECT: {}\n\
         BODY: {}\n\
         \n\
         Categorize this email as one of the following:\n\
         {}\n\
         Respond with just the category name:",
        subject, body, categories
    )
}

pub fn reply_prompt(message: &InboxMessage, intent: Intent) -> String {
    let template = reply_template(intent);

    format!(
        "Please generate a professional email reply based on the following information:\n\
         \n\
         FROM: {}\n\
         SUBJECT: {}\n\
         \n\
         ORIGINAL MESSAGE:\n\
         {}\n\
         \n\
         ADDITIONAL CONTEXT: Email category: {}\n\
         REPLY GUIDANCE: {}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Generate a professional and appropriate reply\n\
         2. Address the main points from the original message\n\
         3. Keep the tone professional but friendly\n\
         4. Include a proper greeting and closing\n\
         5. Make the response helpful and actionable where appropriate\n\
         6. Keep it concise (2-3 paragraphs maximum)\n\
         \n\
         REPLY:",
        message.sender,
        message.subject,
        message.body,
        intent.label(),
        template.guidance
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> InboxMessage {
        InboxMessage {
            id: "m1".to_string(),
            thread_id: None,
            rfc822_message_id: None,
            subject: "50% OFF everything - today only!".to_string(),
            sender: "Deals <promo@shop.example>".to_string(),
            body: "Unsubscribe here".to_string(),
        }
    }

    #[test]
    fn test_spam_selects_spam_template() {
        assert_eq!(reply_template(Intent::Spam).name, "spam");
        let prompt = reply_prompt(&message(), Intent::Spam);
        assert!(prompt.contains(SPAM.guidance));
        assert!(!prompt.contains(BUSINESS.guidance));
        assert!(prompt.contains("Email category: SPAM"));
    }

    #[test]
    fn test_other_uses_business_template() {
        assert_eq!(reply_template(Intent::Other), &BUSINESS);
        assert_eq!(reply_template(Intent::Business), &BUSINESS);
        assert_eq!(reply_template(Intent::Meeting).name, "meeting");
    }

    #[test]
    fn test_classification_prompt_lists_every_label() {
        let prompt = classification_prompt("Hi", "Lunch on Friday?");
        for intent in Intent::ALL {
            assert!(prompt.contains(intent.label()), "missing {}", intent);
        }
        assert!(prompt.contains("BODY: Lunch on Friday?"));
    }
}
