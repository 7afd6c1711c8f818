use std::fmt;

/// Category assigned to an incoming email by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Question,
    Request,
    Complaint,
    Compliment,
    Meeting,
    Business,
    Personal,
    Spam,
    Other,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::Question,
        Intent::Request,
        Intent::Complaint,
        Intent::Compliment,
        Intent::Meeting,
        Intent::Business,
        Intent::Personal,
        Intent::Spam,
        Intent::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Intent::Question => "QUESTION",
            Intent::Request => "REQUEST",
            Intent::Complaint => "COMPLAINT",
            Intent::Compliment => "COMPLIMENT",
            Intent::Meeting => "MEETING",
            Intent::Business => "BUSINESS",
            Intent::Personal => "PERSONAL",
            Intent::Spam => "SPAM",
            Intent::Other => "OTHER",
        }
    }

    /// Short description shown to the classifier next to each label
    pub fn description(self) -> &'static str {
        match self {
            Intent::Question => "asking for information",
            Intent::Request => "asking for action/task",
            Intent::Complaint => "expressing dissatisfaction",
            Intent::Compliment => "positive feedback",
            Intent::Meeting => "scheduling/meeting related",
            Intent::Business => "general business communication",
            Intent::Personal => "personal communication",
            Intent::Spam => "potentially spam/unwanted",
            Intent::Other => "anything else",
        }
    }

    /// Map free-form classifier output onto a label.
    ///
    /// Models sometimes answer "Category: QUESTION." or "question (asking...)",
    /// so an exact match is tried first, then the first word that is a label.
    /// Anything unrecognised is `Other`.
    pub fn from_label(raw: &str) -> Intent {
        let normalized = raw.trim().to_uppercase();

        if let Some(intent) = Self::exact(normalized.trim_matches(|c: char| !c.is_ascii_alphabetic())) {
            return intent;
        }

        normalized
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| !word.is_empty())
            .find_map(Self::exact)
            .unwrap_or(Intent::Other)
    }

    fn exact(word: &str) -> Option<Intent> {
        Self::ALL.into_iter().find(|intent| intent.label() == word)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
