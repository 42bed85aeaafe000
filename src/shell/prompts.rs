//! Suggested prompts

/// Prompts offered on the welcome screen
pub const QUICK_PROMPTS: [&str; 4] = [
    "What deductions can I claim?",
    "How do I file a tax return?",
    "Explain the latest tax brackets",
    "Capital gains tax rules",
];

/// Topic-grouped prompts for the categorized layout
pub const PROMPT_CATEGORIES: [PromptCategory; 4] = [
    PromptCategory {
        title: "Deductions",
        prompts: &[
            "What deductions can I claim?",
            "Can I deduct charitable donations?",
        ],
    },
    PromptCategory {
        title: "Filing",
        prompts: &[
            "How do I file a tax return?",
            "What is the deadline for filing returns?",
        ],
    },
    PromptCategory {
        title: "Rates",
        prompts: &[
            "Explain the latest tax brackets",
            "How is withholding tax calculated on salary?",
        ],
    },
    PromptCategory {
        title: "Investments",
        prompts: &[
            "Capital gains tax rules",
            "How are dividends taxed?",
        ],
    },
];

/// A titled group of prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptCategory {
    /// Group heading
    pub title: &'static str,
    /// Prompts in display order
    pub prompts: &'static [&'static str],
}

/// Prompts to show for the chosen layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSet {
    /// One flat list
    Flat(&'static [&'static str]),
    /// Grouped by topic
    Categorized(&'static [PromptCategory]),
}

impl PromptSet {
    /// Select the layout
    #[must_use]
    pub fn new(categorized: bool) -> Self {
        if categorized {
            Self::Categorized(&PROMPT_CATEGORIES)
        } else {
            Self::Flat(&QUICK_PROMPTS)
        }
    }

    /// All prompts in display order, numbered from 1 by position
    #[must_use]
    pub fn all(&self) -> Vec<&'static str> {
        match self {
            Self::Flat(prompts) => prompts.to_vec(),
            Self::Categorized(categories) => categories
                .iter()
                .flat_map(|c| c.prompts.iter().copied())
                .collect(),
        }
    }

    /// Prompt by 1-based position
    #[must_use]
    pub fn get(&self, number: usize) -> Option<&'static str> {
        number.checked_sub(1).and_then(|i| self.all().get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_numbering() {
        let set = PromptSet::new(false);
        assert_eq!(set.get(1), Some("What deductions can I claim?"));
        assert_eq!(set.get(4), Some("Capital gains tax rules"));
        assert_eq!(set.get(0), None);
        assert_eq!(set.get(5), None);
    }

    #[test]
    fn categorized_flattens_in_order() {
        let set = PromptSet::new(true);
        let all = set.all();
        assert_eq!(all.len(), 8);
        assert_eq!(all[2], "How do I file a tax return?");
    }
}
